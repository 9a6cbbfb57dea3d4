//! The layout planner: where every mip level of an image lives in its allocation.
//!
//! # Tiling modes
//!
//! The hardware addresses tiled memory in units of *micro-tiles* (utiles): 64-byte blocks whose
//! pixel dimensions depend on the number of bytes per pixel. Two by two utiles form a *UIF block*.
//! Each mip level is stored in one of the [`TilingMode`]s, chosen from the size of the level:
//!
//! | Level width, in blocks             | Mode                          | Aligned to        |
//! |------------------------------------|-------------------------------|-------------------|
//! | ≤ utile width, or height ≤ utile height | [`LinearTile`]           | 1 × 1 utiles      |
//! | ≤ one UIF block                    | [`UbLinear1Column`]           | 1 × 1 UIF blocks  |
//! | ≤ two UIF blocks                   | [`UbLinear2Column`]           | 2 × 1 UIF blocks  |
//! | anything larger                    | [`UifNoXor`]                  | 4 × 1 UIF blocks  |
//!
//! The top level of a multisampled image is always UIF. Images that are not tiled, and 1D images,
//! use [`Raster`] for every level.
//!
//! # Placement
//!
//! Levels are placed from the smallest to the largest, so level 0 ends up at the highest offset.
//! Levels 2 and up are minified from the base extent rounded up to a power of two. After placing
//! every level, the whole chain is shifted so that level 0 starts on a 4096-byte page. One layer
//! of the image spans the end of level 0, rounded up to 64 bytes; array layers, cube faces and 3D
//! depth slices follow each other at that stride.
//!
//! [`LinearTile`]: TilingMode::LinearTile
//! [`UbLinear1Column`]: TilingMode::UbLinear1Column
//! [`UbLinear2Column`]: TilingMode::UbLinear2Column
//! [`UifNoXor`]: TilingMode::UifNoXor
//! [`Raster`]: TilingMode::Raster

use super::ImageType;
use crate::{format::Format, memory::align_up, DeviceSize, NonExhaustive};
use smallvec::{smallvec, SmallVec};

/// The alignment of level 0 within a layer.
pub const PAGE_ALIGNMENT: u32 = 4096;

/// The alignment of the layer stride.
pub const LAYER_ALIGNMENT: u32 = 64;

/// The size of a micro-tile in bytes, whatever the number of bytes per pixel.
pub const UTILE_SIZE: u32 = 64;

/// The largest width, height or depth of an image, in pixels.
pub const MAX_IMAGE_DIMENSION: u32 = 4096;

/// The largest number of array layers of an image.
pub const MAX_ARRAY_LAYERS: u32 = 2048;

/// A 4096 × 4096 image has 13 levels.
const MAX_INLINE_LEVELS: usize = 13;

/// How the pixels of one mip level are arranged in memory.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TilingMode {
    /// Rows of pixels one after the other.
    #[default]
    Raster,

    /// Utiles in raster order.
    LinearTile,

    /// UIF blocks in raster order, one block wide.
    UbLinear1Column,

    /// UIF blocks in raster order, two blocks wide.
    UbLinear2Column,

    /// UIF blocks in columns of four blocks.
    UifNoXor,

    /// Like `UifNoXor`, with every other column's block rows swizzled to spread accesses over
    /// memory banks.
    UifXor,
}

impl TilingMode {
    /// Returns the short name used in layout dumps.
    #[inline]
    pub const fn short_name(self) -> &'static str {
        match self {
            TilingMode::Raster => "R",
            TilingMode::LinearTile => "LT",
            TilingMode::UbLinear1Column => "UB1",
            TilingMode::UbLinear2Column => "UB2",
            TilingMode::UifNoXor => "UIF",
            TilingMode::UifXor => "UIF^",
        }
    }

    /// Returns whether the mode is one of the UIF modes.
    #[inline]
    pub const fn is_uif(self) -> bool {
        matches!(self, TilingMode::UifNoXor | TilingMode::UifXor)
    }
}

/// Returns the width in pixels of a micro-tile.
///
/// # Panics
///
/// - Panics if `bytes_per_pixel` is not 1, 2, 4, 8 or 16.
#[inline]
pub const fn utile_width(bytes_per_pixel: u32) -> u32 {
    match bytes_per_pixel {
        1 | 2 => 8,
        4 | 8 => 4,
        16 => 2,
        _ => panic!("no micro-tile width for this number of bytes per pixel"),
    }
}

/// Returns the height in pixels of a micro-tile.
///
/// # Panics
///
/// - Panics if `bytes_per_pixel` is not 1, 2, 4, 8 or 16.
#[inline]
pub const fn utile_height(bytes_per_pixel: u32) -> u32 {
    match bytes_per_pixel {
        1 => 8,
        2 | 4 => 4,
        8 | 16 => 2,
        _ => panic!("no micro-tile height for this number of bytes per pixel"),
    }
}

/// Returns the extent of a mip level, given the extent of level 0.
///
/// Never returns less than 1.
#[inline]
pub const fn minify(value: u32, level: u32) -> u32 {
    let shifted = if level < u32::BITS { value >> level } else { 0 };

    if shifted == 0 {
        1
    } else {
        shifted
    }
}

/// The geometry of one mip level, for a single array layer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SubresourceSlice {
    /// How the level is arranged in memory.
    pub tiling: TilingMode,

    /// The byte offset of the level from the start of the layer.
    pub offset: u32,

    /// The byte distance between two rows of blocks.
    pub stride: u32,

    /// The byte size of the level.
    pub size: u32,
}

impl SubresourceSlice {
    /// Returns the height of the level in rows of blocks, including padding.
    #[inline]
    pub const fn padded_height(&self) -> u32 {
        self.size / self.stride
    }

    /// Returns the byte offset one past the end of the level.
    #[inline]
    pub const fn end(&self) -> u32 {
        self.offset + self.size
    }
}

/// Describes an image to [`plan_layout`].
#[derive(Clone, Debug)]
pub struct LayoutInfo {
    /// The kind of image.
    ///
    /// The default value is [`ImageType::Dim2d`].
    pub image_type: ImageType,

    /// The format of the pixels.
    ///
    /// The default value is [`Format::R8G8B8A8_UNORM`].
    pub format: Format,

    /// The extent of level 0 in pixels.
    ///
    /// Only the width and height affect the layout. The default value is `[1, 1, 1]`.
    pub extent: [u32; 3],

    /// The number of mip levels.
    ///
    /// The default value is `1`.
    pub mip_levels: u32,

    /// The number of samples per pixel. `0` and `1` both mean a single sample.
    ///
    /// The default value is `1`.
    pub samples: u32,

    /// Whether the image may use tiled layouts. If `false`, every level is [`TilingMode::Raster`].
    ///
    /// The default value is `true`.
    pub tiled: bool,

    pub _ne: NonExhaustive,
}

impl Default for LayoutInfo {
    #[inline]
    fn default() -> Self {
        LayoutInfo {
            image_type: ImageType::Dim2d,
            format: Format::R8G8B8A8_UNORM,
            extent: [1, 1, 1],
            mip_levels: 1,
            samples: 1,
            tiled: true,
            _ne: NonExhaustive(()),
        }
    }
}

impl LayoutInfo {
    /// Returns the number of bytes each block of the image takes up.
    ///
    /// For a multisampled image, this is the width of the tile buffer's internal representation
    /// of the format rather than the size of the format itself.
    ///
    /// # Panics
    ///
    /// - Panics if the image is multisampled and its format cannot be rendered to.
    #[inline]
    pub fn bytes_per_pixel(&self) -> u32 {
        bytes_per_pixel(self.format, self.samples)
    }
}

pub(crate) fn bytes_per_pixel(format: Format, samples: u32) -> u32 {
    if samples <= 1 {
        format.block_size()
    } else {
        match format.render_target_bpp() {
            Some(bpp) => bpp,
            None => panic!("multisampled image of format {format:?} has no internal bpp"),
        }
    }
}

/// The result of [`plan_layout`]. Immutable for the lifetime of an image.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ImageLayoutPlan {
    bytes_per_pixel: u32,
    slices: SmallVec<[SubresourceSlice; MAX_INLINE_LEVELS]>,
    layer_stride: u32,
}

impl ImageLayoutPlan {
    /// Returns the number of bytes per block the plan was computed for.
    #[inline]
    pub fn bytes_per_pixel(&self) -> u32 {
        self.bytes_per_pixel
    }

    /// Returns the geometry of every mip level, indexed by level.
    #[inline]
    pub fn slices(&self) -> &[SubresourceSlice] {
        &self.slices
    }

    /// Returns the geometry of a mip level, or `None` if the level doesn't exist.
    #[inline]
    pub fn slice(&self, level: u32) -> Option<&SubresourceSlice> {
        self.slices.get(level as usize)
    }

    /// Returns the number of mip levels.
    #[inline]
    pub fn mip_levels(&self) -> u32 {
        self.slices.len() as u32
    }

    /// Returns the byte distance between two consecutive array layers, cube faces or depth
    /// slices.
    #[inline]
    pub fn layer_stride(&self) -> u32 {
        self.layer_stride
    }

    /// Returns the number of bytes to allocate for `layers` layers.
    ///
    /// Level 0 of the first layer starts at a page boundary past the smaller levels, so the
    /// allocation has to cover that offset in addition to the layers themselves.
    #[inline]
    pub fn allocation_size(&self, layers: u32) -> DeviceSize {
        let level0 = &self.slices[0];

        DeviceSize::from(level0.end())
            + DeviceSize::from(self.layer_stride) * DeviceSize::from(layers)
            - 1
    }
}

/// Computes the tiling mode, offset, stride and size of every mip level of an image.
///
/// # Panics
///
/// - Panics if `info.mip_levels` is 0, or if the width or height is 0.
/// - Panics if the width or height is greater than [`MAX_IMAGE_DIMENSION`].
/// - Panics if the image is tiled and its bytes per pixel has no micro-tile size.
/// - Panics if the image is multisampled and its format cannot be rendered to.
pub fn plan_layout(info: &LayoutInfo) -> ImageLayoutPlan {
    let &LayoutInfo {
        image_type,
        format,
        extent: [width, height, _],
        mip_levels,
        samples,
        tiled,
        _ne: _,
    } = info;

    assert_ne!(mip_levels, 0);
    assert!(width != 0 && height != 0);
    assert!(width <= MAX_IMAGE_DIMENSION && height <= MAX_IMAGE_DIMENSION);

    let cpp = bytes_per_pixel(format, samples);
    let [block_width, block_height, _] = format.block_extent();
    let pot_width = width.next_power_of_two();
    let pot_height = height.next_power_of_two();
    let msaa = samples > 1;

    let mut slices: SmallVec<[SubresourceSlice; MAX_INLINE_LEVELS]> =
        smallvec![SubresourceSlice::default(); mip_levels as usize];
    let mut offset = 0;

    for level in (0..mip_levels).rev() {
        let (mut level_width, mut level_height) = if level < 2 {
            (minify(width, level), minify(height, level))
        } else {
            (minify(pot_width, level), minify(pot_height, level))
        };

        if msaa {
            level_width *= 2;
            level_height *= 2;
        }

        level_width = level_width.div_ceil(block_width);
        level_height = level_height.div_ceil(block_height);

        let tiling = if matches!(image_type, ImageType::Dim1d | ImageType::Dim1dArray) {
            level_width = align_up(level_width, UTILE_SIZE / cpp);

            TilingMode::Raster
        } else if tiled {
            let force_uif = msaa && level == 0;
            let (tiling, padded_width, padded_height) =
                choose_tiling(cpp, level_width, level_height, force_uif);
            level_width = padded_width;
            level_height = padded_height;

            tiling
        } else {
            TilingMode::Raster
        };

        let stride = level_width * cpp;
        let size = level_height * stride;
        slices[level as usize] = SubresourceSlice {
            tiling,
            offset,
            stride,
            size,
        };
        offset += size;
    }

    let level0_offset = slices[0].offset;
    let page_gap = align_up(level0_offset, PAGE_ALIGNMENT) - level0_offset;

    if page_gap != 0 {
        for slice in &mut slices {
            slice.offset += page_gap;
        }
    }

    let layer_stride = align_up(slices[0].end(), LAYER_ALIGNMENT);

    ImageLayoutPlan {
        bytes_per_pixel: cpp,
        slices,
        layer_stride,
    }
}

/// Picks the tiling mode of a level of `width` × `height` blocks, and returns it together with
/// the padded extent.
///
/// Boundaries are inclusive: a level that exactly fits a mode gets that mode.
fn choose_tiling(cpp: u32, width: u32, height: u32, force_uif: bool) -> (TilingMode, u32, u32) {
    let utile_w = utile_width(cpp);
    let utile_h = utile_height(cpp);
    let uif_block_w = utile_w * 2;
    let uif_block_h = utile_h * 2;

    if !force_uif && (width <= utile_w || height <= utile_h) {
        (
            TilingMode::LinearTile,
            align_up(width, utile_w),
            align_up(height, utile_h),
        )
    } else if !force_uif && width <= uif_block_w {
        (
            TilingMode::UbLinear1Column,
            align_up(width, uif_block_w),
            align_up(height, uif_block_h),
        )
    } else if !force_uif && width <= 2 * uif_block_w {
        (
            TilingMode::UbLinear2Column,
            align_up(width, 2 * uif_block_w),
            align_up(height, uif_block_h),
        )
    } else {
        // Columns are four UIF blocks wide, but rows are only padded to a single block.
        (
            TilingMode::UifNoXor,
            align_up(width, 4 * uif_block_w),
            align_up(height, uif_block_h),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn plan_2d(format: Format, extent: [u32; 2], mip_levels: u32) -> ImageLayoutPlan {
        plan_layout(&LayoutInfo {
            format,
            extent: [extent[0], extent[1], 1],
            mip_levels,
            ..Default::default()
        })
    }

    fn format_with_cpp(cpp: u32) -> Format {
        match cpp {
            1 => Format::R8_UNORM,
            2 => Format::R16_SFLOAT,
            4 => Format::R8G8B8A8_UNORM,
            8 => Format::R16G16B16A16_SFLOAT,
            16 => Format::R32G32B32A32_SFLOAT,
            _ => unreachable!(),
        }
    }

    fn mode_alignment(tiling: TilingMode, cpp: u32) -> u32 {
        let utile_w = utile_width(cpp);

        match tiling {
            TilingMode::Raster => 1,
            TilingMode::LinearTile => utile_w,
            TilingMode::UbLinear1Column => 2 * utile_w,
            TilingMode::UbLinear2Column => 4 * utile_w,
            TilingMode::UifNoXor | TilingMode::UifXor => 8 * utile_w,
        }
    }

    #[test]
    fn utiles_are_64_bytes() {
        for cpp in [1, 2, 4, 8, 16] {
            assert_eq!(utile_width(cpp) * utile_height(cpp) * cpp, UTILE_SIZE);
        }

        assert_eq!((utile_width(4), utile_height(4)), (4, 4));
        assert_eq!((utile_width(8), utile_height(8)), (4, 2));
    }

    #[test]
    #[should_panic]
    fn utile_of_unknown_cpp() {
        utile_width(3);
    }

    #[test]
    fn minify_clamps_to_one() {
        assert_eq!(minify(130, 0), 130);
        assert_eq!(minify(130, 1), 65);
        assert_eq!(minify(130, 8), 1);
        assert_eq!(minify(1, 40), 1);
    }

    #[test]
    fn rgba_130x130() {
        // 4 bytes per pixel: 4 × 4 utiles and 8 × 8 UIF blocks. 130 is wider than two UIF
        // blocks, so the level is UIF, padded to 160 × 136.
        let plan = plan_2d(Format::R8G8B8A8_UNORM, [130, 130], 1);
        let level0 = plan.slices()[0];

        assert_eq!(level0.tiling, TilingMode::UifNoXor);
        assert_eq!(level0.offset, 0);
        assert_eq!(level0.stride, 640);
        assert_eq!(level0.size, 87040);
        assert_eq!(level0.padded_height(), 136);
        assert_eq!(plan.layer_stride(), 87040);
        assert_eq!(plan.allocation_size(1), 174079);
    }

    #[test]
    fn rgba_4x4_is_one_utile() {
        let plan = plan_2d(Format::R8G8B8A8_UNORM, [4, 4], 1);

        assert_eq!(
            plan.slices()[0],
            SubresourceSlice {
                tiling: TilingMode::LinearTile,
                offset: 0,
                stride: 16,
                size: 64,
            },
        );
        assert_eq!(plan.layer_stride(), 64);
    }

    #[test]
    fn threshold_table_4bpp() {
        let cases = [
            ([1, 1], TilingMode::LinearTile, 16, 64),
            ([4, 4], TilingMode::LinearTile, 16, 64),
            ([8, 8], TilingMode::UbLinear1Column, 32, 256),
            ([16, 16], TilingMode::UbLinear2Column, 64, 1024),
            ([24, 24], TilingMode::UifNoXor, 128, 3072),
            ([40, 40], TilingMode::UifNoXor, 256, 10240),
            // Short and wide still fits in one row of utiles.
            ([100, 3], TilingMode::LinearTile, 400, 1600),
        ];

        for (extent, tiling, stride, size) in cases {
            let slice = plan_2d(Format::R8G8B8A8_UNORM, extent, 1).slices()[0];

            assert_eq!(slice.tiling, tiling, "{extent:?}");
            assert_eq!((slice.stride, slice.size), (stride, size), "{extent:?}");
        }
    }

    #[test]
    fn threshold_table_every_cpp() {
        for cpp in [1, 2, 4, 8, 16] {
            let format = format_with_cpp(cpp);
            let utile_w = utile_width(cpp);
            let utile_h = utile_height(cpp);
            let uif_w = 2 * utile_w;
            let uif_h = 2 * utile_h;

            let cases = [
                ([1, 1], TilingMode::LinearTile),
                ([utile_w, utile_h], TilingMode::LinearTile),
                ([uif_w, uif_h], TilingMode::UbLinear1Column),
                ([2 * uif_w, 2 * uif_h], TilingMode::UbLinear2Column),
                ([3 * uif_w, 3 * uif_h], TilingMode::UifNoXor),
                ([5 * uif_w, 5 * uif_h], TilingMode::UifNoXor),
            ];

            for (extent, tiling) in cases {
                let slice = plan_2d(format, extent, 1).slices()[0];

                assert_eq!(slice.tiling, tiling, "cpp {cpp}, {extent:?}");
                assert_eq!(slice.stride % (mode_alignment(tiling, cpp) * cpp), 0);
            }
        }
    }

    #[test]
    fn full_mip_chain() {
        let plan = plan_2d(Format::R8G8B8A8_UNORM, [64, 64], 7);
        let expected = [
            (TilingMode::UifNoXor, 8192, 256, 16384),
            (TilingMode::UifNoXor, 4096, 128, 4096),
            (TilingMode::UbLinear2Column, 3264, 64, 1024),
            (TilingMode::UbLinear1Column, 2816, 32, 256),
            (TilingMode::LinearTile, 2752, 16, 64),
            (TilingMode::LinearTile, 2688, 16, 64),
            (TilingMode::LinearTile, 2624, 16, 64),
        ];

        for (level, (tiling, offset, stride, size)) in expected.into_iter().enumerate() {
            assert_eq!(
                plan.slices()[level],
                SubresourceSlice {
                    tiling,
                    offset,
                    stride,
                    size,
                },
                "level {level}",
            );
        }

        assert_eq!(plan.layer_stride(), 24576);
    }

    #[test]
    fn small_levels_use_power_of_two_extent() {
        // Level 1 is minified from 100 × 60, level 2 from 128 × 64.
        let plan = plan_2d(Format::R8G8B8A8_UNORM, [100, 60], 3);
        let offsets: Vec<_> = plan.slices().iter().map(|s| (s.offset, s.stride)).collect();

        assert_eq!(offsets, [(12288, 512), (4096, 256), (2048, 128)]);
        assert_eq!(plan.slices()[0].size, 32768);
        assert_eq!(plan.layer_stride(), 45056);
    }

    #[test]
    fn multisampled_top_level_is_uif() {
        let plan = plan_layout(&LayoutInfo {
            extent: [4, 4, 1],
            samples: 4,
            ..Default::default()
        });
        let level0 = plan.slices()[0];

        assert_eq!(plan.bytes_per_pixel(), 4);
        assert_eq!(level0.tiling, TilingMode::UifNoXor);
        assert_eq!((level0.stride, level0.size), (128, 1024));
    }

    #[test]
    fn multisampled_wide_format_uses_internal_bpp() {
        let plan = plan_layout(&LayoutInfo {
            format: Format::R16G16B16A16_SFLOAT,
            extent: [16, 16, 1],
            samples: 4,
            ..Default::default()
        });

        assert_eq!(plan.bytes_per_pixel(), 8);
    }

    #[test]
    #[should_panic]
    fn multisampled_compressed_format() {
        plan_layout(&LayoutInfo {
            format: Format::ETC2_R8G8B8_UNORM_BLOCK,
            extent: [16, 16, 1],
            samples: 4,
            ..Default::default()
        });
    }

    #[test]
    fn compressed_levels_count_blocks() {
        // 16 × 16 blocks of 8 bytes: 4 × 2 utiles, so 16 blocks is exactly two UIF blocks.
        let plan = plan_2d(Format::ETC2_R8G8B8_UNORM_BLOCK, [64, 64], 1);
        let level0 = plan.slices()[0];

        assert_eq!(level0.tiling, TilingMode::UbLinear2Column);
        assert_eq!((level0.stride, level0.size), (128, 2048));
    }

    #[test]
    fn untiled_is_raster() {
        let plan = plan_layout(&LayoutInfo {
            extent: [130, 130, 1],
            tiled: false,
            ..Default::default()
        });

        assert_eq!(
            plan.slices()[0],
            SubresourceSlice {
                tiling: TilingMode::Raster,
                offset: 0,
                stride: 520,
                size: 67600,
            },
        );
    }

    #[test]
    fn one_dimensional_rows_are_64_bytes() {
        for image_type in [ImageType::Dim1d, ImageType::Dim1dArray] {
            for tiled in [false, true] {
                let plan = plan_layout(&LayoutInfo {
                    image_type,
                    extent: [10, 1, 1],
                    mip_levels: 2,
                    tiled,
                    ..Default::default()
                });

                for slice in plan.slices() {
                    assert_eq!(slice.tiling, TilingMode::Raster);
                    assert_eq!(slice.stride, 64);
                    assert_eq!(slice.size, 64);
                }
            }
        }
    }

    #[test]
    #[should_panic]
    fn extent_past_hardware_limit_panics() {
        plan_layout(&LayoutInfo {
            format: Format::R32G32B32A32_SFLOAT,
            extent: [70000, 70000, 1],
            ..Default::default()
        });
    }

    #[test]
    fn tiling_short_names() {
        assert_eq!(TilingMode::Raster.short_name(), "R");
        assert_eq!(TilingMode::UbLinear2Column.short_name(), "UB2");
        assert_eq!(TilingMode::UifXor.short_name(), "UIF^");
        assert!(TilingMode::UifXor.is_uif());
        assert!(!TilingMode::LinearTile.is_uif());
    }

    proptest! {
        #[test]
        fn slices_never_overlap(
            cpp in prop::sample::select(vec![1u32, 2, 4, 8, 16]),
            width in 1u32..=600,
            height in 1u32..=600,
            mip_levels in 1u32..=10,
            tiled in any::<bool>(),
        ) {
            let plan = plan_2d_with(format_with_cpp(cpp), [width, height], mip_levels, tiled);
            let slices = plan.slices();
            let gap = slices[slices.len() - 1].offset;

            // Before the page shift, the smallest level started at 0 and levels were packed.
            for level in 1..slices.len() {
                prop_assert_eq!(slices[level].end(), slices[level - 1].offset);
            }

            let unshifted_end = slices[0].end() - gap;
            let total: u32 = slices.iter().map(|s| s.size).sum();
            prop_assert_eq!(unshifted_end, total);

            prop_assert_eq!(slices[0].offset % PAGE_ALIGNMENT, 0);
            prop_assert_eq!(plan.layer_stride() % LAYER_ALIGNMENT, 0);
            prop_assert!(plan.layer_stride() >= slices[0].end());

            for slice in slices {
                prop_assert_eq!(slice.stride % (mode_alignment(slice.tiling, cpp) * cpp), 0);
                prop_assert_eq!(slice.size % slice.stride, 0);
            }
        }
    }

    fn plan_2d_with(
        format: Format,
        extent: [u32; 2],
        mip_levels: u32,
        tiled: bool,
    ) -> ImageLayoutPlan {
        plan_layout(&LayoutInfo {
            format,
            extent: [extent[0], extent[1], 1],
            mip_levels,
            tiled,
            ..Default::default()
        })
    }
}
