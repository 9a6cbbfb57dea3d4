//! Conversion between tiled memory and linear rows of pixels.
//!
//! The transfer engine never addresses tiled memory itself. It describes the tiled side of a
//! conversion with a [`TiledSurface`] and hands both buffers to a [`TiledImageCodec`].
//! [`V3dTiling`] converts one pixel at a time using the hardware's address functions; an embedder
//! can substitute an implementation that moves whole utiles with vector instructions.
//!
//! All coordinates and extents here are in blocks: for compressed formats, one "pixel" is one
//! compressed block of `bytes_per_pixel` bytes.

use super::{
    layout::{utile_height, utile_width, SubresourceSlice, TilingMode},
    transfer::TransferBox,
};

/// The tiled side of a conversion: one layer of one mip level.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TiledSurface {
    /// How the pixels are arranged.
    pub tiling: TilingMode,

    /// The size of one pixel in bytes.
    pub bytes_per_pixel: u32,

    /// The byte distance between two rows of pixels, including padding.
    pub stride: u32,

    /// The number of rows of pixels, including padding. The UIF modes need this to find the
    /// start of each column of blocks.
    pub height: u32,
}

impl TiledSurface {
    /// Describes one layer of a planned mip level.
    #[inline]
    pub fn from_slice(slice: &SubresourceSlice, bytes_per_pixel: u32) -> Self {
        TiledSurface {
            tiling: slice.tiling,
            bytes_per_pixel,
            stride: slice.stride,
            height: slice.padded_height(),
        }
    }

    /// Returns the byte offset of the pixel at (`x`, `y`) from the start of the surface.
    ///
    /// # Panics
    ///
    /// - Panics if the surface is tiled and `self.bytes_per_pixel` has no micro-tile size.
    pub fn pixel_offset(&self, x: u32, y: u32) -> u32 {
        let cpp = self.bytes_per_pixel;

        match self.tiling {
            TilingMode::Raster => y * self.stride + x * cpp,
            TilingMode::LinearTile => lt_pixel_offset(cpp, self.stride, x, y),
            TilingMode::UbLinear1Column => ublinear_pixel_offset(cpp, x, y, 1),
            TilingMode::UbLinear2Column => ublinear_pixel_offset(cpp, x, y, 2),
            TilingMode::UifNoXor => uif_pixel_offset(cpp, self.height, x, y, false),
            TilingMode::UifXor => uif_pixel_offset(cpp, self.height, x, y, true),
        }
    }
}

/// Converts rectangles of pixels between a tiled layout and linear rows.
///
/// Only `x`, `y`, `width` and `height` of the region are used: each call converts part of a
/// single layer.
pub trait TiledImageCodec {
    /// Copies `region` of the tiled `src` into `dst`, one row of `region.width` pixels every
    /// `dst_stride` bytes starting at the beginning of `dst`.
    fn load(
        &self,
        dst: &mut [u8],
        dst_stride: u32,
        src: &[u8],
        surface: &TiledSurface,
        region: &TransferBox,
    );

    /// Copies linear rows from `src`, `src_stride` bytes apart, into `region` of the tiled `dst`.
    fn store(
        &self,
        dst: &mut [u8],
        surface: &TiledSurface,
        src: &[u8],
        src_stride: u32,
        region: &TransferBox,
    );
}

/// The reference [`TiledImageCodec`], addressing every pixel individually.
#[derive(Clone, Copy, Debug, Default)]
pub struct V3dTiling;

impl TiledImageCodec for V3dTiling {
    fn load(
        &self,
        dst: &mut [u8],
        dst_stride: u32,
        src: &[u8],
        surface: &TiledSurface,
        region: &TransferBox,
    ) {
        let cpp = surface.bytes_per_pixel as usize;

        for y in 0..region.height {
            let row = (y * dst_stride) as usize;

            for x in 0..region.width {
                let linear = row + x as usize * cpp;
                let tiled = surface.pixel_offset(region.x + x, region.y + y) as usize;
                dst[linear..linear + cpp].copy_from_slice(&src[tiled..tiled + cpp]);
            }
        }
    }

    fn store(
        &self,
        dst: &mut [u8],
        surface: &TiledSurface,
        src: &[u8],
        src_stride: u32,
        region: &TransferBox,
    ) {
        let cpp = surface.bytes_per_pixel as usize;

        for y in 0..region.height {
            let row = (y * src_stride) as usize;

            for x in 0..region.width {
                let linear = row + x as usize * cpp;
                let tiled = surface.pixel_offset(region.x + x, region.y + y) as usize;
                dst[tiled..tiled + cpp].copy_from_slice(&src[linear..linear + cpp]);
            }
        }
    }
}

/// Offset of a pixel within its utile. Utiles are stored in raster order.
#[inline]
fn utile_pixel_offset(cpp: u32, x: u32, y: u32) -> u32 {
    let utile_w = utile_width(cpp);

    debug_assert!(x < utile_w && y < utile_height(cpp));

    x * cpp + y * utile_w * cpp
}

/// Utiles in raster order. A row of utiles is `utile_height` rows of the stride.
fn lt_pixel_offset(cpp: u32, stride: u32, x: u32, y: u32) -> u32 {
    let utile_w = utile_width(cpp);
    let utile_h = utile_height(cpp);

    (y / utile_h) * utile_h * stride
        + (x / utile_w) * 64
        + utile_pixel_offset(cpp, x & (utile_w - 1), y & (utile_h - 1))
}

/// UIF blocks in raster order, `columns` blocks per row. Within a block, the four utiles are
/// top-left, top-right, bottom-left, bottom-right.
fn ublinear_pixel_offset(cpp: u32, x: u32, y: u32, columns: u32) -> u32 {
    let utile_w = utile_width(cpp);
    let utile_h = utile_height(cpp);
    let ub_x = x / (utile_w * 2);
    let ub_y = y / (utile_h * 2);

    256 * (ub_y * columns + ub_x)
        + (if x & utile_w != 0 { 64 } else { 0 })
        + (if y & utile_h != 0 { 128 } else { 0 })
        + utile_pixel_offset(cpp, x & (utile_w - 1), y & (utile_h - 1))
}

/// UIF blocks in columns four blocks wide, each column running the full padded height of the
/// image before the next one starts.
fn uif_pixel_offset(cpp: u32, image_height: u32, x: u32, y: u32, xor: bool) -> u32 {
    let utile_w = utile_width(cpp);
    let utile_h = utile_height(cpp);
    let mb_width = utile_w * 2;
    let mb_height = utile_h * 2;

    let mb_x = x / mb_width;
    let mut mb_y = y / mb_height;
    let mb_pixel_x = x % mb_width;
    let mb_pixel_y = y % mb_height;

    if xor && (mb_x / 4) & 1 != 0 {
        mb_y ^= 0x10;
    }

    let mb_column_height = image_height.div_ceil(mb_height);
    let mb_id = (mb_x / 4) * ((mb_column_height - 1) * 4) + mb_x + mb_y * 4;

    let top = mb_pixel_y < utile_h;
    let left = mb_pixel_x < utile_w;
    let mb_tile_offset = (if top { 0 } else { 128 }) + (if left { 0 } else { 64 });

    mb_id * 256
        + mb_tile_offset
        + utile_pixel_offset(cpp, mb_pixel_x & (utile_w - 1), mb_pixel_y & (utile_h - 1))
}
