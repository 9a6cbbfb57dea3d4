//! Pixel formats understood by the layout planner.
//!
//! The planner does not decode pixel data. What it needs from a format is how many bytes one
//! *block* occupies, how many pixels wide and high a block is, and, for multisampled render
//! targets, how wide the tile buffer's internal representation is.
//!
//! # Block-compressed formats
//!
//! For uncompressed formats a block is a single pixel. Compressed formats encode a block of
//! pixels (4×4 for ETC2 and BC, up to 8×8 for some ASTC variants) into a fixed number of bytes.
//! All layout arithmetic happens in block units: a level's pixel extent is divided by the block
//! extent, rounding up, before tiling is chosen. Compressed formats cannot be rendered to, so they
//! cannot be multisampled either.
//!
//! # Render-target internal formats
//!
//! When the V3D tile buffer stores a color attachment it widens every pixel to one of three lane
//! sizes: 32, 64 or 128 bits. A multisampled image stores the tile buffer's representation
//! directly, so its bytes per pixel come from [`Format::render_target_bpp`] instead of
//! [`Format::block_size`].

macro_rules! formats {
    {
        $(
            $(#[doc = $doc:literal])*
            $name:ident {
                block_size: $block_size:expr,
                block_extent: [$bw:expr, $bh:expr],
                aspects: $aspects:ident,
                compression: $compression:expr,
                render_target: $rt:expr,
            },
        )+
    } => {
        /// An enumeration of all the supported formats.
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
        #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
        #[allow(non_camel_case_types)]
        #[non_exhaustive]
        pub enum Format {
            $(
                $(#[doc = $doc])*
                $name,
            )+
        }

        impl Format {
            /// Returns the number of bytes one block of this format occupies.
            ///
            /// For uncompressed formats this is the number of bytes per pixel.
            #[inline]
            pub const fn block_size(self) -> u32 {
                match self {
                    $(Self::$name => $block_size,)+
                }
            }

            /// Returns the extent in pixels of a single block of this format.
            ///
            /// This is `[1, 1, 1]` for uncompressed formats.
            #[inline]
            pub const fn block_extent(self) -> [u32; 3] {
                match self {
                    $(Self::$name => [$bw, $bh, 1],)+
                }
            }

            /// Returns which aspects the format has.
            #[inline]
            pub const fn aspects(self) -> FormatAspects {
                match self {
                    $(Self::$name => FormatAspects::$aspects,)+
                }
            }

            /// Returns the block compression scheme of the format, if any.
            #[inline]
            pub const fn compression(self) -> Option<CompressionType> {
                match self {
                    $(Self::$name => $compression,)+
                }
            }

            /// Returns the tile buffer representation the hardware uses when rendering to this
            /// format, or `None` if the format cannot be a render target.
            #[inline]
            pub const fn render_target(self) -> Option<(InternalType, InternalBpp)> {
                match self {
                    $(Self::$name => $rt,)+
                }
            }
        }
    };
}

use InternalBpp::*;
use InternalType::*;

formats! {
    /// A single 8-bit normalized channel.
    R8_UNORM {
        block_size: 1,
        block_extent: [1, 1],
        aspects: COLOR,
        compression: None,
        render_target: Some((Type8, Bpp32)),
    },
    /// A single 8-bit unsigned integer channel.
    R8_UINT {
        block_size: 1,
        block_extent: [1, 1],
        aspects: COLOR,
        compression: None,
        render_target: Some((Type8ui, Bpp32)),
    },
    /// Two 8-bit normalized channels.
    R8G8_UNORM {
        block_size: 2,
        block_extent: [1, 1],
        aspects: COLOR,
        compression: None,
        render_target: Some((Type8, Bpp32)),
    },
    /// Packed 5-6-5 normalized color.
    R5G6B5_UNORM_PACK16 {
        block_size: 2,
        block_extent: [1, 1],
        aspects: COLOR,
        compression: None,
        render_target: Some((Type8, Bpp32)),
    },
    /// A single 16-bit float channel.
    R16_SFLOAT {
        block_size: 2,
        block_extent: [1, 1],
        aspects: COLOR,
        compression: None,
        render_target: Some((Type16f, Bpp32)),
    },
    /// Four 8-bit normalized channels.
    R8G8B8A8_UNORM {
        block_size: 4,
        block_extent: [1, 1],
        aspects: COLOR,
        compression: None,
        render_target: Some((Type8, Bpp32)),
    },
    /// Four 8-bit sRGB-encoded channels.
    R8G8B8A8_SRGB {
        block_size: 4,
        block_extent: [1, 1],
        aspects: COLOR,
        compression: None,
        render_target: Some((Type8, Bpp32)),
    },
    /// Four 8-bit unsigned integer channels.
    R8G8B8A8_UINT {
        block_size: 4,
        block_extent: [1, 1],
        aspects: COLOR,
        compression: None,
        render_target: Some((Type8ui, Bpp32)),
    },
    /// Four 8-bit normalized channels in BGRA order.
    B8G8R8A8_UNORM {
        block_size: 4,
        block_extent: [1, 1],
        aspects: COLOR,
        compression: None,
        render_target: Some((Type8, Bpp32)),
    },
    /// Two 16-bit float channels.
    R16G16_SFLOAT {
        block_size: 4,
        block_extent: [1, 1],
        aspects: COLOR,
        compression: None,
        render_target: Some((Type16f, Bpp32)),
    },
    /// A single 32-bit float channel.
    R32_SFLOAT {
        block_size: 4,
        block_extent: [1, 1],
        aspects: COLOR,
        compression: None,
        render_target: Some((Type32f, Bpp32)),
    },
    /// A single 32-bit unsigned integer channel.
    R32_UINT {
        block_size: 4,
        block_extent: [1, 1],
        aspects: COLOR,
        compression: None,
        render_target: Some((Type32ui, Bpp32)),
    },
    /// Four 16-bit float channels.
    R16G16B16A16_SFLOAT {
        block_size: 8,
        block_extent: [1, 1],
        aspects: COLOR,
        compression: None,
        render_target: Some((Type16f, Bpp64)),
    },
    /// Four 16-bit unsigned integer channels.
    R16G16B16A16_UINT {
        block_size: 8,
        block_extent: [1, 1],
        aspects: COLOR,
        compression: None,
        render_target: Some((Type16ui, Bpp64)),
    },
    /// Two 32-bit float channels.
    R32G32_SFLOAT {
        block_size: 8,
        block_extent: [1, 1],
        aspects: COLOR,
        compression: None,
        render_target: Some((Type32f, Bpp64)),
    },
    /// Four 32-bit float channels.
    R32G32B32A32_SFLOAT {
        block_size: 16,
        block_extent: [1, 1],
        aspects: COLOR,
        compression: None,
        render_target: Some((Type32f, Bpp128)),
    },
    /// Four 32-bit unsigned integer channels.
    R32G32B32A32_UINT {
        block_size: 16,
        block_extent: [1, 1],
        aspects: COLOR,
        compression: None,
        render_target: Some((Type32ui, Bpp128)),
    },
    /// 16-bit normalized depth.
    D16_UNORM {
        block_size: 2,
        block_extent: [1, 1],
        aspects: DEPTH,
        compression: None,
        render_target: Some((Depth16, Bpp32)),
    },
    /// 24-bit normalized depth in the low bits of a 32-bit word.
    X8_D24_UNORM_PACK32 {
        block_size: 4,
        block_extent: [1, 1],
        aspects: DEPTH,
        compression: None,
        render_target: Some((Depth24, Bpp32)),
    },
    /// 24-bit normalized depth with 8-bit stencil.
    D24_UNORM_S8_UINT {
        block_size: 4,
        block_extent: [1, 1],
        aspects: DEPTH_STENCIL,
        compression: None,
        render_target: Some((Depth24, Bpp32)),
    },
    /// 32-bit float depth.
    D32_SFLOAT {
        block_size: 4,
        block_extent: [1, 1],
        aspects: DEPTH,
        compression: None,
        render_target: Some((Depth32f, Bpp32)),
    },
    /// 32-bit float depth with 8-bit stencil and 24 unused bits.
    ///
    /// The hardware cannot store this combined. The stencil lives in a separate [`S8_UINT`]
    /// image, see [`Image::set_stencil`].
    ///
    /// [`S8_UINT`]: Format::S8_UINT
    /// [`Image::set_stencil`]: crate::image::Image::set_stencil
    D32_SFLOAT_S8_UINT {
        block_size: 8,
        block_extent: [1, 1],
        aspects: DEPTH_STENCIL,
        compression: None,
        render_target: Some((Depth32f, Bpp32)),
    },
    /// 8-bit stencil.
    S8_UINT {
        block_size: 1,
        block_extent: [1, 1],
        aspects: STENCIL,
        compression: None,
        render_target: Some((Depth24, Bpp32)),
    },
    /// ETC2 RGB, 4×4 blocks of 8 bytes.
    ETC2_R8G8B8_UNORM_BLOCK {
        block_size: 8,
        block_extent: [4, 4],
        aspects: COLOR,
        compression: Some(CompressionType::ETC2),
        render_target: None,
    },
    /// ETC2 RGBA, 4×4 blocks of 16 bytes.
    ETC2_R8G8B8A8_UNORM_BLOCK {
        block_size: 16,
        block_extent: [4, 4],
        aspects: COLOR,
        compression: Some(CompressionType::ETC2),
        render_target: None,
    },
    /// BC1 RGBA, 4×4 blocks of 8 bytes.
    BC1_RGBA_UNORM_BLOCK {
        block_size: 8,
        block_extent: [4, 4],
        aspects: COLOR,
        compression: Some(CompressionType::BC),
        render_target: None,
    },
    /// BC3 RGBA, 4×4 blocks of 16 bytes.
    BC3_UNORM_BLOCK {
        block_size: 16,
        block_extent: [4, 4],
        aspects: COLOR,
        compression: Some(CompressionType::BC),
        render_target: None,
    },
    /// ASTC LDR, 4×4 blocks of 16 bytes.
    ASTC_4x4_UNORM_BLOCK {
        block_size: 16,
        block_extent: [4, 4],
        aspects: COLOR,
        compression: Some(CompressionType::ASTC_LDR),
        render_target: None,
    },
    /// ASTC LDR, 8×8 blocks of 16 bytes.
    ASTC_8x8_UNORM_BLOCK {
        block_size: 16,
        block_extent: [8, 8],
        aspects: COLOR,
        compression: Some(CompressionType::ASTC_LDR),
        render_target: None,
    },
}

impl Format {
    /// Returns the number of bytes per pixel of a multisampled image of this format, which is the
    /// width of the tile buffer's internal representation.
    ///
    /// Returns `None` if the format cannot be rendered to.
    #[inline]
    pub const fn render_target_bpp(self) -> Option<u32> {
        match self.render_target() {
            Some((_, bpp)) => Some(bpp.bytes()),
            None => None,
        }
    }

    /// Returns whether the format has a depth or a stencil aspect.
    #[inline]
    pub const fn is_depth_or_stencil(self) -> bool {
        !matches!(self.aspects(), FormatAspects::COLOR)
    }

    /// Returns whether the format is block-compressed.
    #[inline]
    pub const fn is_compressed(self) -> bool {
        self.compression().is_some()
    }
}

/// The aspects present in a format.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[allow(non_camel_case_types)]
pub enum FormatAspects {
    COLOR,
    DEPTH,
    STENCIL,
    DEPTH_STENCIL,
}

/// The block compression scheme used in a format.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[allow(non_camel_case_types)]
pub enum CompressionType {
    /// Adaptive Scalable Texture Compression, low dynamic range.
    ASTC_LDR,
    /// S3TC Block Compression.
    BC,
    /// Ericsson Texture Compression 2.
    ETC2,
}

/// The numeric representation of pixels in the tile buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum InternalType {
    Type8i,
    Type8ui,
    Type8,
    Type16i,
    Type16ui,
    Type16f,
    Type32i,
    Type32ui,
    Type32f,
    Depth16,
    Depth24,
    Depth32f,
}

/// The width of one pixel in the tile buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum InternalBpp {
    Bpp32,
    Bpp64,
    Bpp128,
}

impl InternalBpp {
    /// Returns the width in bytes.
    #[inline]
    pub const fn bytes(self) -> u32 {
        match self {
            InternalBpp::Bpp32 => 4,
            InternalBpp::Bpp64 => 8,
            InternalBpp::Bpp128 => 16,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uncompressed_blocks_are_single_pixels() {
        assert_eq!(Format::R8G8B8A8_UNORM.block_extent(), [1, 1, 1]);
        assert_eq!(Format::R8G8B8A8_UNORM.block_size(), 4);
        assert_eq!(Format::R32G32B32A32_SFLOAT.block_size(), 16);
        assert!(!Format::R8_UNORM.is_compressed());
    }

    #[test]
    fn compressed_block_extent() {
        assert_eq!(Format::ETC2_R8G8B8_UNORM_BLOCK.block_extent(), [4, 4, 1]);
        assert_eq!(Format::ASTC_8x8_UNORM_BLOCK.block_extent(), [8, 8, 1]);
        assert_eq!(Format::BC3_UNORM_BLOCK.block_size(), 16);
        assert!(Format::BC1_RGBA_UNORM_BLOCK.render_target_bpp().is_none());
    }

    #[test]
    fn render_target_bpp_follows_internal_width() {
        assert_eq!(Format::R8_UNORM.render_target_bpp(), Some(4));
        assert_eq!(Format::R16G16B16A16_SFLOAT.render_target_bpp(), Some(8));
        assert_eq!(Format::R32G32_SFLOAT.render_target_bpp(), Some(8));
        assert_eq!(Format::R32G32B32A32_UINT.render_target_bpp(), Some(16));
        assert_eq!(Format::D16_UNORM.render_target_bpp(), Some(4));
    }

    #[test]
    fn depth_stencil_classification() {
        assert!(Format::D24_UNORM_S8_UINT.is_depth_or_stencil());
        assert!(Format::S8_UINT.is_depth_or_stencil());
        assert!(!Format::B8G8R8A8_UNORM.is_depth_or_stencil());
    }
}
