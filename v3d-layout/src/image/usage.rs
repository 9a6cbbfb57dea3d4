use crate::macros::layout_bitflags;

layout_bitflags! {
    /// Describes how an image is going to be bound.
    ///
    /// Besides recording intent, some of these flags decide whether the image may be stored in a
    /// tiled layout at all, and which bound state must be re-emitted when its allocation is
    /// replaced.
    ImageUsage = u32;

    /// The image is a buffer that can be bound as a vertex buffer.
    VERTEX_BUFFER = 1 << 0,

    /// The image is a buffer that can be bound as an index buffer.
    INDEX_BUFFER = 1 << 1,

    /// The image is a buffer that can be bound as a constant (uniform) buffer.
    CONSTANT_BUFFER = 1 << 2,

    /// The image can be sampled from in a shader.
    SAMPLED = 1 << 3,

    /// The image can be used as a color render target.
    RENDER_TARGET = 1 << 4,

    /// The image can be used as a depth/stencil render target.
    DEPTH_STENCIL = 1 << 5,

    /// The image must be stored in raster order.
    LINEAR = 1 << 6,

    /// The image is a hardware cursor, which the display engine reads in raster order.
    CURSOR = 1 << 7,

    /// The image can be shared with other processes.
    SHARED = 1 << 8,

    /// The image can be presented by the display engine.
    SCANOUT = 1 << 9,
}
