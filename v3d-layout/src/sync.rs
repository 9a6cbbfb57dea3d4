//! Coordination between CPU access to images and work already submitted to the GPU.
//!
//! Jobs execute asynchronously after submission. Before the CPU reads an image, every job that
//! writes it has to finish; before the CPU writes an image, every job that reads it has to finish.
//! Tracking submitted jobs is not the business of this crate: the embedder implements
//! [`JobTracker`] on top of its own submission bookkeeping, and the transfer engine calls it when
//! an access cannot be proven hazard-free.

use crate::{image::Image, macros::layout_bitflags};

/// Flushes submitted GPU work that touches an image.
///
/// Both flush methods block until the relevant jobs have completed. They must be idempotent:
/// calling them when nothing is in flight is valid and returns immediately.
pub trait JobTracker {
    /// Submits and waits for every job that reads `image`.
    fn flush_jobs_reading_image(&mut self, image: &Image);

    /// Submits and waits for every job that writes `image`.
    fn flush_jobs_writing_image(&mut self, image: &Image);

    /// Called after the backing allocation of an image was replaced, with the pieces of bound
    /// state that referenced the old allocation and must be emitted again.
    ///
    /// The default implementation does nothing.
    #[inline]
    fn mark_dirty(&mut self, dirty: DirtyState) {
        let _ = dirty;
    }
}

impl<T> JobTracker for &mut T
where
    T: JobTracker + ?Sized,
{
    #[inline]
    fn flush_jobs_reading_image(&mut self, image: &Image) {
        (**self).flush_jobs_reading_image(image);
    }

    #[inline]
    fn flush_jobs_writing_image(&mut self, image: &Image) {
        (**self).flush_jobs_writing_image(image);
    }

    #[inline]
    fn mark_dirty(&mut self, dirty: DirtyState) {
        (**self).mark_dirty(dirty);
    }
}

layout_bitflags! {
    /// Pieces of bound pipeline state that have to be re-emitted.
    DirtyState = u32;

    /// The bound vertex buffers.
    VERTEX_BUFFERS = 1 << 0,

    /// The bound constant (uniform) buffers.
    CONSTANT_BUFFERS = 1 << 1,
}

/// A [`JobTracker`] for a context that never submits any work.
///
/// Every flush returns immediately.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoJobs;

impl JobTracker for NoJobs {
    #[inline]
    fn flush_jobs_reading_image(&mut self, _image: &Image) {}

    #[inline]
    fn flush_jobs_writing_image(&mut self, _image: &Image) {}
}
