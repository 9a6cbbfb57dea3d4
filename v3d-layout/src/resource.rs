//! Creating, importing and exporting images, and mapping them for the CPU.
//!
//! The [`ResourceManager`] is the entry point of the crate. It owns the [`MemoryAllocator`] that
//! images are allocated from and the [`TiledImageCodec`] that tiled transfers go through, and it
//! decides at creation time whether an image may be tiled:
//!
//! - Buffers, 1D images and 1D array images are never tiled.
//! - Images with [`ImageUsage::LINEAR`] or [`ImageUsage::CURSOR`] are never tiled.
//! - With [`ResourceManagerCreateInfo::linear_scanout`], images with [`ImageUsage::SHARED`] or
//!   [`ImageUsage::SCANOUT`] are never tiled.
//! - Everything else is tiled, unless the caller passes a list of [format modifiers] that only
//!   allows a linear layout.
//!
//! Imported images must be linear.
//!
//! [format modifiers]: crate::image::modifier

use crate::{
    image::{
        layout::{plan_layout, ImageLayoutPlan, LayoutInfo},
        modifier,
        tiling::{TiledImageCodec, V3dTiling},
        transfer::{self, MapImageError, Transfer, TransferBox, TransferUsage},
        Image, ImageCreateInfo, ImageType, ImageUsage,
    },
    memory::{ExternalHandle, ExternalHandleType, MemoryAllocator, MemoryAllocatorError},
    sync::JobTracker,
    DeviceSize, NonExhaustive,
};
use std::{
    env,
    error::Error,
    fmt::{Display, Error as FmtError, Formatter},
    sync::atomic::{AtomicBool, Ordering},
};

/// The four operations the rest of a driver needs from the image layer.
///
/// Implemented by [`ResourceManager`]; see its methods of the same names.
pub trait ImageTransfers {
    /// Computes the layout of an image without allocating it.
    fn plan_layout(&self, info: &LayoutInfo) -> ImageLayoutPlan;

    /// Creates an image, choosing whether to tile it.
    fn create_image(&self, create_info: ImageCreateInfo) -> Result<Image, CreateImageError>;

    /// Maps a box of one mip level of an image for CPU access.
    fn map<'a>(
        &'a self,
        tracker: &mut dyn JobTracker,
        image: &'a mut Image,
        level: u32,
        usage: TransferUsage,
        region: TransferBox,
    ) -> Result<Transfer<'a>, MapImageError>;

    /// Ends a transfer.
    fn unmap(&self, transfer: Transfer<'_>);
}

/// Parameters to create a new [`ResourceManager`].
#[derive(Clone, Debug)]
pub struct ResourceManagerCreateInfo {
    /// Never tile images that can be shared or scanned out.
    ///
    /// Needed when another driver that doesn't understand the tiled layouts displays the images,
    /// as with the simulator. The default value is `false`.
    pub linear_scanout: bool,

    /// Emit a `debug` event describing every mip level of every image that is created or
    /// imported.
    ///
    /// The default value is `false`.
    pub debug_layout: bool,

    pub _ne: NonExhaustive,
}

impl Default for ResourceManagerCreateInfo {
    #[inline]
    fn default() -> Self {
        ResourceManagerCreateInfo {
            linear_scanout: false,
            debug_layout: false,
            _ne: NonExhaustive(()),
        }
    }
}

impl ResourceManagerCreateInfo {
    /// Reads the configuration from the environment.
    ///
    /// - `V3D_DEBUG` is a comma-separated list of debug options; `surface` enables
    ///   [`debug_layout`](Self::debug_layout).
    /// - `V3D_SIMULATOR` set to `1` or `true` enables [`linear_scanout`](Self::linear_scanout).
    pub fn from_env() -> Self {
        Self::from_vars(
            env::var("V3D_DEBUG").ok().as_deref(),
            env::var("V3D_SIMULATOR").ok().as_deref(),
        )
    }

    fn from_vars(debug: Option<&str>, simulator: Option<&str>) -> Self {
        let debug_layout = debug.is_some_and(|debug| {
            debug
                .split(',')
                .any(|option| option.trim().eq_ignore_ascii_case("surface"))
        });
        let linear_scanout = simulator.is_some_and(|simulator| {
            let simulator = simulator.trim();

            simulator == "1" || simulator.eq_ignore_ascii_case("true")
        });

        ResourceManagerCreateInfo {
            linear_scanout,
            debug_layout,
            ..Default::default()
        }
    }
}

/// Creates images and gives the CPU access to them.
#[derive(Debug)]
pub struct ResourceManager<A, C = V3dTiling> {
    allocator: A,
    codec: C,
    linear_scanout: bool,
    debug_layout: bool,
}

impl<A> ResourceManager<A>
where
    A: MemoryAllocator,
{
    /// Creates a new `ResourceManager` that converts tiled images with [`V3dTiling`].
    #[inline]
    pub fn new(allocator: A, create_info: ResourceManagerCreateInfo) -> Self {
        Self::with_codec(allocator, V3dTiling, create_info)
    }
}

impl<A, C> ResourceManager<A, C>
where
    A: MemoryAllocator,
    C: TiledImageCodec,
{
    /// Creates a new `ResourceManager` that converts tiled images with `codec`.
    pub fn with_codec(allocator: A, codec: C, create_info: ResourceManagerCreateInfo) -> Self {
        let ResourceManagerCreateInfo {
            linear_scanout,
            debug_layout,
            _ne: _,
        } = create_info;

        ResourceManager {
            allocator,
            codec,
            linear_scanout,
            debug_layout,
        }
    }

    /// Returns the allocator images are allocated from.
    #[inline]
    pub fn allocator(&self) -> &A {
        &self.allocator
    }

    /// Returns the codec tiled transfers go through.
    #[inline]
    pub fn codec(&self) -> &C {
        &self.codec
    }

    /// Returns whether an image created with `create_info` may be tiled, before considering
    /// format modifiers.
    pub fn should_tile(&self, create_info: &ImageCreateInfo) -> bool {
        let usage = create_info.usage;

        if matches!(
            create_info.image_type,
            ImageType::Buffer | ImageType::Dim1d | ImageType::Dim1dArray,
        ) {
            return false;
        }

        if usage.intersects(ImageUsage::LINEAR | ImageUsage::CURSOR) {
            return false;
        }

        if self.linear_scanout && usage.intersects(ImageUsage::SHARED | ImageUsage::SCANOUT) {
            return false;
        }

        true
    }

    /// Computes the layout of an image without allocating it.
    ///
    /// # Panics
    ///
    /// - Panics if `info` describes an empty image, or a multisampled image whose format cannot
    ///   be rendered to.
    #[inline]
    pub fn plan_layout(&self, info: &LayoutInfo) -> ImageLayoutPlan {
        plan_layout(info)
    }

    /// Creates an image, letting the manager choose its layout.
    ///
    /// This is the same as [`create_image_with_modifiers`] with a list containing only
    /// [`modifier::INVALID`].
    ///
    /// [`create_image_with_modifiers`]: Self::create_image_with_modifiers
    #[inline]
    pub fn create_image(&self, create_info: ImageCreateInfo) -> Result<Image, CreateImageError> {
        self.create_image_with_modifiers(create_info, &[modifier::INVALID])
    }

    /// Creates an image whose layout must be described by one of `modifiers`.
    ///
    /// The image is tiled if `modifiers` is exactly [`modifier::INVALID`] and tiling is allowed,
    /// or if it contains [`modifier::BROADCOM_VC4_T_TILED`] and tiling is allowed. Otherwise it
    /// is linear if `modifiers` contains [`modifier::LINEAR`].
    pub fn create_image_with_modifiers(
        &self,
        create_info: ImageCreateInfo,
        modifiers: &[u64],
    ) -> Result<Image, CreateImageError> {
        create_info
            .validate()
            .map_err(|problem| CreateImageError::InvalidCreateInfo { problem })?;

        let should_tile = self.should_tile(&create_info);

        let tiled = if modifiers == [modifier::INVALID] {
            should_tile
        } else if should_tile && modifiers.contains(&modifier::BROADCOM_VC4_T_TILED) {
            true
        } else if modifiers.contains(&modifier::LINEAR) {
            false
        } else {
            return Err(CreateImageError::UnsupportedModifier);
        };

        let layout = plan_layout(&create_info.layout_info(tiled));
        let size = layout.allocation_size(create_info.layer_count());
        let memory = self
            .allocator
            .allocate(size, "resource")
            .map_err(CreateImageError::AllocateMemory)?;
        let image = Image::from_parts(create_info, tiled, layout, memory);

        if self.debug_layout {
            image.log_layout("alloc");
        }

        Ok(image)
    }

    /// Creates an image around memory exported by someone else.
    ///
    /// Only linear images at offset 0, shared through a global name or a dma-buf file
    /// descriptor, can be imported. The stride in `handle` must be the one the image would have
    /// if it were created with `create_info`.
    pub fn import_image(
        &self,
        create_info: ImageCreateInfo,
        handle: &ExternalHandle,
    ) -> Result<Image, ImportImageError> {
        create_info
            .validate()
            .map_err(|problem| ImportImageError::InvalidCreateInfo { problem })?;

        if handle.modifier != modifier::LINEAR {
            tracing::warn!(
                modifier = handle.modifier,
                "attempt to import an unsupported modifier",
            );

            return Err(ImportImageError::UnsupportedModifier {
                modifier: handle.modifier,
            });
        }

        if handle.offset != 0 {
            tracing::warn!(
                offset = handle.offset,
                "attempt to import an unsupported offset",
            );

            return Err(ImportImageError::UnsupportedOffset {
                offset: handle.offset,
            });
        }

        if !matches!(
            handle.handle_type,
            ExternalHandleType::Shared | ExternalHandleType::Fd,
        ) {
            tracing::warn!(
                handle_type = ?handle.handle_type,
                "attempt to import an unsupported handle type",
            );

            return Err(ImportImageError::UnsupportedHandleType);
        }

        let memory = self
            .allocator
            .import(handle.handle_type, handle.handle)
            .map_err(ImportImageError::OpenHandle)?;
        let layout = plan_layout(&create_info.layout_info(false));
        let required = layout.slices()[0].stride;
        let [width, height, _] = create_info.extent;
        let format = create_info.format;
        let image = Image::from_parts(create_info, false, layout, memory);

        if self.debug_layout {
            image.log_layout("import");
        }

        if handle.stride != required {
            static WARNED: AtomicBool = AtomicBool::new(false);

            if !WARNED.swap(true, Ordering::Relaxed) {
                tracing::warn!(
                    width,
                    height,
                    ?format,
                    stride = handle.stride,
                    required,
                    "attempt to import an image with an unsupported stride",
                );
            }

            return Err(ImportImageError::UnsupportedStride {
                provided: handle.stride,
                required,
            });
        }

        let size = image.memory().size();
        let required = image.required_size();

        if size < required {
            tracing::warn!(size, required, "attempt to import an allocation that is too small");

            return Err(ImportImageError::AllocationTooSmall { size, required });
        }

        Ok(image)
    }

    /// Exports a handle through which another process or driver can open the memory of `image`.
    ///
    /// From then on, the image's allocation is no longer private, so it is never swapped out when
    /// the image is discarded.
    pub fn export_image(
        &self,
        image: &Image,
        handle_type: ExternalHandleType,
    ) -> Result<ExternalHandle, ExportImageError> {
        let stride = image.slice(0).map_or(0, |slice| slice.stride);
        let handle = image
            .memory()
            .export(handle_type)
            .map_err(ExportImageError::Export)?;

        Ok(ExternalHandle {
            handle_type,
            handle,
            stride,
            offset: 0,
            modifier: if image.is_tiled() {
                modifier::BROADCOM_VC4_T_TILED
            } else {
                modifier::LINEAR
            },
        })
    }

    /// Maps a box of one mip level of `image` for CPU access.
    ///
    /// See [`transfer::map`].
    #[inline]
    pub fn map<'a, T>(
        &'a self,
        tracker: &mut T,
        image: &'a mut Image,
        level: u32,
        usage: TransferUsage,
        region: TransferBox,
    ) -> Result<Transfer<'a>, MapImageError>
    where
        T: JobTracker + ?Sized,
    {
        transfer::map(
            &self.allocator,
            &self.codec,
            tracker,
            image,
            level,
            usage,
            region,
        )
    }

    /// Ends a transfer, writing back what the CPU wrote.
    ///
    /// See [`transfer::unmap`].
    #[inline]
    pub fn unmap(&self, transfer: Transfer<'_>) {
        transfer::unmap(transfer);
    }
}

impl<A, C> ImageTransfers for ResourceManager<A, C>
where
    A: MemoryAllocator,
    C: TiledImageCodec,
{
    #[inline]
    fn plan_layout(&self, info: &LayoutInfo) -> ImageLayoutPlan {
        ResourceManager::plan_layout(self, info)
    }

    #[inline]
    fn create_image(&self, create_info: ImageCreateInfo) -> Result<Image, CreateImageError> {
        ResourceManager::create_image(self, create_info)
    }

    #[inline]
    fn map<'a>(
        &'a self,
        tracker: &mut dyn JobTracker,
        image: &'a mut Image,
        level: u32,
        usage: TransferUsage,
        region: TransferBox,
    ) -> Result<Transfer<'a>, MapImageError> {
        ResourceManager::map(self, tracker, image, level, usage, region)
    }

    #[inline]
    fn unmap(&self, transfer: Transfer<'_>) {
        ResourceManager::unmap(self, transfer);
    }
}

/// Error that can happen when creating an image.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CreateImageError {
    /// The create info doesn't describe a valid image.
    InvalidCreateInfo { problem: &'static str },

    /// None of the requested modifiers can be used for the image.
    UnsupportedModifier,

    /// Allocating memory for the image failed.
    AllocateMemory(MemoryAllocatorError),
}

impl Error for CreateImageError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::AllocateMemory(err) => Some(err),
            _ => None,
        }
    }
}

impl Display for CreateImageError {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), FmtError> {
        match self {
            Self::InvalidCreateInfo { problem } => write!(f, "invalid image: {problem}"),
            Self::UnsupportedModifier => {
                write!(f, "none of the requested modifiers is supported for this image")
            }
            Self::AllocateMemory(_) => write!(f, "allocating memory for the image failed"),
        }
    }
}

/// Error that can happen when importing an image.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ImportImageError {
    /// The create info doesn't describe a valid image.
    InvalidCreateInfo { problem: &'static str },

    /// The handle's modifier is not [`modifier::LINEAR`].
    UnsupportedModifier { modifier: u64 },

    /// The handle's offset is not 0.
    UnsupportedOffset { offset: u32 },

    /// Only global names and dma-buf file descriptors can be imported.
    UnsupportedHandleType,

    /// Opening the handle failed.
    OpenHandle(MemoryAllocatorError),

    /// The handle's stride doesn't match the layout of the image.
    UnsupportedStride { provided: u32, required: u32 },

    /// The opened allocation is smaller than the layout of the image requires.
    AllocationTooSmall {
        size: DeviceSize,
        required: DeviceSize,
    },
}

impl Error for ImportImageError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::OpenHandle(err) => Some(err),
            _ => None,
        }
    }
}

impl Display for ImportImageError {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), FmtError> {
        match self {
            Self::InvalidCreateInfo { problem } => write!(f, "invalid image: {problem}"),
            Self::UnsupportedModifier { modifier } => {
                write!(f, "images with modifier {modifier:#x} cannot be imported")
            }
            Self::UnsupportedOffset { offset } => {
                write!(f, "images at offset {offset} cannot be imported")
            }
            Self::UnsupportedHandleType => {
                write!(f, "images cannot be imported from this type of handle")
            }
            Self::OpenHandle(_) => write!(f, "opening the handle failed"),
            Self::UnsupportedStride { provided, required } => write!(
                f,
                "the handle has a stride of {provided} bytes, but the image requires {required}",
            ),
            Self::AllocationTooSmall { size, required } => write!(
                f,
                "the handle refers to {size} bytes, but the image requires {required}",
            ),
        }
    }
}

/// Error that can happen when exporting an image.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExportImageError {
    /// Creating the handle failed.
    Export(MemoryAllocatorError),
}

impl Error for ExportImageError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Export(err) => Some(err),
        }
    }
}

impl Display for ExportImageError {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), FmtError> {
        match self {
            Self::Export(_) => write!(f, "exporting a handle to the image failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        format::Format,
        image::layout::TilingMode,
        memory::host::HostMemoryAllocator,
        sync::NoJobs,
        tests::RecordingTracker,
    };

    fn rgba(extent: [u32; 2]) -> ImageCreateInfo {
        ImageCreateInfo {
            extent: [extent[0], extent[1], 1],
            ..Default::default()
        }
    }

    #[test]
    fn tiling_eligibility() {
        let manager = manager!();
        let cases = [
            (rgba([64, 64]), true),
            (
                ImageCreateInfo {
                    image_type: ImageType::Buffer,
                    format: Format::R8_UNORM,
                    extent: [4096, 1, 1],
                    ..Default::default()
                },
                false,
            ),
            (
                ImageCreateInfo {
                    image_type: ImageType::Dim1dArray,
                    array_layers: 4,
                    ..rgba([64, 1])
                },
                false,
            ),
            (
                ImageCreateInfo {
                    usage: ImageUsage::CURSOR,
                    ..rgba([64, 64])
                },
                false,
            ),
            (
                ImageCreateInfo {
                    usage: ImageUsage::LINEAR | ImageUsage::SAMPLED,
                    ..rgba([64, 64])
                },
                false,
            ),
            (
                ImageCreateInfo {
                    usage: ImageUsage::SCANOUT | ImageUsage::RENDER_TARGET,
                    ..rgba([64, 64])
                },
                true,
            ),
        ];

        for (create_info, tiled) in cases {
            let image = manager.create_image(create_info).unwrap();

            assert_eq!(image.is_tiled(), tiled, "{:?}", image.image_type());
            assert!(image.memory().size() >= image.required_size());
        }
    }

    #[test]
    fn linear_scanout_forces_shared_images_linear() {
        let manager = manager!(ResourceManagerCreateInfo {
            linear_scanout: true,
            debug_layout: true,
            ..Default::default()
        });

        for usage in [ImageUsage::SHARED, ImageUsage::SCANOUT] {
            let image = manager
                .create_image(ImageCreateInfo {
                    usage,
                    ..rgba([256, 256])
                })
                .unwrap();

            assert!(!image.is_tiled());
            assert_eq!(image.slice(0).unwrap().tiling, TilingMode::Raster);
        }

        let image = manager
            .create_image(ImageCreateInfo {
                usage: ImageUsage::SAMPLED,
                ..rgba([256, 256])
            })
            .unwrap();
        assert!(image.is_tiled());
    }

    #[test]
    fn modifier_negotiation() {
        let manager = manager!();
        let tiled_or_linear = [modifier::LINEAR, modifier::BROADCOM_VC4_T_TILED];

        let image = manager
            .create_image_with_modifiers(rgba([64, 64]), &tiled_or_linear)
            .unwrap();
        assert!(image.is_tiled());

        let image = manager
            .create_image_with_modifiers(rgba([64, 64]), &[modifier::LINEAR])
            .unwrap();
        assert!(!image.is_tiled());

        let cursor = ImageCreateInfo {
            usage: ImageUsage::CURSOR,
            ..rgba([64, 64])
        };
        let image = manager
            .create_image_with_modifiers(cursor.clone(), &tiled_or_linear)
            .unwrap();
        assert!(!image.is_tiled());

        assert_eq!(
            manager
                .create_image_with_modifiers(cursor, &[modifier::BROADCOM_VC4_T_TILED])
                .unwrap_err(),
            CreateImageError::UnsupportedModifier,
        );
        assert_eq!(
            manager
                .create_image_with_modifiers(rgba([64, 64]), &[])
                .unwrap_err(),
            CreateImageError::UnsupportedModifier,
        );
    }

    #[test]
    fn allocation_failure_is_reported() {
        let manager = ResourceManager::new(
            HostMemoryAllocator::with_capacity(4096),
            ResourceManagerCreateInfo::default(),
        );

        let err = manager.create_image(rgba([1024, 1024])).unwrap_err();

        assert_eq!(
            err,
            CreateImageError::AllocateMemory(MemoryAllocatorError::OutOfDeviceMemory),
        );
        assert!(err.source().is_some());
        assert_eq!(manager.allocator().used(), 0);
    }

    #[test]
    fn invalid_create_info_is_rejected() {
        let manager = manager!();

        assert!(matches!(
            manager.create_image(rgba([0, 16])),
            Err(CreateImageError::InvalidCreateInfo { .. }),
        ));
        assert!(matches!(
            manager.create_image(ImageCreateInfo {
                format: Format::R32G32B32A32_SFLOAT,
                ..rgba([70000, 70000])
            }),
            Err(CreateImageError::InvalidCreateInfo { .. }),
        ));
        assert_eq!(manager.allocator().used(), 0);
    }

    #[test]
    fn export_then_import() {
        let manager = manager!(ResourceManagerCreateInfo {
            debug_layout: true,
            ..Default::default()
        });
        let create_info = ImageCreateInfo {
            usage: ImageUsage::LINEAR | ImageUsage::SHARED,
            ..rgba([100, 20])
        };
        let mut original = manager.create_image(create_info.clone()).unwrap();

        let pixels: Vec<u32> = (0..100 * 20).collect();
        let mut transfer = manager
            .map(
                &mut NoJobs,
                &mut original,
                0,
                TransferUsage::WRITE,
                TransferBox::whole([100, 20, 1]),
            )
            .unwrap();
        transfer
            .as_mut_slice()
            .copy_from_slice(bytemuck::cast_slice(&pixels));
        manager.unmap(transfer);

        let handle = manager
            .export_image(&original, ExternalHandleType::Fd)
            .unwrap();
        assert!(!original.memory().is_private());
        assert_eq!(handle.stride, 400);
        assert_eq!(handle.modifier, modifier::LINEAR);

        let mut imported = manager.import_image(create_info, &handle).unwrap();
        assert!(!imported.memory().is_private());

        let transfer = manager
            .map(
                &mut NoJobs,
                &mut imported,
                0,
                TransferUsage::READ,
                TransferBox::whole([100, 20, 1]),
            )
            .unwrap();
        assert_eq!(transfer.as_slice(), bytemuck::cast_slice::<u32, u8>(&pixels));
    }

    #[test]
    fn export_reports_tiled_modifier() {
        let manager = manager!();
        let image = manager.create_image(rgba([64, 64])).unwrap();

        for handle_type in [
            ExternalHandleType::Kms,
            ExternalHandleType::Shared,
            ExternalHandleType::Fd,
        ] {
            let handle = manager.export_image(&image, handle_type).unwrap();

            assert_eq!(handle.handle_type, handle_type);
            assert_eq!(handle.modifier, modifier::BROADCOM_VC4_T_TILED);
            assert_eq!(handle.stride, image.slice(0).unwrap().stride);
        }
    }

    #[test]
    fn import_rejections() {
        let manager = manager!();
        let exported = manager
            .create_image(ImageCreateInfo {
                usage: ImageUsage::LINEAR,
                ..rgba([64, 64])
            })
            .unwrap();
        let handle = manager
            .export_image(&exported, ExternalHandleType::Shared)
            .unwrap();

        let cases = [
            (
                ExternalHandle {
                    modifier: modifier::BROADCOM_VC4_T_TILED,
                    ..handle
                },
                ImportImageError::UnsupportedModifier {
                    modifier: modifier::BROADCOM_VC4_T_TILED,
                },
            ),
            (
                ExternalHandle {
                    offset: 256,
                    ..handle
                },
                ImportImageError::UnsupportedOffset { offset: 256 },
            ),
            (
                ExternalHandle {
                    handle_type: ExternalHandleType::Kms,
                    ..handle
                },
                ImportImageError::UnsupportedHandleType,
            ),
            (
                ExternalHandle {
                    handle: handle.handle + 1000,
                    ..handle
                },
                ImportImageError::OpenHandle(MemoryAllocatorError::UnknownHandle),
            ),
            (
                ExternalHandle {
                    stride: 512,
                    ..handle
                },
                ImportImageError::UnsupportedStride {
                    provided: 512,
                    required: 256,
                },
            ),
        ];

        for (handle, expected) in cases {
            assert_eq!(
                manager.import_image(rgba([64, 64]), &handle).unwrap_err(),
                expected,
            );
        }

        // The rejected imports must not have kept the memory alive.
        let used = manager.allocator().used();
        drop(exported);
        assert!(manager.allocator().used() < used);
    }

    #[test]
    fn import_of_short_allocation_is_rejected() {
        let manager = manager!();
        let create_info = ImageCreateInfo {
            usage: ImageUsage::LINEAR,
            ..rgba([64, 4])
        };
        let exported = manager.create_image(create_info).unwrap();
        let handle = manager
            .export_image(&exported, ExternalHandleType::Fd)
            .unwrap();
        assert_eq!(handle.stride, 256);

        let err = manager.import_image(rgba([64, 64]), &handle).unwrap_err();

        assert_eq!(
            err,
            ImportImageError::AllocationTooSmall {
                size: 2047,
                required: 32767,
            },
        );
    }

    #[test]
    fn capability_trait_is_object_safe() {
        let manager = manager!();
        let transfers: &dyn ImageTransfers = &manager;
        let mut tracker = RecordingTracker::default();

        let plan = transfers.plan_layout(&LayoutInfo {
            extent: [130, 130, 1],
            ..Default::default()
        });
        let mut image = transfers.create_image(rgba([130, 130])).unwrap();
        assert_eq!(image.layout(), &plan);

        let transfer = transfers
            .map(
                &mut tracker,
                &mut image,
                0,
                TransferUsage::READ,
                TransferBox::whole([130, 130, 1]),
            )
            .unwrap();
        transfers.unmap(transfer);

        assert_eq!(tracker.writer_flushes, [image.id()]);
    }

    #[test]
    fn config_from_environment_values() {
        let create_info = ResourceManagerCreateInfo::from_vars(Some("perf, surface"), Some("1"));
        assert!(create_info.debug_layout);
        assert!(create_info.linear_scanout);

        let create_info = ResourceManagerCreateInfo::from_vars(Some("perf"), Some("0"));
        assert!(!create_info.debug_layout);
        assert!(!create_info.linear_scanout);

        let create_info = ResourceManagerCreateInfo::from_vars(None, Some("TRUE"));
        assert!(!create_info.debug_layout);
        assert!(create_info.linear_scanout);
    }
}
