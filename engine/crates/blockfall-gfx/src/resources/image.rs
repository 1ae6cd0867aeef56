use ash::vk;
use ash::vk::Handle;
use vk_mem::{Alloc, Allocation};

use crate::{error::GfxResult, foundation::debug_messenger::DebugType, gfx_context::GfxContext};

/// Image 来源枚举
pub enum ImageSource {
    /// 由 VMA 分配的 Image
    Allocated(Allocation),
    /// 外部 Image（例如 Swapchain Image），不管理其内存生命周期
    External,
}

pub struct GfxImage {
    handle: vk::Image,
    source: ImageSource,

    extent: vk::Extent3D,
    format: vk::Format,
    usage: vk::ImageUsageFlags,
    samples: vk::SampleCountFlags,
    mip_levels: u32,
    array_layers: u32,

    name: String,
}
// getters
impl GfxImage {
    #[inline]
    pub fn width(&self) -> u32 {
        self.extent.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.extent.height
    }

    #[inline]
    pub fn extent_2d(&self) -> vk::Extent2D {
        vk::Extent2D {
            width: self.extent.width,
            height: self.extent.height,
        }
    }

    #[inline]
    pub fn handle(&self) -> vk::Image {
        self.handle
    }

    #[inline]
    pub fn format(&self) -> vk::Format {
        self.format
    }

    #[inline]
    pub fn usage(&self) -> vk::ImageUsageFlags {
        self.usage
    }

    #[inline]
    pub fn samples(&self) -> vk::SampleCountFlags {
        self.samples
    }

    #[inline]
    pub fn mip_levels(&self) -> u32 {
        self.mip_levels
    }

    #[inline]
    pub fn array_layers(&self) -> u32 {
        self.array_layers
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }
}
// new & init
impl GfxImage {
    pub fn new(
        ctx: &GfxContext,
        image_info: &GfxImageCreateInfo,
        alloc_info: &vk_mem::AllocationCreateInfo,
        debug_name: &str,
    ) -> GfxResult<Self> {
        let (image, alloc) = unsafe { ctx.allocator().create_image(&image_info.as_info(), alloc_info)? };
        let image = Self {
            handle: image,
            source: ImageSource::Allocated(alloc),
            extent: image_info.inner.extent,
            format: image_info.inner.format,
            usage: image_info.inner.usage,
            samples: image_info.inner.samples,
            mip_levels: image_info.inner.mip_levels,
            array_layers: image_info.inner.array_layers,

            name: debug_name.to_string(),
        };
        ctx.device().set_debug_name(&image, debug_name);
        Ok(image)
    }

    /// 包装外部的 image，例如 swapchain image
    pub fn from_external(
        handle: vk::Image,
        extent: vk::Extent2D,
        format: vk::Format,
        usage: vk::ImageUsageFlags,
        name: impl AsRef<str>,
    ) -> Self {
        Self {
            handle,
            source: ImageSource::External,
            extent: extent.into(),
            format,
            usage,
            samples: vk::SampleCountFlags::TYPE_1,
            mip_levels: 1,
            array_layers: 1,
            name: name.as_ref().to_string(),
        }
    }
}
impl DebugType for GfxImage {
    fn debug_type_name() -> &'static str {
        "GfxImage"
    }

    fn vk_handle(&self) -> impl vk::Handle {
        self.handle
    }
}
// destroy
impl GfxImage {
    pub fn destroy(mut self, ctx: &GfxContext) {
        self.destroy_mut(ctx);
    }
    pub fn destroy_mut(&mut self, ctx: &GfxContext) {
        log::debug!("destroying GfxImage: {}", self.name);

        match &mut self.source {
            ImageSource::External => (),
            ImageSource::Allocated(allocation) => unsafe { ctx.allocator().destroy_image(self.handle, allocation) },
        }
        self.handle = vk::Image::null();
    }
}
impl Drop for GfxImage {
    fn drop(&mut self) {
        debug_assert!(self.handle.is_null(), "GfxImage {} must be destroyed manually.", self.name);
    }
}

pub struct GfxImageCreateInfo {
    inner: vk::ImageCreateInfo<'static>,

    queue_family_indices: Vec<u32>,
}
impl GfxImageCreateInfo {
    #[inline]
    pub fn new_image_2d_info(extent: vk::Extent2D, format: vk::Format, usage: vk::ImageUsageFlags) -> Self {
        Self {
            inner: vk::ImageCreateInfo {
                image_type: vk::ImageType::TYPE_2D,
                format,
                extent: extent.into(),
                mip_levels: 1,
                array_layers: 1,
                samples: vk::SampleCountFlags::TYPE_1,
                tiling: vk::ImageTiling::OPTIMAL,
                usage,
                sharing_mode: vk::SharingMode::EXCLUSIVE,
                // 这里只能是 UNDEFINED 或者 PREINITIALIZED
                initial_layout: vk::ImageLayout::UNDEFINED,
                ..Default::default()
            },
            queue_family_indices: Vec::new(),
        }
    }

    /// 6 个 layer 的 cube map，宽高必须相等
    #[inline]
    pub fn new_cube_info(size: u32, format: vk::Format, usage: vk::ImageUsageFlags) -> Self {
        let mut info = Self::new_image_2d_info(
            vk::Extent2D {
                width: size,
                height: size,
            },
            format,
            usage,
        );
        info.inner.array_layers = 6;
        info.inner.flags |= vk::ImageCreateFlags::CUBE_COMPATIBLE;
        info
    }

    #[inline]
    pub fn as_info(&self) -> vk::ImageCreateInfo<'_> {
        self.inner.queue_family_indices(&self.queue_family_indices)
    }

    /// builder
    #[inline]
    pub fn queue_family_indices(mut self, queue_family_indices: &[u32]) -> Self {
        self.queue_family_indices = queue_family_indices.to_vec();
        self.inner.sharing_mode = vk::SharingMode::CONCURRENT;
        self
    }

    /// builder
    #[inline]
    pub fn samples(mut self, samples: vk::SampleCountFlags) -> Self {
        self.inner.samples = samples;
        self
    }

    /// builder
    #[inline]
    pub fn mip_levels(mut self, mip_levels: u32) -> Self {
        self.inner.mip_levels = mip_levels.max(1);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cube_info_has_six_compatible_layers() {
        let info = GfxImageCreateInfo::new_cube_info(64, vk::Format::R16G16B16A16_SFLOAT, vk::ImageUsageFlags::SAMPLED);
        let vk_info = info.as_info();
        assert_eq!(vk_info.array_layers, 6);
        assert!(vk_info.flags.contains(vk::ImageCreateFlags::CUBE_COMPATIBLE));
        assert_eq!(vk_info.extent.width, vk_info.extent.height);
    }

    #[test]
    fn mip_levels_never_drop_below_one() {
        let info = GfxImageCreateInfo::new_image_2d_info(
            vk::Extent2D { width: 4, height: 4 },
            vk::Format::R8G8B8A8_UNORM,
            vk::ImageUsageFlags::SAMPLED,
        )
        .mip_levels(0)
        .samples(vk::SampleCountFlags::TYPE_4);
        assert_eq!(info.as_info().mip_levels, 1);
        assert_eq!(info.as_info().samples, vk::SampleCountFlags::TYPE_4);
    }

    #[test]
    fn external_image_is_released_without_allocator() {
        let image = GfxImage::from_external(
            vk::Image::null(),
            vk::Extent2D { width: 8, height: 8 },
            vk::Format::B8G8R8A8_SRGB,
            vk::ImageUsageFlags::TRANSFER_DST,
            "swapchain-0",
        );
        assert!(matches!(image.source, ImageSource::External));
        assert_eq!(image.extent_2d().width, 8);
    }
}
