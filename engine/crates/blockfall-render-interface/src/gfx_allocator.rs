use ash::vk;
use blockfall_gfx::{
    error::GfxResult,
    gfx_context::GfxContext,
    resources::{
        buffer::GfxBuffer,
        image::{GfxImage, GfxImageCreateInfo},
        image_view::{GfxImageView, GfxImageViewDesc},
    },
};

use crate::resource_pool::{
    allocator::PoolAllocator,
    desc::{BufferDesc, BufferMemory, ImageDesc, ImageKind},
};

/// 资源池中的一张图像，以及创建时一起建好的 view
pub struct GfxPooledImage {
    image: GfxImage,
    /// 采样以及作为 attachment 时使用，cube 为 CUBE 类型
    view: GfxImageView,
    /// 仅 cube 有：把 6 个面看作 2D array，供 compute shader 写入
    array_view: Option<GfxImageView>,
}
// getters
impl GfxPooledImage {
    #[inline]
    pub fn image(&self) -> &GfxImage {
        &self.image
    }
    #[inline]
    pub fn handle(&self) -> vk::Image {
        self.image.handle()
    }
    #[inline]
    pub fn view(&self) -> vk::ImageView {
        self.view.handle()
    }
    /// storage image 写入时使用的 view
    #[inline]
    pub fn storage_view(&self) -> vk::ImageView {
        self.array_view.as_ref().map_or(self.view.handle(), |view| view.handle())
    }
    #[inline]
    pub fn extent(&self) -> vk::Extent2D {
        self.image.extent_2d()
    }
    #[inline]
    pub fn format(&self) -> vk::Format {
        self.image.format()
    }
}

impl PoolAllocator for GfxContext {
    type Image = GfxPooledImage;
    type Buffer = GfxBuffer;

    fn create_image(&self, name: &str, desc: &ImageDesc) -> GfxResult<Self::Image> {
        let _span = tracy_client::span!("GfxContext::create_image");

        let image_info = match desc.kind {
            ImageKind::ImageCube => GfxImageCreateInfo::new_cube_info(desc.extent.width, desc.format, desc.usage),
            ImageKind::Image2D | ImageKind::ImageMultisample { .. } => {
                GfxImageCreateInfo::new_image_2d_info(desc.extent, desc.format, desc.usage).samples(desc.samples())
            }
        }
        .mip_levels(desc.mip_levels);
        let alloc_info = vk_mem::AllocationCreateInfo {
            usage: vk_mem::MemoryUsage::AutoPreferDevice,
            ..Default::default()
        };
        let mut image = GfxImage::new(self, &image_info, &alloc_info, name)?;

        let mip_levels = desc.mip_levels.min(u8::MAX as u32) as u8;
        let view_desc = match desc.kind {
            ImageKind::ImageCube => GfxImageViewDesc::new_cube(desc.format, mip_levels),
            _ => GfxImageViewDesc::new(
                desc.format,
                vk::ImageViewType::TYPE_2D,
                desc.aspect(),
                (0, mip_levels),
                (0, 1),
            ),
        };
        let view = match GfxImageView::new(self, image.handle(), view_desc, name) {
            Ok(view) => view,
            Err(e) => {
                image.destroy_mut(self);
                return Err(e);
            }
        };

        let array_view = if desc.kind == ImageKind::ImageCube && desc.usage.contains(vk::ImageUsageFlags::STORAGE) {
            let array_desc = GfxImageViewDesc::new_cube_as_array(desc.format, 0);
            match GfxImageView::new(self, image.handle(), array_desc, format!("{name}-array")) {
                Ok(view) => Some(view),
                Err(e) => {
                    view.destroy(self);
                    image.destroy_mut(self);
                    return Err(e);
                }
            }
        } else {
            None
        };

        Ok(GfxPooledImage {
            image,
            view,
            array_view,
        })
    }

    fn create_buffer(&self, name: &str, desc: &BufferDesc) -> GfxResult<Self::Buffer> {
        let _span = tracy_client::span!("GfxContext::create_buffer");
        let mem_map = desc.memory == BufferMemory::HostVisible;
        GfxBuffer::new(self, desc.size, desc.usage, None, mem_map, name)
    }

    fn destroy_image(&self, image: Self::Image) {
        let GfxPooledImage {
            image,
            view,
            array_view,
        } = image;
        if let Some(array_view) = array_view {
            array_view.destroy(self);
        }
        view.destroy(self);
        image.destroy(self);
    }

    fn destroy_buffer(&self, buffer: Self::Buffer) {
        buffer.destroy(self);
    }

    fn rename_image(&self, image: &Self::Image, name: &str) {
        self.device().set_debug_name(&image.image, name);
        self.device().set_debug_name(&image.view, name);
    }

    fn rename_buffer(&self, buffer: &Self::Buffer, name: &str) {
        self.device().set_debug_name(buffer, name);
    }
}
