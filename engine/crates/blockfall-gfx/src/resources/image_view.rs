use ash::vk;
use ash::vk::Handle;

use crate::{error::GfxResult, foundation::debug_messenger::DebugType, gfx_context::GfxContext};

pub struct GfxImageView {
    handle: vk::ImageView,

    desc: GfxImageViewDesc,

    name: String,
}
impl DebugType for GfxImageView {
    fn debug_type_name() -> &'static str {
        "GfxImageView"
    }

    fn vk_handle(&self) -> impl vk::Handle {
        self.handle
    }
}
// new & init
impl GfxImageView {
    pub fn new(ctx: &GfxContext, image: vk::Image, view_desc: GfxImageViewDesc, name: impl AsRef<str>) -> GfxResult<Self> {
        let info = vk::ImageViewCreateInfo {
            image,
            view_type: view_desc.view_type,
            format: view_desc.format,
            subresource_range: view_desc.subresource_range(),
            ..Default::default()
        };

        let handle = unsafe { ctx.device().create_image_view(&info, None)? };
        let image_view = Self {
            handle,
            desc: view_desc,
            name: name.as_ref().to_string(),
        };
        ctx.device().set_debug_name(&image_view, &name);
        Ok(image_view)
    }
}
// destroy
impl GfxImageView {
    pub fn destroy(mut self, ctx: &GfxContext) {
        self.destroy_mut(ctx);
    }
    pub fn destroy_mut(&mut self, ctx: &GfxContext) {
        unsafe {
            ctx.device().destroy_image_view(self.handle, None);
        }
        self.handle = vk::ImageView::null();
    }
}
impl Drop for GfxImageView {
    fn drop(&mut self) {
        debug_assert!(self.handle.is_null(), "GfxImageView {} must be destroyed manually.", self.name);
    }
}
// getters
impl GfxImageView {
    #[inline]
    pub fn handle(&self) -> vk::ImageView {
        self.handle
    }
    #[inline]
    pub fn desc(&self) -> &GfxImageViewDesc {
        &self.desc
    }
}
impl std::fmt::Display for GfxImageView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ImageView({}, {:?})", self.name, self.handle)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct GfxImageViewDesc {
    /// format 可以基于 vk::Image 重解释
    pub(crate) format: vk::Format,
    pub(crate) view_type: vk::ImageViewType,
    pub(crate) aspect_mask: vk::ImageAspectFlags,
    /// base mip level 和 mip level count
    pub(crate) mip: (u8, u8),
    /// base layer 和 layer count
    pub(crate) layer: (u8, u8),
}
impl GfxImageViewDesc {
    pub fn new_2d(format: vk::Format, aspect: vk::ImageAspectFlags) -> Self {
        Self {
            format,
            view_type: vk::ImageViewType::TYPE_2D,
            aspect_mask: aspect,
            mip: (0, 1),
            layer: (0, 1),
        }
    }

    /// 覆盖全部 6 个面
    pub fn new_cube(format: vk::Format, mip_levels: u8) -> Self {
        Self {
            format,
            view_type: vk::ImageViewType::CUBE,
            aspect_mask: vk::ImageAspectFlags::COLOR,
            mip: (0, mip_levels.max(1)),
            layer: (0, 6),
        }
    }

    /// 把 cube 的 6 个面视为 2D array，用于 compute shader 写入
    pub fn new_cube_as_array(format: vk::Format, mip: u8) -> Self {
        Self {
            format,
            view_type: vk::ImageViewType::TYPE_2D_ARRAY,
            aspect_mask: vk::ImageAspectFlags::COLOR,
            mip: (mip, 1),
            layer: (0, 6),
        }
    }

    /// # 参数
    /// - `mip_range`: (base_mip_level, level_count)
    /// - `layer_range`: (base_array_layer, layer_count)
    pub fn new(
        format: vk::Format,
        view_type: vk::ImageViewType,
        aspect_mask: vk::ImageAspectFlags,
        mip_range: (u8, u8),
        layer_range: (u8, u8),
    ) -> Self {
        Self {
            format,
            view_type,
            aspect_mask,
            mip: mip_range,
            layer: layer_range,
        }
    }

    #[inline]
    pub fn format(&self) -> vk::Format {
        self.format
    }

    #[inline]
    pub fn view_type(&self) -> vk::ImageViewType {
        self.view_type
    }

    #[inline]
    pub fn aspect_mask(&self) -> vk::ImageAspectFlags {
        self.aspect_mask
    }

    #[inline]
    pub fn subresource_range(&self) -> vk::ImageSubresourceRange {
        vk::ImageSubresourceRange {
            aspect_mask: self.aspect_mask,
            base_mip_level: self.mip.0 as u32,
            level_count: self.mip.1 as u32,
            base_array_layer: self.layer.0 as u32,
            layer_count: self.layer.1 as u32,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cube_view_spans_all_faces() {
        let desc = GfxImageViewDesc::new_cube(vk::Format::R16G16B16A16_SFLOAT, 5);
        let range = desc.subresource_range();
        assert_eq!(range.layer_count, 6);
        assert_eq!(range.level_count, 5);
        assert_eq!(desc.view_type(), vk::ImageViewType::CUBE);
    }

    #[test]
    fn cube_array_view_selects_single_mip() {
        let range = GfxImageViewDesc::new_cube_as_array(vk::Format::R16G16B16A16_SFLOAT, 2).subresource_range();
        assert_eq!((range.base_mip_level, range.level_count), (2, 1));
        assert_eq!(range.layer_count, 6);
    }
}
