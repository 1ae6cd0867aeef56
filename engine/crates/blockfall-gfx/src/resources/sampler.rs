use ash::vk;
use ash::vk::Handle;
use std::hash::Hash;

use crate::{error::GfxResult, foundation::debug_messenger::DebugType, gfx_context::GfxContext};

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct GfxSamplerDesc {
    pub mag_filter: vk::Filter,
    pub min_filter: vk::Filter,
    pub address_mode_u: vk::SamplerAddressMode,
    pub address_mode_v: vk::SamplerAddressMode,
    pub address_mode_w: vk::SamplerAddressMode,
    pub max_anisotropy: u32,
    pub compare_op: Option<vk::CompareOp>,
    pub mipmap_mode: vk::SamplerMipmapMode,
}
impl Default for GfxSamplerDesc {
    fn default() -> Self {
        Self {
            mag_filter: vk::Filter::LINEAR,
            min_filter: vk::Filter::LINEAR,
            address_mode_u: vk::SamplerAddressMode::REPEAT,
            address_mode_v: vk::SamplerAddressMode::REPEAT,
            address_mode_w: vk::SamplerAddressMode::REPEAT,
            max_anisotropy: 0,
            compare_op: None,
            mipmap_mode: vk::SamplerMipmapMode::LINEAR,
        }
    }
}
impl GfxSamplerDesc {
    /// 后处理使用的 linear clamp sampler
    pub fn linear_clamp() -> Self {
        Self {
            address_mode_u: vk::SamplerAddressMode::CLAMP_TO_EDGE,
            address_mode_v: vk::SamplerAddressMode::CLAMP_TO_EDGE,
            address_mode_w: vk::SamplerAddressMode::CLAMP_TO_EDGE,
            ..Default::default()
        }
    }
}

pub struct GfxSampler {
    handle: vk::Sampler,
}
impl DebugType for GfxSampler {
    fn debug_type_name() -> &'static str {
        "GfxSampler"
    }

    fn vk_handle(&self) -> impl vk::Handle {
        self.handle
    }
}
// new & init
impl GfxSampler {
    pub fn new(ctx: &GfxContext, desc: &GfxSamplerDesc, name: impl AsRef<str>) -> GfxResult<Self> {
        let mut create_info = vk::SamplerCreateInfo::default()
            .mag_filter(desc.mag_filter)
            .min_filter(desc.min_filter)
            .address_mode_u(desc.address_mode_u)
            .address_mode_v(desc.address_mode_v)
            .address_mode_w(desc.address_mode_w)
            .mipmap_mode(desc.mipmap_mode)
            .min_lod(0.0)
            .max_lod(vk::LOD_CLAMP_NONE)
            .border_color(vk::BorderColor::INT_OPAQUE_BLACK);

        if desc.max_anisotropy > 0 {
            create_info = create_info.anisotropy_enable(true).max_anisotropy(desc.max_anisotropy as f32);
        }
        if let Some(compare_op) = desc.compare_op {
            create_info = create_info.compare_enable(true).compare_op(compare_op);
        }

        let handle = unsafe { ctx.device().create_sampler(&create_info, None)? };
        let sampler = Self { handle };
        ctx.device().set_debug_name(&sampler, name);
        Ok(sampler)
    }
}
// getters
impl GfxSampler {
    #[inline]
    pub fn handle(&self) -> vk::Sampler {
        self.handle
    }
}
// destroy
impl GfxSampler {
    pub fn destroy(mut self, ctx: &GfxContext) {
        unsafe {
            ctx.device().destroy_sampler(self.handle, None);
        }
        self.handle = vk::Sampler::null();
    }
}
impl Drop for GfxSampler {
    fn drop(&mut self) {
        debug_assert!(self.handle.is_null(), "GfxSampler must be destroyed manually.");
    }
}
