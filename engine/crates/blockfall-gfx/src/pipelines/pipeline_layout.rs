use ash::vk;
use itertools::Itertools;

use crate::{error::GfxResult, foundation::debug_messenger::DebugType, gfx_context::GfxContext};

/// descriptor set layout
///
/// 渲染器的所有 pass 都使用 push descriptor，不需要 descriptor pool
pub struct GfxDescriptorSetLayout {
    handle: vk::DescriptorSetLayout,
}
impl GfxDescriptorSetLayout {
    pub fn new_push_descriptor(
        ctx: &GfxContext,
        bindings: &[vk::DescriptorSetLayoutBinding],
        debug_name: impl AsRef<str>,
    ) -> GfxResult<Self> {
        let create_info = vk::DescriptorSetLayoutCreateInfo::default()
            .flags(vk::DescriptorSetLayoutCreateFlags::PUSH_DESCRIPTOR_KHR)
            .bindings(bindings);
        let handle = unsafe { ctx.device().create_descriptor_set_layout(&create_info, None)? };
        let layout = Self { handle };
        ctx.device().set_debug_name(&layout, debug_name);
        Ok(layout)
    }

    #[inline]
    pub fn handle(&self) -> vk::DescriptorSetLayout {
        self.handle
    }

    pub fn destroy(self, ctx: &GfxContext) {
        unsafe {
            ctx.device().destroy_descriptor_set_layout(self.handle, None);
        }
    }
}
impl DebugType for GfxDescriptorSetLayout {
    fn debug_type_name() -> &'static str {
        "GfxDescriptorSetLayout"
    }

    fn vk_handle(&self) -> impl vk::Handle {
        self.handle
    }
}

/// pipeline layout，持有其引用的 descriptor set layout
pub struct GfxPipelineLayout {
    handle: vk::PipelineLayout,
    set_layouts: Vec<GfxDescriptorSetLayout>,
    push_constant_ranges: Vec<vk::PushConstantRange>,
}
impl GfxPipelineLayout {
    pub fn new(
        ctx: &GfxContext,
        set_layouts: Vec<GfxDescriptorSetLayout>,
        push_constant_ranges: &[vk::PushConstantRange],
        debug_name: impl AsRef<str>,
    ) -> GfxResult<Self> {
        let vk_set_layouts = set_layouts.iter().map(|l| l.handle()).collect_vec();
        let pipeline_layout_create_info = vk::PipelineLayoutCreateInfo::default()
            .set_layouts(&vk_set_layouts)
            .push_constant_ranges(push_constant_ranges);
        let handle = match unsafe { ctx.device().create_pipeline_layout(&pipeline_layout_create_info, None) } {
            Ok(handle) => handle,
            Err(e) => {
                set_layouts.into_iter().for_each(|l| l.destroy(ctx));
                return Err(e.into());
            }
        };
        let layout = Self {
            handle,
            set_layouts,
            push_constant_ranges: push_constant_ranges.to_vec(),
        };
        ctx.device().set_debug_name(&layout, debug_name);
        Ok(layout)
    }

    #[inline]
    pub fn handle(&self) -> vk::PipelineLayout {
        self.handle
    }

    /// 所有 push constant range 的 stage 的并集
    #[inline]
    pub fn push_constant_stages(&self) -> vk::ShaderStageFlags {
        self.push_constant_ranges.iter().fold(vk::ShaderStageFlags::empty(), |acc, r| acc | r.stage_flags)
    }

    pub fn destroy(self, ctx: &GfxContext) {
        unsafe {
            ctx.device().destroy_pipeline_layout(self.handle, None);
        }
        self.set_layouts.into_iter().for_each(|l| l.destroy(ctx));
    }
}
impl DebugType for GfxPipelineLayout {
    fn debug_type_name() -> &'static str {
        "GfxPipelineLayout"
    }

    fn vk_handle(&self) -> impl vk::Handle {
        self.handle
    }
}
