use ash::vk;

use crate::{
    error::GfxResult,
    foundation::debug_messenger::DebugType,
    gfx_context::GfxContext,
    pipelines::{pipeline_layout::GfxPipelineLayout, shader::GfxShaderModule},
};

pub struct GfxComputePipeline {
    pipeline: vk::Pipeline,
    layout: GfxPipelineLayout,
}
impl GfxComputePipeline {
    /// # param
    /// * shader_path - compute shader 的 spv 文件路径，入口为 main
    pub fn new(
        ctx: &GfxContext,
        shader_path: &std::path::Path,
        layout: GfxPipelineLayout,
        debug_name: &str,
    ) -> GfxResult<Self> {
        let shader_module = match GfxShaderModule::new(ctx, shader_path) {
            Ok(module) => module,
            Err(e) => {
                layout.destroy(ctx);
                return Err(e);
            }
        };

        let stage_info = vk::PipelineShaderStageCreateInfo::default()
            .stage(vk::ShaderStageFlags::COMPUTE)
            .module(shader_module.handle())
            .name(c"main");
        let pipeline_info = vk::ComputePipelineCreateInfo::default().stage(stage_info).layout(layout.handle());

        let result = unsafe {
            ctx.device().create_compute_pipelines(vk::PipelineCache::null(), std::slice::from_ref(&pipeline_info), None)
        };
        shader_module.destroy(ctx);

        let pipeline = match result {
            Ok(pipelines) => pipelines[0],
            Err((_, e)) => {
                layout.destroy(ctx);
                return Err(e.into());
            }
        };

        let pipeline = Self { pipeline, layout };
        ctx.device().set_debug_name(&pipeline, debug_name);
        Ok(pipeline)
    }

    #[inline]
    pub fn handle(&self) -> vk::Pipeline {
        self.pipeline
    }

    #[inline]
    pub fn layout(&self) -> &GfxPipelineLayout {
        &self.layout
    }

    pub fn destroy(self, ctx: &GfxContext) {
        unsafe {
            ctx.device().destroy_pipeline(self.pipeline, None);
        }
        self.layout.destroy(ctx);
    }
}
impl DebugType for GfxComputePipeline {
    fn debug_type_name() -> &'static str {
        "GfxComputePipeline"
    }

    fn vk_handle(&self) -> impl vk::Handle {
        self.pipeline
    }
}
