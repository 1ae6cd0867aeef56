use std::convert::identity;

use ash::vk;
use itertools::Itertools;

use crate::{
    error::GfxResult,
    foundation::debug_messenger::DebugType,
    gfx_context::GfxContext,
    pipelines::{
        pipeline_layout::GfxPipelineLayout,
        shader::{GfxShaderModule, ShaderStageInfo},
    },
};

pub struct GfxGraphicsPipeline {
    pipeline: vk::Pipeline,
    layout: GfxPipelineLayout,
}
impl GfxGraphicsPipeline {
    pub fn new(
        ctx: &GfxContext,
        create_info: &GfxGraphicsPipelineCreateInfo,
        layout: GfxPipelineLayout,
        debug_name: &str,
    ) -> GfxResult<Self> {
        // dynamic rendering 需要的 framebuffer 信息
        let mut attach_info = vk::PipelineRenderingCreateInfo::default()
            .color_attachment_formats(&create_info.color_attach_formats)
            .depth_attachment_format(create_info.depth_attach_format)
            .stencil_attachment_format(create_info.stencil_attach_format);

        let mut shader_modules = Vec::with_capacity(create_info.shader_stages.len());
        for stage in &create_info.shader_stages {
            match GfxShaderModule::new(ctx, &stage.path) {
                Ok(module) => shader_modules.push(module),
                Err(e) => {
                    shader_modules.into_iter().for_each(|m| m.destroy(ctx));
                    layout.destroy(ctx);
                    return Err(e);
                }
            }
        }
        let shader_stages_info = create_info
            .shader_stages
            .iter()
            .zip(shader_modules.iter())
            .map(|(stage, module)| {
                vk::PipelineShaderStageCreateInfo::default()
                    .stage(stage.stage)
                    .module(module.handle())
                    .name(stage.entry_point)
            })
            .collect_vec();

        let vertex_input_state_info = vk::PipelineVertexInputStateCreateInfo::default()
            .vertex_binding_descriptions(&create_info.vertex_binding_desc)
            .vertex_attribute_descriptions(&create_info.vertex_attribute_desc);

        let input_assembly_info = vk::PipelineInputAssemblyStateCreateInfo::default()
            .topology(create_info.primitive_topology)
            .primitive_restart_enable(false);

        // viewport 和 scissor 具体值由 dynamic 决定，但是数量由该 create info 决定
        let viewport_info = vk::PipelineViewportStateCreateInfo {
            viewport_count: 1,
            scissor_count: 1,
            ..Default::default()
        };

        let msaa_info = vk::PipelineMultisampleStateCreateInfo::default()
            .sample_shading_enable(false)
            .rasterization_samples(create_info.msaa_sample);

        // 混合设置：需要为每个 color attachment 分别指定
        let color_blend_info = create_info.blend_info.attachments(&create_info.color_attach_blend_states);

        let dynamic_state_info =
            vk::PipelineDynamicStateCreateInfo::default().dynamic_states(&create_info.dynamic_states);

        let pipeline_info = vk::GraphicsPipelineCreateInfo::default()
            .stages(&shader_stages_info)
            .vertex_input_state(&vertex_input_state_info)
            .input_assembly_state(&input_assembly_info)
            .viewport_state(&viewport_info)
            .rasterization_state(&create_info.rasterize_state_info)
            .multisample_state(&msaa_info)
            .color_blend_state(&color_blend_info)
            .depth_stencil_state(&create_info.depth_stencil_info)
            .layout(layout.handle())
            .dynamic_state(&dynamic_state_info)
            .push_next(&mut attach_info);

        let result = unsafe {
            ctx.device().create_graphics_pipelines(vk::PipelineCache::null(), std::slice::from_ref(&pipeline_info), None)
        };
        shader_modules.into_iter().for_each(|m| m.destroy(ctx));

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
impl DebugType for GfxGraphicsPipeline {
    fn debug_type_name() -> &'static str {
        "GfxGraphicsPipeline"
    }

    fn vk_handle(&self) -> impl vk::Handle {
        self.pipeline
    }
}

pub struct GfxGraphicsPipelineCreateInfo {
    /// dynamic render 需要的 framebuffer 信息
    color_attach_formats: Vec<vk::Format>,
    depth_attach_format: vk::Format,
    stencil_attach_format: vk::Format,

    shader_stages: Vec<ShaderStageInfo>,

    vertex_binding_desc: Vec<vk::VertexInputBindingDescription>,
    vertex_attribute_desc: Vec<vk::VertexInputAttributeDescription>,

    primitive_topology: vk::PrimitiveTopology,

    rasterize_state_info: vk::PipelineRasterizationStateCreateInfo<'static>,

    msaa_sample: vk::SampleCountFlags,

    color_attach_blend_states: Vec<vk::PipelineColorBlendAttachmentState>,
    blend_info: vk::PipelineColorBlendStateCreateInfo<'static>,

    depth_stencil_info: vk::PipelineDepthStencilStateCreateInfo<'static>,

    dynamic_states: Vec<vk::DynamicState>,
}
impl Default for GfxGraphicsPipelineCreateInfo {
    fn default() -> Self {
        Self {
            color_attach_formats: vec![],

            // format = undefined 表示不使用这个 attachment
            depth_attach_format: vk::Format::UNDEFINED,
            stencil_attach_format: vk::Format::UNDEFINED,

            shader_stages: vec![],

            vertex_binding_desc: vec![],
            vertex_attribute_desc: vec![],

            primitive_topology: vk::PrimitiveTopology::TRIANGLE_LIST,

            rasterize_state_info: vk::PipelineRasterizationStateCreateInfo::default()
                .depth_clamp_enable(false)
                .rasterizer_discard_enable(false)
                .polygon_mode(vk::PolygonMode::FILL)
                .line_width(1.0)
                .cull_mode(vk::CullModeFlags::BACK)
                // 按照 OpenGL 的传统，将 CCW 视为 front face
                .front_face(vk::FrontFace::COUNTER_CLOCKWISE)
                .depth_bias_enable(false),
            msaa_sample: vk::SampleCountFlags::TYPE_1,

            color_attach_blend_states: vec![],
            blend_info: vk::PipelineColorBlendStateCreateInfo::default()
                .logic_op_enable(false)
                .blend_constants([0.0, 0.0, 0.0, 0.0]),

            depth_stencil_info: vk::PipelineDepthStencilStateCreateInfo::default()
                .depth_test_enable(true)
                .depth_write_enable(true)
                .depth_compare_op(vk::CompareOp::LESS)
                .depth_bounds_test_enable(false)
                .stencil_test_enable(false),
            dynamic_states: vec![vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR],
        }
    }
}
// builder
impl GfxGraphicsPipelineCreateInfo {
    #[inline]
    pub fn attach_info(
        &mut self,
        color_attach_formats: Vec<vk::Format>,
        depth_format: Option<vk::Format>,
        stencil_format: Option<vk::Format>,
    ) -> &mut Self {
        self.color_attach_formats = color_attach_formats;
        self.depth_attach_format = depth_format.unwrap_or(vk::Format::UNDEFINED);
        self.stencil_attach_format = stencil_format.unwrap_or(vk::Format::UNDEFINED);
        self
    }

    #[inline]
    pub fn vertex_shader_stage(&mut self, path: impl Into<std::path::PathBuf>) -> &mut Self {
        self.shader_stages.push(ShaderStageInfo::new(vk::ShaderStageFlags::VERTEX, path));
        self
    }

    #[inline]
    pub fn fragment_shader_stage(&mut self, path: impl Into<std::path::PathBuf>) -> &mut Self {
        self.shader_stages.push(ShaderStageInfo::new(vk::ShaderStageFlags::FRAGMENT, path));
        self
    }

    #[inline]
    pub fn vertex_binding(&mut self, bindings: Vec<vk::VertexInputBindingDescription>) -> &mut Self {
        self.vertex_binding_desc = bindings;
        self
    }

    #[inline]
    pub fn vertex_attribute(&mut self, attributes: Vec<vk::VertexInputAttributeDescription>) -> &mut Self {
        self.vertex_attribute_desc = attributes;
        self
    }

    /// 为每个 color attachment 指定 blend 操作
    #[inline]
    pub fn color_blend(
        &mut self,
        states: Vec<vk::PipelineColorBlendAttachmentState>,
        blend_constants: [f32; 4],
    ) -> &mut Self {
        self.color_attach_blend_states = states;
        self.blend_info.blend_constants = blend_constants;
        self.blend_info.logic_op_enable = vk::FALSE;
        self
    }

    #[inline]
    pub fn cull_mode(&mut self, mode: vk::CullModeFlags, front_face: vk::FrontFace) -> &mut Self {
        self.rasterize_state_info.cull_mode = mode;
        self.rasterize_state_info.front_face = front_face;
        self
    }

    #[inline]
    pub fn depth_test(&mut self, depth_test_op: Option<vk::CompareOp>, depth_write: bool) -> &mut Self {
        self.depth_stencil_info.depth_test_enable = depth_test_op.map_or(vk::FALSE, |_| vk::TRUE);
        self.depth_stencil_info.depth_compare_op = depth_test_op.map_or(vk::CompareOp::NEVER, identity);
        self.depth_stencil_info.depth_write_enable = if depth_write { vk::TRUE } else { vk::FALSE };
        self
    }

    #[inline]
    pub fn msaa(&mut self, samples: vk::SampleCountFlags) -> &mut Self {
        self.msaa_sample = samples;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_uses_dynamic_viewport_and_single_sample() {
        let info = GfxGraphicsPipelineCreateInfo::default();
        assert_eq!(info.dynamic_states, vec![vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR]);
        assert_eq!(info.msaa_sample, vk::SampleCountFlags::TYPE_1);
        assert_eq!(info.depth_attach_format, vk::Format::UNDEFINED);
    }

    #[test]
    fn depth_test_none_disables_test() {
        let mut info = GfxGraphicsPipelineCreateInfo::default();
        info.depth_test(None, false).msaa(vk::SampleCountFlags::TYPE_4);
        assert_eq!(info.depth_stencil_info.depth_test_enable, vk::FALSE);
        assert_eq!(info.depth_stencil_info.depth_write_enable, vk::FALSE);
        assert_eq!(info.msaa_sample, vk::SampleCountFlags::TYPE_4);
    }
}
