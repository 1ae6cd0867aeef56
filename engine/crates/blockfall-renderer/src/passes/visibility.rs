use ash::vk;
use blockfall_crate_tools::resource::BlockfallPath;
use blockfall_gfx::{
    error::GfxResult,
    gfx_context::GfxContext,
    pipelines::graphics_pipeline::{GfxGraphicsPipeline, GfxGraphicsPipelineCreateInfo},
};
use blockfall_render_graph::{RgPass, RgPassBuilder, RgPassContext, RgPassKind};
use blockfall_render_interface::render_settings::{DefaultRendererSettings, RenderSettings};

use crate::{
    culling::gpu_types::GpuDrawCommand,
    passes::names,
    pipelines::descriptors::{PushDescriptors, push_descriptor_layout},
};

const VISIBILITY_BINDINGS: [vk::DescriptorType; 4] = [
    vk::DescriptorType::UNIFORM_BUFFER,
    vk::DescriptorType::STORAGE_BUFFER,
    vk::DescriptorType::STORAGE_BUFFER,
    vk::DescriptorType::STORAGE_BUFFER,
];

/// 没有被任何三角形覆盖的像素
pub const VISIBILITY_CLEAR: u32 = u32::MAX;

pub fn declare(builder: &mut RgPassBuilder, multisampled: bool) {
    builder
        .sampled(names::PER_FRAME)
        .read(names::OBJECTS)
        .read(names::COMPACTED)
        .read(names::VERTICES)
        .read(names::INDICES)
        .indirect_argument(names::DRAW_COMMANDS)
        .write(names::VISIBILITY)
        .write(names::DEPTH);
    if multisampled {
        builder.write(names::VISIBILITY_MS);
    }
}

/// 把 (object index, primitive id) 写入 R32G32_UINT 的可见性缓冲
///
/// 顶点 shader 通过 `gl_VertexIndex` 从 storage buffer 中读取位置，
/// 通过 `compacted[gl_InstanceIndex]` 找到物体
pub struct VisibilityPipeline {
    pipeline: GfxGraphicsPipeline,
    samples: vk::SampleCountFlags,
}
// new & init
impl VisibilityPipeline {
    pub fn new(ctx: &GfxContext, settings: &RenderSettings, depth_format: vk::Format) -> GfxResult<Self> {
        let samples = settings.sample_count();
        let stages = vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT;
        let layout = push_descriptor_layout(ctx, &VISIBILITY_BINDINGS, stages, 0, "visibility")?;

        let mut create_info = GfxGraphicsPipelineCreateInfo::default();
        create_info
            .attach_info(vec![DefaultRendererSettings::VISIBILITY_FORMAT], Some(depth_format), None)
            .vertex_shader_stage(BlockfallPath::spv_path(&settings.shader_dir, "visibility/visibility.vert"))
            .fragment_shader_stage(BlockfallPath::spv_path(&settings.shader_dir, "visibility/visibility.frag"))
            .cull_mode(vk::CullModeFlags::BACK, vk::FrontFace::COUNTER_CLOCKWISE)
            .depth_test(Some(vk::CompareOp::LESS), true)
            .msaa(samples)
            .color_blend(
                vec![
                    vk::PipelineColorBlendAttachmentState::default()
                        .blend_enable(false)
                        .color_write_mask(vk::ColorComponentFlags::R | vk::ColorComponentFlags::G),
                ],
                [0.0; 4],
            );
        let pipeline = GfxGraphicsPipeline::new(ctx, &create_info, layout, "visibility")?;

        Ok(Self { pipeline, samples })
    }
}
// getters
impl VisibilityPipeline {
    #[inline]
    pub fn samples(&self) -> vk::SampleCountFlags {
        self.samples
    }
}
// destroy
impl VisibilityPipeline {
    pub fn destroy(self, ctx: &GfxContext) {
        self.pipeline.destroy(ctx);
    }
}

pub struct VisibilityPass<'a> {
    pub pipeline: &'a VisibilityPipeline,
    pub multisampled: bool,
    /// 每个 mesh 一条间接绘制命令
    pub draw_count: u32,
}
impl RgPass for VisibilityPass<'_> {
    fn kind(&self) -> RgPassKind {
        RgPassKind::Graphics
    }

    fn setup(&mut self, builder: &mut RgPassBuilder) {
        declare(builder, self.multisampled);
    }

    fn execute(&self, ctx: &RgPassContext<'_>) {
        let cmd = ctx.cmd;
        let visibility = ctx.image(names::VISIBILITY);
        let depth = ctx.image(names::DEPTH);
        let extent = visibility.extent;

        let clear_color = vk::ClearValue {
            color: vk::ClearColorValue {
                uint32: [VISIBILITY_CLEAR; 4],
            },
        };
        let color_attach = if self.multisampled {
            let visibility_ms = ctx.image(names::VISIBILITY_MS);
            // 整数格式只能取一个样本做 resolve
            vk::RenderingAttachmentInfo::default()
                .image_view(visibility_ms.view)
                .image_layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)
                .resolve_mode(vk::ResolveModeFlags::SAMPLE_ZERO)
                .resolve_image_view(visibility.view)
                .resolve_image_layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)
                .load_op(vk::AttachmentLoadOp::CLEAR)
                .store_op(vk::AttachmentStoreOp::STORE)
                .clear_value(clear_color)
        } else {
            vk::RenderingAttachmentInfo::default()
                .image_view(visibility.view)
                .image_layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)
                .load_op(vk::AttachmentLoadOp::CLEAR)
                .store_op(vk::AttachmentStoreOp::STORE)
                .clear_value(clear_color)
        };
        let depth_attach = vk::RenderingAttachmentInfo::default()
            .image_view(depth.view)
            .image_layout(vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL)
            .load_op(vk::AttachmentLoadOp::CLEAR)
            .store_op(vk::AttachmentStoreOp::STORE)
            .clear_value(vk::ClearValue {
                depth_stencil: vk::ClearDepthStencilValue { depth: 1.0, stencil: 0 },
            });

        let render_area = vk::Rect2D {
            offset: vk::Offset2D::default(),
            extent,
        };
        let color_attachs = [color_attach];
        let render_info = vk::RenderingInfo::default()
            .layer_count(1)
            .render_area(render_area)
            .color_attachments(&color_attachs)
            .depth_attachment(&depth_attach);

        cmd.cmd_begin_rendering(&render_info);
        cmd.cmd_set_viewport(
            0,
            &[vk::Viewport {
                x: 0.0,
                y: 0.0,
                width: extent.width as f32,
                height: extent.height as f32,
                min_depth: 0.0,
                max_depth: 1.0,
            }],
        );
        cmd.cmd_set_scissor(0, &[render_area]);

        if self.draw_count > 0 {
            let layout = self.pipeline.pipeline.layout().handle();
            cmd.cmd_bind_pipeline(vk::PipelineBindPoint::GRAPHICS, self.pipeline.pipeline.handle());
            PushDescriptors::new()
                .uniform_buffer(ctx.buffer(names::PER_FRAME))
                .storage_buffer(ctx.buffer(names::OBJECTS))
                .storage_buffer(ctx.buffer(names::COMPACTED))
                .storage_buffer(ctx.buffer(names::VERTICES))
                .push(cmd, vk::PipelineBindPoint::GRAPHICS, layout);
            cmd.cmd_bind_index_buffer(ctx.buffer(names::INDICES).buffer, 0, vk::IndexType::UINT32);
            cmd.cmd_draw_indexed_indirect(
                ctx.buffer(names::DRAW_COMMANDS).buffer,
                0,
                self.draw_count,
                GpuDrawCommand::STRIDE,
            );
        }
        cmd.cmd_end_rendering();
    }
}
