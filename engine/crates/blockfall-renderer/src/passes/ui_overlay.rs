use ash::vk;
use blockfall_gfx::commands::command_buffer::GfxCommandBuffer;
use blockfall_render_graph::{RgPass, RgPassBuilder, RgPassContext, RgPassKind};

use crate::passes::names;

/// 由外部提供的 UI 绘制回调
///
/// 调用时 LDR 图像已经作为 color attachment 开始了 dynamic rendering（load op 为 LOAD），
/// 回调只需要绑定自己的 pipeline 并绘制
pub trait UiOverlay {
    /// pipeline 的 color attachment 格式需要与 LDR 一致
    fn draw(&self, cmd: &GfxCommandBuffer, extent: vk::Extent2D);
}

pub fn declare(builder: &mut RgPassBuilder) {
    builder.read_write(names::LDR);
}

pub struct UiOverlayPass<'a> {
    pub overlay: &'a dyn UiOverlay,
}
impl RgPass for UiOverlayPass<'_> {
    fn kind(&self) -> RgPassKind {
        RgPassKind::Graphics
    }

    fn setup(&mut self, builder: &mut RgPassBuilder) {
        declare(builder);
    }

    fn execute(&self, ctx: &RgPassContext<'_>) {
        let ldr = ctx.image(names::LDR);
        let render_area = vk::Rect2D {
            offset: vk::Offset2D::default(),
            extent: ldr.extent,
        };
        let color_attachs = [vk::RenderingAttachmentInfo::default()
            .image_view(ldr.view)
            .image_layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)
            .load_op(vk::AttachmentLoadOp::LOAD)
            .store_op(vk::AttachmentStoreOp::STORE)];
        let render_info = vk::RenderingInfo::default()
            .layer_count(1)
            .render_area(render_area)
            .color_attachments(&color_attachs);

        ctx.cmd.cmd_begin_rendering(&render_info);
        ctx.cmd.cmd_set_viewport(
            0,
            &[vk::Viewport {
                x: 0.0,
                y: 0.0,
                width: ldr.extent.width as f32,
                height: ldr.extent.height as f32,
                min_depth: 0.0,
                max_depth: 1.0,
            }],
        );
        ctx.cmd.cmd_set_scissor(0, &[render_area]);
        self.overlay.draw(ctx.cmd, ldr.extent);
        ctx.cmd.cmd_end_rendering();
    }
}
