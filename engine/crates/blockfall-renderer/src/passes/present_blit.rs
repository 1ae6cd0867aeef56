use ash::vk;
use blockfall_render_graph::{RgImageBinding, RgPass, RgPassBuilder, RgPassContext, RgPassKind};

use crate::passes::names;

pub fn declare(builder: &mut RgPassBuilder) {
    builder.read(names::LDR).write(names::SWAPCHAIN);
}

/// LDR 图像 blit 到本帧 acquire 到的交换链图像，尺寸不同时线性缩放
pub struct PresentBlitPass;
impl RgPass for PresentBlitPass {
    fn kind(&self) -> RgPassKind {
        RgPassKind::Transfer
    }

    fn setup(&mut self, builder: &mut RgPassBuilder) {
        declare(builder);
    }

    fn execute(&self, ctx: &RgPassContext<'_>) {
        let src = ctx.image(names::LDR);
        let dst = ctx.image(names::SWAPCHAIN);

        let regions = [blit_region(&src, &dst)];
        let blit_info = vk::BlitImageInfo2::default()
            .src_image(src.image)
            .src_image_layout(vk::ImageLayout::TRANSFER_SRC_OPTIMAL)
            .dst_image(dst.image)
            .dst_image_layout(vk::ImageLayout::TRANSFER_DST_OPTIMAL)
            .regions(&regions)
            .filter(vk::Filter::LINEAR);
        ctx.cmd.cmd_blit_image(&blit_info);
    }
}

fn blit_region(src: &RgImageBinding, dst: &RgImageBinding) -> vk::ImageBlit2<'static> {
    let corner = |extent: vk::Extent2D| vk::Offset3D {
        x: extent.width as i32,
        y: extent.height as i32,
        z: 1,
    };
    let layers = vk::ImageSubresourceLayers {
        aspect_mask: vk::ImageAspectFlags::COLOR,
        mip_level: 0,
        base_array_layer: 0,
        layer_count: 1,
    };
    vk::ImageBlit2::default()
        .src_subresource(layers)
        .src_offsets([vk::Offset3D::default(), corner(src.extent)])
        .dst_subresource(layers)
        .dst_offsets([vk::Offset3D::default(), corner(dst.extent)])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blit_covers_both_images() {
        let mut src = RgImageBinding::NULL;
        src.extent = vk::Extent2D {
            width: 640,
            height: 360,
        };
        let mut dst = RgImageBinding::NULL;
        dst.extent = vk::Extent2D {
            width: 1280,
            height: 720,
        };
        let region = blit_region(&src, &dst);
        assert_eq!(region.src_offsets[1].x, 640);
        assert_eq!(region.dst_offsets[1].y, 720);
        assert_eq!(region.dst_offsets[1].z, 1);
    }
}
