use ash::vk;
use blockfall_crate_tools::resource::BlockfallPath;
use blockfall_gfx::{error::GfxResult, gfx_context::GfxContext};
use blockfall_render_graph::{RgPass, RgPassBuilder, RgPassContext, RgPassKind};
use blockfall_render_interface::render_settings::RenderSettings;
use bytemuck::{Pod, Zeroable};

use crate::{
    passes::names,
    pipelines::{
        compute_pass::{ComputePass, group_count_2d},
        descriptors::PushDescriptors,
    },
};

/// 每个 tile 覆盖的像素边长，与 tile_classify.comp 的 local size 一致
pub const TILE_SIZE: u32 = 16;

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct TileClassifyParams {
    pub extent: glam::UVec2,
    pub tiles_x: u32,
    pub _padding: u32,
}

/// 覆盖整张图需要的 tile 数量
#[inline]
pub fn tile_count(extent: vk::Extent2D) -> (u32, u32) {
    (extent.width.div_ceil(TILE_SIZE).max(1), extent.height.div_ceil(TILE_SIZE).max(1))
}

pub fn declare(builder: &mut RgPassBuilder) {
    builder.read(names::VISIBILITY).write(names::TILE_FLAGS);
}

/// 标记每个 tile 是否有几何体覆盖，着色时跳过全是背景的 tile
pub struct TileClassifyPipeline {
    pass: ComputePass<TileClassifyParams>,
}
impl TileClassifyPipeline {
    pub fn new(ctx: &GfxContext, settings: &RenderSettings) -> GfxResult<Self> {
        let pass = ComputePass::new(
            ctx,
            &BlockfallPath::spv_path(&settings.shader_dir, "shading/tile_classify.comp"),
            &[vk::DescriptorType::STORAGE_IMAGE, vk::DescriptorType::STORAGE_BUFFER],
            "tile-classify",
        )?;
        Ok(Self { pass })
    }

    pub fn destroy(self, ctx: &GfxContext) {
        self.pass.destroy(ctx);
    }
}

pub struct TileClassifyPass<'a> {
    pub pipeline: &'a TileClassifyPipeline,
}
impl RgPass for TileClassifyPass<'_> {
    fn kind(&self) -> RgPassKind {
        RgPassKind::Compute
    }

    fn setup(&mut self, builder: &mut RgPassBuilder) {
        declare(builder);
    }

    fn execute(&self, ctx: &RgPassContext<'_>) {
        let visibility = ctx.image(names::VISIBILITY);
        let (tiles_x, _) = tile_count(visibility.extent);

        let descriptors = PushDescriptors::new()
            .storage_image(visibility.storage_view)
            .storage_buffer(ctx.buffer(names::TILE_FLAGS));
        let params = TileClassifyParams {
            extent: glam::uvec2(visibility.extent.width, visibility.extent.height),
            tiles_x,
            _padding: 0,
        };
        self.pipeline.pass.exec(ctx.cmd, &descriptors, &params, group_count_2d(visibility.extent, TILE_SIZE));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_tiles_are_counted() {
        let (x, y) = tile_count(vk::Extent2D {
            width: 1921,
            height: 1080,
        });
        assert_eq!((x, y), (121, 68));
        assert_eq!(tile_count(vk::Extent2D::default()), (1, 1));
    }
}
