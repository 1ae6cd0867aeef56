use ash::vk;
use blockfall_crate_tools::resource::BlockfallPath;
use blockfall_gfx::{error::GfxResult, gfx_context::GfxContext};
use blockfall_render_graph::{RgPass, RgPassBuilder, RgPassContext, RgPassKind};
use blockfall_render_interface::render_settings::RenderSettings;
use bytemuck::{Pod, Zeroable};

use crate::{
    passes::{names, tile_classify::TILE_SIZE},
    pipelines::{
        compute_pass::{ComputePass, group_count_2d},
        descriptors::PushDescriptors,
    },
};

/// 历史帧在混合结果中所占的比例
pub const HISTORY_WEIGHT: f32 = 0.2;

const SHADING_BINDINGS: [vk::DescriptorType; 10] = [
    vk::DescriptorType::UNIFORM_BUFFER,
    vk::DescriptorType::STORAGE_IMAGE,
    vk::DescriptorType::STORAGE_BUFFER,
    vk::DescriptorType::STORAGE_BUFFER,
    vk::DescriptorType::STORAGE_BUFFER,
    vk::DescriptorType::STORAGE_BUFFER,
    vk::DescriptorType::STORAGE_BUFFER,
    vk::DescriptorType::STORAGE_BUFFER,
    vk::DescriptorType::STORAGE_IMAGE,
    vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
];

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct ShadingParams {
    pub history_weight: f32,
    /// 0 表示历史无效，shader 不采样 hdr_history
    pub history_valid: u32,
    pub tiles_x: u32,
    pub _padding: u32,
}
impl ShadingParams {
    pub fn new(history_valid: bool, tiles_x: u32) -> Self {
        Self {
            history_weight: if history_valid { HISTORY_WEIGHT } else { 0.0 },
            history_valid: history_valid as u32,
            tiles_x,
            _padding: 0,
        }
    }
}

pub fn declare(builder: &mut RgPassBuilder) {
    builder
        .sampled(names::PER_FRAME)
        .read(names::VISIBILITY)
        .read(names::TILE_FLAGS)
        .read(names::OBJECTS)
        .read(names::MESH_INFOS)
        .read(names::MATERIALS)
        .read(names::INDICES)
        .read(names::VERTICES)
        .write(names::HDR)
        .sampled(names::HDR_HISTORY);
}

/// 根据可见性缓冲重建三角形并着色，结果写入 hdr，并与上一帧混合
pub struct ShadingPipeline {
    pass: ComputePass<ShadingParams>,
}
impl ShadingPipeline {
    pub fn new(ctx: &GfxContext, settings: &RenderSettings) -> GfxResult<Self> {
        let pass = ComputePass::new(
            ctx,
            &BlockfallPath::spv_path(&settings.shader_dir, "shading/shading.comp"),
            &SHADING_BINDINGS,
            "shading",
        )?;
        Ok(Self { pass })
    }

    pub fn destroy(self, ctx: &GfxContext) {
        self.pass.destroy(ctx);
    }
}

pub struct ShadingPass<'a> {
    pub pipeline: &'a ShadingPipeline,
    pub sampler: vk::Sampler,
    pub history_valid: bool,
}
impl RgPass for ShadingPass<'_> {
    fn kind(&self) -> RgPassKind {
        RgPassKind::Compute
    }

    fn setup(&mut self, builder: &mut RgPassBuilder) {
        declare(builder);
    }

    fn execute(&self, ctx: &RgPassContext<'_>) {
        let hdr = ctx.image(names::HDR);
        let tiles_x = hdr.extent.width.div_ceil(TILE_SIZE).max(1);

        let descriptors = PushDescriptors::new()
            .uniform_buffer(ctx.buffer(names::PER_FRAME))
            .storage_image(ctx.image(names::VISIBILITY).storage_view)
            .storage_buffer(ctx.buffer(names::TILE_FLAGS))
            .storage_buffer(ctx.buffer(names::OBJECTS))
            .storage_buffer(ctx.buffer(names::MESH_INFOS))
            .storage_buffer(ctx.buffer(names::MATERIALS))
            .storage_buffer(ctx.buffer(names::INDICES))
            .storage_buffer(ctx.buffer(names::VERTICES))
            .storage_image(hdr.storage_view)
            .sampled_image(&ctx.image(names::HDR_HISTORY), self.sampler);

        let params = ShadingParams::new(self.history_valid, tiles_x);
        self.pipeline.pass.exec(ctx.cmd, &descriptors, &params, group_count_2d(hdr.extent, TILE_SIZE));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_history_is_not_blended() {
        let params = ShadingParams::new(false, 4);
        assert_eq!(params.history_valid, 0);
        assert_eq!(params.history_weight, 0.0);

        let params = ShadingParams::new(true, 4);
        assert_eq!(params.history_valid, 1);
        assert_eq!(params.history_weight, HISTORY_WEIGHT);
        assert_eq!(std::mem::size_of::<ShadingParams>(), 16);
    }
}
