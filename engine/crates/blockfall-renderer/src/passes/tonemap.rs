use ash::vk;
use blockfall_crate_tools::resource::BlockfallPath;
use blockfall_gfx::{error::GfxResult, gfx_context::GfxContext};
use blockfall_render_graph::{RgPass, RgPassBuilder, RgPassContext, RgPassKind};
use blockfall_render_interface::render_settings::{RenderSettings, TonemapSettings};
use bytemuck::{Pod, Zeroable};

use crate::{
    passes::names,
    pipelines::{
        compute_pass::{ComputePass, group_count_2d},
        descriptors::PushDescriptors,
    },
};

const LOCAL_SIZE: u32 = 8;
pub const BLOOM_STRENGTH: f32 = 0.04;

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct TonemapParams {
    pub exposure: f32,
    pub white_point: f32,
    /// 见 `TonemapCurve::shader_index`
    pub curve: u32,
    pub bloom_strength: f32,
}
impl TonemapParams {
    pub fn new(settings: &TonemapSettings) -> Self {
        Self {
            exposure: settings.exposure,
            white_point: settings.white_point,
            curve: settings.curve.shader_index(),
            bloom_strength: BLOOM_STRENGTH,
        }
    }
}

pub fn declare(builder: &mut RgPassBuilder) {
    builder.sampled(names::HDR).sampled(names::bloom(0)).write(names::LDR);
}

pub struct TonemapPipeline {
    pass: ComputePass<TonemapParams>,
}
impl TonemapPipeline {
    pub fn new(ctx: &GfxContext, settings: &RenderSettings) -> GfxResult<Self> {
        let pass = ComputePass::new(
            ctx,
            &BlockfallPath::spv_path(&settings.shader_dir, "post/tonemap.comp"),
            &[
                vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
                vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
                vk::DescriptorType::STORAGE_IMAGE,
            ],
            "tonemap",
        )?;
        Ok(Self { pass })
    }

    pub fn destroy(self, ctx: &GfxContext) {
        self.pass.destroy(ctx);
    }
}

/// hdr + bloom 映射到 LDR
pub struct TonemapPass<'a> {
    pub pipeline: &'a TonemapPipeline,
    pub sampler: vk::Sampler,
    pub params: TonemapParams,
}
impl RgPass for TonemapPass<'_> {
    fn kind(&self) -> RgPassKind {
        RgPassKind::Compute
    }

    fn setup(&mut self, builder: &mut RgPassBuilder) {
        declare(builder);
    }

    fn execute(&self, ctx: &RgPassContext<'_>) {
        let ldr = ctx.image(names::LDR);
        let descriptors = PushDescriptors::new()
            .sampled_image(&ctx.image(names::HDR), self.sampler)
            .sampled_image(&ctx.image(&names::bloom(0)), self.sampler)
            .storage_image(ldr.storage_view);
        self.pipeline.pass.exec(ctx.cmd, &descriptors, &self.params, group_count_2d(ldr.extent, LOCAL_SIZE));
    }
}

#[cfg(test)]
mod tests {
    use blockfall_render_interface::render_settings::TonemapCurve;

    use super::*;

    #[test]
    fn params_follow_settings() {
        let settings = TonemapSettings {
            exposure: 1.5,
            white_point: 4.0,
            curve: TonemapCurve::Reinhard,
        };
        let params = TonemapParams::new(&settings);
        assert_eq!(params.exposure, 1.5);
        assert_eq!(params.white_point, 4.0);
        assert_eq!(params.curve, TonemapCurve::Reinhard.shader_index());
    }
}
