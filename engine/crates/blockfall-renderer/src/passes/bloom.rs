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

const LOCAL_SIZE: u32 = 8;
/// 第一次下采样时只保留亮度超过该值的部分
pub const BLOOM_THRESHOLD: f32 = 1.0;
pub const BLOOM_UPSAMPLE_INTENSITY: f32 = 0.6;

const BLOOM_BINDINGS: [vk::DescriptorType; 2] =
    [vk::DescriptorType::COMBINED_IMAGE_SAMPLER, vk::DescriptorType::STORAGE_IMAGE];

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct BloomParams {
    pub dst_extent: glam::UVec2,
    /// 下采样：亮度阈值，0 表示不过滤；上采样：叠加强度
    pub factor: f32,
    pub _padding: f32,
}

/// bloom 链第 level 级的尺寸：hdr 尺寸的 1/2^(level+1)，最小 1 像素
#[inline]
pub fn bloom_extent(base: vk::Extent2D, level: u32) -> vk::Extent2D {
    vk::Extent2D {
        width: (base.width >> (level + 1)).max(1),
        height: (base.height >> (level + 1)).max(1),
    }
}

/// 下采样的输入：第 0 级读 hdr，其余读上一级
fn down_source(level: u32) -> String {
    if level == 0 { names::HDR.to_string() } else { names::bloom(level - 1) }
}

pub fn declare_down(builder: &mut RgPassBuilder, level: u32) {
    builder.sampled(down_source(level)).write(names::bloom(level));
}

/// 把第 level 级叠加到第 level-1 级上
pub fn declare_up(builder: &mut RgPassBuilder, level: u32) {
    debug_assert!(level > 0);
    builder.sampled(names::bloom(level)).read_write(names::bloom(level - 1));
}

pub struct BloomPipelines {
    down: ComputePass<BloomParams>,
    up: ComputePass<BloomParams>,
}
impl BloomPipelines {
    pub fn new(ctx: &GfxContext, settings: &RenderSettings) -> GfxResult<Self> {
        let down = ComputePass::new(
            ctx,
            &BlockfallPath::spv_path(&settings.shader_dir, "post/bloom_down.comp"),
            &BLOOM_BINDINGS,
            "bloom-down",
        )?;
        let up = match ComputePass::new(
            ctx,
            &BlockfallPath::spv_path(&settings.shader_dir, "post/bloom_up.comp"),
            &BLOOM_BINDINGS,
            "bloom-up",
        ) {
            Ok(pass) => pass,
            Err(e) => {
                down.destroy(ctx);
                return Err(e);
            }
        };
        Ok(Self { down, up })
    }

    pub fn destroy(self, ctx: &GfxContext) {
        self.down.destroy(ctx);
        self.up.destroy(ctx);
    }
}

pub struct BloomDownPass<'a> {
    pub pipelines: &'a BloomPipelines,
    pub sampler: vk::Sampler,
    pub level: u32,
}
impl RgPass for BloomDownPass<'_> {
    fn kind(&self) -> RgPassKind {
        RgPassKind::Compute
    }

    fn setup(&mut self, builder: &mut RgPassBuilder) {
        declare_down(builder, self.level);
    }

    fn execute(&self, ctx: &RgPassContext<'_>) {
        let src = ctx.image(&down_source(self.level));
        let dst = ctx.image(&names::bloom(self.level));

        let descriptors = PushDescriptors::new().sampled_image(&src, self.sampler).storage_image(dst.storage_view);
        let params = BloomParams {
            dst_extent: glam::uvec2(dst.extent.width, dst.extent.height),
            factor: if self.level == 0 { BLOOM_THRESHOLD } else { 0.0 },
            _padding: 0.0,
        };
        self.pipelines.down.exec(ctx.cmd, &descriptors, &params, group_count_2d(dst.extent, LOCAL_SIZE));
    }
}

pub struct BloomUpPass<'a> {
    pub pipelines: &'a BloomPipelines,
    pub sampler: vk::Sampler,
    pub level: u32,
}
impl RgPass for BloomUpPass<'_> {
    fn kind(&self) -> RgPassKind {
        RgPassKind::Compute
    }

    fn setup(&mut self, builder: &mut RgPassBuilder) {
        declare_up(builder, self.level);
    }

    fn execute(&self, ctx: &RgPassContext<'_>) {
        let src = ctx.image(&names::bloom(self.level));
        let dst = ctx.image(&names::bloom(self.level - 1));

        let descriptors = PushDescriptors::new().sampled_image(&src, self.sampler).storage_image(dst.storage_view);
        let params = BloomParams {
            dst_extent: glam::uvec2(dst.extent.width, dst.extent.height),
            factor: BLOOM_UPSAMPLE_INTENSITY,
            _padding: 0.0,
        };
        self.pipelines.up.exec(ctx.cmd, &descriptors, &params, group_count_2d(dst.extent, LOCAL_SIZE));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extents_halve_per_level() {
        let base = vk::Extent2D {
            width: 1280,
            height: 720,
        };
        assert_eq!(bloom_extent(base, 0), vk::Extent2D { width: 640, height: 360 });
        assert_eq!(bloom_extent(base, 3), vk::Extent2D { width: 80, height: 45 });
        assert_eq!(bloom_extent(base, 12), vk::Extent2D { width: 1, height: 1 });
    }

    #[test]
    fn first_level_reads_hdr() {
        assert_eq!(down_source(0), names::HDR);
        assert_eq!(down_source(2), "bloom_1");
    }
}
