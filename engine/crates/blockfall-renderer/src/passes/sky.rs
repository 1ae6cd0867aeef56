//! 天空：透射率 LUT 与环境 cube map 只在永久池中生成一次，之后每帧只做合成

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

pub const SKY_LUT_EXTENT: vk::Extent2D = vk::Extent2D {
    width: 256,
    height: 64,
};
pub const ENV_CUBE_SIZE: u32 = 128;

const LOCAL_SIZE: u32 = 8;

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct SkyParams {
    /// xyz: 指向太阳的单位向量，w: 太阳强度
    pub sun_direction: glam::Vec4,
}
impl Default for SkyParams {
    fn default() -> Self {
        Self {
            sun_direction: glam::vec3(0.3, 0.8, 0.5).normalize().extend(20.0),
        }
    }
}

pub fn declare_lut(builder: &mut RgPassBuilder) {
    builder.write(names::SKY_LUT);
}

pub fn declare_env_cube(builder: &mut RgPassBuilder) {
    builder.sampled(names::SKY_LUT).write(names::ENV_CUBE);
}

pub fn declare_composite(builder: &mut RgPassBuilder) {
    builder
        .sampled(names::PER_FRAME)
        .read(names::VISIBILITY)
        .sampled(names::SKY_LUT)
        .sampled(names::ENV_CUBE)
        .read_write(names::HDR);
}

pub struct SkyPipelines {
    lut: ComputePass<SkyParams>,
    env_cube: ComputePass<SkyParams>,
    composite: ComputePass<SkyParams>,

    params: SkyParams,
}
// new & init
impl SkyPipelines {
    pub fn new(ctx: &GfxContext, settings: &RenderSettings) -> GfxResult<Self> {
        let shader = |name: &str| BlockfallPath::spv_path(&settings.shader_dir, name);

        let lut = ComputePass::new(ctx, &shader("sky/sky_lut.comp"), &[vk::DescriptorType::STORAGE_IMAGE], "sky-lut")?;
        let env_cube = match ComputePass::new(
            ctx,
            &shader("sky/env_cube.comp"),
            &[vk::DescriptorType::COMBINED_IMAGE_SAMPLER, vk::DescriptorType::STORAGE_IMAGE],
            "env-cube",
        ) {
            Ok(pass) => pass,
            Err(e) => {
                lut.destroy(ctx);
                return Err(e);
            }
        };
        let composite = match ComputePass::new(
            ctx,
            &shader("sky/sky.comp"),
            &[
                vk::DescriptorType::UNIFORM_BUFFER,
                vk::DescriptorType::STORAGE_IMAGE,
                vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
                vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
                vk::DescriptorType::STORAGE_IMAGE,
            ],
            "sky",
        ) {
            Ok(pass) => pass,
            Err(e) => {
                lut.destroy(ctx);
                env_cube.destroy(ctx);
                return Err(e);
            }
        };

        Ok(Self {
            lut,
            env_cube,
            composite,
            params: SkyParams::default(),
        })
    }
}
// destroy
impl SkyPipelines {
    pub fn destroy(self, ctx: &GfxContext) {
        self.lut.destroy(ctx);
        self.env_cube.destroy(ctx);
        self.composite.destroy(ctx);
    }
}

pub struct SkyLutPass<'a> {
    pub pipelines: &'a SkyPipelines,
}
impl RgPass for SkyLutPass<'_> {
    fn kind(&self) -> RgPassKind {
        RgPassKind::Compute
    }

    fn setup(&mut self, builder: &mut RgPassBuilder) {
        declare_lut(builder);
    }

    fn execute(&self, ctx: &RgPassContext<'_>) {
        let lut = ctx.image(names::SKY_LUT);
        let descriptors = PushDescriptors::new().storage_image(lut.storage_view);
        self.pipelines.lut.exec(ctx.cmd, &descriptors, &self.pipelines.params, group_count_2d(lut.extent, LOCAL_SIZE));
    }
}

pub struct EnvCubePass<'a> {
    pub pipelines: &'a SkyPipelines,
    pub sampler: vk::Sampler,
}
impl RgPass for EnvCubePass<'_> {
    fn kind(&self) -> RgPassKind {
        RgPassKind::Compute
    }

    fn setup(&mut self, builder: &mut RgPassBuilder) {
        declare_env_cube(builder);
    }

    fn execute(&self, ctx: &RgPassContext<'_>) {
        let cube = ctx.image(names::ENV_CUBE);
        let descriptors = PushDescriptors::new()
            .sampled_image(&ctx.image(names::SKY_LUT), self.sampler)
            .storage_image(cube.storage_view);

        // 每个面一层 work group
        let mut group_cnt = group_count_2d(cube.extent, LOCAL_SIZE);
        group_cnt.z = 6;
        self.pipelines.env_cube.exec(ctx.cmd, &descriptors, &self.pipelines.params, group_cnt);
    }
}

/// 在没有几何体的像素上写入天空颜色
pub struct SkyPass<'a> {
    pub pipelines: &'a SkyPipelines,
    pub sampler: vk::Sampler,
}
impl RgPass for SkyPass<'_> {
    fn kind(&self) -> RgPassKind {
        RgPassKind::Compute
    }

    fn setup(&mut self, builder: &mut RgPassBuilder) {
        declare_composite(builder);
    }

    fn execute(&self, ctx: &RgPassContext<'_>) {
        let hdr = ctx.image(names::HDR);
        let descriptors = PushDescriptors::new()
            .uniform_buffer(ctx.buffer(names::PER_FRAME))
            .storage_image(ctx.image(names::VISIBILITY).storage_view)
            .sampled_image(&ctx.image(names::SKY_LUT), self.sampler)
            .sampled_image(&ctx.image(names::ENV_CUBE), self.sampler)
            .storage_image(hdr.storage_view);
        self.pipelines.composite.exec(
            ctx.cmd,
            &descriptors,
            &self.pipelines.params,
            group_count_2d(hdr.extent, LOCAL_SIZE),
        );
    }
}
