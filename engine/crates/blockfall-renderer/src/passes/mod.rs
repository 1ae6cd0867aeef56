//! 一帧中按固定依赖顺序注册的各个阶段
//!
//! 剔除 → 可见性 → tile 分类 → 着色 → 天空 → bloom → tonemap → UI → present blit
//!
//! 每个阶段的资源声明是一个纯函数（[`Stage::declare`]），真实的 pass 在 `setup` 中调用它，
//! 测试中则用空的闭包 pass 注册同样的声明，不需要 GPU 就可以检查执行顺序与 barrier。

pub mod bloom;
pub mod present_blit;
pub mod shading;
pub mod sky;
pub mod tile_classify;
pub mod tonemap;
pub mod ui_overlay;
pub mod visibility;

use blockfall_render_graph::{RgPassBuilder, RgPassKind};

use crate::culling::indirect_culling;

/// 渲染图中的资源名
pub mod names {
    pub const PER_FRAME: &str = "per_frame";
    pub const OBJECTS: &str = "objects";

    pub const MESH_INFOS: &str = "mesh_infos";
    pub const MATERIALS: &str = "materials";
    pub const VERTICES: &str = "vertices";
    pub const INDICES: &str = "indices";

    pub const DRAW_TEMPLATE: &str = "draw_template";
    pub const DRAW_COMMANDS: &str = "draw_commands";
    pub const COMPACTED: &str = "compacted";
    pub const CULL_READBACK: &str = "cull_readback";

    pub const VISIBILITY: &str = "visibility";
    pub const VISIBILITY_MS: &str = "visibility_ms";
    pub const DEPTH: &str = "depth";
    pub const TILE_FLAGS: &str = "tile_flags";

    pub const HDR: &str = "hdr";
    pub const HDR_HISTORY: &str = "hdr_history";
    pub const SKY_LUT: &str = "sky_lut";
    pub const ENV_CUBE: &str = "env_cube";
    pub const LDR: &str = "ldr";
    pub const SWAPCHAIN: &str = "swapchain";

    /// bloom 链的第 level 级，尺寸为 hdr 的 1/2^(level+1)
    pub fn bloom(level: u32) -> String {
        format!("bloom_{level}")
    }
}

/// 决定本帧注册哪些 pass、每个资源从什么状态开始
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageOptions {
    pub bloom_passes: u32,
    pub multisampled: bool,
    /// 永久池中的 sky LUT 与环境 cube map 需要（重新）生成
    pub bake_sky: bool,
    pub ui_overlay: bool,
    /// debug 下把剔除结果拷贝到 host 可见的 buffer 中，供之后校验
    pub cull_readback: bool,
    /// 交换链池中的资源已经被之前的帧写过，layout 是已知的
    pub swapchain_initialized: bool,
    pub hdr_current_initialized: bool,
    pub hdr_history_initialized: bool,
    /// shading 可以采样上一次提交的帧写入的 hdr
    pub hdr_history_valid: bool,
}
impl Default for StageOptions {
    fn default() -> Self {
        Self {
            bloom_passes: 1,
            multisampled: false,
            bake_sky: true,
            ui_overlay: false,
            cull_readback: false,
            swapchain_initialized: false,
            hdr_current_initialized: false,
            hdr_history_initialized: false,
            hdr_history_valid: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    CullReset,
    Cull,
    CullReadback,
    Visibility,
    TileClassify,
    Shading,
    SkyLut,
    EnvCube,
    Sky,
    BloomDown(u32),
    BloomUp(u32),
    Tonemap,
    UiOverlay,
    PresentBlit,
}
impl Stage {
    pub fn name(self) -> String {
        match self {
            Self::CullReset => "cull-reset".to_string(),
            Self::Cull => "cull".to_string(),
            Self::CullReadback => "cull-readback".to_string(),
            Self::Visibility => "visibility".to_string(),
            Self::TileClassify => "tile-classify".to_string(),
            Self::Shading => "shading".to_string(),
            Self::SkyLut => "sky-lut".to_string(),
            Self::EnvCube => "env-cube".to_string(),
            Self::Sky => "sky".to_string(),
            Self::BloomDown(level) => format!("bloom-down-{level}"),
            Self::BloomUp(level) => format!("bloom-up-{level}"),
            Self::Tonemap => "tonemap".to_string(),
            Self::UiOverlay => "ui-overlay".to_string(),
            Self::PresentBlit => "present-blit".to_string(),
        }
    }

    pub fn kind(self) -> RgPassKind {
        match self {
            Self::CullReset | Self::CullReadback | Self::PresentBlit => RgPassKind::Transfer,
            Self::Visibility | Self::UiOverlay => RgPassKind::Graphics,
            _ => RgPassKind::Compute,
        }
    }

    pub fn declare(self, builder: &mut RgPassBuilder, opts: &StageOptions) {
        match self {
            Self::CullReset => indirect_culling::declare_reset(builder),
            Self::Cull => indirect_culling::declare_cull(builder),
            Self::CullReadback => indirect_culling::declare_readback(builder),
            Self::Visibility => visibility::declare(builder, opts.multisampled),
            Self::TileClassify => tile_classify::declare(builder),
            Self::Shading => shading::declare(builder),
            Self::SkyLut => sky::declare_lut(builder),
            Self::EnvCube => sky::declare_env_cube(builder),
            Self::Sky => sky::declare_composite(builder),
            Self::BloomDown(level) => bloom::declare_down(builder, level),
            Self::BloomUp(level) => bloom::declare_up(builder, level),
            Self::Tonemap => tonemap::declare(builder),
            Self::UiOverlay => ui_overlay::declare(builder),
            Self::PresentBlit => present_blit::declare(builder),
        }
    }
}

/// 本帧按注册顺序排列的阶段
pub fn frame_stages(opts: &StageOptions) -> Vec<Stage> {
    let mut stages = vec![Stage::CullReset, Stage::Cull];
    if opts.cull_readback {
        stages.push(Stage::CullReadback);
    }
    stages.extend([Stage::Visibility, Stage::TileClassify, Stage::Shading]);
    if opts.bake_sky {
        stages.extend([Stage::SkyLut, Stage::EnvCube]);
    }
    stages.push(Stage::Sky);

    let levels = opts.bloom_passes.max(1);
    stages.extend((0..levels).map(Stage::BloomDown));
    stages.extend((1..levels).rev().map(Stage::BloomUp));

    stages.push(Stage::Tonemap);
    if opts.ui_overlay {
        stages.push(Stage::UiOverlay);
    }
    stages.push(Stage::PresentBlit);
    stages
}

#[cfg(test)]
mod tests {
    use ash::vk;
    use blockfall_render_graph::{
        RenderGraph, RgBufferBinding, RgCompiledGraph, RgError, RgImageBinding, resource::RgPhysical,
    };
    use blockfall_render_interface::resource_pool::desc::format_aspect;
    use itertools::Itertools;
    use rstest::rstest;

    use super::*;
    use crate::frame_resources::{AttachmentKind, attach_frame};

    fn null_image(format: vk::Format) -> RgImageBinding {
        RgImageBinding::new(
            vk::Image::null(),
            vk::ImageView::null(),
            format,
            vk::Extent2D {
                width: 64,
                height: 64,
            },
            format_aspect(format),
        )
    }

    /// 用空 pass 注册与真实帧相同的声明
    fn compile_frame(opts: &StageOptions) -> RgCompiledGraph<'static> {
        let mut graph = RenderGraph::new();
        attach_frame(&mut graph, opts, |spec| -> Result<RgPhysical, RgError> {
            Ok(match spec.kind {
                AttachmentKind::ColorImage => RgPhysical::Image(null_image(vk::Format::R8G8B8A8_UNORM)),
                AttachmentKind::DepthImage => RgPhysical::Image(null_image(vk::Format::D32_SFLOAT)),
                AttachmentKind::Buffer => RgPhysical::Buffer(RgBufferBinding::NULL),
            })
        })
        .unwrap();
        for stage in frame_stages(opts) {
            graph.add_pass_fn(stage.name(), stage.kind(), |builder| stage.declare(builder, opts), |_| {}).unwrap();
        }
        graph.compile().unwrap()
    }

    #[test]
    fn stages_keep_the_fixed_order() {
        let opts = StageOptions {
            bloom_passes: 3,
            ui_overlay: true,
            ..Default::default()
        };
        let compiled = compile_frame(&opts);
        let expected = frame_stages(&opts).into_iter().map(Stage::name).collect_vec();
        assert_eq!(compiled.plan().order_names(), expected);
        assert_eq!(
            expected,
            vec![
                "cull-reset",
                "cull",
                "visibility",
                "tile-classify",
                "shading",
                "sky-lut",
                "env-cube",
                "sky",
                "bloom-down-0",
                "bloom-down-1",
                "bloom-down-2",
                "bloom-up-2",
                "bloom-up-1",
                "tonemap",
                "ui-overlay",
                "present-blit",
            ]
        );
    }

    #[test]
    fn culling_results_are_synchronized_before_the_indirect_draw() {
        let compiled = compile_frame(&StageOptions::default());
        let plan = compiled.plan();

        let reset_to_cull = plan.barrier_before("cull", names::DRAW_COMMANDS).unwrap();
        assert_eq!(reset_to_cull.src.access, vk::AccessFlags2::TRANSFER_WRITE);

        let cull_to_draw = plan.barrier_before("visibility", names::DRAW_COMMANDS).unwrap();
        assert!(cull_to_draw.dst.stage.contains(vk::PipelineStageFlags2::DRAW_INDIRECT));
        assert!(plan.barrier_before("visibility", names::COMPACTED).is_some());

        // 静态几何体始终只读
        assert!(plan.barriers_for(names::VERTICES).is_empty());
        assert!(plan.barriers_for(names::MESH_INFOS).is_empty());
    }

    #[test]
    fn swapchain_image_ends_in_present_layout() {
        let compiled = compile_frame(&StageOptions::default());
        let plan = compiled.plan();

        let trailing = plan.trailing_barriers().unwrap();
        let swapchain = trailing.barriers.iter().find(|b| plan.resource_name(b.resource) == names::SWAPCHAIN).unwrap();
        assert_eq!(swapchain.dst.layout, vk::ImageLayout::PRESENT_SRC_KHR);

        let blit = plan.barrier_before("present-blit", names::LDR).unwrap();
        assert_eq!(blit.dst.layout, vk::ImageLayout::TRANSFER_SRC_OPTIMAL);
    }

    #[rstest]
    #[case(true)]
    #[case(false)]
    fn baked_sky_is_only_sampled_on_later_frames(#[case] bake_sky: bool) {
        let opts = StageOptions {
            bake_sky,
            ..Default::default()
        };
        let compiled = compile_frame(&opts);
        let plan = compiled.plan();

        let names = plan.order_names();
        assert_eq!(names.contains(&"sky-lut"), bake_sky);
        assert_eq!(names.contains(&"env-cube"), bake_sky);
        // 已经生成过的 LUT 保持在采样状态，不需要任何 barrier
        assert_eq!(plan.barriers_for(names::SKY_LUT).is_empty(), !bake_sky);
    }

    #[test]
    fn multisampled_visibility_writes_resolve_target() {
        let opts = StageOptions {
            multisampled: true,
            ..Default::default()
        };
        let compiled = compile_frame(&opts);
        let plan = compiled.plan();

        assert!(plan.barrier_before("visibility", names::VISIBILITY_MS).is_some());
        let resolve = plan.barrier_before("visibility", names::VISIBILITY).unwrap();
        assert_eq!(resolve.dst.layout, vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL);
        let classify = plan.barrier_before("tile-classify", names::VISIBILITY).unwrap();
        assert_eq!(classify.dst.layout, vk::ImageLayout::GENERAL);
    }

    #[test]
    fn history_is_sampled_only_after_it_was_written() {
        let first = compile_frame(&StageOptions::default());
        let barrier = first.plan().barrier_before("shading", names::HDR_HISTORY).unwrap();
        assert_eq!(barrier.src.layout, vk::ImageLayout::UNDEFINED);

        let later = compile_frame(&StageOptions {
            swapchain_initialized: true,
            hdr_current_initialized: true,
            hdr_history_initialized: true,
            ..Default::default()
        });
        assert!(later.plan().barrier_before("shading", names::HDR_HISTORY).is_none());
        // 当前帧的 hdr 要等上一轮对它的采样结束
        let current = later.plan().barrier_before("shading", names::HDR).unwrap();
        assert_eq!(current.src.layout, vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL);
    }

    #[test]
    fn readback_follows_culling_when_enabled() {
        let opts = StageOptions {
            cull_readback: true,
            ..Default::default()
        };
        let compiled = compile_frame(&opts);
        let names = compiled.plan().order_names();
        let cull = names.iter().position(|n| *n == "cull").unwrap();
        assert_eq!(names[cull + 1], "cull-readback");
        assert!(compiled.plan().barrier_before("cull-readback", names::DRAW_COMMANDS).is_some());
    }

    #[test]
    fn single_bloom_level_has_no_upsample() {
        let stages = frame_stages(&StageOptions::default());
        assert!(stages.contains(&Stage::BloomDown(0)));
        assert!(!stages.iter().any(|s| matches!(s, Stage::BloomUp(_))));
    }
}
