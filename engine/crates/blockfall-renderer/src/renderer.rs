use ash::vk;
use blockfall_gfx::{
    commands::{
        command_buffer::GfxCommandBuffer, command_pool::GfxCommandPool, semaphore::GfxSemaphore,
        submit_info::GfxSubmitInfo,
    },
    error::{GfxError, GfxResult},
    gfx_context::GfxContext,
    resources::sampler::{GfxSampler, GfxSamplerDesc},
};
use blockfall_render_graph::{RenderGraph, RgError};
use blockfall_render_interface::{
    frame_counter::{FrameCounter, FrameLabel},
    render_settings::{DefaultRendererSettings, RenderSettings},
    resource_pool::{Buffer, FramePools, TemporalState},
};
use raw_window_handle::{RawDisplayHandle, RawWindowHandle};

use crate::{
    culling::{draw_layout::DrawLayout, gpu_types::GpuDrawCommand, indirect_culling::IndirectCulling},
    error::FrameError,
    frame_data::{PerFrameData, PerFrameInputs},
    frame_resources::{FrameResourceSpec, FrameResources},
    passes::{
        Stage, StageOptions,
        bloom::{BloomDownPass, BloomPipelines, BloomUpPass},
        frame_stages,
        present_blit::PresentBlitPass,
        shading::{ShadingPass, ShadingPipeline},
        sky::{EnvCubePass, SkyLutPass, SkyPass, SkyPipelines},
        tile_classify::{TileClassifyPass, TileClassifyPipeline},
        tonemap::{TonemapParams, TonemapPass, TonemapPipeline},
        ui_overlay::{UiOverlay, UiOverlayPass},
        visibility::{VisibilityPass, VisibilityPipeline},
    },
    platform::{camera::Camera, timer::Timer},
    present::{
        present_flow::{PresentOutcome, acquire_with_retry, present_with_recovery},
        render_present::{PresentSession, RenderPresent},
    },
    scene::{asset_container::AssetContainer, mesh_buffers::MeshBuffers, object_record::ObjectRecord, object_record::collect_gpu_objects},
};

const WAIT_SEMAPHORE_TIMEOUT_NS: u64 = 30 * 1000 * 1000 * 1000; // 30s

/// 一帧的外部输入
pub struct FrameInput<'a> {
    pub camera: &'a Camera,
    /// 游戏逻辑提供的物体，不存在或不可见的会在上传前被过滤
    pub records: &'a [ObjectRecord],
    pub overlay: Option<&'a dyn UiOverlay>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    Presented,
    /// 交换链在 present 时过期，画面被丢弃
    Dropped,
    /// 交换链重建之后仍然无法 acquire，这一帧没有渲染
    Skipped,
}

/// 各个阶段的 pipeline
struct StagePipelines {
    visibility: VisibilityPipeline,
    tile_classify: TileClassifyPipeline,
    shading: ShadingPipeline,
    sky: SkyPipelines,
    bloom: BloomPipelines,
    tonemap: TonemapPipeline,
}
impl StagePipelines {
    fn new(ctx: &GfxContext, settings: &RenderSettings, depth_format: vk::Format) -> GfxResult<Self> {
        let _span = tracy_client::span!("StagePipelines::new");

        // 任意一步失败时销毁已经创建的部分
        let visibility = VisibilityPipeline::new(ctx, settings, depth_format)?;
        let tile_classify = match TileClassifyPipeline::new(ctx, settings) {
            Ok(tile_classify) => tile_classify,
            Err(e) => {
                visibility.destroy(ctx);
                return Err(e);
            }
        };
        let shading = match ShadingPipeline::new(ctx, settings) {
            Ok(shading) => shading,
            Err(e) => {
                visibility.destroy(ctx);
                tile_classify.destroy(ctx);
                return Err(e);
            }
        };
        let sky = match SkyPipelines::new(ctx, settings) {
            Ok(sky) => sky,
            Err(e) => {
                visibility.destroy(ctx);
                tile_classify.destroy(ctx);
                shading.destroy(ctx);
                return Err(e);
            }
        };
        let bloom = match BloomPipelines::new(ctx, settings) {
            Ok(bloom) => bloom,
            Err(e) => {
                visibility.destroy(ctx);
                tile_classify.destroy(ctx);
                shading.destroy(ctx);
                sky.destroy(ctx);
                return Err(e);
            }
        };
        let tonemap = match TonemapPipeline::new(ctx, settings) {
            Ok(tonemap) => tonemap,
            Err(e) => {
                visibility.destroy(ctx);
                tile_classify.destroy(ctx);
                shading.destroy(ctx);
                sky.destroy(ctx);
                bloom.destroy(ctx);
                return Err(e);
            }
        };

        Ok(Self {
            visibility,
            tile_classify,
            shading,
            sky,
            bloom,
            tonemap,
        })
    }

    fn destroy(self, ctx: &GfxContext) {
        self.visibility.destroy(ctx);
        self.tile_classify.destroy(ctx);
        self.shading.destroy(ctx);
        self.sky.destroy(ctx);
        self.bloom.destroy(ctx);
        self.tonemap.destroy(ctx);
    }
}

/// 每个 frame slot 一个 command pool，slot 空闲之后整体 reset
struct FrameCommands {
    pools: Vec<GfxCommandPool>,
    cmds: Vec<GfxCommandBuffer>,
}
impl FrameCommands {
    fn new(ctx: &GfxContext) -> GfxResult<Self> {
        let mut commands = Self {
            pools: Vec::with_capacity(FrameCounter::fif_count()),
            cmds: Vec::with_capacity(FrameCounter::fif_count()),
        };
        for label in FrameCounter::frame_labels() {
            let created = GfxCommandPool::new(
                ctx.device().clone(),
                ctx.gfx_queue().queue_family().clone(),
                vk::CommandPoolCreateFlags::TRANSIENT | vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER,
                &format!("frame-{label}"),
            )
            .and_then(|pool| match GfxCommandBuffer::new(&pool, &format!("frame-{label}")) {
                Ok(cmd) => Ok((pool, cmd)),
                Err(e) => {
                    pool.destroy();
                    Err(e)
                }
            });
            match created {
                Ok((pool, cmd)) => {
                    commands.pools.push(pool);
                    commands.cmds.push(cmd);
                }
                Err(e) => {
                    commands.destroy();
                    return Err(e);
                }
            }
        }
        Ok(commands)
    }

    fn destroy(self) {
        for pool in self.pools {
            pool.destroy();
        }
    }
}

/// 帧调度
///
/// # 渲染流程
/// ```ignore
/// renderer.begin_frame(ctx)?;                 // 等待 slot 空闲，reset per-frame 池
/// let outcome = renderer.render_frame(ctx, &input)?; // acquire，构建并提交渲染图，present
/// renderer.end_frame(ctx)?;                   // 标记 slot 的工作，推进帧序号
/// ```
pub struct Renderer {
    settings: RenderSettings,
    frame_counter: FrameCounter,
    timer: Timer,

    pools: FramePools<GfxContext>,
    temporal: TemporalState,

    fif_timeline_semaphore: GfxSemaphore,
    commands: FrameCommands,

    present: RenderPresent,
    pipelines: StagePipelines,
    linear_clamp: GfxSampler,
    culling: IndirectCulling,
    meshes: MeshBuffers,

    depth_format: vk::Format,
    /// 天空 LUT 与环境贴图在永久池中，只需要生成一次
    sky_baked: bool,
    last_plan_hash: Option<u64>,
    /// present 报告 suboptimal 或窗口尺寸变化，下一帧开始前重建
    needs_recreate: bool,
    /// 交换链池 reset 之后成功提交的帧数
    frames_since_swapchain_reset: u64,
}

// new & init
impl Renderer {
    pub fn new(
        ctx: &GfxContext,
        settings: RenderSettings,
        raw_display_handle: RawDisplayHandle,
        raw_window_handle: RawWindowHandle,
        window_extent: vk::Extent2D,
        assets: &AssetContainer,
    ) -> Result<Self, FrameError> {
        let _span = tracy_client::span!("Renderer::new");
        settings.validate()?;

        let depth_format = Self::get_depth_format(ctx)?;
        // 初始值应该是 1，因为 timeline semaphore 初始值是 0
        let frame_counter = FrameCounter::new(1, settings.frame_limit);
        let fif_timeline_semaphore = GfxSemaphore::new_timeline(ctx, 0, "render-timeline")?;

        let pipelines = StagePipelines::new(ctx, &settings, depth_format)?;
        let culling = match IndirectCulling::new(ctx, &settings) {
            Ok(culling) => culling,
            Err(e) => {
                pipelines.destroy(ctx);
                return Err(e.into());
            }
        };
        let linear_clamp = match GfxSampler::new(ctx, &GfxSamplerDesc::linear_clamp(), "linear-clamp") {
            Ok(sampler) => sampler,
            Err(e) => {
                pipelines.destroy(ctx);
                culling.destroy(ctx);
                return Err(e.into());
            }
        };
        let commands = match FrameCommands::new(ctx) {
            Ok(commands) => commands,
            Err(e) => {
                pipelines.destroy(ctx);
                culling.destroy(ctx);
                linear_clamp.destroy(ctx);
                return Err(e.into());
            }
        };
        let present = match RenderPresent::new(
            ctx,
            raw_display_handle,
            raw_window_handle,
            settings.present_mode.vk_present_mode(),
            window_extent,
        ) {
            Ok(present) => present,
            Err(e) => {
                pipelines.destroy(ctx);
                culling.destroy(ctx);
                linear_clamp.destroy(ctx);
                commands.destroy();
                return Err(e.into());
            }
        };

        let mut pools = FramePools::new();
        let meshes = match MeshBuffers::upload(ctx, &mut pools, assets) {
            Ok(meshes) => meshes,
            Err(e) => {
                pools.destroy(ctx);
                pipelines.destroy(ctx);
                culling.destroy(ctx);
                linear_clamp.destroy(ctx);
                commands.destroy();
                present.destroy(ctx);
                return Err(e.into());
            }
        };
        log::info!("static geometry uploaded: {}", meshes.describe());

        Ok(Self {
            settings,
            frame_counter,
            timer: Timer::default(),
            pools,
            temporal: TemporalState::new(),
            fif_timeline_semaphore,
            commands,
            present,
            pipelines,
            linear_clamp,
            culling,
            meshes,
            depth_format,
            sky_baked: false,
            last_plan_hash: None,
            needs_recreate: false,
            frames_since_swapchain_reset: 0,
        })
    }

    /// 根据 vulkan 实例和显卡，获取合适的深度格式
    fn get_depth_format(ctx: &GfxContext) -> GfxResult<vk::Format> {
        ctx.find_supported_format(
            DefaultRendererSettings::DEPTH_FORMAT_CANDIDATES,
            vk::ImageTiling::OPTIMAL,
            vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT,
        )
        .ok_or(GfxError::NoSuitableDevice)
    }
}

// destroy
impl Renderer {
    pub fn destroy(self, ctx: &GfxContext) {
        let _span = tracy_client::span!("Renderer::destroy");

        // 在 Renderer 被销毁时，等待设备空闲
        if let Err(e) = ctx.wait_idle() {
            log::error!("wait idle before renderer destroy failed: {}", e);
        }

        self.pools.log_stats();
        self.pools.destroy(ctx);
        self.pipelines.destroy(ctx);
        self.culling.destroy(ctx);
        self.linear_clamp.destroy(ctx);
        self.commands.destroy();
        self.present.destroy(ctx);
        self.fif_timeline_semaphore.destroy(ctx);
    }
}

// getters
impl Renderer {
    #[inline]
    pub fn frame_label(&self) -> FrameLabel {
        self.frame_counter.frame_label()
    }

    #[inline]
    pub fn frame_id(&self) -> u64 {
        self.frame_counter.frame_id()
    }

    #[inline]
    pub fn settings(&self) -> &RenderSettings {
        &self.settings
    }

    #[inline]
    pub fn pools(&self) -> &FramePools<GfxContext> {
        &self.pools
    }

    #[inline]
    pub fn delta_time_s(&self) -> f32 {
        self.timer.delta_time_s()
    }

    /// 距离上一帧是否已经达到帧率上限对应的间隔
    #[inline]
    pub fn time_to_render(&self) -> bool {
        self.timer.frame_due(self.frame_counter.frame_limit())
    }
}

// phase call
impl Renderer {
    pub fn begin_frame(&mut self, ctx: &GfxContext) -> Result<(), FrameError> {
        let _span = tracy_client::span!("Renderer::begin_frame");
        let label = self.frame_counter.frame_label();

        // 等待 fif 的同一帧渲染完成
        {
            let _span = tracy_client::span!("wait fif timeline");
            self.fif_timeline_semaphore
                .wait_timeline(ctx, self.frame_counter.slot_reuse_wait_value(), WAIT_SEMAPHORE_TIMEOUT_NS)
                .map_err(FrameError::DeviceFatal)?;
        }

        // readback 位于即将 reset 的 per-frame 池中
        self.culling.verify_readback(ctx, &self.pools, label)?;

        // 清理 fif 资源
        self.pools.begin_frame(ctx, label);
        self.commands.pools[*label].reset_all_buffers()?;

        self.timer.tick();
        Ok(())
    }

    pub fn render_frame(&mut self, ctx: &GfxContext, input: &FrameInput<'_>) -> Result<FrameOutcome, FrameError> {
        let _span = tracy_client::span!("Renderer::render_frame");
        let label = self.frame_counter.frame_label();

        if self.settings.take_flush_temporal() {
            log::info!("{} temporal history flushed", self.frame_counter.frame_name());
            self.temporal.invalidate();
        }
        if self.needs_recreate {
            self.recreate_swapchain(ctx)?;
        }

        let acquired = acquire_with_retry(&mut PresentSession { present: &mut self.present, ctx }, label)?;
        let Some(acquired) = acquired else {
            self.needs_recreate = true;
            return Ok(FrameOutcome::Skipped);
        };
        if acquired.recreated {
            self.on_swapchain_recreated(ctx);
        }
        if acquired.image.suboptimal {
            self.needs_recreate = true;
        }
        let image_index = acquired.image.image_index;

        let (layout, readback) = match self.record_and_submit(ctx, input, image_index) {
            Ok(submitted) => submitted,
            Err(err) if err.is_fatal() => return Err(err),
            Err(err) => {
                // 不提交这一帧，但 acquire 的 semaphore 与图像必须归还
                log::error!("{} dropped: {}", self.frame_counter.frame_name(), err);
                self.present.abandon_acquired(ctx, &self.commands.cmds[*label], label, image_index)?;
                return Err(err);
            }
        };

        self.frames_since_swapchain_reset += 1;
        self.temporal.end_frame();
        self.sky_baked = true;
        if let Some(readback) = readback {
            self.culling.remember_readback(label, self.frame_counter.frame_id(), layout, readback);
        }

        let outcome = present_with_recovery(&mut PresentSession { present: &mut self.present, ctx }, image_index)?;
        Ok(match outcome {
            PresentOutcome::Presented => FrameOutcome::Presented,
            PresentOutcome::Suboptimal => {
                self.needs_recreate = true;
                FrameOutcome::Presented
            }
            PresentOutcome::Dropped => {
                self.on_swapchain_recreated(ctx);
                FrameOutcome::Dropped
            }
        })
    }

    pub fn end_frame(&mut self, ctx: &GfxContext) -> Result<(), FrameError> {
        let _span = tracy_client::span!("Renderer::end_frame");

        // 设置当前帧结束的 semaphore，用于保护当前帧的资源
        let submit_info = GfxSubmitInfo::new(&[]).signal(
            &self.fif_timeline_semaphore,
            vk::PipelineStageFlags2::NONE,
            Some(self.frame_counter.frame_id()),
        );
        ctx.gfx_queue().submit(std::slice::from_ref(&submit_info), None).map_err(FrameError::DeviceFatal)?;

        self.frame_counter.next_frame();
        Ok(())
    }
}

// update
impl Renderer {
    /// 窗口尺寸变化，下一帧开始前重建交换链
    pub fn resize(&mut self, extent: vk::Extent2D) {
        self.present.set_window_extent(extent);
        self.needs_recreate = true;
    }

    /// 替换渲染配置
    ///
    /// 抗锯齿与 bloom 级数决定交换链池中资源的描述，改变时整体 reset 交换链池
    pub fn update_settings(&mut self, ctx: &GfxContext, settings: RenderSettings) -> Result<(), FrameError> {
        let _span = tracy_client::span!("Renderer::update_settings");
        settings.validate()?;

        let samples_changed = settings.sample_count() != self.pipelines.visibility.samples();
        let bloom_changed = settings.bloom_passes != self.settings.bloom_passes;
        if samples_changed || bloom_changed {
            ctx.wait_idle().map_err(FrameError::DeviceFatal)?;
            if samples_changed {
                let visibility = VisibilityPipeline::new(ctx, &settings, self.depth_format)?;
                let old = std::mem::replace(&mut self.pipelines.visibility, visibility);
                old.destroy(ctx);
            }
            self.reset_swapchain_pool(ctx);
        }
        if settings.present_mode != self.settings.present_mode {
            self.present.set_present_mode(settings.present_mode.vk_present_mode());
            self.needs_recreate = true;
        }
        if settings.tonemap != self.settings.tonemap {
            log::debug!("tonemap settings changed: {:?}", settings.tonemap);
        }
        self.frame_counter.set_frame_limit(settings.frame_limit);

        // 尚未被消费的 flush 请求保留
        let flush = settings.flush_temporal || self.settings.flush_temporal;
        self.settings = settings;
        self.settings.flush_temporal = flush;
        Ok(())
    }
}

// tools
impl Renderer {
    fn recreate_swapchain(&mut self, ctx: &GfxContext) -> Result<(), FrameError> {
        self.present.rebuild(ctx)?;
        self.on_swapchain_recreated(ctx);
        self.needs_recreate = false;
        Ok(())
    }

    /// 交换链重建之后，交换链尺寸相关的资源全部重新申请
    fn on_swapchain_recreated(&mut self, ctx: &GfxContext) {
        self.reset_swapchain_pool(ctx);
        self.needs_recreate = false;
    }

    /// 调用方需要保证设备空闲
    fn reset_swapchain_pool(&mut self, ctx: &GfxContext) {
        self.pools.on_swapchain_recreated(ctx);
        self.temporal.on_resources_recreated();
        self.frames_since_swapchain_reset = 0;
    }

    /// 构建、编译并提交本帧的渲染图
    ///
    /// 返回本帧的绘制布局以及剔除结果的 readback buffer
    fn record_and_submit(
        &mut self,
        ctx: &GfxContext,
        input: &FrameInput<'_>,
        image_index: u32,
    ) -> Result<(DrawLayout, Option<Buffer<GpuDrawCommand>>), FrameError> {
        let _span = tracy_client::span!("Renderer::record_and_submit");
        let label = self.frame_counter.frame_label();
        let frame_id = self.frame_counter.frame_id();
        let extent = self.present.extent();

        let objects = collect_gpu_objects(input.records, self.meshes.mesh_infos(), self.settings.max_objects as usize);
        let layout = DrawLayout::build(self.meshes.mesh_infos(), &objects);

        let spec = FrameResourceSpec {
            extent,
            depth_format: self.depth_format,
            max_objects: self.settings.max_objects,
            mesh_count: self.meshes.mesh_count(),
            bloom_passes: self.settings.bloom_passes,
            samples: self.settings.is_multisampled().then(|| self.settings.sample_count()),
            cull_readback: self.culling.readback_enabled(),
        };
        let resources = FrameResources::acquire(&mut self.pools, ctx, label, &spec)?;

        let per_frame = PerFrameData::new(&PerFrameInputs {
            camera: input.camera,
            resolution: extent,
            time_s: self.timer.total_time_s(),
            delta_time_s: self.timer.delta_time_s(),
            frame_id,
            object_count: layout.object_count(),
        });
        resources.upload(ctx, &self.pools, &per_frame, &objects, &layout)?;

        let opts = StageOptions {
            bloom_passes: self.settings.bloom_passes,
            multisampled: resources.visibility.is_multisampled(),
            bake_sky: !self.sky_baked,
            ui_overlay: input.overlay.is_some(),
            cull_readback: resources.cull_readback.is_some(),
            swapchain_initialized: self.frames_since_swapchain_reset > 0,
            ..temporal_stage_options(&self.temporal)
        };

        let cmd = &self.commands.cmds[*label];
        let shape_hash = {
            let mut graph = RenderGraph::new();
            resources.attach(
                &mut graph,
                &self.pools,
                &self.meshes,
                &self.temporal,
                &opts,
                self.present.image_binding(image_index),
            )?;
            self.culling.register(&mut graph, frame_id, &layout)?;
            for stage in frame_stages(&opts) {
                self.register_stage(&mut graph, stage, &opts, &layout, input.overlay)?;
            }

            let compiled = graph.compile()?;
            let shape_hash = compiled.plan().shape_hash();
            // 图的形状变化时才打印
            if self.last_plan_hash != Some(shape_hash) {
                compiled.print_execution_plan();
                self.pools.log_stats();
            }

            cmd.begin(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT, &self.frame_counter.frame_name())?;
            compiled.execute(cmd);
            cmd.end()?;
            shape_hash
        };
        self.last_plan_hash = Some(shape_hash);

        // 等待 swapchain 的 image 准备好；通知 swapchain 的 image 已经绘制完成
        let cmd = &self.commands.cmds[*label];
        let submit_info = GfxSubmitInfo::new(std::slice::from_ref(cmd))
            .wait(self.present.present_complete_semaphore(label), vk::PipelineStageFlags2::ALL_COMMANDS, None)
            .signal(self.present.render_complete_semaphore(image_index), vk::PipelineStageFlags2::ALL_COMMANDS, None);
        ctx.gfx_queue().submit(std::slice::from_ref(&submit_info), None).map_err(FrameError::DeviceFatal)?;

        Ok((layout, resources.cull_readback))
    }

    /// 剔除阶段由 [`IndirectCulling::register`] 注册
    fn register_stage<'a>(
        &'a self,
        graph: &mut RenderGraph<'a>,
        stage: Stage,
        opts: &StageOptions,
        layout: &DrawLayout,
        overlay: Option<&'a dyn UiOverlay>,
    ) -> Result<(), RgError> {
        let pipelines = &self.pipelines;
        let sampler = self.linear_clamp.handle();
        let name = stage.name();

        match stage {
            Stage::CullReset | Stage::Cull | Stage::CullReadback => Ok(()),
            Stage::Visibility => graph.add_pass(
                name,
                VisibilityPass {
                    pipeline: &pipelines.visibility,
                    multisampled: opts.multisampled,
                    draw_count: layout.mesh_count() as u32,
                },
            ),
            Stage::TileClassify => graph.add_pass(
                name,
                TileClassifyPass {
                    pipeline: &pipelines.tile_classify,
                },
            ),
            Stage::Shading => graph.add_pass(
                name,
                ShadingPass {
                    pipeline: &pipelines.shading,
                    sampler,
                    history_valid: opts.hdr_history_valid,
                },
            ),
            Stage::SkyLut => graph.add_pass(
                name,
                SkyLutPass {
                    pipelines: &pipelines.sky,
                },
            ),
            Stage::EnvCube => graph.add_pass(
                name,
                EnvCubePass {
                    pipelines: &pipelines.sky,
                    sampler,
                },
            ),
            Stage::Sky => graph.add_pass(
                name,
                SkyPass {
                    pipelines: &pipelines.sky,
                    sampler,
                },
            ),
            Stage::BloomDown(level) => graph.add_pass(
                name,
                BloomDownPass {
                    pipelines: &pipelines.bloom,
                    sampler,
                    level,
                },
            ),
            Stage::BloomUp(level) => graph.add_pass(
                name,
                BloomUpPass {
                    pipelines: &pipelines.bloom,
                    sampler,
                    level,
                },
            ),
            Stage::Tonemap => graph.add_pass(
                name,
                TonemapPass {
                    pipeline: &pipelines.tonemap,
                    sampler,
                    params: TonemapParams::new(&self.settings.tonemap),
                },
            ),
            Stage::UiOverlay => match overlay {
                Some(overlay) => graph.add_pass(name, UiOverlayPass { overlay }),
                None => Ok(()),
            },
            Stage::PresentBlit => graph.add_pass(name, PresentBlitPass),
        }
    }
}

/// HDR 双缓冲在本帧的状态，只有提交过的帧会推进它
fn temporal_stage_options(temporal: &TemporalState) -> StageOptions {
    StageOptions {
        hdr_current_initialized: temporal.current_initialized(),
        hdr_history_initialized: temporal.previous_initialized(),
        hdr_history_valid: temporal.history_valid(),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use blockfall_render_graph::RgAccess;
    use blockfall_render_interface::resource_pool::{
        ImageDesc, PoolScope, ResourcePool, TemporalTexture, mock::MockAllocator,
    };

    use super::*;
    use crate::{frame_resources::frame_attachments, passes::names};

    fn initial_access(opts: &StageOptions, name: &str) -> RgAccess {
        frame_attachments(opts).into_iter().find(|spec| spec.name == name).map(|spec| spec.initial).unwrap()
    }

    #[test]
    fn skipped_frame_does_not_advance_history() {
        let alloc = MockAllocator::default();
        let mut pool = ResourcePool::new(PoolScope::Swapchain);
        let desc = ImageDesc::texture_2d(
            vk::Format::R16G16B16A16_SFLOAT,
            vk::Extent2D { width: 32, height: 32 },
            vk::ImageUsageFlags::STORAGE | vk::ImageUsageFlags::SAMPLED,
        );
        let hdr = TemporalTexture::acquire(&mut pool, &alloc, "hdr", desc).unwrap();
        let mut temporal = TemporalState::new();

        // 第一帧提交
        let opts = temporal_stage_options(&temporal);
        assert!(!opts.hdr_history_valid);
        assert_eq!(initial_access(&opts, names::HDR), RgAccess::Undefined);
        let submitted = hdr.current(&temporal);
        temporal.end_frame();

        // 第二帧 acquire 失败被跳过，render_frame 不会调用 end_frame

        // 第三帧采样第一帧写入的内容，写入的是从未写过的那一张
        let opts = temporal_stage_options(&temporal);
        assert!(opts.hdr_history_valid);
        assert_eq!(hdr.previous(&temporal), Some(submitted));
        assert_ne!(hdr.current(&temporal), submitted);
        assert_eq!(initial_access(&opts, names::HDR_HISTORY), RgAccess::Sampled);
        assert_eq!(initial_access(&opts, names::HDR), RgAccess::Undefined);

        pool.destroy(&alloc);
    }

    #[test]
    fn flushed_frame_does_not_sample_history() {
        let mut temporal = TemporalState::new();
        temporal.end_frame();
        temporal.end_frame();
        temporal.invalidate();

        let opts = temporal_stage_options(&temporal);
        assert!(!opts.hdr_history_valid);
        // 纹理内容仍然是已知 layout
        assert_eq!(initial_access(&opts, names::HDR), RgAccess::Sampled);
    }
}
