use ash::vk;
use blockfall_gfx::{commands::command_buffer::GfxCommandBuffer, error::GfxResult, gfx_context::GfxContext};
use blockfall_render_graph::{RenderGraph, RgError, RgPass, RgPassBuilder, RgPassContext, RgPassKind};
use blockfall_render_interface::{
    frame_counter::{FrameCounter, FrameLabel},
    render_settings::RenderSettings,
    resource_pool::{Buffer, FramePools, PoolError},
};

use crate::{
    culling::{
        counter_guard::CullCounterGuard,
        draw_layout::{DrawLayout, non_empty_draws},
        gpu_types::{CullPushConstants, GpuDrawCommand},
    },
    passes::names,
    pipelines::{compute_pass::ComputePass, descriptors::PushDescriptors},
};

/// cull.comp 的 local_size_x
pub const CULL_GROUP_SIZE: u32 = 64;

const CULL_BINDINGS: [vk::DescriptorType; 5] = [
    vk::DescriptorType::UNIFORM_BUFFER,
    vk::DescriptorType::STORAGE_BUFFER,
    vk::DescriptorType::STORAGE_BUFFER,
    vk::DescriptorType::STORAGE_BUFFER,
    vk::DescriptorType::STORAGE_BUFFER,
];

pub fn declare_reset(builder: &mut RgPassBuilder) {
    builder.transfer_src(names::DRAW_TEMPLATE).transfer_dst(names::DRAW_COMMANDS);
}

pub fn declare_cull(builder: &mut RgPassBuilder) {
    builder
        .sampled(names::PER_FRAME)
        .read(names::OBJECTS)
        .read(names::MESH_INFOS)
        .read_write(names::DRAW_COMMANDS)
        .write(names::COMPACTED);
}

pub fn declare_readback(builder: &mut RgPassBuilder) {
    builder.transfer_src(names::DRAW_COMMANDS).transfer_dst(names::CULL_READBACK);
}

/// 等到该帧槽位再次轮到时校验的剔除结果
struct PendingCheck {
    frame_id: u64,
    layout: DrawLayout,
    readback: Buffer<GpuDrawCommand>,
}

/// GPU 上的视锥剔除与实例压缩
///
/// 每帧三个步骤：
/// 1. transfer：把 instance_count 全为 0 的命令模板拷贝到命令 buffer
/// 2. compute：每个物体一个线程做视锥测试，通过的物体写入所属 mesh 的区域
/// 3. debug 下把命令 buffer 拷贝到 host 可见的 buffer，供之后校验计数器
pub struct IndirectCulling {
    pass: ComputePass<CullPushConstants>,
    guard: CullCounterGuard,

    readback_enabled: bool,
    pending_checks: [Option<PendingCheck>; FrameCounter::fif_count()],
}
// new & init
impl IndirectCulling {
    pub fn new(ctx: &GfxContext, settings: &RenderSettings) -> GfxResult<Self> {
        let shader_path = blockfall_crate_tools::resource::BlockfallPath::spv_path(&settings.shader_dir, "cull/cull_objects.comp");
        let pass = ComputePass::new(ctx, &shader_path, &CULL_BINDINGS, "cull-objects")?;

        Ok(Self {
            pass,
            guard: CullCounterGuard::new(),
            readback_enabled: cfg!(debug_assertions),
            pending_checks: array_init::array_init(|_| None),
        })
    }
}
// destroy
impl IndirectCulling {
    pub fn destroy(self, ctx: &GfxContext) {
        self.pass.destroy(ctx);
    }
}
// getters
impl IndirectCulling {
    #[inline]
    pub fn readback_enabled(&self) -> bool {
        self.readback_enabled
    }
}
// update
impl IndirectCulling {
    /// 注册本帧的剔除 pass
    ///
    /// 没有物体时同样清零并派发一组，保证计数器处于确定的 0
    pub fn register<'a>(
        &'a self,
        graph: &mut RenderGraph<'a>,
        frame_id: u64,
        layout: &DrawLayout,
    ) -> Result<(), RgError> {
        let _span = tracy_client::span!("IndirectCulling::register");

        graph.add_pass(
            "cull-reset",
            CullResetPass {
                guard: &self.guard,
                frame_id,
                command_bytes: Buffer::<GpuDrawCommand>::byte_size_of(layout.mesh_count() as u64),
            },
        )?;
        graph.add_pass(
            "cull",
            CullPass {
                pass: &self.pass,
                guard: &self.guard,
                frame_id,
                params: CullPushConstants {
                    object_count: layout.object_count(),
                    mesh_count: layout.mesh_count() as u32,
                },
                group_count: layout.dispatch_groups(CULL_GROUP_SIZE),
            },
        )?;
        if self.readback_enabled {
            graph.add_pass(
                "cull-readback",
                CullReadbackPass {
                    command_bytes: Buffer::<GpuDrawCommand>::byte_size_of(layout.mesh_count().max(1) as u64),
                },
            )?;
        }
        Ok(())
    }

    /// 记录本帧的绘制布局，等该槽位下次开始时校验
    pub fn remember_readback(
        &mut self,
        label: FrameLabel,
        frame_id: u64,
        layout: DrawLayout,
        readback: Buffer<GpuDrawCommand>,
    ) {
        if self.readback_enabled {
            self.pending_checks[*label] = Some(PendingCheck {
                frame_id,
                layout,
                readback,
            });
        }
    }

    /// 槽位的 GPU 工作确认完成之后、per-frame 池 reset 之前调用
    pub fn verify_readback(
        &mut self,
        ctx: &GfxContext,
        pools: &FramePools<GfxContext>,
        label: FrameLabel,
    ) -> Result<(), PoolError> {
        let Some(check) = self.pending_checks[*label].take() else {
            return Ok(());
        };
        let _span = tracy_client::span!("IndirectCulling::verify_readback");

        let commands: Vec<GpuDrawCommand> =
            pools.buffer(check.readback)?.read_by_mmap(ctx, check.layout.mesh_count())?;
        if let Err(msg) = check.layout.validate_counters(&commands) {
            log::error!("culling counters of frame {} are inconsistent: {}", check.frame_id, msg);
            debug_assert!(false, "culling counters of frame {} are inconsistent: {}", check.frame_id, msg);
        } else {
            log::trace!(
                "frame {}: {} of {} draws survived culling",
                check.frame_id,
                non_empty_draws(&commands),
                commands.len()
            );
        }
        Ok(())
    }
}

struct CullResetPass<'a> {
    guard: &'a CullCounterGuard,
    frame_id: u64,
    command_bytes: vk::DeviceSize,
}
impl RgPass for CullResetPass<'_> {
    fn kind(&self) -> RgPassKind {
        RgPassKind::Transfer
    }

    fn setup(&mut self, builder: &mut RgPassBuilder) {
        declare_reset(builder);
    }

    fn execute(&self, ctx: &RgPassContext<'_>) {
        let template = ctx.buffer(names::DRAW_TEMPLATE);
        let commands = ctx.buffer(names::DRAW_COMMANDS);

        if self.command_bytes == 0 {
            // 没有 mesh 时命令 buffer 只有一个占位元素，清零即可
            ctx.cmd.cmd_fill_buffer(commands.buffer, 0, vk::WHOLE_SIZE, 0);
        } else {
            copy_buffer(ctx.cmd, template.buffer, commands.buffer, self.command_bytes);
        }
        self.guard.mark_reset(self.frame_id);
    }
}

struct CullPass<'a> {
    pass: &'a ComputePass<CullPushConstants>,
    guard: &'a CullCounterGuard,
    frame_id: u64,
    params: CullPushConstants,
    group_count: u32,
}
impl RgPass for CullPass<'_> {
    fn kind(&self) -> RgPassKind {
        RgPassKind::Compute
    }

    fn setup(&mut self, builder: &mut RgPassBuilder) {
        declare_cull(builder);
    }

    fn execute(&self, ctx: &RgPassContext<'_>) {
        self.guard.check_before_dispatch(self.frame_id);

        let descriptors = PushDescriptors::new()
            .uniform_buffer(ctx.buffer(names::PER_FRAME))
            .storage_buffer(ctx.buffer(names::OBJECTS))
            .storage_buffer(ctx.buffer(names::MESH_INFOS))
            .storage_buffer(ctx.buffer(names::DRAW_COMMANDS))
            .storage_buffer(ctx.buffer(names::COMPACTED));
        self.pass.exec(ctx.cmd, &descriptors, &self.params, glam::uvec3(self.group_count, 1, 1));
    }
}

struct CullReadbackPass {
    command_bytes: vk::DeviceSize,
}
impl RgPass for CullReadbackPass {
    fn kind(&self) -> RgPassKind {
        RgPassKind::Transfer
    }

    fn setup(&mut self, builder: &mut RgPassBuilder) {
        declare_readback(builder);
    }

    fn execute(&self, ctx: &RgPassContext<'_>) {
        let commands = ctx.buffer(names::DRAW_COMMANDS);
        let readback = ctx.buffer(names::CULL_READBACK);
        copy_buffer(ctx.cmd, commands.buffer, readback.buffer, self.command_bytes);

        // host 读取不在渲染图的访问模型中，单独加一个 barrier
        ctx.cmd.memory_barrier(&[vk::MemoryBarrier2::default()
            .src_stage_mask(vk::PipelineStageFlags2::TRANSFER)
            .src_access_mask(vk::AccessFlags2::TRANSFER_WRITE)
            .dst_stage_mask(vk::PipelineStageFlags2::HOST)
            .dst_access_mask(vk::AccessFlags2::HOST_READ)]);
    }
}

#[inline]
fn copy_buffer(cmd: &GfxCommandBuffer, src: vk::Buffer, dst: vk::Buffer, size: vk::DeviceSize) {
    cmd.cmd_copy_buffer_raw(
        src,
        dst,
        &[vk::BufferCopy {
            src_offset: 0,
            dst_offset: 0,
            size,
        }],
    );
}
