use ash::vk;
use blockfall_gfx::{
    basic::color::LabelColor,
    commands::{
        barrier::{GfxBufferBarrier, GfxImageBarrier},
        command_buffer::GfxCommandBuffer,
    },
};
use itertools::Itertools;

use crate::{
    barrier::RgBarrierBatch,
    pass::{RgPassContext, RgPassResources},
    plan::{RgExecutionPlan, RgPlanStep},
    render_graph::RgPassNode,
    resource::{RgPhysical, RgResourceRegistry},
    resource_state::{format_access_flags, format_pipeline_stage},
};

/// 编译后的渲染图
///
/// 包含执行顺序和预计算的 barrier，可以直接录制到命令缓冲区
pub struct RgCompiledGraph<'a> {
    resources: RgResourceRegistry,
    passes: Vec<RgPassNode<'a>>,
    plan: RgExecutionPlan,
}
// new & init
impl<'a> RgCompiledGraph<'a> {
    pub(crate) fn new(resources: RgResourceRegistry, passes: Vec<RgPassNode<'a>>, plan: RgExecutionPlan) -> Self {
        Self { resources, passes, plan }
    }
}
// getters
impl RgCompiledGraph<'_> {
    #[inline]
    pub fn plan(&self) -> &RgExecutionPlan {
        &self.plan
    }

    #[inline]
    pub fn pass_count(&self) -> usize {
        self.passes.len()
    }

    #[inline]
    pub fn resources(&self) -> &RgResourceRegistry {
        &self.resources
    }
}
// execute
impl RgCompiledGraph<'_> {
    /// 按计划录制所有 barrier 和 pass
    ///
    /// `cmd` 需要已经 begin
    pub fn execute(&self, cmd: &GfxCommandBuffer) {
        let _span = tracy_client::span!("RgCompiledGraph::execute");

        for step in self.plan.steps() {
            match step {
                RgPlanStep::Barriers(batch) => self.record_barriers(cmd, batch),
                RgPlanStep::Pass(pass_idx) => {
                    let pass = &self.passes[*pass_idx];
                    let _span = tracy_client::span!("RgPass::execute");

                    cmd.begin_label(&pass.name, LabelColor::COLOR_PASS);
                    let ctx = RgPassContext {
                        cmd,
                        resources: RgPassResources {
                            pass_name: &pass.name,
                            decls: &pass.decls,
                            registry: &self.resources,
                        },
                    };
                    pass.pass.execute(&ctx);
                    cmd.end_label();
                }
            }
        }
    }

    fn record_barriers(&self, cmd: &GfxCommandBuffer, batch: &RgBarrierBatch) {
        let mut image_barriers: Vec<GfxImageBarrier> = Vec::new();
        let mut buffer_barriers: Vec<GfxBufferBarrier> = Vec::new();

        for barrier in &batch.barriers {
            let Some(res) = self.resources.get(barrier.resource) else {
                continue;
            };
            match &res.physical {
                RgPhysical::Image(image) => image_barriers.push(barrier.to_gfx_image_barrier(image)),
                RgPhysical::Buffer(buffer) => buffer_barriers.push(barrier.to_gfx_buffer_barrier(buffer)),
            }
        }

        cmd.pipeline_barrier(vk::DependencyFlags::empty(), &image_barriers, &buffer_barriers);
    }
}
// 调试方法
impl RgCompiledGraph<'_> {
    /// 打印执行计划
    ///
    /// 每个 pass 的声明、之前插入的 barrier，以及帧末转换到最终状态的 barrier
    pub fn print_execution_plan(&self) {
        log::info!("╔══════════════════════════════════════════════════════════════════╗");
        log::info!("║              RenderGraph Execution Plan                          ║");
        log::info!("╠══════════════════════════════════════════════════════════════════╣");
        log::info!(
            "║ Total Passes: {}  |  Barriers: {}  |  Execution Order: [{}]",
            self.passes.len(),
            self.plan.barrier_count(),
            self.plan.order_names().join(" → ")
        );
        log::info!("╚══════════════════════════════════════════════════════════════════╝");

        let order_len = self.plan.order().len();
        let mut pass_pos = 0;
        for step in self.plan.steps() {
            match step {
                RgPlanStep::Barriers(batch) => self.print_barriers(batch),
                RgPlanStep::Pass(pass_idx) => {
                    pass_pos += 1;
                    let pass = &self.passes[*pass_idx];
                    log::info!("┌─────────────────────────────────────────────────────────────────┐");
                    log::info!("│ [{}/{}] {} Pass: \"{}\"", pass_pos, order_len, pass.kind, pass.name);
                    log::info!("├─────────────────────────────────────────────────────────────────┤");
                    for decl in &pass.decls {
                        let icon = if decl.access.is_write() { "✏️ " } else { "📖" };
                        log::info!("│   {} \"{}\" ({})", icon, decl.resource, decl.access);
                    }
                    log::info!("└─────────────────────────────────────────────────────────────────┘");
                }
            }
        }
    }

    fn print_barriers(&self, batch: &RgBarrierBatch) {
        log::info!("  🔒 Barriers: {}", batch.len());
        for barrier in &batch.barriers {
            let name = self.plan.resource_name(barrier.resource);
            let layout_change = if barrier.has_layout_transition() {
                format!("{:?} → {:?}", barrier.src.layout, barrier.dst.layout)
            } else {
                "no layout change".to_string()
            };
            log::info!("    \"{}\": {} → {} ({})", name, barrier.src_access, barrier.dst_access, layout_change);
            log::info!(
                "      Stage:  {} → {}",
                format_pipeline_stage(barrier.src.stage),
                format_pipeline_stage(barrier.dst.stage)
            );
            log::info!(
                "      Access: {} → {}",
                format_access_flags(barrier.src.src_access()),
                format_access_flags(barrier.dst.access)
            );
        }
    }

    /// 一行摘要，写入帧日志
    pub fn summary(&self) -> String {
        self.plan
            .steps()
            .iter()
            .map(|step| match step {
                RgPlanStep::Pass(idx) => self.plan.pass_name(*idx).to_string(),
                RgPlanStep::Barriers(batch) => format!(
                    "|{}|",
                    batch.barriers.iter().map(|b| self.plan.resource_name(b.resource)).join(",")
                ),
            })
            .join(" ")
    }
}

#[cfg(test)]
mod tests {
    use ash::vk;

    use crate::{RenderGraph, RgAccess, RgImageBinding, RgPassKind};

    #[test]
    fn summary_lists_barriers_between_passes() {
        let mut graph = RenderGraph::new();
        let binding = RgImageBinding::new(
            vk::Image::null(),
            vk::ImageView::null(),
            vk::Format::R8G8B8A8_UNORM,
            vk::Extent2D { width: 4, height: 4 },
            vk::ImageAspectFlags::COLOR,
        );
        graph.attach_image("hdr", binding, RgAccess::Undefined, RgAccess::Sampled).unwrap();
        graph
            .add_pass_fn("shade", RgPassKind::Compute, |b| {
                b.write("hdr");
            }, |_| {})
            .unwrap();
        graph
            .add_pass_fn("tonemap", RgPassKind::Compute, |b| {
                b.sampled("hdr");
            }, |_| {})
            .unwrap();
        let compiled = graph.compile().unwrap();
        assert_eq!(compiled.summary(), "|hdr| shade |hdr| tonemap");
        assert_eq!(compiled.pass_count(), 2);
    }
}
