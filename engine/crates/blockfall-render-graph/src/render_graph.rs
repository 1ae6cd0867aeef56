//! RenderGraph 构建器
//!
//! 使用流程：
//! 1. attach 本帧用到的物理资源，以及它们的初始/最终状态
//! 2. 按固定顺序添加 pass
//! 3. `compile()` 得到执行计划，`execute()` 录制到命令缓冲区

use itertools::Itertools;

use crate::{
    access::{RgAccess, RgPassKind, resolve_access},
    barrier::{RgBarrier, RgBarrierTracker, RgTrackedAccess},
    compiled::RgCompiledGraph,
    error::RgError,
    graph::RgDependencyGraph,
    pass::{RgAccessDecl, RgFnPass, RgPass, RgPassBuilder, RgPassContext},
    plan::RgExecutionPlan,
    resource::{RgBufferBinding, RgImageBinding, RgPhysical, RgResourceRegistry},
    resource_state::RgResourceState,
};

/// Pass 节点数据
pub(crate) struct RgPassNode<'a> {
    pub name: String,
    pub kind: RgPassKind,
    pub decls: Vec<RgAccessDecl>,
    pub run_after: Vec<String>,
    pub pass: Box<dyn RgPass + 'a>,
}

/// 渲染图
///
/// `'a` 是 Pass 可以借用的外部资源（pipeline、几何数据等）的生命周期。
/// 每帧构建一次，只在构建帧的线程中使用。
pub struct RenderGraph<'a> {
    resources: RgResourceRegistry,
    passes: Vec<RgPassNode<'a>>,
}
impl Default for RenderGraph<'_> {
    fn default() -> Self {
        Self::new()
    }
}
// new & init
impl<'a> RenderGraph<'a> {
    pub fn new() -> Self {
        Self {
            resources: RgResourceRegistry::new(),
            passes: Vec::new(),
        }
    }
}
// attach
impl RenderGraph<'_> {
    /// 登记一个资源以及它在本帧开始与结束时的访问方式
    ///
    /// 没有被任何 pass 使用的资源不会产生任何 barrier
    pub fn attach(
        &mut self,
        name: &str,
        physical: RgPhysical,
        initial: RgAccess,
        final_access: RgAccess,
    ) -> Result<(), RgError> {
        self.resources.attach(name, physical, initial, final_access).map(|_| ())
    }

    #[inline]
    pub fn attach_image(
        &mut self,
        name: &str,
        image: RgImageBinding,
        initial: RgAccess,
        final_access: RgAccess,
    ) -> Result<(), RgError> {
        self.attach(name, RgPhysical::Image(image), initial, final_access)
    }

    #[inline]
    pub fn attach_buffer(
        &mut self,
        name: &str,
        buffer: RgBufferBinding,
        initial: RgAccess,
        final_access: RgAccess,
    ) -> Result<(), RgError> {
        self.attach(name, RgPhysical::Buffer(buffer), initial, final_access)
    }

    #[inline]
    pub fn is_attached(&self, name: &str) -> bool {
        self.resources.index_of(name).is_some()
    }
}
// pass
impl<'a> RenderGraph<'a> {
    /// 添加 Pass，立即检查重名 pass、重复声明以及边界专用的访问方式
    pub fn add_pass<P: RgPass + 'a>(&mut self, name: impl Into<String>, mut pass: P) -> Result<(), RgError> {
        let mut builder = RgPassBuilder::new();
        pass.setup(&mut builder);
        let kind = pass.kind();
        self.push_node(name.into(), kind, builder, Box::new(pass))
    }

    /// 用闭包添加 Pass
    pub fn add_pass_fn<S, F>(&mut self, name: impl Into<String>, kind: RgPassKind, setup: S, exec: F) -> Result<(), RgError>
    where
        S: FnOnce(&mut RgPassBuilder),
        F: Fn(&RgPassContext<'_>) + 'a,
    {
        let mut builder = RgPassBuilder::new();
        setup(&mut builder);
        self.push_node(name.into(), kind, builder, Box::new(RgFnPass { kind, exec }))
    }

    fn push_node(
        &mut self,
        name: String,
        kind: RgPassKind,
        builder: RgPassBuilder,
        pass: Box<dyn RgPass + 'a>,
    ) -> Result<(), RgError> {
        if self.passes.iter().any(|node| node.name == name) {
            return Err(RgError::DuplicatePass { pass: name });
        }
        if let Some(dup) = builder.decls.iter().map(|decl| decl.resource.as_str()).duplicates().next() {
            return Err(RgError::DuplicateDeclaration {
                pass: name,
                resource: dup.to_string(),
            });
        }
        if let Some(decl) = builder.decls.iter().find(|decl| decl.access.is_boundary_only()) {
            return Err(RgError::InvalidAccess {
                context: format!("pass `{name}`"),
                resource: decl.resource.clone(),
                access: decl.access,
            });
        }

        self.passes.push(RgPassNode {
            name,
            kind,
            decls: builder.decls,
            run_after: builder.run_after,
            pass,
        });
        Ok(())
    }

    #[inline]
    pub fn pass_count(&self) -> usize {
        self.passes.len()
    }
}
// compile
impl<'a> RenderGraph<'a> {
    /// 编译渲染图
    ///
    /// 依赖分析、排序以及 barrier 推导。所有错误都是配置错误，不会部分生效。
    pub fn compile(self) -> Result<RgCompiledGraph<'a>, RgError> {
        let _span = tracy_client::span!("RenderGraph::compile");

        // 解析每个声明：资源索引 + 具体状态
        let mut resolved: Vec<Vec<(usize, RgAccess, RgResourceState)>> = Vec::with_capacity(self.passes.len());
        for node in &self.passes {
            let mut pass_resolved = Vec::with_capacity(node.decls.len());
            for decl in &node.decls {
                let Some(res_idx) = self.resources.index_of(&decl.resource) else {
                    return Err(RgError::MissingAttachment {
                        pass: node.name.clone(),
                        resource: decl.resource.clone(),
                    });
                };
                let ty = self.resources.get(res_idx).map(|res| res.physical.resource_type());
                let state = ty.and_then(|ty| resolve_access(decl.access, Some(node.kind), ty)).ok_or_else(|| {
                    RgError::InvalidAccess {
                        context: format!("{} pass `{}`", node.kind, node.name),
                        resource: decl.resource.clone(),
                        access: decl.access,
                    }
                })?;
                pass_resolved.push((res_idx, decl.access, state));
            }
            resolved.push(pass_resolved);
        }

        // 初始与最终状态
        let mut boundary = Vec::with_capacity(self.resources.len());
        for res in self.resources.iter() {
            let ty = res.physical.resource_type();
            let invalid = |access| RgError::InvalidAccess {
                context: "attachment".to_string(),
                resource: res.name.clone(),
                access,
            };
            let initial = resolve_access(res.initial, None, ty).ok_or_else(|| invalid(res.initial))?;
            let final_state = resolve_access(res.final_access, None, ty).ok_or_else(|| invalid(res.final_access))?;
            boundary.push((initial, final_state));
        }

        // 依赖图 + 顺序提示
        let decl_modes = resolved
            .iter()
            .map(|pass| pass.iter().map(|&(res, access, _)| (res, access)).collect_vec())
            .collect_vec();
        let mut dep_graph = RgDependencyGraph::analyze(self.resources.len(), &decl_modes);
        for (idx, node) in self.passes.iter().enumerate() {
            for after in &node.run_after {
                let Some(after_idx) = self.passes.iter().position(|other| &other.name == after) else {
                    return Err(RgError::UnknownOrderingHint {
                        pass: node.name.clone(),
                        after: after.clone(),
                    });
                };
                dep_graph.add_edge(after_idx, idx);
            }
        }
        let order = dep_graph.topological_sort().map_err(|cycles| RgError::Cycle {
            passes: cycles.into_iter().flatten().map(|idx| self.passes[idx].name.clone()).collect(),
        })?;

        // 按执行顺序推导 barrier
        let mut tracker = RgBarrierTracker::new(self.resources.iter().zip(&boundary).map(|(res, (initial, _))| {
            (res.initial, *initial, matches!(res.physical, RgPhysical::Image(_)))
        }));
        let mut plan = RgExecutionPlan::new(
            self.passes.iter().map(|node| node.name.clone()).collect(),
            self.resources.iter().map(|res| res.name.clone()).collect(),
        );
        for &pass_idx in &order {
            let events = resolved[pass_idx].iter().map(|&(res, access, state)| tracker.access(res, access, state));
            let barriers = Self::apply_tracked(&mut plan, events.collect_vec());
            plan.push_barriers(barriers);
            plan.push_pass(pass_idx);
        }
        let trailing = self
            .resources
            .iter()
            .zip(&boundary)
            .enumerate()
            .map(|(res_idx, (res, (_, final_state)))| tracker.finish(res_idx, res.final_access, *final_state))
            .collect_vec();
        let trailing = Self::apply_tracked(&mut plan, trailing);
        plan.push_barriers(trailing);

        Ok(RgCompiledGraph::new(self.resources, self.passes, plan))
    }
}

// tools
impl RenderGraph<'_> {
    /// 扩大已有 barrier 的 dst，返回需要新插入的 barrier
    fn apply_tracked(plan: &mut RgExecutionPlan, events: Vec<RgTrackedAccess>) -> Vec<RgBarrier> {
        let mut barriers = Vec::new();
        for event in events {
            match event {
                RgTrackedAccess::None => {}
                RgTrackedAccess::Barrier(barrier) => barriers.push(barrier),
                RgTrackedAccess::Widen { resource, dst } => plan.widen_last_barrier(resource, dst),
            }
        }
        barriers
    }
}

#[cfg(test)]
mod tests {
    use ash::vk;

    use super::*;
    use crate::plan::RgPlanStep;

    fn image(format: vk::Format) -> RgImageBinding {
        RgImageBinding::new(
            vk::Image::null(),
            vk::ImageView::null(),
            format,
            vk::Extent2D { width: 8, height: 8 },
            aspect_of(format),
        )
    }

    fn aspect_of(format: vk::Format) -> vk::ImageAspectFlags {
        if format == vk::Format::D32_SFLOAT { vk::ImageAspectFlags::DEPTH } else { vk::ImageAspectFlags::COLOR }
    }

    fn buffer() -> RgBufferBinding {
        RgBufferBinding::new(vk::Buffer::null(), 256)
    }

    fn color_graph<'a>(names: &[&str]) -> RenderGraph<'a> {
        let mut graph = RenderGraph::new();
        for name in names {
            graph.attach_image(name, image(vk::Format::R16G16B16A16_SFLOAT), RgAccess::Undefined, RgAccess::Sampled).unwrap();
        }
        graph
    }

    fn compute_pass<'a>(
        graph: &mut RenderGraph<'a>,
        name: &str,
        setup: impl FnOnce(&mut RgPassBuilder),
    ) -> Result<(), RgError> {
        graph.add_pass_fn(name, RgPassKind::Compute, setup, |_| {})
    }

    #[test]
    fn write_read_chain_inserts_expected_barriers() {
        let mut graph = color_graph(&["X", "Y", "Z"]);
        compute_pass(&mut graph, "A", |b| {
            b.write("X");
        })
        .unwrap();
        compute_pass(&mut graph, "B", |b| {
            b.sampled("X").write("Y");
        })
        .unwrap();
        compute_pass(&mut graph, "C", |b| {
            b.sampled("Y");
        })
        .unwrap();
        // 与 X 无关的 pass
        compute_pass(&mut graph, "D", |b| {
            b.write("Z");
        })
        .unwrap();

        let compiled = graph.compile().unwrap();
        let plan = compiled.plan();
        assert_eq!(plan.order_names(), vec!["A", "B", "C", "D"]);

        let x_before_b = plan.barrier_before("B", "X").unwrap();
        assert_eq!((x_before_b.src_access, x_before_b.dst_access), (RgAccess::Write, RgAccess::Sampled));
        assert_eq!(x_before_b.dst.layout, vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL);

        let y_before_c = plan.barrier_before("C", "Y").unwrap();
        assert_eq!((y_before_c.src_access, y_before_c.dst_access), (RgAccess::Write, RgAccess::Sampled));

        // X 只在 A 与 B 之间转换，D 之前只有 Z 自己的 layout 转换
        assert!(plan.barrier_before("D", "X").is_none());
        assert!(plan.barrier_before("C", "X").is_none());
        assert_eq!(plan.barriers_before("D").unwrap().len(), 1);
    }

    #[test]
    fn repeated_sampled_reads_share_one_barrier() {
        let mut graph = color_graph(&["X"]);
        compute_pass(&mut graph, "write", |b| {
            b.write("X");
        })
        .unwrap();
        for name in ["read0", "read1", "read2"] {
            compute_pass(&mut graph, name, |b| {
                b.sampled("X");
            })
            .unwrap();
        }
        let compiled = graph.compile().unwrap();
        let plan = compiled.plan();

        // Undefined -> Write，Write -> Sampled，之后三个读取之间没有 barrier，最终状态与读取相同
        assert_eq!(plan.barriers_for("X").len(), 2);
        assert!(plan.barriers_before("read1").is_none());
        assert!(plan.barriers_before("read2").is_none());
        assert!(plan.trailing_barriers().is_none());
    }

    #[test]
    fn merged_reads_across_stages_wait_for_the_write() {
        let mut graph = RenderGraph::new();
        graph.attach_image("X", image(vk::Format::R16G16B16A16_SFLOAT), RgAccess::Undefined, RgAccess::Sampled).unwrap();
        compute_pass(&mut graph, "write", |b| {
            b.write("X");
        })
        .unwrap();
        compute_pass(&mut graph, "compute_read", |b| {
            b.sampled("X");
        })
        .unwrap();
        graph
            .add_pass_fn("graphics_read", RgPassKind::Graphics, |b| {
                b.sampled("X");
            }, |_| {})
            .unwrap();
        let compiled = graph.compile().unwrap();
        let plan = compiled.plan();

        // 读取之间仍然没有 barrier，写后的 barrier 覆盖两种读取者
        assert!(plan.barriers_before("graphics_read").is_none());
        let after_write = plan.barrier_before("compute_read", "X").unwrap();
        assert!(after_write.dst.stage.contains(vk::PipelineStageFlags2::COMPUTE_SHADER));
        assert!(after_write.dst.stage.contains(vk::PipelineStageFlags2::FRAGMENT_SHADER));
        assert!(after_write.dst.stage.contains(vk::PipelineStageFlags2::VERTEX_SHADER));
        assert!(after_write.dst.access.contains(vk::AccessFlags2::SHADER_SAMPLED_READ));
    }

    #[test]
    fn carried_read_chains_new_reader_stage() {
        let mut graph = RenderGraph::new();
        graph.attach_image("X", image(vk::Format::R16G16B16A16_SFLOAT), RgAccess::Sampled, RgAccess::Sampled).unwrap();
        graph.attach_image("Y", image(vk::Format::R16G16B16A16_SFLOAT), RgAccess::Undefined, RgAccess::Sampled).unwrap();
        compute_pass(&mut graph, "compute_read", |b| {
            b.sampled("X").write("Y");
        })
        .unwrap();
        let compiled = graph.compile().unwrap();
        let plan = compiled.plan();

        // 上一帧末尾已经同步到所有 stage，不需要额外的 barrier
        assert!(plan.barrier_before("compute_read", "X").is_none());
        assert!(plan.barriers_for("X").is_empty());
    }

    #[test]
    fn every_mode_change_gets_a_barrier() {
        let mut graph = RenderGraph::new();
        graph.attach_buffer("buf", buffer(), RgAccess::Undefined, RgAccess::Read).unwrap();
        let accesses = [
            RgAccess::Write,
            RgAccess::Read,
            RgAccess::Read,
            RgAccess::Sampled,
            RgAccess::ReadWrite,
            RgAccess::IndirectArgument,
            RgAccess::IndirectArgument,
        ];
        for (idx, access) in accesses.iter().enumerate() {
            compute_pass(&mut graph, &format!("p{idx}"), |b| {
                b.access("buf", *access);
            })
            .unwrap();
        }
        let compiled = graph.compile().unwrap();
        let plan = compiled.plan();

        for idx in 1..accesses.len() {
            let has_barrier = plan.barrier_before(&format!("p{idx}"), "buf").is_some();
            let expected = accesses[idx - 1] != accesses[idx] || accesses[idx - 1].is_write();
            assert_eq!(has_barrier, expected, "between p{} and p{}", idx - 1, idx);
        }
        // 缓冲区内容被丢弃，第一次写入不需要等待
        assert!(plan.barrier_before("p0", "buf").is_none());
        // 最终状态 Read 与最后的 IndirectArgument 不同
        assert!(plan.trailing_barriers().is_some());
    }

    #[test]
    fn final_access_is_applied_after_last_pass() {
        let mut graph = RenderGraph::new();
        graph.attach_image("swapchain", image(vk::Format::B8G8R8A8_UNORM), RgAccess::Undefined, RgAccess::Present).unwrap();
        graph.attach_image("ldr", image(vk::Format::R8G8B8A8_UNORM), RgAccess::Undefined, RgAccess::Sampled).unwrap();
        graph
            .add_pass_fn("blit", RgPassKind::Transfer, |b| {
                b.transfer_src("ldr").transfer_dst("swapchain");
            }, |_| {})
            .unwrap();
        let compiled = graph.compile().unwrap();
        let plan = compiled.plan();

        let trailing = plan.trailing_barriers().unwrap();
        assert_eq!(trailing.len(), 2);
        let present = plan.barriers_for("swapchain").into_iter().last().unwrap();
        assert_eq!(present.dst.layout, vk::ImageLayout::PRESENT_SRC_KHR);
        assert!(matches!(plan.steps().last(), Some(RgPlanStep::Barriers(_))));
    }

    #[test]
    fn unused_attachment_is_a_no_op() {
        let mut graph = color_graph(&["used", "unused"]);
        compute_pass(&mut graph, "A", |b| {
            b.write("used");
        })
        .unwrap();
        let compiled = graph.compile().unwrap();
        assert!(compiled.plan().barriers_for("unused").is_empty());
    }

    #[test]
    fn missing_attachment_is_reported_at_compile() {
        let mut graph = color_graph(&["X"]);
        compute_pass(&mut graph, "A", |b| {
            b.write("X").sampled("ghost");
        })
        .unwrap();
        assert_eq!(
            graph.compile().err(),
            Some(RgError::MissingAttachment {
                pass: "A".to_string(),
                resource: "ghost".to_string()
            })
        );
    }

    #[test]
    fn duplicate_pass_and_declaration_are_rejected() {
        let mut graph = color_graph(&["X"]);
        compute_pass(&mut graph, "A", |b| {
            b.write("X");
        })
        .unwrap();
        assert!(matches!(compute_pass(&mut graph, "A", |_| {}), Err(RgError::DuplicatePass { .. })));
        assert!(matches!(
            compute_pass(&mut graph, "B", |b| {
                b.write("X").sampled("X");
            }),
            Err(RgError::DuplicateDeclaration { .. })
        ));
        assert!(matches!(
            graph.attach_image("X", image(vk::Format::R8G8B8A8_UNORM), RgAccess::Undefined, RgAccess::Sampled),
            Err(RgError::DuplicateAttachment { .. })
        ));
    }

    #[test]
    fn boundary_accesses_are_rejected_inside_passes() {
        let mut graph = color_graph(&["X"]);
        assert!(matches!(
            compute_pass(&mut graph, "A", |b| {
                b.access("X", RgAccess::Present);
            }),
            Err(RgError::InvalidAccess { .. })
        ));
        assert!(matches!(
            graph.attach_image("Y", image(vk::Format::R8G8B8A8_UNORM), RgAccess::Present, RgAccess::Sampled),
            Err(RgError::InvalidAccess { .. })
        ));
    }

    #[test]
    fn indirect_argument_on_image_is_invalid() {
        let mut graph = color_graph(&["X"]);
        graph
            .add_pass_fn("draw", RgPassKind::Graphics, |b| {
                b.indirect_argument("X");
            }, |_| {})
            .unwrap();
        assert!(matches!(graph.compile(), Err(RgError::InvalidAccess { .. })));
    }

    #[test]
    fn ordering_hint_reorders_independent_passes() {
        let mut graph = color_graph(&["X", "Y"]);
        compute_pass(&mut graph, "late", |b| {
            b.write("X").run_after("early");
        })
        .unwrap();
        compute_pass(&mut graph, "early", |b| {
            b.write("Y");
        })
        .unwrap();
        let compiled = graph.compile().unwrap();
        assert_eq!(compiled.plan().order_names(), vec!["early", "late"]);
    }

    #[test]
    fn unknown_hint_and_cycles_are_errors() {
        let mut graph = color_graph(&["X"]);
        compute_pass(&mut graph, "A", |b| {
            b.write("X").run_after("nobody");
        })
        .unwrap();
        assert!(matches!(graph.compile(), Err(RgError::UnknownOrderingHint { .. })));

        let mut graph = color_graph(&["X"]);
        compute_pass(&mut graph, "A", |b| {
            b.write("X").run_after("B");
        })
        .unwrap();
        compute_pass(&mut graph, "B", |b| {
            b.sampled("X");
        })
        .unwrap();
        match graph.compile() {
            Err(RgError::Cycle { passes }) => assert_eq!(passes, vec!["A".to_string(), "B".to_string()]),
            other => panic!("expected cycle, got {:?}", other.err()),
        }
    }

    #[test]
    fn depth_attachment_then_sampled() {
        let mut graph = RenderGraph::new();
        graph.attach_image("depth", image(vk::Format::D32_SFLOAT), RgAccess::Undefined, RgAccess::Sampled).unwrap();
        graph
            .add_pass_fn("visibility", RgPassKind::Graphics, |b| {
                b.write("depth");
            }, |_| {})
            .unwrap();
        compute_pass(&mut graph, "classify", |b| {
            b.sampled("depth");
        })
        .unwrap();
        let compiled = graph.compile().unwrap();
        let plan = compiled.plan();
        let first = plan.barrier_before("visibility", "depth").unwrap();
        assert_eq!(first.dst.layout, vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL);
        let second = plan.barrier_before("classify", "depth").unwrap();
        assert_eq!(second.src.src_access(), vk::AccessFlags2::DEPTH_STENCIL_ATTACHMENT_WRITE);
        assert!(second.dst.stage.contains(vk::PipelineStageFlags2::COMPUTE_SHADER));
    }

    #[test]
    fn empty_graph_compiles_to_empty_plan() {
        let graph = color_graph(&["X"]);
        let compiled = graph.compile().unwrap();
        assert!(compiled.plan().steps().is_empty());
    }
}
