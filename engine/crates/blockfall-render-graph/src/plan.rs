//! 编译结果：线性的 [barrier, pass, barrier, pass, ..., barrier] 序列

use std::hash::{DefaultHasher, Hash, Hasher};

use crate::{
    barrier::{RgBarrier, RgBarrierBatch},
    resource_state::RgResourceState,
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RgPlanStep {
    Barriers(RgBarrierBatch),
    /// pass 的注册序号
    Pass(usize),
}

/// 执行计划
///
/// 不包含空的 barrier 批次；所有 pass 之后的 barrier 批次把资源转换到最终状态
#[derive(Clone, Debug, Default)]
pub struct RgExecutionPlan {
    steps: Vec<RgPlanStep>,
    order: Vec<usize>,
    pass_names: Vec<String>,
    resource_names: Vec<String>,
}
// new & init
impl RgExecutionPlan {
    pub(crate) fn new(pass_names: Vec<String>, resource_names: Vec<String>) -> Self {
        Self {
            steps: Vec::new(),
            order: Vec::new(),
            pass_names,
            resource_names,
        }
    }

    pub(crate) fn push_barriers(&mut self, barriers: Vec<RgBarrier>) {
        if !barriers.is_empty() {
            self.steps.push(RgPlanStep::Barriers(RgBarrierBatch { barriers }));
        }
    }

    /// 把 `dst` 合并进资源最近一个 barrier 的目标状态，让新加入的读取者也等待之前的写入
    pub(crate) fn widen_last_barrier(&mut self, resource: usize, dst: RgResourceState) {
        let last = self.steps.iter_mut().rev().find_map(|step| match step {
            RgPlanStep::Barriers(batch) => batch.barriers.iter_mut().find(|barrier| barrier.resource == resource),
            RgPlanStep::Pass(_) => None,
        });
        if let Some(barrier) = last {
            barrier.dst = barrier.dst.merge_read(dst);
        }
    }

    pub(crate) fn push_pass(&mut self, pass: usize) {
        self.order.push(pass);
        self.steps.push(RgPlanStep::Pass(pass));
    }
}
// getters
impl RgExecutionPlan {
    #[inline]
    pub fn steps(&self) -> &[RgPlanStep] {
        &self.steps
    }

    /// pass 的执行顺序（注册序号）
    #[inline]
    pub fn order(&self) -> &[usize] {
        &self.order
    }

    pub fn order_names(&self) -> Vec<&str> {
        self.order.iter().map(|&idx| self.pass_names[idx].as_str()).collect()
    }

    #[inline]
    pub fn pass_name(&self, pass: usize) -> &str {
        &self.pass_names[pass]
    }

    #[inline]
    pub fn resource_name(&self, resource: usize) -> &str {
        &self.resource_names[resource]
    }

    fn pass_index(&self, pass_name: &str) -> Option<usize> {
        self.pass_names.iter().position(|name| name == pass_name)
    }

    fn resource_index(&self, resource_name: &str) -> Option<usize> {
        self.resource_names.iter().position(|name| name == resource_name)
    }

    /// 紧挨在某个 pass 之前的 barrier 批次
    pub fn barriers_before(&self, pass_name: &str) -> Option<&RgBarrierBatch> {
        let pass = self.pass_index(pass_name)?;
        let pos = self.steps.iter().position(|step| *step == RgPlanStep::Pass(pass))?;
        match pos.checked_sub(1).map(|prev| &self.steps[prev]) {
            Some(RgPlanStep::Barriers(batch)) => Some(batch),
            _ => None,
        }
    }

    /// 某个 pass 之前针对指定资源的 barrier
    pub fn barrier_before(&self, pass_name: &str, resource_name: &str) -> Option<&RgBarrier> {
        let resource = self.resource_index(resource_name)?;
        self.barriers_before(pass_name)?.for_resource(resource)
    }

    /// 所有 pass 之后的 barrier 批次
    pub fn trailing_barriers(&self) -> Option<&RgBarrierBatch> {
        match self.steps.last() {
            Some(RgPlanStep::Barriers(batch)) if !self.order.is_empty() => Some(batch),
            _ => None,
        }
    }

    /// 涉及指定资源的所有 barrier，按执行顺序
    pub fn barriers_for(&self, resource_name: &str) -> Vec<&RgBarrier> {
        let Some(resource) = self.resource_index(resource_name) else {
            return Vec::new();
        };
        self.steps
            .iter()
            .filter_map(|step| match step {
                RgPlanStep::Barriers(batch) => batch.for_resource(resource),
                RgPlanStep::Pass(_) => None,
            })
            .collect()
    }

    pub fn barrier_count(&self) -> usize {
        self.steps
            .iter()
            .map(|step| match step {
                RgPlanStep::Barriers(batch) => batch.len(),
                RgPlanStep::Pass(_) => 0,
            })
            .sum()
    }

    /// 计划的形状（pass 顺序与 barrier 位置），用于判断是否需要重新打印
    pub fn shape_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        for step in &self.steps {
            match step {
                RgPlanStep::Pass(idx) => self.pass_names[*idx].hash(&mut hasher),
                RgPlanStep::Barriers(batch) => {
                    for barrier in &batch.barriers {
                        self.resource_names[barrier.resource].hash(&mut hasher);
                        barrier.src_access.hash(&mut hasher);
                        barrier.dst_access.hash(&mut hasher);
                    }
                }
            }
        }
        hasher.finish()
    }
}
