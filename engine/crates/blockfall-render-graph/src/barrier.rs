//! Barrier 推导
//!
//! 沿执行顺序跟踪每个资源最近一次的访问，只在需要同步的地方生成 barrier：
//! 访问方式改变、image layout 改变、或者上一次访问是写入。
//! 连续相同的只读访问不产生 barrier，它们的 stage 会合并，后续的写入需要等待全部读取者。
//! 合并进来的读取者如果不在上一个 barrier 的 dst 范围内，就扩大那个 barrier 的 dst，
//! 本帧还没有 barrier 时才补一个只做执行依赖的 barrier。

use blockfall_gfx::commands::barrier::{GfxBufferBarrier, GfxImageBarrier};

use crate::{
    access::RgAccess,
    resource::{RgBufferBinding, RgImageBinding},
    resource_state::RgResourceState,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RgBarrier {
    /// 资源在 registry 中的索引
    pub resource: usize,
    pub src_access: RgAccess,
    pub dst_access: RgAccess,
    pub src: RgResourceState,
    pub dst: RgResourceState,
}
impl RgBarrier {
    #[inline]
    pub fn has_layout_transition(&self) -> bool {
        self.src.layout != self.dst.layout
    }

    pub fn to_gfx_image_barrier(&self, image: &RgImageBinding) -> GfxImageBarrier {
        GfxImageBarrier::new()
            .image(image.image)
            .layout_transfer(self.src.layout, self.dst.layout)
            .src_mask(self.src.stage, self.src.src_access())
            .dst_mask(self.dst.stage, self.dst.access)
            .image_aspect_flag(image.aspect)
            .all_subresources()
    }

    pub fn to_gfx_buffer_barrier(&self, buffer: &RgBufferBinding) -> GfxBufferBarrier {
        GfxBufferBarrier::new()
            .buffer(buffer.buffer, 0, ash::vk::WHOLE_SIZE)
            .src_mask(self.src.stage, self.src.src_access())
            .dst_mask(self.dst.stage, self.dst.access)
    }
}

/// 同一个位置需要一起提交的一组 barrier
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RgBarrierBatch {
    pub barriers: Vec<RgBarrier>,
}
impl RgBarrierBatch {
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.barriers.is_empty()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.barriers.len()
    }

    #[inline]
    pub fn for_resource(&self, resource: usize) -> Option<&RgBarrier> {
        self.barriers.iter().find(|barrier| barrier.resource == resource)
    }
}

/// 两次相邻访问之间是否需要 barrier
#[inline]
pub fn needs_barrier(prev: RgAccess, prev_state: &RgResourceState, next: RgAccess, next_state: &RgResourceState) -> bool {
    prev != next || prev_state.layout != next_state.layout || prev.is_write() || prev_state.is_write()
}

/// 一次访问对执行计划的影响
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum RgTrackedAccess {
    None,
    Barrier(RgBarrier),
    /// 扩大该资源最近一个 barrier 的 dst
    Widen { resource: usize, dst: RgResourceState },
}

#[derive(Clone, Copy, Debug)]
struct TrackedState {
    access: RgAccess,
    state: RgResourceState,
    is_image: bool,
    touched: bool,
    /// 本帧是否已经为这个资源生成过 barrier
    has_barrier: bool,
}

/// 模拟执行顺序，跟踪每个资源的状态
pub(crate) struct RgBarrierTracker {
    states: Vec<TrackedState>,
}
impl RgBarrierTracker {
    /// `initial[i]` 是资源 i 在本帧开始时的访问方式与状态
    pub fn new(initial: impl IntoIterator<Item = (RgAccess, RgResourceState, bool)>) -> Self {
        Self {
            states: initial
                .into_iter()
                .map(|(access, state, is_image)| TrackedState {
                    access,
                    state,
                    is_image,
                    touched: false,
                    has_barrier: false,
                })
                .collect(),
        }
    }

    /// 记录一次访问，返回需要对执行计划做的修改
    pub fn access(&mut self, resource: usize, access: RgAccess, state: RgResourceState) -> RgTrackedAccess {
        let tracked = &mut self.states[resource];
        tracked.touched = true;

        // buffer 没有 layout，内容被丢弃时也就没有需要保护的先前访问
        if !tracked.is_image && tracked.access == RgAccess::Undefined {
            tracked.state = state;
            tracked.access = access;
            return RgTrackedAccess::None;
        }

        if !needs_barrier(tracked.access, &tracked.state, access, &state) {
            let covered = tracked.state.covers(&state);
            let prev = tracked.state;
            tracked.state = tracked.state.merge_read(state);
            tracked.access = access;
            return match (covered, tracked.has_barrier) {
                (true, _) => RgTrackedAccess::None,
                (false, true) => RgTrackedAccess::Widen { resource, dst: state },
                // 资源以只读状态进入本帧：让新的读取者排在之前的读取者之后，
                // 与上一帧末尾的 barrier 连成依赖链
                (false, false) => {
                    tracked.has_barrier = true;
                    RgTrackedAccess::Barrier(RgBarrier {
                        resource,
                        src_access: access,
                        dst_access: access,
                        src: prev,
                        dst: state,
                    })
                }
            };
        }

        let barrier = RgBarrier {
            resource,
            src_access: tracked.access,
            dst_access: access,
            src: tracked.state,
            dst: state,
        };
        tracked.access = access;
        tracked.state = state;
        tracked.has_barrier = true;
        RgTrackedAccess::Barrier(barrier)
    }

    /// 帧末转换到最终状态，没有被任何 pass 使用的资源保持不变
    pub fn finish(&mut self, resource: usize, final_access: RgAccess, final_state: RgResourceState) -> RgTrackedAccess {
        if !self.states[resource].touched {
            return RgTrackedAccess::None;
        }
        self.access(resource, final_access, final_state)
    }
}

#[cfg(test)]
mod tests {
    use ash::vk;

    use super::*;

    fn tracker(access: RgAccess, state: RgResourceState, is_image: bool) -> RgBarrierTracker {
        RgBarrierTracker::new([(access, state, is_image)])
    }

    fn barrier(tracked: RgTrackedAccess) -> RgBarrier {
        match tracked {
            RgTrackedAccess::Barrier(barrier) => barrier,
            other => panic!("expected a barrier, got {:?}", other),
        }
    }

    #[test]
    fn identical_reads_merge_without_barrier() {
        let mut t = tracker(RgAccess::Write, RgResourceState::STORAGE_WRITE_COMPUTE, true);
        barrier(t.access(0, RgAccess::Sampled, RgResourceState::SAMPLED_COMPUTE));
        assert_eq!(t.access(0, RgAccess::Sampled, RgResourceState::SAMPLED_COMPUTE), RgTrackedAccess::None);
        assert!(matches!(
            t.access(0, RgAccess::Sampled, RgResourceState::SAMPLED_GRAPHICS),
            RgTrackedAccess::Widen { resource: 0, .. }
        ));

        let barrier = barrier(t.access(0, RgAccess::Write, RgResourceState::STORAGE_WRITE_COMPUTE));
        assert!(barrier.src.stage.contains(vk::PipelineStageFlags2::COMPUTE_SHADER));
        assert!(barrier.src.stage.contains(vk::PipelineStageFlags2::FRAGMENT_SHADER));
    }

    #[test]
    fn new_reader_of_carried_resource_is_chained() {
        let mut t = tracker(RgAccess::Sampled, RgResourceState::SAMPLED_COMPUTE, true);
        assert_eq!(t.access(0, RgAccess::Sampled, RgResourceState::SAMPLED_COMPUTE), RgTrackedAccess::None);

        let chained = barrier(t.access(0, RgAccess::Sampled, RgResourceState::SAMPLED_GRAPHICS));
        assert!(!chained.has_layout_transition());
        assert_eq!(chained.src.stage, vk::PipelineStageFlags2::COMPUTE_SHADER);
        assert_eq!(chained.src.src_access(), vk::AccessFlags2::NONE);
        assert!(chained.dst.stage.contains(vk::PipelineStageFlags2::FRAGMENT_SHADER));
    }

    #[test]
    fn consecutive_writes_need_barrier() {
        let mut t = tracker(RgAccess::Write, RgResourceState::STORAGE_WRITE_COMPUTE, false);
        barrier(t.access(0, RgAccess::Write, RgResourceState::STORAGE_WRITE_COMPUTE));
    }

    #[test]
    fn undefined_buffer_needs_no_barrier() {
        let mut t = tracker(RgAccess::Undefined, RgResourceState::UNDEFINED, false);
        assert_eq!(
            t.access(0, RgAccess::Write, RgResourceState::STORAGE_WRITE_COMPUTE.without_layout()),
            RgTrackedAccess::None
        );
        barrier(t.access(0, RgAccess::Read, RgResourceState::STORAGE_READ_COMPUTE.without_layout()));
    }

    #[test]
    fn undefined_image_transitions_layout() {
        let mut t = tracker(RgAccess::Undefined, RgResourceState::UNDEFINED, true);
        let barrier = barrier(t.access(0, RgAccess::Write, RgResourceState::COLOR_ATTACHMENT_WRITE));
        assert!(barrier.has_layout_transition());
    }

    #[test]
    fn untouched_resource_has_no_final_barrier() {
        let mut t = tracker(RgAccess::Undefined, RgResourceState::UNDEFINED, true);
        assert_eq!(t.finish(0, RgAccess::Present, RgResourceState::PRESENT), RgTrackedAccess::None);
    }
}
