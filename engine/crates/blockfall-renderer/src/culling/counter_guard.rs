use std::cell::Cell;

/// 记录本帧是否已经录制了计数器清零
///
/// 剔除 dispatch 之前必须先清零，否则实例数会累积上一帧的结果
#[derive(Debug, Default)]
pub struct CullCounterGuard {
    reset_frame: Cell<Option<u64>>,
}
impl CullCounterGuard {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn mark_reset(&self, frame_id: u64) {
        self.reset_frame.set(Some(frame_id));
    }

    #[inline]
    pub fn is_reset(&self, frame_id: u64) -> bool {
        self.reset_frame.get() == Some(frame_id)
    }

    /// 录制 dispatch 之前调用
    pub fn check_before_dispatch(&self, frame_id: u64) {
        debug_assert!(
            self.is_reset(frame_id),
            "culling counters were not reset before the dispatch of frame {}",
            frame_id
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reset_in_same_frame_passes() {
        let guard = CullCounterGuard::new();
        guard.mark_reset(7);
        guard.check_before_dispatch(7);
        assert!(!guard.is_reset(8));
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "were not reset")]
    fn dispatch_without_reset_asserts() {
        let guard = CullCounterGuard::new();
        guard.mark_reset(6);
        guard.check_before_dispatch(7);
    }
}
