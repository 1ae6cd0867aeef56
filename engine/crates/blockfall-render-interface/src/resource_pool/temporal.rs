use crate::resource_pool::{
    allocator::PoolAllocator, desc::ImageDesc, error::PoolError, handle::Texture2D, pool::ResourcePool,
};

/// 由两张物理纹理组成的时域资源，每提交一帧轮换一次
///
/// 当前帧写 `current`，采样 `previous`（即上一次提交的帧的 `current`），
/// 轮换位置由 [`TemporalState`] 记录
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TemporalTexture {
    pair: [Texture2D; 2],
}
impl TemporalTexture {
    /// 在给定作用域内申请 `<name>#0` 与 `<name>#1`
    pub fn acquire<A: PoolAllocator>(
        pool: &mut ResourcePool<A>,
        allocator: &A,
        name: &str,
        desc: ImageDesc,
    ) -> Result<Self, PoolError> {
        let a = pool.acquire_texture_2d(allocator, &format!("{name}#0"), desc)?;
        let b = pool.acquire_texture_2d(allocator, &format!("{name}#1"), desc)?;
        Ok(Self { pair: [a, b] })
    }

    /// 本帧写入的纹理
    #[inline]
    pub fn current(&self, state: &TemporalState) -> Texture2D {
        self.pair[state.parity]
    }

    /// 上一次提交的帧写入的纹理；历史无效时返回 `None`，调用方应跳过采样
    #[inline]
    pub fn previous(&self, state: &TemporalState) -> Option<Texture2D> {
        state.history_valid().then(|| self.previous_slot(state))
    }

    /// `previous` 所在的位置，不管内容是否有效
    #[inline]
    pub fn previous_slot(&self, state: &TemporalState) -> Texture2D {
        self.pair[state.parity ^ 1]
    }
}

/// 时域资源的历史是否可以采样
///
/// 创建之后、交换链 reset 之后、以及收到 flush 请求的那一帧都是无效的；
/// 某一帧写完 `current` 并提交之后，下一帧的 `previous` 才有效。
///
/// 轮换只在帧提交后发生：被跳过或者丢弃的帧不会写入 `current`，
/// 下一帧仍然写同一张纹理，`previous` 仍然指向最近一次提交写入的内容。
///
/// 另外记录两张纹理各自是否被写过，用来决定 attach 时的初始状态：
/// 从未写过的纹理只能从 `Undefined` 开始
#[derive(Debug, Default)]
pub struct TemporalState {
    history_valid: bool,
    /// `current` 在 pair 中的下标
    parity: usize,
    written: [bool; 2],
}
impl TemporalState {
    pub fn new() -> Self {
        Self {
            history_valid: false,
            parity: 0,
            written: [false; 2],
        }
    }

    #[inline]
    pub fn history_valid(&self) -> bool {
        self.history_valid
    }

    /// 本帧的 `current` 是否在之前的某一帧被写过
    #[inline]
    pub fn current_initialized(&self) -> bool {
        self.written[self.parity]
    }

    /// 本帧的 `previous` 是否被写过，与历史是否有效无关
    #[inline]
    pub fn previous_initialized(&self) -> bool {
        self.written[self.parity ^ 1]
    }

    /// flush 请求：内容作废，但物理纹理不变
    #[inline]
    pub fn invalidate(&mut self) {
        if self.history_valid {
            log::debug!("temporal history discarded");
        }
        self.history_valid = false;
    }

    /// 交换链 reset 之后纹理是新分配的
    #[inline]
    pub fn on_resources_recreated(&mut self) {
        self.invalidate();
        self.written = [false; 2];
    }

    /// 当前帧写入 `current` 的命令已经提交，轮换到下一帧
    #[inline]
    pub fn end_frame(&mut self) {
        self.written[self.parity] = true;
        self.history_valid = true;
        self.parity ^= 1;
    }
}

#[cfg(test)]
mod tests {
    use ash::vk;

    use super::*;
    use crate::resource_pool::{handle::PoolScope, mock::MockAllocator};

    fn desc() -> ImageDesc {
        ImageDesc::texture_2d(
            vk::Format::R16G16B16A16_SFLOAT,
            vk::Extent2D { width: 64, height: 64 },
            vk::ImageUsageFlags::STORAGE | vk::ImageUsageFlags::SAMPLED,
        )
    }

    #[test]
    fn current_and_previous_alternate() {
        let alloc = MockAllocator::default();
        let mut pool = ResourcePool::new(PoolScope::Swapchain);
        let mut state = TemporalState::new();
        let tex = TemporalTexture::acquire(&mut pool, &alloc, "shading", desc()).unwrap();

        assert_eq!(tex.previous(&state), None);
        let first = tex.current(&state);
        state.end_frame();
        assert_eq!(tex.previous(&state), Some(first));
        assert_ne!(tex.current(&state), first);

        pool.destroy(&alloc);
    }

    #[test]
    fn skipped_frame_keeps_pair_in_step() {
        let alloc = MockAllocator::default();
        let mut pool = ResourcePool::new(PoolScope::Swapchain);
        let mut state = TemporalState::new();
        let tex = TemporalTexture::acquire(&mut pool, &alloc, "shading", desc()).unwrap();

        // 提交
        let written = tex.current(&state);
        state.end_frame();
        // 跳过：没有调用 end_frame，下一帧写的仍然是同一张纹理
        let skipped_target = tex.current(&state);
        assert_ne!(skipped_target, written);
        // 提交：采样的是上一次提交写入的纹理，而不是从未写过的那一张
        assert_eq!(tex.previous(&state), Some(written));
        assert!(state.previous_initialized());
        assert!(!state.current_initialized());
        state.end_frame();

        assert_eq!(tex.previous(&state), Some(skipped_target));
        assert!(state.current_initialized());

        pool.destroy(&alloc);
    }

    #[test]
    fn flush_skips_history_for_exactly_one_frame() {
        let alloc = MockAllocator::default();
        let mut pool = ResourcePool::new(PoolScope::Swapchain);
        let mut state = TemporalState::new();
        let tex = TemporalTexture::acquire(&mut pool, &alloc, "shading", desc()).unwrap();

        for _ in 0..3 {
            state.end_frame();
        }

        // flush 的这一帧不能采样旧内容
        state.invalidate();
        assert!(tex.previous(&state).is_none());
        let flushed = tex.current(&state);
        state.end_frame();

        // 下一帧采样的是 flush 那一帧写入的内容
        assert_eq!(tex.previous(&state), Some(flushed));

        pool.destroy(&alloc);
    }

    #[test]
    fn recreated_pair_starts_undefined() {
        let mut state = TemporalState::new();
        assert!(!state.previous_initialized());
        state.end_frame();
        assert!(state.previous_initialized());
        assert!(!state.current_initialized());
        state.end_frame();
        assert!(state.current_initialized());

        // flush 不改变纹理本身
        state.invalidate();
        assert!(state.current_initialized());
        assert!(!state.history_valid());

        state.on_resources_recreated();
        assert!(!state.previous_initialized());
        assert!(!state.current_initialized());
        assert!(!state.history_valid());
    }
}
