use crate::{
    frame_counter::{FrameCounter, FrameLabel},
    resource_pool::{
        allocator::PoolAllocator,
        error::PoolError,
        handle::{Buffer, ImageHandle, PoolHandle, PoolScope},
        pool::ResourcePool,
    },
};

/// 渲染器持有的全部资源池
///
/// 每个 frame in flight slot 一个 per-frame 池，外加交换链池与永久池。
/// per-frame 池只在 GPU 确认该 slot 上一帧完成之后才会 reset，
/// 因此 in flight 帧的句柄不会和新的申请指向同一份物理资源。
pub struct FramePools<A: PoolAllocator> {
    per_frame: [ResourcePool<A>; FrameCounter::fif_count()],
    swapchain: ResourcePool<A>,
    permanent: ResourcePool<A>,
}
// new & init
impl<A: PoolAllocator> FramePools<A> {
    pub fn new() -> Self {
        Self {
            per_frame: array_init::array_init(|idx| ResourcePool::new(PoolScope::PerFrame(FrameLabel::from_usize(idx)))),
            swapchain: ResourcePool::new(PoolScope::Swapchain),
            permanent: ResourcePool::new(PoolScope::Permanent),
        }
    }
}
impl<A: PoolAllocator> Default for FramePools<A> {
    fn default() -> Self {
        Self::new()
    }
}
// destroy
impl<A: PoolAllocator> FramePools<A> {
    pub fn destroy(mut self, allocator: &A) {
        for pool in &mut self.per_frame {
            pool.destroy_mut(allocator);
        }
        self.swapchain.destroy_mut(allocator);
        self.permanent.destroy_mut(allocator);
    }
}
// getters
impl<A: PoolAllocator> FramePools<A> {
    #[inline]
    pub fn frame(&self, label: FrameLabel) -> &ResourcePool<A> {
        &self.per_frame[*label]
    }
    #[inline]
    pub fn frame_mut(&mut self, label: FrameLabel) -> &mut ResourcePool<A> {
        &mut self.per_frame[*label]
    }
    #[inline]
    pub fn swapchain(&self) -> &ResourcePool<A> {
        &self.swapchain
    }
    #[inline]
    pub fn swapchain_mut(&mut self) -> &mut ResourcePool<A> {
        &mut self.swapchain
    }
    #[inline]
    pub fn permanent(&self) -> &ResourcePool<A> {
        &self.permanent
    }
    #[inline]
    pub fn permanent_mut(&mut self) -> &mut ResourcePool<A> {
        &mut self.permanent
    }

    pub fn pool(&self, scope: PoolScope) -> &ResourcePool<A> {
        match scope {
            PoolScope::PerFrame(label) => self.frame(label),
            PoolScope::Swapchain => &self.swapchain,
            PoolScope::Permanent => &self.permanent,
        }
    }
}
// resolve
impl<A: PoolAllocator> FramePools<A> {
    /// 按句柄记录的作用域找到对应的池再解析
    #[inline]
    pub fn image<H: ImageHandle>(&self, handle: H) -> Result<&A::Image, PoolError> {
        self.pool(handle.scope()).image(handle)
    }

    #[inline]
    pub fn buffer<T: bytemuck::Pod>(&self, handle: Buffer<T>) -> Result<&A::Buffer, PoolError> {
        self.pool(handle.scope()).buffer(handle)
    }

    #[inline]
    pub fn name_of<H: PoolHandle>(&self, handle: H) -> Result<&str, PoolError> {
        self.pool(handle.scope()).name_of(handle)
    }
}
// update
impl<A: PoolAllocator> FramePools<A> {
    /// 开始使用某个 frame slot
    ///
    /// 调用者必须已经等待该 slot 上一帧的 GPU 工作完成
    pub fn begin_frame(&mut self, allocator: &A, label: FrameLabel) {
        self.per_frame[*label].reset(allocator);
    }

    /// 交换链重建之后调用，旧尺寸的资源不会再被复用，直接释放
    ///
    /// 调用者必须已经等待设备空闲
    pub fn on_swapchain_recreated(&mut self, allocator: &A) {
        self.swapchain.reset(allocator);
        self.swapchain.release_free_list(allocator);
    }

    pub fn log_stats(&self) {
        for pool in self.per_frame.iter().chain([&self.swapchain, &self.permanent]) {
            let stats = pool.stats();
            log::info!(
                "{} pool: live={}, recycled={}, allocations={}",
                pool.scope(),
                stats.live,
                stats.recycled,
                stats.allocations
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use ash::vk;

    use super::*;
    use crate::resource_pool::{desc::ImageDesc, mock::MockAllocator};

    fn hdr_desc() -> ImageDesc {
        ImageDesc::texture_2d(
            vk::Format::R16G16B16A16_SFLOAT,
            vk::Extent2D {
                width: 1280,
                height: 720,
            },
            vk::ImageUsageFlags::STORAGE | vk::ImageUsageFlags::SAMPLED,
        )
    }

    #[test]
    fn in_flight_frames_get_distinct_memory() {
        let alloc = MockAllocator::default();
        let mut pools = FramePools::new();

        let mut ids = Vec::new();
        for label in FrameCounter::frame_labels() {
            pools.begin_frame(&alloc, label);
            let handle = pools.frame_mut(label).acquire_texture_2d(&alloc, "hdr", hdr_desc()).unwrap();
            ids.push(pools.image(handle).unwrap().id);
        }
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 3);

        pools.destroy(&alloc);
        assert_eq!(alloc.alive(), 0);
    }

    #[test]
    fn reset_slot_never_hands_out_memory_of_other_slots() {
        let alloc = MockAllocator::default();
        let mut pools = FramePools::new();

        let in_b = pools.frame_mut(FrameLabel::B).acquire_texture_2d(&alloc, "hdr", hdr_desc()).unwrap();
        let in_c = pools.frame_mut(FrameLabel::C).acquire_texture_2d(&alloc, "hdr", hdr_desc()).unwrap();
        let old_a = pools.frame_mut(FrameLabel::A).acquire_texture_2d(&alloc, "hdr", hdr_desc()).unwrap();

        // slot A 的上一帧已经完成，B 与 C 仍在 GPU 上
        pools.begin_frame(&alloc, FrameLabel::A);
        let new_a = pools.frame_mut(FrameLabel::A).acquire_texture_2d(&alloc, "hdr", hdr_desc()).unwrap();

        let new_id = pools.image(new_a).unwrap().id;
        assert_ne!(new_id, pools.image(in_b).unwrap().id);
        assert_ne!(new_id, pools.image(in_c).unwrap().id);
        assert!(matches!(pools.image(old_a), Err(PoolError::StaleHandle { .. })));

        pools.destroy(&alloc);
    }

    #[test]
    fn swapchain_recreation_releases_old_sizes() {
        let alloc = MockAllocator::default();
        let mut pools = FramePools::new();

        pools.swapchain_mut().acquire_texture_2d(&alloc, "depth", hdr_desc()).unwrap();
        pools.permanent_mut().acquire_texture_2d(&alloc, "lut", hdr_desc()).unwrap();
        pools.on_swapchain_recreated(&alloc);
        assert_eq!(pools.swapchain().stats().live, 0);
        assert_eq!(pools.swapchain().stats().recycled, 0);
        assert!(pools.permanent().contains("lut"));
        assert_eq!(alloc.destroyed.get(), 1);

        pools.destroy(&alloc);
    }
}
