use std::collections::HashMap;

use ash::vk;
use indexmap::IndexMap;
use slotmap::SlotMap;

use crate::resource_pool::{
    allocator::PoolAllocator,
    desc::{BufferDesc, BufferMemory, ImageDesc, ImageKind, ResourceDesc},
    error::PoolError,
    handle::{Buffer, Cubemap, ImageHandle, PoolHandle, PoolKey, PoolScope, Texture2D, Texture2DMS},
};

enum PooledResource<A: PoolAllocator> {
    Image(A::Image),
    Buffer(A::Buffer),
}
impl<A: PoolAllocator> PooledResource<A> {
    fn destroy(self, allocator: &A) {
        match self {
            Self::Image(image) => allocator.destroy_image(image),
            Self::Buffer(buffer) => allocator.destroy_buffer(buffer),
        }
    }

    fn rename(&self, allocator: &A, name: &str) {
        match self {
            Self::Image(image) => allocator.rename_image(image, name),
            Self::Buffer(buffer) => allocator.rename_buffer(buffer, name),
        }
    }
}

struct PoolEntry<A: PoolAllocator> {
    name: String,
    desc: ResourceDesc,
    resource: PooledResource<A>,
}

/// reset 之后等待复用的物理资源
struct FreeEntry<A: PoolAllocator> {
    desc: ResourceDesc,
    resource: PooledResource<A>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// 当前作用域内登记的资源数
    pub live: usize,
    /// free list 中等待复用的资源数
    pub recycled: usize,
    /// 累计向后端申请的次数
    pub allocations: u64,
}

/// 按名字缓存 GPU 资源的资源池，对应一个生命周期作用域
///
/// - 同名且描述相同的请求返回同一份资源，描述不同则报错
/// - `reset` 之后所有句柄失效，物理资源进入 free list 等待相同描述的请求
/// - 一整个 reset 周期都没有被复用的 free list 资源会被销毁
///
/// 只允许构建当前帧的线程访问
pub struct ResourcePool<A: PoolAllocator> {
    scope: PoolScope,
    arena: SlotMap<PoolKey, PoolEntry<A>>,
    names: IndexMap<String, PoolKey>,
    free_list: Vec<FreeEntry<A>>,

    /// 上一次 reset 时失效的 key，用于给 StaleHandle 报出名字
    retired_names: HashMap<PoolKey, String>,

    allocations: u64,
}
// new & init
impl<A: PoolAllocator> ResourcePool<A> {
    pub fn new(scope: PoolScope) -> Self {
        Self {
            scope,
            arena: SlotMap::with_key(),
            names: IndexMap::new(),
            free_list: Vec::new(),
            retired_names: HashMap::new(),
            allocations: 0,
        }
    }
}
// destroy
impl<A: PoolAllocator> ResourcePool<A> {
    pub fn destroy(mut self, allocator: &A) {
        self.destroy_mut(allocator);
    }

    pub fn destroy_mut(&mut self, allocator: &A) {
        for (_, entry) in self.arena.drain() {
            entry.resource.destroy(allocator);
        }
        self.names.clear();
        self.retired_names.clear();
        self.release_free_list(allocator);
    }
}
impl<A: PoolAllocator> Drop for ResourcePool<A> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            return;
        }
        debug_assert!(
            self.arena.is_empty() && self.free_list.is_empty(),
            "{} pool dropped without destroy",
            self.scope
        );
    }
}
// getters
impl<A: PoolAllocator> ResourcePool<A> {
    #[inline]
    pub fn scope(&self) -> PoolScope {
        self.scope
    }

    #[inline]
    pub fn contains(&self, name: &str) -> bool {
        self.names.contains_key(name)
    }

    pub fn stats(&self) -> PoolStats {
        PoolStats {
            live: self.arena.len(),
            recycled: self.free_list.len(),
            allocations: self.allocations,
        }
    }

    /// 按登记顺序列出当前作用域内的资源
    pub fn live_resources(&self) -> impl Iterator<Item = (&str, &ResourceDesc)> {
        self.names.iter().filter_map(|(name, key)| self.arena.get(*key).map(|entry| (name.as_str(), &entry.desc)))
    }
}
// acquire
impl<A: PoolAllocator> ResourcePool<A> {
    /// 同名同描述返回已有资源；同名不同描述返回 [`PoolError::DescriptorMismatch`]；
    /// 否则优先复用 free list 中相同描述的资源，最后才向后端申请
    pub fn acquire(&mut self, allocator: &A, name: &str, desc: impl Into<ResourceDesc>) -> Result<PoolKey, PoolError> {
        let desc = desc.into();
        if let Some(&key) = self.names.get(name) {
            let existing = &self.arena[key];
            if existing.desc != desc {
                return Err(PoolError::DescriptorMismatch {
                    name: name.to_string(),
                    scope: self.scope,
                    existing: existing.desc.to_string(),
                    requested: desc.to_string(),
                });
            }
            return Ok(key);
        }

        let resource = match self.free_list.iter().position(|free| free.desc == desc) {
            Some(idx) => {
                let free = self.free_list.swap_remove(idx);
                free.resource.rename(allocator, name);
                free.resource
            }
            None => {
                let resource = match &desc {
                    ResourceDesc::Image(image_desc) => PooledResource::Image(allocator.create_image(name, image_desc)?),
                    ResourceDesc::Buffer(buffer_desc) => {
                        PooledResource::Buffer(allocator.create_buffer(name, buffer_desc)?)
                    }
                };
                self.allocations += 1;
                log::debug!("{} pool allocates `{}`: {}", self.scope, name, desc);
                resource
            }
        };

        let key = self.arena.insert(PoolEntry {
            name: name.to_string(),
            desc,
            resource,
        });
        self.names.insert(name.to_string(), key);
        Ok(key)
    }

    fn acquire_image_kind(&mut self, allocator: &A, name: &str, desc: ImageDesc, expected: fn(ImageKind) -> bool) -> Result<PoolKey, PoolError> {
        if !expected(desc.kind) {
            return Err(PoolError::KindMismatch { name: name.to_string() });
        }
        self.acquire(allocator, name, desc)
    }

    pub fn acquire_texture_2d(&mut self, allocator: &A, name: &str, desc: ImageDesc) -> Result<Texture2D, PoolError> {
        let key = self.acquire_image_kind(allocator, name, desc, Texture2D::accepts)?;
        Ok(Texture2D::new(key, self.scope))
    }

    pub fn acquire_cubemap(&mut self, allocator: &A, name: &str, desc: ImageDesc) -> Result<Cubemap, PoolError> {
        let key = self.acquire_image_kind(allocator, name, desc, Cubemap::accepts)?;
        Ok(Cubemap::new(key, self.scope))
    }

    pub fn acquire_texture_2d_ms(&mut self, allocator: &A, name: &str, desc: ImageDesc) -> Result<Texture2DMS, PoolError> {
        let key = self.acquire_image_kind(allocator, name, desc, Texture2DMS::accepts)?;
        Ok(Texture2DMS::new(key, self.scope))
    }

    /// `len` 个 `T` 的 buffer，长度为 0 时仍然分配一个元素的空间
    pub fn acquire_buffer<T: bytemuck::Pod>(
        &mut self,
        allocator: &A,
        name: &str,
        len: u64,
        usage: vk::BufferUsageFlags,
        memory: BufferMemory,
    ) -> Result<Buffer<T>, PoolError> {
        let desc = BufferDesc {
            size: Buffer::<T>::byte_size_of(len.max(1)),
            usage,
            memory,
        };
        let key = self.acquire(allocator, name, desc)?;
        Ok(Buffer::new(key, self.scope, len))
    }
}
// resolve
impl<A: PoolAllocator> ResourcePool<A> {
    fn entry(&self, key: PoolKey, scope: PoolScope) -> Result<&PoolEntry<A>, PoolError> {
        if scope != self.scope {
            return Err(PoolError::StaleHandle {
                name: format!("<handle issued by {scope} pool>"),
            });
        }
        self.arena.get(key).ok_or_else(|| PoolError::StaleHandle {
            name: self.retired_names.get(&key).cloned().unwrap_or_else(|| "<unknown>".to_string()),
        })
    }

    pub fn image<H: ImageHandle>(&self, handle: H) -> Result<&A::Image, PoolError> {
        let entry = self.entry(handle.key(), handle.scope())?;
        match (&entry.desc, &entry.resource) {
            (ResourceDesc::Image(desc), PooledResource::Image(image)) if H::accepts(desc.kind) => Ok(image),
            _ => Err(PoolError::KindMismatch {
                name: entry.name.clone(),
            }),
        }
    }

    pub fn buffer<T: bytemuck::Pod>(&self, handle: Buffer<T>) -> Result<&A::Buffer, PoolError> {
        let entry = self.entry(handle.key(), handle.scope())?;
        match &entry.resource {
            PooledResource::Buffer(buffer) => Ok(buffer),
            PooledResource::Image(_) => Err(PoolError::KindMismatch {
                name: entry.name.clone(),
            }),
        }
    }

    pub fn name_of<H: PoolHandle>(&self, handle: H) -> Result<&str, PoolError> {
        self.entry(handle.key(), handle.scope()).map(|entry| entry.name.as_str())
    }

    pub fn desc_of<H: PoolHandle>(&self, handle: H) -> Result<&ResourceDesc, PoolError> {
        self.entry(handle.key(), handle.scope()).map(|entry| &entry.desc)
    }

    /// 句柄仍然指向当前作用域的资源
    #[inline]
    pub fn is_live<H: PoolHandle>(&self, handle: H) -> bool {
        handle.scope() == self.scope && self.arena.contains_key(handle.key())
    }
}
// reset
impl<A: PoolAllocator> ResourcePool<A> {
    /// 使作用域内的所有句柄失效，物理资源进入 free list
    ///
    /// 调用者需要保证 GPU 已经不再使用这个作用域内的资源
    pub fn reset(&mut self, allocator: &A) {
        let _span = tracy_client::span!("ResourcePool::reset");

        // 上一个周期留下且没有被复用的资源
        let trimmed = self.free_list.len();
        self.release_free_list(allocator);
        if trimmed > 0 {
            log::debug!("{} pool trims {} unused resources", self.scope, trimmed);
        }

        self.names.clear();
        self.retired_names.clear();
        for (key, entry) in self.arena.drain() {
            self.retired_names.insert(key, entry.name);
            self.free_list.push(FreeEntry {
                desc: entry.desc,
                resource: entry.resource,
            });
        }
    }

    /// 立即销毁一个资源，下一次同名请求会重新创建
    ///
    /// 返回该名字是否存在。调用者需要保证 GPU 已经不再使用这个资源
    pub fn invalidate(&mut self, allocator: &A, name: &str) -> bool {
        let Some(key) = self.names.shift_remove(name) else {
            return false;
        };
        if let Some(entry) = self.arena.remove(key) {
            log::info!("{} pool invalidates `{}`", self.scope, name);
            self.retired_names.insert(key, entry.name);
            entry.resource.destroy(allocator);
        }
        true
    }

    /// 立即销毁 free list 中的所有资源
    pub fn release_free_list(&mut self, allocator: &A) {
        for free in self.free_list.drain(..) {
            free.resource.destroy(allocator);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{frame_counter::FrameLabel, resource_pool::mock::MockAllocator};

    fn extent(size: u32) -> vk::Extent2D {
        vk::Extent2D {
            width: size,
            height: size,
        }
    }

    fn depth_512() -> ImageDesc {
        ImageDesc::texture_2d(
            vk::Format::D32_SFLOAT,
            extent(512),
            vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT | vk::ImageUsageFlags::SAMPLED,
        )
    }

    #[test]
    fn same_name_and_desc_returns_same_resource() {
        let alloc = MockAllocator::default();
        let mut pool = ResourcePool::new(PoolScope::Swapchain);

        let a = pool.acquire_texture_2d(&alloc, "depth", depth_512()).unwrap();
        let b = pool.acquire_texture_2d(&alloc, "depth", depth_512()).unwrap();
        assert_eq!(a, b);
        assert_eq!(pool.image(a).unwrap().id, pool.image(b).unwrap().id);
        assert_eq!(alloc.created.get(), 1);
        assert_eq!(pool.stats().live, 1);

        pool.destroy(&alloc);
        assert_eq!(alloc.alive(), 0);
    }

    #[test]
    fn descriptor_mismatch_is_an_error() {
        let alloc = MockAllocator::default();
        let mut pool = ResourcePool::new(PoolScope::PerFrame(FrameLabel::A));

        pool.acquire_texture_2d(&alloc, "shadow", depth_512()).unwrap();
        let color_256 =
            ImageDesc::texture_2d(vk::Format::R8G8B8A8_UNORM, extent(256), vk::ImageUsageFlags::COLOR_ATTACHMENT);
        let err = pool.acquire_texture_2d(&alloc, "shadow", color_256).unwrap_err();
        match &err {
            PoolError::DescriptorMismatch {
                name,
                existing,
                requested,
                ..
            } => {
                assert_eq!(name, "shadow");
                assert!(existing.contains("512x512"));
                assert!(requested.contains("256x256"));
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert!(err.is_configuration_error());
        assert_eq!(alloc.created.get(), 1);

        pool.destroy(&alloc);
    }

    #[test]
    fn handles_are_stale_after_reset() {
        let alloc = MockAllocator::default();
        let mut pool = ResourcePool::new(PoolScope::Swapchain);

        let old = pool.acquire_texture_2d(&alloc, "color", depth_512()).unwrap();
        pool.reset(&alloc);
        assert!(!pool.is_live(old));
        match pool.image(old) {
            Err(PoolError::StaleHandle { name }) => assert_eq!(name, "color"),
            other => panic!("expected stale handle, got {:?}", other.map(|r| r.id)),
        }

        let new = pool.acquire_texture_2d(&alloc, "color", depth_512()).unwrap();
        assert_ne!(old, new);
        assert!(pool.image(old).is_err());

        pool.destroy(&alloc);
    }

    #[test]
    fn reset_recycles_matching_descriptors() {
        let alloc = MockAllocator::default();
        let mut pool = ResourcePool::new(PoolScope::PerFrame(FrameLabel::A));

        let first = pool.acquire_texture_2d(&alloc, "bloom_0", depth_512()).unwrap();
        let first_id = pool.image(first).unwrap().id;
        pool.reset(&alloc);
        assert_eq!(pool.stats(), PoolStats { live: 0, recycled: 1, allocations: 1 });

        // 名字不同但描述相同，同样可以复用
        let second = pool.acquire_texture_2d(&alloc, "bloom_1", depth_512()).unwrap();
        let resource = pool.image(second).unwrap();
        assert_eq!(resource.id, first_id);
        assert_eq!(*resource.name.borrow(), "bloom_1");
        assert_eq!(alloc.created.get(), 1);

        pool.destroy(&alloc);
    }

    #[test]
    fn unused_free_entries_are_trimmed_after_a_cycle() {
        let alloc = MockAllocator::default();
        let mut pool = ResourcePool::new(PoolScope::Swapchain);

        pool.acquire_texture_2d(&alloc, "a", depth_512()).unwrap();
        pool.acquire_buffer::<u32>(&alloc, "b", 16, vk::BufferUsageFlags::STORAGE_BUFFER, BufferMemory::DeviceLocal)
            .unwrap();
        pool.reset(&alloc);
        assert_eq!(pool.stats().recycled, 2);
        assert_eq!(alloc.destroyed.get(), 0);

        pool.reset(&alloc);
        assert_eq!(pool.stats().recycled, 0);
        assert_eq!(alloc.destroyed.get(), 2);

        pool.destroy(&alloc);
    }

    #[test]
    fn kind_mismatch_on_typed_acquire() {
        let alloc = MockAllocator::default();
        let mut pool = ResourcePool::new(PoolScope::Permanent);

        let cube = ImageDesc::cube(vk::Format::R16G16B16A16_SFLOAT, 32, vk::ImageUsageFlags::SAMPLED);
        assert!(matches!(
            pool.acquire_texture_2d(&alloc, "env", cube),
            Err(PoolError::KindMismatch { .. })
        ));
        let handle = pool.acquire_cubemap(&alloc, "env", cube).unwrap();
        assert!(pool.image(handle).is_ok());

        pool.destroy(&alloc);
    }

    #[test]
    fn handles_from_another_scope_are_rejected() {
        let alloc = MockAllocator::default();
        let mut frame_a = ResourcePool::new(PoolScope::PerFrame(FrameLabel::A));
        let mut frame_b = ResourcePool::new(PoolScope::PerFrame(FrameLabel::B));

        let in_a = frame_a.acquire_texture_2d(&alloc, "x", depth_512()).unwrap();
        frame_b.acquire_texture_2d(&alloc, "x", depth_512()).unwrap();
        assert!(matches!(frame_b.image(in_a), Err(PoolError::StaleHandle { .. })));

        frame_a.destroy(&alloc);
        frame_b.destroy(&alloc);
    }

    #[test]
    fn invalidate_drops_one_entry() {
        let alloc = MockAllocator::default();
        let mut pool = ResourcePool::new(PoolScope::Permanent);

        let lut = pool.acquire_texture_2d(&alloc, "sky_lut", depth_512()).unwrap();
        let keep = pool.acquire_texture_2d(&alloc, "other", depth_512()).unwrap();
        assert!(pool.invalidate(&alloc, "sky_lut"));
        assert!(!pool.invalidate(&alloc, "sky_lut"));
        assert!(!pool.contains("sky_lut"));
        assert!(pool.image(lut).is_err());
        assert!(pool.image(keep).is_ok());
        assert_eq!(alloc.destroyed.get(), 1);

        pool.destroy(&alloc);
        assert_eq!(alloc.alive(), 0);
    }

    #[test]
    fn device_errors_propagate() {
        let alloc = MockAllocator::default();
        alloc.fail.set(true);
        let mut pool = ResourcePool::new(PoolScope::Swapchain);

        let err = pool.acquire_texture_2d(&alloc, "depth", depth_512()).unwrap_err();
        assert!(matches!(err, PoolError::Device(_)));
        assert!(!err.is_configuration_error());
        assert!(!pool.contains("depth"));

        pool.destroy(&alloc);
    }

    #[test]
    fn typed_buffer_keeps_element_count() {
        let alloc = MockAllocator::default();
        let mut pool = ResourcePool::new(PoolScope::PerFrame(FrameLabel::C));

        let buffer = pool
            .acquire_buffer::<[u32; 5]>(&alloc, "draws", 3, vk::BufferUsageFlags::INDIRECT_BUFFER, BufferMemory::DeviceLocal)
            .unwrap();
        assert_eq!(buffer.len(), 3);
        match pool.desc_of(buffer).unwrap() {
            ResourceDesc::Buffer(desc) => assert_eq!(desc.size, 60),
            other => panic!("unexpected desc {other:?}"),
        }
        assert_eq!(pool.name_of(buffer).unwrap(), "draws");

        pool.destroy(&alloc);
    }
}
