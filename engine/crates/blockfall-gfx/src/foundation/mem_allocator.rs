use std::ops::Deref;

use ash::vk;

use crate::error::GfxResult;

/// vma 的封装
///
/// vma 需要引用 Instance 以及 Device，必须在两者之后创建，在两者之前销毁
pub struct GfxMemAllocator {
    inner: vk_mem::Allocator,
}

impl GfxMemAllocator {
    pub fn new(instance: &ash::Instance, pdevice: vk::PhysicalDevice, device: &ash::Device) -> GfxResult<Self> {
        let mut vma_ci = vk_mem::AllocatorCreateInfo::new(instance, device, pdevice);
        vma_ci.vulkan_api_version = vk::API_VERSION_1_3;
        vma_ci.flags = vk_mem::AllocatorCreateFlags::BUFFER_DEVICE_ADDRESS;

        let inner = unsafe { vk_mem::Allocator::new(vma_ci)? };
        Ok(Self { inner })
    }

    /// 通过 drop 触发销毁
    pub fn destroy(self) {
        log::info!("destroying GfxMemAllocator");
    }
}

impl Deref for GfxMemAllocator {
    type Target = vk_mem::Allocator;
    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}
