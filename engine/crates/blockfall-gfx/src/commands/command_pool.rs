use std::rc::Rc;

use ash::vk;

use crate::{
    commands::{command_buffer::GfxCommandBuffer, command_queue::GfxQueueFamily},
    error::GfxResult,
    foundation::{debug_messenger::DebugType, device::GfxDevice},
};

/// command pool 是和 queue family 绑定的，而不是和 queue 绑定的
pub struct GfxCommandPool {
    handle: vk::CommandPool,
    device: Rc<GfxDevice>,
    _queue_family: GfxQueueFamily,

    debug_name: String,
    destroyed: bool,
}
// 创建与销毁
impl GfxCommandPool {
    pub fn new(
        device: Rc<GfxDevice>,
        queue_family: GfxQueueFamily,
        flags: vk::CommandPoolCreateFlags,
        debug_name: &str,
    ) -> GfxResult<Self> {
        let pool = unsafe {
            device.create_command_pool(
                &vk::CommandPoolCreateInfo::default().queue_family_index(queue_family.queue_family_index).flags(flags),
                None,
            )?
        };

        let command_pool = Self {
            handle: pool,
            device,
            _queue_family: queue_family,
            debug_name: debug_name.to_string(),
            destroyed: false,
        };
        command_pool.device.set_debug_name(&command_pool, debug_name);
        Ok(command_pool)
    }

    pub fn destroy(mut self) {
        unsafe {
            self.device.destroy_command_pool(self.handle, None);
        }
        self.destroyed = true;
    }
}

// getters
impl GfxCommandPool {
    #[inline]
    pub fn handle(&self) -> vk::CommandPool {
        self.handle
    }

    #[inline]
    pub fn device(&self) -> &Rc<GfxDevice> {
        &self.device
    }
}
// tools
impl GfxCommandPool {
    /// 这个调用并不会释放资源，而是将 pool 内的 command buffer 设置到初始状态
    ///
    /// reset 之后，pool 内的 command buffer 又可以重新录制命令
    pub fn reset_all_buffers(&self) -> GfxResult<()> {
        unsafe {
            self.device.reset_command_pool(self.handle, vk::CommandPoolResetFlags::RELEASE_RESOURCES)?;
        }
        Ok(())
    }

    /// 释放之后，command buffer 不能再被使用
    pub fn free_command_buffers(&self, command_buffers: Vec<GfxCommandBuffer>) {
        let handles: Vec<vk::CommandBuffer> = command_buffers.iter().map(|cmd| cmd.vk_handle()).collect();
        unsafe {
            self.device.free_command_buffers(self.handle, &handles);
        }
    }
}

impl DebugType for GfxCommandPool {
    fn debug_type_name() -> &'static str {
        "GfxCommandPool"
    }

    fn vk_handle(&self) -> impl vk::Handle {
        self.handle
    }
}

impl Drop for GfxCommandPool {
    fn drop(&mut self) {
        debug_assert!(self.destroyed, "GfxCommandPool {} must be destroyed manually.", self.debug_name);
    }
}
