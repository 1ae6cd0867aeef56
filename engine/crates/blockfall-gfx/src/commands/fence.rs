use ash::vk;

use crate::{error::GfxResult, foundation::debug_messenger::DebugType, gfx_context::GfxContext};

/// # Destroy
/// 可以 Clone，因此不在 Drop 中销毁，需要手动 destroy
#[derive(Clone)]
pub struct GfxFence {
    fence: vk::Fence,
}

impl DebugType for GfxFence {
    fn debug_type_name() -> &'static str {
        "GfxFence"
    }

    fn vk_handle(&self) -> impl vk::Handle {
        self.fence
    }
}

// 创建与销毁
impl GfxFence {
    /// # param
    /// * signaled - 是否创建时就 signaled
    pub fn new(ctx: &GfxContext, signaled: bool, debug_name: &str) -> GfxResult<Self> {
        let device = ctx.device();
        let fence_flags = if signaled { vk::FenceCreateFlags::SIGNALED } else { vk::FenceCreateFlags::empty() };
        let fence = unsafe { device.create_fence(&vk::FenceCreateInfo::default().flags(fence_flags), None)? };

        let fence = Self { fence };
        device.set_debug_name(&fence, debug_name);
        Ok(fence)
    }

    #[inline]
    pub fn destroy(self, ctx: &GfxContext) {
        unsafe {
            ctx.device().destroy_fence(self.fence, None);
        }
    }
}

// getters
impl GfxFence {
    #[inline]
    pub fn handle(&self) -> vk::Fence {
        self.fence
    }
}

// tools
impl GfxFence {
    /// 阻塞等待 fence
    #[inline]
    pub fn wait(&self, ctx: &GfxContext) -> GfxResult<()> {
        unsafe { ctx.device().wait_for_fences(std::slice::from_ref(&self.fence), true, u64::MAX)? };
        Ok(())
    }

    #[inline]
    pub fn reset(&self, ctx: &GfxContext) -> GfxResult<()> {
        unsafe { ctx.device().reset_fences(std::slice::from_ref(&self.fence))? };
        Ok(())
    }
}
