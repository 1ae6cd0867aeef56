use ash::vk;

use crate::{error::GfxResult, foundation::debug_messenger::DebugType, gfx_context::GfxContext};

/// binary semaphore 或者 timeline semaphore
///
/// # Destroy
/// 可以 Clone，因此不在 Drop 中销毁，需要手动 destroy
#[derive(Clone)]
pub struct GfxSemaphore {
    semaphore: vk::Semaphore,
}

// 创建与销毁
impl GfxSemaphore {
    pub fn new(ctx: &GfxContext, debug_name: &str) -> GfxResult<Self> {
        let device = ctx.device();
        let semaphore = unsafe { device.create_semaphore(&vk::SemaphoreCreateInfo::default(), None)? };

        let semaphore = Self { semaphore };
        device.set_debug_name(&semaphore, debug_name);
        Ok(semaphore)
    }

    pub fn new_timeline(ctx: &GfxContext, initial_value: u64, debug_name: &str) -> GfxResult<Self> {
        let device = ctx.device();
        let mut timeline_type_ci = vk::SemaphoreTypeCreateInfo::default()
            .semaphore_type(vk::SemaphoreType::TIMELINE)
            .initial_value(initial_value);
        let timeline_semaphore_ci = vk::SemaphoreCreateInfo::default().push_next(&mut timeline_type_ci);
        let semaphore = unsafe { device.create_semaphore(&timeline_semaphore_ci, None)? };

        let semaphore = Self { semaphore };
        device.set_debug_name(&semaphore, debug_name);
        Ok(semaphore)
    }

    /// 包装一个已有的 handle，不负责其生命周期
    #[inline]
    pub fn from_raw(semaphore: vk::Semaphore) -> Self {
        Self { semaphore }
    }

    #[inline]
    pub fn destroy(self, ctx: &GfxContext) {
        unsafe {
            ctx.device().destroy_semaphore(self.semaphore, None);
        }
    }
}

// getters
impl GfxSemaphore {
    #[inline]
    pub fn handle(&self) -> vk::Semaphore {
        self.semaphore
    }
}

// tools
impl GfxSemaphore {
    /// 等待 timeline semaphore 达到指定的值
    ///
    /// 超时返回 `GfxError::Timeout`
    #[inline]
    pub fn wait_timeline(&self, ctx: &GfxContext, timeline_value: u64, timeout_ns: u64) -> GfxResult<()> {
        let wait_semaphore = [self.semaphore];
        let wait_info = vk::SemaphoreWaitInfo::default()
            .semaphores(&wait_semaphore)
            .values(std::slice::from_ref(&timeline_value));
        unsafe { ctx.device().wait_semaphores(&wait_info, timeout_ns)? };
        Ok(())
    }

    /// timeline semaphore 当前的值
    #[inline]
    pub fn timeline_value(&self, ctx: &GfxContext) -> GfxResult<u64> {
        Ok(unsafe { ctx.device().get_semaphore_counter_value(self.semaphore)? })
    }
}

impl DebugType for GfxSemaphore {
    fn debug_type_name() -> &'static str {
        "GfxSemaphore"
    }

    fn vk_handle(&self) -> impl vk::Handle {
        self.semaphore
    }
}
