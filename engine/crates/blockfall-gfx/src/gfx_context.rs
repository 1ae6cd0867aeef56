use std::{ffi::CStr, rc::Rc};

use ash::vk;

use crate::{
    commands::{
        command_buffer::GfxCommandBuffer, command_pool::GfxCommandPool, command_queue::GfxCommandQueue,
        submit_info::GfxSubmitInfo,
    },
    error::{GfxError, GfxResult},
    foundation::{
        debug_messenger::GfxDebugMsger, device::GfxDevice, instance::GfxInstance, mem_allocator::GfxMemAllocator,
        physical_device::GfxPhysicalDevice,
    },
};

/// Vulkan 核心上下文
///
/// 包含 entry、instance、物理设备、逻辑设备、图形队列以及内存分配器。
/// 由调用方持有并以引用的形式传入各个需要创建 GPU 对象的地方，不存在全局单例。
///
/// # 销毁
/// 需要手动调用 [`GfxContext::destroy`]，所有由该 context 创建的对象都必须先被销毁。
pub struct GfxContext {
    /// vk 基础函数的接口
    ///
    /// 在 drop 之后，会卸载 dll，因此需要确保该字段最后 drop
    vk_entry: ash::Entry,
    instance: GfxInstance,
    physical_device: GfxPhysicalDevice,
    debug_msger: GfxDebugMsger,
    device: Rc<GfxDevice>,
    gfx_queue: GfxCommandQueue,
    allocator: GfxMemAllocator,

    /// 一次性命令使用的 command pool
    temp_command_pool: GfxCommandPool,
}

// new & init
impl GfxContext {
    const ENGINE_NAME: &'static str = "Blockfall";

    /// # param
    /// * extra_instance_exts - 窗口系统创建 surface 所需的 instance extensions
    pub fn new(app_name: &str, extra_instance_exts: &[&'static CStr]) -> GfxResult<Self> {
        let _span = tracy_client::span!("GfxContext::new");

        let vk_entry = unsafe { ash::Entry::load() }.map_err(|e| GfxError::EntryLoad(e.to_string()))?;
        let instance = GfxInstance::new(&vk_entry, app_name, Self::ENGINE_NAME, extra_instance_exts)?;
        let debug_msger = GfxDebugMsger::new(&vk_entry, instance.ash_instance())?;
        let physical_device = GfxPhysicalDevice::new_discrete_physical_device(instance.ash_instance())?;

        let queue_priorities = [1.0_f32];
        let gfx_queue_family = physical_device.gfx_queue_family().clone();
        let queue_create_infos = [vk::DeviceQueueCreateInfo::default()
            .queue_family_index(gfx_queue_family.queue_family_index)
            .queue_priorities(&queue_priorities)];
        let device = Rc::new(GfxDevice::new(
            instance.ash_instance(),
            physical_device.vk_handle(),
            &queue_create_infos,
        )?);

        let gfx_queue = GfxCommandQueue {
            vk_queue: unsafe { device.get_device_queue(gfx_queue_family.queue_family_index, 0) },
            queue_family: gfx_queue_family.clone(),
            device: device.clone(),
        };
        device.set_debug_name(&gfx_queue, "main-gfx-queue");

        let allocator = GfxMemAllocator::new(instance.ash_instance(), physical_device.vk_handle(), &device)?;

        let temp_command_pool = GfxCommandPool::new(
            device.clone(),
            gfx_queue_family,
            vk::CommandPoolCreateFlags::TRANSIENT,
            "gfx-context-temp",
        )?;

        log::info!(
            "gfx context created, gpu: {:?}",
            physical_device.basic_props().device_name_as_c_str().unwrap_or_default()
        );

        Ok(Self {
            vk_entry,
            instance,
            physical_device,
            debug_msger,
            device,
            gfx_queue,
            allocator,
            temp_command_pool,
        })
    }
}

// destroy
impl GfxContext {
    /// 按照依赖的逆序销毁
    pub fn destroy(self) {
        let Self {
            vk_entry,
            instance,
            physical_device: _,
            debug_msger,
            device,
            gfx_queue,
            allocator,
            temp_command_pool,
        } = self;

        if let Err(e) = device.wait_idle() {
            log::error!("wait idle before destroying gfx context failed: {}", e);
        }
        temp_command_pool.destroy();
        allocator.destroy();
        drop(gfx_queue);
        device.destroy();
        debug_msger.destroy();
        instance.destroy();
        drop(vk_entry);
    }
}

// getters
impl GfxContext {
    #[inline]
    pub fn vk_entry(&self) -> &ash::Entry {
        &self.vk_entry
    }

    #[inline]
    pub fn instance(&self) -> &GfxInstance {
        &self.instance
    }

    #[inline]
    pub fn physical_device(&self) -> &GfxPhysicalDevice {
        &self.physical_device
    }

    #[inline]
    pub fn device(&self) -> &Rc<GfxDevice> {
        &self.device
    }

    #[inline]
    pub fn gfx_queue(&self) -> &GfxCommandQueue {
        &self.gfx_queue
    }

    #[inline]
    pub fn allocator(&self) -> &GfxMemAllocator {
        &self.allocator
    }
}

// tools
impl GfxContext {
    /// 立即执行某个 command，并同步等待执行结果
    pub fn one_time_exec<F, R>(&self, func: F, name: &str) -> GfxResult<R>
    where
        F: FnOnce(&GfxCommandBuffer) -> R,
    {
        let _span = tracy_client::span!("GfxContext::one_time_exec");
        let command_buffer = GfxCommandBuffer::new(&self.temp_command_pool, name)?;

        command_buffer.begin(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT, name)?;
        let result = func(&command_buffer);
        command_buffer.end()?;

        let submit = GfxSubmitInfo::new(std::slice::from_ref(&command_buffer));
        let submit_result = self.gfx_queue.submit(std::slice::from_ref(&submit), None).and_then(|_| self.gfx_queue.wait_idle());
        self.temp_command_pool.free_command_buffers(vec![command_buffer]);
        submit_result?;

        Ok(result)
    }

    /// 从候选列表中找到第一个满足 features 的 format
    pub fn find_supported_format(
        &self,
        candidates: &[vk::Format],
        tiling: vk::ImageTiling,
        features: vk::FormatFeatureFlags,
    ) -> Option<vk::Format> {
        candidates.iter().copied().find(|f| {
            let props = unsafe {
                self.instance
                    .ash_instance()
                    .get_physical_device_format_properties(self.physical_device.vk_handle(), *f)
            };
            match tiling {
                vk::ImageTiling::LINEAR => props.linear_tiling_features.contains(features),
                vk::ImageTiling::OPTIMAL => props.optimal_tiling_features.contains(features),
                _ => false,
            }
        })
    }

    #[inline]
    pub fn wait_idle(&self) -> GfxResult<()> {
        self.device.wait_idle()
    }
}
