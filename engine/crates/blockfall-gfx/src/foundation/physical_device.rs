use std::ffi::CStr;

use ash::vk;
use itertools::Itertools;

use crate::{
    commands::command_queue::GfxQueueFamily,
    error::{GfxError, GfxResult},
    foundation::debug_messenger::DebugType,
};

/// 表示一张物理显卡
pub struct GfxPhysicalDevice {
    pub(crate) vk_handle: vk::PhysicalDevice,

    /// 当前 gpu 的基础属性
    pub(crate) basic_props: vk::PhysicalDeviceProperties,

    pub(crate) mem_props: vk::PhysicalDeviceMemoryProperties,

    /// 同时支持 graphics、compute、transfer 的队列族
    pub(crate) gfx_queue_family: GfxQueueFamily,
}

impl GfxPhysicalDevice {
    /// 优先选择独立显卡，如果没有则选择第一个可用的显卡
    ///
    /// 没有图形队列的显卡会被忽略
    pub fn new_discrete_physical_device(instance: &ash::Instance) -> GfxResult<Self> {
        let pdevices = unsafe { instance.enumerate_physical_devices()? };
        pdevices
            .into_iter()
            .filter_map(|pdevice| Self::new(pdevice, instance))
            .find_or_first(Self::is_discrete_gpu)
            .ok_or(GfxError::NoSuitableDevice)
    }

    fn new(pdevice: vk::PhysicalDevice, instance: &ash::Instance) -> Option<Self> {
        unsafe {
            let basic_props = instance.get_physical_device_properties(pdevice);
            let physical_device_name = CStr::from_ptr(basic_props.device_name.as_ptr());
            log::info!("found gpu: {:?}", physical_device_name);

            let queue_family_props = instance.get_physical_device_queue_family_properties(pdevice);
            log::debug!("physical device: queue family props:\n{:#?}", queue_family_props);

            // 全能的 Queue：graphics, compute, transfer
            let required = vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE | vk::QueueFlags::TRANSFER;
            let Some(gfx_queue_family) = queue_family_props
                .iter()
                .enumerate()
                .find(|(_, props)| props.queue_flags.contains(required))
                .map(|(family_idx, props)| GfxQueueFamily {
                    name: "gfx".to_string(),
                    queue_family_index: family_idx as u32,
                    queue_flags: props.queue_flags,
                    queue_count: props.queue_count,
                })
            else {
                log::warn!("gpu {:?} has no graphics queue, skipped", physical_device_name);
                return None;
            };

            Some(Self {
                vk_handle: pdevice,
                basic_props,
                mem_props: instance.get_physical_device_memory_properties(pdevice),
                gfx_queue_family,
            })
        }
    }
}

// getters
impl GfxPhysicalDevice {
    /// 当前 gpu 是否是独立显卡
    #[inline]
    pub fn is_discrete_gpu(&self) -> bool {
        self.basic_props.device_type == vk::PhysicalDeviceType::DISCRETE_GPU
    }

    #[inline]
    pub fn vk_handle(&self) -> vk::PhysicalDevice {
        self.vk_handle
    }

    #[inline]
    pub fn basic_props(&self) -> &vk::PhysicalDeviceProperties {
        &self.basic_props
    }

    #[inline]
    pub fn mem_props(&self) -> &vk::PhysicalDeviceMemoryProperties {
        &self.mem_props
    }

    #[inline]
    pub fn gfx_queue_family(&self) -> &GfxQueueFamily {
        &self.gfx_queue_family
    }

    /// 颜色和深度 attachment 同时支持的最大采样数
    pub fn max_framebuffer_samples(&self) -> vk::SampleCountFlags {
        let limits = &self.basic_props.limits;
        let counts = limits.framebuffer_color_sample_counts & limits.framebuffer_depth_sample_counts;
        [vk::SampleCountFlags::TYPE_8, vk::SampleCountFlags::TYPE_4, vk::SampleCountFlags::TYPE_2]
            .into_iter()
            .find(|s| counts.contains(*s))
            .unwrap_or(vk::SampleCountFlags::TYPE_1)
    }
}

impl DebugType for GfxPhysicalDevice {
    fn debug_type_name() -> &'static str {
        "GfxPhysicalDevice"
    }

    fn vk_handle(&self) -> impl vk::Handle {
        self.vk_handle
    }
}
