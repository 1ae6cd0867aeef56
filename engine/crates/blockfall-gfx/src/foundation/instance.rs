use std::{
    collections::HashSet,
    ffi::{CStr, CString, c_char},
};

use ash::vk;
use itertools::Itertools;

use crate::{
    error::{GfxError, GfxResult},
    foundation::debug_messenger::GfxDebugMsger,
};

pub struct GfxInstance {
    /// 仅仅是函数指针，以及一个裸的 handle
    pub(crate) ash_instance: ash::Instance,
}

// new & init
impl GfxInstance {
    /// 设置所需的 layers 和 extensions，创建 vk instance
    pub fn new(
        vk_entry: &ash::Entry,
        app_name: &str,
        engine_name: &str,
        extra_instance_exts: &[&'static CStr],
    ) -> GfxResult<Self> {
        let app_name = CString::new(app_name).unwrap_or_default();
        let engine_name = CString::new(engine_name).unwrap_or_default();
        let app_info = vk::ApplicationInfo::default()
            .api_version(vk::API_VERSION_1_3) // 版本过低时，有些函数无法正确加载
            .application_name(app_name.as_ref())
            .application_version(vk::make_api_version(0, 1, 0, 0))
            .engine_name(engine_name.as_ref())
            .engine_version(vk::make_api_version(0, 1, 0, 0));

        let enabled_extensions = Self::get_extensions(vk_entry, extra_instance_exts)?;
        log::info!(
            "instance extensions: {}",
            enabled_extensions.iter().map(|ext| format!("\n\t{:?}", unsafe { CStr::from_ptr(*ext) })).join("")
        );

        let enabled_layers = Self::get_layers(vk_entry)?;
        log::info!(
            "instance layers: {}",
            enabled_layers.iter().map(|layer| format!("\n\t{:?}", unsafe { CStr::from_ptr(*layer) })).join("")
        );

        // 为 instance info 添加 debug messenger
        let mut debug_utils_messenger_ci = GfxDebugMsger::debug_utils_messenger_ci();
        let instance_ci = vk::InstanceCreateInfo::default()
            .application_info(&app_info)
            .enabled_extension_names(&enabled_extensions)
            .enabled_layer_names(&enabled_layers)
            .push_next(&mut debug_utils_messenger_ci);

        let ash_instance = unsafe { vk_entry.create_instance(&instance_ci, None)? };
        Ok(Self { ash_instance })
    }

    /// instance 所需的，且受支持的 extension
    fn get_extensions(vk_entry: &ash::Entry, extra_instance_exts: &[&'static CStr]) -> GfxResult<Vec<*const c_char>> {
        let all_ext_props = unsafe { vk_entry.enumerate_instance_extension_properties(None)? };
        let mut enabled_extensions: HashSet<&'static CStr> = HashSet::new();

        for ext in extra_instance_exts.iter().copied().chain(Self::basic_instance_exts()) {
            let supported = all_ext_props
                .iter()
                .any(|supported_ext| supported_ext.extension_name_as_c_str().is_ok_and(|name| name == ext));
            if !supported {
                return Err(GfxError::MissingExtension(ext.to_string_lossy().into_owned()));
            }
            enabled_extensions.insert(ext);
        }

        Ok(enabled_extensions.iter().map(|ext| ext.as_ptr()).collect_vec())
    }

    /// instance 所需的所有 layers
    fn get_layers(vk_entry: &ash::Entry) -> GfxResult<Vec<*const c_char>> {
        let all_layer_props = unsafe { vk_entry.enumerate_instance_layer_properties()? };

        let mut valid_layers = Vec::new();
        for layer in Self::basic_instance_layers() {
            let supported = all_layer_props
                .iter()
                .any(|available| available.layer_name_as_c_str().is_ok_and(|name| name == layer));
            if !supported {
                return Err(GfxError::MissingExtension(layer.to_string_lossy().into_owned()));
            }
            valid_layers.push(layer.as_ptr());
        }

        Ok(valid_layers)
    }

    /// 必须要开启的 instance layers
    fn basic_instance_layers() -> Vec<&'static CStr> {
        // 无需开启 validation layer，使用 vulkan configurator 控制 validation layer 的开启
        Vec::new()
    }

    /// 必须要开启的 instance extensions
    fn basic_instance_exts() -> Vec<&'static CStr> {
        // debug utils 可以单独使用：debug messenger，object debug name，以及 queue/command buffer 上的 label
        vec![vk::EXT_DEBUG_UTILS_NAME]
    }
}

// getters
impl GfxInstance {
    #[inline]
    pub fn ash_instance(&self) -> &ash::Instance {
        &self.ash_instance
    }

    #[inline]
    pub fn vk_instance(&self) -> vk::Instance {
        self.ash_instance.handle()
    }
}

// destroy
impl GfxInstance {
    pub fn destroy(self) {
        log::info!("destroying GfxInstance");
        unsafe {
            self.ash_instance.destroy_instance(None);
        }
    }
}
