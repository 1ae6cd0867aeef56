use std::ffi::CStr;

use ash::vk;

use crate::error::GfxResult;

/// 将 validation layer 的消息转发到 `log`
pub struct GfxDebugMsger {
    loader: ash::ext::debug_utils::Instance,
    vk_messenger: vk::DebugUtilsMessengerEXT,
}

// new & init
impl GfxDebugMsger {
    pub fn new(vk_entry: &ash::Entry, instance: &ash::Instance) -> GfxResult<Self> {
        let loader = ash::ext::debug_utils::Instance::new(vk_entry, instance);
        let create_info = Self::debug_utils_messenger_ci();
        let vk_messenger = unsafe { loader.create_debug_utils_messenger(&create_info, None)? };

        Ok(Self { loader, vk_messenger })
    }

    /// 用于创建 debug messenger 的结构体，也会被挂到 instance create info 上，以捕获 instance 创建过程的消息
    pub fn debug_utils_messenger_ci() -> vk::DebugUtilsMessengerCreateInfoEXT<'static> {
        vk::DebugUtilsMessengerCreateInfoEXT::default()
            .message_severity(Self::DEBUG_MSG_SEVERITY)
            .message_type(Self::DEBUG_MSG_TYPE)
            .pfn_user_callback(Some(vk_debug_callback))
    }

    const DEBUG_MSG_TYPE: vk::DebugUtilsMessageTypeFlagsEXT = vk::DebugUtilsMessageTypeFlagsEXT::from_raw(
        vk::DebugUtilsMessageTypeFlagsEXT::GENERAL.as_raw()
            | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION.as_raw()
            | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE.as_raw(),
    );

    const DEBUG_MSG_SEVERITY: vk::DebugUtilsMessageSeverityFlagsEXT = vk::DebugUtilsMessageSeverityFlagsEXT::from_raw(
        vk::DebugUtilsMessageSeverityFlagsEXT::WARNING.as_raw() | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR.as_raw(),
    );
}

// destroy
impl GfxDebugMsger {
    pub fn destroy(self) {
        log::info!("destroying GfxDebugMsger");
        unsafe {
            self.loader.destroy_debug_utils_messenger(self.vk_messenger, None);
        }
    }
}

/// debug messenger 的回调函数
///
/// validation layer 的消息是一段 json，其中 MainMessage 字段带有换行符，单独输出
unsafe extern "system" fn vk_debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    p_callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT,
    _user_data: *mut std::os::raw::c_void,
) -> vk::Bool32 {
    if p_callback_data.is_null() {
        return vk::FALSE;
    }
    let callback_data = unsafe { *p_callback_data };
    let msg = if callback_data.p_message.is_null() {
        std::borrow::Cow::from("")
    } else {
        unsafe { CStr::from_ptr(callback_data.p_message).to_string_lossy() }
    };

    let format_msg = format_validation_message(message_type, msg.as_ref());
    match message_severity {
        vk::DebugUtilsMessageSeverityFlagsEXT::ERROR => log::error!("{}", format_msg),
        vk::DebugUtilsMessageSeverityFlagsEXT::WARNING => log::warn!("{}", format_msg),
        vk::DebugUtilsMessageSeverityFlagsEXT::INFO => log::info!("{}", format_msg),
        _ => log::debug!("{}", format_msg),
    };

    // 只有 layer developer 才需要返回 True
    vk::FALSE
}

fn format_validation_message(message_type: vk::DebugUtilsMessageTypeFlagsEXT, msg: &str) -> String {
    let mut json_value = serde_json::from_str::<serde_json::Value>(msg);
    let json_obj = json_value.as_mut().ok().and_then(|v| v.as_object_mut());
    let Some(obj) = json_obj else {
        return format!("[{:?}]\n{}\n", message_type, msg);
    };

    let main_msg = obj.remove("MainMessage");
    let main_msg_str = main_msg.as_ref().and_then(|v| v.as_str()).unwrap_or_default();
    let rest = serde_json::to_string_pretty(&obj).unwrap_or_else(|_| msg.to_string());
    format!("[{:?}]\n{}\n{}\n", message_type, rest, main_msg_str)
}

/// 可以设置 debug name 的 vulkan 对象
pub trait DebugType {
    fn debug_type_name() -> &'static str;
    fn vk_handle(&self) -> impl vk::Handle;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_message_is_split_into_main_message() {
        let msg = r#"{"MainMessage":"line1\nline2","VUID":"VUID-x"}"#;
        let formatted = format_validation_message(vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION, msg);
        assert!(formatted.contains("VUID-x"));
        assert!(formatted.ends_with("line1\nline2\n"));
    }

    #[test]
    fn plain_message_is_kept_verbatim() {
        let formatted = format_validation_message(vk::DebugUtilsMessageTypeFlagsEXT::GENERAL, "not json");
        assert!(formatted.contains("not json"));
    }
}
