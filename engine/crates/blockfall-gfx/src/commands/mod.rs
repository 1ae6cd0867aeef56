pub mod barrier;
pub mod command_buffer;
pub mod command_pool;
pub mod command_queue;
pub mod fence;
pub mod semaphore;
pub mod submit_info;

/// debug label 的名称，label 只用于调试工具，名称中的 nul 字节直接丢弃
pub(crate) fn label_cstring(label_name: &str) -> std::ffi::CString {
    std::ffi::CString::new(label_name.replace('\0', "")).unwrap_or_default()
}
