//! 渲染器与 GPU 之间的边界
//!
//! - [`frame_counter`]：帧序号与 frames in flight 标签
//! - [`render_settings`]：运行时渲染配置以及默认常量
//! - [`resource_pool`]：按名字缓存 GPU 资源的资源池，带作用域、代际句柄以及时域双缓冲
//! - [`gfx_allocator`]：资源池在 Vulkan 上的分配器实现

pub mod frame_counter;
pub mod gfx_allocator;
pub mod render_settings;
pub mod resource_pool;
