//! Vulkan GFX 抽象层
//!
//! 提供对 Vulkan API 的薄封装，包括设备管理、命令缓冲、同步原语、资源、管线以及交换链。
//!
//! 所有 Vulkan 对象都通过显式传入的 [`gfx_context::GfxContext`] 创建和销毁，
//! 不存在全局单例。命令缓冲和队列持有 `Rc<GfxDevice>`，录制命令时无需再传 context。

pub mod basic;
pub mod commands;
pub mod error;
pub mod foundation;
pub mod gfx_context;
pub mod pipelines;
pub mod resources;
pub mod swapchain;
