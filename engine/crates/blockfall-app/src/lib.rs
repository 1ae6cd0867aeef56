//! 进程级的胶水代码
//!
//! 窗口与游戏逻辑由外部实现 [`frame_host::FrameHost`]，
//! [`render_app::RenderApp::run`] 负责初始化环境、创建渲染器并驱动帧循环。

pub mod frame_host;
pub mod frame_loop;
pub mod render_app;
