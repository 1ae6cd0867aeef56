//! Blockfall 帧调度
//!
//! 每帧的流程：
//! 1. [`renderer::Renderer::begin_frame`] 等待 frame slot 空闲，reset 该 slot 的资源池
//! 2. [`renderer::Renderer::render_frame`] 上传每帧数据，按固定顺序注册各阶段 pass，编译并提交渲染图，然后 present
//! 3. [`renderer::Renderer::end_frame`] 推进帧序号
//!
//! 错误按 [`error::FrameError`] 分类：配置错误跳过当前帧，交换链过期在内部恢复，设备错误上抛并终止进程。

pub mod culling;
pub mod error;
pub mod frame_data;
pub mod frame_resources;
pub mod passes;
pub mod pipelines;
pub mod platform;
pub mod present;
pub mod renderer;
pub mod scene;
pub mod visibility_target;
