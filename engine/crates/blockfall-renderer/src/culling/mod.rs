//! GPU 驱动的间接剔除
//!
//! 每帧把物体列表上传到 GPU，compute shader 对每个物体做视锥测试，
//! 通过的物体用原子计数追加到所属 mesh 的实例段中，计数即为间接绘制的 instance count。

pub mod counter_guard;
pub mod cpu_mirror;
pub mod draw_layout;
pub mod frustum;
pub mod gpu_types;
pub mod indirect_culling;
