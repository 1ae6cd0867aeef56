//! 各阶段共用的管线工具
//!
//! 所有 pass 都使用 push descriptor：录制时直接把本 pass 声明过的资源写进 set 0，
//! 不需要 descriptor pool，也不需要跨帧维护 descriptor set。

pub mod compute_pass;
pub mod descriptors;
