//! 与 shader 共享的数据布局（std430）

use bytemuck::{Pod, Zeroable};

/// 每帧上传的物体
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct GpuObject {
    pub model: glam::Mat4,
    pub tint: glam::Vec4,
    pub mesh_index: u32,
    pub material_index: u32,
    pub _padding: [u32; 2],
}

/// 静态的 mesh 信息，加载时上传一次
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct GpuMeshInfo {
    /// xyz: 模型空间球心，w: 半径
    pub bounding_sphere: glam::Vec4,
    pub index_count: u32,
    pub first_index: u32,
    pub vertex_offset: i32,
    pub material_index: u32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct GpuMaterial {
    pub color: glam::Vec4,
    pub emissive: glam::Vec4,
    pub metalness: f32,
    pub roughness: f32,
    pub _padding: [f32; 2],
}

/// 与 `VkDrawIndexedIndirectCommand` 布局一致
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Pod, Zeroable)]
pub struct GpuDrawCommand {
    pub index_count: u32,
    pub instance_count: u32,
    pub first_index: u32,
    pub vertex_offset: i32,
    pub first_instance: u32,
}
impl GpuDrawCommand {
    pub const STRIDE: u32 = std::mem::size_of::<Self>() as u32;
}

/// cull shader 的 push constant
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct CullPushConstants {
    pub object_count: u32,
    pub mesh_count: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layouts_match_shader_declarations() {
        assert_eq!(std::mem::size_of::<GpuObject>(), 96);
        assert_eq!(std::mem::size_of::<GpuMeshInfo>(), 32);
        assert_eq!(std::mem::size_of::<GpuMaterial>(), 48);
        assert_eq!(GpuDrawCommand::STRIDE, 20);
    }
}
