use bytemuck::{Pod, Zeroable};

use crate::{culling::frustum::Frustum, platform::camera::Camera};

/// 每帧的 uniform 数据，std140 布局
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct PerFrameData {
    pub view: glam::Mat4,
    pub projection: glam::Mat4,
    pub view_projection: glam::Mat4,
    pub inv_view_projection: glam::Mat4,
    /// 归一化后的六个平面：left, right, bottom, top, near, far
    pub frustum_planes: [glam::Vec4; 6],
    /// w 未使用
    pub camera_position: glam::Vec4,

    pub time_s: f32,
    pub delta_time_s: f32,
    /// shader 中只需要低 32 位
    pub frame_id: u32,
    pub object_count: u32,

    pub resolution: glam::Vec2,
    pub _padding: [f32; 2],
}

/// 构建 [`PerFrameData`] 需要的输入
pub struct PerFrameInputs<'a> {
    pub camera: &'a Camera,
    pub resolution: ash::vk::Extent2D,
    pub time_s: f32,
    pub delta_time_s: f32,
    pub frame_id: u64,
    pub object_count: u32,
}

impl PerFrameData {
    pub fn new(inputs: &PerFrameInputs) -> Self {
        let width = inputs.resolution.width.max(1) as f32;
        let height = inputs.resolution.height.max(1) as f32;

        let view = inputs.camera.view_matrix();
        let projection = inputs.camera.projection_matrix(width / height);
        let view_projection = projection * view;
        let frustum = Frustum::from_view_projection(view_projection);

        Self {
            view,
            projection,
            view_projection,
            inv_view_projection: view_projection.inverse(),
            frustum_planes: frustum.planes,
            camera_position: inputs.camera.position.extend(1.0),
            time_s: inputs.time_s,
            delta_time_s: inputs.delta_time_s,
            frame_id: inputs.frame_id as u32,
            object_count: inputs.object_count,
            resolution: glam::vec2(width, height),
            _padding: [0.0; 2],
        }
    }

    #[inline]
    pub fn frustum(&self) -> Frustum {
        Frustum {
            planes: self.frustum_planes,
        }
    }
}
