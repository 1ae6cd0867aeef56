/// 透视相机
///
/// 由游戏逻辑每帧设置位置与朝向，渲染器只读取矩阵
#[derive(Debug, Clone, Copy)]
pub struct Camera {
    pub position: glam::Vec3,

    pub euler_yaw_deg: f32,
    pub euler_pitch_deg: f32,

    pub fov_deg_vertical: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            position: glam::Vec3::new(0.0, 0.0, 10.0),
            euler_yaw_deg: 0.0,
            euler_pitch_deg: 0.0,
            fov_deg_vertical: 45.0,
            near: 0.1,
            far: 200.0,
        }
    }
}

impl Camera {
    const CAMERA_UP: glam::Vec3 = glam::Vec3::new(0.0, 1.0, 0.0);

    /// YXZ 表示 Y(yaw)-X(Pitch)-Z(Roll) 的旋转顺序
    const CAMERA_EULER: glam::EulerRot = glam::EulerRot::YXZ;

    /// 没有旋转的情况下，相机看向的是 -Z
    const CAMERA_FORWARD: glam::Vec3 = glam::Vec3::new(0.0, 0.0, -1.0);

    pub fn camera_forward(&self) -> glam::Vec3 {
        let transform = glam::Mat4::from_euler(
            Self::CAMERA_EULER,
            self.euler_yaw_deg.to_radians(),
            self.euler_pitch_deg.to_radians(),
            0.0,
        );
        transform.transform_vector3(Self::CAMERA_FORWARD)
    }

    pub fn view_matrix(&self) -> glam::Mat4 {
        glam::Mat4::look_to_rh(self.position, self.camera_forward(), Self::CAMERA_UP)
    }

    /// Vulkan 的裁剪空间：y 向下，深度范围 [0, 1]
    pub fn projection_matrix(&self, aspect: f32) -> glam::Mat4 {
        let mut projection = glam::Mat4::perspective_rh(self.fov_deg_vertical.to_radians(), aspect, self.near, self.far);
        projection.y_axis.y *= -1.0;
        projection
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_camera_looks_down_negative_z() {
        let camera = Camera::default();
        assert!((camera.camera_forward() - glam::Vec3::NEG_Z).length() < 1e-5);

        // 相机正前方的点在裁剪空间中心附近
        let clip = camera.projection_matrix(1.0) * camera.view_matrix() * glam::Vec4::new(0.0, 0.0, 0.0, 1.0);
        let ndc = clip.truncate() / clip.w;
        assert!(ndc.x.abs() < 1e-5 && ndc.y.abs() < 1e-5);
        assert!((0.0..=1.0).contains(&ndc.z));
    }
}
