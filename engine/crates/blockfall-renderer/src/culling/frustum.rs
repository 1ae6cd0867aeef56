/// 视锥体的 6 个平面，法线指向内侧并已归一化
///
/// 顺序：left, right, bottom, top, near, far
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Frustum {
    pub planes: [glam::Vec4; 6],
}
impl Frustum {
    /// 从 view-projection 矩阵中提取平面（裁剪空间深度范围 [0, 1]）
    pub fn from_view_projection(view_projection: glam::Mat4) -> Self {
        let row = |i: usize| view_projection.row(i);
        let (r0, r1, r2, r3) = (row(0), row(1), row(2), row(3));
        let planes = [r3 + r0, r3 - r0, r3 + r1, r3 - r1, r2, r3 - r2].map(|plane| {
            let len = plane.truncate().length();
            if len > 0.0 { plane / len } else { plane }
        });
        Self { planes }
    }

    /// 球体与视锥相交或在视锥内
    #[inline]
    pub fn intersects_sphere(&self, center: glam::Vec3, radius: f32) -> bool {
        self.planes.iter().all(|plane| plane.truncate().dot(center) + plane.w >= -radius)
    }
}

/// 把模型空间的包围球变换到世界空间，半径按最大的轴缩放
pub fn world_bounding_sphere(model: &glam::Mat4, local_sphere: glam::Vec4) -> (glam::Vec3, f32) {
    let center = model.transform_point3(local_sphere.truncate());
    let max_scale = model.x_axis.truncate().length().max(model.y_axis.truncate().length()).max(model.z_axis.truncate().length());
    (center, local_sphere.w * max_scale)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_frustum() -> Frustum {
        let view = glam::Mat4::look_at_rh(glam::Vec3::new(0.0, 0.0, 10.0), glam::Vec3::ZERO, glam::Vec3::Y);
        let proj = glam::Mat4::perspective_rh(60_f32.to_radians(), 1.0, 0.1, 100.0);
        Frustum::from_view_projection(proj * view)
    }

    #[test]
    fn sphere_in_front_is_visible() {
        assert!(test_frustum().intersects_sphere(glam::Vec3::ZERO, 1.0));
    }

    #[test]
    fn sphere_behind_camera_is_culled() {
        assert!(!test_frustum().intersects_sphere(glam::Vec3::new(0.0, 0.0, 20.0), 1.0));
    }

    #[test]
    fn sphere_beyond_far_plane_is_culled() {
        assert!(!test_frustum().intersects_sphere(glam::Vec3::new(0.0, 0.0, -200.0), 1.0));
    }

    #[test]
    fn sphere_straddling_side_plane_is_kept() {
        // 视野半角 30°，距离 10 处边界约在 x = 5.77
        let frustum = test_frustum();
        assert!(!frustum.intersects_sphere(glam::Vec3::new(8.0, 0.0, 0.0), 1.0));
        assert!(frustum.intersects_sphere(glam::Vec3::new(8.0, 0.0, 0.0), 3.0));
    }

    #[test]
    fn world_sphere_uses_largest_scale() {
        let model = glam::Mat4::from_scale_rotation_translation(
            glam::Vec3::new(1.0, 3.0, 2.0),
            glam::Quat::IDENTITY,
            glam::Vec3::new(1.0, 0.0, 0.0),
        );
        let (center, radius) = world_bounding_sphere(&model, glam::Vec4::new(0.0, 0.0, 0.0, 2.0));
        assert_eq!(center, glam::Vec3::new(1.0, 0.0, 0.0));
        assert!((radius - 6.0).abs() < 1e-5);
    }
}
