//! 与 cull.comp 相同的剔除与压缩逻辑，在 CPU 上用 rayon 并行执行

use std::sync::atomic::{AtomicU32, Ordering};

use rayon::prelude::*;

use crate::culling::{
    draw_layout::DrawLayout,
    frustum::{Frustum, world_bounding_sphere},
    gpu_types::{GpuDrawCommand, GpuMeshInfo, GpuObject},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CpuCullResult {
    /// 剔除之后的间接绘制命令
    pub commands: Vec<GpuDrawCommand>,
    /// 每个 mesh 区域中被写入的部分，按 mesh 顺序拼接；区域内的顺序不确定
    pub compacted: Vec<u32>,
}

/// 物体是否通过可见性测试
#[inline]
pub fn object_visible(object: &GpuObject, meshes: &[GpuMeshInfo], frustum: &Frustum) -> bool {
    let Some(mesh) = meshes.get(object.mesh_index as usize) else {
        return false;
    };
    let (center, radius) = world_bounding_sphere(&object.model, mesh.bounding_sphere);
    frustum.intersects_sphere(center, radius)
}

pub fn cull_objects_cpu(
    objects: &[GpuObject],
    meshes: &[GpuMeshInfo],
    frustum: &Frustum,
    layout: &DrawLayout,
) -> CpuCullResult {
    let _span = tracy_client::span!("cull_objects_cpu");

    let counters: Vec<AtomicU32> = layout.template().iter().map(|cmd| AtomicU32::new(cmd.instance_count)).collect();
    let slots: Vec<AtomicU32> = (0..layout.instance_capacity()).map(|_| AtomicU32::new(u32::MAX)).collect();

    objects.par_iter().enumerate().for_each(|(object_idx, object)| {
        if !object_visible(object, meshes, frustum) {
            return;
        }
        let mesh = object.mesh_index as usize;
        let slot = counters[mesh].fetch_add(1, Ordering::Relaxed);
        let base = layout.template()[mesh].first_instance;
        slots[(base + slot) as usize].store(object_idx as u32, Ordering::Relaxed);
    });

    let commands: Vec<GpuDrawCommand> = layout
        .template()
        .iter()
        .zip(&counters)
        .map(|(cmd, counter)| GpuDrawCommand {
            instance_count: counter.load(Ordering::Relaxed),
            ..*cmd
        })
        .collect();
    let compacted = commands
        .iter()
        .flat_map(|cmd| {
            let begin = cmd.first_instance as usize;
            slots[begin..begin + cmd.instance_count as usize].iter().map(|slot| slot.load(Ordering::Relaxed))
        })
        .collect();

    CpuCullResult { commands, compacted }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::culling::draw_layout::non_empty_draws;

    fn frustum() -> Frustum {
        let view = glam::Mat4::look_at_rh(glam::Vec3::new(0.0, 0.0, 10.0), glam::Vec3::ZERO, glam::Vec3::Y);
        let proj = glam::Mat4::perspective_rh(60_f32.to_radians(), 1.0, 0.1, 100.0);
        Frustum::from_view_projection(proj * view)
    }

    fn meshes() -> Vec<GpuMeshInfo> {
        (0..3)
            .map(|i| GpuMeshInfo {
                bounding_sphere: glam::Vec4::new(0.0, 0.0, 0.0, 0.5),
                index_count: 36,
                first_index: 36 * i,
                vertex_offset: 0,
                material_index: i,
            })
            .collect()
    }

    fn object_at(mesh_index: u32, position: glam::Vec3) -> GpuObject {
        GpuObject {
            model: glam::Mat4::from_translation(position),
            tint: glam::Vec4::ONE,
            mesh_index,
            material_index: mesh_index,
            _padding: [0; 2],
        }
    }

    #[test]
    fn zero_objects_leave_counters_at_zero() {
        let meshes = meshes();
        let layout = DrawLayout::build(&meshes, &[]);
        let result = cull_objects_cpu(&[], &meshes, &frustum(), &layout);
        assert!(result.commands.iter().all(|cmd| cmd.instance_count == 0));
        assert!(result.compacted.is_empty());
        assert_eq!(non_empty_draws(&result.commands), 0);
    }

    #[test]
    fn k_visible_objects_compact_to_k_instances() {
        let meshes = meshes();
        let mut objects = Vec::new();
        let mut expected_visible = Vec::new();
        for i in 0..300_u32 {
            // 偶数在视锥内，奇数在相机背后
            let z = if i % 2 == 0 { -(i as f32 % 40.0) } else { 50.0 };
            let x = (i % 7) as f32 - 3.0;
            objects.push(object_at(i % 3, glam::Vec3::new(x, 0.0, z)));
            if i % 2 == 0 {
                expected_visible.push(i);
            }
        }
        let layout = DrawLayout::build(&meshes, &objects);
        let result = cull_objects_cpu(&objects, &meshes, &frustum(), &layout);

        let total: u32 = result.commands.iter().map(|cmd| cmd.instance_count).sum();
        assert_eq!(total as usize, expected_visible.len());
        assert_eq!(result.compacted.len(), expected_visible.len());
        assert!(layout.validate_counters(&result.commands).is_ok());

        // 压缩顺序不确定，只比较集合
        let mut compacted = result.compacted.clone();
        compacted.sort_unstable();
        assert_eq!(compacted, expected_visible);

        // 每个实例都落在自己 mesh 的区域里
        let mut offset = 0;
        for (mesh, cmd) in result.commands.iter().enumerate() {
            for &object_idx in &result.compacted[offset..offset + cmd.instance_count as usize] {
                assert_eq!(objects[object_idx as usize].mesh_index as usize, mesh);
            }
            offset += cmd.instance_count as usize;
        }
    }

    #[test]
    fn invalid_mesh_reference_is_never_visible() {
        let meshes = meshes();
        assert!(!object_visible(&object_at(9, glam::Vec3::ZERO), &meshes, &frustum()));
    }
}
