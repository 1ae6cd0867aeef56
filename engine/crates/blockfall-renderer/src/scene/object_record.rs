use crate::culling::gpu_types::{GpuMeshInfo, GpuObject};

/// 资产容器中的 mesh 序号
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ModelRef(pub u32);

/// 游戏逻辑每帧提供的物体记录
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ObjectRecord {
    pub exists: bool,
    pub visible: bool,
    pub model: ModelRef,
    pub transform: glam::Mat4,
    pub tint: glam::Vec4,
}
impl ObjectRecord {
    pub fn new(model: ModelRef, transform: glam::Mat4, tint: glam::Vec4) -> Self {
        Self {
            exists: true,
            visible: true,
            model,
            transform,
            tint,
        }
    }
}

/// 过滤出需要上传的物体：存在、可见、引用的 mesh 合法
///
/// 超过 `capacity` 的部分被丢弃
pub fn collect_gpu_objects(records: &[ObjectRecord], meshes: &[GpuMeshInfo], capacity: usize) -> Vec<GpuObject> {
    let _span = tracy_client::span!("collect_gpu_objects");

    let mut objects = Vec::with_capacity(records.len().min(capacity));
    let mut dropped_invalid = 0;
    for record in records.iter().filter(|record| record.exists && record.visible) {
        let Some(mesh) = meshes.get(record.model.0 as usize) else {
            dropped_invalid += 1;
            continue;
        };
        if objects.len() == capacity {
            log::warn!("object buffer is full ({} objects), the rest of this frame is dropped", capacity);
            break;
        }
        objects.push(GpuObject {
            model: record.transform,
            tint: record.tint,
            mesh_index: record.model.0,
            material_index: mesh.material_index,
            _padding: [0; 2],
        });
    }
    if dropped_invalid > 0 {
        log::warn!("{} objects reference a mesh that does not exist", dropped_invalid);
    }
    objects
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meshes(count: u32) -> Vec<GpuMeshInfo> {
        (0..count)
            .map(|i| GpuMeshInfo {
                bounding_sphere: glam::Vec4::new(0.0, 0.0, 0.0, 1.0),
                index_count: 36,
                first_index: 36 * i,
                vertex_offset: 0,
                material_index: 10 + i,
            })
            .collect()
    }

    #[test]
    fn filters_absent_invisible_and_invalid_records() {
        let mut records = vec![ObjectRecord::new(ModelRef(0), glam::Mat4::IDENTITY, glam::Vec4::ONE); 5];
        records[1].exists = false;
        records[2].visible = false;
        records[3].model = ModelRef(7);
        records[4].model = ModelRef(1);

        let objects = collect_gpu_objects(&records, &meshes(2), 16);
        assert_eq!(objects.len(), 2);
        assert_eq!(objects[0].material_index, 10);
        assert_eq!((objects[1].mesh_index, objects[1].material_index), (1, 11));
    }

    #[test]
    fn truncates_to_capacity() {
        let records = vec![ObjectRecord::new(ModelRef(0), glam::Mat4::IDENTITY, glam::Vec4::ONE); 8];
        assert_eq!(collect_gpu_objects(&records, &meshes(1), 3).len(), 3);
        assert!(collect_gpu_objects(&records, &meshes(1), 0).is_empty());
    }
}
