use crate::culling::gpu_types::{GpuDrawCommand, GpuMeshInfo, GpuObject};

/// 当前帧的间接绘制布局
///
/// 每个 mesh 一条绘制命令，并在压缩后的实例 buffer 中占据一段连续区域，
/// 区域起点是 `first_instance`，长度是当前帧引用该 mesh 的物体数量（剔除前）。
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DrawLayout {
    /// instance_count 全部为 0 的命令模板，每帧剔除前拷贝到命令 buffer
    template: Vec<GpuDrawCommand>,
    segment_sizes: Vec<u32>,
    object_count: u32,
}
// new & init
impl DrawLayout {
    pub fn build(meshes: &[GpuMeshInfo], objects: &[GpuObject]) -> Self {
        let mut segment_sizes = vec![0_u32; meshes.len()];
        for object in objects {
            if let Some(size) = segment_sizes.get_mut(object.mesh_index as usize) {
                *size += 1;
            }
        }

        let mut first_instance = 0;
        let template = meshes
            .iter()
            .zip(&segment_sizes)
            .map(|(mesh, &size)| {
                let cmd = GpuDrawCommand {
                    index_count: mesh.index_count,
                    instance_count: 0,
                    first_index: mesh.first_index,
                    vertex_offset: mesh.vertex_offset,
                    first_instance,
                };
                first_instance += size;
                cmd
            })
            .collect();

        Self {
            template,
            segment_sizes,
            object_count: objects.len() as u32,
        }
    }
}
// getters
impl DrawLayout {
    #[inline]
    pub fn template(&self) -> &[GpuDrawCommand] {
        &self.template
    }

    #[inline]
    pub fn mesh_count(&self) -> usize {
        self.template.len()
    }

    #[inline]
    pub fn object_count(&self) -> u32 {
        self.object_count
    }

    #[inline]
    pub fn segment_size(&self, mesh: usize) -> u32 {
        self.segment_sizes[mesh]
    }

    /// 压缩实例 buffer 需要的长度
    #[inline]
    pub fn instance_capacity(&self) -> u32 {
        self.segment_sizes.iter().sum()
    }

    /// compute shader 的 work group 数量，没有物体时仍然派发一组
    #[inline]
    pub fn dispatch_groups(&self, group_size: u32) -> u32 {
        self.object_count.div_ceil(group_size).max(1)
    }
}
// tools
impl DrawLayout {
    /// 检查剔除之后读回的命令 buffer
    ///
    /// 计数器没有在剔除前清零时，实例数会超过物体总数或某个 mesh 的区域大小
    pub fn validate_counters(&self, commands: &[GpuDrawCommand]) -> Result<(), String> {
        if commands.len() != self.template.len() {
            return Err(format!("expected {} draw commands, got {}", self.template.len(), commands.len()));
        }
        let mut total: u64 = 0;
        for (mesh, (cmd, &segment)) in commands.iter().zip(&self.segment_sizes).enumerate() {
            if cmd.instance_count > segment {
                return Err(format!("mesh {} has {} instances but only {} objects", mesh, cmd.instance_count, segment));
            }
            total += cmd.instance_count as u64;
        }
        if total > self.object_count as u64 {
            return Err(format!("{} instances survived culling out of {} objects", total, self.object_count));
        }
        Ok(())
    }
}

/// 实际会产生绘制的命令数量
pub fn non_empty_draws(commands: &[GpuDrawCommand]) -> usize {
    commands.iter().filter(|cmd| cmd.instance_count > 0 && cmd.index_count > 0).count()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mesh(index_count: u32, first_index: u32) -> GpuMeshInfo {
        GpuMeshInfo {
            bounding_sphere: glam::Vec4::new(0.0, 0.0, 0.0, 1.0),
            index_count,
            first_index,
            vertex_offset: 0,
            material_index: 0,
        }
    }

    fn object(mesh_index: u32) -> GpuObject {
        GpuObject {
            model: glam::Mat4::IDENTITY,
            tint: glam::Vec4::ONE,
            mesh_index,
            material_index: 0,
            _padding: [0; 2],
        }
    }

    #[test]
    fn segments_are_prefix_sums_of_mesh_usage() {
        let meshes = [mesh(36, 0), mesh(6, 36), mesh(12, 42)];
        let objects = [object(2), object(0), object(2), object(2)];
        let layout = DrawLayout::build(&meshes, &objects);

        let firsts: Vec<u32> = layout.template().iter().map(|c| c.first_instance).collect();
        assert_eq!(firsts, vec![0, 1, 1]);
        assert_eq!((layout.segment_size(0), layout.segment_size(1), layout.segment_size(2)), (1, 0, 3));
        assert!(layout.template().iter().all(|c| c.instance_count == 0));
        assert_eq!(layout.instance_capacity(), 4);
    }

    #[test]
    fn empty_frame_still_dispatches_once() {
        let layout = DrawLayout::build(&[mesh(36, 0)], &[]);
        assert_eq!(layout.dispatch_groups(64), 1);
        assert_eq!(non_empty_draws(layout.template()), 0);

        let layout = DrawLayout::build(&[mesh(36, 0)], &vec![object(0); 65]);
        assert_eq!(layout.dispatch_groups(64), 2);
    }

    #[test]
    fn runaway_counters_are_detected() {
        let layout = DrawLayout::build(&[mesh(36, 0), mesh(6, 36)], &[object(0), object(1)]);
        let mut commands = layout.template().to_vec();
        commands[0].instance_count = 1;
        assert!(layout.validate_counters(&commands).is_ok());

        // 上一帧的计数没有清零
        commands[0].instance_count = 2;
        assert!(layout.validate_counters(&commands).is_err());
    }
}
