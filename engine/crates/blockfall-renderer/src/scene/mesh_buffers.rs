use ash::vk;
use blockfall_gfx::gfx_context::GfxContext;
use blockfall_render_interface::resource_pool::{Buffer, BufferMemory, FramePools, PoolError};
use itertools::Itertools;

use crate::{
    culling::gpu_types::{GpuMaterial, GpuMeshInfo},
    scene::asset_container::AssetContainer,
};

/// 资产容器展开后的静态几何数据，所有 mesh 共用一个顶点 buffer 和一个索引 buffer
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeshData {
    /// 每个顶点 3 个 float，shader 中按 std430 的 float 数组读取
    pub positions: Vec<f32>,
    /// 每个 mesh 内部的局部索引，绘制时加上 `vertex_offset`
    pub indices: Vec<u32>,
    pub mesh_infos: Vec<GpuMeshInfo>,
    /// 每个 mesh 拥有自己的材质，下标与 mesh 相同
    pub materials: Vec<GpuMaterial>,
}
impl MeshData {
    pub fn from_container(container: &AssetContainer) -> Self {
        let mut data = Self::default();
        for (mesh_index, mesh) in container.meshes.iter().enumerate() {
            let vertex_offset = (data.positions.len() / 3) as i32;
            let first_index = data.indices.len() as u32;

            data.positions.extend(mesh.positions.iter().flat_map(|p| p.to_array()));
            data.indices.extend_from_slice(&mesh.indices);
            data.mesh_infos.push(GpuMeshInfo {
                bounding_sphere: mesh.bounding_sphere,
                index_count: mesh.indices.len() as u32,
                first_index,
                vertex_offset,
                material_index: mesh_index as u32,
            });
            data.materials.push(GpuMaterial {
                color: mesh.material.color,
                emissive: mesh.material.emissive,
                metalness: mesh.material.metalness,
                roughness: mesh.material.roughness,
                _padding: [0.0; 2],
            });
        }
        data
    }

    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.positions.len() / 3
    }
}

/// 上传到永久资源池中的静态几何 buffer
pub struct MeshBuffers {
    pub vertices: Buffer<f32>,
    pub indices: Buffer<u32>,
    pub mesh_infos: Buffer<GpuMeshInfo>,
    pub materials: Buffer<GpuMaterial>,

    /// CPU 侧保留一份，用于构建每帧的绘制布局
    mesh_infos_cpu: Vec<GpuMeshInfo>,
}
// new & init
impl MeshBuffers {
    /// 通过 stage buffer 同步上传，只在加载时调用一次
    pub fn upload(
        ctx: &GfxContext,
        pools: &mut FramePools<GfxContext>,
        container: &AssetContainer,
    ) -> Result<Self, PoolError> {
        let _span = tracy_client::span!("MeshBuffers::upload");

        let data = MeshData::from_container(container);
        let storage = vk::BufferUsageFlags::STORAGE_BUFFER | vk::BufferUsageFlags::TRANSFER_DST;
        let permanent = pools.permanent_mut();

        let vertices =
            permanent.acquire_buffer::<f32>(ctx, "mesh-vertices", data.positions.len() as u64, storage, BufferMemory::DeviceLocal)?;
        let indices = permanent.acquire_buffer::<u32>(
            ctx,
            "mesh-indices",
            data.indices.len() as u64,
            storage | vk::BufferUsageFlags::INDEX_BUFFER,
            BufferMemory::DeviceLocal,
        )?;
        let mesh_infos = permanent.acquire_buffer::<GpuMeshInfo>(
            ctx,
            "mesh-infos",
            data.mesh_infos.len() as u64,
            storage,
            BufferMemory::DeviceLocal,
        )?;
        let materials = permanent.acquire_buffer::<GpuMaterial>(
            ctx,
            "mesh-materials",
            data.materials.len() as u64,
            storage,
            BufferMemory::DeviceLocal,
        )?;

        // 空数组不需要上传，buffer 中保留一个元素的占位
        if !data.positions.is_empty() {
            permanent.buffer(vertices)?.transfer_data_sync(ctx, &data.positions)?;
        }
        if !data.indices.is_empty() {
            permanent.buffer(indices)?.transfer_data_sync(ctx, &data.indices)?;
        }
        if !data.mesh_infos.is_empty() {
            permanent.buffer(mesh_infos)?.transfer_data_sync(ctx, &data.mesh_infos)?;
            permanent.buffer(materials)?.transfer_data_sync(ctx, &data.materials)?;
        }

        log::info!(
            "uploaded {} meshes: {} vertices, {} indices",
            data.mesh_infos.len(),
            data.vertex_count(),
            data.indices.len()
        );

        Ok(Self {
            vertices,
            indices,
            mesh_infos,
            materials,
            mesh_infos_cpu: data.mesh_infos,
        })
    }
}
// getters
impl MeshBuffers {
    #[inline]
    pub fn mesh_infos(&self) -> &[GpuMeshInfo] {
        &self.mesh_infos_cpu
    }

    #[inline]
    pub fn mesh_count(&self) -> usize {
        self.mesh_infos_cpu.len()
    }

    pub fn total_index_count(&self) -> u32 {
        self.mesh_infos_cpu.iter().map(|info| info.index_count).sum()
    }

    /// 调试输出用
    pub fn describe(&self) -> String {
        self.mesh_infos_cpu
            .iter()
            .enumerate()
            .map(|(i, info)| format!("#{i}: {} indices @ {}", info.index_count, info.first_index))
            .join(", ")
    }
}
