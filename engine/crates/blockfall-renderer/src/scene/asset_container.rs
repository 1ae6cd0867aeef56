//! 资产容器的二进制格式（小端）
//!
//! ```text
//! header: magic u32 = 0x4B43_4C42 ("BLCK"), version u32 = 1, mesh_count u32
//! mesh:   material { color [f32;4], emissive [f32;4], metalness f32, roughness f32 }
//!         index_count u32, vertex_count u32
//!         indices  u32 * index_count
//!         vertices [f32;3] * vertex_count
//! ```

use crate::error::AssetError;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AssetMaterial {
    pub color: glam::Vec4,
    pub emissive: glam::Vec4,
    pub metalness: f32,
    pub roughness: f32,
}
impl Default for AssetMaterial {
    fn default() -> Self {
        Self {
            color: glam::Vec4::ONE,
            emissive: glam::Vec4::ZERO,
            metalness: 0.0,
            roughness: 0.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AssetMesh {
    pub material: AssetMaterial,
    pub indices: Vec<u32>,
    pub positions: Vec<glam::Vec3>,
    /// xyz: 球心，w: 半径；加载时根据顶点计算
    pub bounding_sphere: glam::Vec4,
}
impl AssetMesh {
    pub fn new(material: AssetMaterial, indices: Vec<u32>, positions: Vec<glam::Vec3>) -> Self {
        let bounding_sphere = bounding_sphere(&positions);
        Self {
            material,
            indices,
            positions,
            bounding_sphere,
        }
    }
}

/// 包围盒中心为球心，最远顶点的距离为半径
pub fn bounding_sphere(positions: &[glam::Vec3]) -> glam::Vec4 {
    if positions.is_empty() {
        return glam::Vec4::ZERO;
    }
    let (min, max) = positions
        .iter()
        .fold((glam::Vec3::splat(f32::MAX), glam::Vec3::splat(f32::MIN)), |(min, max), p| (min.min(*p), max.max(*p)));
    let center = (min + max) * 0.5;
    let radius = positions.iter().map(|p| p.distance(center)).fold(0.0_f32, f32::max);
    center.extend(radius)
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct AssetContainer {
    pub meshes: Vec<AssetMesh>,
}
// parse
impl AssetContainer {
    pub const MAGIC: u32 = 0x4B43_4C42;
    pub const VERSION: u32 = 1;

    pub fn parse(bytes: &[u8]) -> Result<Self, AssetError> {
        let _span = tracy_client::span!("AssetContainer::parse");
        let mut reader = ByteReader { bytes, offset: 0 };

        let magic = reader.u32("magic")?;
        if magic != Self::MAGIC {
            return Err(AssetError::BadMagic { found: magic });
        }
        let version = reader.u32("version")?;
        if version != Self::VERSION {
            return Err(AssetError::UnsupportedVersion(version));
        }
        let mesh_count = reader.u32("mesh count")? as usize;

        let mut meshes = Vec::with_capacity(mesh_count.min(1024));
        for mesh_idx in 0..mesh_count {
            let material = AssetMaterial {
                color: glam::Vec4::from_array(reader.f32_array("material color")?),
                emissive: glam::Vec4::from_array(reader.f32_array("material emissive")?),
                metalness: reader.f32("material metalness")?,
                roughness: reader.f32("material roughness")?,
            };
            let index_count = reader.u32("index count")?;
            let vertex_count = reader.u32("vertex count")?;
            if index_count % 3 != 0 {
                return Err(AssetError::IncompleteTriangle {
                    mesh: mesh_idx,
                    index_count,
                });
            }

            let indices = reader.u32_blob("index blob", index_count as usize)?;
            if let Some(&index) = indices.iter().find(|&&index| index >= vertex_count) {
                return Err(AssetError::IndexOutOfRange {
                    mesh: mesh_idx,
                    index,
                    vertex_count,
                });
            }
            let positions = reader
                .f32_blob("vertex blob", vertex_count as usize * 3)?
                .chunks_exact(3)
                .map(|p| glam::Vec3::new(p[0], p[1], p[2]))
                .collect();

            meshes.push(AssetMesh::new(material, indices, positions));
        }

        let trailing = bytes.len() - reader.offset;
        if trailing != 0 {
            return Err(AssetError::TrailingBytes { trailing });
        }

        log::info!("asset container loaded: {} meshes", meshes.len());
        Ok(Self { meshes })
    }

    /// 写出同样格式的字节流，供工具与测试使用
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        let put_u32 = |out: &mut Vec<u8>, v: u32| out.extend_from_slice(&v.to_le_bytes());
        put_u32(&mut out, Self::MAGIC);
        put_u32(&mut out, Self::VERSION);
        put_u32(&mut out, self.meshes.len() as u32);
        for mesh in &self.meshes {
            let material = &mesh.material;
            let floats = material
                .color
                .to_array()
                .into_iter()
                .chain(material.emissive.to_array())
                .chain([material.metalness, material.roughness]);
            for f in floats {
                out.extend_from_slice(&f.to_le_bytes());
            }
            put_u32(&mut out, mesh.indices.len() as u32);
            put_u32(&mut out, mesh.positions.len() as u32);
            for index in &mesh.indices {
                put_u32(&mut out, *index);
            }
            for p in mesh.positions.iter().flat_map(|p| p.to_array()) {
                out.extend_from_slice(&p.to_le_bytes());
            }
        }
        out
    }
}
// getters
impl AssetContainer {
    #[inline]
    pub fn mesh_count(&self) -> usize {
        self.meshes.len()
    }

    pub fn total_index_count(&self) -> usize {
        self.meshes.iter().map(|m| m.indices.len()).sum()
    }

    pub fn total_vertex_count(&self) -> usize {
        self.meshes.iter().map(|m| m.positions.len()).sum()
    }
}

struct ByteReader<'a> {
    bytes: &'a [u8],
    offset: usize,
}
impl<'a> ByteReader<'a> {
    fn take(&mut self, what: &'static str, need: usize) -> Result<&'a [u8], AssetError> {
        let end = self.offset.checked_add(need).filter(|&end| end <= self.bytes.len()).ok_or(AssetError::Truncated {
            what,
            offset: self.offset,
            need,
        })?;
        let slice = &self.bytes[self.offset..end];
        self.offset = end;
        Ok(slice)
    }

    fn u32(&mut self, what: &'static str) -> Result<u32, AssetError> {
        let bytes = self.take(what, 4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    fn f32(&mut self, what: &'static str) -> Result<f32, AssetError> {
        self.u32(what).map(f32::from_bits)
    }

    fn f32_array<const N: usize>(&mut self, what: &'static str) -> Result<[f32; N], AssetError> {
        let mut out = [0.0; N];
        for v in &mut out {
            *v = self.f32(what)?;
        }
        Ok(out)
    }

    fn u32_blob(&mut self, what: &'static str, count: usize) -> Result<Vec<u32>, AssetError> {
        let need = count.checked_mul(4).ok_or(AssetError::Truncated {
            what,
            offset: self.offset,
            need: usize::MAX,
        })?;
        Ok(self
            .take(what, need)?
            .chunks_exact(4)
            .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect())
    }

    fn f32_blob(&mut self, what: &'static str, count: usize) -> Result<Vec<f32>, AssetError> {
        Ok(self.u32_blob(what, count)?.into_iter().map(f32::from_bits).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cube_mesh() -> AssetMesh {
        let positions = (0..8)
            .map(|i| glam::Vec3::new((i & 1) as f32, ((i >> 1) & 1) as f32, ((i >> 2) & 1) as f32) * 2.0 - 1.0)
            .collect();
        AssetMesh::new(AssetMaterial::default(), vec![0, 1, 2, 2, 1, 3], positions)
    }

    #[test]
    fn parses_written_container() {
        let container = AssetContainer {
            meshes: vec![cube_mesh(), AssetMesh::new(AssetMaterial::default(), vec![], vec![])],
        };
        let parsed = AssetContainer::parse(&container.to_bytes()).unwrap();
        assert_eq!(parsed, container);
        assert_eq!(parsed.total_index_count(), 6);
        assert_eq!(parsed.total_vertex_count(), 8);
    }

    #[test]
    fn bounding_sphere_encloses_all_vertices() {
        let mesh = cube_mesh();
        assert_eq!(mesh.bounding_sphere.truncate(), glam::Vec3::ZERO);
        assert!((mesh.bounding_sphere.w - 3.0_f32.sqrt()).abs() < 1e-5);
        assert_eq!(bounding_sphere(&[]), glam::Vec4::ZERO);
    }

    #[test]
    fn rejects_bad_magic_and_version() {
        let mut bytes = AssetContainer::default().to_bytes();
        bytes[0] ^= 0xff;
        assert!(matches!(AssetContainer::parse(&bytes), Err(AssetError::BadMagic { .. })));

        let mut bytes = AssetContainer::default().to_bytes();
        bytes[4] = 2;
        assert_eq!(AssetContainer::parse(&bytes), Err(AssetError::UnsupportedVersion(2)));
    }

    #[test]
    fn rejects_truncated_and_trailing_data() {
        let bytes = AssetContainer { meshes: vec![cube_mesh()] }.to_bytes();
        assert!(matches!(AssetContainer::parse(&bytes[..bytes.len() - 1]), Err(AssetError::Truncated { .. })));

        let mut padded = bytes.clone();
        padded.push(0);
        assert_eq!(AssetContainer::parse(&padded), Err(AssetError::TrailingBytes { trailing: 1 }));
    }

    #[test]
    fn rejects_out_of_range_index() {
        let mut mesh = cube_mesh();
        mesh.indices[4] = 8;
        let bytes = AssetContainer { meshes: vec![mesh] }.to_bytes();
        assert_eq!(
            AssetContainer::parse(&bytes),
            Err(AssetError::IndexOutOfRange {
                mesh: 0,
                index: 8,
                vertex_count: 8
            })
        );
    }
}
