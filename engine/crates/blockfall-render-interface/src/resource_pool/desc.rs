use std::fmt::Display;

use ash::vk;

/// 图像资源的种类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageKind {
    Image2D,
    /// 6 个 layer
    ImageCube,
    ImageMultisample { samples: vk::SampleCountFlags },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ImageDesc {
    pub kind: ImageKind,
    pub format: vk::Format,
    pub extent: vk::Extent2D,
    pub usage: vk::ImageUsageFlags,
    pub mip_levels: u32,
}
// new & init
impl ImageDesc {
    #[inline]
    pub fn texture_2d(format: vk::Format, extent: vk::Extent2D, usage: vk::ImageUsageFlags) -> Self {
        Self {
            kind: ImageKind::Image2D,
            format,
            extent,
            usage,
            mip_levels: 1,
        }
    }

    #[inline]
    pub fn cube(format: vk::Format, size: u32, usage: vk::ImageUsageFlags) -> Self {
        Self {
            kind: ImageKind::ImageCube,
            format,
            extent: vk::Extent2D {
                width: size,
                height: size,
            },
            usage,
            mip_levels: 1,
        }
    }

    #[inline]
    pub fn multisample(
        format: vk::Format,
        extent: vk::Extent2D,
        usage: vk::ImageUsageFlags,
        samples: vk::SampleCountFlags,
    ) -> Self {
        Self {
            kind: ImageKind::ImageMultisample { samples },
            format,
            extent,
            usage,
            mip_levels: 1,
        }
    }

    #[inline]
    pub fn with_mip_levels(mut self, mip_levels: u32) -> Self {
        self.mip_levels = mip_levels.max(1);
        self
    }
}
// getters
impl ImageDesc {
    #[inline]
    pub fn array_layers(&self) -> u32 {
        match self.kind {
            ImageKind::ImageCube => 6,
            _ => 1,
        }
    }

    #[inline]
    pub fn samples(&self) -> vk::SampleCountFlags {
        match self.kind {
            ImageKind::ImageMultisample { samples } => samples,
            _ => vk::SampleCountFlags::TYPE_1,
        }
    }

    #[inline]
    pub fn aspect(&self) -> vk::ImageAspectFlags {
        format_aspect(self.format)
    }
}

/// 根据 format 推断 image 的 aspect
pub fn format_aspect(format: vk::Format) -> vk::ImageAspectFlags {
    match format {
        vk::Format::D16_UNORM | vk::Format::D32_SFLOAT | vk::Format::X8_D24_UNORM_PACK32 => {
            vk::ImageAspectFlags::DEPTH
        }
        vk::Format::S8_UINT => vk::ImageAspectFlags::STENCIL,
        vk::Format::D16_UNORM_S8_UINT | vk::Format::D24_UNORM_S8_UINT | vk::Format::D32_SFLOAT_S8_UINT => {
            vk::ImageAspectFlags::DEPTH | vk::ImageAspectFlags::STENCIL
        }
        _ => vk::ImageAspectFlags::COLOR,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferMemory {
    DeviceLocal,
    /// 持久映射，CPU 可以直接写入
    HostVisible,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferDesc {
    pub size: vk::DeviceSize,
    pub usage: vk::BufferUsageFlags,
    pub memory: BufferMemory,
}
impl BufferDesc {
    #[inline]
    pub fn device_local(size: vk::DeviceSize, usage: vk::BufferUsageFlags) -> Self {
        Self {
            size,
            usage,
            memory: BufferMemory::DeviceLocal,
        }
    }

    #[inline]
    pub fn host_visible(size: vk::DeviceSize, usage: vk::BufferUsageFlags) -> Self {
        Self {
            size,
            usage,
            memory: BufferMemory::HostVisible,
        }
    }
}

/// 资源池中一条资源的完整描述，也是 free list 的 key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceDesc {
    Image(ImageDesc),
    Buffer(BufferDesc),
}
impl From<ImageDesc> for ResourceDesc {
    #[inline]
    fn from(desc: ImageDesc) -> Self {
        Self::Image(desc)
    }
}
impl From<BufferDesc> for ResourceDesc {
    #[inline]
    fn from(desc: BufferDesc) -> Self {
        Self::Buffer(desc)
    }
}
impl Display for ResourceDesc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Image(desc) => {
                let kind = match desc.kind {
                    ImageKind::Image2D => "image2d".to_string(),
                    ImageKind::ImageCube => "cube".to_string(),
                    ImageKind::ImageMultisample { samples } => format!("image2d-ms{}", samples.as_raw()),
                };
                write!(
                    f,
                    "{kind} {}x{} {:?} mips={} usage={:?}",
                    desc.extent.width, desc.extent.height, desc.format, desc.mip_levels, desc.usage
                )
            }
            Self::Buffer(desc) => {
                write!(f, "buffer {}B {:?} usage={:?}", desc.size, desc.memory, desc.usage)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cube_has_six_layers() {
        let desc = ImageDesc::cube(vk::Format::R16G16B16A16_SFLOAT, 64, vk::ImageUsageFlags::SAMPLED);
        assert_eq!(desc.array_layers(), 6);
        assert_eq!(desc.extent.width, desc.extent.height);
        assert_eq!(desc.samples(), vk::SampleCountFlags::TYPE_1);
    }

    #[test]
    fn depth_formats_use_depth_aspect() {
        assert_eq!(format_aspect(vk::Format::D32_SFLOAT), vk::ImageAspectFlags::DEPTH);
        assert!(format_aspect(vk::Format::D24_UNORM_S8_UINT).contains(vk::ImageAspectFlags::STENCIL));
        assert_eq!(format_aspect(vk::Format::R8G8B8A8_UNORM), vk::ImageAspectFlags::COLOR);
    }

    #[test]
    fn descriptors_differ_by_extent() {
        let usage = vk::ImageUsageFlags::SAMPLED;
        let a = ImageDesc::texture_2d(vk::Format::D32_SFLOAT, vk::Extent2D { width: 512, height: 512 }, usage);
        let b = ImageDesc::texture_2d(vk::Format::D32_SFLOAT, vk::Extent2D { width: 256, height: 256 }, usage);
        assert_ne!(ResourceDesc::from(a), ResourceDesc::from(b));
        assert!(ResourceDesc::from(a).to_string().contains("512x512"));
    }
}
