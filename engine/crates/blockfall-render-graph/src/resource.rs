//! attach 到渲染图上的物理资源

use ash::vk;
use indexmap::IndexMap;

use crate::{
    access::{RgAccess, RgResourceType},
    error::RgError,
};

/// 一张图像在渲染图中的物理绑定
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RgImageBinding {
    pub image: vk::Image,
    /// 采样以及 attachment 使用的 view
    pub view: vk::ImageView,
    /// storage image 写入使用的 view，cube 的 6 个面按 2D array 访问
    pub storage_view: vk::ImageView,
    pub format: vk::Format,
    pub extent: vk::Extent2D,
    pub aspect: vk::ImageAspectFlags,
}
impl RgImageBinding {
    pub const NULL: Self = Self {
        image: vk::Image::null(),
        view: vk::ImageView::null(),
        storage_view: vk::ImageView::null(),
        format: vk::Format::UNDEFINED,
        extent: vk::Extent2D { width: 0, height: 0 },
        aspect: vk::ImageAspectFlags::COLOR,
    };

    /// 只有一个 view 的普通 2D 图像
    pub fn new(
        image: vk::Image,
        view: vk::ImageView,
        format: vk::Format,
        extent: vk::Extent2D,
        aspect: vk::ImageAspectFlags,
    ) -> Self {
        Self {
            image,
            view,
            storage_view: view,
            format,
            extent,
            aspect,
        }
    }

    #[inline]
    pub fn with_storage_view(mut self, storage_view: vk::ImageView) -> Self {
        self.storage_view = storage_view;
        self
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RgBufferBinding {
    pub buffer: vk::Buffer,
    pub size: vk::DeviceSize,
}
impl RgBufferBinding {
    pub const NULL: Self = Self {
        buffer: vk::Buffer::null(),
        size: 0,
    };

    #[inline]
    pub fn new(buffer: vk::Buffer, size: vk::DeviceSize) -> Self {
        Self { buffer, size }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RgPhysical {
    Image(RgImageBinding),
    Buffer(RgBufferBinding),
}
impl RgPhysical {
    #[inline]
    pub fn resource_type(&self) -> RgResourceType {
        match self {
            Self::Image(image) => RgResourceType::Image { aspect: image.aspect },
            Self::Buffer(_) => RgResourceType::Buffer,
        }
    }
}

/// 一条 attach 记录：物理资源以及它在本帧开始与结束时的状态
#[derive(Clone, Debug)]
pub struct RgResource {
    pub name: String,
    pub physical: RgPhysical,
    pub initial: RgAccess,
    pub final_access: RgAccess,
}

/// 按 attach 顺序保存的资源表，资源的索引即 attach 顺序
#[derive(Default)]
pub struct RgResourceRegistry {
    resources: IndexMap<String, RgResource>,
}
impl RgResourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attach(
        &mut self,
        name: &str,
        physical: RgPhysical,
        initial: RgAccess,
        final_access: RgAccess,
    ) -> Result<usize, RgError> {
        if self.resources.contains_key(name) {
            return Err(RgError::DuplicateAttachment {
                resource: name.to_string(),
            });
        }
        if initial == RgAccess::Present {
            return Err(RgError::InvalidAccess {
                context: "initial state".to_string(),
                resource: name.to_string(),
                access: initial,
            });
        }
        if final_access == RgAccess::Undefined {
            return Err(RgError::InvalidAccess {
                context: "final state".to_string(),
                resource: name.to_string(),
                access: final_access,
            });
        }
        let (index, _) = self.resources.insert_full(
            name.to_string(),
            RgResource {
                name: name.to_string(),
                physical,
                initial,
                final_access,
            },
        );
        Ok(index)
    }

    #[inline]
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.resources.get_index_of(name)
    }

    #[inline]
    pub fn get(&self, index: usize) -> Option<&RgResource> {
        self.resources.get_index(index).map(|(_, res)| res)
    }

    #[inline]
    pub fn get_by_name(&self, name: &str) -> Option<&RgResource> {
        self.resources.get(name)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.resources.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &RgResource> {
        self.resources.values()
    }
}
