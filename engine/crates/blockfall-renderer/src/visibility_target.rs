use ash::vk;
use blockfall_gfx::gfx_context::GfxContext;
use blockfall_render_graph::RgImageBinding;
use blockfall_render_interface::{
    render_settings::DefaultRendererSettings,
    resource_pool::{ImageDesc, PoolAllocator, PoolError, ResourcePool, Texture2D, Texture2DMS},
};

use crate::{frame_resources::image_binding, passes::names};

/// 可见性缓冲的两种形态，每帧开始时根据抗锯齿设置选择一次
pub enum VisibilityTarget {
    SingleSampled {
        visibility: Texture2D,
        depth: Texture2D,
    },
    /// 多重采样渲染之后 resolve（取第 0 个样本）到单采样的 `resolved`
    MultiSampled {
        visibility_ms: Texture2DMS,
        depth_ms: Texture2DMS,
        resolved: Texture2D,
    },
}
// new & init
impl VisibilityTarget {
    /// 在交换链池中申请
    ///
    /// * samples - `None` 或 `TYPE_1` 表示不使用多重采样
    pub fn acquire<A: PoolAllocator>(
        pool: &mut ResourcePool<A>,
        allocator: &A,
        extent: vk::Extent2D,
        depth_format: vk::Format,
        samples: Option<vk::SampleCountFlags>,
    ) -> Result<Self, PoolError> {
        let format = DefaultRendererSettings::VISIBILITY_FORMAT;
        let resolved_desc = ImageDesc::texture_2d(
            format,
            extent,
            vk::ImageUsageFlags::COLOR_ATTACHMENT | vk::ImageUsageFlags::STORAGE,
        );

        match samples.filter(|s| *s != vk::SampleCountFlags::TYPE_1) {
            None => Ok(Self::SingleSampled {
                visibility: pool.acquire_texture_2d(allocator, names::VISIBILITY, resolved_desc)?,
                depth: pool.acquire_texture_2d(
                    allocator,
                    names::DEPTH,
                    ImageDesc::texture_2d(depth_format, extent, vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT),
                )?,
            }),
            Some(samples) => Ok(Self::MultiSampled {
                visibility_ms: pool.acquire_texture_2d_ms(
                    allocator,
                    names::VISIBILITY_MS,
                    ImageDesc::multisample(format, extent, vk::ImageUsageFlags::COLOR_ATTACHMENT, samples),
                )?,
                depth_ms: pool.acquire_texture_2d_ms(
                    allocator,
                    "depth_ms",
                    ImageDesc::multisample(depth_format, extent, vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT, samples),
                )?,
                resolved: pool.acquire_texture_2d(allocator, names::VISIBILITY, resolved_desc)?,
            }),
        }
    }
}
// getters
impl VisibilityTarget {
    #[inline]
    pub fn is_multisampled(&self) -> bool {
        matches!(self, Self::MultiSampled { .. })
    }

    /// 之后的 pass 读取的单采样图像
    #[inline]
    pub fn resolved(&self) -> Texture2D {
        match self {
            Self::SingleSampled { visibility, .. } => *visibility,
            Self::MultiSampled { resolved, .. } => *resolved,
        }
    }
}
// tools
impl VisibilityTarget {
    /// 渲染图中的名字以及对应的图像
    ///
    /// 深度在两种形态下都以 `depth` 出现在图中
    pub fn bindings(&self, pool: &ResourcePool<GfxContext>) -> Result<Vec<(&'static str, RgImageBinding)>, PoolError> {
        Ok(match self {
            Self::SingleSampled { visibility, depth } => vec![
                (names::VISIBILITY, image_binding(pool.image(*visibility)?)),
                (names::DEPTH, image_binding(pool.image(*depth)?)),
            ],
            Self::MultiSampled {
                visibility_ms,
                depth_ms,
                resolved,
            } => vec![
                (names::VISIBILITY, image_binding(pool.image(*resolved)?)),
                (names::VISIBILITY_MS, image_binding(pool.image(*visibility_ms)?)),
                (names::DEPTH, image_binding(pool.image(*depth_ms)?)),
            ],
        })
    }
}

#[cfg(test)]
mod tests {
    use blockfall_render_interface::resource_pool::{PoolScope, mock::MockAllocator};

    use super::*;

    const EXTENT: vk::Extent2D = vk::Extent2D {
        width: 320,
        height: 200,
    };

    #[test]
    fn single_sample_when_multisampling_is_off() {
        let allocator = MockAllocator::default();
        let mut pool = ResourcePool::new(PoolScope::Swapchain);

        let target =
            VisibilityTarget::acquire(&mut pool, &allocator, EXTENT, vk::Format::D32_SFLOAT, Some(vk::SampleCountFlags::TYPE_1))
                .unwrap();
        assert!(!target.is_multisampled());
        assert_eq!(pool.stats().live, 2);
        pool.destroy(&allocator);
    }

    #[test]
    fn multisampled_target_adds_resolve_image() {
        let allocator = MockAllocator::default();
        let mut pool = ResourcePool::new(PoolScope::Swapchain);

        let target =
            VisibilityTarget::acquire(&mut pool, &allocator, EXTENT, vk::Format::D32_SFLOAT, Some(vk::SampleCountFlags::TYPE_4))
                .unwrap();
        assert!(target.is_multisampled());
        assert_eq!(pool.stats().live, 3);
        assert_eq!(pool.name_of(target.resolved()).unwrap(), names::VISIBILITY);

        // 第二帧拿到同一份资源
        let again =
            VisibilityTarget::acquire(&mut pool, &allocator, EXTENT, vk::Format::D32_SFLOAT, Some(vk::SampleCountFlags::TYPE_4))
                .unwrap();
        assert_eq!(again.resolved(), target.resolved());
        assert_eq!(allocator.created.get(), 3);
        pool.destroy(&allocator);
    }

    #[test]
    fn resize_without_reset_is_a_configuration_error() {
        let allocator = MockAllocator::default();
        let mut pool = ResourcePool::new(PoolScope::Swapchain);

        VisibilityTarget::acquire(&mut pool, &allocator, EXTENT, vk::Format::D32_SFLOAT, None).unwrap();
        let bigger = vk::Extent2D {
            width: 640,
            height: 400,
        };
        let err = VisibilityTarget::acquire(&mut pool, &allocator, bigger, vk::Format::D32_SFLOAT, None)
            .err()
            .unwrap();
        assert!(err.is_configuration_error());

        pool.reset(&allocator);
        assert!(VisibilityTarget::acquire(&mut pool, &allocator, bigger, vk::Format::D32_SFLOAT, None).is_ok());
        pool.destroy(&allocator);
    }
}
