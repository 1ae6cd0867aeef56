use std::rc::Rc;

use ash::vk;
use ash::vk::Handle;
use itertools::Itertools;

use crate::{
    commands::{command_queue::GfxCommandQueue, semaphore::GfxSemaphore},
    error::{GfxError, GfxResult},
    foundation::{debug_messenger::DebugType, device::GfxDevice},
    gfx_context::GfxContext,
    swapchain::surface::GfxSurface,
};

/// acquire 成功的结果
///
/// suboptimal 仍然视为成功，调用方可以在之后的某一帧重建交换链
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GfxAcquiredImage {
    pub image_index: u32,
    pub suboptimal: bool,
}

pub struct GfxRenderSwapchain {
    handle: vk::SwapchainKHR,
    device: Rc<GfxDevice>,

    images: Vec<vk::Image>,
    image_index: usize,

    color_format: vk::Format,
    extent: vk::Extent2D,
    present_mode: vk::PresentModeKHR,
}

// new & init
impl GfxRenderSwapchain {
    /// # param
    /// * old_swapchain - 重建时传入旧的交换链，新交换链创建后旧交换链需要由调用方销毁
    pub fn new(
        ctx: &GfxContext,
        surface: &GfxSurface,
        present_mode: vk::PresentModeKHR,
        surface_format: vk::SurfaceFormatKHR,
        window_physical_extent: vk::Extent2D,
        old_swapchain: Option<&GfxRenderSwapchain>,
    ) -> GfxResult<Self> {
        let _span = tracy_client::span!("GfxRenderSwapchain::new");
        let surface_capabilities = surface.get_capabilities()?;

        let extent = Self::calculate_swapchain_extent(&surface_capabilities, window_physical_extent);
        log::info!(
            "create swapchain:
            surface current extent: {}x{}, min extent: {}x{}, max extent: {}x{}
            window physical extent: {}x{}
            final swapchain extent: {}x{}",
            surface_capabilities.current_extent.width,
            surface_capabilities.current_extent.height,
            surface_capabilities.min_image_extent.width,
            surface_capabilities.min_image_extent.height,
            surface_capabilities.max_image_extent.width,
            surface_capabilities.max_image_extent.height,
            window_physical_extent.width,
            window_physical_extent.height,
            extent.width,
            extent.height
        );

        let present_mode = surface.choose_present_mode(present_mode)?;
        let image_count = Self::calculate_image_count(&surface_capabilities);

        let create_info = vk::SwapchainCreateInfoKHR::default()
            .surface(surface.handle())
            .min_image_count(image_count)
            .image_format(surface_format.format)
            .image_color_space(surface_format.color_space)
            .image_extent(extent)
            .image_array_layers(1)
            // 最终画面通过 blit 写入交换链
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT | vk::ImageUsageFlags::TRANSFER_DST)
            .pre_transform(surface_capabilities.current_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(present_mode)
            .image_sharing_mode(vk::SharingMode::EXCLUSIVE)
            .clipped(true)
            .old_swapchain(old_swapchain.map_or(vk::SwapchainKHR::null(), |s| s.handle));

        let device = ctx.device().clone();
        let handle = unsafe { device.swapchain.create_swapchain(&create_info, None)? };
        let images = match unsafe { device.swapchain.get_swapchain_images(handle) } {
            Ok(images) => images,
            Err(e) => {
                unsafe { device.swapchain.destroy_swapchain(handle, None) };
                return Err(e.into());
            }
        };
        device.set_object_debug_name(handle, "GfxRenderSwapchain::main");
        for (idx, image) in images.iter().enumerate() {
            device.set_object_debug_name(*image, format!("GfxRenderSwapchain::image-{}", idx));
        }

        Ok(Self {
            handle,
            device,
            images,
            image_index: 0,
            color_format: surface_format.format,
            extent,
            present_mode,
        })
    }
}

// getters
impl GfxRenderSwapchain {
    #[inline]
    pub fn images(&self) -> &[vk::Image] {
        &self.images
    }

    #[inline]
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    #[inline]
    pub fn format(&self) -> vk::Format {
        self.color_format
    }

    #[inline]
    pub fn present_mode(&self) -> vk::PresentModeKHR {
        self.present_mode
    }

    #[inline]
    pub fn current_image_index(&self) -> usize {
        self.image_index
    }

    #[inline]
    pub fn current_image(&self) -> vk::Image {
        self.images[self.image_index]
    }
}

// tools
impl GfxRenderSwapchain {
    /// 确定 window 的 extent 尺寸
    ///
    /// 如果 surface_capabilities.current_extent 包含特殊值 0xFFFFFFFF，则表示可以自己设置交换链的 extent
    pub fn calculate_swapchain_extent(
        surface_capabilities: &vk::SurfaceCapabilitiesKHR,
        window_physical_extent: vk::Extent2D,
    ) -> vk::Extent2D {
        let surface_extent = surface_capabilities.current_extent;
        if surface_extent.width == u32::MAX || surface_extent.height == u32::MAX {
            let width = window_physical_extent
                .width
                .clamp(surface_capabilities.min_image_extent.width, surface_capabilities.max_image_extent.width);
            let height = window_physical_extent
                .height
                .clamp(surface_capabilities.min_image_extent.height, surface_capabilities.max_image_extent.height);
            vk::Extent2D { width, height }
        } else {
            surface_extent
        }
    }

    /// max_image_count == 0，表示不限制 image 数量
    pub fn calculate_image_count(surface_capabilities: &vk::SurfaceCapabilitiesKHR) -> u32 {
        if surface_capabilities.max_image_count == 0 {
            surface_capabilities.min_image_count + 1
        } else {
            u32::min(surface_capabilities.max_image_count, surface_capabilities.min_image_count + 1)
        }
    }
}

// update
impl GfxRenderSwapchain {
    /// timeout: nano seconds
    ///
    /// 交换链过期时返回 `GfxError::OutOfDate`
    pub fn acquire_next_image(&mut self, semaphore: &GfxSemaphore, timeout: u64) -> GfxResult<GfxAcquiredImage> {
        let result = unsafe {
            self.device.swapchain.acquire_next_image(self.handle, timeout, semaphore.handle(), vk::Fence::null())
        };

        match result {
            Ok((image_index, suboptimal)) => {
                if suboptimal {
                    log::warn!("swapchain acquire image index {} is not optimal", image_index);
                }
                self.image_index = image_index as usize;
                Ok(GfxAcquiredImage {
                    image_index,
                    suboptimal,
                })
            }
            Err(e) => {
                let err = GfxError::from(e);
                if err.is_transient() {
                    log::warn!("swapchain is out of date when acquire next image");
                }
                Err(err)
            }
        }
    }

    /// 返回是否 suboptimal；交换链过期时返回 `GfxError::OutOfDate`
    pub fn present_image(&self, queue: &GfxCommandQueue, wait_semaphores: &[&GfxSemaphore]) -> GfxResult<bool> {
        let wait_semaphores = wait_semaphores.iter().map(|s| s.handle()).collect_vec();
        let image_indices = [self.image_index as u32];
        let present_info = vk::PresentInfoKHR::default()
            .wait_semaphores(&wait_semaphores)
            .image_indices(&image_indices)
            .swapchains(std::slice::from_ref(&self.handle));

        let result = unsafe { self.device.swapchain.queue_present(queue.handle(), &present_info) };
        match result {
            Ok(suboptimal) => {
                if suboptimal {
                    log::warn!("swapchain present image index {} is not optimal", self.image_index);
                }
                Ok(suboptimal)
            }
            Err(e) => {
                let err = GfxError::from(e);
                if err.is_transient() {
                    log::warn!("swapchain is out of date when present image");
                }
                Err(err)
            }
        }
    }
}

// destroy
impl GfxRenderSwapchain {
    pub fn destroy(mut self) {
        unsafe {
            self.device.swapchain.destroy_swapchain(self.handle, None);
        }
        self.handle = vk::SwapchainKHR::null();
    }
}
impl Drop for GfxRenderSwapchain {
    fn drop(&mut self) {
        debug_assert!(self.handle.is_null(), "GfxRenderSwapchain must be destroyed manually.");
    }
}
impl DebugType for GfxRenderSwapchain {
    fn debug_type_name() -> &'static str {
        "GfxSwapchain"
    }
    fn vk_handle(&self) -> impl vk::Handle {
        self.handle
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn caps(current: (u32, u32)) -> vk::SurfaceCapabilitiesKHR {
        vk::SurfaceCapabilitiesKHR {
            current_extent: vk::Extent2D {
                width: current.0,
                height: current.1,
            },
            min_image_extent: vk::Extent2D { width: 1, height: 1 },
            max_image_extent: vk::Extent2D {
                width: 4096,
                height: 4096,
            },
            min_image_count: 2,
            max_image_count: 0,
            ..Default::default()
        }
    }

    #[test]
    fn fixed_surface_extent_wins() {
        let extent = GfxRenderSwapchain::calculate_swapchain_extent(
            &caps((800, 600)),
            vk::Extent2D {
                width: 1920,
                height: 1080,
            },
        );
        assert_eq!((extent.width, extent.height), (800, 600));
    }

    #[test]
    fn free_surface_extent_is_clamped() {
        let extent = GfxRenderSwapchain::calculate_swapchain_extent(
            &caps((u32::MAX, u32::MAX)),
            vk::Extent2D {
                width: 10000,
                height: 0,
            },
        );
        assert_eq!((extent.width, extent.height), (4096, 1));
    }

    #[test]
    fn image_count_respects_max() {
        let mut c = caps((800, 600));
        assert_eq!(GfxRenderSwapchain::calculate_image_count(&c), 3);
        c.max_image_count = 2;
        assert_eq!(GfxRenderSwapchain::calculate_image_count(&c), 2);
    }
}
