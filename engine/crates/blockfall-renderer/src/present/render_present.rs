use ash::vk;
use blockfall_gfx::{
    commands::{
        barrier::GfxImageBarrier, command_buffer::GfxCommandBuffer, semaphore::GfxSemaphore,
        submit_info::GfxSubmitInfo,
    },
    error::{GfxError, GfxResult},
    gfx_context::GfxContext,
    swapchain::{
        render_swapchain::{GfxAcquiredImage, GfxRenderSwapchain},
        surface::GfxSurface,
    },
};
use blockfall_render_graph::RgImageBinding;
use blockfall_render_interface::{
    frame_counter::{FrameCounter, FrameLabel},
    render_settings::DefaultRendererSettings,
};
use raw_window_handle::{RawDisplayHandle, RawWindowHandle};

use crate::present::present_flow::PresentTarget;

/// 窗口呈现：surface、交换链以及 acquire/present 使用的 semaphore
pub struct RenderPresent {
    surface: GfxSurface,
    swapchain: Option<GfxRenderSwapchain>,

    surface_format: vk::SurfaceFormatKHR,
    present_mode: vk::PresentModeKHR,
    window_extent: vk::Extent2D,

    /// 数量和 fif num 相同
    present_complete_semaphores: [GfxSemaphore; FrameCounter::fif_count()],
    /// 数量和 swapchain image num 相同
    render_complete_semaphores: Vec<GfxSemaphore>,

    /// 每次重建加一
    generation: u64,
}

// new & init
impl RenderPresent {
    pub fn new(
        ctx: &GfxContext,
        raw_display_handle: RawDisplayHandle,
        raw_window_handle: RawWindowHandle,
        present_mode: vk::PresentModeKHR,
        window_extent: vk::Extent2D,
    ) -> GfxResult<Self> {
        let _span = tracy_client::span!("RenderPresent::new");

        let surface = GfxSurface::new(ctx, raw_display_handle, raw_window_handle)?;
        let surface_format = surface.choose_format(DefaultRendererSettings::DEFAULT_SURFACE_FORMAT)?;
        let swapchain = GfxRenderSwapchain::new(ctx, &surface, present_mode, surface_format, window_extent, None)?;

        let present_complete_semaphores = array_init::try_array_init(|idx| {
            GfxSemaphore::new(ctx, &format!("window-present-complete-{}", FrameLabel::from_usize(idx)))
        })?;
        let render_complete_semaphores = Self::create_render_complete_semaphores(ctx, swapchain.images().len())?;

        Ok(Self {
            surface,
            swapchain: Some(swapchain),
            surface_format,
            present_mode,
            window_extent,
            present_complete_semaphores,
            render_complete_semaphores,
            generation: 0,
        })
    }

    fn create_render_complete_semaphores(ctx: &GfxContext, image_count: usize) -> GfxResult<Vec<GfxSemaphore>> {
        (0..image_count)
            .map(|idx| GfxSemaphore::new(ctx, &format!("window-render-complete-{}", idx)))
            .collect()
    }
}

// getters
impl RenderPresent {
    #[inline]
    pub fn extent(&self) -> vk::Extent2D {
        self.swapchain.as_ref().map_or(self.window_extent, |swapchain| swapchain.extent())
    }

    #[inline]
    pub fn format(&self) -> vk::Format {
        self.surface_format.format
    }

    #[inline]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    #[inline]
    pub fn present_complete_semaphore(&self, slot: FrameLabel) -> &GfxSemaphore {
        &self.present_complete_semaphores[*slot]
    }

    #[inline]
    pub fn render_complete_semaphore(&self, image_index: u32) -> &GfxSemaphore {
        &self.render_complete_semaphores[image_index as usize]
    }

    /// 渲染图中的 `swapchain` 资源，只作为 blit 的目标，不需要 image view
    pub fn image_binding(&self, image_index: u32) -> RgImageBinding {
        let (image, extent) = match &self.swapchain {
            Some(swapchain) => (swapchain.images()[image_index as usize], swapchain.extent()),
            None => (vk::Image::null(), self.window_extent),
        };
        RgImageBinding::new(image, vk::ImageView::null(), self.surface_format.format, extent, vk::ImageAspectFlags::COLOR)
    }
}

// update
impl RenderPresent {
    /// 窗口尺寸变化，由调用方决定何时重建
    #[inline]
    pub fn set_window_extent(&mut self, extent: vk::Extent2D) {
        self.window_extent = extent;
    }

    #[inline]
    pub fn set_present_mode(&mut self, present_mode: vk::PresentModeKHR) {
        self.present_mode = present_mode;
    }

    /// 等待设备空闲之后重建交换链，旧交换链传给新交换链以便驱动复用资源
    pub fn rebuild(&mut self, ctx: &GfxContext) -> GfxResult<()> {
        let _span = tracy_client::span!("RenderPresent::rebuild");
        ctx.wait_idle()?;

        let old = self.swapchain.take();
        let created = GfxRenderSwapchain::new(
            ctx,
            &self.surface,
            self.present_mode,
            self.surface_format,
            self.window_extent,
            old.as_ref(),
        );
        if let Some(old) = old {
            old.destroy();
        }
        let swapchain = created?;

        if swapchain.images().len() != self.render_complete_semaphores.len() {
            for semaphore in self.render_complete_semaphores.drain(..) {
                semaphore.destroy(ctx);
            }
            self.render_complete_semaphores = Self::create_render_complete_semaphores(ctx, swapchain.images().len())?;
        }

        self.swapchain = Some(swapchain);
        self.generation += 1;
        log::info!("swapchain rebuilt, generation {}", self.generation);
        Ok(())
    }

    /// 已经 acquire 的图像不再渲染时调用
    ///
    /// 等待 acquire 的 semaphore，把图像转换到 present layout 并呈现，
    /// 保证 semaphore 与图像都回到可以再次使用的状态
    pub fn abandon_acquired(
        &mut self,
        ctx: &GfxContext,
        cmd: &GfxCommandBuffer,
        slot: FrameLabel,
        image_index: u32,
    ) -> GfxResult<()> {
        let _span = tracy_client::span!("RenderPresent::abandon_acquired");
        let Some(swapchain) = self.swapchain.as_ref() else {
            return Ok(());
        };

        cmd.begin(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT, "abandon-frame")?;
        cmd.image_memory_barrier(
            vk::DependencyFlags::empty(),
            &[GfxImageBarrier::new()
                .image(swapchain.images()[image_index as usize])
                .image_aspect_flag(vk::ImageAspectFlags::COLOR)
                .layout_transfer(vk::ImageLayout::UNDEFINED, vk::ImageLayout::PRESENT_SRC_KHR)
                .src_mask(vk::PipelineStageFlags2::ALL_COMMANDS, vk::AccessFlags2::empty())
                .dst_mask(vk::PipelineStageFlags2::ALL_COMMANDS, vk::AccessFlags2::empty())],
        );
        cmd.end()?;

        let submit = GfxSubmitInfo::new(std::slice::from_ref(cmd))
            .wait(self.present_complete_semaphore(slot), vk::PipelineStageFlags2::ALL_COMMANDS, None)
            .signal(self.render_complete_semaphore(image_index), vk::PipelineStageFlags2::ALL_COMMANDS, None);
        ctx.gfx_queue().submit(std::slice::from_ref(&submit), None)?;

        let mut session = PresentSession { present: self, ctx };
        // 过期时下一帧的 acquire 会处理
        match session.present(image_index) {
            Err(err) if !err.is_transient() => Err(err),
            _ => Ok(()),
        }
    }
}

// destroy
impl RenderPresent {
    pub fn destroy(self, ctx: &GfxContext) {
        for semaphore in self.present_complete_semaphores {
            semaphore.destroy(ctx);
        }
        for semaphore in self.render_complete_semaphores {
            semaphore.destroy(ctx);
        }
        if let Some(swapchain) = self.swapchain {
            swapchain.destroy();
        }
        self.surface.destroy();
    }
}

/// 把 [`RenderPresent`] 与 context 绑在一起，实现 [`PresentTarget`]
pub struct PresentSession<'a> {
    pub present: &'a mut RenderPresent,
    pub ctx: &'a GfxContext,
}
impl PresentTarget for PresentSession<'_> {
    fn acquire(&mut self, slot: FrameLabel) -> GfxResult<GfxAcquiredImage> {
        if self.present.swapchain.is_none() {
            self.present.rebuild(self.ctx)?;
        }
        let present = &mut *self.present;
        let Some(swapchain) = present.swapchain.as_mut() else {
            return Err(GfxError::OutOfDate);
        };
        swapchain.acquire_next_image(&present.present_complete_semaphores[*slot], u64::MAX)
    }

    fn present(&mut self, image_index: u32) -> GfxResult<bool> {
        let present = &*self.present;
        let Some(swapchain) = present.swapchain.as_ref() else {
            return Err(GfxError::OutOfDate);
        };
        debug_assert_eq!(swapchain.current_image_index(), image_index as usize);
        swapchain.present_image(self.ctx.gfx_queue(), &[present.render_complete_semaphore(image_index)])
    }

    fn recreate(&mut self) -> GfxResult<()> {
        self.present.rebuild(self.ctx)
    }
}
