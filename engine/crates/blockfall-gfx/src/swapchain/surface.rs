use ash::vk;
use ash::vk::Handle;

use crate::{error::GfxResult, foundation::debug_messenger::DebugType, gfx_context::GfxContext};

pub struct GfxSurface {
    pub(crate) handle: vk::SurfaceKHR,
    pub(crate) pf: ash::khr::surface::Instance,
    pdevice: vk::PhysicalDevice,
}

// new & init
impl GfxSurface {
    pub fn new(
        ctx: &GfxContext,
        raw_display_handle: raw_window_handle::RawDisplayHandle,
        raw_window_handle: raw_window_handle::RawWindowHandle,
    ) -> GfxResult<Self> {
        let ash_instance = ctx.instance().ash_instance();
        let surface_pf = ash::khr::surface::Instance::new(ctx.vk_entry(), ash_instance);

        let handle = unsafe {
            ash_window::create_surface(ctx.vk_entry(), ash_instance, raw_display_handle, raw_window_handle, None)?
        };

        let pdevice = ctx.physical_device().vk_handle();
        let present_supported = unsafe {
            surface_pf.get_physical_device_surface_support(
                pdevice,
                ctx.gfx_queue().queue_family().queue_family_index,
                handle,
            )?
        };
        if !present_supported {
            log::warn!("gfx queue family does not report present support for this surface");
        }

        let surface = Self {
            handle,
            pf: surface_pf,
            pdevice,
        };
        ctx.device().set_debug_name(&surface, "main");
        Ok(surface)
    }

    /// 窗口系统创建 surface 需要的 instance extensions
    pub fn required_instance_exts(
        raw_display_handle: raw_window_handle::RawDisplayHandle,
    ) -> GfxResult<Vec<&'static std::ffi::CStr>> {
        let exts = ash_window::enumerate_required_extensions(raw_display_handle)?;
        Ok(exts.iter().map(|ext| unsafe { std::ffi::CStr::from_ptr(*ext) }).collect())
    }
}

// getters
impl GfxSurface {
    #[inline]
    pub fn handle(&self) -> vk::SurfaceKHR {
        self.handle
    }

    pub fn get_capabilities(&self) -> GfxResult<vk::SurfaceCapabilitiesKHR> {
        Ok(unsafe { self.pf.get_physical_device_surface_capabilities(self.pdevice, self.handle)? })
    }

    /// 优先使用 preferred，不支持时退化为 surface 报告的第一个 format
    pub fn choose_format(&self, preferred: vk::SurfaceFormatKHR) -> GfxResult<vk::SurfaceFormatKHR> {
        let formats = unsafe { self.pf.get_physical_device_surface_formats(self.pdevice, self.handle)? };
        Ok(formats
            .iter()
            .copied()
            .find(|f| f.format == preferred.format && f.color_space == preferred.color_space)
            .or_else(|| formats.first().copied())
            .unwrap_or(preferred))
    }

    /// 不支持 preferred 时退化为 FIFO，FIFO 是唯一保证支持的 present mode
    pub fn choose_present_mode(&self, preferred: vk::PresentModeKHR) -> GfxResult<vk::PresentModeKHR> {
        let modes = unsafe { self.pf.get_physical_device_surface_present_modes(self.pdevice, self.handle)? };
        Ok(if modes.contains(&preferred) { preferred } else { vk::PresentModeKHR::FIFO })
    }
}

// destroy
impl GfxSurface {
    pub fn destroy(mut self) {
        unsafe { self.pf.destroy_surface(self.handle, None) }
        self.handle = vk::SurfaceKHR::null();
    }
}
impl Drop for GfxSurface {
    fn drop(&mut self) {
        debug_assert!(self.handle.is_null(), "GfxSurface must be destroyed manually.");
    }
}

impl DebugType for GfxSurface {
    fn debug_type_name() -> &'static str {
        "GfxSurface"
    }
    fn vk_handle(&self) -> impl vk::Handle {
        self.handle
    }
}
