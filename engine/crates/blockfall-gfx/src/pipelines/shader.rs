use std::ffi::CStr;

use ash::vk;

use crate::{
    error::{GfxError, GfxResult},
    foundation::debug_messenger::DebugType,
    gfx_context::GfxContext,
};

/// # Destroy
///
/// 需要手动调用 `destroy` 方法来释放资源。
pub struct GfxShaderModule {
    handle: vk::ShaderModule,

    #[cfg(debug_assertions)]
    destroyed: bool,
}
impl GfxShaderModule {
    /// # param
    /// * path - spv shader 文件路径
    pub fn new(ctx: &GfxContext, path: &std::path::Path) -> GfxResult<Self> {
        let shader_load_err = |source| GfxError::ShaderLoad {
            path: path.display().to_string(),
            source,
        };
        let mut file = std::fs::File::open(path).map_err(shader_load_err)?;
        let shader_code = ash::util::read_spv(&mut file).map_err(shader_load_err)?;

        let shader_module_info = vk::ShaderModuleCreateInfo::default().code(&shader_code);
        let handle = unsafe { ctx.device().create_shader_module(&shader_module_info, None)? };
        let shader_module = Self {
            handle,

            #[cfg(debug_assertions)]
            destroyed: false,
        };
        ctx.device().set_debug_name(&shader_module, path.display().to_string());
        Ok(shader_module)
    }

    #[inline]
    pub fn handle(&self) -> vk::ShaderModule {
        self.handle
    }

    #[inline]
    pub fn destroy(mut self, ctx: &GfxContext) {
        unsafe {
            ctx.device().destroy_shader_module(self.handle, None);
        }
        #[cfg(debug_assertions)]
        {
            self.destroyed = true;
        }
    }
}
impl Drop for GfxShaderModule {
    fn drop(&mut self) {
        #[cfg(debug_assertions)]
        debug_assert!(self.destroyed, "GfxShaderModule must be destroyed manually before drop.");
    }
}
impl DebugType for GfxShaderModule {
    fn debug_type_name() -> &'static str {
        "GfxShaderModule"
    }

    fn vk_handle(&self) -> impl vk::Handle {
        self.handle
    }
}

#[derive(Clone, Debug)]
pub struct ShaderStageInfo {
    pub stage: vk::ShaderStageFlags,
    pub entry_point: &'static CStr,
    pub path: std::path::PathBuf,
}
impl ShaderStageInfo {
    pub const DEFAULT_ENTRY: &'static CStr = c"main";

    #[inline]
    pub fn new(stage: vk::ShaderStageFlags, path: impl Into<std::path::PathBuf>) -> Self {
        Self {
            stage,
            entry_point: Self::DEFAULT_ENTRY,
            path: path.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_info_defaults_to_main_entry() {
        let info = ShaderStageInfo::new(vk::ShaderStageFlags::COMPUTE, "cull/cull_objects.comp.spv");
        assert_eq!(info.entry_point, c"main");
        assert!(info.path.ends_with("cull_objects.comp.spv"));
    }
}
