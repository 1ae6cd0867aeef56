use ash::vk;
use thiserror::Error;

/// GFX 层的错误
///
/// 由 `vk::Result` 转换而来，[`GfxError::is_transient`] 区分可以恢复的错误（交换链过期）
/// 和必须终止进程的错误（显存耗尽、设备丢失等）。
#[derive(Error, Debug)]
pub enum GfxError {
    #[error("swapchain is out of date")]
    OutOfDate,
    #[error("out of memory")]
    OutOfMemory,
    #[error("device lost")]
    DeviceLost,
    #[error("surface lost")]
    SurfaceLost,
    #[error("timeout while waiting for the GPU")]
    Timeout,
    #[error("failed to load vulkan entry: {0}")]
    EntryLoad(String),
    #[error("no physical device satisfies the renderer requirements")]
    NoSuitableDevice,
    #[error("required vulkan extension or layer is missing: {0}")]
    MissingExtension(String),
    #[error("failed to load shader {path}: {source}")]
    ShaderLoad {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("vulkan error: {0:?}")]
    Vulkan(vk::Result),
}

pub type GfxResult<T> = Result<T, GfxError>;

impl From<vk::Result> for GfxError {
    fn from(result: vk::Result) -> Self {
        match result {
            vk::Result::ERROR_OUT_OF_DATE_KHR => Self::OutOfDate,
            vk::Result::ERROR_OUT_OF_HOST_MEMORY | vk::Result::ERROR_OUT_OF_DEVICE_MEMORY => Self::OutOfMemory,
            vk::Result::ERROR_DEVICE_LOST => Self::DeviceLost,
            vk::Result::ERROR_SURFACE_LOST_KHR => Self::SurfaceLost,
            vk::Result::TIMEOUT => Self::Timeout,
            other => Self::Vulkan(other),
        }
    }
}

impl GfxError {
    /// 是否可以通过重建交换链恢复
    #[inline]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::OutOfDate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn out_of_date_is_transient() {
        let err = GfxError::from(vk::Result::ERROR_OUT_OF_DATE_KHR);
        assert!(matches!(err, GfxError::OutOfDate));
        assert!(err.is_transient());
    }

    #[test]
    fn memory_and_device_errors_are_fatal() {
        for result in [
            vk::Result::ERROR_OUT_OF_DEVICE_MEMORY,
            vk::Result::ERROR_OUT_OF_HOST_MEMORY,
            vk::Result::ERROR_DEVICE_LOST,
            vk::Result::ERROR_SURFACE_LOST_KHR,
        ] {
            assert!(!GfxError::from(result).is_transient(), "{result:?} must not be transient");
        }
        assert!(matches!(GfxError::from(vk::Result::ERROR_OUT_OF_DEVICE_MEMORY), GfxError::OutOfMemory));
    }

    #[test]
    fn unknown_results_keep_raw_code() {
        let err = GfxError::from(vk::Result::ERROR_FORMAT_NOT_SUPPORTED);
        assert!(matches!(err, GfxError::Vulkan(vk::Result::ERROR_FORMAT_NOT_SUPPORTED)));
    }
}
