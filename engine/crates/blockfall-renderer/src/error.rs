use blockfall_gfx::error::GfxError;
use blockfall_render_graph::RgError;
use blockfall_render_interface::{render_settings::ConfigError, resource_pool::PoolError};
use thiserror::Error;

/// 配置错误：资源描述冲突、渲染图声明错误、非法设置、资产数据损坏
///
/// 每次出现都是确定性的，不会自行恢复
#[derive(Error, Debug)]
pub enum FrameConfigError {
    #[error(transparent)]
    Pool(PoolError),
    #[error(transparent)]
    Graph(#[from] RgError),
    #[error(transparent)]
    Settings(#[from] ConfigError),
    #[error(transparent)]
    Asset(#[from] AssetError),
}

/// 一帧中可能出现的错误，按处理方式分为三类
#[derive(Error, Debug)]
pub enum FrameError {
    /// 放弃提交当前帧
    #[error("configuration error: {0}")]
    Config(#[from] FrameConfigError),
    /// 交换链过期，重建交换链池之后只重试呈现
    #[error("transient device error: {0}")]
    DeviceTransient(#[source] GfxError),
    /// 显存耗尽、设备丢失、提交失败
    #[error("fatal device error: {0}")]
    DeviceFatal(#[source] GfxError),
}
impl FrameError {
    /// 必须在刷新日志之后结束进程
    #[inline]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::DeviceFatal(_))
    }

    #[inline]
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Config(_))
    }
}
impl From<GfxError> for FrameError {
    fn from(err: GfxError) -> Self {
        if err.is_transient() { Self::DeviceTransient(err) } else { Self::DeviceFatal(err) }
    }
}
impl From<PoolError> for FrameError {
    fn from(err: PoolError) -> Self {
        match err {
            PoolError::Device(gfx) => gfx.into(),
            other => Self::Config(FrameConfigError::Pool(other)),
        }
    }
}
impl From<RgError> for FrameError {
    fn from(err: RgError) -> Self {
        Self::Config(err.into())
    }
}
impl From<ConfigError> for FrameError {
    fn from(err: ConfigError) -> Self {
        Self::Config(err.into())
    }
}
impl From<AssetError> for FrameError {
    fn from(err: AssetError) -> Self {
        Self::Config(err.into())
    }
}

/// 资产容器解析错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AssetError {
    #[error("bad magic number {found:#010x}")]
    BadMagic { found: u32 },
    #[error("unsupported container version {0}")]
    UnsupportedVersion(u32),
    #[error("container truncated while reading {what} (offset {offset}, need {need} bytes)")]
    Truncated { what: &'static str, offset: usize, need: usize },
    #[error("mesh {mesh}: index {index} out of range ({vertex_count} vertices)")]
    IndexOutOfRange { mesh: usize, index: u32, vertex_count: u32 },
    #[error("mesh {mesh}: index count {index_count} is not a multiple of 3")]
    IncompleteTriangle { mesh: usize, index_count: u32 },
    #[error("{trailing} trailing bytes after the last mesh")]
    TrailingBytes { trailing: usize },
}

#[cfg(test)]
mod tests {
    use blockfall_gfx::error::GfxError;

    use super::*;

    #[test]
    fn out_of_date_is_transient() {
        let err: FrameError = GfxError::OutOfDate.into();
        assert!(matches!(err, FrameError::DeviceTransient(_)));
        assert!(!err.is_fatal());
    }

    #[test]
    fn device_loss_and_oom_are_fatal() {
        assert!(FrameError::from(GfxError::DeviceLost).is_fatal());
        assert!(FrameError::from(PoolError::Device(GfxError::OutOfMemory)).is_fatal());
    }

    #[test]
    fn pool_and_graph_misuse_are_configuration_errors() {
        let err = FrameError::from(PoolError::KindMismatch { name: "shadow".to_string() });
        assert!(err.is_configuration());
        assert!(!err.is_fatal());

        let err = FrameError::from(RgError::DuplicatePass { pass: "cull".to_string() });
        assert!(err.is_configuration());
    }
}
