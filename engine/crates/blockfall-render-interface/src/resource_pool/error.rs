use blockfall_gfx::error::GfxError;

use crate::resource_pool::handle::PoolScope;

#[derive(thiserror::Error, Debug)]
pub enum PoolError {
    /// 同一作用域内用不同的描述请求同名资源
    #[error("resource `{name}` in {scope} pool was requested as [{requested}] but already exists as [{existing}]")]
    DescriptorMismatch {
        name: String,
        scope: PoolScope,
        existing: String,
        requested: String,
    },

    /// 句柄所属的作用域已经 reset
    #[error("handle to resource `{name}` outlived its pool scope")]
    StaleHandle { name: String },

    #[error("resource `{name}` is not of the requested kind")]
    KindMismatch { name: String },

    #[error(transparent)]
    Device(#[from] GfxError),
}
impl PoolError {
    /// 只有设备错误来自 GPU，其余都是使用方式的错误
    #[inline]
    pub fn is_configuration_error(&self) -> bool {
        !matches!(self, Self::Device(_))
    }
}
