//! 按作用域管理 GPU 资源生命周期的资源池
//!
//! 资源池是 GPU 资源生命周期的唯一拥有者，句柄不能单独销毁，只会随作用域 reset 一起失效。

pub mod allocator;
pub mod desc;
pub mod error;
pub mod frame_pools;
pub mod handle;
pub mod pool;
pub mod temporal;

/// 不依赖 GPU 的计数分配器，供上层 crate 的测试使用
#[doc(hidden)]
pub mod mock;

pub use allocator::PoolAllocator;
pub use desc::{BufferDesc, BufferMemory, ImageDesc, ImageKind, ResourceDesc};
pub use error::PoolError;
pub use frame_pools::FramePools;
pub use handle::{Buffer, Cubemap, ImageHandle, PoolHandle, PoolKey, PoolScope, Texture2D, Texture2DMS};
pub use pool::{PoolStats, ResourcePool};
pub use temporal::{TemporalState, TemporalTexture};
