use std::{fmt::Display, marker::PhantomData};

use slotmap::new_key_type;

use crate::{frame_counter::FrameLabel, resource_pool::desc::ImageKind};

new_key_type! {
    /// 资源池 arena 中的代际索引，reset 之后旧 key 失效
    pub struct PoolKey;
}

/// 资源的生命周期作用域
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PoolScope {
    /// 每个 frame in flight slot 一个
    PerFrame(FrameLabel),
    /// 交换链尺寸相关，resize 时 reset
    Swapchain,
    /// 引擎生命周期，只在显式请求时失效
    Permanent,
}
impl Display for PoolScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PerFrame(label) => write!(f, "per-frame[{label}]"),
            Self::Swapchain => write!(f, "swapchain"),
            Self::Permanent => write!(f, "permanent"),
        }
    }
}

/// 所有句柄共有的部分：arena 中的 key 以及签发它的作用域
pub trait PoolHandle: Copy {
    fn key(&self) -> PoolKey;
    fn scope(&self) -> PoolScope;
}

/// 图像句柄，额外限定了可以指向的图像种类
pub trait ImageHandle: PoolHandle {
    fn accepts(kind: ImageKind) -> bool;
}

macro_rules! image_handle {
    ($(#[$meta:meta])* $name:ident, $kind:pat) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub struct $name {
            key: PoolKey,
            scope: PoolScope,
        }
        impl $name {
            #[inline]
            pub(crate) fn new(key: PoolKey, scope: PoolScope) -> Self {
                Self { key, scope }
            }
        }
        impl PoolHandle for $name {
            #[inline]
            fn key(&self) -> PoolKey {
                self.key
            }
            #[inline]
            fn scope(&self) -> PoolScope {
                self.scope
            }
        }
        impl ImageHandle for $name {
            #[inline]
            fn accepts(kind: ImageKind) -> bool {
                matches!(kind, $kind)
            }
        }
    };
}

image_handle!(
    /// 单采样的 2D 纹理
    Texture2D,
    ImageKind::Image2D
);
image_handle!(
    /// 6 个面的立方体贴图
    Cubemap,
    ImageKind::ImageCube
);
image_handle!(
    /// 多重采样的 2D 纹理，需要 resolve 后才能采样
    Texture2DMS,
    ImageKind::ImageMultisample { .. }
);

/// 元素类型为 `T` 的 buffer
///
/// `len` 是元素个数，而不是字节数
pub struct Buffer<T: bytemuck::Pod> {
    key: PoolKey,
    scope: PoolScope,
    len: u64,
    _phantom: PhantomData<fn() -> T>,
}
impl<T: bytemuck::Pod> Buffer<T> {
    #[inline]
    pub(crate) fn new(key: PoolKey, scope: PoolScope, len: u64) -> Self {
        Self {
            key,
            scope,
            len,
            _phantom: PhantomData,
        }
    }

    #[inline]
    pub fn len(&self) -> u64 {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn byte_size(&self) -> u64 {
        Self::byte_size_of(self.len)
    }

    #[inline]
    pub fn byte_size_of(len: u64) -> u64 {
        len * size_of::<T>() as u64
    }
}
impl<T: bytemuck::Pod> Clone for Buffer<T> {
    #[inline]
    fn clone(&self) -> Self {
        *self
    }
}
impl<T: bytemuck::Pod> Copy for Buffer<T> {}
impl<T: bytemuck::Pod> PartialEq for Buffer<T> {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key && self.scope == other.scope && self.len == other.len
    }
}
impl<T: bytemuck::Pod> Eq for Buffer<T> {}
impl<T: bytemuck::Pod> std::fmt::Debug for Buffer<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Buffer")
            .field("key", &self.key)
            .field("scope", &self.scope)
            .field("len", &self.len)
            .field("elem", &std::any::type_name::<T>())
            .finish()
    }
}
impl<T: bytemuck::Pod> PoolHandle for Buffer<T> {
    #[inline]
    fn key(&self) -> PoolKey {
        self.key
    }
    #[inline]
    fn scope(&self) -> PoolScope {
        self.scope
    }
}

#[cfg(test)]
mod tests {
    use slotmap::SlotMap;

    use super::*;

    #[test]
    fn typed_buffer_reports_byte_size() {
        let mut arena = SlotMap::<PoolKey, ()>::with_key();
        let buffer = Buffer::<[f32; 4]>::new(arena.insert(()), PoolScope::Permanent, 8);
        assert_eq!(buffer.byte_size(), 128);
        let copy = buffer;
        assert_eq!(copy, buffer);
    }

    #[test]
    fn scope_names_are_readable() {
        assert_eq!(PoolScope::PerFrame(FrameLabel::B).to_string(), "per-frame[B]");
        assert_eq!(PoolScope::Swapchain.to_string(), "swapchain");
    }
}
