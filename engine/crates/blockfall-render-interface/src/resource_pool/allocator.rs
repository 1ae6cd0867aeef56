use blockfall_gfx::error::GfxResult;

use crate::resource_pool::desc::{BufferDesc, ImageDesc};

/// 资源池背后真正创建与销毁 GPU 资源的后端
///
/// 资源池本身不依赖 Vulkan，测试中用一个计数的假后端替代。
pub trait PoolAllocator {
    type Image;
    type Buffer;

    fn create_image(&self, name: &str, desc: &ImageDesc) -> GfxResult<Self::Image>;
    fn create_buffer(&self, name: &str, desc: &BufferDesc) -> GfxResult<Self::Buffer>;

    fn destroy_image(&self, image: Self::Image);
    fn destroy_buffer(&self, buffer: Self::Buffer);

    /// 复用 free list 中的资源时，后端可以借此更新调试名
    fn rename_image(&self, _image: &Self::Image, _name: &str) {}
    fn rename_buffer(&self, _buffer: &Self::Buffer, _name: &str) {}
}
