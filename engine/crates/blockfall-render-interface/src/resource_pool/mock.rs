//! 测试用的计数分配器，不需要 GPU

use std::cell::{Cell, RefCell};

use blockfall_gfx::error::{GfxError, GfxResult};

use crate::resource_pool::{
    allocator::PoolAllocator,
    desc::{BufferDesc, ImageDesc},
};

/// 每次创建都会得到一个新的 id，便于判断两个句柄是否指向同一份物理资源
#[derive(Debug, PartialEq, Eq)]
pub struct MockResource {
    pub id: u64,
    pub name: RefCell<String>,
}

#[derive(Default)]
pub struct MockAllocator {
    next_id: Cell<u64>,
    pub created: Cell<u64>,
    pub destroyed: Cell<u64>,
    /// 置为 true 后所有创建都返回 OutOfMemory
    pub fail: Cell<bool>,
}
impl MockAllocator {
    fn make(&self, name: &str) -> GfxResult<MockResource> {
        if self.fail.get() {
            return Err(GfxError::OutOfMemory);
        }
        let id = self.next_id.get() + 1;
        self.next_id.set(id);
        self.created.set(self.created.get() + 1);
        Ok(MockResource {
            id,
            name: RefCell::new(name.to_string()),
        })
    }

    pub fn alive(&self) -> u64 {
        self.created.get() - self.destroyed.get()
    }
}
impl PoolAllocator for MockAllocator {
    type Image = MockResource;
    type Buffer = MockResource;

    fn create_image(&self, name: &str, _desc: &ImageDesc) -> GfxResult<Self::Image> {
        self.make(name)
    }
    fn create_buffer(&self, name: &str, _desc: &BufferDesc) -> GfxResult<Self::Buffer> {
        self.make(name)
    }
    fn destroy_image(&self, _image: Self::Image) {
        self.destroyed.set(self.destroyed.get() + 1);
    }
    fn destroy_buffer(&self, _buffer: Self::Buffer) {
        self.destroyed.set(self.destroyed.get() + 1);
    }
    fn rename_image(&self, image: &Self::Image, name: &str) {
        *image.name.borrow_mut() = name.to_string();
    }
    fn rename_buffer(&self, buffer: &Self::Buffer, name: &str) {
        *buffer.name.borrow_mut() = name.to_string();
    }
}
