use ash::vk;
use ash::vk::Handle;
use std::ptr;

use vk_mem::Alloc;

use crate::{error::GfxResult, foundation::debug_messenger::DebugType, gfx_context::GfxContext};

pub struct GfxBuffer {
    handle: vk::Buffer,
    allocation: vk_mem::Allocation,

    size: vk::DeviceSize,

    /// 在初始化阶段写死
    map_ptr: Option<*mut u8>,
    /// 只有在 buffer usage 包含 SHADER_DEVICE_ADDRESS 时才有值
    device_addr: Option<vk::DeviceAddress>,

    usage: vk::BufferUsageFlags,

    debug_name: String,
}
impl DebugType for GfxBuffer {
    fn debug_type_name() -> &'static str {
        "GfxBuffer"
    }

    fn vk_handle(&self) -> impl vk::Handle {
        self.handle
    }
}
impl Drop for GfxBuffer {
    fn drop(&mut self) {
        debug_assert!(self.handle.is_null(), "GfxBuffer {} must be destroyed manually.", self.debug_name);
    }
}
// new & init
impl GfxBuffer {
    /// - align: 当 buffer 处于一个大的 memory block 中时，align 用来指定 buffer 的起始 offset 的内存对齐，默认对齐到 8 字节
    /// - mem_map: 是否需要 host 可见并常驻映射；否则优先使用 device memory
    pub fn new(
        ctx: &GfxContext,
        buffer_size: vk::DeviceSize,
        buffer_usage: vk::BufferUsageFlags,
        align: Option<vk::DeviceSize>,
        mem_map: bool,
        name: impl AsRef<str>,
    ) -> GfxResult<Self> {
        // 不允许 UNIFORM + DBA 的组合，会有隐患
        debug_assert!(
            !(buffer_usage.contains(vk::BufferUsageFlags::UNIFORM_BUFFER)
                && buffer_usage.contains(vk::BufferUsageFlags::SHADER_DEVICE_ADDRESS)),
            "GfxBuffer::new: UNIFORM_BUFFER + SHADER_DEVICE_ADDRESS is not allowed!"
        );

        let buffer_ci = vk::BufferCreateInfo::default().size(buffer_size).usage(buffer_usage);
        let alloc_ci = vk_mem::AllocationCreateInfo {
            usage: if mem_map { vk_mem::MemoryUsage::AutoPreferHost } else { vk_mem::MemoryUsage::AutoPreferDevice },
            flags: if mem_map {
                vk_mem::AllocationCreateFlags::HOST_ACCESS_RANDOM
            } else {
                vk_mem::AllocationCreateFlags::empty()
            },
            ..Default::default()
        };

        let allocator = ctx.allocator();
        let align = align.unwrap_or(8);
        let (buffer, mut alloc) = unsafe { allocator.create_buffer_with_alignment(&buffer_ci, &alloc_ci, align)? };

        let mut map_ptr = None;
        if mem_map {
            match unsafe { allocator.map_memory(&mut alloc) } {
                Ok(ptr) => map_ptr = Some(ptr),
                Err(e) => {
                    unsafe { allocator.destroy_buffer(buffer, &mut alloc) };
                    return Err(e.into());
                }
            }
        }

        let mut device_addr = None;
        if buffer_usage.contains(vk::BufferUsageFlags::SHADER_DEVICE_ADDRESS) {
            device_addr = Some(unsafe {
                ctx.device().get_buffer_device_address(&vk::BufferDeviceAddressInfo::default().buffer(buffer))
            });
        }

        let buffer = Self {
            handle: buffer,
            allocation: alloc,
            size: buffer_size,
            map_ptr,
            device_addr,
            usage: buffer_usage,
            debug_name: name.as_ref().to_string(),
        };
        ctx.device().set_debug_name(&buffer, name.as_ref());
        Ok(buffer)
    }

    #[inline]
    pub fn new_stage_buffer(ctx: &GfxContext, size: vk::DeviceSize, debug_name: impl AsRef<str>) -> GfxResult<Self> {
        Self::new(ctx, size, vk::BufferUsageFlags::TRANSFER_SRC, None, true, debug_name)
    }
}
// destroy
impl GfxBuffer {
    pub fn destroy(mut self, ctx: &GfxContext) {
        let allocator = ctx.allocator();
        unsafe {
            if self.map_ptr.take().is_some() {
                allocator.unmap_memory(&mut self.allocation);
            }
            allocator.destroy_buffer(self.handle, &mut self.allocation);
        }
        self.handle = vk::Buffer::null();
    }
}
// getters
impl GfxBuffer {
    #[inline]
    pub fn vk_buffer(&self) -> vk::Buffer {
        self.handle
    }

    /// buffer usage 不包含 SHADER_DEVICE_ADDRESS 时返回 None
    #[inline]
    pub fn device_address(&self) -> Option<vk::DeviceAddress> {
        self.device_addr
    }

    #[inline]
    pub fn size(&self) -> vk::DeviceSize {
        self.size
    }

    #[inline]
    pub fn usage(&self) -> vk::BufferUsageFlags {
        self.usage
    }

    #[inline]
    pub fn is_mapped(&self) -> bool {
        self.map_ptr.is_some()
    }

    #[inline]
    pub fn debug_name(&self) -> &str {
        &self.debug_name
    }
}
// tools
impl GfxBuffer {
    /// 通过 mem map 的方式将 data 写入 buffer 的 byte_offset 处
    pub fn write_by_mmap<T: bytemuck::Pod>(&self, ctx: &GfxContext, byte_offset: vk::DeviceSize, data: &[T]) -> GfxResult<()> {
        let bytes: &[u8] = bytemuck::cast_slice(data);
        let Some(map_ptr) = self.map_ptr else {
            debug_assert!(false, "buffer {} is not host mapped", self.debug_name);
            return Err(vk::Result::ERROR_MEMORY_MAP_FAILED.into());
        };
        debug_assert!(byte_offset + bytes.len() as vk::DeviceSize <= self.size, "write out of range: {}", self.debug_name);

        unsafe {
            ptr::copy_nonoverlapping(bytes.as_ptr(), map_ptr.add(byte_offset as usize), bytes.len());
        }
        ctx.allocator().flush_allocation(&self.allocation, byte_offset, bytes.len() as vk::DeviceSize)?;
        Ok(())
    }

    /// 从 host mapped 的 buffer 中读出 count 个元素，用于 GPU 结果的回读
    pub fn read_by_mmap<T: bytemuck::Pod>(&self, ctx: &GfxContext, count: usize) -> GfxResult<Vec<T>> {
        let Some(map_ptr) = self.map_ptr else {
            debug_assert!(false, "buffer {} is not host mapped", self.debug_name);
            return Err(vk::Result::ERROR_MEMORY_MAP_FAILED.into());
        };
        let byte_len = count * size_of::<T>();
        debug_assert!(byte_len as vk::DeviceSize <= self.size, "read out of range: {}", self.debug_name);

        ctx.allocator().invalidate_allocation(&self.allocation, 0, byte_len as vk::DeviceSize)?;
        let mut out = vec![T::zeroed(); count];
        unsafe {
            ptr::copy_nonoverlapping(map_ptr, bytemuck::cast_slice_mut::<T, u8>(&mut out).as_mut_ptr(), byte_len);
        }
        Ok(out)
    }

    /// 创建一个临时的 stage buffer，先将数据放入 stage buffer，再 transfer 到 self
    ///
    /// 这个函数是同步等待的，会阻塞运行，仅用于加载阶段的大块数据
    pub fn transfer_data_sync<T: bytemuck::Pod>(&self, ctx: &GfxContext, data: &[T]) -> GfxResult<()> {
        let byte_size = size_of_val(data) as vk::DeviceSize;
        if byte_size == 0 {
            return Ok(());
        }
        let stage_buffer = Self::new_stage_buffer(ctx, byte_size, format!("{}-stage-buffer", self.debug_name))?;

        let result = stage_buffer.write_by_mmap(ctx, 0, data).and_then(|_| {
            ctx.one_time_exec(
                |cmd| {
                    cmd.cmd_copy_buffer(
                        &stage_buffer,
                        self,
                        &[vk::BufferCopy {
                            size: byte_size,
                            ..Default::default()
                        }],
                    );
                },
                &format!("{}-transfer-data", self.debug_name),
            )
        });
        stage_buffer.destroy(ctx);
        result
    }
}
