use ash::vk;
use blockfall_gfx::{gfx_context::GfxContext, resources::buffer::GfxBuffer};
use blockfall_render_graph::{RenderGraph, RgAccess, RgBufferBinding, RgError, RgImageBinding, resource::RgPhysical};
use blockfall_render_interface::{
    frame_counter::FrameLabel,
    gfx_allocator::GfxPooledImage,
    render_settings::DefaultRendererSettings,
    resource_pool::{
        Buffer, BufferMemory, Cubemap, FramePools, ImageDesc, PoolAllocator, PoolError, TemporalState, TemporalTexture,
        Texture2D,
        desc::format_aspect,
    },
};

use crate::{
    culling::{
        draw_layout::DrawLayout,
        gpu_types::{GpuDrawCommand, GpuObject},
    },
    error::FrameError,
    frame_data::PerFrameData,
    passes::{
        StageOptions,
        bloom::bloom_extent,
        names,
        sky::{ENV_CUBE_SIZE, SKY_LUT_EXTENT},
        tile_classify::tile_count,
    },
    scene::mesh_buffers::MeshBuffers,
    visibility_target::VisibilityTarget,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachmentKind {
    ColorImage,
    DepthImage,
    Buffer,
}

/// 一个资源在本帧开始与结束时的访问方式
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentSpec {
    pub name: String,
    pub kind: AttachmentKind,
    pub initial: RgAccess,
    pub final_access: RgAccess,
}
impl AttachmentSpec {
    fn new(name: impl Into<String>, kind: AttachmentKind, initial: RgAccess, final_access: RgAccess) -> Self {
        Self {
            name: name.into(),
            kind,
            initial,
            final_access,
        }
    }

    /// 每帧都从同一状态开始、以同一状态结束
    fn steady(name: impl Into<String>, kind: AttachmentKind, access: RgAccess) -> Self {
        Self::new(name, kind, access, access)
    }

    /// 被之前的帧写过时从上一帧的最终状态开始，这样 barrier 会等待上一帧的访问；
    /// 否则内容未定义
    fn carried(name: impl Into<String>, kind: AttachmentKind, initialized: bool, final_access: RgAccess) -> Self {
        let initial = if initialized { final_access } else { RgAccess::Undefined };
        Self::new(name, kind, initial, final_access)
    }
}

/// 本帧渲染图中所有资源的边界状态
///
/// - per-frame 池中的资源只有在 GPU 完成该槽位的上一帧之后才会再次使用，可以直接丢弃内容
/// - 交换链池与永久池中的资源会被相邻的帧共享，初始状态必须是上一帧留下的状态
pub fn frame_attachments(opts: &StageOptions) -> Vec<AttachmentSpec> {
    use AttachmentKind::{Buffer, ColorImage, DepthImage};

    let mut specs = vec![
        AttachmentSpec::steady(names::PER_FRAME, Buffer, RgAccess::Sampled),
        AttachmentSpec::steady(names::OBJECTS, Buffer, RgAccess::Read),
        AttachmentSpec::steady(names::MESH_INFOS, Buffer, RgAccess::Read),
        AttachmentSpec::steady(names::MATERIALS, Buffer, RgAccess::Read),
        AttachmentSpec::steady(names::VERTICES, Buffer, RgAccess::Read),
        AttachmentSpec::steady(names::INDICES, Buffer, RgAccess::Read),
        AttachmentSpec::steady(names::DRAW_TEMPLATE, Buffer, RgAccess::TransferSrc),
        AttachmentSpec::new(names::DRAW_COMMANDS, Buffer, RgAccess::Undefined, RgAccess::IndirectArgument),
        AttachmentSpec::new(names::COMPACTED, Buffer, RgAccess::Undefined, RgAccess::Read),
        // 上一帧的着色可能还在读，不能按 Undefined 丢弃
        AttachmentSpec::steady(names::TILE_FLAGS, Buffer, RgAccess::Read),
    ];
    if opts.cull_readback {
        specs.push(AttachmentSpec::new(names::CULL_READBACK, Buffer, RgAccess::Undefined, RgAccess::TransferDst));
    }

    let sc = opts.swapchain_initialized;
    specs.push(AttachmentSpec::carried(names::VISIBILITY, ColorImage, sc, RgAccess::Read));
    if opts.multisampled {
        specs.push(AttachmentSpec::carried(names::VISIBILITY_MS, ColorImage, sc, RgAccess::Read));
    }
    specs.push(AttachmentSpec::carried(names::DEPTH, DepthImage, sc, RgAccess::Read));

    specs.push(AttachmentSpec::carried(names::HDR, ColorImage, opts.hdr_current_initialized, RgAccess::Sampled));
    specs.push(AttachmentSpec::carried(
        names::HDR_HISTORY,
        ColorImage,
        opts.hdr_history_initialized,
        RgAccess::Sampled,
    ));

    specs.push(AttachmentSpec::carried(names::SKY_LUT, ColorImage, !opts.bake_sky, RgAccess::Sampled));
    specs.push(AttachmentSpec::carried(names::ENV_CUBE, ColorImage, !opts.bake_sky, RgAccess::Sampled));

    for level in 0..opts.bloom_passes.max(1) {
        specs.push(AttachmentSpec::carried(names::bloom(level), ColorImage, sc, RgAccess::Sampled));
    }
    specs.push(AttachmentSpec::carried(names::LDR, ColorImage, sc, RgAccess::TransferSrc));
    specs.push(AttachmentSpec::new(names::SWAPCHAIN, ColorImage, RgAccess::Undefined, RgAccess::Present));

    specs
}

/// 按 [`frame_attachments`] 登记全部资源，物理资源由 `resolve` 提供
pub fn attach_frame<E: From<RgError>>(
    graph: &mut RenderGraph<'_>,
    opts: &StageOptions,
    mut resolve: impl FnMut(&AttachmentSpec) -> Result<RgPhysical, E>,
) -> Result<(), E> {
    for spec in frame_attachments(opts) {
        let physical = resolve(&spec)?;
        graph.attach(&spec.name, physical, spec.initial, spec.final_access)?;
    }
    Ok(())
}

#[inline]
pub fn image_binding(image: &GfxPooledImage) -> RgImageBinding {
    RgImageBinding::new(image.handle(), image.view(), image.format(), image.extent(), format_aspect(image.format()))
        .with_storage_view(image.storage_view())
}

#[inline]
pub fn buffer_binding(buffer: &GfxBuffer) -> RgBufferBinding {
    RgBufferBinding::new(buffer.vk_buffer(), buffer.size())
}

/// 申请本帧资源需要的参数
#[derive(Debug, Clone, Copy)]
pub struct FrameResourceSpec {
    pub extent: vk::Extent2D,
    pub depth_format: vk::Format,
    pub max_objects: u32,
    pub mesh_count: usize,
    pub bloom_passes: u32,
    pub samples: Option<vk::SampleCountFlags>,
    pub cull_readback: bool,
}

/// 本帧用到的全部池化资源的句柄
pub struct FrameResources {
    // per-frame
    pub per_frame: Buffer<PerFrameData>,
    pub objects: Buffer<GpuObject>,
    pub draw_template: Buffer<GpuDrawCommand>,
    pub draw_commands: Buffer<GpuDrawCommand>,
    pub compacted: Buffer<u32>,
    pub cull_readback: Option<Buffer<GpuDrawCommand>>,

    // swapchain
    pub tile_flags: Buffer<u32>,
    pub visibility: VisibilityTarget,
    pub hdr: TemporalTexture,
    pub bloom: Vec<Texture2D>,
    pub ldr: Texture2D,

    // permanent
    pub sky_lut: Texture2D,
    pub env_cube: Cubemap,
}
// new & init
impl FrameResources {
    pub fn acquire<A: PoolAllocator>(
        pools: &mut FramePools<A>,
        allocator: &A,
        label: FrameLabel,
        spec: &FrameResourceSpec,
    ) -> Result<Self, PoolError> {
        let _span = tracy_client::span!("FrameResources::acquire");

        let frame = pools.frame_mut(label);
        let storage = vk::BufferUsageFlags::STORAGE_BUFFER;
        let mesh_count = spec.mesh_count as u64;
        let max_objects = spec.max_objects as u64;

        let per_frame = frame.acquire_buffer(
            allocator,
            names::PER_FRAME,
            1,
            vk::BufferUsageFlags::UNIFORM_BUFFER,
            BufferMemory::HostVisible,
        )?;
        let objects = frame.acquire_buffer(allocator, names::OBJECTS, max_objects, storage, BufferMemory::HostVisible)?;
        let draw_template = frame.acquire_buffer(
            allocator,
            names::DRAW_TEMPLATE,
            mesh_count,
            vk::BufferUsageFlags::TRANSFER_SRC,
            BufferMemory::HostVisible,
        )?;
        let draw_commands = frame.acquire_buffer(
            allocator,
            names::DRAW_COMMANDS,
            mesh_count,
            storage
                | vk::BufferUsageFlags::INDIRECT_BUFFER
                | vk::BufferUsageFlags::TRANSFER_DST
                | vk::BufferUsageFlags::TRANSFER_SRC,
            BufferMemory::DeviceLocal,
        )?;
        let compacted = frame.acquire_buffer(allocator, names::COMPACTED, max_objects, storage, BufferMemory::DeviceLocal)?;
        let cull_readback = if spec.cull_readback {
            Some(frame.acquire_buffer(
                allocator,
                names::CULL_READBACK,
                mesh_count,
                vk::BufferUsageFlags::TRANSFER_DST,
                BufferMemory::HostVisible,
            )?)
        } else {
            None
        };

        let swapchain = pools.swapchain_mut();
        let (tiles_x, tiles_y) = tile_count(spec.extent);
        let tile_flags = swapchain.acquire_buffer(
            allocator,
            names::TILE_FLAGS,
            (tiles_x * tiles_y) as u64,
            storage,
            BufferMemory::DeviceLocal,
        )?;
        let visibility =
            VisibilityTarget::acquire(swapchain, allocator, spec.extent, spec.depth_format, spec.samples)?;

        let color_usage = vk::ImageUsageFlags::STORAGE | vk::ImageUsageFlags::SAMPLED;
        let hdr_desc = ImageDesc::texture_2d(DefaultRendererSettings::HDR_COLOR_FORMAT, spec.extent, color_usage);
        let hdr = TemporalTexture::acquire(swapchain, allocator, names::HDR, hdr_desc)?;
        let bloom = (0..spec.bloom_passes.max(1))
            .map(|level| {
                let desc = ImageDesc::texture_2d(
                    DefaultRendererSettings::HDR_COLOR_FORMAT,
                    bloom_extent(spec.extent, level),
                    color_usage,
                );
                swapchain.acquire_texture_2d(allocator, &names::bloom(level), desc)
            })
            .collect::<Result<Vec<_>, _>>()?;
        let ldr = swapchain.acquire_texture_2d(
            allocator,
            names::LDR,
            ImageDesc::texture_2d(
                DefaultRendererSettings::LDR_COLOR_FORMAT,
                spec.extent,
                vk::ImageUsageFlags::STORAGE
                    | vk::ImageUsageFlags::TRANSFER_SRC
                    | vk::ImageUsageFlags::COLOR_ATTACHMENT,
            ),
        )?;

        let permanent = pools.permanent_mut();
        let sky_lut = permanent.acquire_texture_2d(
            allocator,
            names::SKY_LUT,
            ImageDesc::texture_2d(DefaultRendererSettings::HDR_COLOR_FORMAT, SKY_LUT_EXTENT, color_usage),
        )?;
        let env_cube = permanent.acquire_cubemap(
            allocator,
            names::ENV_CUBE,
            ImageDesc::cube(DefaultRendererSettings::HDR_COLOR_FORMAT, ENV_CUBE_SIZE, color_usage),
        )?;

        Ok(Self {
            per_frame,
            objects,
            draw_template,
            draw_commands,
            compacted,
            cull_readback,
            tile_flags,
            visibility,
            hdr,
            bloom,
            ldr,
            sky_lut,
            env_cube,
        })
    }
}
// update
impl FrameResources {
    /// 写入 host 可见的 per-frame buffer
    pub fn upload(
        &self,
        ctx: &GfxContext,
        pools: &FramePools<GfxContext>,
        per_frame: &PerFrameData,
        objects: &[GpuObject],
        layout: &DrawLayout,
    ) -> Result<(), PoolError> {
        let _span = tracy_client::span!("FrameResources::upload");

        pools.buffer(self.per_frame)?.write_by_mmap(ctx, 0, std::slice::from_ref(per_frame))?;
        if !objects.is_empty() {
            pools.buffer(self.objects)?.write_by_mmap(ctx, 0, objects)?;
        }
        if !layout.template().is_empty() {
            pools.buffer(self.draw_template)?.write_by_mmap(ctx, 0, layout.template())?;
        }
        Ok(())
    }

    /// 把本帧的物理资源登记到渲染图中
    pub fn attach(
        &self,
        graph: &mut RenderGraph<'_>,
        pools: &FramePools<GfxContext>,
        meshes: &MeshBuffers,
        temporal: &TemporalState,
        opts: &StageOptions,
        swapchain_image: RgImageBinding,
    ) -> Result<(), FrameError> {
        let visibility = self.visibility.bindings(pools.swapchain())?;
        // 历史无效时 shading 不会采样，但图中仍然需要一张图像
        let history = self.hdr.previous(temporal).unwrap_or_else(|| self.hdr.previous_slot(temporal));

        attach_frame(graph, opts, |spec| -> Result<RgPhysical, FrameError> {
            let buffer = |buffer: &GfxBuffer| RgPhysical::Buffer(buffer_binding(buffer));
            let image = |image: &GfxPooledImage| RgPhysical::Image(image_binding(image));

            let physical = match spec.name.as_str() {
                names::PER_FRAME => buffer(pools.buffer(self.per_frame)?),
                names::OBJECTS => buffer(pools.buffer(self.objects)?),
                names::MESH_INFOS => buffer(pools.buffer(meshes.mesh_infos)?),
                names::MATERIALS => buffer(pools.buffer(meshes.materials)?),
                names::VERTICES => buffer(pools.buffer(meshes.vertices)?),
                names::INDICES => buffer(pools.buffer(meshes.indices)?),
                names::DRAW_TEMPLATE => buffer(pools.buffer(self.draw_template)?),
                names::DRAW_COMMANDS => buffer(pools.buffer(self.draw_commands)?),
                names::COMPACTED => buffer(pools.buffer(self.compacted)?),
                names::TILE_FLAGS => buffer(pools.buffer(self.tile_flags)?),
                names::CULL_READBACK => match self.cull_readback {
                    Some(readback) => buffer(pools.buffer(readback)?),
                    None => RgPhysical::Buffer(RgBufferBinding::NULL),
                },
                names::HDR => image(pools.image(self.hdr.current(temporal))?),
                names::HDR_HISTORY => image(pools.image(history)?),
                names::SKY_LUT => image(pools.image(self.sky_lut)?),
                names::ENV_CUBE => image(pools.image(self.env_cube)?),
                names::LDR => image(pools.image(self.ldr)?),
                names::SWAPCHAIN => RgPhysical::Image(swapchain_image),
                name => {
                    if let Some((_, binding)) = visibility.iter().find(|(n, _)| *n == name) {
                        RgPhysical::Image(*binding)
                    } else if let Some(level) = self.bloom_level(name) {
                        image(pools.image(self.bloom[level])?)
                    } else {
                        return Err(PoolError::KindMismatch { name: name.to_string() }.into());
                    }
                }
            };
            Ok(physical)
        })
    }
}
// tools
impl FrameResources {
    fn bloom_level(&self, name: &str) -> Option<usize> {
        let level: usize = name.strip_prefix("bloom_")?.parse().ok()?;
        (level < self.bloom.len()).then_some(level)
    }
}

#[cfg(test)]
mod tests {
    use blockfall_render_interface::resource_pool::mock::MockAllocator;

    use super::*;

    fn spec(extent: vk::Extent2D) -> FrameResourceSpec {
        FrameResourceSpec {
            extent,
            depth_format: vk::Format::D32_SFLOAT,
            max_objects: 128,
            mesh_count: 3,
            bloom_passes: 4,
            samples: None,
            cull_readback: true,
        }
    }

    const EXTENT: vk::Extent2D = vk::Extent2D {
        width: 800,
        height: 600,
    };

    #[test]
    fn every_slot_gets_its_own_per_frame_buffers() {
        let allocator = MockAllocator::default();
        let mut pools = FramePools::new();

        let a = FrameResources::acquire(&mut pools, &allocator, FrameLabel::A, &spec(EXTENT)).unwrap();
        let b = FrameResources::acquire(&mut pools, &allocator, FrameLabel::B, &spec(EXTENT)).unwrap();

        let buf_a = pools.buffer(a.objects).unwrap();
        let buf_b = pools.buffer(b.objects).unwrap();
        assert_ne!(buf_a.id, buf_b.id);
        // 交换链池与永久池的资源在槽位之间共享
        assert_eq!(pools.image(a.ldr).unwrap().id, pools.image(b.ldr).unwrap().id);
        assert_eq!(pools.image(a.sky_lut).unwrap().id, pools.image(b.sky_lut).unwrap().id);
        assert_eq!(a.bloom.len(), 4);
        pools.destroy(&allocator);
    }

    #[test]
    fn next_cycle_reuses_recycled_per_frame_memory() {
        let allocator = MockAllocator::default();
        let mut pools = FramePools::new();

        let first = FrameResources::acquire(&mut pools, &allocator, FrameLabel::C, &spec(EXTENT)).unwrap();
        let first_id = pools.buffer(first.compacted).unwrap().id;
        let created = allocator.created.get();

        pools.begin_frame(&allocator, FrameLabel::C);
        assert!(pools.buffer(first.compacted).is_err());

        let second = FrameResources::acquire(&mut pools, &allocator, FrameLabel::C, &spec(EXTENT)).unwrap();
        assert_eq!(pools.buffer(second.compacted).unwrap().id, first_id);
        assert_eq!(allocator.created.get(), created);
        pools.destroy(&allocator);
    }

    #[test]
    fn resize_requires_a_swapchain_reset() {
        let allocator = MockAllocator::default();
        let mut pools = FramePools::new();
        let bigger = vk::Extent2D {
            width: 1024,
            height: 768,
        };

        FrameResources::acquire(&mut pools, &allocator, FrameLabel::A, &spec(EXTENT)).unwrap();
        pools.begin_frame(&allocator, FrameLabel::B);
        assert!(FrameResources::acquire(&mut pools, &allocator, FrameLabel::B, &spec(bigger)).is_err());

        pools.on_swapchain_recreated(&allocator);
        let resized = FrameResources::acquire(&mut pools, &allocator, FrameLabel::B, &spec(bigger)).unwrap();
        assert!(pools.image(resized.ldr).is_ok());
        pools.destroy(&allocator);
    }

    #[test]
    fn shared_resources_start_where_the_last_frame_left_them() {
        let first = frame_attachments(&StageOptions::default());
        let ldr = first.iter().find(|s| s.name == names::LDR).unwrap();
        assert_eq!(ldr.initial, RgAccess::Undefined);

        let later = frame_attachments(&StageOptions {
            swapchain_initialized: true,
            ..Default::default()
        });
        for spec in later.iter().filter(|s| s.name != names::SWAPCHAIN && s.initial != RgAccess::Undefined) {
            assert_eq!(spec.initial, spec.final_access, "{}", spec.name);
        }
        let ldr = later.iter().find(|s| s.name == names::LDR).unwrap();
        assert_eq!(ldr.initial, RgAccess::TransferSrc);
        // per-frame 的剔除结果总是被丢弃
        let commands = later.iter().find(|s| s.name == names::DRAW_COMMANDS).unwrap();
        assert_eq!(commands.initial, RgAccess::Undefined);
    }
}
