use std::path::Path;

use ash::vk;
use blockfall_gfx::{
    commands::command_buffer::GfxCommandBuffer, error::GfxResult, gfx_context::GfxContext,
    pipelines::compute_pipeline::GfxComputePipeline,
};

use crate::pipelines::descriptors::{PushDescriptors, push_descriptor_layout};

/// 泛型参数 P 表示 compute shader 的参数，以 push constant 的形式传入 shader
///
/// P 为 `()` 时不使用 push constant
pub struct ComputePass<P: bytemuck::Pod> {
    pipeline: GfxComputePipeline,
    bindings: Vec<vk::DescriptorType>,

    _phantom: std::marker::PhantomData<P>,
}
// new & init
impl<P: bytemuck::Pod> ComputePass<P> {
    pub fn new(
        ctx: &GfxContext,
        shader_path: &Path,
        bindings: &[vk::DescriptorType],
        debug_name: &str,
    ) -> GfxResult<Self> {
        let layout = push_descriptor_layout(
            ctx,
            bindings,
            vk::ShaderStageFlags::COMPUTE,
            size_of::<P>() as u32,
            debug_name,
        )?;
        let pipeline = GfxComputePipeline::new(ctx, shader_path, layout, debug_name)?;

        Ok(Self {
            pipeline,
            bindings: bindings.to_vec(),
            _phantom: std::marker::PhantomData,
        })
    }
}
// destroy
impl<P: bytemuck::Pod> ComputePass<P> {
    pub fn destroy(self, ctx: &GfxContext) {
        self.pipeline.destroy(ctx);
    }
}
// tools
impl<P: bytemuck::Pod> ComputePass<P> {
    pub fn exec(&self, cmd: &GfxCommandBuffer, descriptors: &PushDescriptors, params: &P, group_cnt: glam::UVec3) {
        debug_assert_eq!(
            descriptors.descriptor_types(),
            self.bindings,
            "descriptors do not match the pipeline layout"
        );

        let layout = self.pipeline.layout().handle();
        cmd.cmd_bind_pipeline(vk::PipelineBindPoint::COMPUTE, self.pipeline.handle());
        descriptors.push(cmd, vk::PipelineBindPoint::COMPUTE, layout);
        if size_of::<P>() > 0 {
            cmd.cmd_push_constants(layout, vk::ShaderStageFlags::COMPUTE, 0, bytemuck::bytes_of(params));
        }
        cmd.cmd_dispatch(group_cnt);
    }
}

/// 覆盖整张图像所需的 work group 数量
#[inline]
pub fn group_count_2d(extent: vk::Extent2D, local_size: u32) -> glam::UVec3 {
    glam::uvec3(extent.width.div_ceil(local_size).max(1), extent.height.div_ceil(local_size).max(1), 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn group_count_covers_partial_tiles() {
        let extent = vk::Extent2D {
            width: 1920,
            height: 1081,
        };
        assert_eq!(group_count_2d(extent, 8), glam::uvec3(240, 136, 1));
        assert_eq!(group_count_2d(vk::Extent2D::default(), 8), glam::uvec3(1, 1, 1));
    }
}
