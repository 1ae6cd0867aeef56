use ash::vk;
use blockfall_gfx::{
    commands::command_buffer::GfxCommandBuffer,
    error::GfxResult,
    gfx_context::GfxContext,
    pipelines::pipeline_layout::{GfxDescriptorSetLayout, GfxPipelineLayout},
};
use blockfall_render_graph::{RgBufferBinding, RgImageBinding};
use itertools::Itertools;

enum DescriptorInfo {
    Buffer(vk::DescriptorBufferInfo),
    Image(vk::DescriptorImageInfo),
}

/// 一次 `vkCmdPushDescriptorSetKHR` 的内容，binding 按添加顺序递增
///
/// # 使用示例
/// ```ignore
/// let descriptors = PushDescriptors::new()
///     .uniform_buffer(ctx.buffer(PER_FRAME))
///     .storage_image(ctx.image(HDR).storage_view)
///     .sampled_image(ctx.image(BLOOM).view, sampler);
/// descriptors.push(ctx.cmd, vk::PipelineBindPoint::COMPUTE, layout);
/// ```
#[derive(Default)]
pub struct PushDescriptors {
    entries: Vec<(vk::DescriptorType, DescriptorInfo)>,
}
// builder
impl PushDescriptors {
    pub fn new() -> Self {
        Self::default()
    }

    fn buffer(mut self, ty: vk::DescriptorType, buffer: RgBufferBinding) -> Self {
        self.entries.push((
            ty,
            DescriptorInfo::Buffer(vk::DescriptorBufferInfo {
                buffer: buffer.buffer,
                offset: 0,
                range: vk::WHOLE_SIZE,
            }),
        ));
        self
    }

    #[inline]
    pub fn uniform_buffer(self, buffer: RgBufferBinding) -> Self {
        self.buffer(vk::DescriptorType::UNIFORM_BUFFER, buffer)
    }

    #[inline]
    pub fn storage_buffer(self, buffer: RgBufferBinding) -> Self {
        self.buffer(vk::DescriptorType::STORAGE_BUFFER, buffer)
    }

    /// storage image 总是处于 GENERAL layout
    pub fn storage_image(mut self, view: vk::ImageView) -> Self {
        self.entries.push((
            vk::DescriptorType::STORAGE_IMAGE,
            DescriptorInfo::Image(vk::DescriptorImageInfo {
                sampler: vk::Sampler::null(),
                image_view: view,
                image_layout: vk::ImageLayout::GENERAL,
            }),
        ));
        self
    }

    /// 以 `Sampled` 方式声明的图像，处于 SHADER_READ_ONLY_OPTIMAL
    pub fn sampled_image(mut self, image: &RgImageBinding, sampler: vk::Sampler) -> Self {
        self.entries.push((
            vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
            DescriptorInfo::Image(vk::DescriptorImageInfo {
                sampler,
                image_view: image.view,
                image_layout: vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
            }),
        ));
        self
    }
}
// tools
impl PushDescriptors {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn descriptor_types(&self) -> Vec<vk::DescriptorType> {
        self.entries.iter().map(|(ty, _)| *ty).collect()
    }

    pub fn push(&self, cmd: &GfxCommandBuffer, bind_point: vk::PipelineBindPoint, layout: vk::PipelineLayout) {
        if self.entries.is_empty() {
            return;
        }
        let writes = self
            .entries
            .iter()
            .enumerate()
            .map(|(binding, (ty, info))| {
                let write = vk::WriteDescriptorSet::default().dst_binding(binding as u32).descriptor_type(*ty);
                match info {
                    DescriptorInfo::Buffer(info) => write.buffer_info(std::slice::from_ref(info)),
                    DescriptorInfo::Image(info) => write.image_info(std::slice::from_ref(info)),
                }
            })
            .collect_vec();
        cmd.cmd_push_descriptor_set(bind_point, layout, 0, &writes);
    }
}

/// 创建只有一个 push descriptor set 的 pipeline layout
///
/// * bindings - 按 binding 顺序排列的 descriptor 类型
/// * push_constant_size - 为 0 时不创建 push constant range
pub fn push_descriptor_layout(
    ctx: &GfxContext,
    bindings: &[vk::DescriptorType],
    stages: vk::ShaderStageFlags,
    push_constant_size: u32,
    debug_name: &str,
) -> GfxResult<GfxPipelineLayout> {
    let layout_bindings = bindings
        .iter()
        .enumerate()
        .map(|(idx, ty)| {
            vk::DescriptorSetLayoutBinding::default()
                .binding(idx as u32)
                .descriptor_type(*ty)
                .descriptor_count(1)
                .stage_flags(stages)
        })
        .collect_vec();
    let set_layout = GfxDescriptorSetLayout::new_push_descriptor(ctx, &layout_bindings, debug_name)?;

    let push_constant_ranges = if push_constant_size > 0 {
        vec![vk::PushConstantRange::default().stage_flags(stages).offset(0).size(push_constant_size)]
    } else {
        vec![]
    };
    GfxPipelineLayout::new(ctx, vec![set_layout], &push_constant_ranges, debug_name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bindings_follow_insertion_order() {
        let image = RgImageBinding::NULL;
        let descriptors = PushDescriptors::new()
            .uniform_buffer(RgBufferBinding::NULL)
            .storage_buffer(RgBufferBinding::NULL)
            .storage_image(image.storage_view)
            .sampled_image(&image, vk::Sampler::null());

        assert_eq!(descriptors.len(), 4);
        assert_eq!(
            descriptors.descriptor_types(),
            vec![
                vk::DescriptorType::UNIFORM_BUFFER,
                vk::DescriptorType::STORAGE_BUFFER,
                vk::DescriptorType::STORAGE_IMAGE,
                vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
            ]
        );
    }
}
