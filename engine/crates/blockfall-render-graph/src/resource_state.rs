//! 资源状态：pipeline stage、access mask 以及 image layout 的组合

use ash::vk;

/// 资源在某一次访问中的同步状态
///
/// buffer 的 layout 恒为 `UNDEFINED`
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RgResourceState {
    pub stage: vk::PipelineStageFlags2,
    pub access: vk::AccessFlags2,
    pub layout: vk::ImageLayout,
}
impl Default for RgResourceState {
    fn default() -> Self {
        Self::UNDEFINED
    }
}

const fn stages(a: vk::PipelineStageFlags2, b: vk::PipelineStageFlags2) -> vk::PipelineStageFlags2 {
    vk::PipelineStageFlags2::from_raw(a.as_raw() | b.as_raw())
}
const fn accesses(a: vk::AccessFlags2, b: vk::AccessFlags2) -> vk::AccessFlags2 {
    vk::AccessFlags2::from_raw(a.as_raw() | b.as_raw())
}

const GRAPHICS_SHADERS: vk::PipelineStageFlags2 =
    stages(vk::PipelineStageFlags2::VERTEX_SHADER, vk::PipelineStageFlags2::FRAGMENT_SHADER);
const FRAGMENT_TESTS: vk::PipelineStageFlags2 =
    stages(vk::PipelineStageFlags2::EARLY_FRAGMENT_TESTS, vk::PipelineStageFlags2::LATE_FRAGMENT_TESTS);
const STORAGE_READ_WRITE: vk::AccessFlags2 =
    accesses(vk::AccessFlags2::SHADER_STORAGE_READ, vk::AccessFlags2::SHADER_STORAGE_WRITE);

// new & 常量定义
impl RgResourceState {
    #[inline]
    pub const fn new(stage: vk::PipelineStageFlags2, access: vk::AccessFlags2, layout: vk::ImageLayout) -> Self {
        Self { stage, access, layout }
    }

    /// 未定义状态（初始状态或不关心内容）
    pub const UNDEFINED: Self =
        Self::new(vk::PipelineStageFlags2::TOP_OF_PIPE, vk::AccessFlags2::NONE, vk::ImageLayout::UNDEFINED);

    /// 呈现（swapchain image），同步由 present 的 semaphore 负责
    pub const PRESENT: Self =
        Self::new(vk::PipelineStageFlags2::BOTTOM_OF_PIPE, vk::AccessFlags2::NONE, vk::ImageLayout::PRESENT_SRC_KHR);

    pub const INDIRECT_ARGUMENT: Self = Self::new(
        vk::PipelineStageFlags2::DRAW_INDIRECT,
        vk::AccessFlags2::INDIRECT_COMMAND_READ,
        vk::ImageLayout::UNDEFINED,
    );

    pub const TRANSFER_SRC: Self = Self::new(
        vk::PipelineStageFlags2::TRANSFER,
        vk::AccessFlags2::TRANSFER_READ,
        vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
    );

    pub const TRANSFER_DST: Self = Self::new(
        vk::PipelineStageFlags2::TRANSFER,
        vk::AccessFlags2::TRANSFER_WRITE,
        vk::ImageLayout::TRANSFER_DST_OPTIMAL,
    );

    // ============ 采样 ============

    pub const SAMPLED_GRAPHICS: Self =
        Self::new(GRAPHICS_SHADERS, vk::AccessFlags2::SHADER_SAMPLED_READ, vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL);

    pub const SAMPLED_COMPUTE: Self = Self::new(
        vk::PipelineStageFlags2::COMPUTE_SHADER,
        vk::AccessFlags2::SHADER_SAMPLED_READ,
        vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
    );

    pub const SAMPLED_ANY: Self = Self::new(
        vk::PipelineStageFlags2::ALL_COMMANDS,
        vk::AccessFlags2::SHADER_SAMPLED_READ,
        vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
    );

    /// buffer 的 "采样" 即 uniform 读取
    pub const UNIFORM_GRAPHICS: Self =
        Self::new(GRAPHICS_SHADERS, vk::AccessFlags2::UNIFORM_READ, vk::ImageLayout::UNDEFINED);

    pub const UNIFORM_COMPUTE: Self = Self::new(
        vk::PipelineStageFlags2::COMPUTE_SHADER,
        vk::AccessFlags2::UNIFORM_READ,
        vk::ImageLayout::UNDEFINED,
    );

    pub const UNIFORM_ANY: Self =
        Self::new(vk::PipelineStageFlags2::ALL_COMMANDS, vk::AccessFlags2::UNIFORM_READ, vk::ImageLayout::UNDEFINED);

    // ============ attachment ============

    pub const COLOR_ATTACHMENT_WRITE: Self = Self::new(
        vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT,
        vk::AccessFlags2::COLOR_ATTACHMENT_WRITE,
        vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
    );

    /// blend 或 load 已有内容
    pub const COLOR_ATTACHMENT_READ_WRITE: Self = Self::new(
        vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT,
        accesses(vk::AccessFlags2::COLOR_ATTACHMENT_READ, vk::AccessFlags2::COLOR_ATTACHMENT_WRITE),
        vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
    );

    pub const DEPTH_ATTACHMENT_READ: Self = Self::new(
        FRAGMENT_TESTS,
        vk::AccessFlags2::DEPTH_STENCIL_ATTACHMENT_READ,
        vk::ImageLayout::DEPTH_STENCIL_READ_ONLY_OPTIMAL,
    );

    pub const DEPTH_ATTACHMENT_WRITE: Self = Self::new(
        FRAGMENT_TESTS,
        vk::AccessFlags2::DEPTH_STENCIL_ATTACHMENT_WRITE,
        vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
    );

    pub const DEPTH_ATTACHMENT_READ_WRITE: Self = Self::new(
        FRAGMENT_TESTS,
        accesses(
            vk::AccessFlags2::DEPTH_STENCIL_ATTACHMENT_READ,
            vk::AccessFlags2::DEPTH_STENCIL_ATTACHMENT_WRITE,
        ),
        vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
    );

    // ============ storage ============

    pub const STORAGE_READ_GRAPHICS: Self =
        Self::new(GRAPHICS_SHADERS, vk::AccessFlags2::SHADER_STORAGE_READ, vk::ImageLayout::GENERAL);

    /// 顶点、索引以及 shader 中的 storage 读取
    pub const BUFFER_READ_GRAPHICS: Self = Self::new(
        vk::PipelineStageFlags2::from_raw(
            vk::PipelineStageFlags2::VERTEX_INPUT.as_raw()
                | vk::PipelineStageFlags2::VERTEX_SHADER.as_raw()
                | vk::PipelineStageFlags2::FRAGMENT_SHADER.as_raw(),
        ),
        vk::AccessFlags2::from_raw(
            vk::AccessFlags2::INDEX_READ.as_raw()
                | vk::AccessFlags2::VERTEX_ATTRIBUTE_READ.as_raw()
                | vk::AccessFlags2::SHADER_STORAGE_READ.as_raw(),
        ),
        vk::ImageLayout::UNDEFINED,
    );

    pub const STORAGE_WRITE_GRAPHICS: Self = Self::new(
        vk::PipelineStageFlags2::FRAGMENT_SHADER,
        vk::AccessFlags2::SHADER_STORAGE_WRITE,
        vk::ImageLayout::GENERAL,
    );

    pub const STORAGE_READ_WRITE_GRAPHICS: Self =
        Self::new(vk::PipelineStageFlags2::FRAGMENT_SHADER, STORAGE_READ_WRITE, vk::ImageLayout::GENERAL);

    pub const STORAGE_READ_COMPUTE: Self = Self::new(
        vk::PipelineStageFlags2::COMPUTE_SHADER,
        vk::AccessFlags2::SHADER_STORAGE_READ,
        vk::ImageLayout::GENERAL,
    );

    pub const STORAGE_WRITE_COMPUTE: Self = Self::new(
        vk::PipelineStageFlags2::COMPUTE_SHADER,
        vk::AccessFlags2::SHADER_STORAGE_WRITE,
        vk::ImageLayout::GENERAL,
    );

    pub const STORAGE_READ_WRITE_COMPUTE: Self =
        Self::new(vk::PipelineStageFlags2::COMPUTE_SHADER, STORAGE_READ_WRITE, vk::ImageLayout::GENERAL);

    pub const STORAGE_READ_ANY: Self = Self::new(
        vk::PipelineStageFlags2::ALL_COMMANDS,
        vk::AccessFlags2::SHADER_STORAGE_READ,
        vk::ImageLayout::GENERAL,
    );

    pub const STORAGE_WRITE_ANY: Self = Self::new(
        vk::PipelineStageFlags2::ALL_COMMANDS,
        vk::AccessFlags2::SHADER_STORAGE_WRITE,
        vk::ImageLayout::GENERAL,
    );

    pub const STORAGE_READ_WRITE_ANY: Self =
        Self::new(vk::PipelineStageFlags2::ALL_COMMANDS, STORAGE_READ_WRITE, vk::ImageLayout::GENERAL);
}
// tools
impl RgResourceState {
    /// 写操作的 access flags
    const WRITE_ACCESS: vk::AccessFlags2 = vk::AccessFlags2::from_raw(
        vk::AccessFlags2::SHADER_STORAGE_WRITE.as_raw()
            | vk::AccessFlags2::COLOR_ATTACHMENT_WRITE.as_raw()
            | vk::AccessFlags2::DEPTH_STENCIL_ATTACHMENT_WRITE.as_raw()
            | vk::AccessFlags2::TRANSFER_WRITE.as_raw()
            | vk::AccessFlags2::MEMORY_WRITE.as_raw(),
    );

    #[inline]
    pub fn is_write(&self) -> bool {
        self.access.intersects(Self::WRITE_ACCESS)
    }

    /// barrier 的 src 只需要让写入可见，读操作不需要 flush
    #[inline]
    pub fn src_access(&self) -> vk::AccessFlags2 {
        self.access & Self::WRITE_ACCESS
    }

    #[inline]
    pub fn without_layout(mut self) -> Self {
        self.layout = vk::ImageLayout::UNDEFINED;
        self
    }

    /// 连续的只读访问合并为一个状态，后续的写入需要等待所有读取者
    #[inline]
    /// 已经同步到的 stage/access 是否包含 `other`，`ALL_COMMANDS` 包含任意 stage
    pub fn covers(&self, other: &Self) -> bool {
        let stage_covered =
            self.stage.contains(vk::PipelineStageFlags2::ALL_COMMANDS) || self.stage.contains(other.stage);
        stage_covered && self.access.contains(other.access)
    }

    pub fn merge_read(mut self, other: Self) -> Self {
        debug_assert!(!self.is_write() && !other.is_write());
        debug_assert_eq!(self.layout, other.layout);
        self.stage |= other.stage;
        self.access |= other.access;
        self
    }
}

/// 格式化 PipelineStageFlags2 为可读字符串
pub(crate) fn format_pipeline_stage(stage: vk::PipelineStageFlags2) -> String {
    const NAMES: &[(vk::PipelineStageFlags2, &str)] = &[
        (vk::PipelineStageFlags2::TOP_OF_PIPE, "TOP_OF_PIPE"),
        (vk::PipelineStageFlags2::BOTTOM_OF_PIPE, "BOTTOM_OF_PIPE"),
        (vk::PipelineStageFlags2::DRAW_INDIRECT, "DRAW_INDIRECT"),
        (vk::PipelineStageFlags2::VERTEX_INPUT, "VERTEX_INPUT"),
        (vk::PipelineStageFlags2::VERTEX_SHADER, "VERTEX_SHADER"),
        (vk::PipelineStageFlags2::FRAGMENT_SHADER, "FRAGMENT_SHADER"),
        (vk::PipelineStageFlags2::EARLY_FRAGMENT_TESTS, "EARLY_FRAGMENT_TESTS"),
        (vk::PipelineStageFlags2::LATE_FRAGMENT_TESTS, "LATE_FRAGMENT_TESTS"),
        (vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT, "COLOR_ATTACHMENT_OUTPUT"),
        (vk::PipelineStageFlags2::COMPUTE_SHADER, "COMPUTE_SHADER"),
        (vk::PipelineStageFlags2::TRANSFER, "TRANSFER"),
        (vk::PipelineStageFlags2::ALL_COMMANDS, "ALL_COMMANDS"),
    ];
    let names: Vec<_> = NAMES.iter().filter(|(flag, _)| stage.contains(*flag)).map(|(_, name)| *name).collect();
    if names.is_empty() { format!("{:?}", stage) } else { names.join(" | ") }
}

/// 格式化 AccessFlags2 为可读字符串
pub(crate) fn format_access_flags(access: vk::AccessFlags2) -> String {
    if access == vk::AccessFlags2::NONE {
        return "NONE".to_string();
    }
    const NAMES: &[(vk::AccessFlags2, &str)] = &[
        (vk::AccessFlags2::INDIRECT_COMMAND_READ, "INDIRECT_CMD_READ"),
        (vk::AccessFlags2::INDEX_READ, "INDEX_READ"),
        (vk::AccessFlags2::VERTEX_ATTRIBUTE_READ, "VERTEX_ATTR_READ"),
        (vk::AccessFlags2::UNIFORM_READ, "UNIFORM_READ"),
        (vk::AccessFlags2::SHADER_SAMPLED_READ, "SHADER_SAMPLED_READ"),
        (vk::AccessFlags2::SHADER_STORAGE_READ, "STORAGE_READ"),
        (vk::AccessFlags2::SHADER_STORAGE_WRITE, "STORAGE_WRITE"),
        (vk::AccessFlags2::COLOR_ATTACHMENT_READ, "COLOR_ATTACH_READ"),
        (vk::AccessFlags2::COLOR_ATTACHMENT_WRITE, "COLOR_ATTACH_WRITE"),
        (vk::AccessFlags2::DEPTH_STENCIL_ATTACHMENT_READ, "DEPTH_ATTACH_READ"),
        (vk::AccessFlags2::DEPTH_STENCIL_ATTACHMENT_WRITE, "DEPTH_ATTACH_WRITE"),
        (vk::AccessFlags2::TRANSFER_READ, "TRANSFER_READ"),
        (vk::AccessFlags2::TRANSFER_WRITE, "TRANSFER_WRITE"),
        (vk::AccessFlags2::MEMORY_READ, "MEMORY_READ"),
        (vk::AccessFlags2::MEMORY_WRITE, "MEMORY_WRITE"),
    ];
    let names: Vec<_> = NAMES.iter().filter(|(flag, _)| access.contains(*flag)).map(|(_, name)| *name).collect();
    if names.is_empty() { format!("{:?}", access) } else { names.join(" | ") }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn src_access_drops_reads() {
        assert_eq!(RgResourceState::STORAGE_READ_WRITE_COMPUTE.src_access(), vk::AccessFlags2::SHADER_STORAGE_WRITE);
        assert_eq!(RgResourceState::SAMPLED_COMPUTE.src_access(), vk::AccessFlags2::NONE);
    }

    #[test]
    fn merged_reads_cover_both_stages() {
        let merged = RgResourceState::SAMPLED_COMPUTE.merge_read(RgResourceState::SAMPLED_GRAPHICS);
        assert!(merged.stage.contains(vk::PipelineStageFlags2::COMPUTE_SHADER));
        assert!(merged.stage.contains(vk::PipelineStageFlags2::FRAGMENT_SHADER));
        assert!(!merged.is_write());
    }

    #[test]
    fn coverage_of_read_stages() {
        assert!(!RgResourceState::SAMPLED_COMPUTE.covers(&RgResourceState::SAMPLED_GRAPHICS));
        assert!(RgResourceState::SAMPLED_ANY.covers(&RgResourceState::SAMPLED_GRAPHICS));
        let merged = RgResourceState::SAMPLED_COMPUTE.merge_read(RgResourceState::SAMPLED_GRAPHICS);
        assert!(merged.covers(&RgResourceState::SAMPLED_COMPUTE));
    }

    #[test]
    fn readable_flag_names() {
        assert_eq!(format_access_flags(vk::AccessFlags2::NONE), "NONE");
        assert_eq!(
            format_pipeline_stage(RgResourceState::DEPTH_ATTACHMENT_WRITE.stage),
            "EARLY_FRAGMENT_TESTS | LATE_FRAGMENT_TESTS"
        );
    }
}
