use std::fmt::Display;

use ash::vk;

use crate::resource_state::RgResourceState;

/// pass 对资源的访问方式
///
/// `Undefined` 只能作为初始状态（内容可以丢弃），`Present` 只能作为最终状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RgAccess {
    Undefined,
    Read,
    Write,
    ReadWrite,
    Sampled,
    IndirectArgument,
    TransferSrc,
    TransferDst,
    Present,
}
impl Display for RgAccess {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Undefined => "undefined",
            Self::Read => "read",
            Self::Write => "write",
            Self::ReadWrite => "read-write",
            Self::Sampled => "sampled",
            Self::IndirectArgument => "indirect-argument",
            Self::TransferSrc => "transfer-src",
            Self::TransferDst => "transfer-dst",
            Self::Present => "present",
        };
        f.write_str(name)
    }
}
impl RgAccess {
    #[inline]
    pub fn is_write(self) -> bool {
        matches!(self, Self::Write | Self::ReadWrite | Self::TransferDst)
    }

    #[inline]
    pub fn is_boundary_only(self) -> bool {
        matches!(self, Self::Undefined | Self::Present)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RgPassKind {
    Graphics,
    Compute,
    Transfer,
}
impl Display for RgPassKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Graphics => f.write_str("graphics"),
            Self::Compute => f.write_str("compute"),
            Self::Transfer => f.write_str("transfer"),
        }
    }
}

/// 资源的种类，决定 layout 以及 attachment 的写入方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RgResourceType {
    Image { aspect: vk::ImageAspectFlags },
    Buffer,
}
impl RgResourceType {
    #[inline]
    fn is_depth(self) -> bool {
        matches!(self, Self::Image { aspect } if aspect.contains(vk::ImageAspectFlags::DEPTH))
    }
}

/// 把访问方式解析为具体的 stage/access/layout
///
/// `kind` 为 `None` 表示图外的使用者（attach 的初始与最终状态），此时 stage 取最保守的值。
/// 返回 `None` 表示该组合不合法。
pub fn resolve_access(access: RgAccess, kind: Option<RgPassKind>, ty: RgResourceType) -> Option<RgResourceState> {
    use RgResourceState as S;

    let is_image = matches!(ty, RgResourceType::Image { .. });
    let state = match (access, kind) {
        (RgAccess::Undefined, None) => S::UNDEFINED,
        (RgAccess::Present, None) if is_image => S::PRESENT,
        (RgAccess::Undefined | RgAccess::Present, _) => return None,

        (RgAccess::IndirectArgument, _) if is_image => return None,
        (RgAccess::IndirectArgument, Some(RgPassKind::Transfer)) => return None,
        (RgAccess::IndirectArgument, _) => S::INDIRECT_ARGUMENT,

        (RgAccess::TransferSrc, None | Some(RgPassKind::Transfer)) => S::TRANSFER_SRC,
        (RgAccess::TransferDst, None | Some(RgPassKind::Transfer)) => S::TRANSFER_DST,
        (RgAccess::TransferSrc | RgAccess::TransferDst, _) => return None,

        // transfer pass 只支持拷贝语义
        (RgAccess::Read, Some(RgPassKind::Transfer)) => S::TRANSFER_SRC,
        (RgAccess::Write, Some(RgPassKind::Transfer)) => S::TRANSFER_DST,
        (_, Some(RgPassKind::Transfer)) => return None,

        (RgAccess::Sampled, Some(RgPassKind::Graphics)) if is_image => S::SAMPLED_GRAPHICS,
        (RgAccess::Sampled, Some(RgPassKind::Compute)) if is_image => S::SAMPLED_COMPUTE,
        (RgAccess::Sampled, None) if is_image => S::SAMPLED_ANY,
        (RgAccess::Sampled, Some(RgPassKind::Graphics)) => S::UNIFORM_GRAPHICS,
        (RgAccess::Sampled, Some(RgPassKind::Compute)) => S::UNIFORM_COMPUTE,
        (RgAccess::Sampled, None) => S::UNIFORM_ANY,

        (RgAccess::Read, Some(RgPassKind::Graphics)) if ty.is_depth() => S::DEPTH_ATTACHMENT_READ,
        (RgAccess::Write, Some(RgPassKind::Graphics)) if ty.is_depth() => S::DEPTH_ATTACHMENT_WRITE,
        (RgAccess::ReadWrite, Some(RgPassKind::Graphics)) if ty.is_depth() => S::DEPTH_ATTACHMENT_READ_WRITE,
        (RgAccess::Write, Some(RgPassKind::Graphics)) if is_image => S::COLOR_ATTACHMENT_WRITE,
        (RgAccess::ReadWrite, Some(RgPassKind::Graphics)) if is_image => S::COLOR_ATTACHMENT_READ_WRITE,
        (RgAccess::Read, Some(RgPassKind::Graphics)) if is_image => S::STORAGE_READ_GRAPHICS,
        (RgAccess::Read, Some(RgPassKind::Graphics)) => S::BUFFER_READ_GRAPHICS,
        (RgAccess::Write, Some(RgPassKind::Graphics)) => S::STORAGE_WRITE_GRAPHICS,
        (RgAccess::ReadWrite, Some(RgPassKind::Graphics)) => S::STORAGE_READ_WRITE_GRAPHICS,

        (RgAccess::Read, Some(RgPassKind::Compute)) => S::STORAGE_READ_COMPUTE,
        (RgAccess::Write, Some(RgPassKind::Compute)) => S::STORAGE_WRITE_COMPUTE,
        (RgAccess::ReadWrite, Some(RgPassKind::Compute)) => S::STORAGE_READ_WRITE_COMPUTE,

        (RgAccess::Read, None) => S::STORAGE_READ_ANY,
        (RgAccess::Write, None) => S::STORAGE_WRITE_ANY,
        (RgAccess::ReadWrite, None) => S::STORAGE_READ_WRITE_ANY,
    };

    // buffer 没有 layout
    Some(if is_image { state } else { state.without_layout() })
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    const COLOR: RgResourceType = RgResourceType::Image {
        aspect: vk::ImageAspectFlags::COLOR,
    };
    const DEPTH: RgResourceType = RgResourceType::Image {
        aspect: vk::ImageAspectFlags::DEPTH,
    };
    const BUFFER: RgResourceType = RgResourceType::Buffer;

    #[rstest]
    #[case(RgAccess::Write, RgPassKind::Graphics, COLOR, vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)]
    #[case(RgAccess::Write, RgPassKind::Graphics, DEPTH, vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL)]
    #[case(RgAccess::Write, RgPassKind::Compute, COLOR, vk::ImageLayout::GENERAL)]
    #[case(RgAccess::Sampled, RgPassKind::Compute, COLOR, vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL)]
    #[case(RgAccess::Sampled, RgPassKind::Graphics, DEPTH, vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL)]
    #[case(RgAccess::Read, RgPassKind::Transfer, COLOR, vk::ImageLayout::TRANSFER_SRC_OPTIMAL)]
    #[case(RgAccess::TransferDst, RgPassKind::Transfer, COLOR, vk::ImageLayout::TRANSFER_DST_OPTIMAL)]
    #[case(RgAccess::Read, RgPassKind::Graphics, DEPTH, vk::ImageLayout::DEPTH_STENCIL_READ_ONLY_OPTIMAL)]
    fn image_layouts(
        #[case] access: RgAccess,
        #[case] kind: RgPassKind,
        #[case] ty: RgResourceType,
        #[case] layout: vk::ImageLayout,
    ) {
        assert_eq!(resolve_access(access, Some(kind), ty).unwrap().layout, layout);
    }

    #[rstest]
    #[case(RgAccess::IndirectArgument, Some(RgPassKind::Graphics), COLOR)]
    #[case(RgAccess::IndirectArgument, Some(RgPassKind::Transfer), BUFFER)]
    #[case(RgAccess::Sampled, Some(RgPassKind::Transfer), COLOR)]
    #[case(RgAccess::TransferSrc, Some(RgPassKind::Compute), BUFFER)]
    #[case(RgAccess::Undefined, Some(RgPassKind::Compute), COLOR)]
    #[case(RgAccess::Present, None, BUFFER)]
    #[case(RgAccess::Present, Some(RgPassKind::Graphics), COLOR)]
    fn invalid_combinations(#[case] access: RgAccess, #[case] kind: Option<RgPassKind>, #[case] ty: RgResourceType) {
        assert!(resolve_access(access, kind, ty).is_none());
    }

    #[test]
    fn buffers_never_carry_a_layout() {
        let state = resolve_access(RgAccess::Write, Some(RgPassKind::Compute), BUFFER).unwrap();
        assert_eq!(state.layout, vk::ImageLayout::UNDEFINED);
        let indirect = resolve_access(RgAccess::IndirectArgument, Some(RgPassKind::Graphics), BUFFER).unwrap();
        assert!(indirect.stage.contains(vk::PipelineStageFlags2::DRAW_INDIRECT));
    }

    #[test]
    fn write_modes() {
        assert!(RgAccess::Write.is_write());
        assert!(RgAccess::ReadWrite.is_write());
        assert!(RgAccess::TransferDst.is_write());
        assert!(!RgAccess::Sampled.is_write());
        assert!(!RgAccess::IndirectArgument.is_write());
    }
}
