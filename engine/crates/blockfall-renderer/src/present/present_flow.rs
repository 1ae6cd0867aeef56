//! acquire 与 present 的恢复策略
//!
//! 交换链过期是唯一可以恢复的设备错误：acquire 时重建并重试一次，
//! present 时重建并丢弃这一帧。其余错误原样返回给调用方。

use blockfall_gfx::{
    error::{GfxError, GfxResult},
    swapchain::render_swapchain::GfxAcquiredImage,
};
use blockfall_render_interface::frame_counter::FrameLabel;

/// 可以 acquire/present 的目标，真实实现见 [`super::render_present::PresentSession`]
pub trait PresentTarget {
    fn acquire(&mut self, slot: FrameLabel) -> GfxResult<GfxAcquiredImage>;

    /// 返回是否 suboptimal
    fn present(&mut self, image_index: u32) -> GfxResult<bool>;

    /// 重建交换链，返回后交换链尺寸相关的资源都需要重新申请
    fn recreate(&mut self) -> GfxResult<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AcquireOutcome {
    pub image: GfxAcquiredImage,
    /// acquire 之前交换链被重建过
    pub recreated: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresentOutcome {
    Presented,
    /// 仍然视为成功，下一帧开始前重建
    Suboptimal,
    /// 交换链在 present 时过期，已经重建，这一帧的画面被丢弃
    Dropped,
}

/// 重建之后仍然过期时返回 `None`，调用方应跳过这一帧
pub fn acquire_with_retry<T: PresentTarget>(target: &mut T, slot: FrameLabel) -> GfxResult<Option<AcquireOutcome>> {
    let _span = tracy_client::span!("acquire_with_retry");

    match target.acquire(slot) {
        Ok(image) => Ok(Some(AcquireOutcome {
            image,
            recreated: false,
        })),
        Err(err) if err.is_transient() => {
            log::info!("swapchain out of date on acquire, recreating");
            target.recreate()?;
            match target.acquire(slot) {
                Ok(image) => Ok(Some(AcquireOutcome { image, recreated: true })),
                Err(err) if err.is_transient() => {
                    log::warn!("swapchain still out of date after recreation, skipping frame");
                    Ok(None)
                }
                Err(err) => Err(err),
            }
        }
        Err(err) => Err(err),
    }
}

/// present 过期时只重建交换链，不会重新录制或重新模拟这一帧
pub fn present_with_recovery<T: PresentTarget>(target: &mut T, image_index: u32) -> GfxResult<PresentOutcome> {
    let _span = tracy_client::span!("present_with_recovery");

    match target.present(image_index) {
        Ok(false) => Ok(PresentOutcome::Presented),
        Ok(true) => Ok(PresentOutcome::Suboptimal),
        Err(GfxError::OutOfDate) => {
            log::info!("swapchain out of date on present, frame dropped");
            target.recreate()?;
            Ok(PresentOutcome::Dropped)
        }
        Err(err) => Err(err),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use super::*;

    /// 按顺序返回预设的结果
    #[derive(Default)]
    struct ScriptedTarget {
        acquire_results: VecDeque<GfxResult<GfxAcquiredImage>>,
        present_results: VecDeque<GfxResult<bool>>,
        recreations: u32,
    }
    impl PresentTarget for ScriptedTarget {
        fn acquire(&mut self, _slot: FrameLabel) -> GfxResult<GfxAcquiredImage> {
            self.acquire_results.pop_front().unwrap()
        }
        fn present(&mut self, _image_index: u32) -> GfxResult<bool> {
            self.present_results.pop_front().unwrap()
        }
        fn recreate(&mut self) -> GfxResult<()> {
            self.recreations += 1;
            Ok(())
        }
    }

    fn image(image_index: u32) -> GfxResult<GfxAcquiredImage> {
        Ok(GfxAcquiredImage {
            image_index,
            suboptimal: false,
        })
    }

    #[test]
    fn acquire_recreates_once_and_retries() {
        let mut target = ScriptedTarget {
            acquire_results: VecDeque::from([Err(GfxError::OutOfDate), image(2)]),
            ..Default::default()
        };
        let outcome = acquire_with_retry(&mut target, FrameLabel::A).unwrap().unwrap();
        assert_eq!(outcome.image.image_index, 2);
        assert!(outcome.recreated);
        assert_eq!(target.recreations, 1);
    }

    #[test]
    fn repeated_out_of_date_skips_the_frame() {
        let mut target = ScriptedTarget {
            acquire_results: VecDeque::from([Err(GfxError::OutOfDate), Err(GfxError::OutOfDate)]),
            ..Default::default()
        };
        assert!(acquire_with_retry(&mut target, FrameLabel::B).unwrap().is_none());
        assert_eq!(target.recreations, 1);
    }

    #[test]
    fn device_loss_is_not_recovered() {
        let mut target = ScriptedTarget {
            acquire_results: VecDeque::from([Err(GfxError::DeviceLost)]),
            present_results: VecDeque::from([Err(GfxError::SurfaceLost)]),
            ..Default::default()
        };
        assert!(matches!(acquire_with_retry(&mut target, FrameLabel::C), Err(GfxError::DeviceLost)));
        assert!(matches!(present_with_recovery(&mut target, 0), Err(GfxError::SurfaceLost)));
        assert_eq!(target.recreations, 0);
    }

    #[test]
    fn present_outcomes() {
        let mut target = ScriptedTarget {
            present_results: VecDeque::from([Ok(false), Ok(true), Err(GfxError::OutOfDate)]),
            ..Default::default()
        };
        assert_eq!(present_with_recovery(&mut target, 0).unwrap(), PresentOutcome::Presented);
        assert_eq!(present_with_recovery(&mut target, 1).unwrap(), PresentOutcome::Suboptimal);
        assert_eq!(target.recreations, 0);
        assert_eq!(present_with_recovery(&mut target, 2).unwrap(), PresentOutcome::Dropped);
        assert_eq!(target.recreations, 1);
    }
}
