//! 按错误分类驱动一帧
//!
//! 配置错误与残留的交换链错误只记录日志并跳过这一帧，设备错误交给调用方结束进程。

use blockfall_gfx::gfx_context::GfxContext;
use blockfall_renderer::{
    error::FrameError,
    renderer::{FrameInput, FrameOutcome, Renderer},
};

use crate::frame_host::FrameHost;

/// 帧循环看到的渲染器
pub trait FrameDriver {
    fn time_to_render(&self) -> bool;

    fn delta_time_s(&self) -> f32;

    fn begin_frame(&mut self) -> Result<(), FrameError>;

    fn render_frame(&mut self, input: &FrameInput<'_>) -> Result<FrameOutcome, FrameError>;

    fn end_frame(&mut self) -> Result<(), FrameError>;
}

/// 把 [`Renderer`] 与 context 绑在一起，实现 [`FrameDriver`]
pub struct BoundRenderer<'a> {
    pub renderer: &'a mut Renderer,
    pub ctx: &'a GfxContext,
}
impl FrameDriver for BoundRenderer<'_> {
    fn time_to_render(&self) -> bool {
        self.renderer.time_to_render()
    }

    fn delta_time_s(&self) -> f32 {
        self.renderer.delta_time_s()
    }

    fn begin_frame(&mut self) -> Result<(), FrameError> {
        self.renderer.begin_frame(self.ctx)
    }

    fn render_frame(&mut self, input: &FrameInput<'_>) -> Result<FrameOutcome, FrameError> {
        self.renderer.render_frame(self.ctx, input)
    }

    fn end_frame(&mut self) -> Result<(), FrameError> {
        self.renderer.end_frame(self.ctx)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameStep {
    /// 帧率限制，这一轮不渲染
    NotDue,
    Rendered(FrameOutcome),
    /// 出现可以忽略的错误，帧序号照常推进
    Skipped,
}

/// 运行一帧，只有致命错误会返回 `Err`
///
/// 游戏状态在 begin_frame 成功之后推进，begin_frame 失败的帧不会调用 [`FrameHost::update`]
pub fn step_frame<D: FrameDriver, H: FrameHost>(driver: &mut D, host: &mut H) -> Result<FrameStep, FrameError> {
    if !driver.time_to_render() {
        return Ok(FrameStep::NotDue);
    }

    let step = match driver.begin_frame() {
        Ok(()) => {
            {
                let _span = tracy_client::span!("FrameHost::update");
                host.update(driver.delta_time_s());
            }
            let input = FrameInput {
                camera: host.camera(),
                records: host.objects(),
                overlay: host.overlay(),
            };
            match driver.render_frame(&input) {
                Ok(outcome) => FrameStep::Rendered(outcome),
                Err(err) => skip_unless_fatal(err)?,
            }
        }
        Err(err) => skip_unless_fatal(err)?,
    };

    driver.end_frame()?;
    tracy_client::frame_mark();
    Ok(step)
}

fn skip_unless_fatal(err: FrameError) -> Result<FrameStep, FrameError> {
    if err.is_fatal() {
        return Err(err);
    }
    if err.is_configuration() {
        log::error!("frame skipped: {}", err);
    } else {
        log::warn!("frame skipped: {}", err);
    }
    Ok(FrameStep::Skipped)
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use ash::vk;
    use blockfall_gfx::error::GfxError;
    use blockfall_render_graph::RgError;
    use blockfall_renderer::{
        platform::camera::Camera,
        scene::{asset_container::AssetContainer, object_record::{ModelRef, ObjectRecord}},
    };
    use raw_window_handle::{RawDisplayHandle, RawWindowHandle, XlibDisplayHandle, XlibWindowHandle};
    use rstest::rstest;

    use super::*;
    use crate::frame_host::HostEvents;

    #[derive(Default)]
    struct ScriptedDriver {
        not_due: bool,
        begin_results: VecDeque<Result<(), FrameError>>,
        render_results: VecDeque<Result<FrameOutcome, FrameError>>,
        rendered_objects: Vec<usize>,
        ended: u32,
    }
    impl FrameDriver for ScriptedDriver {
        fn time_to_render(&self) -> bool {
            !self.not_due
        }
        fn delta_time_s(&self) -> f32 {
            1.0 / 60.0
        }
        fn begin_frame(&mut self) -> Result<(), FrameError> {
            self.begin_results.pop_front().unwrap_or(Ok(()))
        }
        fn render_frame(&mut self, input: &FrameInput<'_>) -> Result<FrameOutcome, FrameError> {
            self.rendered_objects.push(input.records.len());
            self.render_results.pop_front().unwrap_or(Ok(FrameOutcome::Presented))
        }
        fn end_frame(&mut self) -> Result<(), FrameError> {
            self.ended += 1;
            Ok(())
        }
    }

    #[derive(Default)]
    struct FakeHost {
        camera: Camera,
        objects: Vec<ObjectRecord>,
        updates: u32,
    }
    impl FrameHost for FakeHost {
        fn raw_display_handle(&self) -> RawDisplayHandle {
            RawDisplayHandle::Xlib(XlibDisplayHandle::new(None, 0))
        }
        fn raw_window_handle(&self) -> RawWindowHandle {
            RawWindowHandle::Xlib(XlibWindowHandle::new(0))
        }
        fn window_extent(&self) -> vk::Extent2D {
            vk::Extent2D {
                width: 640,
                height: 480,
            }
        }
        fn load_assets(&mut self) -> anyhow::Result<AssetContainer> {
            anyhow::bail!("no assets in tests")
        }
        fn pump_events(&mut self) -> HostEvents {
            HostEvents::default()
        }
        fn update(&mut self, _delta_time_s: f32) {
            self.updates += 1;
            self.objects.push(ObjectRecord::new(ModelRef(0), glam::Mat4::IDENTITY, glam::Vec4::ONE));
        }
        fn camera(&self) -> &Camera {
            &self.camera
        }
        fn objects(&self) -> &[ObjectRecord] {
            &self.objects
        }
    }

    fn config_error() -> FrameError {
        RgError::DuplicatePass { pass: "tonemap".into() }.into()
    }

    #[test]
    fn frame_limit_skips_the_whole_frame() {
        let mut driver = ScriptedDriver {
            not_due: true,
            ..Default::default()
        };
        let mut host = FakeHost::default();
        assert_eq!(step_frame(&mut driver, &mut host).unwrap(), FrameStep::NotDue);
        assert_eq!(driver.ended, 0);
        assert_eq!(host.updates, 0);
    }

    #[test]
    fn game_state_reaches_the_renderer() {
        let mut driver = ScriptedDriver::default();
        let mut host = FakeHost::default();
        for _ in 0..3 {
            assert_eq!(step_frame(&mut driver, &mut host).unwrap(), FrameStep::Rendered(FrameOutcome::Presented));
        }
        assert_eq!(driver.rendered_objects, vec![1, 2, 3]);
        assert_eq!(driver.ended, 3);
    }

    #[rstest]
    #[case::configuration(config_error())]
    #[case::leftover_out_of_date(FrameError::DeviceTransient(GfxError::OutOfDate))]
    fn recoverable_errors_skip_and_advance(#[case] err: FrameError) {
        let mut driver = ScriptedDriver {
            render_results: VecDeque::from([Err(err)]),
            ..Default::default()
        };
        let mut host = FakeHost::default();
        assert_eq!(step_frame(&mut driver, &mut host).unwrap(), FrameStep::Skipped);
        assert_eq!(driver.ended, 1);

        // 下一帧正常
        assert!(matches!(step_frame(&mut driver, &mut host).unwrap(), FrameStep::Rendered(_)));
    }

    #[test]
    fn failed_begin_does_not_advance_game_state() {
        let mut driver = ScriptedDriver {
            begin_results: VecDeque::from([Err(config_error())]),
            ..Default::default()
        };
        let mut host = FakeHost::default();
        assert_eq!(step_frame(&mut driver, &mut host).unwrap(), FrameStep::Skipped);
        assert_eq!(host.updates, 0);
        assert!(driver.rendered_objects.is_empty());
        assert_eq!(driver.ended, 1);
    }

    #[test]
    fn device_loss_is_returned_without_ending_the_frame() {
        let mut driver = ScriptedDriver {
            render_results: VecDeque::from([Err(FrameError::DeviceFatal(GfxError::DeviceLost))]),
            ..Default::default()
        };
        let mut host = FakeHost::default();
        let err = step_frame(&mut driver, &mut host).unwrap_err();
        assert!(err.is_fatal());
        assert_eq!(driver.ended, 0);
    }
}
