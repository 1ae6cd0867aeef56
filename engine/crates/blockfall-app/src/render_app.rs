use std::{
    ffi::CStr,
    io::Write,
    path::{Path, PathBuf},
};

use anyhow::Context;
use blockfall_crate_tools::{init_log::init_log, resource::BlockfallPath};
use blockfall_gfx::gfx_context::GfxContext;
use blockfall_render_interface::render_settings::RenderSettings;
use blockfall_renderer::{error::FrameError, renderer::Renderer};

use crate::{
    frame_host::FrameHost,
    frame_loop::{BoundRenderer, step_frame},
};

pub fn panic_handler(info: &std::panic::PanicHookInfo) {
    log::error!("{}", info);
    log::logger().flush();
}

/// 设备错误：记录日志，刷新之后以非零状态退出
pub fn exit_on_fatal(err: &FrameError) -> ! {
    log::error!("fatal device error, exiting: {}", err);
    log::logger().flush();
    let _ = std::io::stderr().flush();
    std::process::exit(1);
}

pub struct RenderApp {
    ctx: GfxContext,
    renderer: Renderer,
}
// new & init
impl RenderApp {
    pub fn init_env() {
        std::panic::set_hook(Box::new(panic_handler));

        init_log();

        tracy_client::Client::start();
        tracy_client::set_thread_name!("RenderThread");
    }

    /// 配置文件不存在时使用默认配置；存在但无法解析时报错
    pub fn load_settings(path: Option<&Path>) -> anyhow::Result<RenderSettings> {
        let path: PathBuf = path.map(Path::to_path_buf).unwrap_or_else(BlockfallPath::default_settings_path);
        if !path.exists() {
            log::info!("{} not found, using default render settings", path.display());
            return Ok(RenderSettings::default());
        }
        RenderSettings::from_file(&path).with_context(|| format!("loading render settings from {}", path.display()))
    }

    pub fn new<H: FrameHost>(host: &mut H, settings: RenderSettings) -> anyhow::Result<Self> {
        let _span = tracy_client::span!("RenderApp::new");

        // 追加 window system 需要的 extension
        let extra_instance_exts: Vec<&'static CStr> =
            ash_window::enumerate_required_extensions(host.raw_display_handle())
                .context("querying surface instance extensions")?
                .iter()
                .map(|ext| unsafe { CStr::from_ptr(*ext) })
                .collect();
        let ctx = GfxContext::new("blockfall", &extra_instance_exts).context("creating gfx context")?;

        let assets = match host.load_assets() {
            Ok(assets) => assets,
            Err(e) => {
                ctx.destroy();
                return Err(e.context("loading static geometry"));
            }
        };
        let renderer = match Renderer::new(
            &ctx,
            settings,
            host.raw_display_handle(),
            host.raw_window_handle(),
            host.window_extent(),
            &assets,
        ) {
            Ok(renderer) => renderer,
            Err(e) => {
                ctx.destroy();
                return Err(anyhow::Error::new(e).context("creating renderer"));
            }
        };

        Ok(Self { ctx, renderer })
    }
}
// destroy
impl RenderApp {
    pub fn destroy(self) {
        self.renderer.destroy(&self.ctx);
        self.ctx.destroy();
    }
}
// update
impl RenderApp {
    /// 整个程序的入口：运行到窗口关闭，设备错误时直接结束进程
    pub fn run<H: FrameHost>(host: &mut H, settings_path: Option<&Path>) -> anyhow::Result<()> {
        Self::init_env();

        let settings = Self::load_settings(settings_path)?;
        let mut app = Self::new(host, settings)?;

        loop {
            let events = host.pump_events();
            if events.quit {
                break;
            }
            if let Some(extent) = events.resized {
                app.renderer.resize(extent);
            }
            if let Some(settings) = events.settings {
                match app.renderer.update_settings(&app.ctx, settings) {
                    Ok(()) => {}
                    Err(err) if err.is_fatal() => exit_on_fatal(&err),
                    Err(err) => log::error!("render settings rejected: {}", err),
                }
            }

            let mut driver = BoundRenderer {
                renderer: &mut app.renderer,
                ctx: &app.ctx,
            };
            if let Err(err) = step_frame(&mut driver, host) {
                exit_on_fatal(&err);
            }
        }

        log::info!("end run.");
        app.destroy();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_settings_file_falls_back_to_defaults() {
        let path = std::env::temp_dir().join("blockfall-settings-that-does-not-exist.toml");
        let settings = RenderApp::load_settings(Some(&path)).unwrap();
        assert_eq!(settings, RenderSettings::default());
    }

    #[test]
    fn broken_settings_file_is_reported_with_its_path() {
        let path = std::env::temp_dir().join(format!("blockfall-broken-{}.toml", std::process::id()));
        std::fs::write(&path, "bloomPasses = 0\n").unwrap();

        let err = RenderApp::load_settings(Some(&path)).unwrap_err();
        assert!(format!("{err:#}").contains("bloomPasses") || format!("{err:#}").contains("bloom"));
        assert!(err.to_string().contains(&path.display().to_string()));

        std::fs::remove_file(&path).unwrap();
    }
}
