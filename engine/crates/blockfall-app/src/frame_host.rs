use ash::vk;
use blockfall_render_interface::render_settings::RenderSettings;
use blockfall_renderer::{
    passes::ui_overlay::UiOverlay,
    platform::camera::Camera,
    scene::{asset_container::AssetContainer, object_record::ObjectRecord},
};
use raw_window_handle::{RawDisplayHandle, RawWindowHandle};

/// 一次事件轮询的结果
#[derive(Debug, Default)]
pub struct HostEvents {
    pub quit: bool,
    /// 窗口尺寸变化之后的大小
    pub resized: Option<vk::Extent2D>,
    /// 运行时修改的渲染配置
    pub settings: Option<RenderSettings>,
}

/// 窗口系统与游戏逻辑
pub trait FrameHost {
    fn raw_display_handle(&self) -> RawDisplayHandle;

    fn raw_window_handle(&self) -> RawWindowHandle;

    fn window_extent(&self) -> vk::Extent2D;

    /// 在渲染器创建时调用一次
    fn load_assets(&mut self) -> anyhow::Result<AssetContainer>;

    fn pump_events(&mut self) -> HostEvents;

    /// 推进游戏状态，只在需要渲染的帧调用
    fn update(&mut self, delta_time_s: f32);

    fn camera(&self) -> &Camera;

    fn objects(&self) -> &[ObjectRecord];

    fn overlay(&self) -> Option<&dyn UiOverlay> {
        None
    }
}
