use std::path::{Path, PathBuf};

use ash::vk;
use blockfall_crate_tools::resource::BlockfallPath;
use serde::{Deserialize, Serialize};

pub struct DefaultRendererSettings;
impl DefaultRendererSettings {
    pub const DEFAULT_SURFACE_FORMAT: vk::SurfaceFormatKHR = vk::SurfaceFormatKHR {
        format: vk::Format::B8G8R8A8_UNORM,
        color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
    };
    pub const DEPTH_FORMAT_CANDIDATES: &'static [vk::Format] = &[
        vk::Format::D32_SFLOAT,
        vk::Format::D32_SFLOAT_S8_UINT,
        vk::Format::D24_UNORM_S8_UINT,
        vk::Format::D16_UNORM,
    ];
    /// 离屏渲染使用的 HDR 格式
    pub const HDR_COLOR_FORMAT: vk::Format = vk::Format::R16G16B16A16_SFLOAT;
    /// tonemap 之后的 LDR 格式
    pub const LDR_COLOR_FORMAT: vk::Format = vk::Format::R8G8B8A8_UNORM;
    /// 可见性缓冲：每个像素存 (instance id, triangle id)
    pub const VISIBILITY_FORMAT: vk::Format = vk::Format::R32G32_UINT;
}

/// 当前帧所需的格式与尺寸
#[derive(Copy, Clone, Debug)]
pub struct FrameSettings {
    pub color_format: vk::Format,
    pub depth_format: vk::Format,
    pub frame_extent: vk::Extent2D,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Antialiasing {
    #[default]
    None,
    Multisample,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TonemapCurve {
    #[default]
    Aces,
    Reinhard,
}
impl TonemapCurve {
    /// 与 tonemap shader 中的分支编号一致
    #[inline]
    pub fn shader_index(self) -> u32 {
        match self {
            Self::Aces => 0,
            Self::Reinhard => 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TonemapSettings {
    pub exposure: f32,
    pub white_point: f32,
    pub curve: TonemapCurve,
}
impl Default for TonemapSettings {
    fn default() -> Self {
        Self {
            exposure: 1.0,
            white_point: 4.0,
            curve: TonemapCurve::Aces,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PresentModeSetting {
    Fifo,
    #[default]
    Mailbox,
    Immediate,
}
impl PresentModeSetting {
    #[inline]
    pub fn vk_present_mode(self) -> vk::PresentModeKHR {
        match self {
            Self::Fifo => vk::PresentModeKHR::FIFO,
            Self::Mailbox => vk::PresentModeKHR::MAILBOX,
            Self::Immediate => vk::PresentModeKHR::IMMEDIATE,
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("invalid render setting `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },

    #[error("failed to read render settings from {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse render settings: {0}")]
    Parse(#[from] toml::de::Error),
}

/// 每帧读取一次的渲染配置
///
/// 所有字段在 TOML 中都是可选的，缺省时使用 [`Default`] 中的值。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RenderSettings {
    pub antialiasing: Antialiasing,
    pub bloom_passes: u32,
    /// 一次性请求：下一帧丢弃所有时域资源的历史
    pub flush_temporal: bool,
    pub msaa_samples: u32,
    pub tonemap: TonemapSettings,
    /// 每帧 object buffer 的容量
    pub max_objects: u32,
    /// 0 表示不限帧
    pub frame_limit: f32,
    pub present_mode: PresentModeSetting,
    pub shader_dir: PathBuf,
}
impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            antialiasing: Antialiasing::None,
            bloom_passes: 5,
            flush_temporal: false,
            msaa_samples: 4,
            tonemap: TonemapSettings::default(),
            max_objects: 4096,
            frame_limit: 0.0,
            present_mode: PresentModeSetting::default(),
            shader_dir: BlockfallPath::shader_build_root(),
        }
    }
}
// new & init
impl RenderSettings {
    /// bloom 链的每一级尺寸减半，超过这个级数后纹理会退化到 1 像素
    pub const MAX_BLOOM_PASSES: u32 = 8;

    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let settings: Self = toml::from_str(text)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let settings = Self::from_toml_str(&text)?;
        log::info!("render settings loaded from {}", path.display());
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bloom_passes == 0 || self.bloom_passes > Self::MAX_BLOOM_PASSES {
            return Err(ConfigError::Invalid {
                key: "bloomPasses",
                reason: format!("must be in 1..={}, got {}", Self::MAX_BLOOM_PASSES, self.bloom_passes),
            });
        }
        if self.max_objects == 0 {
            return Err(ConfigError::Invalid {
                key: "maxObjects",
                reason: "must be at least 1".to_string(),
            });
        }
        if !matches!(self.msaa_samples, 2 | 4 | 8) {
            return Err(ConfigError::Invalid {
                key: "msaaSamples",
                reason: format!("must be 2, 4 or 8, got {}", self.msaa_samples),
            });
        }
        if !self.tonemap.exposure.is_finite() || self.tonemap.exposure <= 0.0 {
            return Err(ConfigError::Invalid {
                key: "tonemap.exposure",
                reason: format!("must be a positive number, got {}", self.tonemap.exposure),
            });
        }
        if !self.tonemap.white_point.is_finite() || self.tonemap.white_point <= 0.0 {
            return Err(ConfigError::Invalid {
                key: "tonemap.whitePoint",
                reason: format!("must be a positive number, got {}", self.tonemap.white_point),
            });
        }
        if !self.frame_limit.is_finite() || self.frame_limit < 0.0 {
            return Err(ConfigError::Invalid {
                key: "frameLimit",
                reason: format!("must be >= 0, got {}", self.frame_limit),
            });
        }
        Ok(())
    }
}
// tools
impl RenderSettings {
    /// 读取并清除 flushTemporal 请求，只有第一次调用返回 true
    #[inline]
    pub fn take_flush_temporal(&mut self) -> bool {
        std::mem::take(&mut self.flush_temporal)
    }

    #[inline]
    pub fn is_multisampled(&self) -> bool {
        self.antialiasing == Antialiasing::Multisample
    }

    /// 实际使用的采样数，单采样时为 TYPE_1
    pub fn sample_count(&self) -> vk::SampleCountFlags {
        if !self.is_multisampled() {
            return vk::SampleCountFlags::TYPE_1;
        }
        match self.msaa_samples {
            2 => vk::SampleCountFlags::TYPE_2,
            8 => vk::SampleCountFlags::TYPE_8,
            _ => vk::SampleCountFlags::TYPE_4,
        }
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[test]
    fn empty_toml_uses_defaults() {
        let settings = RenderSettings::from_toml_str("").unwrap();
        assert_eq!(settings.antialiasing, Antialiasing::None);
        assert_eq!(settings.bloom_passes, 5);
        assert!(!settings.flush_temporal);
        assert_eq!(settings.sample_count(), vk::SampleCountFlags::TYPE_1);
    }

    #[test]
    fn camel_case_keys_are_recognised() {
        let text = r#"
            antialiasing = "multisample"
            bloomPasses = 3
            flushTemporal = true
            msaaSamples = 8
            maxObjects = 128
            presentMode = "fifo"

            [tonemap]
            exposure = 1.5
            whitePoint = 6.0
            curve = "reinhard"
        "#;
        let settings = RenderSettings::from_toml_str(text).unwrap();
        assert!(settings.is_multisampled());
        assert_eq!(settings.bloom_passes, 3);
        assert!(settings.flush_temporal);
        assert_eq!(settings.sample_count(), vk::SampleCountFlags::TYPE_8);
        assert_eq!(settings.max_objects, 128);
        assert_eq!(settings.present_mode.vk_present_mode(), vk::PresentModeKHR::FIFO);
        assert_eq!(settings.tonemap.curve, TonemapCurve::Reinhard);
        assert_eq!(settings.tonemap.white_point, 6.0);
    }

    #[rstest]
    #[case("bloomPasses = 0", "bloomPasses")]
    #[case("bloomPasses = 9", "bloomPasses")]
    #[case("maxObjects = 0", "maxObjects")]
    #[case("msaaSamples = 3", "msaaSamples")]
    #[case("frameLimit = -1.0", "frameLimit")]
    #[case("[tonemap]\nexposure = 0.0", "tonemap.exposure")]
    fn invalid_values_are_rejected(#[case] text: &str, #[case] expected_key: &str) {
        match RenderSettings::from_toml_str(text) {
            Err(ConfigError::Invalid { key, .. }) => assert_eq!(key, expected_key),
            other => panic!("expected invalid `{expected_key}`, got {other:?}"),
        }
    }

    #[test]
    fn unknown_antialiasing_mode_is_a_parse_error() {
        assert!(matches!(
            RenderSettings::from_toml_str(r#"antialiasing = "fxaa""#),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn flush_temporal_is_consumed_once() {
        let mut settings = RenderSettings {
            flush_temporal: true,
            ..Default::default()
        };
        assert!(settings.take_flush_temporal());
        assert!(!settings.take_flush_temporal());
    }

    #[test]
    fn missing_file_reports_path() {
        let err = RenderSettings::from_file(Path::new("/definitely/not/here.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
        assert!(err.to_string().contains("here.toml"));
    }
}
