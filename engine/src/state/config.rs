//! 应用配置模块
//!
//! 提供应用程序配置的加载、保存和管理功能
//!
//! 配置文件为 JSON，每个分区都带 `#[serde(default)]`，
//! 只写了部分字段的文件会用默认值补齐。
//!
//! # 使用示例
//!
//! ```no_run
//! use warpboard_lib::state::config::{AppConfig, ConfigManager};
//!
//! // 加载配置（文件不存在时返回默认配置）
//! let mut config = ConfigManager::load("warpboard.json").unwrap();
//!
//! // 修改配置
//! config.mix.master_volume = 0.8;
//!
//! // 保存配置
//! ConfigManager::save("warpboard.json", &config).unwrap();
//! ```

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::audio::StreamKind;
use crate::audio::backend::{CHANNELS, FRAME_SIZE, SAMPLE_RATE, StreamFormat};
use crate::audio::device::{DEFAULT_EXCLUDED_FRAGMENTS, DEFAULT_LOOPBACK_FRAGMENT, DeviceFilter};
use crate::hotkey::HotkeyConfig;

/// 配置错误类型
#[derive(Error, Debug)]
pub enum ConfigError {
    /// IO 错误
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON 序列化/反序列化错误
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// 配置结果类型
pub type ConfigResult<T> = Result<T, ConfigError>;

/// 应用配置
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// 音频引擎配置
    pub audio: AudioConfig,
    /// 设备选择
    pub devices: DeviceConfig,
    /// 混音参数
    pub mix: MixConfig,
    /// 热键配置
    pub hotkeys: HotkeyConfig,
}

/// 音频引擎配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// 采样率
    pub sample_rate: u32,
    /// 声道数
    pub channels: u16,
    /// 每块帧数
    pub frame_size: usize,
    /// 监听与麦克风 FIFO 深度（块数）
    pub fifo_frames: usize,
    /// 虚拟回环设备名称片段（不区分大小写）
    pub loopback_fragment: String,
    /// 从设备列表中隐藏的名称片段
    pub excluded_fragments: Vec<String>,
    /// 麦克风无数据多久视为采集失败（毫秒）
    pub capture_stall_timeout_ms: u64,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: SAMPLE_RATE,
            channels: CHANNELS,
            frame_size: FRAME_SIZE,
            fifo_frames: 10,
            loopback_fragment: DEFAULT_LOOPBACK_FRAGMENT.to_string(),
            excluded_fragments: DEFAULT_EXCLUDED_FRAGMENTS
                .iter()
                .map(|fragment| fragment.to_string())
                .collect(),
            capture_stall_timeout_ms: 1000,
        }
    }
}

impl AudioConfig {
    /// 所有流共用的格式
    pub fn stream_format(&self) -> StreamFormat {
        StreamFormat {
            sample_rate: self.sample_rate,
            channels: self.channels,
            frame_size: self.frame_size,
        }
    }

    pub fn device_filter(&self) -> DeviceFilter {
        DeviceFilter::new(self.loopback_fragment.clone(), self.excluded_fragments.clone())
    }

    pub fn capture_stall_timeout(&self) -> Duration {
        Duration::from_millis(self.capture_stall_timeout_ms)
    }
}

/// 设备选择与开关
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// 主输出（通常为虚拟回环设备），None 表示自动选择
    pub main_output: Option<String>,
    /// 音效监听输出
    pub soundboard_monitor_output: Option<String>,
    /// 麦克风监听输出
    pub mic_monitor_output: Option<String>,
    /// 麦克风输入
    pub mic_input: Option<String>,
    /// 是否启用音效监听
    pub soundboard_monitor_enabled: bool,
    /// 是否启用麦克风监听
    pub mic_monitor_enabled: bool,
    /// 是否把麦克风混入主输出
    pub mic_included: bool,
}

impl DeviceConfig {
    /// 某个流选中的设备
    pub fn selected(&self, kind: StreamKind) -> Option<&str> {
        match kind {
            StreamKind::Main => self.main_output.as_deref(),
            StreamKind::SoundboardMonitor => self.soundboard_monitor_output.as_deref(),
            StreamKind::MicMonitor => self.mic_monitor_output.as_deref(),
            StreamKind::MicCapture => self.mic_input.as_deref(),
        }
    }

    /// 记录某个流选中的设备
    pub fn set_selected(&mut self, kind: StreamKind, device_id: Option<String>) {
        let slot = match kind {
            StreamKind::Main => &mut self.main_output,
            StreamKind::SoundboardMonitor => &mut self.soundboard_monitor_output,
            StreamKind::MicMonitor => &mut self.mic_monitor_output,
            StreamKind::MicCapture => &mut self.mic_input,
        };
        *slot = device_id;
    }
}

/// 混音参数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MixConfig {
    /// 主输出音量（0.0 - 1.0）
    pub master_volume: f32,
    /// 音效监听音量（0.0 - 1.0）
    pub soundboard_monitor_volume: f32,
    /// 麦克风监听音量（0.0 - 1.0）
    pub mic_monitor_volume: f32,
    /// 单音模式：新的声音替换正在播放的声音
    pub single_sound_mode: bool,
}

impl Default for MixConfig {
    fn default() -> Self {
        Self {
            master_volume: 1.0,
            soundboard_monitor_volume: 0.75,
            mic_monitor_volume: 0.75,
            single_sound_mode: false,
        }
    }
}

/// 配置管理器
///
/// 提供配置的加载、保存和管理功能
pub struct ConfigManager;

impl ConfigManager {
    /// 加载配置
    ///
    /// 从配置文件加载配置，如果文件不存在则返回默认配置
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<AppConfig> {
        let path = path.as_ref();

        tracing::debug!(path = %path.display(), "Loading config");

        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: AppConfig = serde_json::from_str(&content)?;
            tracing::info!(path = %path.display(), "Config loaded successfully");
            Ok(config)
        } else {
            tracing::info!("Config file not found, using defaults");
            Ok(AppConfig::default())
        }
    }

    /// 保存配置
    ///
    /// 将配置以格式化 JSON 写入文件，必要时创建目录
    pub fn save(path: impl AsRef<Path>, config: &AppConfig) -> ConfigResult<()> {
        let path = path.as_ref();

        tracing::debug!(path = %path.display(), "Saving config");

        // 确保目录存在
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let content = serde_json::to_string_pretty(config)?;
        std::fs::write(path, content)?;

        tracing::info!(path = %path.display(), "Config saved successfully");
        Ok(())
    }

    /// 重置为默认配置
    pub fn reset(path: impl AsRef<Path>) -> ConfigResult<AppConfig> {
        let config = AppConfig::default();
        Self::save(path, &config)?;
        tracing::info!("Config reset to defaults");
        Ok(config)
    }
}

/// 运行中的配置
///
/// 由 [`Soundboard`](crate::soundboard::Soundboard) 持有并在每次设备、开关或音量变化后更新；
/// 其他线程通过 ArcSwap 无锁读取当前快照，例如用于保存设置
pub struct GlobalConfig {
    config: ArcSwap<AppConfig>,
}

impl GlobalConfig {
    /// 创建新的全局配置
    pub fn new(config: AppConfig) -> Self {
        Self {
            config: ArcSwap::new(Arc::new(config)),
        }
    }

    /// 获取当前配置
    pub fn get(&self) -> Arc<AppConfig> {
        self.config.load_full()
    }

    /// 更新配置
    pub fn update(&self, config: AppConfig) {
        self.config.store(Arc::new(config));
    }

    /// 基于当前配置修改
    pub fn modify(&self, f: impl Fn(&mut AppConfig)) {
        self.config.rcu(|current| {
            let mut next = AppConfig::clone(current);
            f(&mut next);
            next
        });
    }
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self::new(AppConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hotkey::MatchPolicy;

    #[test]
    fn test_app_config_default() {
        let config = AppConfig::default();

        assert_eq!(config.audio.sample_rate, 44_100);
        assert_eq!(config.audio.channels, 2);
        assert_eq!(config.audio.frame_size, 1024);
        assert_eq!(config.audio.fifo_frames, 10);
        assert_eq!(config.audio.loopback_fragment, "CABLE Input");

        assert!(config.devices.main_output.is_none());
        assert!(!config.devices.mic_included);

        assert_eq!(config.mix.master_volume, 1.0);
        assert_eq!(config.mix.soundboard_monitor_volume, 0.75);
        assert_eq!(config.mix.mic_monitor_volume, 0.75);
        assert!(!config.mix.single_sound_mode);

        assert_eq!(config.hotkeys.quiet_interval_ms, 1200);
        assert_eq!(config.hotkeys.match_policy, MatchPolicy::Exact);
    }

    #[test]
    fn test_app_config_serialization() {
        let mut config = AppConfig::default();
        config.devices.main_output = Some("CABLE Input (VB-Audio)".to_string());

        let json = serde_json::to_string(&config).unwrap();
        let deserialized: AppConfig = serde_json::from_str(&json).unwrap();

        assert_eq!(config, deserialized);
    }

    #[test]
    fn test_stream_format_from_config() {
        let format = AudioConfig::default().stream_format();
        assert_eq!(format, StreamFormat::default());
    }

    #[test]
    fn test_device_selection_by_kind() {
        let mut devices = DeviceConfig::default();
        devices.set_selected(StreamKind::MicCapture, Some("USB Mic".to_string()));
        devices.set_selected(StreamKind::SoundboardMonitor, Some("Headphones".to_string()));

        assert_eq!(devices.selected(StreamKind::MicCapture), Some("USB Mic"));
        assert_eq!(devices.selected(StreamKind::SoundboardMonitor), Some("Headphones"));
        assert_eq!(devices.selected(StreamKind::Main), None);

        devices.set_selected(StreamKind::MicCapture, None);
        assert!(devices.mic_input.is_none());
    }

    #[test]
    fn test_global_config_update() {
        let global = GlobalConfig::default();

        let mut new_config = AppConfig::default();
        new_config.mix.master_volume = 0.5;
        global.update(new_config);
        assert_eq!(global.get().mix.master_volume, 0.5);

        global.modify(|config| config.mix.single_sound_mode = true);
        assert!(global.get().mix.single_sound_mode);
        assert_eq!(global.get().mix.master_volume, 0.5);
    }

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::Json(serde_json::from_str::<AppConfig>("invalid").unwrap_err());
        assert!(err.to_string().contains("JSON"));
    }

    #[test]
    fn test_config_partial_json() {
        // 部分 JSON 用默认值填充缺失字段
        let json = r#"{
            "mix": {
                "master_volume": 0.4
            },
            "hotkeys": {
                "match_policy": "subset"
            }
        }"#;

        let config: AppConfig = serde_json::from_str(json).unwrap();

        assert_eq!(config.mix.master_volume, 0.4);
        assert_eq!(config.mix.mic_monitor_volume, 0.75); // 默认值
        assert_eq!(config.hotkeys.match_policy, MatchPolicy::Subset);
        assert_eq!(config.hotkeys.quiet_interval_ms, 1200); // 默认值
        assert_eq!(config.audio.frame_size, 1024); // 默认值
    }

    #[test]
    fn test_load_missing_file_returns_defaults() {
        let path = std::env::temp_dir().join("warpboard-config-test-missing-file.json");
        let _ = std::fs::remove_file(&path);
        let config = ConfigManager::load(&path).unwrap();
        assert_eq!(config, AppConfig::default());
    }
}
