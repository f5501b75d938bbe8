//! 全局错误处理模块
//!
//! 提供统一的应用错误类型和用户友好的错误消息
//!
//! # 功能
//!
//! - 统一的 `AppError` 类型，聚合所有模块错误
//! - 用户友好的错误消息
//! - 错误代码用于界面处理
//! - 错误恢复建议，以及是否需要弹出提示
//!
//! # 使用示例
//!
//! ```
//! use warpboard_lib::utils::error::{AppError, ErrorCode};
//! use warpboard_lib::hotkey::HotkeyError;
//!
//! let err: AppError = HotkeyError::RecorderBusy.into();
//! assert_eq!(err.code(), ErrorCode::HotkeyRecorderBusy);
//! assert!(!err.context().requires_display);
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::audio::error::AudioError;
use crate::hotkey::HotkeyError;
use crate::state::config::ConfigError;

/// 应用错误类型
///
/// 聚合所有模块的错误类型，提供统一的错误处理接口
#[derive(Error, Debug)]
pub enum AppError {
    /// 音频错误
    #[error("Audio error: {0}")]
    Audio(#[from] AudioError),

    /// 热键错误
    #[error("Hotkey error: {0}")]
    Hotkey(#[from] HotkeyError),

    /// 配置错误
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// 内部错误
    #[error("Internal error: {0}")]
    Internal(String),
}

/// 错误代码
///
/// 用于界面识别和处理特定错误
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // 音频错误
    /// 找不到设备
    AudioDeviceNotFound,
    /// 设备无法打开或中途断开
    AudioDeviceUnavailable,
    /// 音频流错误
    AudioStreamError,
    /// 重采样失败
    AudioResampleFailed,
    /// 声音没有可用的解码数据
    AudioDecodeUnavailable,

    // 热键错误
    /// 组合键无效
    HotkeyInvalidCombination,
    /// 组合键已被占用
    HotkeyCombinationInUse,
    /// 监听器失败
    HotkeyListenerFailed,
    /// 录制进行中
    HotkeyRecorderBusy,

    // 配置错误
    /// 配置加载失败
    ConfigLoadFailed,
    /// 配置无效
    ConfigInvalid,

    // 通用错误
    /// 内部错误
    InternalError,
}

/// 错误上下文信息
///
/// 提供用户友好的错误信息和恢复建议
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorContext {
    /// 错误代码
    pub code: ErrorCode,
    /// 用户友好的错误消息
    pub message: String,
    /// 详细错误信息（用于日志）
    pub detail: Option<String>,
    /// 恢复建议
    pub recovery_hint: Option<String>,
    /// 是否需要弹窗提示用户
    pub requires_display: bool,
}

impl ErrorContext {
    /// 创建新的错误上下文
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            detail: None,
            recovery_hint: None,
            requires_display: false,
        }
    }

    /// 设置详细信息
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    /// 设置恢复建议
    pub fn with_recovery_hint(mut self, hint: impl Into<String>) -> Self {
        self.recovery_hint = Some(hint.into());
        self
    }

    /// 标记为需要弹窗提示
    pub fn displayed(mut self) -> Self {
        self.requires_display = true;
        self
    }
}

impl AppError {
    /// 获取错误代码
    pub fn code(&self) -> ErrorCode {
        match self {
            // 音频错误
            AppError::Audio(AudioError::DeviceNotFound(_)) => ErrorCode::AudioDeviceNotFound,
            AppError::Audio(AudioError::DeviceUnavailable { .. }) => {
                ErrorCode::AudioDeviceUnavailable
            }
            AppError::Audio(AudioError::ResampleFailed(_)) => ErrorCode::AudioResampleFailed,
            AppError::Audio(AudioError::DecodeUnavailable(_)) => ErrorCode::AudioDecodeUnavailable,
            AppError::Audio(_) => ErrorCode::AudioStreamError,

            // 热键错误
            AppError::Hotkey(HotkeyError::InvalidCombination(_)) => {
                ErrorCode::HotkeyInvalidCombination
            }
            AppError::Hotkey(HotkeyError::CombinationInUse { .. }) => {
                ErrorCode::HotkeyCombinationInUse
            }
            AppError::Hotkey(HotkeyError::ListenerFailed(_)) => ErrorCode::HotkeyListenerFailed,
            AppError::Hotkey(HotkeyError::RecorderBusy) => ErrorCode::HotkeyRecorderBusy,

            // 配置错误
            AppError::Config(ConfigError::Io(_)) => ErrorCode::ConfigLoadFailed,
            AppError::Config(ConfigError::Json(_)) => ErrorCode::ConfigInvalid,

            // 通用错误
            AppError::Internal(_) => ErrorCode::InternalError,
        }
    }

    /// 获取用户友好的错误消息
    ///
    /// 返回适合直接显示给用户的错误消息
    pub fn user_message(&self) -> String {
        match self {
            // 音频错误
            AppError::Audio(AudioError::DeviceNotFound(device)) => {
                format!("Audio device '{}' was not found", device)
            }
            AppError::Audio(AudioError::DeviceUnavailable { device, .. }) => {
                format!("Could not use audio device '{}'", device)
            }
            AppError::Audio(AudioError::DecodeUnavailable(id)) => {
                format!("Sound '{}' has no playable audio", id)
            }
            AppError::Audio(_) => "Audio playback error".to_string(),

            // 热键错误
            AppError::Hotkey(HotkeyError::InvalidCombination(reason)) => {
                format!("Invalid hotkey: {}", reason)
            }
            AppError::Hotkey(HotkeyError::CombinationInUse {
                combination,
                holder,
            }) => {
                format!("Hotkey {} is already used by {}", combination, holder)
            }
            AppError::Hotkey(HotkeyError::ListenerFailed(_)) => {
                "Global hotkeys stopped working".to_string()
            }
            AppError::Hotkey(HotkeyError::RecorderBusy) => {
                "A hotkey is already being recorded".to_string()
            }

            // 配置错误
            AppError::Config(ConfigError::Io(_)) => "Could not read the settings file".to_string(),
            AppError::Config(ConfigError::Json(_)) => "The settings file is malformed".to_string(),

            // 通用错误
            AppError::Internal(msg) => format!("Internal error: {}", msg),
        }
    }

    /// 获取完整的错误上下文
    pub fn context(&self) -> ErrorContext {
        let mut ctx = ErrorContext::new(self.code(), self.user_message()).with_detail(self.to_string());

        // 添加恢复建议
        ctx.recovery_hint = self.recovery_hint();

        if self.requires_display() {
            ctx = ctx.displayed();
        }

        ctx
    }

    /// 获取恢复建议
    pub fn recovery_hint(&self) -> Option<String> {
        match self {
            AppError::Audio(AudioError::DeviceNotFound(_)) => {
                Some("Refresh the device list and pick another device".to_string())
            }
            AppError::Audio(AudioError::DeviceUnavailable { .. }) => Some(
                "Check that the device is connected and not in exclusive use, then select it again"
                    .to_string(),
            ),
            AppError::Hotkey(HotkeyError::CombinationInUse { .. }) => {
                Some("Clear the other binding first or record a different hotkey".to_string())
            }
            AppError::Hotkey(HotkeyError::ListenerFailed(_)) => {
                Some("Restart the hotkey listener".to_string())
            }
            _ => None,
        }
    }

    /// 是否需要弹窗提示
    ///
    /// 只有设备不可用和组合键冲突需要打断用户
    pub fn requires_display(&self) -> bool {
        matches!(
            self,
            AppError::Audio(AudioError::DeviceNotFound(_))
                | AppError::Audio(AudioError::DeviceUnavailable { .. })
                | AppError::Hotkey(HotkeyError::CombinationInUse { .. })
        )
    }

    /// 检查是否是设备错误
    pub fn is_device_error(&self) -> bool {
        matches!(self, AppError::Audio(e) if e.is_device_failure())
    }
}

/// 应用结果类型
pub type AppResult<T> = Result<T, AppError>;

/// 将任意错误转换为内部错误
impl From<String> for AppError {
    fn from(msg: String) -> Self {
        AppError::Internal(msg)
    }
}

impl From<&str> for AppError {
    fn from(msg: &str) -> Self {
        AppError::Internal(msg.to_string())
    }
}
