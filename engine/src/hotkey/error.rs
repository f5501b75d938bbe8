//! 热键相关错误类型

use thiserror::Error;

/// 热键相关错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum HotkeyError {
    /// 无效的组合键（没有主键、主键多于一个或主键为鼠标左右键）
    #[error("Invalid hotkey combination: {0}")]
    InvalidCombination(String),

    /// 组合键已被其他目标占用
    #[error("Hotkey '{combination}' is already assigned to {holder}")]
    CombinationInUse { combination: String, holder: String },

    /// 输入钩子安装失败或运行中断
    #[error("Hotkey listener failed: {0}")]
    ListenerFailed(String),

    /// 已有录制会话在进行
    #[error("A hotkey recording is already in progress")]
    RecorderBusy,
}

impl HotkeyError {
    pub fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidCombination(reason.into())
    }
}

/// 热键模块的结果类型
pub type HotkeyResult<T> = Result<T, HotkeyError>;
