//! 热键配置模块
//!
//! 定义录制与匹配相关的配置和默认值

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::recorder::DEFAULT_QUIET_INTERVAL;
use super::registry::MatchPolicy;

/// 热键配置
///
/// # Examples
///
/// ```
/// use warpboard_lib::hotkey::{HotkeyConfig, MatchPolicy};
///
/// // 使用默认配置
/// let config = HotkeyConfig::default();
/// assert_eq!(config.quiet_interval_ms, 1200);
/// assert_eq!(config.match_policy, MatchPolicy::Exact);
///
/// // 自定义配置
/// let config = HotkeyConfig::default().with_match_policy(MatchPolicy::Subset);
/// assert_eq!(config.match_policy, MatchPolicy::Subset);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HotkeyConfig {
    /// 录制静默间隔（毫秒）
    ///
    /// 最后一次按键后经过该时间即结束录制
    /// 默认值: 1200
    pub quiet_interval_ms: u64,

    /// 组合键匹配方式
    ///
    /// 默认值: `exact`
    pub match_policy: MatchPolicy,
}

impl HotkeyConfig {
    /// 设置静默间隔
    pub fn with_quiet_interval(mut self, interval: Duration) -> Self {
        self.quiet_interval_ms = interval.as_millis() as u64;
        self
    }

    /// 设置匹配方式
    pub fn with_match_policy(mut self, policy: MatchPolicy) -> Self {
        self.match_policy = policy;
        self
    }

    /// 静默间隔
    ///
    /// 为 0 时回退到默认值
    pub fn quiet_interval(&self) -> Duration {
        if self.quiet_interval_ms == 0 {
            DEFAULT_QUIET_INTERVAL
        } else {
            Duration::from_millis(self.quiet_interval_ms)
        }
    }
}

impl Default for HotkeyConfig {
    fn default() -> Self {
        Self {
            quiet_interval_ms: DEFAULT_QUIET_INTERVAL.as_millis() as u64,
            match_policy: MatchPolicy::default(),
        }
    }
}
