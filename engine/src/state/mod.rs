//! 状态管理模块
//!
//! 提供应用程序配置的持久化与共享
//!
//! # 模块结构
//!
//! - `config` - 配置定义、加载/保存和无锁共享

pub mod config;

pub use config::{
    AppConfig, AudioConfig, ConfigError, ConfigManager, ConfigResult, DeviceConfig, GlobalConfig,
    MixConfig,
};
