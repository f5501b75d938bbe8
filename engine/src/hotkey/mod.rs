//! 热键管理模块
//!
//! 提供全局热键的录制、绑定、匹配和事件分发功能
//!
//! # 功能
//!
//! - 组合键：修饰键集合 + 一个主键，与按键顺序无关
//! - 注册表：按下/松开状态机，按住期间只触发一次
//! - 录制：静默间隔结束录制，Esc 取消
//! - 监听：钩子线程上匹配，动作经队列交给 UI 线程执行
//!
//! # 使用方法
//!
//! ```ignore
//! use warpboard_lib::hotkey::{HotkeyListener, MatchPolicy};
//!
//! let mut listener = HotkeyListener::new(MatchPolicy::Exact, sink);
//! listener.register_all(bindings.registry_entries(&catalog))?;
//! listener.start(Box::new(platform_hook))?;
//! ```

mod bindings;
mod combination;
mod config;
mod error;
mod listener;
mod normalizer;
mod recorder;
mod registry;
mod token;

pub use bindings::{BindingSet, BindingTarget, BindingsDocument, GlobalAction, HotkeyAction};
pub use combination::HotkeyCombination;
pub use config::HotkeyConfig;
pub use error::{HotkeyError, HotkeyResult};
pub use listener::{
    HookEvent, HookMode, HookSink, HotkeyListener, InputHook, ListenerEvent, ListenerGate,
    ListenerSink,
};
pub use normalizer::{InputEvent, KeyEventNormalizer, RawInputEvent, RawKey};
pub use recorder::{
    DEFAULT_QUIET_INTERVAL, HotkeyRecorder, RecorderStep, RecordingOutcome, RecordingSession,
};
pub use registry::{HotkeyRegistry, MatchPolicy};
pub use token::{Modifier, ModifierSet, MouseButton, NamedKey, Token};
