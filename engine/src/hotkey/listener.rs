//! 全局热键监听
//!
//! 操作系统级的键盘/鼠标钩子由外部通过 [`InputHook`] 提供。
//! [`HotkeyListener`] 把钩子线程上的原始事件规范化后交给注册表匹配，
//! 触发的动作通过 [`ListenerSink`] 发往 UI 线程执行，监听线程本身从不调用 UI。

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, error, info};

use super::bindings::HotkeyAction;
use super::combination::HotkeyCombination;
use super::error::{HotkeyError, HotkeyResult};
use super::normalizer::{KeyEventNormalizer, RawInputEvent};
use super::registry::{HotkeyRegistry, MatchPolicy};

/// 钩子工作模式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookMode {
    /// 只观察，事件继续传给其他程序
    Observe,
    /// 拦截事件（录制热键时使用）
    Suppress,
}

/// 钩子交付的事件
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HookEvent {
    Input(RawInputEvent),
    /// 钩子线程异常终止
    Failed(String),
}

/// 钩子事件的接收方，在钩子线程上调用
pub type HookSink = Arc<dyn Fn(HookEvent) + Send + Sync>;

/// 操作系统级输入钩子
pub trait InputHook: Send {
    /// 安装钩子并开始向 `sink` 交付事件
    fn install(&mut self, sink: HookSink, mode: HookMode) -> HotkeyResult<()>;

    /// 卸载钩子；返回后不再交付事件
    fn uninstall(&mut self);
}

/// 监听器发往 UI 线程的通知
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListenerEvent {
    /// 热键触发
    Action(HotkeyAction),
    /// 钩子失败，监听已停止
    Stopped(String),
}

/// 监听器通知的接收方
pub type ListenerSink = Arc<dyn Fn(ListenerEvent) + Send + Sync>;

struct ListenerShared {
    registry: HotkeyRegistry<HotkeyAction>,
    /// 暂停期间丢弃所有事件
    paused: bool,
    failed: bool,
}

/// 暂停/恢复事件处理的句柄，可在其他线程使用
///
/// 录制热键期间用它关闭匹配，录制结束后在录制线程上重新打开。
#[derive(Clone)]
pub struct ListenerGate {
    shared: Arc<Mutex<ListenerShared>>,
}

impl ListenerGate {
    pub fn close(&self) {
        let mut shared = self.shared.lock();
        shared.paused = true;
        shared.registry.reset_pressed();
    }

    pub fn open(&self) {
        let mut shared = self.shared.lock();
        shared.paused = false;
        shared.registry.reset_pressed();
    }

    pub fn is_open(&self) -> bool {
        !self.shared.lock().paused
    }
}

/// 钩子 → 规范化 → 注册表 → UI 队列
pub struct HotkeyListener {
    shared: Arc<Mutex<ListenerShared>>,
    events: ListenerSink,
    hook: Option<Box<dyn InputHook>>,
    installed: bool,
}

impl HotkeyListener {
    pub fn new(policy: MatchPolicy, events: ListenerSink) -> Self {
        Self {
            shared: Arc::new(Mutex::new(ListenerShared {
                registry: HotkeyRegistry::new(policy),
                paused: false,
                failed: false,
            })),
            events,
            hook: None,
            installed: false,
        }
    }

    pub fn gate(&self) -> ListenerGate {
        ListenerGate {
            shared: Arc::clone(&self.shared),
        }
    }

    pub fn is_running(&self) -> bool {
        self.installed
    }

    pub fn policy(&self) -> MatchPolicy {
        self.shared.lock().registry.policy()
    }

    pub fn set_policy(&self, policy: MatchPolicy) {
        self.shared.lock().registry.set_policy(policy);
    }

    /// 已登记的组合键数量
    pub fn len(&self) -> usize {
        self.shared.lock().registry.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 安装钩子开始监听，替换之前的钩子
    ///
    /// # Errors
    ///
    /// 钩子安装失败时返回 `ListenerFailed`
    pub fn start(&mut self, hook: Box<dyn InputHook>) -> HotkeyResult<()> {
        self.stop();
        self.hook = Some(hook);
        self.install()
    }

    /// 卸载钩子并清空按下集合；未运行时安全
    pub fn stop(&mut self) {
        self.uninstall();
        self.hook = None;
    }

    /// 整体替换注册表条目
    ///
    /// 替换期间卸载钩子，按下集合清空，完成后按原状态恢复。
    ///
    /// # Errors
    ///
    /// 条目中有重复组合键时返回 `CombinationInUse`（注册表保持不变）；
    /// 恢复钩子失败时返回 `ListenerFailed`
    pub fn register_all<I>(&mut self, bindings: I) -> HotkeyResult<()>
    where
        I: IntoIterator<Item = (HotkeyCombination, HotkeyAction)>,
    {
        let was_running = self.installed;
        self.uninstall();

        let result = self.shared.lock().registry.register_all(bindings);

        if was_running {
            self.install()?;
        }
        result
    }

    fn install(&mut self) -> HotkeyResult<()> {
        let Some(hook) = self.hook.as_mut() else {
            return Ok(());
        };

        {
            let mut shared = self.shared.lock();
            shared.failed = false;
            shared.registry.reset_pressed();
        }

        let sink = make_sink(Arc::clone(&self.shared), Arc::clone(&self.events));
        match hook.install(sink, HookMode::Observe) {
            Ok(()) => {
                self.installed = true;
                info!("Hotkey listener started");
                Ok(())
            }
            Err(e) => {
                error!("Failed to install input hook: {}", e);
                self.hook = None;
                Err(match e {
                    HotkeyError::ListenerFailed(_) => e,
                    other => HotkeyError::ListenerFailed(other.to_string()),
                })
            }
        }
    }

    fn uninstall(&mut self) {
        if self.installed {
            if let Some(hook) = self.hook.as_mut() {
                hook.uninstall();
            }
            self.installed = false;
            info!("Hotkey listener stopped");
        }
        self.shared.lock().registry.reset_pressed();
    }
}

impl Drop for HotkeyListener {
    fn drop(&mut self) {
        self.stop();
    }
}

fn make_sink(shared: Arc<Mutex<ListenerShared>>, events: ListenerSink) -> HookSink {
    Arc::new(move |event: HookEvent| {
        let actions = {
            let mut shared = shared.lock();
            if shared.failed {
                return;
            }
            match event {
                HookEvent::Failed(reason) => {
                    shared.failed = true;
                    shared.registry.reset_pressed();
                    drop(shared);
                    error!("Input hook failed: {}", reason);
                    events(ListenerEvent::Stopped(reason));
                    return;
                }
                HookEvent::Input(raw) => {
                    if shared.paused {
                        return;
                    }
                    match KeyEventNormalizer::normalize(&raw) {
                        Some(input) => shared.registry.on_event(&input),
                        None => {
                            debug!(?raw, "Ignoring unidentifiable input");
                            return;
                        }
                    }
                }
            }
        };

        for action in actions {
            events(ListenerEvent::Action(action));
        }
    })
}
