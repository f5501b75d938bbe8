//! 热键录制
//!
//! 录制状态机 [`HotkeyRecorder`] 只负责判定，不关心时间；
//! [`RecordingSession`] 在独立线程上驱动它，并以静默间隔作为唯一超时：
//!
//! - 每个被接受的事件都会重置静默计时
//! - Esc 立即取消
//! - 静默间隔到期时，至少有一个非修饰键则完成，否则取消

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::time::{Instant, timeout_at};
use tracing::{debug, info, warn};

use super::combination::HotkeyCombination;
use super::error::{HotkeyError, HotkeyResult};
use super::listener::{HookEvent, HookMode, HookSink, InputHook};
use super::normalizer::{InputEvent, KeyEventNormalizer, RawInputEvent};
use super::token::{ModifierSet, Token};

/// 默认静默间隔
pub const DEFAULT_QUIET_INTERVAL: Duration = Duration::from_millis(1200);

/// 录制结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordingOutcome {
    Finalized(HotkeyCombination),
    Cancelled,
}

impl RecordingOutcome {
    pub fn combination(&self) -> Option<&HotkeyCombination> {
        match self {
            RecordingOutcome::Finalized(combination) => Some(combination),
            RecordingOutcome::Cancelled => None,
        }
    }
}

/// 单个事件对录制的影响
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecorderStep {
    /// 事件被记录，静默计时应重置
    Accepted,
    /// 事件被忽略
    Ignored,
    /// 录制结束
    Finished(RecordingOutcome),
}

/// 录制状态机
#[derive(Debug, Clone, Default)]
pub struct HotkeyRecorder {
    modifiers: ModifierSet,
    key: Option<Token>,
}

impl HotkeyRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// 处理钩子交付的原始事件
    pub fn on_raw(&mut self, event: &RawInputEvent) -> RecorderStep {
        match KeyEventNormalizer::normalize(event) {
            Some(event) => self.on_event(&event),
            None => RecorderStep::Ignored,
        }
    }

    /// 处理一个规范化事件
    pub fn on_event(&mut self, event: &InputEvent) -> RecorderStep {
        let token = event.token();
        if token.is_primary_mouse() {
            return RecorderStep::Ignored;
        }

        match event {
            InputEvent::Press(_) if token.is_escape() => {
                RecorderStep::Finished(RecordingOutcome::Cancelled)
            }
            InputEvent::Press(Token::Modifier(modifier)) => {
                self.modifiers.insert(*modifier);
                RecorderStep::Accepted
            }
            InputEvent::Press(other) => {
                // 多个非修饰键时以最后一个为主键
                self.key = Some(other.clone());
                RecorderStep::Accepted
            }
            InputEvent::Release(_) => RecorderStep::Accepted,
        }
    }

    /// 静默间隔到期
    pub fn on_quiet_interval(&self) -> RecordingOutcome {
        match &self.key {
            Some(key) => match HotkeyCombination::new(self.modifiers, key.clone()) {
                Ok(combination) => RecordingOutcome::Finalized(combination),
                Err(e) => {
                    warn!("Recorded keys do not form a hotkey: {}", e);
                    RecordingOutcome::Cancelled
                }
            },
            None => RecordingOutcome::Cancelled,
        }
    }

    /// 当前已录制内容的显示文本，用于界面实时预览
    pub fn preview(&self) -> String {
        let mut parts: Vec<String> = self
            .modifiers
            .iter()
            .map(|modifier| Token::Modifier(modifier).to_string())
            .collect();
        if let Some(key) = &self.key {
            parts.push(key.to_string());
        }
        parts.join("+")
    }
}

/// 一次录制会话
///
/// 启动时以拦截模式安装钩子，录制线程在结束时先卸载钩子，再调用 `on_complete`。
pub struct RecordingSession {
    cancel: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<()>>,
    finished: Arc<AtomicBool>,
}

impl RecordingSession {
    /// 开始录制
    ///
    /// # Errors
    ///
    /// 钩子安装失败或录制线程无法启动时返回 `ListenerFailed`，此时不会调用 `on_complete`
    pub fn start<F>(
        mut hook: Box<dyn InputHook>,
        quiet_interval: Duration,
        on_complete: F,
    ) -> HotkeyResult<Self>
    where
        F: FnOnce(RecordingOutcome) + Send + 'static,
    {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .map_err(|e| HotkeyError::ListenerFailed(format!("recorder runtime: {}", e)))?;

        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let sink: HookSink = Arc::new(move |event| {
            let _ = event_tx.send(event);
        });
        hook.install(sink, HookMode::Suppress)?;

        let (cancel_tx, cancel_rx) = oneshot::channel();
        let finished = Arc::new(AtomicBool::new(false));
        let thread_finished = Arc::clone(&finished);

        let spawned = thread::Builder::new()
            .name("hotkey-recorder".to_string())
            .spawn(move || {
                let outcome =
                    runtime.block_on(drive(HotkeyRecorder::new(), event_rx, cancel_rx, quiet_interval));
                hook.uninstall();
                thread_finished.store(true, Ordering::SeqCst);
                info!(?outcome, "Hotkey recording finished");
                on_complete(outcome);
            });

        let handle = spawned
            .map_err(|e| HotkeyError::ListenerFailed(format!("recorder thread: {}", e)))?;

        info!(quiet_ms = quiet_interval.as_millis() as u64, "Hotkey recording started");
        Ok(Self {
            cancel: Some(cancel_tx),
            handle: Some(handle),
            finished,
        })
    }

    /// 从外部取消；已结束时无效
    pub fn cancel(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            let _ = cancel.send(());
        }
    }

    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::SeqCst)
    }

    /// 等待录制线程退出（`on_complete` 已返回）
    pub fn wait(mut self) {
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("Recorder thread panicked");
            }
        }
    }
}

impl Drop for RecordingSession {
    fn drop(&mut self) {
        self.cancel();
    }
}

async fn drive(
    mut recorder: HotkeyRecorder,
    mut events: mpsc::UnboundedReceiver<HookEvent>,
    mut cancel: oneshot::Receiver<()>,
    quiet_interval: Duration,
) -> RecordingOutcome {
    let mut deadline = Instant::now() + quiet_interval;

    loop {
        tokio::select! {
            _ = &mut cancel => {
                debug!("Recording cancelled externally");
                return RecordingOutcome::Cancelled;
            }
            next = timeout_at(deadline, events.recv()) => match next {
                Err(_) => return recorder.on_quiet_interval(),
                Ok(None) => {
                    warn!("Recorder hook closed its channel");
                    return RecordingOutcome::Cancelled;
                }
                Ok(Some(HookEvent::Failed(reason))) => {
                    warn!("Input hook failed while recording: {}", reason);
                    return RecordingOutcome::Cancelled;
                }
                Ok(Some(HookEvent::Input(raw))) => match recorder.on_raw(&raw) {
                    RecorderStep::Accepted => {
                        debug!(preview = %recorder.preview(), "Recorded input");
                        deadline = Instant::now() + quiet_interval;
                    }
                    RecorderStep::Ignored => {}
                    RecorderStep::Finished(outcome) => return outcome,
                },
            },
        }
    }
}
