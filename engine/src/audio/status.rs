//! 播放状态快照
//!
//! 主输出回调在每个音频块之后写入一次快照，UI 线程定期读取。
//! 快照由独立的互斥锁保护，写入只是一次短拷贝，不会与混音锁或麦克风缓冲区锁竞争。

use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;

/// "Now Playing" 摘要中最多直接列出的名称数
const SUMMARY_NAME_LIMIT: usize = 2;

/// 某一时刻的播放状态
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PlaybackStatus {
    /// 正在播放的声音名称
    pub names: Vec<String>,
    /// 麦克风是否混入主输出
    pub mic_active: bool,
}

impl PlaybackStatus {
    /// 是否没有任何声音在播放
    pub fn is_idle(&self) -> bool {
        self.names.is_empty() && !self.mic_active
    }

    /// 单行摘要
    ///
    /// - 最多列出前两个名称，其余以 `& N more` 表示
    /// - 只有麦克风时为 `Microphone`
    /// - 什么都没有时为 `None`
    pub fn summary(&self) -> String {
        if self.names.is_empty() {
            return if self.mic_active {
                "Microphone".to_string()
            } else {
                "None".to_string()
            };
        }

        let shown = self.names[..self.names.len().min(SUMMARY_NAME_LIMIT)].join(", ");
        match self.names.len().saturating_sub(SUMMARY_NAME_LIMIT) {
            0 => shown,
            rest => format!("{shown} & {rest} more"),
        }
    }
}

/// 状态快照的共享持有者
///
/// 由 `Arc` 显式传递给写入方（主输出回调）和读取方（UI）。
#[derive(Default)]
pub struct StatusBoard {
    current: Mutex<PlaybackStatus>,
}

impl StatusBoard {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// 发布新快照
    ///
    /// 复用已有的字符串缓冲区，名称未变化时不分配内存。
    pub fn publish(&self, names: &[Arc<str>], mic_active: bool) {
        let mut current = self.current.lock();
        current.mic_active = mic_active;

        let unchanged = current.names.len() == names.len()
            && current
                .names
                .iter()
                .zip(names)
                .all(|(held, name)| held.as_str() == &**name);
        if !unchanged {
            current.names.clear();
            current.names.extend(names.iter().map(|name| name.to_string()));
        }
    }

    /// 重置为空闲状态
    pub fn reset(&self) {
        let mut current = self.current.lock();
        current.names.clear();
        current.mic_active = false;
    }

    /// 读取当前快照
    pub fn snapshot(&self) -> PlaybackStatus {
        self.current.lock().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(names: &[&str], mic_active: bool) -> PlaybackStatus {
        PlaybackStatus {
            names: names.iter().map(|n| n.to_string()).collect(),
            mic_active,
        }
    }

    #[test]
    fn test_summary_variants() {
        assert_eq!(status(&[], false).summary(), "None");
        assert_eq!(status(&[], true).summary(), "Microphone");
        assert_eq!(status(&["Airhorn"], true).summary(), "Airhorn");
        assert_eq!(status(&["Airhorn", "Bell"], false).summary(), "Airhorn, Bell");
        assert_eq!(
            status(&["Airhorn", "Bell", "Clap", "Drum"], false).summary(),
            "Airhorn, Bell & 2 more"
        );
    }

    #[test]
    fn test_publish_and_reset() {
        let board = StatusBoard::new();
        board.publish(&[Arc::from("Airhorn"), Arc::from("Bell")], true);

        let snapshot = board.snapshot();
        assert_eq!(snapshot.names, vec!["Airhorn", "Bell"]);
        assert!(snapshot.mic_active);

        board.publish(&[Arc::from("Bell")], false);
        assert_eq!(board.snapshot(), status(&["Bell"], false));

        board.reset();
        assert!(board.snapshot().is_idle());
    }
}
