//! 热键匹配自动机
//!
//! 每个组合键有两个状态：`Released` 和 `Armed`。
//!
//! - `Released → Armed`：当前按下的令牌集合满足组合键时触发一次动作
//! - `Armed → Released`：组合键中任意一个令牌被松开
//!
//! 按住按键产生的自动重复事件不会改变按下集合，因此不会重复触发。
//! 条目只能整体重建（[`HotkeyRegistry::register_all`]），不做增量修改。

use std::collections::{BTreeSet, HashSet};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::combination::HotkeyCombination;
use super::error::{HotkeyError, HotkeyResult};
use super::normalizer::InputEvent;
use super::token::Token;

/// 按下集合与组合键的匹配方式
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchPolicy {
    /// 按下集合必须与组合键完全相同
    ///
    /// 同时按住 Ctrl+Shift+A 时不会触发 Ctrl+A。
    #[default]
    Exact,
    /// 组合键是按下集合的子集即可，容忍额外按住的按键
    ///
    /// 同时按住 Ctrl+Shift+A 时 Ctrl+A 与 Ctrl+Shift+A 都会触发。
    Subset,
}

impl MatchPolicy {
    fn is_satisfied(self, combination: &HotkeyCombination, pressed: &BTreeSet<Token>) -> bool {
        let all_held = combination.tokens().all(|token| pressed.contains(&token));
        match self {
            MatchPolicy::Exact => all_held && pressed.len() == combination.len(),
            MatchPolicy::Subset => all_held,
        }
    }
}

struct Entry<A> {
    combination: HotkeyCombination,
    action: A,
    armed: bool,
}

/// 组合键到动作的映射，以及实时按下集合
pub struct HotkeyRegistry<A> {
    entries: Vec<Entry<A>>,
    pressed: BTreeSet<Token>,
    policy: MatchPolicy,
}

impl<A: Clone> HotkeyRegistry<A> {
    pub fn new(policy: MatchPolicy) -> Self {
        Self {
            entries: Vec::new(),
            pressed: BTreeSet::new(),
            policy,
        }
    }

    pub fn policy(&self) -> MatchPolicy {
        self.policy
    }

    pub fn set_policy(&mut self, policy: MatchPolicy) {
        self.policy = policy;
        self.reset_pressed();
    }

    /// 整体替换全部条目
    ///
    /// 同时清空按下集合，所有条目回到 `Released`。
    ///
    /// # Errors
    ///
    /// 出现重复组合键时返回 `CombinationInUse`，原有条目保持不变
    pub fn register_all<I>(&mut self, bindings: I) -> HotkeyResult<()>
    where
        I: IntoIterator<Item = (HotkeyCombination, A)>,
    {
        let mut seen = HashSet::new();
        let mut entries = Vec::new();

        for (combination, action) in bindings {
            if !seen.insert(combination.clone()) {
                return Err(HotkeyError::CombinationInUse {
                    holder: "another binding".to_string(),
                    combination: combination.to_string(),
                });
            }
            entries.push(Entry {
                combination,
                action,
                armed: false,
            });
        }

        info!(count = entries.len(), policy = ?self.policy, "Hotkey registry rebuilt");
        self.entries = entries;
        self.pressed.clear();
        Ok(())
    }

    /// 检查候选组合键是否已登记
    ///
    /// # Errors
    ///
    /// 已存在时返回 `CombinationInUse`
    pub fn collision_check(&self, candidate: &HotkeyCombination) -> HotkeyResult<()> {
        if self.entries.iter().any(|entry| &entry.combination == candidate) {
            return Err(HotkeyError::CombinationInUse {
                combination: candidate.to_string(),
                holder: "another binding".to_string(),
            });
        }
        Ok(())
    }

    /// 处理一个规范化事件，返回被触发的动作
    pub fn on_event(&mut self, event: &InputEvent) -> Vec<A> {
        match event {
            InputEvent::Press(token) => self.press(token.clone()),
            InputEvent::Release(token) => {
                self.release(token);
                Vec::new()
            }
        }
    }

    /// 按下一个令牌
    pub fn press(&mut self, token: Token) -> Vec<A> {
        if token.is_primary_mouse() {
            return Vec::new();
        }
        self.pressed.insert(token);

        let policy = self.policy;
        let pressed = &self.pressed;
        let mut fired = Vec::new();
        for entry in self.entries.iter_mut().filter(|entry| !entry.armed) {
            if policy.is_satisfied(&entry.combination, pressed) {
                entry.armed = true;
                debug!(hotkey = %entry.combination, "Hotkey fired");
                fired.push(entry.action.clone());
            }
        }
        fired
    }

    /// 松开一个令牌，解除包含它的组合键
    pub fn release(&mut self, token: &Token) {
        self.pressed.remove(token);
        for entry in self.entries.iter_mut().filter(|entry| entry.armed) {
            if entry.combination.contains(token) {
                entry.armed = false;
            }
        }
    }

    /// 清空按下集合并解除所有组合键
    pub fn reset_pressed(&mut self) {
        self.pressed.clear();
        for entry in &mut self.entries {
            entry.armed = false;
        }
    }

    pub fn pressed(&self) -> &BTreeSet<Token> {
        &self.pressed
    }

    pub fn is_armed(&self, combination: &HotkeyCombination) -> bool {
        self.entries
            .iter()
            .any(|entry| entry.armed && &entry.combination == combination)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn combinations(&self) -> impl Iterator<Item = &HotkeyCombination> {
        self.entries.iter().map(|entry| &entry.combination)
    }
}
