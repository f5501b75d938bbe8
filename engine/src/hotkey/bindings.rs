//! 热键绑定
//!
//! [`BindingSet`] 记录每个目标（声音或全局动作）绑定的组合键，负责冲突检测，
//! 并与外部持久化的绑定文档互相转换。注册表由它整体生成。

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::combination::HotkeyCombination;
use super::error::{HotkeyError, HotkeyResult};
use crate::sound::{SoundCatalog, SoundId};

/// 全局动作
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GlobalAction {
    /// 停止所有声音
    StopAll,
    /// 切换麦克风是否混入主输出
    ToggleMicToMixer,
}

impl GlobalAction {
    pub const ALL: [GlobalAction; 2] = [GlobalAction::StopAll, GlobalAction::ToggleMicToMixer];

    pub fn as_str(self) -> &'static str {
        match self {
            GlobalAction::StopAll => "stop_all",
            GlobalAction::ToggleMicToMixer => "toggle_mic_to_mixer",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|action| action.as_str() == s)
    }
}

/// 可绑定热键的目标
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BindingTarget {
    Sound(SoundId),
    Global(GlobalAction),
}

impl fmt::Display for BindingTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BindingTarget::Sound(id) => write!(f, "sound '{}'", id),
            BindingTarget::Global(action) => write!(f, "global action '{}'", action.as_str()),
        }
    }
}

impl From<GlobalAction> for BindingTarget {
    fn from(value: GlobalAction) -> Self {
        BindingTarget::Global(value)
    }
}

impl From<SoundId> for BindingTarget {
    fn from(value: SoundId) -> Self {
        BindingTarget::Sound(value)
    }
}

/// 热键触发后交给 UI 线程执行的动作
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum HotkeyAction {
    PlaySound(SoundId),
    StopAll,
    ToggleMicToMixer,
}

impl From<&BindingTarget> for HotkeyAction {
    fn from(value: &BindingTarget) -> Self {
        match value {
            BindingTarget::Sound(id) => HotkeyAction::PlaySound(id.clone()),
            BindingTarget::Global(GlobalAction::StopAll) => HotkeyAction::StopAll,
            BindingTarget::Global(GlobalAction::ToggleMicToMixer) => HotkeyAction::ToggleMicToMixer,
        }
    }
}

/// 外部持久化的绑定文档
///
/// ```json
/// {
///   "sounds": { "<sound id>": ["ctrl", "a"] },
///   "global_hotkeys": { "stop_all": ["ctrl", "shift", "s"] }
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BindingsDocument {
    #[serde(default)]
    pub sounds: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub global_hotkeys: BTreeMap<String, Vec<String>>,
}

/// 目标到组合键的映射，组合键在集合内唯一
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BindingSet {
    bindings: BTreeMap<BindingTarget, HotkeyCombination>,
}

impl BindingSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// 当前持有该组合键的目标
    pub fn holder_of(&self, combination: &HotkeyCombination) -> Option<&BindingTarget> {
        self.bindings
            .iter()
            .find(|(_, bound)| *bound == combination)
            .map(|(target, _)| target)
    }

    /// 检查 `candidate` 能否分配给 `target`
    ///
    /// # Errors
    ///
    /// 被其他目标占用时返回 `CombinationInUse`
    pub fn collision_check(
        &self,
        target: &BindingTarget,
        candidate: &HotkeyCombination,
    ) -> HotkeyResult<()> {
        match self.holder_of(candidate) {
            Some(holder) if holder != target => Err(HotkeyError::CombinationInUse {
                combination: candidate.to_string(),
                holder: holder.to_string(),
            }),
            _ => Ok(()),
        }
    }

    /// 为目标分配组合键，替换其原有绑定
    ///
    /// 返回被替换的旧组合键。为目标重复分配它已有的组合键是无操作。
    ///
    /// # Errors
    ///
    /// 组合键被其他目标占用时返回 `CombinationInUse`，现有绑定不受影响
    pub fn assign(
        &mut self,
        target: BindingTarget,
        combination: HotkeyCombination,
    ) -> HotkeyResult<Option<HotkeyCombination>> {
        self.collision_check(&target, &combination)?;
        debug!(%target, hotkey = %combination, "Assigning hotkey");
        let previous = self.bindings.insert(target, combination.clone());
        Ok(previous.filter(|old| *old != combination))
    }

    /// 清除目标的绑定
    pub fn clear(&mut self, target: &BindingTarget) -> Option<HotkeyCombination> {
        self.bindings.remove(target)
    }

    /// 声音被删除时移除其绑定
    pub fn remove_sound(&mut self, id: &SoundId) -> bool {
        self.clear(&BindingTarget::Sound(id.clone())).is_some()
    }

    pub fn get(&self, target: &BindingTarget) -> Option<&HotkeyCombination> {
        self.bindings.get(target)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&BindingTarget, &HotkeyCombination)> {
        self.bindings.iter()
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// 从绑定文档加载
    ///
    /// 无效条目（无法解析、未知动作、与已加载条目冲突）记录警告后跳过。
    pub fn from_document(document: &BindingsDocument) -> Self {
        let mut set = Self::new();

        let sounds = document
            .sounds
            .iter()
            .map(|(id, parts)| (Some(BindingTarget::Sound(SoundId::new(id.as_str()))), id, parts));
        let globals = document
            .global_hotkeys
            .iter()
            .map(|(name, parts)| (GlobalAction::parse(name).map(BindingTarget::Global), name, parts));

        for (target, key, parts) in sounds.chain(globals) {
            if parts.is_empty() {
                continue;
            }
            let Some(target) = target else {
                warn!(action = %key, "Skipping unknown global action");
                continue;
            };
            let combination = match HotkeyCombination::parse(parts.as_slice()) {
                Ok(combination) => combination,
                Err(e) => {
                    warn!(%target, ?parts, "Skipping invalid hotkey: {}", e);
                    continue;
                }
            };
            if let Err(e) = set.assign(target, combination) {
                warn!("Skipping conflicting hotkey: {}", e);
            }
        }

        set
    }

    /// 导出为绑定文档
    pub fn to_document(&self) -> BindingsDocument {
        let mut document = BindingsDocument::default();
        for (target, combination) in &self.bindings {
            let parts = combination.to_strings();
            match target {
                BindingTarget::Sound(id) => {
                    document.sounds.insert(id.as_str().to_string(), parts);
                }
                BindingTarget::Global(action) => {
                    document.global_hotkeys.insert(action.as_str().to_string(), parts);
                }
            }
        }
        document
    }

    /// 生成注册表条目：只包含存在且启用的声音，以及全部全局动作
    pub fn registry_entries(
        &self,
        catalog: &dyn SoundCatalog,
    ) -> Vec<(HotkeyCombination, HotkeyAction)> {
        self.bindings
            .iter()
            .filter(|(target, _)| match target {
                BindingTarget::Sound(id) => catalog.asset(id).is_some_and(|asset| asset.enabled),
                BindingTarget::Global(_) => true,
            })
            .map(|(target, combination)| (combination.clone(), HotkeyAction::from(target)))
            .collect()
    }
}
