//! 组合键值类型

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::error::{HotkeyError, HotkeyResult};
use super::token::{Modifier, ModifierSet, Token};

/// 规范化的组合键：修饰键集合 + 一个主令牌
///
/// 不可变；相等与哈希只看结构，与按键顺序无关。
/// 序列化为字符串列表，修饰键按 `ctrl, shift, alt, super` 排在前面，主键最后。
///
/// # Examples
///
/// ```
/// use warpboard_lib::hotkey::HotkeyCombination;
///
/// let a = HotkeyCombination::parse(&["shift", "a", "ctrl"]).unwrap();
/// let b: HotkeyCombination = "Ctrl+Shift+A".parse().unwrap();
/// assert_eq!(a, b);
/// assert_eq!(a.to_strings(), vec!["ctrl", "shift", "a"]);
/// assert_eq!(a.to_string(), "Ctrl+Shift+A");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct HotkeyCombination {
    modifiers: ModifierSet,
    key: Token,
}

impl HotkeyCombination {
    /// 由修饰键和主令牌创建
    ///
    /// # Errors
    ///
    /// 主令牌是修饰键或鼠标左右键时返回 `InvalidCombination`
    pub fn new(modifiers: ModifierSet, key: Token) -> HotkeyResult<Self> {
        if key.is_modifier() {
            return Err(HotkeyError::invalid("a combination needs a non-modifier key"));
        }
        if key.is_primary_mouse() {
            return Err(HotkeyError::invalid(format!(
                "{} is reserved and cannot be a hotkey",
                key
            )));
        }
        if let Token::Unknown(raw) = &key {
            if raw.is_empty() {
                return Err(HotkeyError::invalid("empty key"));
            }
        }
        Ok(Self { modifiers, key })
    }

    /// 由任意顺序的令牌创建
    ///
    /// # Errors
    ///
    /// 没有或多于一个非修饰令牌时返回 `InvalidCombination`
    pub fn from_tokens<I>(tokens: I) -> HotkeyResult<Self>
    where
        I: IntoIterator<Item = Token>,
    {
        let mut modifiers = ModifierSet::empty();
        let mut key: Option<Token> = None;

        for token in tokens {
            match token {
                Token::Modifier(modifier) => modifiers.insert(modifier),
                other => match &key {
                    None => key = Some(other),
                    Some(existing) if *existing == other => {}
                    Some(existing) => {
                        return Err(HotkeyError::invalid(format!(
                            "more than one key: {} and {}",
                            existing, other
                        )));
                    }
                },
            }
        }

        let key = key.ok_or_else(|| HotkeyError::invalid("modifiers alone are not a hotkey"))?;
        Self::new(modifiers, key)
    }

    /// 解析持久化的字符串列表
    pub fn parse<S: AsRef<str>>(parts: &[S]) -> HotkeyResult<Self> {
        Self::from_tokens(parts.iter().map(|part| Token::parse(part.as_ref())))
    }

    pub fn modifiers(&self) -> ModifierSet {
        self.modifiers
    }

    pub fn key(&self) -> &Token {
        &self.key
    }

    /// 按规范顺序列出全部令牌
    pub fn tokens(&self) -> impl Iterator<Item = Token> + '_ {
        self.modifiers
            .iter()
            .map(Token::Modifier)
            .chain(std::iter::once(self.key.clone()))
    }

    /// 令牌总数
    pub fn len(&self) -> usize {
        self.modifiers.len() + 1
    }

    pub fn contains(&self, token: &Token) -> bool {
        match token {
            Token::Modifier(modifier) => self.modifiers.contains(*modifier),
            other => self.key == *other,
        }
    }

    /// 持久化字符串列表
    pub fn to_strings(&self) -> Vec<String> {
        self.tokens().map(|token| token.as_string()).collect()
    }
}

impl fmt::Display for HotkeyCombination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for modifier in self.modifiers.iter() {
            write!(f, "{}+", Token::Modifier(modifier))?;
        }
        write!(f, "{}", self.key)
    }
}

impl FromStr for HotkeyCombination {
    type Err = HotkeyError;

    /// 解析 `Ctrl+Shift+A` 形式
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split('+').filter(|p| !p.trim().is_empty()).collect();
        Self::parse(parts.as_slice())
    }
}

impl TryFrom<Vec<String>> for HotkeyCombination {
    type Error = HotkeyError;

    fn try_from(value: Vec<String>) -> Result<Self, Self::Error> {
        Self::parse(value.as_slice())
    }
}

impl From<HotkeyCombination> for Vec<String> {
    fn from(value: HotkeyCombination) -> Self {
        value.to_strings()
    }
}

impl From<Modifier> for ModifierSet {
    fn from(value: Modifier) -> Self {
        std::iter::once(value).collect()
    }
}
