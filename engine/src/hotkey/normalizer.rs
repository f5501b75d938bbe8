//! 原始输入事件规范化
//!
//! 输入钩子交付平台相关的按键描述（名称、字符、虚拟键码），
//! 这里统一转换为 [`Token`]：
//!
//! - 左右修饰键合并为同一个修饰键
//! - 字母数字键转为小写字符，有虚拟键码时由键码决定，与当时的修饰键状态无关
//! - 已知名称的按键转为 [`NamedKey`]
//! - 其余按键按虚拟键码回退为 [`Token::RawCode`]，保证每个物理按键都有唯一令牌

use super::token::{Modifier, MouseButton, NamedKey, Token};

/// 钩子交付的原始按键
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawKey {
    /// 平台按键名称，如 `ctrl_l`、`page_up`、`esc`
    pub name: Option<String>,
    /// 按键产生的字符
    pub char: Option<char>,
    /// 虚拟键码（Windows 约定：A-Z、0-9 与其 ASCII 大写字符相同）
    pub vk: Option<u32>,
}

impl RawKey {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    pub fn char(c: char) -> Self {
        Self {
            char: Some(c),
            ..Self::default()
        }
    }

    pub fn vk(code: u32) -> Self {
        Self {
            vk: Some(code),
            ..Self::default()
        }
    }

    pub fn with_vk(mut self, code: u32) -> Self {
        self.vk = Some(code);
        self
    }
}

/// 钩子交付的原始输入事件
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawInputEvent {
    KeyPress(RawKey),
    KeyRelease(RawKey),
    ButtonPress(MouseButton),
    ButtonRelease(MouseButton),
}

/// 规范化后的输入事件
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputEvent {
    Press(Token),
    Release(Token),
}

impl InputEvent {
    pub fn token(&self) -> &Token {
        match self {
            InputEvent::Press(token) | InputEvent::Release(token) => token,
        }
    }

    pub fn is_press(&self) -> bool {
        matches!(self, InputEvent::Press(_))
    }
}

/// 原始事件到规范令牌的映射
#[derive(Debug, Clone, Copy, Default)]
pub struct KeyEventNormalizer;

impl KeyEventNormalizer {
    /// 规范化一个事件；无法识别的按键返回 `None`
    pub fn normalize(event: &RawInputEvent) -> Option<InputEvent> {
        match event {
            RawInputEvent::KeyPress(key) => Self::normalize_key(key).map(InputEvent::Press),
            RawInputEvent::KeyRelease(key) => Self::normalize_key(key).map(InputEvent::Release),
            RawInputEvent::ButtonPress(button) => Some(InputEvent::Press(Token::Mouse(*button))),
            RawInputEvent::ButtonRelease(button) => Some(InputEvent::Release(Token::Mouse(*button))),
        }
    }

    /// 规范化一个按键
    pub fn normalize_key(key: &RawKey) -> Option<Token> {
        if let Some(name) = key.name.as_deref() {
            let lower = name.to_lowercase();
            if let Some(modifier) = modifier_from_name(&lower) {
                return Some(Token::Modifier(modifier));
            }
            if let Some(named) = NamedKey::parse(&lower) {
                return Some(Token::Named(named));
            }
        }

        // 有虚拟键码时只看键码：按住修饰键时字符会变（Ctrl+A 交付 '\x01'），
        // 键码不变，按下与松开才能得到同一个令牌
        match (key.vk, key.char) {
            (Some(vk), _) => Some(token_from_vk(vk)),
            (None, Some(c)) if c.is_alphanumeric() => Some(Token::character(c)),
            // Printable but without a key code (synthetic input)
            (None, Some(c)) if !c.is_control() && !c.is_whitespace() => Some(Token::Character(c)),
            _ => None,
        }
    }
}

/// A-Z 与 0-9 的键码即其 ASCII 大写字符
fn token_from_vk(vk: u32) -> Token {
    match char::from_u32(vk) {
        Some(c) if c.is_ascii_uppercase() || c.is_ascii_digit() => Token::character(c),
        _ => Token::RawCode(vk),
    }
}

fn modifier_from_name(lower: &str) -> Option<Modifier> {
    let base = lower
        .strip_suffix("_l")
        .or_else(|| lower.strip_suffix("_r"))
        .or_else(|| lower.strip_suffix("left"))
        .or_else(|| lower.strip_suffix("right"))
        .unwrap_or(lower)
        .trim_end_matches(['_', ' ']);

    match base {
        "ctrl" | "control" => Some(Modifier::Ctrl),
        "shift" => Some(Modifier::Shift),
        "alt" | "alt_gr" | "altgr" | "option" => Some(Modifier::Alt),
        "cmd" | "super" | "win" | "meta" | "command" => Some(Modifier::Super),
        _ => None,
    }
}
