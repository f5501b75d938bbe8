//! 热键令牌
//!
//! 组合键由一组修饰键和一个主令牌组成。令牌是带标签的枚举，
//! 结构相等、可排序，并且有稳定的字符串形式用于持久化：
//!
//! | 令牌 | 字符串 | 显示 |
//! |------|--------|------|
//! | `Modifier(Ctrl)` | `ctrl` | `Ctrl` |
//! | `Character('a')` | `a` | `A` |
//! | `Named(PageUp)` | `page_up` | `Page Up` |
//! | `Mouse(X1)` | `mouse_x1` | `Mouse X1` |
//! | `RawCode(186)` | `<vk_186>` | `VK-186` |
//!
//! 解析不区分大小写，并接受旧文档中的别名（`cmd`、`win`、`esc`、`return` 等）。
//! 无法识别的字符串保留为 [`Token::Unknown`]，保证向前兼容。

use std::fmt;

/// 修饰键，声明顺序即规范顺序
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Modifier {
    Ctrl,
    Shift,
    Alt,
    Super,
}

impl Modifier {
    pub const ALL: [Modifier; 4] = [Modifier::Ctrl, Modifier::Shift, Modifier::Alt, Modifier::Super];

    pub fn as_str(self) -> &'static str {
        match self {
            Modifier::Ctrl => "ctrl",
            Modifier::Shift => "shift",
            Modifier::Alt => "alt",
            Modifier::Super => "super",
        }
    }

    fn label(self) -> &'static str {
        match self {
            Modifier::Ctrl => "Ctrl",
            Modifier::Shift => "Shift",
            Modifier::Alt => "Alt",
            Modifier::Super => "Super",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "ctrl" | "control" => Some(Modifier::Ctrl),
            "shift" => Some(Modifier::Shift),
            "alt" | "option" | "alt_gr" => Some(Modifier::Alt),
            "super" | "cmd" | "command" | "win" | "meta" => Some(Modifier::Super),
            _ => None,
        }
    }

    fn bit(self) -> u8 {
        1 << (self as u8)
    }
}

/// 修饰键集合
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModifierSet(u8);

impl ModifierSet {
    pub const fn empty() -> Self {
        Self(0)
    }

    pub fn insert(&mut self, modifier: Modifier) {
        self.0 |= modifier.bit();
    }

    pub fn remove(&mut self, modifier: Modifier) {
        self.0 &= !modifier.bit();
    }

    pub fn contains(&self, modifier: Modifier) -> bool {
        self.0 & modifier.bit() != 0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn len(&self) -> usize {
        self.0.count_ones() as usize
    }

    /// 按规范顺序遍历
    pub fn iter(&self) -> impl Iterator<Item = Modifier> + '_ {
        Modifier::ALL.into_iter().filter(move |m| self.contains(*m))
    }
}

impl FromIterator<Modifier> for ModifierSet {
    fn from_iter<I: IntoIterator<Item = Modifier>>(iter: I) -> Self {
        let mut set = Self::empty();
        for modifier in iter {
            set.insert(modifier);
        }
        set
    }
}

/// 有固定名称的非字符按键
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NamedKey {
    Space,
    Enter,
    Tab,
    Escape,
    Backspace,
    Delete,
    Insert,
    Home,
    End,
    PageUp,
    PageDown,
    Up,
    Down,
    Left,
    Right,
    /// F1 - F24
    F(u8),
    CapsLock,
    NumLock,
    ScrollLock,
    PrintScreen,
    Pause,
    Menu,
}

impl NamedKey {
    const SIMPLE: [(NamedKey, &'static str, &'static str); 21] = [
        (NamedKey::Space, "space", "Space"),
        (NamedKey::Enter, "enter", "Enter"),
        (NamedKey::Tab, "tab", "Tab"),
        (NamedKey::Escape, "esc", "Esc"),
        (NamedKey::Backspace, "backspace", "Backspace"),
        (NamedKey::Delete, "delete", "Delete"),
        (NamedKey::Insert, "insert", "Insert"),
        (NamedKey::Home, "home", "Home"),
        (NamedKey::End, "end", "End"),
        (NamedKey::PageUp, "page_up", "Page Up"),
        (NamedKey::PageDown, "page_down", "Page Down"),
        (NamedKey::Up, "up", "Up"),
        (NamedKey::Down, "down", "Down"),
        (NamedKey::Left, "left", "Left"),
        (NamedKey::Right, "right", "Right"),
        (NamedKey::CapsLock, "caps_lock", "Caps Lock"),
        (NamedKey::NumLock, "num_lock", "Num Lock"),
        (NamedKey::ScrollLock, "scroll_lock", "Scroll Lock"),
        (NamedKey::PrintScreen, "print_screen", "Print Screen"),
        (NamedKey::Pause, "pause", "Pause"),
        (NamedKey::Menu, "menu", "Menu"),
    ];

    /// 规范字符串
    pub fn as_string(self) -> String {
        match self {
            NamedKey::F(n) => format!("f{}", n),
            other => Self::SIMPLE
                .iter()
                .find(|(key, _, _)| *key == other)
                .map(|(_, name, _)| name.to_string())
                .unwrap_or_default(),
        }
    }

    fn label(self) -> String {
        match self {
            NamedKey::F(n) => format!("F{}", n),
            other => Self::SIMPLE
                .iter()
                .find(|(key, _, _)| *key == other)
                .map(|(_, _, label)| label.to_string())
                .unwrap_or_default(),
        }
    }

    /// 解析名称，忽略空格、下划线和连字符
    pub fn parse(s: &str) -> Option<Self> {
        let compact: String = s
            .chars()
            .filter(|c| !matches!(c, ' ' | '_' | '-'))
            .flat_map(char::to_lowercase)
            .collect();

        let alias = match compact.as_str() {
            "escape" => Some(NamedKey::Escape),
            "return" => Some(NamedKey::Enter),
            "del" => Some(NamedKey::Delete),
            "ins" => Some(NamedKey::Insert),
            "pgup" => Some(NamedKey::PageUp),
            "pgdn" | "pgdown" => Some(NamedKey::PageDown),
            "printscr" | "prtsc" => Some(NamedKey::PrintScreen),
            "capslock" => Some(NamedKey::CapsLock),
            "arrowup" => Some(NamedKey::Up),
            "arrowdown" => Some(NamedKey::Down),
            "arrowleft" => Some(NamedKey::Left),
            "arrowright" => Some(NamedKey::Right),
            _ => None,
        };
        if alias.is_some() {
            return alias;
        }

        if let Some(number) = compact.strip_prefix('f') {
            if let Ok(n) = number.parse::<u8>() {
                return (1..=24).contains(&n).then_some(NamedKey::F(n));
            }
        }

        Self::SIMPLE
            .iter()
            .find(|(_, name, _)| name.replace('_', "") == compact)
            .map(|(key, _, _)| *key)
    }
}

/// 鼠标按键
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MouseButton {
    Left,
    Right,
    Middle,
    X1,
    X2,
    Other(u16),
}

impl MouseButton {
    /// 左右键保留给界面交互，不能作为热键
    pub fn is_primary(self) -> bool {
        matches!(self, MouseButton::Left | MouseButton::Right)
    }

    fn suffix(self) -> String {
        match self {
            MouseButton::Left => "left".to_string(),
            MouseButton::Right => "right".to_string(),
            MouseButton::Middle => "middle".to_string(),
            MouseButton::X1 => "x1".to_string(),
            MouseButton::X2 => "x2".to_string(),
            MouseButton::Other(n) => n.to_string(),
        }
    }

    fn parse_suffix(s: &str) -> Option<Self> {
        match s {
            "left" => Some(MouseButton::Left),
            "right" => Some(MouseButton::Right),
            "middle" => Some(MouseButton::Middle),
            "x1" => Some(MouseButton::X1),
            "x2" => Some(MouseButton::X2),
            other => other.parse().ok().map(MouseButton::Other),
        }
    }
}

/// 规范化后的按键或鼠标令牌
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Token {
    Modifier(Modifier),
    /// 单个小写字符
    Character(char),
    Named(NamedKey),
    Mouse(MouseButton),
    /// 既无字符也无名称的按键，按虚拟键码区分
    RawCode(u32),
    /// 无法识别的持久化字符串，原样保留
    Unknown(String),
}

impl Token {
    pub fn character(c: char) -> Self {
        Token::Character(c.to_lowercase().next().unwrap_or(c))
    }

    pub fn is_modifier(&self) -> bool {
        matches!(self, Token::Modifier(_))
    }

    pub fn is_escape(&self) -> bool {
        matches!(self, Token::Named(NamedKey::Escape))
    }

    /// 鼠标左键或右键
    pub fn is_primary_mouse(&self) -> bool {
        matches!(self, Token::Mouse(button) if button.is_primary())
    }

    /// 解析持久化字符串，永不失败
    pub fn parse(s: &str) -> Token {
        let trimmed = s.trim();
        let lower = trimmed.to_lowercase();

        if let Some(modifier) = Modifier::parse(&lower) {
            return Token::Modifier(modifier);
        }

        let mut chars = lower.chars();
        if let (Some(c), None) = (chars.next(), chars.next()) {
            return Token::Character(c);
        }

        if let Some(code) = parse_raw_code(&lower) {
            return Token::RawCode(code);
        }

        if let Some(rest) = lower.strip_prefix("mouse_").or_else(|| lower.strip_prefix("mouse")) {
            if let Some(button) = MouseButton::parse_suffix(rest.trim_start_matches(['_', ' '])) {
                return Token::Mouse(button);
            }
        }
        if matches!(lower.as_str(), "middle" | "x1" | "x2") {
            if let Some(button) = MouseButton::parse_suffix(&lower) {
                return Token::Mouse(button);
            }
        }

        if let Some(named) = NamedKey::parse(&lower) {
            return Token::Named(named);
        }

        Token::Unknown(trimmed.to_string())
    }

    /// 规范字符串
    pub fn as_string(&self) -> String {
        match self {
            Token::Modifier(m) => m.as_str().to_string(),
            Token::Character(c) => c.to_string(),
            Token::Named(key) => key.as_string(),
            Token::Mouse(button) => format!("mouse_{}", button.suffix()),
            Token::RawCode(code) => format!("<vk_{}>", code),
            Token::Unknown(raw) => raw.clone(),
        }
    }
}

/// `<vk_186>`、`<vk-186>`、`vk_186`
fn parse_raw_code(lower: &str) -> Option<u32> {
    let inner = lower
        .strip_prefix('<')
        .and_then(|s| s.strip_suffix('>'))
        .unwrap_or(lower);
    let digits = inner.strip_prefix("vk")?.trim_start_matches(['_', '-']);
    digits.parse().ok()
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Modifier(m) => f.write_str(m.label()),
            Token::Character(c) => write!(f, "{}", c.to_uppercase()),
            Token::Named(key) => f.write_str(&key.label()),
            Token::Mouse(MouseButton::Other(n)) => write!(f, "Mouse {}", n),
            Token::Mouse(button) => {
                let suffix = button.suffix();
                let mut chars = suffix.chars();
                match chars.next() {
                    Some(first) => write!(f, "Mouse {}{}", first.to_uppercase(), chars.as_str()),
                    None => f.write_str("Mouse"),
                }
            }
            Token::RawCode(code) => write!(f, "VK-{}", code),
            Token::Unknown(raw) => f.write_str(raw),
        }
    }
}

impl From<Modifier> for Token {
    fn from(value: Modifier) -> Self {
        Token::Modifier(value)
    }
}

impl From<NamedKey> for Token {
    fn from(value: NamedKey) -> Self {
        Token::Named(value)
    }
}

impl From<MouseButton> for Token {
    fn from(value: MouseButton) -> Self {
        Token::Mouse(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_modifiers_and_aliases() {
        assert_eq!(Token::parse("ctrl"), Token::Modifier(Modifier::Ctrl));
        assert_eq!(Token::parse("Control"), Token::Modifier(Modifier::Ctrl));
        assert_eq!(Token::parse("cmd"), Token::Modifier(Modifier::Super));
        assert_eq!(Token::parse("WIN"), Token::Modifier(Modifier::Super));
        assert_eq!(Token::parse("meta"), Token::Modifier(Modifier::Super));
    }

    #[test]
    fn test_parse_keys() {
        assert_eq!(Token::parse("A"), Token::Character('a'));
        assert_eq!(Token::parse("esc"), Token::Named(NamedKey::Escape));
        assert_eq!(Token::parse("Escape"), Token::Named(NamedKey::Escape));
        assert_eq!(Token::parse("return"), Token::Named(NamedKey::Enter));
        assert_eq!(Token::parse("page_up"), Token::Named(NamedKey::PageUp));
        assert_eq!(Token::parse("Page Up"), Token::Named(NamedKey::PageUp));
        assert_eq!(Token::parse("f12"), Token::Named(NamedKey::F(12)));
        assert_eq!(Token::parse("F24"), Token::Named(NamedKey::F(24)));
        assert_eq!(Token::parse("left"), Token::Named(NamedKey::Left));
    }

    #[test]
    fn test_parse_mouse_and_raw() {
        assert_eq!(Token::parse("mouse_x1"), Token::Mouse(MouseButton::X1));
        assert_eq!(Token::parse("x2"), Token::Mouse(MouseButton::X2));
        assert_eq!(Token::parse("mouse_middle"), Token::Mouse(MouseButton::Middle));
        assert_eq!(Token::parse("mouse_9"), Token::Mouse(MouseButton::Other(9)));
        assert_eq!(Token::parse("<vk_186>"), Token::RawCode(186));
        assert_eq!(Token::parse("VK_65"), Token::RawCode(65));
    }

    #[test]
    fn test_unknown_is_preserved() {
        let token = Token::parse("launch_app2");
        assert_eq!(token, Token::Unknown("launch_app2".to_string()));
        assert_eq!(token.as_string(), "launch_app2");
        assert_eq!(Token::parse("f99"), Token::Unknown("f99".to_string()));
    }

    #[test]
    fn test_string_form_round_trips() {
        let tokens = [
            Token::Modifier(Modifier::Alt),
            Token::Character('z'),
            Token::Named(NamedKey::PrintScreen),
            Token::Named(NamedKey::F(7)),
            Token::Mouse(MouseButton::X2),
            Token::Mouse(MouseButton::Other(12)),
            Token::RawCode(222),
        ];
        for token in tokens {
            assert_eq!(Token::parse(&token.as_string()), token);
        }
    }

    #[test]
    fn test_display() {
        assert_eq!(Token::Character('a').to_string(), "A");
        assert_eq!(Token::Named(NamedKey::PageDown).to_string(), "Page Down");
        assert_eq!(Token::Mouse(MouseButton::X1).to_string(), "Mouse X1");
        assert_eq!(Token::RawCode(186).to_string(), "VK-186");
    }

    #[test]
    fn test_modifier_set_order() {
        let set: ModifierSet = [Modifier::Super, Modifier::Ctrl, Modifier::Shift].into_iter().collect();
        let order: Vec<Modifier> = set.iter().collect();
        assert_eq!(order, vec![Modifier::Ctrl, Modifier::Shift, Modifier::Super]);
        assert_eq!(set.len(), 3);
        assert!(!set.contains(Modifier::Alt));
    }
}
