//! mIRC formatting codes.

pub const BOLD: char = '\x02';
pub const COLOR: char = '\x03';
pub const RESET: char = '\x0F';
pub const UNDERLINE: char = '\x1F';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Color {
    Red,
    Purple,
    Blue,
    Grey,
    Pink,
    Silver,
}

impl Color {
    fn code(self) -> &'static str {
        match self {
            Self::Red => "04",
            Self::Purple => "06",
            Self::Pink => "13",
            Self::Blue => "12",
            Self::Grey => "14",
            Self::Silver => "15",
        }
    }
}

pub fn color(color: Color, text: &str) -> String {
    format!("{COLOR}{}{text}{RESET}", color.code())
}

pub fn repository(name: &str) -> String {
    color(Color::Pink, name)
}

pub fn user(name: &str) -> String {
    color(Color::Silver, name)
}

pub fn branch(name: &str) -> String {
    color(Color::Purple, name)
}

/// Abbreviated commit hash.
pub fn hash(sha: &str) -> String {
    let short = sha.get(..7).unwrap_or(sha);
    color(Color::Grey, short)
}

pub fn url(url: &str) -> String {
    format!("{COLOR}{}{UNDERLINE}{url}{RESET}", Color::Blue.code())
}

/// Destructive actions such as force pushes.
pub fn dangerous(text: &str) -> String {
    format!("{COLOR}{}{BOLD}{text}{RESET}", Color::Red.code())
}

/// Remove every formatting code, leaving plain text.
pub fn strip(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            COLOR => {
                for _ in 0..2 {
                    if chars.peek().is_some_and(char::is_ascii_digit) {
                        chars.next();
                    }
                }
                if chars.peek() == Some(&',') {
                    chars.next();
                    for _ in 0..2 {
                        if chars.peek().is_some_and(char::is_ascii_digit) {
                            chars.next();
                        }
                    }
                }
            },
            BOLD | RESET | UNDERLINE | '\x1D' | '\x16' => {},
            c => out.push(c),
        }
    }
    out
}
