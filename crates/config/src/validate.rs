//! Field sanitizers shared by networks, routes and channels.
//!
//! Each sanitizer returns `None` when the input is not acceptable; callers
//! turn that into a [`Error::Validation`](crate::Error::Validation) naming the
//! offending value.

use crate::error::{Error, Result};

/// Maximum length of a channel name after its prefix character.
const MAX_CHANNEL_NAME_LEN: usize = 49;

/// Characters that may start a channel name.
const CHANNEL_PREFIXES: &[char] = &['&', '#', '+', '!'];

fn is_graphic(c: char) -> bool {
    !c.is_whitespace() && !c.is_control()
}

/// Sanitizes a network or route name. Names are stored lower-cased.
pub fn identifier(value: &str) -> Option<String> {
    let ok = !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_alphanumeric() || c == '-' || c == '_');
    ok.then(|| value.to_lowercase())
}

/// Sanitizes a webhook endpoint token. The empty endpoint is allowed.
pub fn endpoint(value: &str) -> Option<String> {
    value
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-' || c == '_')
        .then(|| value.to_string())
}

/// Sanitizes a webhook secret: printable characters only.
pub fn secret(value: &str) -> Option<String> {
    value
        .chars()
        .all(|c| !c.is_control())
        .then(|| value.to_string())
}

/// Sanitizes a hostname or address.
pub fn host(value: &str) -> Option<String> {
    (!value.is_empty() && value.chars().all(is_graphic)).then(|| value.to_string())
}

/// Sanitizes a TCP port number.
pub fn port(value: u32) -> Option<u16> {
    u16::try_from(value).ok().filter(|p| *p != 0)
}

/// Sanitizes a channel name such as `#hookbot`.
pub fn channel_name(value: &str) -> Option<String> {
    let mut chars = value.chars();
    let prefix = chars.next()?;
    let rest = chars.as_str();
    let ok = CHANNEL_PREFIXES.contains(&prefix)
        && rest.chars().count() <= MAX_CHANNEL_NAME_LEN
        && rest.chars().all(|c| is_graphic(c) && c != ':' && c != ',');
    ok.then(|| value.to_string())
}

/// Sanitizes a channel key.
pub fn channel_key(value: &str) -> Option<String> {
    value
        .chars()
        .all(|c| is_graphic(c) && c != ',')
        .then(|| value.to_string())
}

/// Sanitizes a free-form string value (nicknames, bind hosts, usernames).
pub fn string(value: &str) -> Option<String> {
    (!value.chars().any(|c| c.is_control())).then(|| value.to_string())
}

/// Normalizes a user mode string: drops a leading `+` and duplicate letters.
pub fn modes(value: &str) -> Option<String> {
    let body = value.strip_prefix('+').unwrap_or(value);
    if !body.chars().all(|c| c.is_ascii_alphabetic()) {
        return None;
    }
    let mut seen = String::new();
    for c in body.chars() {
        if !seen.contains(c) {
            seen.push(c);
        }
    }
    Some(seen)
}

/// Applies `sanitize` to `value`, producing a validation error built from
/// `invalid` when it is rejected.
pub fn require<T, S>(value: &T, sanitize: S, invalid: &str) -> Result<String>
where
    T: AsRef<str> + ?Sized,
    S: FnOnce(&str) -> Option<String>,
{
    let raw = value.as_ref();
    sanitize(raw).ok_or_else(|| Error::validation(format!("{invalid} {raw:?}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifiers_are_lowercased() {
        assert_eq!(identifier("FreeNode").as_deref(), Some("freenode"));
        assert_eq!(identifier("repo_hook-2").as_deref(), Some("repo_hook-2"));
        assert_eq!(identifier(""), None);
        assert_eq!(identifier("has space"), None);
        assert_eq!(identifier("a/b"), None);
    }

    #[test]
    fn endpoints_allow_empty() {
        assert_eq!(endpoint("").as_deref(), Some(""));
        assert_eq!(endpoint("ab-12_x").as_deref(), Some("ab-12_x"));
        assert_eq!(endpoint("../etc"), None);
    }

    #[test]
    fn ports_reject_zero_and_overflow() {
        assert_eq!(port(6697), Some(6697));
        assert_eq!(port(0), None);
        assert_eq!(port(70000), None);
    }

    #[test]
    fn channel_names_need_prefix() {
        assert!(channel_name("#hookbot").is_some());
        assert!(channel_name("&local").is_some());
        assert!(channel_name("hookbot").is_none());
        assert!(channel_name("#a,b").is_none());
        assert!(channel_name("#a:b").is_none());
        assert!(channel_name(&format!("#{}", "x".repeat(50))).is_none());
    }

    #[test]
    fn channel_keys_reject_commas_and_spaces() {
        assert!(channel_key("s3cret").is_some());
        assert!(channel_key("two words").is_none());
        assert!(channel_key("a,b").is_none());
    }

    #[test]
    fn modes_are_normalized() {
        assert_eq!(modes("+iwi").as_deref(), Some("iw"));
        assert_eq!(modes("B").as_deref(), Some("B"));
        assert_eq!(modes("+i w"), None);
    }

    #[test]
    fn require_names_the_value() {
        let err = require("bad host", host, "invalid hostname").unwrap_err();
        assert_eq!(err.to_string(), "invalid hostname \"bad host\"");
    }
}
