//! Synchronous argument validation for the public facades.
//!
//! Everything here runs before any engine command is enqueued, so a bad
//! argument never produces wire traffic.

use crate::error::{PylonLinkError, Result};

const MAX_NAME_LEN: usize = 128;
const MAX_FILTER_LEN: usize = 4096;

/// Validate a channel name: non-empty, bounded, no whitespace or control
/// characters, no path separators.
pub(crate) fn channel_name(name: &str) -> Result<()> {
    target_name(name, "Channel name")
}

/// Validate a table name: same rules as channel names plus an optional single
/// `namespace.table` dot.
pub(crate) fn table_name(name: &str) -> Result<()> {
    target_name(name, "Table name")?;
    if name.matches('.').count() > 1 {
        return Err(PylonLinkError::ValidationError(
            "Table name may contain at most one '.'".to_string(),
        ));
    }
    Ok(())
}

/// Validate a command type name for `send_command`.
pub(crate) fn command_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(PylonLinkError::ValidationError(
            "Command name cannot be empty".to_string(),
        ));
    }
    if name.len() > MAX_NAME_LEN {
        return Err(PylonLinkError::ValidationError(format!(
            "Command name too long (max {} chars)",
            MAX_NAME_LEN
        )));
    }
    if name.chars().any(|c| c.is_control()) {
        return Err(PylonLinkError::ValidationError(
            "Command name contains control characters".to_string(),
        ));
    }
    Ok(())
}

/// Validate an optional selector/where-clause. `None` and whitespace-only
/// strings are fine (they mean "no filter"); what is rejected is unprintable
/// garbage and oversized expressions.
pub(crate) fn filter(expr: Option<&str>, what: &str) -> Result<()> {
    let Some(expr) = expr else {
        return Ok(());
    };
    if expr.len() > MAX_FILTER_LEN {
        return Err(PylonLinkError::ValidationError(format!(
            "{} too long (max {} chars)",
            what, MAX_FILTER_LEN
        )));
    }
    if expr.chars().any(|c| c.is_control() && c != '\t') {
        return Err(PylonLinkError::ValidationError(format!(
            "{} contains control characters",
            what
        )));
    }
    Ok(())
}

fn target_name(name: &str, what: &str) -> Result<()> {
    if name.is_empty() {
        return Err(PylonLinkError::ValidationError(format!(
            "{} cannot be empty",
            what
        )));
    }
    if name.len() > MAX_NAME_LEN {
        return Err(PylonLinkError::ValidationError(format!(
            "{} too long (max {} chars)",
            what, MAX_NAME_LEN
        )));
    }
    for c in name.chars() {
        if c.is_whitespace() || c.is_control() || c == '/' || c == '\\' || c == ':' {
            return Err(PylonLinkError::ValidationError(format!(
                "{} contains invalid character '{}'",
                what,
                c.escape_default()
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_channel_names() {
        assert!(channel_name("chat").is_ok());
        assert!(channel_name("room-42_news.eu").is_ok());
    }

    #[test]
    fn test_invalid_channel_names() {
        assert!(channel_name("").is_err());
        assert!(channel_name("has space").is_err());
        assert!(channel_name("a/b").is_err());
        assert!(channel_name("a:b").is_err());
        assert!(channel_name("line\nbreak").is_err());
        assert!(channel_name(&"x".repeat(200)).is_err());
    }

    #[test]
    fn test_table_name_dots() {
        assert!(table_name("orders").is_ok());
        assert!(table_name("shop.orders").is_ok());
        assert!(table_name("a.b.c").is_err());
    }

    #[test]
    fn test_filter_rules() {
        assert!(filter(None, "Selector").is_ok());
        assert!(filter(Some(""), "Selector").is_ok());
        assert!(filter(Some("amount > 10 AND\tregion = 'eu'"), "Where clause").is_ok());
        assert!(filter(Some("bad\u{0}"), "Selector").is_err());
        assert!(filter(Some(&"x".repeat(5000)), "Selector").is_err());
    }

    #[test]
    fn test_command_name_rules() {
        assert!(command_name("kick").is_ok());
        assert!(command_name("").is_err());
        assert!(command_name("  ").is_err());
        assert!(command_name("a\u{7}b").is_err());
    }
}
