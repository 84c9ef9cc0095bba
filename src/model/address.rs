//! Sender and recipient formatting.

/// A mailbox address as shown in the recent-mail list.
///
/// # Examples
/// - `Juan García <juan@ejemplo.com>` → `display_name = "Juan García"`, `address = "juan@ejemplo.com"`
/// - `user@example.com` → `display_name = ""`, `address = "user@example.com"`
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize, PartialEq)]
pub struct EmailAddress {
    /// Human-readable display name (may be empty).
    pub display_name: String,
    /// The bare email address (`user@domain`).
    pub address: String,
}

impl EmailAddress {
    /// Take the first address out of a parsed `From:`/`To:` header.
    ///
    /// Groups are flattened; an empty header yields `None`.
    pub fn first_of(header: Option<&mail_parser::Address<'_>>) -> Option<Self> {
        let addr = header?.first()?;
        let display_name = addr.name().map(str::trim).unwrap_or_default();
        let address = addr.address().map(str::trim).unwrap_or_default();
        if display_name.is_empty() && address.is_empty() {
            return None;
        }
        Some(Self {
            display_name: strip_quotes(display_name),
            address: address.to_string(),
        })
    }

    /// Format for display: `"Display Name <address>"` or just `"address"`.
    pub fn display(&self) -> String {
        if self.display_name.is_empty() {
            self.address.clone()
        } else if self.address.is_empty() {
            self.display_name.clone()
        } else {
            format!("{} <{}>", self.display_name, self.address)
        }
    }
}

/// Strip surrounding double-quotes and trim whitespace.
fn strip_quotes(s: &str) -> String {
    let trimmed = s.trim();
    if trimmed.starts_with('"') && trimmed.ends_with('"') && trimmed.len() >= 2 {
        trimmed[1..trimmed.len() - 1].trim().to_string()
    } else {
        trimmed.to_string()
    }
}

impl std::fmt::Display for EmailAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display())
    }
}
