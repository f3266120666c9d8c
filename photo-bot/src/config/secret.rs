//! Wrappers for values that must never reach the logs in full.

use std::fmt;

/// Number of trailing characters kept visible when masking.
const VISIBLE_SUFFIX: usize = 3;

/// Mask a secret, keeping only its last few characters.
///
/// Short values are fully masked.
pub fn mask(value: &str) -> String {
    let len = value.chars().count();
    if len <= VISIBLE_SUFFIX * 2 {
        return "***".to_string();
    }
    let suffix: String = value.chars().skip(len - VISIBLE_SUFFIX).collect();
    format!("***{suffix}")
}

/// An opaque credential. `Debug` and `Display` never print the value.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Borrow the raw value. Only the transport should call this.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(***)")
    }
}

impl fmt::Display for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("***")
    }
}

/// The single chat identity allowed to talk to the bot and to receive
/// scheduled deliveries.
///
/// Formatting masks all but the last characters.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthorizedRecipient(String);

impl AuthorizedRecipient {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Exact string comparison against a requester identity.
    pub fn matches(&self, identity: &str) -> bool {
        self.0 == identity
    }

    /// Raw chat id, for addressing outbound messages.
    pub fn chat_id(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AuthorizedRecipient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AuthorizedRecipient({})", mask(&self.0))
    }
}

impl fmt::Display for AuthorizedRecipient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&mask(&self.0))
    }
}
