//! Fixed-table credential store.
//!
//! A plain immutable username-to-password table behind a `lookup` capability.
//! No mutation, no expiry, no authorization beyond login.

use std::collections::HashMap;

/// Immutable credential lookup table.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    table: HashMap<String, String>,
}

impl CredentialStore {
    /// Build a store from `(username, password)` pairs.
    pub fn from_pairs<I, S>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (S, S)>,
        S: Into<String>,
    {
        Self {
            table: pairs.into_iter().map(|(u, p)| (u.into(), p.into())).collect(),
        }
    }

    /// Password for `username`, if the user exists.
    pub fn lookup(&self, username: &str) -> Option<&str> {
        self.table.get(username).map(String::as_str)
    }

    /// Whether `(username, password)` exactly matches a table entry.
    pub fn verify(&self, username: &str, password: &str) -> bool {
        self.lookup(username) == Some(password)
    }
}

impl Default for CredentialStore {
    /// The built-in demo table.
    fn default() -> Self {
        Self::from_pairs([
            ("admin", "admin123"),
            ("user1", "pass123"),
            ("user2", "pass456"),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_finds_known_users() {
        let store = CredentialStore::default();
        assert_eq!(store.lookup("admin"), Some("admin123"));
        assert_eq!(store.lookup("nobody"), None);
    }

    #[test]
    fn verify_requires_exact_match() {
        let store = CredentialStore::default();
        assert!(store.verify("admin", "admin123"));
        assert!(!store.verify("admin", "admin124"));
        assert!(!store.verify("Admin", "admin123"));
        assert!(!store.verify("", ""));
    }
}
