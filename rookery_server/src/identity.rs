// Auth token resolution.
//
// The dispatcher never sees account records, only the username an auth
// token maps to. `IdentityService` is that one question; account creation
// and login belong to whatever issues tokens. `MemoryIdentityService` is the
// in-process implementation used by the binary and by tests.

use dashmap::DashMap;

/// Maps an auth token to the username it was issued to.
pub trait IdentityService: Send + Sync {
    /// `None` if the token is unknown or has been revoked.
    fn username_for(&self, auth_token: &str) -> Option<String>;
}

#[derive(Debug, Default)]
pub struct MemoryIdentityService {
    tokens: DashMap<String, String>,
}

impl MemoryIdentityService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue `auth_token` for `username`, replacing any previous owner.
    pub fn register(&self, auth_token: impl Into<String>, username: impl Into<String>) {
        self.tokens.insert(auth_token.into(), username.into());
    }

    /// Returns true if the token existed.
    pub fn revoke(&self, auth_token: &str) -> bool {
        self.tokens.remove(auth_token).is_some()
    }
}

impl IdentityService for MemoryIdentityService {
    fn username_for(&self, auth_token: &str) -> Option<String> {
        self.tokens.get(auth_token).map(|name| name.value().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_resolve_revoke() {
        let identity = MemoryIdentityService::new();
        assert_eq!(identity.username_for("t1"), None);

        identity.register("t1", "alice");
        identity.register("t2", "alice");
        assert_eq!(identity.username_for("t1").as_deref(), Some("alice"));
        assert_eq!(identity.username_for("t2").as_deref(), Some("alice"));

        assert!(identity.revoke("t1"));
        assert!(!identity.revoke("t1"));
        assert_eq!(identity.username_for("t1"), None);
        assert_eq!(identity.username_for("t2").as_deref(), Some("alice"));
    }
}
