use std::collections::HashSet;

use pulse_core::config::AuthEntry;
use pulse_coordinator::Messenger;
use tracing::warn;

/// Authorization set resolved once at startup from `AUTHORIZED_USERS`.
///
/// Username resolution never happens on the command hot path (cost and
/// privacy both argue against it), so this only holds the result of the
/// one-time startup resolution.
pub struct AuthorizationSet {
    allowed: HashSet<i64>,
}

impl AuthorizationSet {
    /// Resolve `@username` entries via the Messenger and fold them in with
    /// the numeric entries. Resolution failures are logged and dropped
    /// rather than treated as fatal.
    pub async fn build(entries: &[AuthEntry], messenger: &dyn Messenger) -> Self {
        let mut allowed = HashSet::new();
        for entry in entries {
            match entry {
                AuthEntry::Numeric(id) => {
                    allowed.insert(*id);
                }
                AuthEntry::Username(name) => match messenger.resolve_username(name).await {
                    Some(id) => {
                        allowed.insert(id);
                    }
                    None => {
                        warn!(username = %name, "authorization: failed to resolve @username at startup, dropping entry");
                    }
                },
            }
        }
        if allowed.is_empty() {
            warn!("authorization: resolved allow-list is empty, all commands will be denied");
        }
        Self { allowed }
    }

    pub fn is_authorized(&self, user_id: i64) -> bool {
        self.allowed.contains(&user_id)
    }

    /// Construct directly from already-resolved numeric ids, bypassing
    /// `build`'s username resolution. Used by callers (and tests) that
    /// already have a resolved id set.
    pub fn from_ids(ids: impl IntoIterator<Item = i64>) -> Self {
        Self {
            allowed: ids.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use pulse_coordinator::MessengerError;

    struct StubMessenger;

    #[async_trait]
    impl Messenger for StubMessenger {
        async fn send(&self, _chat_id: i64, _text: &str) -> Result<(), MessengerError> {
            Ok(())
        }

        async fn resolve_username(&self, name: &str) -> Option<i64> {
            if name == "alice" {
                Some(42)
            } else {
                None
            }
        }
    }

    #[tokio::test]
    async fn numeric_entries_pass_through() {
        let set = AuthorizationSet::build(&[AuthEntry::Numeric(7)], &StubMessenger).await;
        assert!(set.is_authorized(7));
        assert!(!set.is_authorized(8));
    }

    #[tokio::test]
    async fn username_entries_resolve_via_messenger() {
        let entries = vec![
            AuthEntry::Username("alice".to_string()),
            AuthEntry::Username("ghost".to_string()),
        ];
        let set = AuthorizationSet::build(&entries, &StubMessenger).await;
        assert!(set.is_authorized(42));
        assert_eq!(set.is_authorized(0), false);
    }

    #[tokio::test]
    async fn empty_entries_deny_everyone() {
        let set = AuthorizationSet::build(&[], &StubMessenger).await;
        assert!(!set.is_authorized(1));
    }
}
