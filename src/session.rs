//! Default-account selection and session-token bookkeeping.
//!
//! The default-account pointer is a weak reference by account id: it never
//! owns the account and repairs itself whenever the account it points at is
//! gone. [`SessionManager::invalidate_session`] is the single choke point
//! every session-expired outcome routes through, so credential death is
//! handled the same way no matter which operation observed it.

use crate::carrier::classify::ExpiryReason;
use crate::carrier::SessionToken;
use crate::storage::{AccountStore, LinkedAccount, StorageError, UserId};
use std::sync::Arc;
use tracing::{info, warn};

/// Result of an explicit default selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectOutcome {
    /// The account was already the default; nothing changed
    AlreadyDefault,
    /// The pointer moved to the account
    Selected,
    /// No such account id for this user
    NotFound,
}

/// Multi-account bookkeeping over an [`AccountStore`].
pub struct SessionManager {
    store: Arc<dyn AccountStore>,
}

impl SessionManager {
    /// Wrap a store.
    pub fn new(store: Arc<dyn AccountStore>) -> Self {
        Self { store }
    }

    /// The account operations run against when none is named explicitly.
    ///
    /// Repairs a dangling or unset pointer against the live account list:
    /// no accounts → pointer cleared, `None`; accounts but bad pointer →
    /// first account in insertion order becomes default.
    ///
    /// # Errors
    ///
    /// Propagates store failures.
    pub async fn default_account(
        &self,
        user: UserId,
    ) -> Result<Option<LinkedAccount>, StorageError> {
        let accounts = self.store.list_accounts(user).await?;
        let pointer = self.store.get_default(user).await?;

        if accounts.is_empty() {
            if pointer.is_some() {
                self.store.set_default(user, None).await?;
            }
            return Ok(None);
        }

        if let Some(id) = pointer {
            if let Some(account) = accounts.iter().find(|a| a.id == id) {
                return Ok(Some(account.clone()));
            }
            warn!("Default pointer of user {user} dangled at account {id}, repairing");
        }

        let first = accounts[0].clone();
        self.store.set_default(user, Some(first.id)).await?;
        Ok(Some(first))
    }

    /// Point the default at `account_id`.
    ///
    /// # Errors
    ///
    /// Propagates store failures.
    pub async fn select_default(
        &self,
        user: UserId,
        account_id: u32,
    ) -> Result<SelectOutcome, StorageError> {
        let accounts = self.store.list_accounts(user).await?;
        if !accounts.iter().any(|a| a.id == account_id) {
            return Ok(SelectOutcome::NotFound);
        }
        if self.store.get_default(user).await? == Some(account_id) {
            return Ok(SelectOutcome::AlreadyDefault);
        }
        self.store.set_default(user, Some(account_id)).await?;
        Ok(SelectOutcome::Selected)
    }

    /// Advance the default to the next account in insertion order, wrapping
    /// to the first after the last. Selects the first account when the
    /// pointer is unset.
    ///
    /// # Errors
    ///
    /// Propagates store failures.
    pub async fn cycle_default(
        &self,
        user: UserId,
    ) -> Result<Option<LinkedAccount>, StorageError> {
        let accounts = self.store.list_accounts(user).await?;
        if accounts.is_empty() {
            return Ok(None);
        }

        let current = self.store.get_default(user).await?;
        let next = match current.and_then(|id| accounts.iter().position(|a| a.id == id)) {
            Some(index) => accounts[(index + 1) % accounts.len()].clone(),
            None => accounts[0].clone(),
        };
        self.store.set_default(user, Some(next.id)).await?;
        Ok(Some(next))
    }

    /// Link a freshly registered account; it becomes the default when it is
    /// the user's first one.
    ///
    /// # Errors
    ///
    /// Propagates store failures.
    pub async fn link_account(
        &self,
        user: UserId,
        msisdn_blob: String,
        token: SessionToken,
    ) -> Result<LinkedAccount, StorageError> {
        let account = self.store.add_account(user, msisdn_blob, token).await?;
        if self.store.get_default(user).await?.is_none() {
            self.store.set_default(user, Some(account.id)).await?;
        }
        info!("User {user} linked account {}", account.id);
        Ok(account)
    }

    /// Explicitly unlink an account, repairing the pointer when the removed
    /// account was the default.
    ///
    /// # Errors
    ///
    /// Propagates store failures.
    pub async fn remove_account(&self, user: UserId, account_id: u32) -> Result<(), StorageError> {
        self.store.delete_account(user, account_id).await?;
        if self.store.get_default(user).await? == Some(account_id) {
            let remaining = self.store.list_accounts(user).await?;
            let next = remaining.first().map(|a| a.id);
            self.store.set_default(user, next).await?;
        }
        Ok(())
    }

    /// Persist a token the carrier client rotated mid-call.
    ///
    /// # Errors
    ///
    /// Propagates store failures.
    pub async fn store_refreshed(
        &self,
        user: UserId,
        account_id: u32,
        token: SessionToken,
    ) -> Result<(), StorageError> {
        self.store.update_token(user, account_id, token).await
    }

    /// Terminal handler for every session-expired outcome: drop the default
    /// account and clear the pointer. Idempotent: invalidating an already
    /// empty session is a no-op, not an error.
    ///
    /// # Errors
    ///
    /// Propagates store failures.
    pub async fn invalidate_session(
        &self,
        user: UserId,
        reason: ExpiryReason,
    ) -> Result<(), StorageError> {
        let Some(account_id) = self.store.get_default(user).await? else {
            return Ok(());
        };
        info!("Invalidating session of user {user} (account {account_id}, {reason:?})");
        self.store.delete_account(user, account_id).await?;
        self.store.set_default(user, None).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::encode_msisdn;
    use crate::testing::MemoryAccountStore;

    async fn seeded(accounts: &[&str]) -> (SessionManager, UserId) {
        let store = Arc::new(MemoryAccountStore::default());
        let sessions = SessionManager::new(store.clone());
        let user = store.get_or_create_user(42).await.expect("user");
        for msisdn in accounts {
            sessions
                .link_account(user, encode_msisdn(msisdn), SessionToken::new("tok"))
                .await
                .expect("link");
        }
        (sessions, user)
    }

    #[tokio::test]
    async fn first_linked_account_becomes_default() {
        let (sessions, user) = seeded(&["9801", "9802"]).await;
        let default = sessions
            .default_account(user)
            .await
            .expect("store")
            .expect("default set");
        assert_eq!(default.msisdn(), "9801");
    }

    #[tokio::test]
    async fn cycling_is_periodic_in_account_count() {
        let (sessions, user) = seeded(&["9801", "9802", "9803"]).await;
        let start = sessions
            .default_account(user)
            .await
            .expect("store")
            .expect("default");

        for _ in 0..3 {
            sessions.cycle_default(user).await.expect("cycle");
        }
        let back = sessions
            .default_account(user)
            .await
            .expect("store")
            .expect("default");
        assert_eq!(back.id, start.id);
    }

    #[tokio::test]
    async fn cycle_wraps_past_the_last_account() {
        let (sessions, user) = seeded(&["9801", "9802"]).await;
        let second = sessions.cycle_default(user).await.expect("cycle");
        assert_eq!(second.expect("some").msisdn(), "9802");
        let wrapped = sessions.cycle_default(user).await.expect("cycle");
        assert_eq!(wrapped.expect("some").msisdn(), "9801");
    }

    #[tokio::test]
    async fn selecting_the_current_default_is_a_notice() {
        let (sessions, user) = seeded(&["9801"]).await;
        assert_eq!(
            sessions.select_default(user, 1).await.expect("store"),
            SelectOutcome::AlreadyDefault
        );
        assert_eq!(
            sessions.select_default(user, 99).await.expect("store"),
            SelectOutcome::NotFound
        );
    }

    #[tokio::test]
    async fn invalidate_session_is_idempotent() {
        let (sessions, user) = seeded(&["9801"]).await;
        sessions
            .invalidate_session(user, ExpiryReason::NewLogin)
            .await
            .expect("first invalidation");
        assert!(sessions
            .default_account(user)
            .await
            .expect("store")
            .is_none());

        // Second call sees no default account and changes nothing
        sessions
            .invalidate_session(user, ExpiryReason::NewLogin)
            .await
            .expect("second invalidation is a no-op");
        assert!(sessions
            .default_account(user)
            .await
            .expect("store")
            .is_none());
    }

    #[tokio::test]
    async fn removing_the_default_repairs_the_pointer() {
        let (sessions, user) = seeded(&["9801", "9802"]).await;
        sessions.remove_account(user, 1).await.expect("remove");
        let default = sessions
            .default_account(user)
            .await
            .expect("store")
            .expect("repaired");
        assert_eq!(default.msisdn(), "9802");
    }
}
