/// Refresh Token Rotation
///
/// Each user has at most one live refresh token, the anchor stored on the
/// user record. Issuing a pair overwrites the anchor; rotating swaps it only
/// if it still holds the presented token; revoking clears it. A refresh token
/// therefore works exactly once, and replaying an already-rotated token is
/// detected because it no longer matches the anchor.

use std::sync::Arc;

use uuid::Uuid;

use crate::auth::claims::token_subject;
use crate::auth::jwt::{SignError, TokenKeys};
use crate::error::{StoreError, TokenError};
use crate::store::{User, UserField, UserStore};

/// Freshly issued access/refresh tokens
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// Where a presented refresh token stands against the user's anchor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No anchor: never logged in, or logged out.
    NoSession,
    /// The presented token is the anchor.
    Active,
    /// An anchor exists but it is a different token.
    Superseded,
}

pub fn session_state(user: &User, presented: &str) -> SessionState {
    match user.refresh_anchor.as_deref() {
        None => SessionState::NoSession,
        Some(anchor) if anchor.as_bytes() == presented.as_bytes() => SessionState::Active,
        Some(_) => SessionState::Superseded,
    }
}

/// Internal failures while minting and anchoring a pair
#[derive(Debug, thiserror::Error)]
pub enum IssueError {
    #[error("user {0} not found")]
    UserMissing(Uuid),
    #[error("signing failed: {0}")]
    Signing(#[from] SignError),
    #[error("store failed: {0}")]
    Store(#[from] StoreError),
    #[error("refresh anchor changed concurrently")]
    AnchorMoved,
}

/// The only path from an internal issuance failure to a caller-visible error.
/// The cause is logged and replaced with `TokenGenerationFailed`.
pub fn mask_issue_failure(err: IssueError) -> TokenError {
    tracing::error!(error = %err, "Token generation failed");
    TokenError::TokenGenerationFailed
}

pub struct TokenRotationManager {
    store: Arc<dyn UserStore>,
    keys: TokenKeys,
}

impl TokenRotationManager {
    pub fn new(store: Arc<dyn UserStore>, keys: TokenKeys) -> Self {
        Self { store, keys }
    }

    pub fn keys(&self) -> &TokenKeys {
        &self.keys
    }

    /// Issue a new pair for `user_id` and make its refresh token the anchor.
    #[tracing::instrument(skip(self))]
    pub async fn issue_pair(&self, user_id: Uuid) -> Result<TokenPair, TokenError> {
        let pair = self
            .load_and_issue(user_id)
            .await
            .map_err(mask_issue_failure)?;
        tracing::info!(user_id = %user_id, "Token pair issued");
        Ok(pair)
    }

    /// Exchange a refresh token for a new pair, invalidating the old token.
    #[tracing::instrument(skip(self, presented))]
    pub async fn rotate(&self, presented: &str) -> Result<TokenPair, TokenError> {
        let claims = self.keys.verify_refresh(presented).map_err(|e| match e {
            SignError::Expired => TokenError::ExpiredToken,
            other => {
                tracing::warn!(error = %other, "Refresh token failed verification");
                TokenError::InvalidRefreshToken
            }
        })?;

        let user_id = claims.user_id().ok_or(TokenError::InvalidRefreshToken)?;
        let user = match self.store.find_by_id(user_id).await {
            Ok(Some(user)) => user,
            Ok(None) => {
                tracing::warn!(user_id = %user_id, "Refresh token names unknown user");
                return Err(TokenError::InvalidRefreshToken);
            }
            Err(e) => return Err(mask_issue_failure(e.into())),
        };

        match session_state(&user, presented) {
            SessionState::Active => {}
            SessionState::NoSession => {
                tracing::warn!(user_id = %user_id, "Refresh attempted without an active session");
                return Err(TokenError::InvalidRefreshToken);
            }
            SessionState::Superseded => {
                tracing::warn!(user_id = %user_id, "Superseded refresh token presented");
                return Err(TokenError::RefreshTokenReused);
            }
        }

        match self.sign_and_anchor(&user, Some(presented)).await {
            Ok(pair) => {
                tracing::info!(user_id = %user_id, "Refresh token rotated");
                Ok(pair)
            }
            Err(IssueError::AnchorMoved) => {
                tracing::warn!(user_id = %user_id, "Lost rotation race for refresh token");
                Err(TokenError::RefreshTokenReused)
            }
            Err(e) => Err(mask_issue_failure(e)),
        }
    }

    /// Clear the user's anchor. Revoking an absent session is a no-op.
    #[tracing::instrument(skip(self))]
    pub async fn revoke(&self, user_id: Uuid) -> Result<(), StoreError> {
        let cleared = self
            .store
            .update_fields(user_id, &[UserField::RefreshAnchor(None)])
            .await?;
        if cleared {
            tracing::info!(user_id = %user_id, "Session revoked");
        }
        Ok(())
    }

    async fn load_and_issue(&self, user_id: Uuid) -> Result<TokenPair, IssueError> {
        let user = self
            .store
            .find_by_id(user_id)
            .await?
            .ok_or(IssueError::UserMissing(user_id))?;
        self.sign_and_anchor(&user, None).await
    }

    /// Sign both tokens and persist the refresh token as the new anchor.
    /// With `expected`, the write is conditional on the anchor still holding it.
    async fn sign_and_anchor(
        &self,
        user: &User,
        expected: Option<&str>,
    ) -> Result<TokenPair, IssueError> {
        let subject = token_subject(user);
        let access_token = self.keys.sign_access(&subject)?;
        let refresh_token = self.keys.sign_refresh(&subject)?;

        match expected {
            None => {
                let stored = self
                    .store
                    .update_fields(
                        user.id,
                        &[UserField::RefreshAnchor(Some(refresh_token.clone()))],
                    )
                    .await?;
                if !stored {
                    return Err(IssueError::UserMissing(user.id));
                }
            }
            Some(previous) => {
                let swapped = self
                    .store
                    .swap_refresh_anchor(user.id, previous, &refresh_token)
                    .await?;
                if !swapped {
                    return Err(IssueError::AnchorMoved);
                }
            }
        }

        Ok(TokenPair {
            access_token,
            refresh_token,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::jwt::{issue_token, SigningKey};
    use crate::store::{InMemoryUserStore, NewUser};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const ISSUER: &str = "test";

    fn keys() -> TokenKeys {
        TokenKeys::new(
            SigningKey::new("access-secret", 900),
            SigningKey::new("refresh-secret", 3600),
            ISSUER,
        )
    }

    async fn setup() -> (Arc<InMemoryUserStore>, TokenRotationManager, User) {
        let store = Arc::new(InMemoryUserStore::new());
        let user = store
            .insert(NewUser {
                username: "alice".into(),
                email: "alice@x.com".into(),
                full_name: "Alice".into(),
                password_hash: "unused".into(),
                avatar: None,
                cover_image: None,
            })
            .await
            .unwrap();
        let manager = TokenRotationManager::new(store.clone(), keys());
        (store, manager, user)
    }

    #[tokio::test]
    async fn issue_pair_sets_anchor() {
        let (store, manager, user) = setup().await;

        let pair = manager.issue_pair(user.id).await.unwrap();
        let stored = store.find_by_id(user.id).await.unwrap().unwrap();

        assert_eq!(stored.refresh_anchor.as_deref(), Some(pair.refresh_token.as_str()));
        assert_ne!(pair.access_token, pair.refresh_token);
    }

    #[tokio::test]
    async fn issue_pair_for_unknown_user_is_masked() {
        let (_, manager, _) = setup().await;
        assert_eq!(
            manager.issue_pair(Uuid::new_v4()).await,
            Err(TokenError::TokenGenerationFailed)
        );
    }

    #[tokio::test]
    async fn second_login_supersedes_first_session() {
        let (_, manager, user) = setup().await;

        let first = manager.issue_pair(user.id).await.unwrap();
        let second = manager.issue_pair(user.id).await.unwrap();

        assert_eq!(
            manager.rotate(&first.refresh_token).await,
            Err(TokenError::RefreshTokenReused)
        );
        assert!(manager.rotate(&second.refresh_token).await.is_ok());
    }

    #[tokio::test]
    async fn rotate_is_single_use() {
        let (store, manager, user) = setup().await;
        let t1 = manager.issue_pair(user.id).await.unwrap();

        let t2 = manager.rotate(&t1.refresh_token).await.unwrap();
        assert_ne!(t2.refresh_token, t1.refresh_token);
        assert_eq!(
            manager.rotate(&t1.refresh_token).await,
            Err(TokenError::RefreshTokenReused)
        );

        let stored = store.find_by_id(user.id).await.unwrap().unwrap();
        assert_eq!(stored.refresh_anchor.as_deref(), Some(t2.refresh_token.as_str()));
    }

    #[tokio::test]
    async fn rotate_rejects_access_token() {
        let (_, manager, user) = setup().await;
        let pair = manager.issue_pair(user.id).await.unwrap();

        assert_eq!(
            manager.rotate(&pair.access_token).await,
            Err(TokenError::InvalidRefreshToken)
        );
    }

    #[tokio::test]
    async fn rotate_rejects_foreign_secret_before_anchor_check() {
        let (store, manager, user) = setup().await;
        manager.issue_pair(user.id).await.unwrap();

        let forged = issue_token(
            &token_subject(&user),
            &SigningKey::new("not-the-refresh-secret", 3600),
            ISSUER,
        )
        .unwrap();
        // Even a forged token that happens to be the anchor must not pass.
        store
            .update_fields(user.id, &[UserField::RefreshAnchor(Some(forged.clone()))])
            .await
            .unwrap();

        assert_eq!(
            manager.rotate(&forged).await,
            Err(TokenError::InvalidRefreshToken)
        );
    }

    #[tokio::test]
    async fn rotate_reports_expiry() {
        let (store, manager, user) = setup().await;
        let expired = issue_token(
            &token_subject(&user),
            &SigningKey::new("refresh-secret", -60),
            ISSUER,
        )
        .unwrap();
        store
            .update_fields(user.id, &[UserField::RefreshAnchor(Some(expired.clone()))])
            .await
            .unwrap();

        assert_eq!(manager.rotate(&expired).await, Err(TokenError::ExpiredToken));
    }

    #[tokio::test]
    async fn rotate_after_revoke_is_invalid() {
        let (_, manager, user) = setup().await;
        let pair = manager.issue_pair(user.id).await.unwrap();

        manager.revoke(user.id).await.unwrap();

        assert_eq!(
            manager.rotate(&pair.refresh_token).await,
            Err(TokenError::InvalidRefreshToken)
        );
    }

    #[tokio::test]
    async fn revoke_is_idempotent() {
        let (store, manager, user) = setup().await;
        manager.issue_pair(user.id).await.unwrap();

        manager.revoke(user.id).await.unwrap();
        manager.revoke(user.id).await.unwrap();
        manager.revoke(Uuid::new_v4()).await.unwrap();

        let stored = store.find_by_id(user.id).await.unwrap().unwrap();
        assert!(stored.refresh_anchor.is_none());
    }

    #[tokio::test]
    async fn rotate_for_deleted_user_is_invalid() {
        let (_, manager, user) = setup().await;
        let pair = manager.issue_pair(user.id).await.unwrap();

        let other_store = Arc::new(InMemoryUserStore::new());
        let other = TokenRotationManager::new(other_store, keys());

        assert_eq!(
            other.rotate(&pair.refresh_token).await,
            Err(TokenError::InvalidRefreshToken)
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn concurrent_rotation_issues_one_pair() {
        let (_, manager, user) = setup().await;
        let manager = Arc::new(manager);
        let pair = manager.issue_pair(user.id).await.unwrap();

        let a = {
            let m = manager.clone();
            let t = pair.refresh_token.clone();
            tokio::spawn(async move { m.rotate(&t).await })
        };
        let b = {
            let m = manager.clone();
            let t = pair.refresh_token.clone();
            tokio::spawn(async move { m.rotate(&t).await })
        };
        let results = [a.await.unwrap(), b.await.unwrap()];

        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(results
            .iter()
            .any(|r| r == &Err(TokenError::RefreshTokenReused)));
    }

    #[test]
    fn session_state_compares_exactly() {
        let mut user = User {
            id: Uuid::new_v4(),
            username: "alice".into(),
            email: "alice@x.com".into(),
            full_name: "Alice".into(),
            password_hash: "h".into(),
            refresh_anchor: None,
            avatar: None,
            cover_image: None,
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        };
        assert_eq!(session_state(&user, "t1"), SessionState::NoSession);

        user.refresh_anchor = Some("t1".into());
        assert_eq!(session_state(&user, "t1"), SessionState::Active);
        assert_eq!(session_state(&user, "t1 "), SessionState::Superseded);
    }

    #[test]
    fn masking_hides_every_cause() {
        let causes = vec![
            IssueError::UserMissing(Uuid::new_v4()),
            IssueError::Signing(SignError::Signing("key".into())),
            IssueError::Store(StoreError::Unavailable("db down".into())),
            IssueError::AnchorMoved,
        ];
        for cause in causes {
            assert_eq!(mask_issue_failure(cause), TokenError::TokenGenerationFailed);
        }
    }

    struct FailingStore;

    #[async_trait]
    impl UserStore for FailingStore {
        async fn find_by_id(&self, _id: Uuid) -> Result<Option<User>, StoreError> {
            Err(StoreError::Unavailable("connection refused".into()))
        }
        async fn find_one(
            &self,
            _lookup: &crate::store::UserLookup,
        ) -> Result<Option<User>, StoreError> {
            Err(StoreError::Unavailable("connection refused".into()))
        }
        async fn insert(&self, _user: NewUser) -> Result<User, StoreError> {
            Err(StoreError::Unavailable("connection refused".into()))
        }
        async fn update_fields(&self, _id: Uuid, _f: &[UserField]) -> Result<bool, StoreError> {
            Err(StoreError::Unavailable("connection refused".into()))
        }
        async fn swap_refresh_anchor(
            &self,
            _id: Uuid,
            _expected: &str,
            _new: &str,
        ) -> Result<bool, StoreError> {
            Err(StoreError::Unavailable("connection refused".into()))
        }
    }

    /// Lands a rival rotation between the anchor read and the conditional swap.
    struct RacingStore {
        inner: InMemoryUserStore,
        rival_anchor: String,
        swaps_lost: AtomicUsize,
    }

    #[async_trait]
    impl UserStore for RacingStore {
        async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
            self.inner.find_by_id(id).await
        }
        async fn find_one(
            &self,
            lookup: &crate::store::UserLookup,
        ) -> Result<Option<User>, StoreError> {
            self.inner.find_one(lookup).await
        }
        async fn insert(&self, user: NewUser) -> Result<User, StoreError> {
            self.inner.insert(user).await
        }
        async fn update_fields(&self, id: Uuid, f: &[UserField]) -> Result<bool, StoreError> {
            self.inner.update_fields(id, f).await
        }
        async fn swap_refresh_anchor(
            &self,
            id: Uuid,
            expected: &str,
            new: &str,
        ) -> Result<bool, StoreError> {
            self.inner
                .update_fields(id, &[UserField::RefreshAnchor(Some(self.rival_anchor.clone()))])
                .await?;
            let swapped = self.inner.swap_refresh_anchor(id, expected, new).await?;
            if !swapped {
                self.swaps_lost.fetch_add(1, Ordering::SeqCst);
            }
            Ok(swapped)
        }
    }

    #[tokio::test]
    async fn rotation_losing_the_swap_is_reported_as_reuse() {
        let store = Arc::new(RacingStore {
            inner: InMemoryUserStore::new(),
            rival_anchor: "rival-refresh-token".to_string(),
            swaps_lost: AtomicUsize::new(0),
        });
        let user = store
            .insert(NewUser {
                username: "alice".into(),
                email: "alice@x.com".into(),
                full_name: "Alice".into(),
                password_hash: "unused".into(),
                avatar: None,
                cover_image: None,
            })
            .await
            .unwrap();
        let manager = TokenRotationManager::new(store.clone(), keys());
        let pair = manager.issue_pair(user.id).await.unwrap();

        assert_eq!(
            manager.rotate(&pair.refresh_token).await,
            Err(TokenError::RefreshTokenReused)
        );
        assert_eq!(store.swaps_lost.load(Ordering::SeqCst), 1);

        let stored = store.find_by_id(user.id).await.unwrap().unwrap();
        assert_eq!(stored.refresh_anchor.as_deref(), Some("rival-refresh-token"));
    }

    #[tokio::test]
    async fn store_failures_surface_as_generation_failure() {
        let manager = TokenRotationManager::new(Arc::new(FailingStore), keys());
        let subject = crate::auth::claims::TokenSubject {
            id: Uuid::new_v4(),
            email: "alice@x.com".into(),
            username: "alice".into(),
            full_name: "Alice".into(),
        };
        let token = manager.keys().sign_refresh(&subject).unwrap();

        assert_eq!(
            manager.issue_pair(subject.id).await,
            Err(TokenError::TokenGenerationFailed)
        );
        assert_eq!(
            manager.rotate(&token).await,
            Err(TokenError::TokenGenerationFailed)
        );
    }
}
