/// User document store
///
/// The auth core only touches user records through `UserStore`. Writes are
/// explicit partial updates naming the fields they change; the refresh anchor
/// additionally has a conditional swap so rotation never overwrites a token
/// it did not observe.

mod memory;
mod postgres;

pub use memory::InMemoryUserStore;
pub use postgres::PgUserStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::StoreError;

/// User record as persisted by the store.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub password_hash: String,
    /// The single refresh token currently accepted for rotation.
    #[sqlx(rename = "refresh_token")]
    pub refresh_anchor: Option<String>,
    pub avatar: Option<String>,
    pub cover_image: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Externally visible projection of a `User`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PublicUser {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub avatar: Option<String>,
    pub cover_image: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<&User> for PublicUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
            full_name: user.full_name.clone(),
            avatar: user.avatar.clone(),
            cover_image: user.cover_image.clone(),
            created_at: user.created_at,
        }
    }
}

/// Fields required to create a user. Values are already normalised.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub password_hash: String,
    pub avatar: Option<String>,
    pub cover_image: Option<String>,
}

/// Alternate lookup keys. The username wins when both are supplied, so a
/// lookup resolves to at most one record regardless of storage order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserLookup {
    pub username: Option<String>,
    pub email: Option<String>,
}

impl UserLookup {
    pub fn is_empty(&self) -> bool {
        self.username.is_none() && self.email.is_none()
    }

    /// The single key this lookup resolves by.
    pub fn key(&self) -> Option<LookupKey<'_>> {
        match (self.username.as_deref(), self.email.as_deref()) {
            (Some(username), _) => Some(LookupKey::Username(username)),
            (None, Some(email)) => Some(LookupKey::Email(email)),
            (None, None) => None,
        }
    }

    pub fn matches(&self, user: &User) -> bool {
        match self.key() {
            Some(LookupKey::Username(username)) => user.username == username,
            Some(LookupKey::Email(email)) => user.email == email,
            None => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupKey<'a> {
    Username(&'a str),
    Email(&'a str),
}

/// A single named field in a partial update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserField {
    PasswordHash(String),
    /// `None` clears the anchor.
    RefreshAnchor(Option<String>),
    FullName(String),
    Email(String),
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError>;

    async fn find_one(&self, lookup: &UserLookup) -> Result<Option<User>, StoreError>;

    /// Insert a new user; fails with `StoreError::Duplicate` when the username
    /// or email is taken.
    async fn insert(&self, user: NewUser) -> Result<User, StoreError>;

    /// Apply `fields` to the user. Returns `false` if no user has that id.
    async fn update_fields(&self, id: Uuid, fields: &[UserField]) -> Result<bool, StoreError>;

    /// Replace the refresh anchor only if it still equals `expected`.
    /// Returns `false` when the anchor moved or the user is gone.
    async fn swap_refresh_anchor(
        &self,
        id: Uuid,
        expected: &str,
        new: &str,
    ) -> Result<bool, StoreError>;
}
