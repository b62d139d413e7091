use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{NewUser, User, UserField, UserLookup, UserStore};
use crate::error::StoreError;

/// Process-local store. Each write holds the map's write lock, which gives
/// the same per-document atomicity a real document store provides.
#[derive(Default)]
pub struct InMemoryUserStore {
    users: RwLock<HashMap<Uuid, User>>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.users.read().await.len()
    }
}

fn apply(user: &mut User, field: &UserField) {
    match field {
        UserField::PasswordHash(hash) => user.password_hash = hash.clone(),
        UserField::RefreshAnchor(anchor) => user.refresh_anchor = anchor.clone(),
        UserField::FullName(name) => user.full_name = name.clone(),
        UserField::Email(email) => user.email = email.clone(),
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        Ok(self.users.read().await.get(&id).cloned())
    }

    async fn find_one(&self, lookup: &UserLookup) -> Result<Option<User>, StoreError> {
        if lookup.is_empty() {
            return Ok(None);
        }
        let users = self.users.read().await;
        Ok(users.values().find(|u| lookup.matches(u)).cloned())
    }

    async fn insert(&self, new: NewUser) -> Result<User, StoreError> {
        let mut users = self.users.write().await;
        if users
            .values()
            .any(|u| u.username == new.username || u.email == new.email)
        {
            return Err(StoreError::Duplicate(
                "user with username or email already exists".to_string(),
            ));
        }

        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            username: new.username,
            email: new.email,
            full_name: new.full_name,
            password_hash: new.password_hash,
            refresh_anchor: None,
            avatar: new.avatar,
            cover_image: new.cover_image,
            created_at: now,
            updated_at: now,
        };
        users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn update_fields(&self, id: Uuid, fields: &[UserField]) -> Result<bool, StoreError> {
        let mut users = self.users.write().await;

        for field in fields {
            if let UserField::Email(email) = field {
                if users.values().any(|u| u.id != id && &u.email == email) {
                    return Err(StoreError::Duplicate(
                        "user with username or email already exists".to_string(),
                    ));
                }
            }
        }

        match users.get_mut(&id) {
            Some(user) => {
                fields.iter().for_each(|f| apply(user, f));
                user.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn swap_refresh_anchor(
        &self,
        id: Uuid,
        expected: &str,
        new: &str,
    ) -> Result<bool, StoreError> {
        let mut users = self.users.write().await;
        match users.get_mut(&id) {
            Some(user) if user.refresh_anchor.as_deref() == Some(expected) => {
                user.refresh_anchor = Some(new.to_string());
                user.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}
