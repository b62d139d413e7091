use async_trait::async_trait;
use chrono::Utc;
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use super::{LookupKey, NewUser, User, UserField, UserLookup, UserStore};
use crate::error::StoreError;

const USER_COLUMNS: &str = "id, username, email, full_name, password_hash, refresh_token, \
                            avatar, cover_image, created_at, updated_at";

/// `UserStore` backed by the `users` table.
#[derive(Clone)]
pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE id = $1",
            USER_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn find_one(&self, lookup: &UserLookup) -> Result<Option<User>, StoreError> {
        let (column, value) = match lookup.key() {
            Some(LookupKey::Username(username)) => ("username", username),
            Some(LookupKey::Email(email)) => ("email", email),
            None => return Ok(None),
        };
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE {} = $1",
            USER_COLUMNS, column
        ))
        .bind(value)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn insert(&self, new: NewUser) -> Result<User, StoreError> {
        let now = Utc::now();
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (id, username, email, full_name, password_hash, avatar, cover_image, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $8)
            RETURNING {}
            "#,
            USER_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(&new.username)
        .bind(&new.email)
        .bind(&new.full_name)
        .bind(&new.password_hash)
        .bind(&new.avatar)
        .bind(&new.cover_image)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;
        Ok(user)
    }

    async fn update_fields(&self, id: Uuid, fields: &[UserField]) -> Result<bool, StoreError> {
        let mut query = QueryBuilder::<Postgres>::new("UPDATE users SET updated_at = ");
        query.push_bind(Utc::now());

        for field in fields {
            match field {
                UserField::PasswordHash(hash) => {
                    query.push(", password_hash = ").push_bind(hash.clone());
                }
                UserField::RefreshAnchor(anchor) => {
                    query.push(", refresh_token = ").push_bind(anchor.clone());
                }
                UserField::FullName(name) => {
                    query.push(", full_name = ").push_bind(name.clone());
                }
                UserField::Email(email) => {
                    query.push(", email = ").push_bind(email.clone());
                }
            }
        }
        query.push(" WHERE id = ").push_bind(id);

        let result = query.build().execute(&self.pool).await?;
        Ok(result.rows_affected() > 0)
    }

    async fn swap_refresh_anchor(
        &self,
        id: Uuid,
        expected: &str,
        new: &str,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET refresh_token = $1, updated_at = $2
            WHERE id = $3 AND refresh_token = $4
            "#,
        )
        .bind(new)
        .bind(Utc::now())
        .bind(id)
        .bind(expected)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
