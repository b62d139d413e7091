/// Authentication service
///
/// Entry point for the HTTP layer: registration, login, session rotation and
/// account maintenance over one `UserStore`.

use std::sync::Arc;

use uuid::Uuid;

use crate::auth::claims::Claims;
use crate::auth::credentials::{self, LoginIdentifier};
use crate::auth::jwt::TokenKeys;
use crate::auth::password::PasswordHasher;
use crate::auth::rotation::{TokenPair, TokenRotationManager};
use crate::configuration::{JwtSettings, PasswordSettings};
use crate::error::{AppError, AuthError, TokenError, ValidationError};
use crate::store::{NewUser, User, UserField, UserStore};
use crate::validators;

/// Registration input, as received from the caller.
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub password: String,
    pub avatar: Option<String>,
    pub cover_image: Option<String>,
}

/// Profile changes; at least one field must be set.
#[derive(Debug, Clone, Default)]
pub struct AccountUpdate {
    pub full_name: Option<String>,
    pub email: Option<String>,
}

pub struct AuthService {
    store: Arc<dyn UserStore>,
    hasher: PasswordHasher,
    rotation: TokenRotationManager,
}

impl AuthService {
    pub fn new(
        store: Arc<dyn UserStore>,
        jwt: &JwtSettings,
        password: &PasswordSettings,
    ) -> Self {
        let rotation = TokenRotationManager::new(store.clone(), TokenKeys::from_settings(jwt));
        Self {
            store,
            hasher: PasswordHasher::new(password.bcrypt_cost),
            rotation,
        }
    }

    pub fn token_keys(&self) -> &TokenKeys {
        self.rotation.keys()
    }

    #[tracing::instrument(skip(self, account), fields(username = %account.username))]
    pub async fn register(&self, account: NewAccount) -> Result<User, AppError> {
        let username = validators::parse_username(&account.username)?;
        let email = validators::parse_email(&account.email)?;
        let full_name = validators::parse_full_name(&account.full_name)?;
        validators::check_password(&account.password)?;

        let password_hash = self.hasher.hash(&account.password).await?;
        let user = self
            .store
            .insert(NewUser {
                username,
                email,
                full_name,
                password_hash,
                avatar: account.avatar.filter(|v| !v.trim().is_empty()),
                cover_image: account.cover_image.filter(|v| !v.trim().is_empty()),
            })
            .await?;

        tracing::info!(user_id = %user.id, "User registered");
        Ok(user)
    }

    #[tracing::instrument(skip(self, password))]
    pub async fn authenticate(
        &self,
        identifier: &LoginIdentifier,
        password: &str,
    ) -> Result<User, AppError> {
        credentials::authenticate(self.store.as_ref(), &self.hasher, identifier, password).await
    }

    /// Authenticate, then start a new session for the user.
    #[tracing::instrument(skip(self, password))]
    pub async fn login(
        &self,
        identifier: &LoginIdentifier,
        password: &str,
    ) -> Result<(User, TokenPair), AppError> {
        let user = self.authenticate(identifier, password).await?;
        let pair = self.rotation.issue_pair(user.id).await?;
        tracing::info!(user_id = %user.id, "User logged in");
        Ok((user, pair))
    }

    pub async fn issue_pair(&self, user_id: Uuid) -> Result<TokenPair, TokenError> {
        self.rotation.issue_pair(user_id).await
    }

    pub async fn rotate(&self, refresh_token: &str) -> Result<TokenPair, TokenError> {
        self.rotation.rotate(refresh_token).await
    }

    pub async fn revoke(&self, user_id: Uuid) -> Result<(), AppError> {
        Ok(self.rotation.revoke(user_id).await?)
    }

    #[tracing::instrument(skip(self, old_password, new_password))]
    pub async fn change_password(
        &self,
        user_id: Uuid,
        old_password: &str,
        new_password: &str,
    ) -> Result<(), AppError> {
        validators::check_password(new_password)?;
        credentials::change_password(
            self.store.as_ref(),
            &self.hasher,
            user_id,
            old_password,
            new_password,
        )
        .await
    }

    pub async fn current_user(&self, user_id: Uuid) -> Result<User, AppError> {
        self.store
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| AuthError::InvalidAccessToken.into())
    }

    #[tracing::instrument(skip(self, update))]
    pub async fn update_account(
        &self,
        user_id: Uuid,
        update: AccountUpdate,
    ) -> Result<User, AppError> {
        let mut fields = Vec::new();
        if let Some(full_name) = update.full_name.as_deref() {
            fields.push(UserField::FullName(validators::parse_full_name(full_name)?));
        }
        if let Some(email) = update.email.as_deref() {
            fields.push(UserField::Email(validators::parse_email(email)?));
        }
        if fields.is_empty() {
            return Err(ValidationError::EmptyField("fullName or email").into());
        }

        if !self.store.update_fields(user_id, &fields).await? {
            return Err(AuthError::InvalidAccessToken.into());
        }
        tracing::info!(user_id = %user_id, "Account details updated");
        self.current_user(user_id).await
    }

    /// Verify an access token, mapping every failure to `InvalidAccessToken`.
    pub fn verify_access_token(&self, token: &str) -> Result<Claims, AppError> {
        self.token_keys().verify_access(token).map_err(|e| {
            tracing::debug!(error = %e, "Access token rejected");
            AuthError::InvalidAccessToken.into()
        })
    }
}
