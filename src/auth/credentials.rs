/// Credential verification
///
/// Looks a user up by username or email and checks the password. Errors are
/// specific (`UserNotFound` vs `InvalidCredentials`); the HTTP layer renders
/// them identically.

use uuid::Uuid;

use crate::auth::password::PasswordHasher;
use crate::error::{AppError, AuthError, ValidationError};
use crate::store::{User, UserField, UserLookup, UserStore};

/// A login identifier: username, email, or both (the username is used when both are set).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginIdentifier {
    lookup: UserLookup,
}

impl LoginIdentifier {
    /// Normalise (trim + lowercase) the supplied keys, dropping empty ones.
    pub fn new(username: Option<&str>, email: Option<&str>) -> Result<Self, ValidationError> {
        let normalise = |value: Option<&str>| {
            value
                .map(|v| v.trim().to_lowercase())
                .filter(|v| !v.is_empty())
        };
        let lookup = UserLookup {
            username: normalise(username),
            email: normalise(email),
        };
        if lookup.is_empty() {
            return Err(ValidationError::MissingIdentifier);
        }
        Ok(Self { lookup })
    }

    pub fn lookup(&self) -> &UserLookup {
        &self.lookup
    }
}

/// Check `password` against the user's stored hash.
pub async fn password_matches(
    hasher: &PasswordHasher,
    user: &User,
    password: &str,
) -> Result<bool, AppError> {
    hasher.verify(password, &user.password_hash).await
}

pub async fn authenticate(
    store: &dyn UserStore,
    hasher: &PasswordHasher,
    identifier: &LoginIdentifier,
    password: &str,
) -> Result<User, AppError> {
    let user = match store.find_one(identifier.lookup()).await? {
        Some(user) => user,
        None => {
            // Pay for one bcrypt verify anyway so timing does not reveal the account.
            hasher.verify(password, &hasher.dummy_hash()).await?;
            return Err(AuthError::UserNotFound.into());
        }
    };

    if !password_matches(hasher, &user, password).await? {
        tracing::warn!(user_id = %user.id, "Password mismatch");
        return Err(AuthError::InvalidCredentials.into());
    }

    Ok(user)
}

/// Re-verify `old_password`, then store a fresh hash of `new_password`.
pub async fn change_password(
    store: &dyn UserStore,
    hasher: &PasswordHasher,
    user_id: Uuid,
    old_password: &str,
    new_password: &str,
) -> Result<(), AppError> {
    if new_password.trim().is_empty() {
        return Err(ValidationError::EmptyField("newPassword").into());
    }

    let user = store
        .find_by_id(user_id)
        .await?
        .ok_or(AuthError::UserNotFound)?;

    if !password_matches(hasher, &user, old_password).await? {
        tracing::warn!(user_id = %user.id, "Old password mismatch on password change");
        return Err(AuthError::InvalidCredentials.into());
    }

    let hash = hasher.hash(new_password).await?;
    let updated = store
        .update_fields(user_id, &[UserField::PasswordHash(hash)])
        .await?;
    if !updated {
        return Err(AuthError::UserNotFound.into());
    }

    tracing::info!(user_id = %user_id, "Password changed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{InMemoryUserStore, NewUser};

    async fn seeded(hasher: &PasswordHasher) -> (InMemoryUserStore, User) {
        let store = InMemoryUserStore::new();
        let user = store
            .insert(NewUser {
                username: "alice".into(),
                email: "alice@x.com".into(),
                full_name: "Alice".into(),
                password_hash: hasher.hash("secret1").await.unwrap(),
                avatar: None,
                cover_image: None,
            })
            .await
            .unwrap();
        (store, user)
    }

    #[test]
    fn identifier_requires_one_key() {
        assert_eq!(
            LoginIdentifier::new(None, None),
            Err(ValidationError::MissingIdentifier)
        );
        assert_eq!(
            LoginIdentifier::new(Some("  "), Some("")),
            Err(ValidationError::MissingIdentifier)
        );
    }

    #[test]
    fn identifier_is_normalised() {
        let id = LoginIdentifier::new(Some("  Alice "), Some("ALICE@X.COM")).unwrap();
        assert_eq!(id.lookup().username.as_deref(), Some("alice"));
        assert_eq!(id.lookup().email.as_deref(), Some("alice@x.com"));
    }

    fn by_name(username: &str) -> LoginIdentifier {
        LoginIdentifier::new(Some(username), None).unwrap()
    }

    fn by_email(email: &str) -> LoginIdentifier {
        LoginIdentifier::new(None, Some(email)).unwrap()
    }

    #[tokio::test]
    async fn authenticate_by_username_or_email() {
        let hasher = PasswordHasher::new(4);
        let (store, alice) = seeded(&hasher).await;

        let name_id = by_name("alice");
        let email_id = by_email("Alice@X.com");

        assert_eq!(
            authenticate(&store, &hasher, &name_id, "secret1").await.unwrap().id,
            alice.id
        );
        assert_eq!(
            authenticate(&store, &hasher, &email_id, "secret1").await.unwrap().id,
            alice.id
        );
    }

    #[tokio::test]
    async fn authenticate_distinguishes_failures_internally() {
        let hasher = PasswordHasher::new(4);
        let (store, _) = seeded(&hasher).await;

        let wrong = authenticate(&store, &hasher, &by_name("alice"), "wrong").await;
        let missing =
            authenticate(&store, &hasher, &by_name("nouser"), "whatever").await;

        assert!(matches!(wrong, Err(AppError::Auth(AuthError::InvalidCredentials))));
        assert!(matches!(missing, Err(AppError::Auth(AuthError::UserNotFound))));
    }

    #[tokio::test]
    async fn crossed_identifiers_resolve_by_username() {
        let hasher = PasswordHasher::new(4);
        let (store, alice) = seeded(&hasher).await;
        store
            .insert(NewUser {
                username: "bob".into(),
                email: "bob@x.com".into(),
                full_name: "Bob".into(),
                password_hash: hasher.hash("bobpass").await.unwrap(),
                avatar: None,
                cover_image: None,
            })
            .await
            .unwrap();
        let crossed = LoginIdentifier::new(Some("alice"), Some("bob@x.com")).unwrap();

        for _ in 0..10 {
            let as_bob = authenticate(&store, &hasher, &crossed, "bobpass").await;
            assert!(matches!(as_bob, Err(AppError::Auth(AuthError::InvalidCredentials))));
        }
        let as_alice = authenticate(&store, &hasher, &crossed, "secret1").await.unwrap();
        assert_eq!(as_alice.id, alice.id);
    }

    #[tokio::test]
    async fn change_password_replaces_hash() {
        let hasher = PasswordHasher::new(4);
        let (store, alice) = seeded(&hasher).await;
        let id = by_name("alice");

        change_password(&store, &hasher, alice.id, "secret1", "secret2")
            .await
            .unwrap();

        assert!(authenticate(&store, &hasher, &id, "secret1").await.is_err());
        assert!(authenticate(&store, &hasher, &id, "secret2").await.is_ok());
    }

    #[tokio::test]
    async fn change_password_requires_old_password() {
        let hasher = PasswordHasher::new(4);
        let (store, alice) = seeded(&hasher).await;

        let result = change_password(&store, &hasher, alice.id, "nope", "secret2").await;
        assert!(matches!(result, Err(AppError::Auth(AuthError::InvalidCredentials))));

        let stored = store.find_by_id(alice.id).await.unwrap().unwrap();
        assert_eq!(stored.password_hash, alice.password_hash);
    }

    #[tokio::test]
    async fn change_password_rejects_blank_new_password() {
        let hasher = PasswordHasher::new(4);
        let (store, alice) = seeded(&hasher).await;

        let result = change_password(&store, &hasher, alice.id, "secret1", "   ").await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }
}
