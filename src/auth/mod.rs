/// Authentication module
///
/// Credential verification, password hashing, JWT signing and the
/// single-anchor refresh token rotation built on top of them.

mod claims;
mod credentials;
mod jwt;
mod password;
mod rotation;
mod service;

pub use claims::{token_subject, Claims, TokenSubject};
pub use credentials::{authenticate, change_password, password_matches, LoginIdentifier};
pub use jwt::{issue_token, verify_token, SignError, SigningKey, TokenKeys};
pub use password::{hash_password, verify_password, PasswordHasher};
pub use rotation::{
    mask_issue_failure, session_state, IssueError, SessionState, TokenPair, TokenRotationManager,
};
pub use service::{AccountUpdate, AuthService, NewAccount};
