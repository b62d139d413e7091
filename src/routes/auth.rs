/// Authentication Routes
///
/// Registration, login, token refresh, logout and account maintenance.
/// Tokens travel both as httpOnly cookies and in the JSON body.

use actix_web::cookie::{time::Duration, Cookie};
use actix_web::{web, HttpRequest, HttpResponse};
use serde::{Deserialize, Serialize};

use crate::auth::{AccountUpdate, AuthService, Claims, LoginIdentifier, NewAccount, TokenPair};
use crate::error::{AppError, AuthError, ErrorContext, TrackedError};
use crate::middleware::ACCESS_TOKEN_COOKIE;
use crate::store::PublicUser;

pub const REFRESH_TOKEN_COOKIE: &str = "refreshToken";

/// User registration request
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub password: String,
    pub avatar: Option<String>,
    pub cover_image: Option<String>,
}

/// User login request; either identifier may be omitted, not both
#[derive(Deserialize)]
pub struct LoginRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub old_password: String,
    pub new_password: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateAccountRequest {
    pub full_name: Option<String>,
    pub email: Option<String>,
}

/// Authentication response with access and refresh tokens
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<PublicUser>,
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: i64,
}

#[derive(Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

fn token_cookie(name: &'static str, value: String, max_age_seconds: i64) -> Cookie<'static> {
    Cookie::build(name, value)
        .http_only(true)
        .secure(true)
        .path("/")
        .max_age(Duration::seconds(max_age_seconds))
        .finish()
}

fn removal_cookie(name: &'static str) -> Cookie<'static> {
    let mut cookie = Cookie::build(name, "")
        .http_only(true)
        .secure(true)
        .path("/")
        .finish();
    cookie.make_removal();
    cookie
}

/// Respond with the pair in both cookies and body.
fn token_response(
    service: &AuthService,
    user: Option<PublicUser>,
    pair: TokenPair,
) -> HttpResponse {
    let keys = service.token_keys();
    HttpResponse::Ok()
        .cookie(token_cookie(
            ACCESS_TOKEN_COOKIE,
            pair.access_token.clone(),
            keys.access_ttl_seconds(),
        ))
        .cookie(token_cookie(
            REFRESH_TOKEN_COOKIE,
            pair.refresh_token.clone(),
            keys.refresh_ttl_seconds(),
        ))
        .json(AuthResponse {
            user,
            access_token: pair.access_token,
            refresh_token: pair.refresh_token,
            token_type: "Bearer".to_string(),
            expires_in: keys.access_ttl_seconds(),
        })
}

fn authenticated_user(claims: &Claims) -> Result<uuid::Uuid, AppError> {
    claims
        .user_id()
        .ok_or(AppError::Auth(AuthError::InvalidAccessToken))
}

/// POST /auth/register
///
/// # Errors
/// - 400: Validation errors
/// - 409: Username or email already registered
pub async fn register(
    form: web::Json<RegisterRequest>,
    service: web::Data<AuthService>,
) -> Result<HttpResponse, TrackedError> {
    let context = ErrorContext::new("user_registration");
    let form = form.into_inner();

    let user = service
        .register(NewAccount {
            username: form.username,
            email: form.email,
            full_name: form.full_name,
            password: form.password,
            avatar: form.avatar,
            cover_image: form.cover_image,
        })
        .await
        .map_err(|e| context.fail(e))?;

    tracing::info!(
        request_id = %context.request_id,
        user_id = %user.id,
        "User registered successfully"
    );

    Ok(HttpResponse::Created().json(PublicUser::from(&user)))
}

/// POST /auth/login
///
/// # Security Notes
/// - Unknown user and wrong password produce the same response
pub async fn login(
    form: web::Json<LoginRequest>,
    service: web::Data<AuthService>,
) -> Result<HttpResponse, TrackedError> {
    let context = ErrorContext::new("user_login");

    let identifier = LoginIdentifier::new(form.username.as_deref(), form.email.as_deref())
        .map_err(|e| context.fail(e))?;
    let (user, pair) = service
        .login(&identifier, &form.password)
        .await
        .map_err(|e| context.fail(e))?;

    tracing::info!(
        request_id = %context.request_id,
        user_id = %user.id,
        "User logged in successfully"
    );

    Ok(token_response(&service, Some(PublicUser::from(&user)), pair))
}

/// POST /auth/refresh
///
/// The `refreshToken` cookie takes precedence over the body field.
///
/// # Errors
/// - 401: Missing, invalid, expired or already used refresh token
pub async fn refresh(
    req: HttpRequest,
    form: Option<web::Json<RefreshRequest>>,
    service: web::Data<AuthService>,
) -> Result<HttpResponse, TrackedError> {
    let context = ErrorContext::new("token_refresh");

    let presented = req
        .cookie(REFRESH_TOKEN_COOKIE)
        .map(|c| c.value().to_string())
        .filter(|v| !v.is_empty())
        .or_else(|| form.and_then(|f| f.into_inner().refresh_token))
        .filter(|v| !v.is_empty())
        .ok_or_else(|| context.fail(AuthError::MissingToken))?;

    let pair = service
        .rotate(&presented)
        .await
        .map_err(|e| context.fail(e))?;

    tracing::info!(request_id = %context.request_id, "Token refreshed successfully");
    Ok(token_response(&service, None, pair))
}

/// POST /auth/logout
///
/// **Requires valid JWT access token**
pub async fn logout(
    claims: web::ReqData<Claims>,
    service: web::Data<AuthService>,
) -> Result<HttpResponse, AppError> {
    let user_id = authenticated_user(&claims)?;
    service.revoke(user_id).await?;

    tracing::info!(user_id = %user_id, "User logged out");

    Ok(HttpResponse::Ok()
        .cookie(removal_cookie(ACCESS_TOKEN_COOKIE))
        .cookie(removal_cookie(REFRESH_TOKEN_COOKIE))
        .json(MessageResponse {
            message: "User logged out".to_string(),
        }))
}

/// POST /auth/change-password
///
/// **Requires valid JWT access token**. Existing sessions stay valid.
pub async fn change_password(
    claims: web::ReqData<Claims>,
    form: web::Json<ChangePasswordRequest>,
    service: web::Data<AuthService>,
) -> Result<HttpResponse, TrackedError> {
    let user_id = authenticated_user(&claims)?;
    let context = ErrorContext::new("change_password").with_user_id(user_id);

    service
        .change_password(user_id, &form.old_password, &form.new_password)
        .await
        .map_err(|e| context.fail(e))?;

    Ok(HttpResponse::Ok().json(MessageResponse {
        message: "Password changed successfully".to_string(),
    }))
}

/// GET /auth/me
///
/// **Requires valid JWT access token**
pub async fn get_current_user(
    claims: web::ReqData<Claims>,
    service: web::Data<AuthService>,
) -> Result<HttpResponse, AppError> {
    let user_id = authenticated_user(&claims)?;
    let user = service.current_user(user_id).await?;
    Ok(HttpResponse::Ok().json(PublicUser::from(&user)))
}

/// PATCH /auth/account
///
/// **Requires valid JWT access token**
pub async fn update_account(
    claims: web::ReqData<Claims>,
    form: web::Json<UpdateAccountRequest>,
    service: web::Data<AuthService>,
) -> Result<HttpResponse, AppError> {
    let user_id = authenticated_user(&claims)?;
    let form = form.into_inner();

    let user = service
        .update_account(
            user_id,
            AccountUpdate {
                full_name: form.full_name,
                email: form.email,
            },
        )
        .await?;

    Ok(HttpResponse::Ok().json(PublicUser::from(&user)))
}
