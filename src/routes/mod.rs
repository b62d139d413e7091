mod auth;
mod health_check;

pub use auth::{
    change_password, get_current_user, login, logout, refresh, register, update_account,
    AuthResponse, MessageResponse, REFRESH_TOKEN_COOKIE,
};
pub use health_check::health_check;

use actix_web::web;

use crate::auth::AuthService;
use crate::middleware::JwtMiddleware;

/// Register every route, wrapping the protected ones in `JwtMiddleware`.
pub fn configure(service: web::Data<AuthService>) -> impl FnOnce(&mut web::ServiceConfig) {
    move |cfg| {
        let keys = service.token_keys().clone();

        cfg.app_data(service)
            // Public routes (no authentication required)
            .route("/health_check", web::get().to(health_check))
            .service(
                web::scope("/auth")
                    .route("/register", web::post().to(register))
                    .route("/login", web::post().to(login))
                    .route("/refresh", web::post().to(refresh))
                    // Protected routes (require JWT authentication)
                    .service(
                        web::resource("/logout")
                            .wrap(JwtMiddleware::new(keys.clone()))
                            .route(web::post().to(logout)),
                    )
                    .service(
                        web::resource("/change-password")
                            .wrap(JwtMiddleware::new(keys.clone()))
                            .route(web::post().to(change_password)),
                    )
                    .service(
                        web::resource("/me")
                            .wrap(JwtMiddleware::new(keys.clone()))
                            .route(web::get().to(get_current_user)),
                    )
                    .service(
                        web::resource("/account")
                            .wrap(JwtMiddleware::new(keys))
                            .route(web::patch().to(update_account)),
                    ),
            );
    }
}
