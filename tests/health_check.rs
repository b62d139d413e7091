//! Integration tests for the running server

use std::net::TcpListener;
use std::sync::Arc;

use authsvc::auth::AuthService;
use authsvc::configuration::{JwtSettings, PasswordSettings};
use authsvc::startup::run;
use authsvc::store::InMemoryUserStore;

fn spawn_app() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();

    let jwt = JwtSettings {
        access_secret: "access-secret".to_string(),
        access_token_expiry: 900,
        refresh_secret: "refresh-secret".to_string(),
        refresh_token_expiry: 864_000,
        issuer: "test".to_string(),
    };
    let service = AuthService::new(
        Arc::new(InMemoryUserStore::new()),
        &jwt,
        &PasswordSettings { bcrypt_cost: 4 },
    );
    let server = run(listener, service).expect("Failed to create server");

    let _ = tokio::spawn(server);

    format!("http://127.0.0.1:{}", port)
}

#[tokio::test]
async fn health_check_works() {
    let addr = spawn_app();

    let response = reqwest::Client::new()
        .get(&format!("{}/health_check", addr))
        .send()
        .await
        .expect("Failed to execute request");

    assert!(response.status().is_success());
    assert_eq!(Some(0), response.content_length());
}

#[tokio::test]
async fn protected_route_rejects_anonymous_request() {
    let addr = spawn_app();

    let response = reqwest::Client::new()
        .get(&format!("{}/auth/me", addr))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(401, response.status().as_u16());
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["code"], "MISSING_TOKEN");
}
