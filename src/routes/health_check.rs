use actix_web::HttpResponse;

/// GET /health_check
///
/// Liveness only; the store is not touched.
pub async fn health_check() -> HttpResponse {
    HttpResponse::Ok().finish()
}
