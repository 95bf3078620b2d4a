use actix_web::{HttpRequest, HttpResponse, Responder};

/// Liveness probe.
#[tracing::instrument(name = "Health Check handler", skip_all)]
pub async fn health_check(_: HttpRequest) -> impl Responder {
    HttpResponse::Ok()
}
