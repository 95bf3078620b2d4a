use actix_web::http::StatusCode;
use actix_web::HttpResponse;

mod health_check;
mod newsletters;
mod posts;
mod stories;
mod subscriptions;

pub use health_check::*;
pub use newsletters::*;
pub use posts::*;
pub use stories::*;
pub use subscriptions::*;

/// JSON body shared by every error response.
fn message_response(status: StatusCode, message: impl std::fmt::Display) -> HttpResponse {
    HttpResponse::build(status).json(serde_json::json!({ "message": message.to_string() }))
}

fn error_chain_fmt(
    e: &impl std::error::Error,
    f: &mut std::fmt::Formatter<'_>,
) -> std::fmt::Result {
    writeln!(f, "{}", e)?;
    let mut current = e.source();
    while let Some(cause) = current {
        writeln!(f, "Caused by:\n\t{}", cause)?;
        current = cause.source();
    }
    Ok(())
}
