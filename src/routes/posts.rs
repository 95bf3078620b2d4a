use actix_web::http::StatusCode;
use actix_web::{web, HttpResponse};
use serde::Deserialize;

use crate::routes::message_response;
use crate::social::{compose_post, CrossPoster};

#[derive(Deserialize, Debug)]
pub struct SocialPostBody {
    pub url: Option<String>,
    pub take: Option<String>,
}

#[tracing::instrument(name = "Posting a story to social", skip(body, cross_poster), fields(url = ?body.url))]
pub async fn handle_social_post(
    body: web::Json<SocialPostBody>,
    cross_poster: web::Data<CrossPoster>,
) -> HttpResponse {
    let SocialPostBody { url, take } = body.into_inner();
    let (url, take) = match (non_blank(url), non_blank(take)) {
        (Some(url), Some(take)) => (url, take),
        _ => return message_response(StatusCode::BAD_REQUEST, "Missing url or take"),
    };

    let text = compose_post(&url, &take, cross_poster.max_post_length());
    if cross_poster.post(&text).await {
        HttpResponse::Ok().json(serde_json::json!({ "message": "Posted", "text": text }))
    } else {
        message_response(StatusCode::BAD_GATEWAY, "Failed to post to social")
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
