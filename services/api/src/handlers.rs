//! Axum Handlers for the HTTP endpoints
//!
//! Health check, Twilio's call-setup webhook and the OAuth callback. The
//! media stream itself is handled in `ws`.

use axum::{
    Form,
    extract::{Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Json, Response},
};
use secrecy::ExposeSecret;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::{
    models::{ErrorResponse, IncomingCallForm, OAuthCallbackParams, StatusResponse},
    state::AppState,
    twiml,
};

pub enum ApiError {
    BadRequest(String),
    NotConfigured(String),
    InternalServerError(anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::BadRequest(message) => {
                (StatusCode::BAD_REQUEST, Json(ErrorResponse { message })).into_response()
            }
            ApiError::NotConfigured(message) => {
                error!("Endpoint not configured: {}", message);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ErrorResponse { message }),
                )
                    .into_response()
            }
            ApiError::InternalServerError(err) => {
                error!("Internal Server Error: {:?}", err);
                let message = "An internal server error occurred.".to_string();
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ErrorResponse { message }),
                )
                    .into_response()
            }
        }
    }
}

impl<E> From<E> for ApiError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self::InternalServerError(err.into())
    }
}

/// Report that the service is up.
#[utoipa::path(
    get,
    path = "/",
    responses(
        (status = 200, description = "Service is running", body = StatusResponse)
    )
)]
pub async fn index() -> Json<StatusResponse> {
    Json(StatusResponse {
        message: "AI Concierge is running".to_string(),
    })
}

/// Answer an incoming call and connect it to the media stream.
///
/// Twilio may call this with either GET (query string) or POST (form body).
#[utoipa::path(
    post,
    path = "/incoming-call",
    request_body(content = IncomingCallForm, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 200, description = "TwiML connecting the call to the media stream", body = String, content_type = "application/xml")
    )
)]
pub async fn incoming_call(
    State(state): State<Arc<AppState>>,
    Form(form): Form<IncomingCallForm>,
) -> impl IntoResponse {
    let call_sid = form.call_sid.filter(|sid| !sid.is_empty());
    let token = match call_sid.as_deref() {
        Some(sid) => {
            let token = state.registry.register(sid);
            info!(call_sid = %sid, from = ?form.from, "Incoming call registered.");
            Some(token)
        }
        None => {
            warn!("Incoming call without a CallSid; the stream will fall back to the last known call.");
            None
        }
    };

    let document = twiml::connect_stream(
        twiml::GREETING,
        &state.config.media_stream_url,
        call_sid.as_deref(),
        token.as_deref(),
    );
    ([(header::CONTENT_TYPE, "application/xml")], document)
}

/// Exchange an OAuth authorization code for an access token.
#[utoipa::path(
    get,
    path = "/oauth/callback",
    responses(
        (status = 200, description = "Token endpoint response, passed through"),
        (status = 400, description = "Missing authorization code"),
        (status = 500, description = "OAuth client not configured", body = ErrorResponse)
    ),
    params(
        ("code" = String, Query, description = "The authorization code"),
        ("state" = Option<String>, Query, description = "Opaque state echoed by the provider")
    )
)]
pub async fn oauth_callback(
    State(state): State<Arc<AppState>>,
    Query(params): Query<OAuthCallbackParams>,
) -> Result<impl IntoResponse, ApiError> {
    if params.code.is_empty() {
        return Err(ApiError::BadRequest("code is required".to_string()));
    }
    let oauth = &state.config.oauth;
    let (Some(client_id), Some(client_secret)) = (&oauth.client_id, &oauth.client_secret) else {
        return Err(ApiError::NotConfigured(
            "OAuth client credentials are not configured".to_string(),
        ));
    };
    info!(state = ?params.state, "Received authorization code.");

    let response = state
        .http_client
        .post(&oauth.token_url)
        .form(&[
            ("grant_type", "authorization_code"),
            ("code", params.code.as_str()),
            ("redirect_uri", oauth.redirect_uri.as_str()),
            ("client_id", client_id.as_str()),
            ("client_secret", client_secret.expose_secret()),
        ])
        .send()
        .await?;

    let status = response.status();
    let body: serde_json::Value = response.json().await?;
    info!(%status, "Token endpoint responded.");
    Ok((status, Json(body)))
}
