//! Axum Router Configuration
//!
//! This module defines the complete HTTP routing for the application,
//! including the Twilio webhooks, the media stream endpoint, and OpenAPI
//! documentation.

use crate::{
    handlers,
    models::{ErrorResponse, IncomingCallForm, StatusResponse},
    state::AppState,
    ws::media_stream_handler,
};

use axum::{Router, routing::get};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::index,
        handlers::incoming_call,
        handlers::oauth_callback,
    ),
    components(
        schemas(StatusResponse, IncomingCallForm, ErrorResponse)
    ),
    tags(
        (name = "Concierge API", description = "Twilio voice webhooks for the AI concierge relay")
    )
)]
pub struct ApiDoc;

/// Creates the main Axum router for the application.
pub fn create_router(app_state: Arc<AppState>) -> Router {
    let api_router = Router::new()
        .route("/", get(handlers::index))
        .route(
            "/incoming-call",
            get(handlers::incoming_call).post(handlers::incoming_call),
        )
        .route("/oauth/callback", get(handlers::oauth_callback))
        .route("/media-stream", get(media_stream_handler))
        .with_state(app_state);

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(api_router)
        .layer(TraceLayer::new_for_http())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::test_support::test_state;
    use axum::{
        body::{Body, to_bytes},
        http::{Request, StatusCode, header},
    };
    use tower::ServiceExt;

    async fn body_string(response: axum::response::Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_index_reports_status() {
        let app = create_router(test_state());
        let response = app
            .oneshot(Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            body_string(response).await,
            r#"{"message":"AI Concierge is running"}"#
        );
    }

    #[tokio::test]
    async fn test_incoming_call_post_registers_call() {
        let state = test_state();
        let app = create_router(state.clone());
        let response = app
            .oneshot(
                Request::post("/incoming-call")
                    .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                    .body(Body::from("CallSid=CA42&From=%2B15550100"))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "application/xml"
        );
        let body = body_string(response).await;
        assert!(body.contains("<Say>Thank you for calling Absolute Healthcare"));
        assert!(body.contains("wss://relay.test/media-stream?callSid=CA42&amp;token="));
        assert!(body.contains(r#"<Parameter name="callSid" value="CA42"/>"#));

        assert_eq!(state.registry.last_known().as_deref(), Some("CA42"));
        assert_eq!(state.registry.len(), 1);
    }

    #[tokio::test]
    async fn test_incoming_call_get_reads_query() {
        let state = test_state();
        let app = create_router(state.clone());
        let response = app
            .oneshot(
                Request::get("/incoming-call?CallSid=CA7")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_string(response).await.contains("callSid=CA7"));
        assert_eq!(state.registry.resolve(None, None).as_deref(), Some("CA7"));
    }

    #[tokio::test]
    async fn test_oauth_callback_requires_configuration() {
        let app = create_router(test_state());
        let response = app
            .oneshot(
                Request::get("/oauth/callback?code=abc")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body_string(response).await.contains("not configured"));
    }

    #[tokio::test]
    async fn test_oauth_callback_requires_code() {
        let app = create_router(test_state());
        let response = app
            .oneshot(Request::get("/oauth/callback").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
