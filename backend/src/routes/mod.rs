pub mod health;
pub mod schedule;
pub mod team;
pub mod working_hours;

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;

    use axum::{
        body::Body,
        http::{header, Method, Request, StatusCode},
        routing::get,
        Router,
    };
    use http_body_util::BodyExt;
    use serde_json::Value;
    use tower::ServiceExt;

    use crate::config::Config;
    use crate::db::repository::test_pool;
    use crate::services::SystemClock;
    use crate::AppState;

    pub async fn test_state() -> Arc<AppState> {
        Arc::new(AppState::new(
            test_pool().await,
            Config::default(),
            Arc::new(SystemClock),
        ))
    }

    /// The API without the rate limiter, which needs a peer address.
    pub fn app(state: Arc<AppState>) -> Router {
        Router::new()
            .route("/health", get(super::health::health_check))
            .nest("/api/team", super::team::router())
            .nest("/api/hours", super::working_hours::router())
            .nest(
                "/api/schedule",
                super::schedule::router().merge(super::schedule::generate_router()),
            )
            .with_state(state)
    }

    pub async fn send(
        state: &Arc<AppState>,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        match body {
            Some(json) => {
                send_raw(state, method, uri, Some("application/json"), &json.to_string()).await
            }
            None => send_raw(state, method, uri, None, "").await,
        }
    }

    /// Sends `body` verbatim with an optional `Content-Type`.
    pub async fn send_raw(
        state: &Arc<AppState>,
        method: Method,
        uri: &str,
        content_type: Option<&str>,
        body: &str,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(content_type) = content_type {
            builder = builder.header(header::CONTENT_TYPE, content_type);
        }

        let response = app(state.clone())
            .oneshot(builder.body(Body::from(body.to_string())).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }
}
