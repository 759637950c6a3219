use axum::Router;
use axum::routing::{get, post};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use super::handlers::{chat_handler, health_handler, reset_handler, set_mbti_handler};
use super::server::AppState;

pub(crate) fn build_router(state: AppState, max_body_size: usize) -> Router {
    let api = Router::new()
        .route("/set_mbti", post(set_mbti_handler))
        .route("/chat", post(chat_handler))
        .route("/reset", post(reset_handler))
        .layer(RequestBodyLimitLayer::new(max_body_size));

    Router::new()
        .route("/health", get(health_handler))
        .merge(api)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use tower::{Service, ServiceExt};

    use std::sync::Arc;

    use super::*;
    use crate::test_support::orchestrator;

    async fn make_router(responses: &[&str]) -> Router {
        let orch = orchestrator(responses.iter().map(|s| (*s).to_owned()).collect()).await;
        build_router(AppState::new(orch), 1_048_576)
    }

    fn post_json(uri: &str, body: &serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(body).unwrap()))
            .unwrap()
    }

    async fn call(app: &mut Router, req: Request<Body>) -> (u16, serde_json::Value) {
        let resp = app.call(req).await.unwrap();
        let status = resp.status().as_u16();
        let body = resp.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn health_returns_ok() {
        let app = make_router(&[]).await;
        let req = Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), 200);
        let body = resp.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "ok");
        assert_eq!(json["sessions"], 0);
    }

    #[tokio::test]
    async fn set_mbti_creates_session() {
        let mut app = make_router(&[]).await;
        let (status, json) = call(&mut app, post_json("/set_mbti", &serde_json::json!({"mbti": "infp"}))).await;
        assert_eq!(status, 200);
        assert_eq!(json["reply"], "Persona set to INFP.");
        assert!(!json["session"].as_str().unwrap().is_empty());
    }

    #[tokio::test]
    async fn set_mbti_keeps_given_session() {
        let mut app = make_router(&[]).await;
        let body = serde_json::json!({"session": "abc", "mbti": "ENTJ"});
        let (_, json) = call(&mut app, post_json("/set_mbti", &body)).await;
        assert_eq!(json["session"], "abc");
    }

    #[tokio::test]
    async fn set_mbti_rejects_unknown_type() {
        let mut app = make_router(&[]).await;
        let body = serde_json::json!({"session": "abc", "mbti": "ABCD"});
        let (status, json) = call(&mut app, post_json("/set_mbti", &body)).await;
        assert_eq!(status, 400);
        assert!(json["reply"].as_str().unwrap().contains("not an MBTI type"));
    }

    #[tokio::test]
    async fn rejected_set_mbti_registers_no_session() {
        let mut app = make_router(&[]).await;
        for body in [
            serde_json::json!({"mbti": "ABCD"}),
            serde_json::json!({"mbti": ""}),
            serde_json::json!({"session": "", "mbti": "INFX"}),
            serde_json::json!({"session": "named", "mbti": "nope"}),
        ] {
            let (status, _) = call(&mut app, post_json("/set_mbti", &body)).await;
            assert_eq!(status, 400);
        }

        let req = Request::builder().uri("/health").body(Body::empty()).unwrap();
        let (_, json) = call(&mut app, req).await;
        assert_eq!(json["sessions"], 0);
    }

    #[tokio::test]
    async fn evicted_session_must_select_persona_again() {
        let state = AppState::new(orchestrator(vec!["hi".into()]).await);
        let sessions = Arc::clone(&state.sessions);
        let mut app = build_router(state, 1_048_576);
        call(&mut app, post_json("/set_mbti", &serde_json::json!({"session": "e", "mbti": "INFP"}))).await;
        assert_eq!(sessions.len().await, 1);

        assert_eq!(sessions.evict_idle(std::time::Duration::ZERO).await, 1);

        let body = serde_json::json!({"session": "e", "message": "hello"});
        let (status, json) = call(&mut app, post_json("/chat", &body)).await;
        assert_eq!(status, 200);
        assert_eq!(json["reply"], "Please select an MBTI type first.");
        assert!(sessions.is_empty().await);
    }

    #[tokio::test]
    async fn chat_round_trip_records_history() {
        let mut app = make_router(&["Hello, dreamer."]).await;
        call(&mut app, post_json("/set_mbti", &serde_json::json!({"session": "s1", "mbti": "INFP"}))).await;

        let body = serde_json::json!({"session": "s1", "message": "hi"});
        let (status, json) = call(&mut app, post_json("/chat", &body)).await;
        assert_eq!(status, 200);
        assert_eq!(json["reply"], "Hello, dreamer.");
        assert_eq!(json["history"][0]["user"], "hi");
        assert_eq!(json["history"][0]["assistant"], "Hello, dreamer.");
    }

    #[tokio::test]
    async fn chat_without_persona_is_rejected_softly() {
        let mut app = make_router(&[]).await;
        let body = serde_json::json!({"session": "nobody", "message": "hi"});
        let (status, json) = call(&mut app, post_json("/chat", &body)).await;
        assert_eq!(status, 200);
        assert_eq!(json["reply"], "Please select an MBTI type first.");
        assert_eq!(json["history"].as_array().unwrap().len(), 0);
    }

    #[tokio::test]
    async fn chat_on_unindexed_persona_reports_missing_data() {
        let mut app = make_router(&["unused"]).await;
        call(&mut app, post_json("/set_mbti", &serde_json::json!({"session": "s", "mbti": "ESTP"}))).await;
        let body = serde_json::json!({"session": "s", "message": "hi"});
        let (_, json) = call(&mut app, post_json("/chat", &body)).await;
        assert!(json["reply"].as_str().unwrap().contains("no reference data for ESTP"));
        assert_eq!(json["history"].as_array().unwrap().len(), 0);
    }

    #[tokio::test]
    async fn reset_clears_history() {
        let mut app = make_router(&["one"]).await;
        call(&mut app, post_json("/set_mbti", &serde_json::json!({"session": "r", "mbti": "INFP"}))).await;
        call(&mut app, post_json("/chat", &serde_json::json!({"session": "r", "message": "x"}))).await;

        let (status, json) = call(&mut app, post_json("/reset", &serde_json::json!({"session": "r"}))).await;
        assert_eq!(status, 200);
        assert_eq!(json["reply"], "Conversation cleared.");

        let (status, _) = call(&mut app, post_json("/reset", &serde_json::json!({"session": "gone"}))).await;
        assert_eq!(status, 404);
    }

    #[tokio::test]
    async fn body_size_limit() {
        let orch = orchestrator(vec![]).await;
        let app = build_router(AppState::new(orch), 64);
        let oversized = vec![b'a'; 128];
        let req = Request::builder()
            .method("POST")
            .uri("/chat")
            .header("content-type", "application/json")
            .body(Body::from(oversized))
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), 413);
    }
}
