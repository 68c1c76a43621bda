//! Remote responder client tests against a loopback chat backend
//!
//! The client absorbs every failure into one of two fixed sentences, so the
//! interaction loop always has something to say. Each test stands up a small
//! axum server playing one backend behavior.

use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use url::Url;

use visage::{ResponderClient, UtteranceSource, ERROR_REPLY, FALLBACK_REPLY};

/// Serve the given router on a loopback port and return the chat endpoint
async fn serve(app: Router) -> Url {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind loopback");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("serve backend");
    });
    Url::parse(&format!("http://{addr}/api/chat")).expect("chat url")
}

fn chat_route<H, T>(handler: H) -> Router
where
    H: axum::handler::Handler<T, ()>,
    T: 'static,
{
    Router::new().route("/api/chat", post(handler))
}

#[tokio::test]
async fn test_successful_reply_is_spoken_verbatim() {
    let endpoint = serve(chat_route(|Json(body): Json<serde_json::Value>| async move {
        assert_eq!(body["message"], "why is the sky blue");
        Json(serde_json::json!({
            "success": true,
            "response": "Rayleigh scattering."
        }))
    }))
    .await;

    let utterance = ResponderClient::new(endpoint)
        .ask("why is the sky blue")
        .await;
    assert_eq!(utterance.text, "Rayleigh scattering.");
    assert_eq!(utterance.source, UtteranceSource::RemoteReply);
}

#[tokio::test]
async fn test_unsuccessful_reply_falls_back() {
    let endpoint = serve(chat_route(|| async {
        Json(serde_json::json!({ "success": false, "response": null }))
    }))
    .await;

    let utterance = ResponderClient::new(endpoint).ask("hmm").await;
    assert_eq!(utterance.text, FALLBACK_REPLY);
    assert_eq!(utterance.source, UtteranceSource::ErrorReply);
}

#[tokio::test]
async fn test_error_status_becomes_error_reply() {
    let endpoint = serve(chat_route(|| async {
        (StatusCode::INTERNAL_SERVER_ERROR, "boom")
    }))
    .await;

    let utterance = ResponderClient::new(endpoint).ask("hello").await;
    assert_eq!(utterance.text, ERROR_REPLY);
    assert_eq!(utterance.source, UtteranceSource::ErrorReply);
}

#[tokio::test]
async fn test_malformed_body_becomes_error_reply() {
    let endpoint = serve(chat_route(|| async { "not json at all" })).await;

    let utterance = ResponderClient::new(endpoint).ask("hello").await;
    assert_eq!(utterance.text, ERROR_REPLY);
}

#[tokio::test]
async fn test_unreachable_backend_becomes_error_reply() {
    // Grab a free port, then close it so nothing is listening there.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind loopback");
    let addr = listener.local_addr().expect("local addr");
    drop(listener);

    let endpoint = Url::parse(&format!("http://{addr}/api/chat")).expect("chat url");
    let utterance = ResponderClient::new(endpoint).ask("hello").await;
    assert_eq!(utterance.text, ERROR_REPLY);
}
