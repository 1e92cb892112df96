//! Generate client tests against a local HTTP server

use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{Value, json};

use talkback::{Error, GenerateClient, ReplyGenerator};

async fn serve(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind test listener");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("test server");
    });
    format!("http://{addr}/process")
}

#[tokio::test]
async fn posts_message_and_reads_answer() {
    let app = Router::new().route(
        "/process",
        post(|Json(body): Json<Value>| async move {
            let message = body["message"].as_str().unwrap_or_default();
            assert_eq!(body.as_object().map(serde_json::Map::len), Some(1));
            Json(json!({ "answer": format!("echo: {message}") }))
        }),
    );
    let endpoint = serve(app).await;

    let client = GenerateClient::new(&endpoint).expect("client");
    let answer = client.generate("hello there").await.expect("generate");
    assert_eq!(answer, "echo: hello there");
}

#[tokio::test]
async fn server_error_status_is_reported() {
    let app = Router::new().route(
        "/process",
        post(|| async { (StatusCode::SERVICE_UNAVAILABLE, "overloaded") }),
    );
    let endpoint = serve(app).await;

    let client = GenerateClient::new(&endpoint).expect("client");
    let error = client.generate("hello").await.expect_err("must fail");
    match error {
        Error::Generate(message) => assert!(message.contains("503"), "got: {message}"),
        other => panic!("unexpected error variant: {other}"),
    }
}

#[tokio::test]
async fn missing_answer_field_is_an_error() {
    let app = Router::new().route(
        "/process",
        post(|| async { Json(json!({ "unexpected": true })) }),
    );
    let endpoint = serve(app).await;

    let client = GenerateClient::new(&endpoint).expect("client");
    let error = client.generate("hello").await.expect_err("must fail");
    match error {
        Error::Generate(message) => {
            assert!(message.contains("malformed"), "got: {message}");
        }
        other => panic!("unexpected error variant: {other}"),
    }
}

#[tokio::test]
async fn non_json_body_is_an_error() {
    let app = Router::new().route("/process", post(|| async { "plain text, not json" }));
    let endpoint = serve(app).await;

    let client = GenerateClient::new(&endpoint).expect("client");
    assert!(client.generate("hello").await.is_err());
}
