use chess_vision_agent::adapters::HttpVisionOracle;
use chess_vision_agent::domain::ports::VisionOracle;
use chess_vision_agent::{decode, AgentError, Square};
use httpmock::prelude::*;
use serde_json::json;
use std::time::Duration;

fn sq(name: &str) -> Square {
    name.parse().unwrap()
}

/// 模擬推論端點：token 與圖片需正確傳遞
#[tokio::test]
async fn test_read_board_posts_frame_with_token() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(POST)
            .path("/models/vision")
            .header("authorization", "Bearer hf_test_token")
            .body_contains("\"image\":\"ZnJhbWU=\"");
        then.status(200).json_body(json!([{
            "generated_text": "Sure! {\"e1\": {\"piece\": \"king\", \"color\": \"white\"}, \"e8\": \"black_king\", \"d2\": {\"piece\": \"pawn\", \"color\": \"white\"}}"
        }]));
    });

    let oracle = HttpVisionOracle::new(
        server.url("/models/vision"),
        Some("hf_test_token".to_string()),
    );
    let labels = oracle.read_board(b"frame").await.unwrap();

    mock.assert();
    assert_eq!(labels[&sq("e1")], "white_king");
    assert_eq!(labels[&sq("e8")], "black_king");
    let snapshot = decode(&labels).unwrap();
    assert_eq!(snapshot.placement_fen(), "4k3/8/8/8/8/8/3P4/4K3");
}

#[tokio::test]
async fn test_custom_prompt_is_sent() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(POST)
            .path("/vqa")
            .body_contains("list every piece");
        then.status(200)
            .json_body(json!({ "answer": "a1: white rook\nh8: black king\ne1: white king" }));
    });

    let oracle = HttpVisionOracle::new(server.url("/vqa"), None).with_prompt("list every piece");
    let labels = oracle.read_board(b"png").await.unwrap();

    mock.assert();
    assert_eq!(labels[&sq("a1")], "white_rook");
    assert_eq!(labels[&sq("h8")], "black_king");
}

#[tokio::test]
async fn test_server_error_is_vision_error() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(POST).path("/vision");
        then.status(500).body("internal error");
    });

    let oracle = HttpVisionOracle::new(server.url("/vision"), None);
    let err = oracle.read_board(b"frame").await.unwrap_err();

    mock.assert_hits(1);
    match err {
        AgentError::VisionError { message } => assert!(message.contains("500"), "{message}"),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_loading_model_is_retried_once() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(POST).path("/vision");
        then.status(503).json_body(json!({ "error": "Model is currently loading" }));
    });

    let oracle = HttpVisionOracle::new(server.url("/vision"), None)
        .with_loading_retry_delay(Duration::ZERO);
    let err = oracle.read_board(b"frame").await.unwrap_err();

    mock.assert_hits(2);
    assert!(matches!(err, AgentError::VisionError { .. }));
}

#[tokio::test]
async fn test_unreadable_reply_is_decode_error() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path("/vision");
        then.status(200)
            .json_body(json!([{ "generated_text": "I cannot see a chess board here." }]));
    });

    let oracle = HttpVisionOracle::new(server.url("/vision"), None);
    let err = oracle.read_board(b"frame").await.unwrap_err();

    assert!(matches!(err, AgentError::DecodeError(_)), "{err:?}");
}
