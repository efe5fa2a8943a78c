//! Route tests for the proxy server
//!
//! The router is driven in-process with `oneshot`; providers are fakes.

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use palaver::api::AudioUpload;
use palaver::messages::ChatTurn;
use palaver::server::mock::{MOCK_REPLIES, MOCK_TRANSCRIPT};
use palaver::server::{
    routes, AppState, ChatProvider, Completion, Environment, ProviderError, ServerConfig,
    SpeechProvider,
};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

const BOUNDARY: &str = "palaver-test-boundary";

struct FakeChat {
    result: Result<Completion, ProviderError>,
    seen: Mutex<Vec<Vec<ChatTurn>>>,
}

impl FakeChat {
    fn new(result: Result<Completion, ProviderError>) -> Arc<Self> {
        Arc::new(Self {
            result,
            seen: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl ChatProvider for FakeChat {
    async fn complete(&self, messages: &[ChatTurn]) -> Result<Completion, ProviderError> {
        self.seen.lock().push(messages.to_vec());
        self.result.clone()
    }
}

struct FakeSpeech {
    result: Result<String, ProviderError>,
    seen: Mutex<Vec<AudioUpload>>,
}

impl FakeSpeech {
    fn new(result: Result<String, ProviderError>) -> Arc<Self> {
        Arc::new(Self {
            result,
            seen: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl SpeechProvider for FakeSpeech {
    async fn transcribe(&self, audio: AudioUpload) -> Result<String, ProviderError> {
        self.seen.lock().push(audio);
        self.result.clone()
    }
}

fn keyed_config() -> ServerConfig {
    let mut config = ServerConfig::default();
    config.openai_api_key = Some("sk-test".to_string());
    config
}

fn app(
    config: ServerConfig,
    chat: Option<Arc<dyn ChatProvider>>,
    speech: Option<Arc<dyn SpeechProvider>>,
) -> Router {
    routes::build(Arc::new(AppState::with_providers(config, chat, speech)))
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

fn chat_request(body: impl Into<String>) -> Request<Body> {
    Request::post("/api/chat")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.into()))
        .unwrap()
}

fn multipart_request(field: &str, file_name: &str, content_type: &str, data: &[u8]) -> Request<Body> {
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"{file_name}\"\r\nContent-Type: {content_type}\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

    Request::post("/api/transcribe")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

#[tokio::test]
async fn test_health() {
    let request = Request::get("/health").body(Body::empty()).unwrap();
    let (status, body) = send(app(ServerConfig::default(), None, None), request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn test_chat_rejects_non_json_body() {
    let (status, body) = send(app(ServerConfig::default(), None, None), chat_request("not json")).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid request body");
    assert!(body["details"].is_string());
}

#[tokio::test]
async fn test_chat_rejects_missing_messages() {
    for payload in [json!({}), json!({"messages": "hello"})] {
        let (status, body) = send(
            app(ServerConfig::default(), None, None),
            chat_request(payload.to_string()),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Invalid request body");
    }
}

#[tokio::test]
async fn test_chat_mock_reply_without_key() {
    let payload = json!({"messages": [{"role": "user", "content": "Hi"}]});
    let (status, body) = send(
        app(ServerConfig::default(), None, None),
        chat_request(payload.to_string()),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert!(body["id"].as_str().unwrap().starts_with("mock-"));
    assert!(MOCK_REPLIES.contains(&body["content"].as_str().unwrap()));
    assert_eq!(body["role"], "assistant");
    assert!(body["timestamp"].is_string());
}

#[tokio::test]
async fn test_chat_forwards_to_provider() {
    let provider = FakeChat::new(Ok(Completion {
        id: "chatcmpl-1".to_string(),
        content: "Hello there".to_string(),
        role: "assistant".to_string(),
    }));
    let payload = json!({"messages": [
        {"role": "system", "content": "Be brief"},
        {"role": "assistant", "content": "Hi!"},
        {"role": "user", "content": "Hello"}
    ]});

    let (status, body) = send(
        app(keyed_config(), Some(provider.clone()), None),
        chat_request(payload.to_string()),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], "chatcmpl-1");
    assert_eq!(body["content"], "Hello there");

    let seen = provider.seen.lock();
    let roles: Vec<&str> = seen[0].iter().map(|t| t.role.as_str()).collect();
    assert_eq!(roles, ["system", "assistant", "user"]);
}

#[tokio::test]
async fn test_chat_quota_error_is_429() {
    let provider = FakeChat::new(Err(ProviderError::Api {
        status: 429,
        code: Some("insufficient_quota".to_string()),
        message: Some("You exceeded your current quota".to_string()),
    }));
    let payload = json!({"messages": [{"role": "user", "content": "Hi"}]});

    let (status, body) = send(
        app(keyed_config(), Some(provider), None),
        chat_request(payload.to_string()),
    )
    .await;

    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    let error = body["error"].as_str().unwrap();
    assert!(error.starts_with("API quota exceeded."));
    assert!(error.contains("You exceeded your current quota"));
}

#[tokio::test]
async fn test_chat_upstream_details_follow_environment() {
    let failure = || {
        FakeChat::new(Err(ProviderError::Api {
            status: 401,
            code: None,
            message: Some("Invalid API key".to_string()),
        }))
    };
    let payload = json!({"messages": [{"role": "user", "content": "Hi"}]}).to_string();

    let (status, body) = send(
        app(keyed_config(), Some(failure()), None),
        chat_request(payload.clone()),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "Invalid API key");
    assert!(body["details"].is_string());

    let mut production = keyed_config();
    production.environment = Environment::Production;
    let (status, body) = send(app(production, Some(failure()), None), chat_request(payload)).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body.get("details").is_none());
}

#[tokio::test]
async fn test_transcribe_requires_audio_field() {
    let (status, body) = send(
        app(keyed_config(), None, Some(FakeSpeech::new(Ok("unused".into())))),
        multipart_request("file", "clip.webm", "audio/webm", b"abc"),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "No audio file provided");

    let not_multipart = Request::post("/api/transcribe")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{}"))
        .unwrap();
    let (status, body) = send(app(keyed_config(), None, None), not_multipart).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "No audio file provided");
}

#[tokio::test]
async fn test_transcribe_forwards_audio() {
    let speech = FakeSpeech::new(Ok("turn on the lights".to_string()));
    let (status, body) = send(
        app(keyed_config(), None, Some(speech.clone())),
        multipart_request("audio", "clip.wav", "audio/wav", b"RIFF0000WAVE"),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["text"], "turn on the lights");

    let seen = speech.seen.lock();
    assert_eq!(seen[0].file_name, "clip.wav");
    assert_eq!(seen[0].mime_type, "audio/wav");
    assert_eq!(seen[0].bytes, b"RIFF0000WAVE");
}

#[tokio::test]
async fn test_transcribe_mock_in_development_without_key() {
    let (status, body) = send(
        app(ServerConfig::default(), None, None),
        multipart_request("audio", "recording.webm", "audio/webm", b"abc"),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["text"], MOCK_TRANSCRIPT);
}

#[tokio::test]
async fn test_transcribe_failure_without_mock() {
    let mut production = ServerConfig::default();
    production.environment = Environment::Production;
    let (status, body) = send(
        app(production, None, None),
        multipart_request("audio", "recording.webm", "audio/webm", b"abc"),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "Failed to transcribe audio");

    let speech = FakeSpeech::new(Err(ProviderError::Transport("connection reset".into())));
    let (status, body) = send(
        app(keyed_config(), None, Some(speech)),
        multipart_request("audio", "recording.webm", "audio/webm", b"abc"),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "Failed to transcribe audio");
}

#[tokio::test]
async fn test_transcribe_rejects_oversized_upload() {
    let mut config = keyed_config();
    config.max_audio_bytes = 64;
    let speech = FakeSpeech::new(Ok("unused".to_string()));

    let (status, _) = send(
        app(config, None, Some(speech.clone())),
        multipart_request("audio", "recording.webm", "audio/webm", &[7u8; 4096]),
    )
    .await;

    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert!(speech.seen.lock().is_empty());
}
