//! Exercises the reqwest backend against a local stub of the completion API.

use std::sync::Arc;
use std::time::Duration;

use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use base64::Engine as _;
use livecast_types::{CredentialState, ScriptSegment};
use livecast_voice::{
    ApiKey, AudioSynthesizer, CompletionBackend, CredentialRotator, HttpBackend, Persona,
    ReferenceVoiceSynthesizer, RetryPolicy, SynthesisSettings, UpstreamClient, UpstreamError,
    VoiceError, MAX_COOLDOWN,
};
use serde_json::{json, Value};

/// Behaviour is selected by the bearer token so one stub covers every case.
async fn completions(headers: HeaderMap, Json(body): Json<Value>) -> Response {
    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .unwrap_or("")
        .to_string();

    match token.as_str() {
        "limited" => (StatusCode::TOO_MANY_REQUESTS, [(header::RETRY_AFTER, "7")], "slow down")
            .into_response(),
        "flooded" => (
            StatusCode::TOO_MANY_REQUESTS,
            [(header::RETRY_AFTER, u64::MAX.to_string())],
            "slow down",
        )
            .into_response(),
        "revoked" => (StatusCode::UNAUTHORIZED, "bad key").into_response(),
        "broken" => (StatusCode::INTERNAL_SERVER_ERROR, "boom").into_response(),
        "garbled" => (StatusCode::OK, "<html>not json</html>").into_response(),
        _ => {
            let audio = base64::engine::general_purpose::STANDARD.encode(b"RIFFfake");
            Json(json!({
                "choices": [{
                    "message": {
                        "role": "assistant",
                        "content": body["model"],
                        "audio": {"data": audio, "format": "wav"}
                    }
                }]
            }))
            .into_response()
        }
    }
}

async fn spawn_stub() -> String {
    let app = Router::new().route("/v1/chat/completions", post(completions));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}/v1")
}

#[tokio::test]
async fn classifies_upstream_statuses() {
    let base = spawn_stub().await;
    let backend = HttpBackend::new(&base, Duration::from_secs(5)).unwrap();
    let body = json!({"model": "voice-model"});

    let err = backend.complete(&ApiKey::new("limited"), &body).await.unwrap_err();
    assert_eq!(
        err,
        UpstreamError::RateLimited {
            retry_after: Some(Duration::from_secs(7))
        }
    );

    let err = backend.complete(&ApiKey::new("revoked"), &body).await.unwrap_err();
    assert!(matches!(err, UpstreamError::InvalidCredential(_)));

    let err = backend.complete(&ApiKey::new("broken"), &body).await.unwrap_err();
    match err {
        UpstreamError::Transport(msg) => assert!(msg.contains("500")),
        other => panic!("unexpected: {other:?}"),
    }

    let err = backend.complete(&ApiKey::new("garbled"), &body).await.unwrap_err();
    assert!(matches!(err, UpstreamError::Malformed(_)));

    let ok = backend.complete(&ApiKey::new("good"), &body).await.unwrap();
    assert_eq!(ok["choices"][0]["message"]["content"], "voice-model");
}

#[tokio::test]
async fn unreachable_upstream_is_transport_error() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let backend = HttpBackend::new(&format!("http://{addr}/v1"), Duration::from_secs(2)).unwrap();
    let err = backend
        .complete(&ApiKey::new("good"), &json!({}))
        .await
        .unwrap_err();
    assert!(matches!(err, UpstreamError::Transport(_)));
}

#[tokio::test]
async fn synthesizer_rotates_past_limited_key() {
    let base = spawn_stub().await;
    let rotator = Arc::new(CredentialRotator::from_comma_separated(
        "limited,good",
        Duration::from_secs(60),
    ));
    let upstream = UpstreamClient::new(
        Arc::clone(&rotator),
        Arc::new(HttpBackend::new(&base, Duration::from_secs(5)).unwrap()),
        RetryPolicy {
            max_attempts: 3,
            backoff_base: Duration::from_millis(10),
            backoff_max: Duration::from_millis(20),
            attempt_timeout: Duration::from_secs(5),
        },
    );
    let synth = ReferenceVoiceSynthesizer::new(
        upstream,
        SynthesisSettings {
            model: "voice-model".into(),
            max_completion_tokens: 1024,
            temperature: 1.0,
            top_p: 0.95,
            top_k: 50,
        },
    );
    let persona = Persona {
        key: "speed".into(),
        reference_audio: b"RIFFref".to_vec(),
        reference_format: "wav".into(),
        transcript: "yo".into(),
        scene_description: "loud".into(),
    };

    let audio = synth
        .synthesize(&ScriptSegment::new("We are live!", "speed"), &persona)
        .await
        .unwrap();
    assert_eq!(audio.audio_bytes, b"RIFFfake");
    assert_eq!(audio.mime_type, "audio/wav");

    let states: Vec<CredentialState> = rotator.snapshot().iter().map(|s| s.state).collect();
    assert_eq!(states, vec![CredentialState::Cooling, CredentialState::Active]);
}

#[tokio::test]
async fn revoked_pool_reports_no_credentials() {
    let base = spawn_stub().await;
    let rotator = Arc::new(CredentialRotator::from_comma_separated(
        "revoked",
        Duration::from_secs(60),
    ));
    let upstream = UpstreamClient::new(
        rotator,
        Arc::new(HttpBackend::new(&base, Duration::from_secs(5)).unwrap()),
        RetryPolicy {
            max_attempts: 3,
            backoff_base: Duration::from_millis(10),
            backoff_max: Duration::from_millis(20),
            attempt_timeout: Duration::from_secs(5),
        },
    );

    let err = upstream
        .call("audio", &json!({}), |v| Ok(v.clone()))
        .await
        .unwrap_err();
    assert_eq!(err, VoiceError::NoCredentialsAvailable);
}

#[tokio::test]
async fn oversized_retry_after_is_capped_and_rotation_continues() {
    let base = spawn_stub().await;
    let backend = Arc::new(HttpBackend::new(&base, Duration::from_secs(5)).unwrap());

    let err = backend
        .complete(&ApiKey::new("flooded"), &json!({}))
        .await
        .unwrap_err();
    assert_eq!(
        err,
        UpstreamError::RateLimited {
            retry_after: Some(MAX_COOLDOWN)
        }
    );

    let rotator = Arc::new(CredentialRotator::from_comma_separated(
        "flooded,good",
        Duration::from_secs(60),
    ));
    let upstream = UpstreamClient::new(
        Arc::clone(&rotator),
        backend,
        RetryPolicy {
            max_attempts: 3,
            backoff_base: Duration::from_millis(10),
            backoff_max: Duration::from_millis(20),
            attempt_timeout: Duration::from_secs(5),
        },
    );

    // Run on its own task so a panic inside the call surfaces as a JoinError.
    let reply = tokio::spawn(async move {
        upstream
            .call("script", &json!({"model": "script-model"}), |v| Ok(v.clone()))
            .await
    })
    .await
    .expect("upstream call must not panic")
    .expect("second key should succeed");
    assert_eq!(reply["choices"][0]["message"]["content"], "script-model");

    let states: Vec<CredentialState> = rotator.snapshot().iter().map(|s| s.state).collect();
    assert_eq!(states, vec![CredentialState::Cooling, CredentialState::Active]);
    let cooldown = rotator.snapshot()[0].cooldown_remaining_ms.unwrap_or_default();
    assert!(cooldown <= MAX_COOLDOWN.as_millis() as u64);
}
