use std::time::Instant;

use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderMap, StatusCode},
    Json,
};
use metrics::{counter, histogram};
use tracing::{debug, error, info};

use referral_core::{Referral, ReferralEmail, ReferralSubmission};
use referral_mail::send_best_effort;

use crate::error::ApiError;
use crate::router::AppState;

/// `POST /api/referrals`
///
/// Validates the four fields, persists the referral and then emails the
/// referee. Only a storage failure changes the response; a failed email is
/// logged and the created record is still returned.
pub async fn create(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<Referral>), ApiError> {
    let submission = if is_json_content(&headers) {
        decode_submission(&body)
    } else {
        debug!(stage = "intake", "referral payload is not application/json; ignoring body");
        ReferralSubmission::default()
    };

    let new_referral = submission.validate(state.now()).map_err(|err| {
        counter!("referral_requests_total", "result" => "invalid").increment(1);
        ApiError::from(err)
    })?;

    let started = Instant::now();
    let stored = state.store().insert(new_referral).await;
    histogram!("referral_step_duration_seconds", "step" => "store")
        .record(started.elapsed().as_secs_f64());
    let referral = stored.map_err(|err| {
        counter!("referral_requests_total", "result" => "storage_error").increment(1);
        error!(stage = "intake", backend = state.store().backend(), error = %err, "error saving referral");
        ApiError::Internal
    })?;

    counter!("referral_requests_total", "result" => "created").increment(1);
    info!(stage = "intake", referral_id = %referral.id, "referral saved");

    let email = ReferralEmail::for_referral(&referral);
    let started = Instant::now();
    let outcome = send_best_effort(state.notifier(), &email).await;
    histogram!("referral_step_duration_seconds", "step" => "notify")
        .record(started.elapsed().as_secs_f64());
    counter!("referral_notifications_total", "result" => outcome.as_str()).increment(1);

    Ok((StatusCode::CREATED, Json(referral)))
}

/// Only `application/json` bodies are read; parameters such as `charset` are
/// ignored.
fn is_json_content(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(';').next())
        .is_some_and(|essence| essence.trim().eq_ignore_ascii_case("application/json"))
}

/// Anything that is not a JSON object of optional strings decodes to an empty
/// submission and is then rejected by validation.
fn decode_submission(body: &[u8]) -> ReferralSubmission {
    if body.is_empty() {
        return ReferralSubmission::default();
    }
    serde_json::from_slice(body).unwrap_or_else(|err| {
        debug!(stage = "intake", error = %err, "unreadable referral payload");
        ReferralSubmission::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::Request, response::Response};
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::router::app_router;
    use crate::testing::{fixed_now, test_state, RecordingNotifier, RecordingStore};

    fn post(body: impl Into<Body>) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/referrals")
            .header("content-type", "application/json")
            .body(body.into())
            .unwrap()
    }

    fn alice_refers_bob() -> Value {
        json!({
            "referrerName": "Alice",
            "referrerEmail": "alice@x.com",
            "refereeName": "Bob",
            "refereeEmail": "bob@x.com",
        })
    }

    async fn body_json(response: Response) -> Value {
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("body should read")
            .to_bytes();
        serde_json::from_slice(&bytes).expect("json body")
    }

    #[tokio::test]
    async fn creates_referral_and_emails_referee() {
        let (state, store, notifier) = test_state(RecordingStore::new(), RecordingNotifier::new());
        let app = app_router(state);

        let response = app
            .oneshot(post(alice_refers_bob().to_string()))
            .await
            .expect("handler should respond");

        assert_eq!(response.status(), StatusCode::CREATED);
        let body = body_json(response).await;
        assert_eq!(body["referrerName"], "Alice");
        assert_eq!(body["referrerEmail"], "alice@x.com");
        assert_eq!(body["refereeName"], "Bob");
        assert_eq!(body["refereeEmail"], "bob@x.com");
        assert_eq!(body["_id"], "ref-1");
        assert_eq!(body["createdAt"], json!(fixed_now()));

        let records = store.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].created_at, fixed_now());

        let attempts = notifier.attempts();
        assert_eq!(attempts.len(), 1);
        assert_eq!(attempts[0].to, "bob@x.com");
        assert_eq!(attempts[0].subject, "Referral from Alice");
        assert!(attempts[0].body.contains("alice@x.com"));
    }

    #[tokio::test]
    async fn missing_fields_return_bad_request_without_saving() {
        let (state, store, notifier) = test_state(RecordingStore::new(), RecordingNotifier::new());
        let app = app_router(state);

        let response = app
            .oneshot(post(json!({ "referrerName": "Alice" }).to_string()))
            .await
            .expect("handler should respond");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            body_json(response).await,
            json!({ "error": "All fields are required" })
        );
        assert!(store.records().is_empty());
        assert!(notifier.attempts().is_empty());
    }

    #[tokio::test]
    async fn each_missing_or_empty_field_is_rejected() {
        for field in ["referrerName", "referrerEmail", "refereeName", "refereeEmail"] {
            for replacement in [Value::Null, json!("")] {
                let (state, store, _) =
                    test_state(RecordingStore::new(), RecordingNotifier::new());
                let mut payload = alice_refers_bob();
                payload[field] = replacement.clone();

                let response = app_router(state)
                    .oneshot(post(payload.to_string()))
                    .await
                    .expect("handler should respond");

                assert_eq!(
                    response.status(),
                    StatusCode::BAD_REQUEST,
                    "{field} = {replacement} should be rejected"
                );
                assert!(store.records().is_empty());
            }
        }
    }

    #[tokio::test]
    async fn unreadable_bodies_are_treated_as_missing_fields() {
        for body in ["", "not json", "[1, 2, 3]", r#"{"referrerName": 42}"#] {
            let (state, store, _) = test_state(RecordingStore::new(), RecordingNotifier::new());

            let response = app_router(state)
                .oneshot(post(body))
                .await
                .expect("handler should respond");

            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "body {body:?}");
            assert_eq!(
                body_json(response).await,
                json!({ "error": "All fields are required" })
            );
            assert!(store.records().is_empty());
        }
    }

    #[tokio::test]
    async fn non_json_content_types_are_not_parsed() {
        for content_type in [Some("text/plain"), Some("application/x-www-form-urlencoded"), None] {
            let (state, store, notifier) =
                test_state(RecordingStore::new(), RecordingNotifier::new());
            let mut request = Request::builder().method("POST").uri("/api/referrals");
            if let Some(content_type) = content_type {
                request = request.header("content-type", content_type);
            }
            let request = request
                .body(Body::from(alice_refers_bob().to_string()))
                .unwrap();

            let response = app_router(state)
                .oneshot(request)
                .await
                .expect("handler should respond");

            assert_eq!(
                response.status(),
                StatusCode::BAD_REQUEST,
                "content type {content_type:?}"
            );
            assert_eq!(
                body_json(response).await,
                json!({ "error": "All fields are required" })
            );
            assert!(store.records().is_empty());
            assert!(notifier.attempts().is_empty());
        }
    }

    #[tokio::test]
    async fn json_content_type_with_charset_is_parsed() {
        let (state, store, _) = test_state(RecordingStore::new(), RecordingNotifier::new());
        let request = Request::builder()
            .method("POST")
            .uri("/api/referrals")
            .header("content-type", "Application/JSON; charset=utf-8")
            .body(Body::from(alice_refers_bob().to_string()))
            .unwrap();

        let response = app_router(state)
            .oneshot(request)
            .await
            .expect("handler should respond");

        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(store.records().len(), 1);
    }

    #[tokio::test]
    async fn storage_failure_returns_server_error_and_skips_email() {
        let (state, _, notifier) =
            test_state(RecordingStore::unavailable(), RecordingNotifier::new());
        let app = app_router(state);

        let response = app
            .oneshot(post(alice_refers_bob().to_string()))
            .await
            .expect("handler should respond");

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            body_json(response).await,
            json!({ "error": "Something went wrong" })
        );
        assert!(notifier.attempts().is_empty());
    }

    #[tokio::test]
    async fn email_failure_still_returns_created_record() {
        let (state, store, notifier) =
            test_state(RecordingStore::new(), RecordingNotifier::failing());
        let app = app_router(state);

        let response = app
            .oneshot(post(alice_refers_bob().to_string()))
            .await
            .expect("handler should respond");

        assert_eq!(response.status(), StatusCode::CREATED);
        let body = body_json(response).await;
        assert_eq!(body["_id"], "ref-1");
        assert_eq!(store.records().len(), 1);
        assert_eq!(notifier.attempts().len(), 1);
    }

    #[tokio::test]
    async fn repeated_submissions_create_separate_records() {
        let (state, store, notifier) = test_state(RecordingStore::new(), RecordingNotifier::new());
        let app = app_router(state);

        for _ in 0..2 {
            let response = app
                .clone()
                .oneshot(post(alice_refers_bob().to_string()))
                .await
                .expect("handler should respond");
            assert_eq!(response.status(), StatusCode::CREATED);
        }

        let ids: Vec<_> = store.records().into_iter().map(|r| r.id).collect();
        assert_eq!(ids, vec!["ref-1", "ref-2"]);
        assert_eq!(notifier.attempts().len(), 2);
    }

    #[tokio::test]
    async fn persists_through_sqlite_store() {
        use std::sync::Arc;

        use referral_storage::SqliteReferralStore;

        let store = SqliteReferralStore::connect("sqlite::memory:")
            .await
            .expect("connect");
        store.run_migrations().await.expect("migrations");
        let metrics = crate::telemetry::init_metrics().expect("metrics init");
        let state = AppState::new(
            metrics,
            Arc::new(store.clone()),
            Arc::new(RecordingNotifier::new()),
        );

        let response = app_router(state)
            .oneshot(post(alice_refers_bob().to_string()))
            .await
            .expect("handler should respond");

        assert_eq!(response.status(), StatusCode::CREATED);
        let body = body_json(response).await;
        let id = body["_id"].as_str().expect("identity is a string");
        let stored = store
            .find_by_id(id)
            .await
            .expect("lookup")
            .expect("row exists");
        assert_eq!(stored.referee_email, "bob@x.com");
        assert_eq!(store.count().await.expect("count"), 1);
    }
}
