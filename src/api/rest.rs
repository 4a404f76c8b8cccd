use crate::api::error::{ApiError, ApiResult};
use crate::api::types::*;
use crate::relay::SubmissionIntake;
use axum::{
    extract::{rejection::FormRejection, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Redirect},
    routing::{get, post},
    Form, Json, Router,
};
use std::sync::Arc;

const THANK_YOU_PAGE: &str = "<!DOCTYPE html>
<html>
<head><meta charset=\"utf-8\"><title>Thank you</title></head>
<body>
<h1>Thank you</h1>
<p>Your message has been received.</p>
</body>
</html>
";

/// `{public_key}` is replaced with the SPKI PEM at render time
const REPORT_PAGE: &str = r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>Send a report</title>
<script src="https://cdn.jsdelivr.net/npm/jsencrypt@3.3.2/bin/jsencrypt.min.js"></script>
</head>
<body>
<h1>Send a report</h1>
<p>Your message is encrypted in this browser before it is sent.</p>
<textarea id="plaintext" rows="12" cols="60" required></textarea>
<form id="report" method="post" action="/submit">
<input type="hidden" name="encrypted_message" id="encrypted_message">
<button type="submit">Send</button>
</form>
<pre id="public-key" hidden>{public_key}</pre>
<script>
document.getElementById("report").addEventListener("submit", function (event) {
  var encryptor = new JSEncrypt();
  encryptor.setPublicKey(document.getElementById("public-key").textContent);
  var encrypted = encryptor.encrypt(document.getElementById("plaintext").value);
  if (!encrypted) {
    event.preventDefault();
    alert("Message is too long to encrypt.");
    return;
  }
  document.getElementById("encrypted_message").value = encrypted;
});
</script>
</body>
</html>
"#;

pub struct RestApi {
    intake: Arc<SubmissionIntake>,
}

impl RestApi {
    pub fn new(intake: Arc<SubmissionIntake>) -> Self {
        Self { intake }
    }

    pub fn router(&self) -> Router {
        Router::new()
            .route("/health", get(health_check))
            .route("/report", get(report_form))
            .route("/submit", post(submit))
            .route("/thankyou", get(thank_you))
            .route("/public-key", get(public_key))
            .with_state(self.intake.clone())
    }
}

async fn health_check(State(intake): State<Arc<SubmissionIntake>>) -> impl IntoResponse {
    let depth = tokio::task::spawn_blocking(move || intake.queue_depth()).await;

    match depth {
        Ok(Ok(depth)) => (
            StatusCode::OK,
            Json(HealthResponse {
                status: "ok".to_string(),
                queue_depth: Some(depth),
            }),
        ),
        _ => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(HealthResponse {
                status: "queue unavailable".to_string(),
                queue_depth: None,
            }),
        ),
    }
}

async fn submit(
    State(intake): State<Arc<SubmissionIntake>>,
    form: Result<Form<SubmitForm>, FormRejection>,
) -> ApiResult<Redirect> {
    let Form(form) =
        form.map_err(|e| ApiError::InvalidRequest(format!("Malformed form body: {}", e)))?;
    let message = form
        .encrypted_message
        .ok_or_else(|| ApiError::InvalidRequest("Missing encrypted_message field".to_string()))?;

    // RSA decryption and the queue push both block
    tokio::task::spawn_blocking(move || intake.accept(message.as_bytes()))
        .await
        .map_err(|e| ApiError::InternalError(format!("Intake task failed: {e}")))??;

    Ok(Redirect::to("/thankyou"))
}

async fn report_form(State(intake): State<Arc<SubmissionIntake>>) -> Html<String> {
    Html(REPORT_PAGE.replace("{public_key}", intake.public_key_pem().trim_end()))
}

async fn thank_you() -> Html<&'static str> {
    Html(THANK_YOU_PAGE)
}

async fn public_key(State(intake): State<Arc<SubmissionIntake>>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "application/x-pem-file")],
        intake.public_key_pem().to_string(),
    )
}
