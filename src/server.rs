use std::{future::Future, time::Duration};

use axum::{
  body::Bytes,
  extract::{rejection::BytesRejection, DefaultBodyLimit, Query, Request, State},
  http::{header, HeaderName, HeaderValue, Method, StatusCode},
  middleware::{self, Next},
  response::{IntoResponse, Response},
  routing::{any, get},
  Json, Router,
};
use tokio::net::TcpListener;

use crate::{config::Config, rfc6238::{self, SecretError, Totp}};

const ROBOTS_TXT: &str = "User-agent: *\nDisallow: /\n";
const ROBOTS_TAG: &str = "noindex, nofollow, noarchive, nosnippet, noimageindex";

/// Envelope of every `/api/totp` answer, absent fields are left out.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TotpResponse {
  pub success: bool,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub code: Option<String>,
  /// seconds remaining
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub remaining: Option<u64>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub error: Option<String>,
}

impl TotpResponse {
  pub fn success(totp: Totp) -> Self {
    Self { success: true, code: Some(totp.code), remaining: Some(totp.remaining), error: None }
  }

  pub fn failure<S: ToString>(error: S) -> Self {
    Self { success: false, code: None, remaining: None, error: Some(error.to_string()) }
  }
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
  #[error("invalid JSON body")]
  MalformedRequest,
  #[error("missing secret parameter")]
  MissingInput,
  #[error(transparent)]
  InvalidSecret(#[from] SecretError),
  #[error("request body too large")]
  PayloadTooLarge,
  #[error("request timed out")]
  Timeout,
}

impl ApiError {
  pub fn status(&self) -> StatusCode {
    match self {
      Self::MalformedRequest | Self::MissingInput | Self::InvalidSecret(_) => StatusCode::BAD_REQUEST,
      Self::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
      Self::Timeout => StatusCode::REQUEST_TIMEOUT,
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    debug!("rejected: {}", self);
    (self.status(), Json(TotpResponse::failure(&self))).into_response()
  }
}

const SECRET_FIELD: &str = "secret";

/// Reads the first JSON value of the body whatever the content type says,
/// anything after it is ignored. Field names match case-insensitively and the
/// last matching field wins; `null` leaves the secret unset.
fn secret_from_body(body: &[u8]) -> Result<Option<String>, ApiError> {
  let mut values = serde_json::Deserializer::from_slice(body).into_iter::<serde_json::Value>();
  let fields = match values.next() {
    Some(Ok(serde_json::Value::Object(fields))) => fields,
    Some(Ok(serde_json::Value::Null)) => return Ok(None),
    _ => return Err(ApiError::MalformedRequest),
  };
  let mut secret = None;
  for (key, value) in fields {
    if !key.eq_ignore_ascii_case(SECRET_FIELD) {
      continue;
    }
    match value {
      serde_json::Value::String(s) => secret = Some(s),
      serde_json::Value::Null => {}
      _ => return Err(ApiError::MalformedRequest),
    }
  }
  Ok(secret)
}

/// First `secret` pair of the query string, later repeats are ignored.
fn secret_from_query(params: Vec<(String, String)>) -> Option<String> {
  params.into_iter().find(|(key, _)| key == SECRET_FIELD).map(|(_, value)| value)
}

fn body_rejected(rejection: BytesRejection) -> ApiError {
  if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
    ApiError::PayloadTooLarge
  } else {
    debug!("unreadable body: {}", rejection.body_text());
    ApiError::MalformedRequest
  }
}

async fn totp(
  method: Method,
  Query(params): Query<Vec<(String, String)>>,
  body: Result<Bytes, BytesRejection>,
) -> Result<Json<TotpResponse>, ApiError> {
  let secret = if method == Method::POST {
    secret_from_body(&body.map_err(body_rejected)?)?
  } else {
    secret_from_query(params)
  };
  let secret = secret.filter(|s| !s.is_empty()).ok_or(ApiError::MissingInput)?;
  let totp = rfc6238::generate(&secret, rfc6238::unix_now())?;
  Ok(Json(TotpResponse::success(totp)))
}

async fn health() -> Json<serde_json::Value> {
  Json(serde_json::json!({ "status": "ok" }))
}

async fn robots() -> impl IntoResponse {
  (
    [
      (header::CONTENT_TYPE, "text/plain"),
      (HeaderName::from_static("x-robots-tag"), ROBOTS_TAG),
    ],
    ROBOTS_TXT,
  )
}

async fn allow_any_origin(mut response: Response) -> Response {
  response.headers_mut().insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
  response
}

async fn with_timeout(State(limit): State<Duration>, request: Request, next: Next) -> Response {
  let uri = request.uri().path().to_string();
  match tokio::time::timeout(limit, next.run(request)).await {
    Ok(response) => response,
    Err(_) => {
      warn!("{} did not finish within {:?}", uri, limit);
      ApiError::Timeout.into_response()
    }
  }
}

pub fn router(config: &Config) -> Router {
  Router::new()
    .route("/api/totp", any(totp))
    .route("/health", get(health))
    .route("/robots.txt", get(robots))
    .layer(DefaultBodyLimit::max(config.max_body_bytes))
    .layer(middleware::from_fn_with_state(config.request_timeout(), with_timeout))
    .layer(middleware::map_response(allow_any_origin))
}

/// Serves until `shutdown` resolves, then lets in-flight requests finish.
pub async fn serve<F>(listener: TcpListener, config: Config, shutdown: F) -> std::io::Result<()>
where
  F: Future<Output = ()> + Send + 'static,
{
  axum::serve(listener, router(&config)).with_graceful_shutdown(shutdown).await
}

pub async fn shutdown_signal() {
  match tokio::signal::ctrl_c().await {
    Ok(()) => info!("received ctrl-c, shutting down"),
    Err(e) => {
      error!("unable to listen for ctrl-c: {}", e);
      std::future::pending::<()>().await
    }
  }
}
