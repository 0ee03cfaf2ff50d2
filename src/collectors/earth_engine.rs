use std::time::Duration;

use async_trait::async_trait;
use reqwest::Url;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::core::expr::{Expr, Image};
use crate::core::geometry::BoundingBox;
use crate::utils::config::EarthEngineConfig;

/// Deadline applied to every platform call made through a session.
pub const SESSION_DEADLINE: Duration = Duration::from_secs(60);
/// Deadline for pulling rendered thumbnail bytes.
pub const FETCH_DEADLINE: Duration = Duration::from_secs(50);

#[derive(Debug, Error)]
pub enum EeError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),
    #[error("earth engine error: {0}")]
    Api(String),
    #[error("unexpected status {0}")]
    Status(reqwest::StatusCode),
    #[error("no earth engine credentials configured")]
    MissingCredentials,
}

/// Rendering request for one visualised image.
#[derive(Debug, Clone, PartialEq)]
pub struct ThumbnailRequest {
    pub image: Image,
    /// Meters per pixel.
    pub scale: u32,
    pub crs: &'static str,
    pub region: BoundingBox,
}

impl ThumbnailRequest {
    /// Flat form fields as the thumbnail endpoint takes them.
    pub fn form(&self) -> Vec<(&'static str, String)> {
        vec![
            ("image", self.image.expr().to_json().to_string()),
            ("scale", self.scale.to_string()),
            ("crs", self.crs.to_string()),
            ("region", serde_json::json!(self.region).to_string()),
        ]
    }
}

/// Handle on an initialised imagery-platform session.
#[async_trait]
pub trait EarthEngine: Send + Sync {
    /// Evaluates `expr` remotely and returns its value (`getInfo`).
    async fn compute_value(&self, expr: &Expr) -> Result<serde_json::Value, EeError>;

    /// Registers a rendering and returns the URL it can be fetched from.
    async fn thumbnail_url(&self, req: &ThumbnailRequest) -> Result<String, EeError>;

    /// Downloads the raw bytes behind a thumbnail URL.
    async fn fetch_thumbnail(&self, url: &str) -> Result<Vec<u8>, EeError>;
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    data: Option<T>,
    error: Option<ApiError>,
}

impl<T> ApiResponse<T> {
    fn into_result(self) -> Result<T, EeError> {
        match (self.data, self.error) {
            (_, Some(e)) => Err(EeError::Api(e.message)),
            (Some(data), None) => Ok(data),
            (None, None) => Err(EeError::Api("response carried neither data nor error".into())),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ThumbId {
    thumbid: String,
    token: String,
}

/// Session against the platform's HTTP API, scoped to whoever holds it.
pub struct EeSession {
    client: reqwest::Client,
    base_url: String,
}

impl EeSession {
    pub fn initialize(config: &EarthEngineConfig) -> Result<Self, EeError> {
        let token = config.access_token.as_deref().ok_or(EeError::MissingCredentials)?;
        Self::connect(&config.url, token, SESSION_DEADLINE)
    }

    pub(crate) fn connect(base_url: &str, token: &str, deadline: Duration) -> Result<Self, EeError> {
        let mut headers = reqwest::header::HeaderMap::new();
        let mut auth = reqwest::header::HeaderValue::from_str(&format!("Bearer {token}"))
            .map_err(|e| EeError::Api(format!("invalid access token: {e}")))?;
        auth.set_sensitive(true);
        headers.insert(reqwest::header::AUTHORIZATION, auth);

        let client = reqwest::Client::builder()
            .gzip(true)
            .default_headers(headers)
            .timeout(deadline)
            .build()?;

        debug!(base_url, "Earth Engine session initialized");
        Ok(Self { client, base_url: base_url.trim_end_matches('/').to_string() })
    }

    async fn post<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        form: &[(&str, String)],
    ) -> Result<T, EeError> {
        let url = format!("{}{}", self.base_url, path);
        let resp = self.client.post(&url).form(form).send().await?;
        let status = resp.status();
        // the API reports failures in the body, sometimes alongside an error status
        match resp.json::<ApiResponse<T>>().await {
            Ok(body) => body.into_result(),
            Err(e) if status.is_success() => Err(e.into()),
            Err(_) => Err(EeError::Status(status)),
        }
    }
}

#[async_trait]
impl EarthEngine for EeSession {
    async fn compute_value(&self, expr: &Expr) -> Result<serde_json::Value, EeError> {
        self.post("/api/value", &[("json", expr.to_json().to_string())]).await
    }

    async fn thumbnail_url(&self, req: &ThumbnailRequest) -> Result<String, EeError> {
        let id: ThumbId = self.post("/api/thumb", &req.form()).await?;
        let url = Url::parse_with_params(
            &format!("{}/api/thumb", self.base_url),
            &[("thumbid", id.thumbid.as_str()), ("token", id.token.as_str())],
        )?;
        Ok(url.into())
    }

    async fn fetch_thumbnail(&self, url: &str) -> Result<Vec<u8>, EeError> {
        info!(url, "Fetching thumbnail");
        let resp = self.client.get(url).timeout(FETCH_DEADLINE).send().await?;
        if !resp.status().is_success() {
            warn!(status = ?resp.status(), "Non-success response fetching thumbnail");
            return Err(EeError::Status(resp.status()));
        }
        Ok(resp.bytes().await?.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use axum::{extract::Form, http::HeaderMap, http::StatusCode, routing::{get, post}, Json, Router};
    use serde_json::json;

    use super::*;
    use crate::core::geometry::create_box;
    use crate::utils::testing::spawn_stub;

    async fn stub() -> String {
        let app = Router::new()
            .route(
                "/api/value",
                post(|headers: HeaderMap, Form(f): Form<HashMap<String, String>>| async move {
                    if headers.get("authorization").and_then(|v| v.to_str().ok()) != Some("Bearer secret") {
                        return (StatusCode::UNAUTHORIZED, Json(json!({ "error": { "message": "bad token" } })));
                    }
                    let expr: serde_json::Value = serde_json::from_str(&f["json"]).unwrap();
                    (StatusCode::OK, Json(json!({ "data": { "echo": expr["functionName"] } })))
                }),
            )
            .route(
                "/api/thumb",
                post(|Form(f): Form<HashMap<String, String>>| async move {
                    if f.get("scale").map(String::as_str) != Some("30") {
                        return Json(json!({ "error": { "message": "scale missing" } }));
                    }
                    Json(json!({ "data": { "thumbid": "abc123", "token": "tok" } }))
                }),
            )
            .route("/png", get(|| async { vec![0x89u8, b'P', b'N', b'G'] }))
            .route("/gone", get(|| async { StatusCode::NOT_FOUND }));
        spawn_stub(app).await
    }

    #[tokio::test]
    async fn compute_value_unwraps_data() {
        let base = stub().await;
        let session = EeSession::connect(&base, "secret", SESSION_DEADLINE).unwrap();

        let v = session.compute_value(Image::load("x").expr()).await.unwrap();
        assert_eq!(v, json!({ "echo": "Image.load" }));
    }

    #[tokio::test]
    async fn api_error_surfaces_message() {
        let base = stub().await;
        let session = EeSession::connect(&base, "wrong", SESSION_DEADLINE).unwrap();

        match session.compute_value(Image::load("x").expr()).await {
            Err(EeError::Api(msg)) => assert_eq!(msg, "bad token"),
            other => panic!("expected api error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn thumbnail_url_from_thumb_id() {
        let base = stub().await;
        let session = EeSession::connect(&base, "secret", SESSION_DEADLINE).unwrap();
        let req = ThumbnailRequest {
            image: Image::load("x"),
            scale: 30,
            crs: "EPSG:4326",
            region: create_box(1.0, 2.0, 256, 256, true),
        };

        let url = session.thumbnail_url(&req).await.unwrap();
        assert_eq!(url, format!("{base}/api/thumb?thumbid=abc123&token=tok"));
    }

    #[tokio::test]
    async fn fetch_returns_bytes_or_status() {
        let base = stub().await;
        let session = EeSession::connect(&base, "secret", SESSION_DEADLINE).unwrap();

        assert_eq!(session.fetch_thumbnail(&format!("{base}/png")).await.unwrap(), b"\x89PNG");
        assert!(matches!(
            session.fetch_thumbnail(&format!("{base}/gone")).await,
            Err(EeError::Status(s)) if s.as_u16() == 404
        ));
    }

    #[test]
    fn initialize_requires_token() {
        let cfg = EarthEngineConfig { url: "http://localhost".into(), access_token: None };
        assert!(matches!(EeSession::initialize(&cfg), Err(EeError::MissingCredentials)));
    }

    #[test]
    fn form_carries_render_params() {
        let req = ThumbnailRequest {
            image: Image::load("x"),
            scale: 30,
            crs: "EPSG:4326",
            region: create_box(0.0, 0.0, 0, 0, true),
        };
        let form: HashMap<_, _> = req.form().into_iter().collect();
        assert_eq!(form["scale"], "30");
        assert_eq!(form["crs"], "EPSG:4326");
        assert_eq!(form["region"], "[[0.0,0.0],[0.0,0.0],[0.0,0.0],[0.0,0.0],[0.0,0.0]]");
        assert!(form["image"].contains("\"Image.load\""));
    }
}
