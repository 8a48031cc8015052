use async_trait::async_trait;
use reqwest::multipart::{Form, Part};

use crate::config::ConverterConfig;

use super::{ConversionError, DocumentConverter, PageOptions, MIN_PDF_BYTES};

const CONVERT_PATH: &str = "/forms/chromium/convert/html";
const HEALTH_PATH: &str = "/health";

/// HTTP client for a Gotenberg instance's Chromium HTML route.
pub struct GotenbergClient {
    base_url: String,
    client: reqwest::Client,
    config: ConverterConfig,
}

impl GotenbergClient {
    pub fn new(config: ConverterConfig) -> Result<Self, ConversionError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| ConversionError::HttpClient(e.to_string()))?;

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            client,
            config,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn map_send_error(&self, e: reqwest::Error, timeout_secs: u64) -> ConversionError {
        if e.is_connect() {
            ConversionError::Connection(self.base_url.clone())
        } else if e.is_timeout() {
            ConversionError::Timeout(timeout_secs)
        } else {
            ConversionError::HttpClient(e.to_string())
        }
    }

    fn form(html: &str, options: &PageOptions) -> Result<Form, ConversionError> {
        let index = Part::text(html.to_string())
            .file_name("index.html")
            .mime_str("text/html")
            .map_err(|e| ConversionError::HttpClient(e.to_string()))?;

        let mut form = Form::new().part("files", index);
        for (name, value) in options.form_fields() {
            form = form.text(name, value);
        }
        Ok(form)
    }
}

#[async_trait]
impl DocumentConverter for GotenbergClient {
    async fn convert(&self, html: &str, options: &PageOptions) -> Result<Vec<u8>, ConversionError> {
        let url = format!("{}{}", self.base_url, CONVERT_PATH);
        let form = Self::form(html, options)?;

        tracing::debug!(html_bytes = html.len(), "Sending document to conversion service");

        let response = self
            .client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| self.map_send_error(e, self.config.request_timeout.as_secs()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ConversionError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| self.map_send_error(e, self.config.request_timeout.as_secs()))?;

        if bytes.len() < MIN_PDF_BYTES {
            return Err(ConversionError::OutputTooSmall(bytes.len()));
        }

        Ok(bytes.to_vec())
    }

    async fn health(&self) -> Result<(), ConversionError> {
        let url = format!("{}{}", self.base_url, HEALTH_PATH);
        let response = self
            .client
            .get(&url)
            .timeout(self.config.health_timeout)
            .send()
            .await
            .map_err(|e| self.map_send_error(e, self.config.health_timeout.as_secs()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ConversionError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::Multipart;
    use axum::http::StatusCode;
    use axum::response::IntoResponse;
    use axum::routing::{get, post};
    use axum::Router;
    use std::time::Duration;

    fn fake_pdf() -> Vec<u8> {
        let mut pdf = b"%PDF-1.7\n".to_vec();
        pdf.resize(256, b' ');
        pdf
    }

    async fn convert_handler(mut multipart: Multipart) -> impl IntoResponse {
        let mut saw_index = false;
        let mut saw_format = false;
        while let Ok(Some(field)) = multipart.next_field().await {
            let name = field.name().unwrap_or("").to_string();
            let file_name = field.file_name().map(str::to_string);
            let text = field.text().await.unwrap_or_default();
            match name.as_str() {
                "files" => {
                    saw_index = file_name.as_deref() == Some("index.html") && text.contains("<html>");
                }
                "format" => saw_format = text == "A4",
                _ => {}
            }
        }
        if saw_index && saw_format {
            (StatusCode::OK, fake_pdf()).into_response()
        } else {
            (StatusCode::BAD_REQUEST, "missing index.html").into_response()
        }
    }

    async fn serve(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn client(base_url: String) -> GotenbergClient {
        GotenbergClient::new(ConverterConfig {
            base_url,
            request_timeout: Duration::from_millis(500),
            health_timeout: Duration::from_millis(500),
        })
        .unwrap()
    }

    // ═══════════════════════════════════════════
    // Conversion
    // ═══════════════════════════════════════════

    #[tokio::test]
    async fn converts_through_multipart_upload() {
        let app = Router::new().route(CONVERT_PATH, post(convert_handler));
        let gotenberg = client(serve(app).await);

        let pdf = gotenberg
            .convert("<html><body>ok</body></html>", &PageOptions::default())
            .await
            .unwrap();
        assert!(pdf.starts_with(b"%PDF"));
        assert_eq!(pdf.len(), 256);
    }

    #[tokio::test]
    async fn server_error_carries_status_and_body() {
        let app = Router::new().route(
            CONVERT_PATH,
            post(|| async { (StatusCode::SERVICE_UNAVAILABLE, "chromium busy") }),
        );
        let gotenberg = client(serve(app).await);

        let err = gotenberg.convert("<html></html>", &PageOptions::default()).await.unwrap_err();
        assert_eq!(
            err,
            ConversionError::Status {
                status: 503,
                body: "chromium busy".into()
            }
        );
    }

    #[tokio::test]
    async fn tiny_output_is_rejected() {
        let app = Router::new().route(CONVERT_PATH, post(|| async { "%PDF" }));
        let gotenberg = client(serve(app).await);

        let err = gotenberg.convert("<html></html>", &PageOptions::default()).await.unwrap_err();
        assert_eq!(err, ConversionError::OutputTooSmall(4));
    }

    #[tokio::test]
    async fn slow_service_times_out() {
        let app = Router::new().route(
            CONVERT_PATH,
            post(|| async {
                tokio::time::sleep(Duration::from_secs(3)).await;
                fake_pdf()
            }),
        );
        let gotenberg = client(serve(app).await);

        let err = gotenberg.convert("<html></html>", &PageOptions::default()).await.unwrap_err();
        assert!(matches!(err, ConversionError::Timeout(_)), "got {err:?}");
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn unreachable_service_is_a_connection_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let gotenberg = client(format!("http://{addr}/"));
        assert_eq!(gotenberg.base_url(), format!("http://{addr}"));

        let err = gotenberg.convert("<html></html>", &PageOptions::default()).await.unwrap_err();
        assert_eq!(err, ConversionError::Connection(format!("http://{addr}")));
    }

    // ═══════════════════════════════════════════
    // Health
    // ═══════════════════════════════════════════

    #[tokio::test]
    async fn health_probe() {
        let app = Router::new().route(HEALTH_PATH, get(|| async { r#"{"status":"up"}"# }));
        let gotenberg = client(serve(app).await);
        assert!(gotenberg.health().await.is_ok());

        let down = Router::new().route(HEALTH_PATH, get(|| async { (StatusCode::SERVICE_UNAVAILABLE, "down") }));
        let gotenberg = client(serve(down).await);
        assert!(matches!(
            gotenberg.health().await,
            Err(ConversionError::Status { status: 503, .. })
        ));
    }
}
