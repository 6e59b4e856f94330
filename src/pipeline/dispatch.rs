//! Conversion dispatch: upload the cleaned bundle to the kind's endpoint.
//!
//! The request is a multipart POST with two fields, `file`
//! (`cleaned_files.zip`, `application/zip`) and `userId` (the request id).
//! The service answers `{ "downloadLink": …, "message": … }`.
//!
//! What happens on failure depends on the kind's [`DispatchPolicy`]:
//! mandatory kinds surface the error, best-effort kinds answer with a
//! deterministic mock so the caller still gets a usable outcome.

use crate::config::{endpoint_env_var, DispatchPolicy, ProcessingConfig};
use crate::error::Zip2DitaError;
use crate::kind::ContentKind;
use crate::output::EndpointStatus;
use futures::future::join_all;
use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

/// File name of the bundle inside the multipart form.
pub const BUNDLE_FILE_NAME: &str = "cleaned_files.zip";

/// Timeout of one health probe.
pub const PROBE_TIMEOUT_SECS: u64 = 5;

/// Reply of a conversion service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchReply {
    pub download_link: String,
    #[serde(default)]
    pub message: Option<String>,
}

/// Result of [`dispatch`]: the reply, and whether it was synthesised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dispatched {
    pub reply: DispatchReply,
    pub mock: bool,
}

/// Send `archive` to the endpoint configured for `kind`.
pub async fn dispatch(
    archive: &[u8],
    request_id: &str,
    kind: ContentKind,
    config: &ProcessingConfig,
) -> Result<Dispatched, Zip2DitaError> {
    let endpoint = config.endpoints.for_kind(kind);

    let Some(url) = endpoint.url.as_deref() else {
        ensure_endpoint(kind, config)?;
        warn!("No {} endpoint configured, returning mock result", kind.label());
        return Ok(mock_reply(config, request_id, kind, "no endpoint configured"));
    };

    info!(
        "Uploading {} bytes to {} ({})",
        archive.len(),
        url,
        kind.label()
    );
    match post_bundle(url, archive, request_id, config.conversion_timeout_secs).await {
        Ok(reply) => {
            debug!("Conversion service replied: {:?}", reply);
            Ok(Dispatched { reply, mock: false })
        }
        Err(detail) => match endpoint.policy {
            DispatchPolicy::Mandatory => Err(Zip2DitaError::ConversionFailed {
                endpoint: url.to_string(),
                detail,
            }),
            DispatchPolicy::BestEffort => {
                warn!("Conversion via {} failed, returning mock result: {}", url, detail);
                Ok(mock_reply(config, request_id, kind, &detail))
            }
        },
    }
}

/// Fail when `kind` is mandatory and has no endpoint.
///
/// Runs before cleanup so a submission that cannot be converted does no
/// capability calls.
pub fn ensure_endpoint(kind: ContentKind, config: &ProcessingConfig) -> Result<(), Zip2DitaError> {
    let endpoint = config.endpoints.for_kind(kind);
    match (endpoint.policy, &endpoint.url) {
        (DispatchPolicy::Mandatory, None) => Err(Zip2DitaError::EndpointNotConfigured {
            kind: kind.as_str().to_string(),
            env_var: endpoint_env_var(kind).to_string(),
        }),
        _ => Ok(()),
    }
}

/// The deterministic stand-in for a best-effort conversion.
pub fn mock_reply(
    config: &ProcessingConfig,
    request_id: &str,
    kind: ContentKind,
    reason: &str,
) -> Dispatched {
    Dispatched {
        reply: DispatchReply {
            download_link: format!(
                "{}/{}/{}",
                config.mock_download_base.trim_end_matches('/'),
                request_id,
                kind.as_str()
            ),
            message: Some(format!(
                "Mock {} conversion completed (conversion service unavailable: {})",
                kind.label(),
                reason
            )),
        },
        mock: true,
    }
}

async fn post_bundle(
    url: &str,
    archive: &[u8],
    request_id: &str,
    timeout_secs: u64,
) -> Result<DispatchReply, String> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| format!("HTTP client: {e}"))?;

    let part = Part::bytes(archive.to_vec())
        .file_name(BUNDLE_FILE_NAME)
        .mime_str("application/zip")
        .map_err(|e| e.to_string())?;
    let form = Form::new()
        .part("file", part)
        .text("userId", request_id.to_string());

    let response = client
        .post(url)
        .multipart(form)
        .send()
        .await
        .map_err(|e| {
            if e.is_timeout() {
                format!("timed out after {timeout_secs}s")
            } else {
                e.to_string()
            }
        })?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        let body: String = body.chars().take(200).collect();
        return Err(format!("HTTP {status}: {}", body.trim()));
    }

    response
        .json::<DispatchReply>()
        .await
        .map_err(|e| format!("unreadable reply: {e}"))
}

/// Check `GET {endpoint}/health` for every kind.
///
/// Kinds without an endpoint are reported unavailable without any request.
pub async fn probe_endpoints(config: &ProcessingConfig) -> Vec<EndpointStatus> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(PROBE_TIMEOUT_SECS))
        .build()
        .ok();

    let probes = ContentKind::ALL.into_iter().map(|kind| {
        let endpoint = config.endpoints.for_kind(kind).url.clone();
        let client = client.clone();
        async move {
            let available = match (&endpoint, client) {
                (Some(url), Some(client)) => {
                    let health = format!("{}/health", url.trim_end_matches('/'));
                    match client.get(&health).send().await {
                        Ok(resp) => resp.status().is_success(),
                        Err(e) => {
                            debug!("Health check {} failed: {}", health, e);
                            false
                        }
                    }
                }
                _ => false,
            };
            EndpointStatus {
                kind,
                endpoint,
                available,
            }
        }
    });

    join_all(probes).await
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A local address nothing listens on.
    fn refused_url() -> String {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);
        format!("http://127.0.0.1:{port}/convert")
    }

    #[tokio::test]
    async fn mandatory_without_endpoint_fails_before_io() {
        let config = ProcessingConfig::default();
        let err = dispatch(b"zip", "req", ContentKind::StructuredDoc, &config)
            .await
            .unwrap_err();
        match err {
            Zip2DitaError::EndpointNotConfigured { kind, env_var } => {
                assert_eq!(kind, "docx");
                assert_eq!(env_var, "DOCX_TO_DITA_API");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn only_unconfigured_mandatory_kinds_are_rejected_up_front() {
        let config = ProcessingConfig::default();
        assert!(matches!(
            ensure_endpoint(ContentKind::StructuredDoc, &config),
            Err(Zip2DitaError::EndpointNotConfigured { .. })
        ));
        assert!(ensure_endpoint(ContentKind::Html, &config).is_ok());

        let configured = ProcessingConfig::builder()
            .endpoint(ContentKind::StructuredDoc, "http://127.0.0.1:9/convert")
            .build()
            .unwrap();
        assert!(ensure_endpoint(ContentKind::StructuredDoc, &configured).is_ok());
    }

    #[tokio::test]
    async fn best_effort_without_endpoint_is_mocked() {
        let config = ProcessingConfig::default();
        let out = dispatch(b"zip", "u-1", ContentKind::Html, &config)
            .await
            .unwrap();
        assert!(out.mock);
        assert_eq!(out.reply.download_link, "https://mock-api.com/download/u-1/html");
        assert!(out
            .reply
            .message
            .as_deref()
            .unwrap()
            .starts_with("Mock HTML conversion completed"));
    }

    #[tokio::test]
    async fn refused_connection_mandatory_is_conversion_failed() {
        let config = ProcessingConfig::builder()
            .endpoint(ContentKind::Markdown, refused_url())
            .policy(ContentKind::Markdown, DispatchPolicy::Mandatory)
            .conversion_timeout_secs(5)
            .build()
            .unwrap();
        let err = dispatch(b"zip", "u-2", ContentKind::Markdown, &config)
            .await
            .unwrap_err();
        assert!(matches!(err, Zip2DitaError::ConversionFailed { .. }), "got {err:?}");
    }

    #[tokio::test]
    async fn refused_connection_best_effort_is_mocked() {
        let config = ProcessingConfig::builder()
            .endpoint(ContentKind::Markdown, refused_url())
            .conversion_timeout_secs(5)
            .build()
            .unwrap();
        let out = dispatch(b"zip", "u-3", ContentKind::Markdown, &config)
            .await
            .unwrap();
        assert!(out.mock);
        assert!(out.reply.download_link.ends_with("/u-3/markdown"));
    }

    #[tokio::test]
    async fn probe_reports_unconfigured_kinds_unavailable() {
        let statuses = probe_endpoints(&ProcessingConfig::default()).await;
        assert_eq!(statuses.len(), 3);
        assert!(statuses.iter().all(|s| !s.available && s.endpoint.is_none()));
    }

    #[test]
    fn reply_uses_camel_case() {
        let reply: DispatchReply =
            serde_json::from_str(r#"{"downloadLink":"http://x/y.zip","message":"done"}"#).unwrap();
        assert_eq!(reply.download_link, "http://x/y.zip");
        assert_eq!(reply.message.as_deref(), Some("done"));
    }
}
