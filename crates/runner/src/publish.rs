// Copyright 2025 Benchwatch Contributors
// SPDX-License-Identifier: Apache-2.0

//! Result publishing to a codespeed dashboard.
//!
//! The dashboard's JSON import takes the whole record array as a form field
//! named `json`, posted with basic auth to `<url>/result/add/json/`.

use crate::error::{Result, RunnerError};
use crate::steps::{Step, StepContext, StepOutcome};
use async_trait::async_trait;
use benchwatch_core::StepStatus;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};

/// Import endpoint path, relative to the dashboard URL.
pub const RESULT_ADD_PATH: &str = "/result/add/json/";

/// Where and how to publish.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PublishSettings {
    /// Publishing is skipped unless set.
    pub enabled: bool,
    /// Dashboard base URL.
    pub url: String,
    /// Basic-auth user.
    pub username: String,
    /// Basic-auth password.
    #[serde(default, skip_serializing)]
    pub password: Option<String>,
    /// PEM certificate to trust in addition to the system roots.
    #[serde(default)]
    pub ca_cert: Option<PathBuf>,
    /// Request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for PublishSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            url: "https://speed.z.cash/".to_string(),
            username: "buildbot".to_string(),
            password: None,
            ca_cert: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl PublishSettings {
    /// Full import endpoint URL.
    pub fn endpoint(&self) -> String {
        format!("{}{}", self.url.trim_end_matches('/'), RESULT_ADD_PATH)
    }
}

/// HTTP client for the import endpoint.
#[derive(Debug, Clone)]
pub struct Publisher {
    client: reqwest::Client,
    settings: PublishSettings,
}

impl Publisher {
    /// Build a client, loading the custom CA certificate if configured.
    pub fn new(settings: PublishSettings) -> Result<Self> {
        let mut builder =
            reqwest::Client::builder().timeout(Duration::from_secs(settings.timeout_secs));

        if let Some(path) = &settings.ca_cert {
            let pem = std::fs::read(path).map_err(|e| {
                RunnerError::PublishSetup(format!("cannot read {}: {e}", path.display()))
            })?;
            let cert = reqwest::Certificate::from_pem(&pem)
                .map_err(|e| RunnerError::PublishSetup(format!("invalid certificate: {e}")))?;
            builder = builder.add_root_certificate(cert);
        }

        let client = builder.build()?;
        Ok(Self { client, settings })
    }

    /// POST `payload` (a JSON array of records) to the import endpoint.
    pub async fn publish(&self, payload: &str) -> Result<()> {
        self.client
            .post(self.settings.endpoint())
            .basic_auth(&self.settings.username, self.settings.password.as_ref())
            .form(&[("json", payload)])
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

/// Final pipeline step posting the run's records.
#[derive(Debug, Clone)]
pub struct PublishStep {
    name: String,
    settings: PublishSettings,
}

impl PublishStep {
    /// Publish with `settings`; skipped when publishing is disabled.
    pub fn new(settings: PublishSettings) -> Self {
        Self {
            name: "publish results".to_string(),
            settings,
        }
    }
}

#[async_trait]
impl Step for PublishStep {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, ctx: &mut StepContext<'_>) -> Result<StepOutcome> {
        if !self.settings.enabled {
            info!(step = %self.name, "publishing disabled, skipping");
            return Ok(StepOutcome::new(StepStatus::Skipped));
        }

        let payload = ctx.run.to_json()?;
        let publisher = Publisher::new(self.settings.clone())?;
        match publisher.publish(&payload).await {
            Ok(()) => {
                info!(
                    step = %self.name,
                    endpoint = %self.settings.endpoint(),
                    records = ctx.run.len(),
                    "results published"
                );
                Ok(StepOutcome::new(StepStatus::Success))
            }
            Err(e) => {
                warn!(step = %self.name, error = %e, "publishing failed");
                Ok(StepOutcome::new(StepStatus::Failure).with_message(e.to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::steps::testing::run_context;
    use benchwatch_benchmarks::ResultValue;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio_util::sync::CancellationToken;

    /// Accepts one request, answers with `status`, returns the raw request.
    async fn one_shot_server(status: &'static str) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/", listener.local_addr().unwrap());
        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 4096];
            loop {
                let n = socket.read(&mut buf).await.unwrap();
                request.extend_from_slice(&buf[..n]);
                let text = String::from_utf8_lossy(&request).to_string();
                if let Some(header_end) = text.find("\r\n\r\n") {
                    let length = text[..header_end]
                        .lines()
                        .find_map(|l| {
                            l.to_ascii_lowercase()
                                .strip_prefix("content-length:")
                                .map(|v| v.trim().parse::<usize>().unwrap())
                        })
                        .unwrap_or(0);
                    if request.len() >= header_end + 4 + length {
                        break;
                    }
                }
                if n == 0 {
                    break;
                }
            }
            let response = format!("HTTP/1.1 {status}\r\ncontent-length: 0\r\nconnection: close\r\n\r\n");
            socket.write_all(response.as_bytes()).await.unwrap();
            String::from_utf8_lossy(&request).to_string()
        });
        (url, handle)
    }

    #[test]
    fn test_endpoint_joins_path() {
        let mut settings = PublishSettings::default();
        assert_eq!(settings.endpoint(), "https://speed.z.cash/result/add/json/");
        settings.url = "http://localhost:8000".to_string();
        assert_eq!(settings.endpoint(), "http://localhost:8000/result/add/json/");
    }

    #[test]
    fn test_missing_certificate_is_setup_error() {
        let settings = PublishSettings {
            ca_cert: Some(PathBuf::from("/nonexistent/speed_z_cash.pem")),
            ..Default::default()
        };
        let err = Publisher::new(settings).unwrap_err();
        assert!(matches!(err, RunnerError::PublishSetup(_)));
    }

    #[tokio::test]
    async fn test_disabled_is_skipped() {
        let mut run = run_context();
        let mut ctx = StepContext {
            run: &mut run,
            cancel: CancellationToken::new(),
        };
        let outcome = PublishStep::new(PublishSettings::default())
            .run(&mut ctx)
            .await
            .unwrap();
        assert_eq!(outcome.status, StepStatus::Skipped);
    }

    #[tokio::test]
    async fn test_posts_form_with_basic_auth() {
        let (url, server) = one_shot_server("200 OK").await;
        let mut run = run_context();
        let record = run.identity().record("time sleep", ResultValue::Float(1.0));
        run.append(record);
        let mut ctx = StepContext {
            run: &mut run,
            cancel: CancellationToken::new(),
        };

        let settings = PublishSettings {
            enabled: true,
            url,
            password: Some("hunter2".to_string()),
            ..Default::default()
        };
        let outcome = PublishStep::new(settings).run(&mut ctx).await.unwrap();
        assert_eq!(outcome.status, StepStatus::Success);

        let request = server.await.unwrap();
        assert!(request.starts_with("POST /result/add/json/ HTTP/1.1"));
        // base64("buildbot:hunter2")
        assert!(request.contains("YnVpbGRib3Q6aHVudGVyMg=="));
        assert!(request.contains("application/x-www-form-urlencoded"));
        assert!(request.contains("json=%5B%7B%22project%22%3A%22Zcash%22"));
    }

    #[tokio::test]
    async fn test_server_error_is_failure() {
        let (url, server) = one_shot_server("500 Internal Server Error").await;
        let mut run = run_context();
        let mut ctx = StepContext {
            run: &mut run,
            cancel: CancellationToken::new(),
        };
        let settings = PublishSettings {
            enabled: true,
            url,
            ..Default::default()
        };
        let outcome = PublishStep::new(settings).run(&mut ctx).await.unwrap();
        assert_eq!(outcome.status, StepStatus::Failure);
        assert!(outcome.message.is_some());
        server.await.unwrap();
    }
}
