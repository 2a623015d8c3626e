//! Decision provider backed by an external HTTP service.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::decision::{Decision, DenyReason};
use crate::errors::{AdmissionError, Result};
use crate::policy::Policy;
use crate::provider::DecisionProvider;
use crate::request::RequestFacts;
use crate::rules::BotCategory;

/// Path appended to the configured endpoint.
pub const DECIDE_PATH: &str = "/v1/decide";

#[derive(Serialize)]
struct DecideRequest<'a> {
    policy: &'a Policy,
    request: &'a RequestFacts,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DecideResponse {
    conclusion: String,
    #[serde(default)]
    reason: Option<String>,
    #[serde(default)]
    retry_after_secs: Option<u64>,
}

/// Calls `POST {endpoint}/v1/decide` with a bearer key.
#[derive(Debug, Clone)]
pub struct RemoteDecisionProvider {
    client: reqwest::Client,
    url: String,
    key: String,
}

impl RemoteDecisionProvider {
    /// Build a provider. The timeout covers the whole request.
    pub fn new(endpoint: &str, key: impl Into<String>, timeout: Duration) -> Result<Self> {
        let key = key.into();
        if key.trim().is_empty() {
            return Err(AdmissionError::MissingCredential);
        }
        let endpoint = endpoint.trim_end_matches('/');
        if endpoint.is_empty() {
            return Err(AdmissionError::MissingEndpoint);
        }
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: format!("{endpoint}{DECIDE_PATH}"),
            key,
        })
    }

    fn interpret(body: DecideResponse, policy: &Policy) -> Result<Decision> {
        match body.conclusion.as_str() {
            "ALLOW" => Ok(Decision::Allow),
            "DENY" => Ok(match body.reason.as_deref() {
                Some("RATE_LIMIT") => Decision::DenyRateLimited {
                    retry_after: body
                        .retry_after_secs
                        .map_or_else(|| policy.window.interval(), Duration::from_secs),
                },
                Some("SHIELD") => Decision::DenyOther(DenyReason::Shield {
                    signature: "remote".to_string(),
                }),
                Some("BOT") => Decision::DenyOther(DenyReason::Bot {
                    category: BotCategory::Automated,
                }),
                Some(other) => Decision::DenyOther(DenyReason::Other(other.to_string())),
                None => Decision::DenyOther(DenyReason::Other("unspecified".to_string())),
            }),
            other => Err(AdmissionError::InvalidResponse(format!(
                "unknown conclusion '{other}'"
            ))),
        }
    }
}

#[async_trait]
impl DecisionProvider for RemoteDecisionProvider {
    async fn decide(&self, request: &RequestFacts, policy: &Policy) -> Result<Decision> {
        let response = self
            .client
            .post(&self.url)
            .bearer_auth(&self.key)
            .json(&DecideRequest { policy, request })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(AdmissionError::Status {
                status: status.as_u16(),
            });
        }

        let body: DecideResponse = response
            .json()
            .await
            .map_err(|e| AdmissionError::InvalidResponse(e.to_string()))?;
        debug!(policy = %policy.name, conclusion = %body.conclusion, "remote decision");
        Self::interpret(body, policy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn facts() -> RequestFacts {
        RequestFacts {
            method: "GET".into(),
            path: "/ws".into(),
            user_agent: Some("Mozilla/5.0".into()),
            ip: Some("198.51.100.7".parse().unwrap()),
            ..RequestFacts::default()
        }
    }

    async fn provider(server: &MockServer) -> RemoteDecisionProvider {
        RemoteDecisionProvider::new(&server.uri(), "sk_test", Duration::from_millis(500)).unwrap()
    }

    #[tokio::test]
    async fn allow_verdict() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(DECIDE_PATH))
            .and(header("authorization", "Bearer sk_test"))
            .and(body_partial_json(serde_json::json!({
                "policy": { "name": "upgrade" },
                "request": { "path": "/ws", "ip": "198.51.100.7" }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "conclusion": "ALLOW"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let decision = provider(&server)
            .await
            .decide(&facts(), &Policy::upgrade_default())
            .await
            .unwrap();
        assert_eq!(decision, Decision::Allow);
    }

    #[tokio::test]
    async fn rate_limit_verdict_carries_retry_after() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "conclusion": "DENY",
                "reason": "RATE_LIMIT",
                "retryAfterSecs": 7
            })))
            .mount(&server)
            .await;

        let decision = provider(&server)
            .await
            .decide(&facts(), &Policy::http_default())
            .await
            .unwrap();
        assert_eq!(
            decision,
            Decision::DenyRateLimited {
                retry_after: Duration::from_secs(7)
            }
        );
    }

    #[tokio::test]
    async fn bot_verdict_is_other_denial() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "conclusion": "DENY",
                "reason": "BOT"
            })))
            .mount(&server)
            .await;

        let decision = provider(&server)
            .await
            .decide(&facts(), &Policy::http_default())
            .await
            .unwrap();
        assert!(matches!(decision, Decision::DenyOther(DenyReason::Bot { .. })));
    }

    #[tokio::test]
    async fn server_error_is_provider_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let err = provider(&server)
            .await
            .decide(&facts(), &Policy::http_default())
            .await
            .unwrap_err();
        assert!(matches!(err, AdmissionError::Status { status: 500 }));
    }

    #[tokio::test]
    async fn malformed_body_is_provider_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let err = provider(&server)
            .await
            .decide(&facts(), &Policy::http_default())
            .await
            .unwrap_err();
        assert!(matches!(err, AdmissionError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn unknown_conclusion_is_provider_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "conclusion": "ERROR"
            })))
            .mount(&server)
            .await;

        let err = provider(&server)
            .await
            .decide(&facts(), &Policy::http_default())
            .await
            .unwrap_err();
        assert!(matches!(err, AdmissionError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn slow_service_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({ "conclusion": "ALLOW" }))
                    .set_delay(Duration::from_secs(2)),
            )
            .mount(&server)
            .await;

        let slow =
            RemoteDecisionProvider::new(&server.uri(), "sk_test", Duration::from_millis(100)).unwrap();
        let err = slow
            .decide(&facts(), &Policy::http_default())
            .await
            .unwrap_err();
        assert!(matches!(err, AdmissionError::Http(_)));
    }

    #[test]
    fn blank_key_is_rejected() {
        let err = RemoteDecisionProvider::new("http://localhost:1", "  ", Duration::from_secs(1))
            .unwrap_err();
        assert!(matches!(err, AdmissionError::MissingCredential));
    }
}
