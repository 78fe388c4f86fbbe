//! Remote entropy provider reached over HTTP.

use super::{EntropyBackend, Fulfillment, OracleError};
use crate::domain::SequenceNumber;
use async_trait::async_trait;
use backoff::future::retry;
use backoff::ExponentialBackoff;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

/// Forwards requests to a provider that answers later via the callback endpoint.
#[derive(Debug, Clone)]
pub struct HttpEntropy {
    client: Client,
    base_url: String,
    callback_url: String,
    max_elapsed: Duration,
}

impl HttpEntropy {
    /// `callback_url` is where the provider posts `{sequenceNumber, randomBytes}`.
    pub fn new(base_url: String, callback_url: String) -> Self {
        Self {
            client: Client::new(),
            base_url,
            callback_url,
            max_elapsed: Duration::from_secs(30),
        }
    }

    pub fn with_max_elapsed(mut self, max_elapsed: Duration) -> Self {
        self.max_elapsed = max_elapsed;
        self
    }

    pub fn requests_url(&self) -> String {
        format!("{}/v1/requests", self.base_url.trim_end_matches('/'))
    }

    async fn post_request(&self, payload: serde_json::Value) -> Result<(), OracleError> {
        let url = self.requests_url();
        let backoff = ExponentialBackoff {
            max_elapsed_time: Some(self.max_elapsed),
            ..Default::default()
        };

        retry(backoff, || async {
            let response = self
                .client
                .post(&url)
                .json(&payload)
                .send()
                .await
                .map_err(|e| backoff::Error::transient(OracleError::Network(e.to_string())))?;

            let status = response.status();
            if status == 429 || status.is_server_error() {
                return Err(backoff::Error::transient(OracleError::Http {
                    status: status.as_u16(),
                    message: "Provider unavailable".to_string(),
                }));
            }
            if !status.is_success() {
                return Err(backoff::Error::permanent(OracleError::Http {
                    status: status.as_u16(),
                    message: "Request rejected".to_string(),
                }));
            }
            Ok(())
        })
        .await
    }
}

#[async_trait]
impl EntropyBackend for HttpEntropy {
    async fn dispatch(
        &self,
        sequence_number: SequenceNumber,
    ) -> Result<Option<Fulfillment>, OracleError> {
        debug!(sequence_number, url = %self.requests_url(), "Forwarding entropy request");

        let payload = serde_json::json!({
            "sequenceNumber": sequence_number,
            "callbackUrl": self.callback_url,
        });
        self.post_request(payload).await?;
        Ok(None)
    }
}
