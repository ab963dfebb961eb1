//! RLP Gateway Envelope Stream
//!
//! Opens `GET {gateway}/v2/read` as a server-sent event stream and feeds the
//! decoded envelope batches to the receiver through a bounded channel.
//!
//! ```text
//! ┌──────────────┐  SSE   ┌─────────────┐  mpsc   ┌───────────────────┐
//! │ RLP gateway  │ ─────► │ reader task │ ──────► │ RlpEnvelopeStream │
//! └──────────────┘        └─────────────┘         └───────────────────┘
//!                          reconnects with          next_batch()
//!                          backoff on failure
//! ```
//!
//! The first connection is made by `create_stream` so authorisation and
//! endpoint errors surface to the caller. Later failures are retried by the
//! reader until the reconnect policy gives up, at which point the channel
//! closes and `next_batch` yields `None`.

use std::sync::Arc;

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::header::{ACCEPT, AUTHORIZATION};
use reqwest::{Client, Response, StatusCode};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use url::Url;

use super::reconnect::{ReconnectConfig, ReconnectPolicy};
use super::sse::SseDecoder;
use crate::application::ports::{EnvelopeStream, StreamError, StreamFactory, TokenProvider};
use crate::domain::envelope::{EnvelopeBatch, EnvelopeBatchMessage};
use crate::infrastructure::config::RlpGatewaySettings;

/// Batches buffered between the reader task and the receiver.
pub const BATCH_BUFFER: usize = 64;

// =============================================================================
// Stream Factory
// =============================================================================

/// Envelope stream factory for the RLP gateway.
pub struct RlpGatewayStreamFactory {
    client: Client,
    endpoint: Url,
    token_provider: Arc<dyn TokenProvider>,
    reconnect: ReconnectConfig,
}

impl std::fmt::Debug for RlpGatewayStreamFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RlpGatewayStreamFactory")
            .field("endpoint", &self.endpoint.as_str())
            .field("reconnect", &self.reconnect)
            .finish_non_exhaustive()
    }
}

impl RlpGatewayStreamFactory {
    /// Create a stream factory from gateway settings.
    ///
    /// The settings' timeout bounds connection establishment only; an open
    /// stream may stay idle indefinitely.
    ///
    /// # Errors
    ///
    /// Returns an error if the endpoint is not a URL or the HTTP client
    /// cannot be built.
    pub fn new(
        settings: &RlpGatewaySettings,
        token_provider: Arc<dyn TokenProvider>,
    ) -> Result<Self, StreamError> {
        let endpoint =
            Url::parse(&settings.http.endpoint).map_err(|e| StreamError::InvalidEndpoint {
                endpoint: settings.http.endpoint.clone(),
                reason: e.to_string(),
            })?;

        let client = Client::builder()
            .connect_timeout(settings.http.timeout)
            .danger_accept_invalid_certs(settings.http.insecure_skip_verify)
            .build()?;

        Ok(Self {
            client,
            endpoint,
            token_provider,
            reconnect: ReconnectConfig::from_settings(&settings.reconnect),
        })
    }

    /// Override the reconnect policy configuration.
    #[must_use]
    pub const fn with_reconnect(mut self, reconnect: ReconnectConfig) -> Self {
        self.reconnect = reconnect;
        self
    }

    /// Build the read URL for a shard, requesting counters and gauges.
    #[must_use]
    pub fn read_url(&self, shard_id: &str) -> Url {
        let mut url = self.endpoint.clone();
        let path = format!("{}/v2/read", url.path().trim_end_matches('/'));
        url.set_path(&path);
        url.query_pairs_mut()
            .clear()
            .append_pair("shard_id", shard_id)
            .append_key_only("counter")
            .append_key_only("gauge");
        url
    }
}

#[async_trait]
impl StreamFactory for RlpGatewayStreamFactory {
    async fn create_stream(
        &self,
        cancel: CancellationToken,
        shard_id: &str,
    ) -> Result<Box<dyn EnvelopeStream>, StreamError> {
        let connector = Connector {
            client: self.client.clone(),
            url: self.read_url(shard_id),
            token_provider: Arc::clone(&self.token_provider),
        };

        let response = connector.connect().await?;
        tracing::info!(url = %connector.url, "Connected to RLP gateway");

        let (tx, rx) = mpsc::channel(BATCH_BUFFER);
        let reader = Reader {
            connector,
            policy: ReconnectPolicy::new(self.reconnect.clone()),
            tx,
            cancel: cancel.clone(),
        };
        tokio::spawn(reader.run(response));

        Ok(Box::new(RlpEnvelopeStream { rx, cancel }))
    }
}

// =============================================================================
// Envelope Stream
// =============================================================================

/// Receiving end of a gateway connection.
#[derive(Debug)]
pub struct RlpEnvelopeStream {
    rx: mpsc::Receiver<EnvelopeBatch>,
    cancel: CancellationToken,
}

#[async_trait]
impl EnvelopeStream for RlpEnvelopeStream {
    async fn next_batch(&mut self) -> Option<EnvelopeBatch> {
        tokio::select! {
            biased;
            () = self.cancel.cancelled() => None,
            batch = self.rx.recv() => batch,
        }
    }
}

// =============================================================================
// Reader Task
// =============================================================================

struct Connector {
    client: Client,
    url: Url,
    token_provider: Arc<dyn TokenProvider>,
}

impl Connector {
    async fn connect(&self) -> Result<Response, StreamError> {
        let token = self.token_provider.provide_token().await?;

        let response = self
            .client
            .get(self.url.clone())
            .header(AUTHORIZATION, token)
            .header(ACCEPT, "text/event-stream")
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            self.token_provider.invalidate().await;
        }

        let body = response.text().await.unwrap_or_default();
        Err(StreamError::Rejected {
            status: status.as_u16(),
            body,
        })
    }
}

struct Reader {
    connector: Connector,
    policy: ReconnectPolicy,
    tx: mpsc::Sender<EnvelopeBatch>,
    cancel: CancellationToken,
}

impl Reader {
    async fn run(mut self, first: Response) {
        let mut pending = Some(first);

        loop {
            let response = match pending.take() {
                Some(response) => Ok(response),
                None => tokio::select! {
                    biased;
                    () = self.cancel.cancelled() => {
                        tracing::debug!("RLP gateway reader cancelled during reconnect");
                        return;
                    }
                    response = self.connector.connect() => response,
                },
            };

            let outcome = match response {
                Ok(response) => self.pump(response).await,
                Err(e) => Err(e),
            };

            match outcome {
                Ok(()) => {
                    tracing::debug!("RLP gateway reader stopped");
                    return;
                }
                Err(e) => tracing::warn!(error = %e, "RLP gateway connection lost"),
            }

            let Some(delay) = self.policy.next_delay() else {
                tracing::error!(
                    attempts = self.policy.attempt_count(),
                    "RLP gateway reconnect attempts exhausted"
                );
                return;
            };

            tracing::info!(
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                attempt = self.policy.attempt_count(),
                "Reconnecting to RLP gateway"
            );

            tokio::select! {
                () = self.cancel.cancelled() => {
                    tracing::debug!("RLP gateway reader cancelled during reconnect delay");
                    return;
                }
                () = tokio::time::sleep(delay) => {}
            }
        }
    }

    /// Read events until the connection fails. `Ok` means stop for good:
    /// the token was cancelled or the receiver went away.
    async fn pump(&mut self, response: Response) -> Result<(), StreamError> {
        let mut body = Box::pin(response.bytes_stream());
        let mut decoder = SseDecoder::new();

        loop {
            let chunk = tokio::select! {
                biased;
                () = self.cancel.cancelled() => return Ok(()),
                chunk = body.next() => chunk,
            };

            let chunk = match chunk {
                Some(Ok(chunk)) => chunk,
                Some(Err(e)) => return Err(e.into()),
                None => return Err(StreamError::ConnectionClosed),
            };

            for event in decoder.push(&chunk) {
                self.policy.reset();

                if event.is_heartbeat() {
                    continue;
                }
                if event.is_closing() {
                    return Err(StreamError::GatewayClosing);
                }

                let batch = match EnvelopeBatchMessage::decode(&event.data) {
                    Ok(batch) => batch,
                    Err(e) => {
                        tracing::warn!(error = %e, "Skipping undecodable RLP gateway event");
                        continue;
                    }
                };
                if batch.is_empty() {
                    continue;
                }

                tokio::select! {
                    biased;
                    () = self.cancel.cancelled() => return Ok(()),
                    sent = self.tx.send(batch) => {
                        if sent.is_err() {
                            return Ok(());
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::TokenError;

    struct StaticToken;

    #[async_trait]
    impl TokenProvider for StaticToken {
        async fn provide_token(&self) -> Result<String, TokenError> {
            Ok("bearer test".to_string())
        }
    }

    fn factory(endpoint: &str) -> RlpGatewayStreamFactory {
        RlpGatewayStreamFactory::new(&RlpGatewaySettings::new(endpoint), Arc::new(StaticToken))
            .unwrap()
    }

    #[test]
    fn read_url_requests_counters_and_gauges() {
        let url = factory("http://gw.example").read_url("shard-1");
        assert_eq!(
            url.as_str(),
            "http://gw.example/v2/read?shard_id=shard-1&counter&gauge"
        );
    }

    #[test]
    fn read_url_keeps_base_path() {
        let url = factory("https://gw.example/proxy/").read_url("a b");
        assert_eq!(
            url.as_str(),
            "https://gw.example/proxy/v2/read?shard_id=a+b&counter&gauge"
        );
    }

    #[test]
    fn invalid_endpoint_is_rejected() {
        let result =
            RlpGatewayStreamFactory::new(&RlpGatewaySettings::new("gw"), Arc::new(StaticToken));
        assert!(matches!(result, Err(StreamError::InvalidEndpoint { .. })));
    }

    #[tokio::test]
    async fn next_batch_returns_none_once_cancelled() {
        let (tx, rx) = mpsc::channel(1);
        let cancel = CancellationToken::new();
        let mut stream = RlpEnvelopeStream {
            rx,
            cancel: cancel.clone(),
        };

        tx.send(vec![None]).await.unwrap();
        cancel.cancel();
        assert!(stream.next_batch().await.is_none());
    }

    #[tokio::test]
    async fn next_batch_returns_none_when_reader_ends() {
        let (tx, rx) = mpsc::channel(1);
        let mut stream = RlpEnvelopeStream {
            rx,
            cancel: CancellationToken::new(),
        };

        tx.send(vec![None]).await.unwrap();
        drop(tx);
        assert_eq!(stream.next_batch().await.map(|b| b.len()), Some(1));
        assert!(stream.next_batch().await.is_none());
    }

    #[tokio::test]
    async fn reader_stops_when_cancelled_mid_reconnect() {
        struct HangingToken {
            requested: tokio::sync::Notify,
        }

        #[async_trait]
        impl TokenProvider for HangingToken {
            async fn provide_token(&self) -> Result<String, TokenError> {
                self.requested.notify_one();
                std::future::pending().await
            }
        }

        let token = Arc::new(HangingToken {
            requested: tokio::sync::Notify::new(),
        });
        let (tx, _rx) = mpsc::channel(1);
        let cancel = CancellationToken::new();
        let reader = Reader {
            connector: Connector {
                client: Client::new(),
                url: Url::parse("http://gw.example/v2/read").unwrap(),
                token_provider: Arc::clone(&token) as Arc<dyn TokenProvider>,
            },
            policy: ReconnectPolicy::new(ReconnectConfig {
                initial_delay: std::time::Duration::from_millis(1),
                max_delay: std::time::Duration::from_millis(1),
                multiplier: 1.0,
                jitter_factor: 0.0,
                max_attempts: 0,
            }),
            tx,
            cancel: cancel.clone(),
        };

        // an empty body ends at once, so the reader goes straight to reconnecting
        let first = Response::from(axum::http::Response::new(""));
        let handle = tokio::spawn(reader.run(first));

        token.requested.notified().await;
        cancel.cancel();

        tokio::time::timeout(std::time::Duration::from_secs(5), handle)
            .await
            .expect("reader kept waiting on the reconnect")
            .unwrap();
    }
}
