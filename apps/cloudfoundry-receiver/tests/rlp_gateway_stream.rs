//! RLP Gateway Stream Integration Tests
//!
//! Serves server-sent event bodies from a mock gateway and checks what the
//! envelope stream yields.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use cloudfoundry_receiver::RlpGatewaySettings;
use cloudfoundry_receiver::application::ports::{
    StreamError, StreamFactory, TokenError, TokenProvider,
};
use cloudfoundry_receiver::domain::envelope::EnvelopeMessage;
use cloudfoundry_receiver::infrastructure::rlp::{ReconnectConfig, RlpGatewayStreamFactory};

const WAIT: Duration = Duration::from_secs(5);

const SSE_BODY: &str = concat!(
    "event: heartbeat\n",
    "data: 1580428783\n",
    "\n",
    "data: {\"batch\":[{\"timestamp\":\"1580428783743100000\",\"source_id\":\"app\",",
    "\"instance_id\":\"0\",\"tags\":{\"origin\":\"gorouter\"},",
    "\"counter\":{\"name\":\"requests\",\"delta\":\"1\",\"total\":\"10\"}},null]}\n",
    "\n",
    "data: not json\n",
    "\n",
    "data: {\"batch\":[{\"timestamp\":\"1580428783743100000\",\"tags\":{\"origin\":\"rep\"},",
    "\"gauge\":{\"metrics\":{\"cpu\":{\"unit\":\"percentage\",\"value\":12.5}}}}]}\n",
    "\n",
);

#[derive(Default)]
struct StaticToken {
    invalidations: AtomicUsize,
}

#[async_trait]
impl TokenProvider for StaticToken {
    async fn provide_token(&self) -> Result<String, TokenError> {
        Ok("bearer test".to_string())
    }

    async fn invalidate(&self) {
        self.invalidations.fetch_add(1, Ordering::SeqCst);
    }
}

fn factory(server: &MockServer, token: Arc<StaticToken>) -> RlpGatewayStreamFactory {
    RlpGatewayStreamFactory::new(
        &RlpGatewaySettings::new(server.uri()).with_shard_id("shard-1"),
        token,
    )
    .unwrap()
    .with_reconnect(ReconnectConfig {
        initial_delay: Duration::from_millis(10),
        max_delay: Duration::from_millis(10),
        multiplier: 1.0,
        jitter_factor: 0.0,
        max_attempts: 1,
    })
}

#[tokio::test]
async fn yields_decoded_batches_then_ends() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v2/read"))
        .and(query_param("shard_id", "shard-1"))
        .and(header("authorization", "bearer test"))
        .and(header("accept", "text/event-stream"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(SSE_BODY, "text/event-stream"))
        .up_to_n_times(1)
        .mount(&server)
        .await;

    let factory = factory(&server, Arc::new(StaticToken::default()));
    let mut stream = factory
        .create_stream(CancellationToken::new(), "shard-1")
        .await
        .unwrap();

    let first = timeout(WAIT, stream.next_batch()).await.unwrap().unwrap();
    assert_eq!(first.len(), 2);
    assert!(first[1].is_none());
    let envelope = first[0].as_ref().unwrap();
    assert_eq!(envelope.origin(), "gorouter");
    assert!(matches!(envelope.message(), EnvelopeMessage::Counter(c) if c.total == 10));

    let second = timeout(WAIT, stream.next_batch()).await.unwrap().unwrap();
    assert_eq!(second.len(), 1);
    assert!(matches!(
        second[0].as_ref().unwrap().message(),
        EnvelopeMessage::Gauge(_)
    ));

    // the reconnect is refused and the single allowed attempt is spent
    assert!(timeout(WAIT, stream.next_batch()).await.unwrap().is_none());
}

#[tokio::test]
async fn unauthorized_stream_invalidates_token() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v2/read"))
        .respond_with(ResponseTemplate::new(401).set_body_string("token expired"))
        .mount(&server)
        .await;

    let token = Arc::new(StaticToken::default());
    let result = factory(&server, Arc::clone(&token))
        .create_stream(CancellationToken::new(), "shard-1")
        .await;

    match result {
        Err(StreamError::Rejected { status, body }) => {
            assert_eq!(status, 401);
            assert_eq!(body, "token expired");
        }
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("stream opened despite 401"),
    }
    assert_eq!(token.invalidations.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn cancelled_stream_yields_nothing() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v2/read"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(SSE_BODY, "text/event-stream"))
        .mount(&server)
        .await;

    let cancel = CancellationToken::new();
    let mut stream = factory(&server, Arc::new(StaticToken::default()))
        .create_stream(cancel.clone(), "shard-1")
        .await
        .unwrap();

    cancel.cancel();
    assert!(timeout(WAIT, stream.next_batch()).await.unwrap().is_none());
}
