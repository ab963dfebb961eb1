//! Cloud Foundry Receiver Service
//!
//! Owns the receiver lifecycle and the background streaming task:
//!
//! 1. `start` builds the token provider and stream factory, derives a child
//!    cancellation token and spawns one tracked background task.
//! 2. The task fetches an initial token, opens the envelope stream and runs
//!    the poll loop.
//! 3. Each poll cycle converts the pulled envelopes into one metrics batch
//!    and forwards it downstream if it holds at least one record.
//! 4. `shutdown` cancels the child token. Stream closure observed after
//!    cancellation is graceful; closure without cancellation is escalated to
//!    the host exactly once.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use thiserror::Error;
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::application::ports::{
    CollaboratorFactory, EnvelopeConverter, EnvelopeStream, Host, MetricsConsumer, NoOpObserver,
    ReceiverObserver, StreamError, StreamFactory, TokenError, TokenProvider,
};
use crate::domain::lifecycle::ReceiverState;
use crate::domain::metrics::MetricsBatch;
use crate::infrastructure::config::{ConfigError, HttpCollaborators, ReceiverConfig};
use crate::infrastructure::loggregator::LoggregatorConverter;

/// Transport label reported for forwarding operations.
pub const TRANSPORT: &str = "http";

/// Data format label reported for forwarding operations.
pub const DATA_FORMAT: &str = "cloudfoundry";

/// Receiver errors.
#[derive(Debug, Error)]
pub enum ReceiverError {
    /// Configuration failed validation.
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    /// Token provider could not be built.
    #[error("create cloud foundry UAA token provider: {0}")]
    TokenProviderCreate(#[source] TokenError),

    /// Stream factory could not be built.
    #[error("failed to create cloud foundry RLP envelope stream factory: {0}")]
    StreamFactoryCreate(#[source] StreamError),

    /// Initial token fetch failed in the background task.
    #[error("cloud foundry receiver failed to fetch initial token from UAA: {0}")]
    InitialToken(#[source] TokenError),

    /// Envelope stream could not be opened in the background task.
    #[error("failed to create RLP gateway envelope stream: {0}")]
    StreamCreate(#[source] StreamError),

    /// Stream terminated while the receiver was not cancelled.
    #[error("RLP gateway streamer shut down")]
    StreamClosed,

    /// `start` called while the background task is alive.
    #[error("cloud foundry receiver already started")]
    AlreadyStarted,

    /// `shutdown` called before a successful `start`.
    #[error("cloud foundry receiver not started")]
    NotStarted,

    /// `start` called outside a tokio runtime.
    #[error("cloud foundry receiver must be started inside a tokio runtime")]
    NoRuntime,
}

// =============================================================================
// Receiver
// =============================================================================

/// Streaming metrics receiver for the Cloud Foundry RLP gateway.
pub struct CloudFoundryReceiver {
    config: ReceiverConfig,
    collaborators: Arc<dyn CollaboratorFactory>,
    converter: Arc<dyn EnvelopeConverter>,
    consumer: Arc<dyn MetricsConsumer>,
    observer: Arc<dyn ReceiverObserver>,
    start_time: DateTime<Utc>,
    state: Arc<Mutex<ReceiverState>>,
    cancel: Mutex<Option<CancellationToken>>,
    tracker: TaskTracker,
}

impl std::fmt::Debug for CloudFoundryReceiver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudFoundryReceiver")
            .field("config", &self.config)
            .field("start_time", &self.start_time)
            .field("state", &*self.state.lock())
            .finish_non_exhaustive()
    }
}

impl CloudFoundryReceiver {
    /// Begin building a receiver forwarding to `consumer`.
    #[must_use]
    pub fn builder(
        config: ReceiverConfig,
        consumer: Arc<dyn MetricsConsumer>,
    ) -> CloudFoundryReceiverBuilder {
        CloudFoundryReceiverBuilder {
            config,
            consumer,
            collaborators: None,
            converter: None,
            observer: None,
        }
    }

    /// Start the receiver.
    ///
    /// Builds the upstream collaborators synchronously and spawns the
    /// streaming task; does not wait for the stream to open. Token and stream
    /// failures inside the task are reported through `host`.
    ///
    /// # Errors
    ///
    /// Returns an error if the receiver is already running, no tokio runtime
    /// is available, or a collaborator cannot be constructed. No task is
    /// spawned in any error case.
    pub fn start(
        &self,
        parent: &CancellationToken,
        host: Arc<dyn Host>,
    ) -> Result<(), ReceiverError> {
        let handle = Handle::try_current().map_err(|_| ReceiverError::NoRuntime)?;

        let cancel = parent.child_token();
        let previous = {
            let mut state = self.state.lock();
            if !state.can_start() {
                return Err(ReceiverError::AlreadyStarted);
            }
            *self.cancel.lock() = Some(cancel.clone());
            std::mem::replace(&mut *state, ReceiverState::Starting)
        };

        let (token_provider, stream_factory) = match self.build_collaborators() {
            Ok(collaborators) => collaborators,
            Err(e) => {
                *self.state.lock() = previous;
                return Err(e);
            }
        };

        let streamer = Streamer {
            shard_id: self.config.rlp_gateway.shard_id.clone(),
            converter: Arc::clone(&self.converter),
            consumer: Arc::clone(&self.consumer),
            observer: Arc::clone(&self.observer),
            start_time: self.start_time,
            state: Arc::clone(&self.state),
            host,
            cancel,
        };

        tracing::info!(
            gateway = %self.config.rlp_gateway.http.endpoint,
            shard_id = %self.config.rlp_gateway.shard_id,
            "Starting cloud foundry receiver"
        );

        self.tracker
            .spawn_on(streamer.run(token_provider, stream_factory), &handle);

        Ok(())
    }

    /// Request the background task to stop.
    ///
    /// Cancels the task's token and returns immediately; use
    /// [`wait_stopped`](Self::wait_stopped) to join. Repeated calls are
    /// no-ops.
    ///
    /// # Errors
    ///
    /// Returns [`ReceiverError::NotStarted`] if the receiver was never started.
    pub fn shutdown(&self) -> Result<(), ReceiverError> {
        let mut state = self.state.lock();
        let current = *state;
        match current {
            ReceiverState::Created => Err(ReceiverError::NotStarted),
            ReceiverState::Stopping | ReceiverState::Stopped => Ok(()),
            ReceiverState::Starting | ReceiverState::Running => {
                *state = ReceiverState::Stopping;
                drop(state);

                if let Some(cancel) = self.cancel.lock().as_ref() {
                    cancel.cancel();
                }
                tracing::info!("Cloud foundry receiver shutdown requested");
                Ok(())
            }
        }
    }

    /// Wait until the background task has exited.
    ///
    /// Returns immediately if no task was ever spawned.
    pub async fn wait_stopped(&self) {
        self.tracker.wait().await;
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> ReceiverState {
        *self.state.lock()
    }

    /// Shared handle onto the lifecycle state, for health reporting.
    #[must_use]
    pub fn state_handle(&self) -> Arc<Mutex<ReceiverState>> {
        Arc::clone(&self.state)
    }

    /// Synthetic start time stamped on every forwarded data point.
    #[must_use]
    pub const fn start_time(&self) -> DateTime<Utc> {
        self.start_time
    }

    /// Receiver configuration.
    #[must_use]
    pub const fn config(&self) -> &ReceiverConfig {
        &self.config
    }

    fn build_collaborators(
        &self,
    ) -> Result<(Arc<dyn TokenProvider>, Arc<dyn StreamFactory>), ReceiverError> {
        let token_provider = self
            .collaborators
            .token_provider(&self.config.uaa)
            .map_err(ReceiverError::TokenProviderCreate)?;

        let stream_factory = self
            .collaborators
            .stream_factory(&self.config.rlp_gateway, Arc::clone(&token_provider))
            .map_err(ReceiverError::StreamFactoryCreate)?;

        Ok((token_provider, stream_factory))
    }
}

// =============================================================================
// Builder
// =============================================================================

/// Builder for [`CloudFoundryReceiver`].
pub struct CloudFoundryReceiverBuilder {
    config: ReceiverConfig,
    consumer: Arc<dyn MetricsConsumer>,
    collaborators: Option<Arc<dyn CollaboratorFactory>>,
    converter: Option<Arc<dyn EnvelopeConverter>>,
    observer: Option<Arc<dyn ReceiverObserver>>,
}

impl CloudFoundryReceiverBuilder {
    /// Override how the token provider and stream factory are built.
    #[must_use]
    pub fn with_collaborators(mut self, collaborators: Arc<dyn CollaboratorFactory>) -> Self {
        self.collaborators = Some(collaborators);
        self
    }

    /// Override the envelope converter.
    #[must_use]
    pub fn with_converter(mut self, converter: Arc<dyn EnvelopeConverter>) -> Self {
        self.converter = Some(converter);
        self
    }

    /// Set the observability hook.
    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn ReceiverObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Validate the configuration and build the receiver.
    ///
    /// The receiver's start time is fixed here.
    ///
    /// # Errors
    ///
    /// Returns [`ReceiverError::Config`] if the configuration is invalid.
    pub fn build(self) -> Result<CloudFoundryReceiver, ReceiverError> {
        self.config.validate()?;

        // Closed up front: `wait` resolves once the tracked task set is empty,
        // and a closed tracker still accepts new tasks.
        let tracker = TaskTracker::new();
        tracker.close();

        Ok(CloudFoundryReceiver {
            config: self.config,
            collaborators: self
                .collaborators
                .unwrap_or_else(|| Arc::new(HttpCollaborators)),
            converter: self
                .converter
                .unwrap_or_else(|| Arc::new(LoggregatorConverter)),
            consumer: self.consumer,
            observer: self.observer.unwrap_or_else(|| Arc::new(NoOpObserver)),
            start_time: Utc::now(),
            state: Arc::new(Mutex::new(ReceiverState::Created)),
            cancel: Mutex::new(None),
            tracker,
        })
    }
}

// =============================================================================
// Background Streamer
// =============================================================================

struct Streamer {
    shard_id: String,
    converter: Arc<dyn EnvelopeConverter>,
    consumer: Arc<dyn MetricsConsumer>,
    observer: Arc<dyn ReceiverObserver>,
    start_time: DateTime<Utc>,
    state: Arc<Mutex<ReceiverState>>,
    host: Arc<dyn Host>,
    cancel: CancellationToken,
}

impl Streamer {
    async fn run(
        self,
        token_provider: Arc<dyn TokenProvider>,
        stream_factory: Arc<dyn StreamFactory>,
    ) {
        tracing::debug!("cloud foundry receiver starting");

        if let Some(stream) = self.open(token_provider, stream_factory).await {
            self.enter_running();
            self.stream_metrics(stream).await;
        }

        *self.state.lock() = ReceiverState::Stopped;
    }

    async fn open(
        &self,
        token_provider: Arc<dyn TokenProvider>,
        stream_factory: Arc<dyn StreamFactory>,
    ) -> Option<Box<dyn EnvelopeStream>> {
        let token = tokio::select! {
            biased;
            () = self.cancel.cancelled() => {
                tracing::debug!("cloud foundry receiver cancelled before initial token fetch completed");
                return None;
            }
            token = token_provider.provide_token() => token,
        };

        if let Err(e) = token {
            self.escalate(ReceiverError::InitialToken(e));
            return None;
        }

        let stream = tokio::select! {
            biased;
            () = self.cancel.cancelled() => {
                tracing::debug!("cloud foundry receiver cancelled before envelope stream opened");
                return None;
            }
            stream = stream_factory.create_stream(self.cancel.clone(), &self.shard_id) => stream,
        };

        match stream {
            Ok(stream) => Some(stream),
            Err(e) => {
                self.escalate(ReceiverError::StreamCreate(e));
                None
            }
        }
    }

    fn enter_running(&self) {
        let mut state = self.state.lock();
        if *state == ReceiverState::Starting {
            *state = ReceiverState::Running;
        }
    }

    async fn stream_metrics(&self, mut stream: Box<dyn EnvelopeStream>) {
        loop {
            if self.cancel.is_cancelled() {
                tracing::debug!("cloudfoundry metrics streamer stopped gracefully");
                return;
            }

            let Some(envelopes) = stream.next_batch().await else {
                if self.cancel.is_cancelled() {
                    tracing::debug!("cloudfoundry metrics streamer stopped gracefully");
                } else {
                    self.escalate(ReceiverError::StreamClosed);
                }
                return;
            };

            if envelopes.is_empty() {
                continue;
            }
            self.observer.record_envelopes(envelopes.len());

            let mut batch = MetricsBatch::new_cycle();
            {
                let mut sink = batch.sink();
                for envelope in envelopes.iter().flatten() {
                    self.converter.convert(envelope, &mut sink, self.start_time);
                }
            }

            if batch.is_empty() {
                self.observer.record_dropped_batch();
                continue;
            }

            self.forward(batch).await;
        }
    }

    async fn forward(&self, batch: MetricsBatch) {
        let point_count = batch.data_point_count();
        let metric_count = batch.metric_count();

        let op = self.observer.start_metrics_op();
        let result = self.consumer.consume_metrics(batch).await;

        if let Err(e) = &result {
            tracing::warn!(
                error = %e,
                metrics = metric_count,
                data_points = point_count,
                "Failed to forward metrics batch"
            );
        }

        self.observer
            .end_metrics_op(op, DATA_FORMAT, point_count, result.as_ref().err());
    }

    fn escalate(&self, error: ReceiverError) {
        tracing::error!(error = %error, "Cloud foundry receiver failed");
        self.observer.record_fatal_error();
        self.host.report_fatal_error(error);
    }
}
