//! Fallback orchestrator: drives one conversation turn end to end.
//!
//! Per turn: snapshot the policy, persist the user message, build context,
//! then walk the effective fallback order. Each model gets up to
//! `retry_count` attempts with exponential backoff between them. When the
//! cursor reaches the last remaining model the system instruction is
//! degraded once and the output cap halved. Fragments are relayed to the
//! caller as they arrive; conversation and metric bookkeeping happens once,
//! after the turn resolves.
//!
//! Caller disconnects are observed between fragment deliveries. Forwarding
//! stops, but the turn still runs to completion so the assistant message
//! and the metric are recorded.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use futures_util::StreamExt;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{Instrument, debug, error, info, info_span, warn};
use uuid::Uuid;

use zeno_types::chat::{ChatMessage, MessageRole};
use zeno_types::error::RepositoryError;
use zeno_types::llm::{GenerationRequest, LlmError, NormalizedMessage};
use zeno_types::metric::{NO_MODEL, TurnMetric, TurnStatus, approximate_tokens};

use crate::chat::repository::ChatRepository;
use crate::chat::service::ChatService;
use crate::llm::provider::ProviderGateway;
use crate::llm::registry::GatewayRegistry;
use crate::metrics::repository::MetricsRepository;
use crate::policy::handle::PolicyHandle;
use crate::turn::backoff::{Backoff, Sleeper, TokioSleeper};

/// Appended to the system instruction when only the last model remains.
pub const DEGRADED_MODE_SUFFIX: &str =
    " (Respond extremely concisely. System is in degraded fallback mode).";

/// Final fragment emitted when every model failed.
pub const EXHAUSTED_NOTICE: &str = "\n\n[ZenoAi Alert] All external providers are currently unavailable. Please try again later.";

/// Error text stored on the failed metric.
pub const EXHAUSTED_REASON: &str = "All models failed";

/// Message carried by the error event for internal faults.
pub const INTERNAL_ERROR_MESSAGE: &str = "Internal system error";

/// Capacity of the per-turn event channel.
const TURN_CHANNEL_CAPACITY: usize = 64;

/// Caller-submitted turn.
#[derive(Debug, Clone)]
pub struct TurnRequest {
    pub session_id: Uuid,
    pub message: String,
}

/// What the caller receives for a turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnEvent {
    /// Incremental text, including the outage notice on total failure.
    Fragment(String),
    /// Internal fault; emitted at most once, right before `Done`.
    Error { message: String, detail: String },
    /// End of stream.
    Done,
}

/// Summary of a resolved turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnOutcome {
    pub status: TurnStatus,
    pub model_used: String,
    pub fallback_triggered: bool,
    pub latency_ms: u64,
    pub tokens: u64,
}

/// Faults that end a turn before any model is tried.
#[derive(Debug, thiserror::Error)]
pub enum TurnError {
    #[error("failed to persist user message: {0}")]
    UserMessagePersist(#[source] RepositoryError),

    #[error("invalid turn request: {0}")]
    InvalidRequest(String),
}

/// Lazy sequence of events for one turn, always terminated by `Done`.
pub type TurnStream = ReceiverStream<TurnEvent>;

/// Relays fragments to the caller until it goes away.
struct Relay<'a> {
    tx: &'a mpsc::Sender<TurnEvent>,
    connected: bool,
}

impl<'a> Relay<'a> {
    fn new(tx: &'a mpsc::Sender<TurnEvent>) -> Self {
        Self {
            tx,
            connected: !tx.is_closed(),
        }
    }

    async fn send(&mut self, event: TurnEvent) {
        if !self.connected {
            return;
        }
        if self.tx.send(event).await.is_err() {
            self.connected = false;
            debug!("caller disconnected, finishing turn without forwarding");
        }
    }
}

/// Per-turn mutable request parameters.
struct TurnContext {
    messages: Vec<NormalizedMessage>,
    max_tokens: u32,
    degraded: bool,
}

impl TurnContext {
    /// Enter degraded mode: concise instruction, half the output cap.
    /// A second call is a no-op.
    fn degrade(&mut self) {
        if self.degraded {
            return;
        }
        self.degraded = true;
        if let Some(system) = self
            .messages
            .iter_mut()
            .find(|m| m.role == MessageRole::System)
        {
            system.content.push_str(DEGRADED_MODE_SUFFIX);
        }
        self.max_tokens = (self.max_tokens / 2).max(1);
    }
}

/// Drives turns against the gateways named by the live routing policy.
///
/// Generic over the repositories and the sleeper so the core never depends
/// on zeno-infra and retry timing stays testable.
pub struct FallbackOrchestrator<C, M, S = TokioSleeper>
where
    C: ChatRepository,
    M: MetricsRepository,
    S: Sleeper,
{
    chat: Arc<ChatService<C>>,
    metrics: Arc<M>,
    policy: PolicyHandle,
    gateways: Arc<GatewayRegistry>,
    backoff: Backoff,
    sleeper: S,
}

impl<C, M> FallbackOrchestrator<C, M, TokioSleeper>
where
    C: ChatRepository,
    M: MetricsRepository,
{
    pub fn new(
        chat: Arc<ChatService<C>>,
        metrics: Arc<M>,
        policy: PolicyHandle,
        gateways: Arc<GatewayRegistry>,
        backoff: Backoff,
    ) -> Self {
        Self::with_sleeper(chat, metrics, policy, gateways, backoff, TokioSleeper)
    }
}

impl<C, M, S> FallbackOrchestrator<C, M, S>
where
    C: ChatRepository,
    M: MetricsRepository,
    S: Sleeper,
{
    pub fn with_sleeper(
        chat: Arc<ChatService<C>>,
        metrics: Arc<M>,
        policy: PolicyHandle,
        gateways: Arc<GatewayRegistry>,
        backoff: Backoff,
        sleeper: S,
    ) -> Self {
        Self {
            chat,
            metrics,
            policy,
            gateways,
            backoff,
            sleeper,
        }
    }

    /// Run one turn, relaying fragments into `tx`.
    ///
    /// Does not send `Done`; [`stream_turn`](Self::stream_turn) does that.
    /// Only a failed user-message persist or an empty message is an `Err`;
    /// provider failures resolve as a `failed` outcome with the outage
    /// notice already relayed.
    #[tracing::instrument(name = "turn", skip_all, fields(session_id = %request.session_id))]
    pub async fn run_turn(
        &self,
        request: TurnRequest,
        tx: &mpsc::Sender<TurnEvent>,
    ) -> Result<TurnOutcome, TurnError> {
        let mut relay = Relay::new(tx);
        let started = Instant::now();

        if request.message.trim().is_empty() {
            return Err(TurnError::InvalidRequest("message must not be empty".to_string()));
        }

        let policy = self.policy.snapshot().await;

        let user_message = self
            .chat
            .append_message(request.session_id, MessageRole::User, &request.message)
            .await
            .map_err(TurnError::UserMessagePersist)?;

        let history = match self
            .chat
            .history_before(&user_message, policy.memory_window)
            .await
        {
            Ok(history) => history,
            Err(e) => {
                warn!(error = %e, "failed to load history, continuing without context");
                Vec::new()
            }
        };

        let mut ctx = TurnContext {
            messages: build_context(&policy.system_prompt, &history, &user_message),
            max_tokens: policy.max_tokens,
            degraded: false,
        };

        let order = policy.effective_fallback_order();
        let attempts = policy.retry_count.max(1);
        let mut fallback_triggered = false;
        let mut last_error: Option<LlmError> = None;

        for (cursor, model) in order.iter().enumerate() {
            if cursor > 0 && cursor == order.len() - 1 && !ctx.degraded {
                ctx.degrade();
                warn!(model = %model, max_tokens = ctx.max_tokens, "entering degraded fallback mode");
            }

            let gateway = match self.gateways.resolve(&policy, model) {
                Ok(gateway) => gateway,
                Err(e) => {
                    warn!(model = %model, error = %e, "no gateway for model, skipping");
                    last_error = Some(e);
                    fallback_triggered = true;
                    continue;
                }
            };
            let timeout = policy.timeout_for(model);

            for attempt in 0..attempts {
                let generation = GenerationRequest {
                    model: model.clone(),
                    messages: ctx.messages.clone(),
                    max_output_tokens: ctx.max_tokens,
                    timeout,
                };

                match self.attempt(gateway.as_ref(), generation, &mut relay).await {
                    Ok(text) => {
                        let latency_ms = elapsed_ms(started);
                        let tokens = approximate_tokens(&text);
                        info!(
                            model = %model,
                            attempt,
                            latency_ms,
                            fallback_triggered,
                            "turn completed"
                        );

                        self.persist_assistant(request.session_id, &text).await;
                        self.record(TurnMetric {
                            id: Uuid::now_v7(),
                            created_at: Utc::now(),
                            session_id: request.session_id,
                            model_used: model.clone(),
                            latency_ms,
                            fallback_triggered,
                            tokens,
                            status: TurnStatus::Success,
                            error_message: None,
                        })
                        .await;

                        return Ok(TurnOutcome {
                            status: TurnStatus::Success,
                            model_used: model.clone(),
                            fallback_triggered,
                            latency_ms,
                            tokens,
                        });
                    }
                    Err(e) => {
                        warn!(
                            model = %model,
                            attempt,
                            gateway = gateway.name(),
                            error = %e,
                            "attempt failed"
                        );
                        last_error = Some(e);
                        if attempt + 1 < attempts {
                            self.sleeper.sleep(self.backoff.delay(attempt)).await;
                        }
                    }
                }
            }

            fallback_triggered = true;
            warn!(model = %model, attempts, "model exhausted, advancing");
        }

        let latency_ms = elapsed_ms(started);
        error!(
            models = order.len(),
            last_error = last_error.as_ref().map(|e| e.to_string()).unwrap_or_default(),
            "all models failed"
        );

        relay.send(TurnEvent::Fragment(EXHAUSTED_NOTICE.to_string())).await;
        self.persist_assistant(request.session_id, EXHAUSTED_NOTICE).await;
        self.record(TurnMetric {
            id: Uuid::now_v7(),
            created_at: Utc::now(),
            session_id: request.session_id,
            model_used: NO_MODEL.to_string(),
            latency_ms,
            fallback_triggered: true,
            tokens: 0,
            status: TurnStatus::Failed,
            error_message: Some(EXHAUSTED_REASON.to_string()),
        })
        .await;

        Ok(TurnOutcome {
            status: TurnStatus::Failed,
            model_used: NO_MODEL.to_string(),
            fallback_triggered: true,
            latency_ms,
            tokens: 0,
        })
    }

    /// Stream one attempt, relaying fragments and accumulating the text.
    async fn attempt(
        &self,
        gateway: &dyn ProviderGateway,
        request: GenerationRequest,
        relay: &mut Relay<'_>,
    ) -> Result<String, LlmError> {
        request.validate()?;
        let span = info_span!(
            "gen_ai.stream",
            gen_ai.provider.name = gateway.name(),
            gen_ai.request.model = %request.model,
            gen_ai.request.max_tokens = request.max_output_tokens,
            gen_ai.request.stream = true,
        );
        let mut stream = gateway.stream(request);

        async {
            let mut text = String::new();
            while let Some(item) = stream.next().await {
                let fragment = item?;
                if fragment.is_empty() {
                    continue;
                }
                text.push_str(&fragment);
                relay.send(TurnEvent::Fragment(fragment)).await;
            }
            Ok::<_, LlmError>(text)
        }
        .instrument(span)
        .await
    }

    async fn persist_assistant(&self, session_id: Uuid, content: &str) {
        if let Err(e) = self
            .chat
            .append_message(session_id, MessageRole::Assistant, content)
            .await
        {
            warn!(error = %e, "failed to persist assistant message");
        }
    }

    async fn record(&self, metric: TurnMetric) {
        if let Err(e) = self.metrics.record_metric(&metric).await {
            warn!(error = %e, status = %metric.status, "failed to record turn metric");
        }
    }
}

impl<C, M, S> FallbackOrchestrator<C, M, S>
where
    C: ChatRepository + 'static,
    M: MetricsRepository + 'static,
    S: Sleeper + 'static,
{
    /// Run a turn on its own task and return its event stream.
    ///
    /// The stream always ends with `Done`. A turn that fails before any
    /// model is tried, or whose task panics, yields one `Error` first.
    /// Dropping the stream stops forwarding; the turn still finishes its
    /// bookkeeping.
    pub fn stream_turn(self: &Arc<Self>, request: TurnRequest) -> TurnStream {
        let (tx, rx) = mpsc::channel(TURN_CHANNEL_CAPACITY);
        let this = Arc::clone(self);

        tokio::spawn(async move {
            let worker_tx = tx.clone();
            let worker =
                tokio::spawn(async move { this.run_turn(request, &worker_tx).await });

            let fault = match worker.await {
                Ok(Ok(_)) => None,
                Ok(Err(e)) => {
                    error!(error = %e, "turn aborted");
                    Some(e.to_string())
                }
                Err(e) => {
                    error!(error = %e, "turn task failed");
                    Some(e.to_string())
                }
            };

            if let Some(detail) = fault {
                let _ = tx
                    .send(TurnEvent::Error {
                        message: INTERNAL_ERROR_MESSAGE.to_string(),
                        detail,
                    })
                    .await;
            }
            let _ = tx.send(TurnEvent::Done).await;
        });

        ReceiverStream::new(rx)
    }
}

/// System instruction, prior history (oldest-first), then the new message.
///
/// Stored system-role messages are not replayed; the policy's instruction
/// is the only system entry.
fn build_context(
    system_prompt: &str,
    history: &[ChatMessage],
    current: &ChatMessage,
) -> Vec<NormalizedMessage> {
    let mut messages = Vec::with_capacity(history.len() + 2);
    messages.push(NormalizedMessage::system(system_prompt));
    messages.extend(
        history
            .iter()
            .filter(|m| m.role != MessageRole::System)
            .map(ChatMessage::to_normalized),
    );
    messages.push(current.to_normalized());
    messages
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}
