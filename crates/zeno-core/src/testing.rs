//! In-memory fakes shared by the unit tests in this crate.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use uuid::Uuid;
use zeno_types::chat::{ChatMessage, MessageRole, Session};
use zeno_types::error::RepositoryError;
use zeno_types::llm::{GenerationRequest, LlmError};
use zeno_types::metric::{ModelUsage, TurnMetric, TurnStats, TurnStatus};
use zeno_types::policy::RoutingPolicy;

use crate::chat::repository::ChatRepository;
use crate::llm::provider::{FragmentStream, ProviderGateway};
use crate::metrics::repository::MetricsRepository;
use crate::policy::repository::PolicyRepository;
use crate::turn::backoff::Sleeper;

#[derive(Default)]
pub struct InMemoryChatRepository {
    sessions: Mutex<Vec<Session>>,
    messages: Mutex<Vec<ChatMessage>>,
    fail_writes: AtomicBool,
}

impl InMemoryChatRepository {
    /// Make every subsequent `save_message` fail.
    pub fn fail_writes(&self) {
        self.fail_writes.store(true, Ordering::SeqCst);
    }

    pub fn messages(&self, session_id: &Uuid) -> Vec<ChatMessage> {
        self.messages
            .lock()
            .unwrap()
            .iter()
            .filter(|m| &m.session_id == session_id)
            .cloned()
            .collect()
    }
}

impl ChatRepository for InMemoryChatRepository {
    async fn create_session(&self, session: &Session) -> Result<Session, RepositoryError> {
        self.sessions.lock().unwrap().push(session.clone());
        Ok(session.clone())
    }

    async fn get_session(&self, session_id: &Uuid) -> Result<Option<Session>, RepositoryError> {
        Ok(self
            .sessions
            .lock()
            .unwrap()
            .iter()
            .find(|s| &s.id == session_id)
            .cloned())
    }

    async fn save_message(&self, message: &ChatMessage) -> Result<(), RepositoryError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(RepositoryError::Connection);
        }
        let known = self
            .sessions
            .lock()
            .unwrap()
            .iter()
            .any(|s| s.id == message.session_id);
        if !known {
            return Err(RepositoryError::NotFound);
        }
        self.messages.lock().unwrap().push(message.clone());
        Ok(())
    }

    async fn recent_messages(
        &self,
        session_id: &Uuid,
        limit: u32,
    ) -> Result<Vec<ChatMessage>, RepositoryError> {
        let all = self.messages(session_id);
        let skip = all.len().saturating_sub(limit as usize);
        Ok(all.into_iter().skip(skip).collect())
    }

    async fn recent_dialogue(
        &self,
        session_id: &Uuid,
        limit: u32,
    ) -> Result<Vec<ChatMessage>, RepositoryError> {
        let dialogue: Vec<_> = self
            .messages(session_id)
            .into_iter()
            .filter(|m| m.role != MessageRole::System)
            .collect();
        let skip = dialogue.len().saturating_sub(limit as usize);
        Ok(dialogue.into_iter().skip(skip).collect())
    }
}

#[derive(Default)]
pub struct InMemoryMetricsRepository {
    metrics: Mutex<Vec<TurnMetric>>,
    fail_writes: AtomicBool,
}

impl InMemoryMetricsRepository {
    pub fn fail_writes(&self) {
        self.fail_writes.store(true, Ordering::SeqCst);
    }

    pub fn all(&self) -> Vec<TurnMetric> {
        self.metrics.lock().unwrap().clone()
    }
}

impl MetricsRepository for InMemoryMetricsRepository {
    async fn record_metric(&self, metric: &TurnMetric) -> Result<(), RepositoryError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(RepositoryError::Connection);
        }
        self.metrics.lock().unwrap().push(metric.clone());
        Ok(())
    }

    async fn stats(&self, since: DateTime<Utc>) -> Result<TurnStats, RepositoryError> {
        let all = self.all();
        let recent: Vec<_> = all.iter().filter(|m| m.created_at > since).collect();
        let mut per_model: HashMap<String, i64> = HashMap::new();
        for m in all.iter().filter(|m| m.status == TurnStatus::Success) {
            *per_model.entry(m.model_used.clone()).or_default() += 1;
        }
        let avg = if recent.is_empty() {
            0.0
        } else {
            recent.iter().map(|m| m.latency_ms as f64).sum::<f64>() / recent.len() as f64
        };
        Ok(TurnStats {
            req_last_hour: recent.len() as i64,
            avg_latency: (avg * 100.0).round() / 100.0,
            fallback_count: all.iter().filter(|m| m.fallback_triggered).count() as i64,
            model_distribution: per_model
                .into_iter()
                .map(|(model, count)| ModelUsage { model, count })
                .collect(),
        })
    }

    async fn recent_metrics(&self, limit: u32) -> Result<Vec<TurnMetric>, RepositoryError> {
        Ok(self.all().into_iter().rev().take(limit as usize).collect())
    }
}

#[derive(Default)]
pub struct InMemoryPolicyRepository {
    stored: Mutex<Option<RoutingPolicy>>,
    /// Save latency keyed by the policy's `retry_count`.
    save_delays: Mutex<HashMap<u32, Duration>>,
}

impl InMemoryPolicyRepository {
    pub fn with(policy: RoutingPolicy) -> Self {
        Self {
            stored: Mutex::new(Some(policy)),
            save_delays: Mutex::new(HashMap::new()),
        }
    }

    /// Make saves of policies with this `retry_count` take `delay`.
    pub fn delay_saves_of(&self, retry_count: u32, delay: Duration) {
        self.save_delays.lock().unwrap().insert(retry_count, delay);
    }

    pub fn stored(&self) -> Option<RoutingPolicy> {
        self.stored.lock().unwrap().clone()
    }
}

impl PolicyRepository for InMemoryPolicyRepository {
    async fn load_policy(&self) -> Result<Option<RoutingPolicy>, RepositoryError> {
        Ok(self.stored())
    }

    async fn save_policy(&self, policy: &RoutingPolicy) -> Result<(), RepositoryError> {
        let delay = self
            .save_delays
            .lock()
            .unwrap()
            .get(&policy.retry_count)
            .copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        *self.stored.lock().unwrap() = Some(policy.clone());
        Ok(())
    }
}

/// Behaviour of one model in a [`ScriptedGateway`].
#[derive(Clone)]
pub enum Script {
    /// Yield these fragments, then complete.
    Fragments(Vec<&'static str>),
    /// Fail before yielding anything.
    AlwaysFail,
    /// Yield these fragments, then fail.
    PartialThenFail(Vec<&'static str>),
    /// Fail the first `n` calls, then yield these fragments.
    FailTimes(usize, Vec<&'static str>),
}

/// Gateway whose behaviour is scripted per model id. Records every request.
#[derive(Default)]
pub struct ScriptedGateway {
    scripts: HashMap<String, Script>,
    requests: Mutex<Vec<GenerationRequest>>,
}

impl ScriptedGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(mut self, model: &str, script: Script) -> Self {
        self.scripts.insert(model.to_string(), script);
        self
    }

    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn calls_for(&self, model: &str) -> usize {
        self.requests().iter().filter(|r| r.model == model).count()
    }
}

impl ProviderGateway for ScriptedGateway {
    fn name(&self) -> &str {
        "scripted"
    }

    fn stream(&self, request: GenerationRequest) -> FragmentStream {
        let model = request.model.clone();
        let previous_calls = self.calls_for(&model);
        self.requests.lock().unwrap().push(request);
        let script = self.scripts.get(&model).cloned().unwrap_or(Script::AlwaysFail);

        Box::pin(async_stream::stream! {
            match script {
                Script::Fragments(fragments) => {
                    for f in fragments {
                        yield Ok(f.to_string());
                    }
                }
                Script::AlwaysFail => {
                    yield Err(LlmError::Transport(format!("{model} unreachable")));
                }
                Script::PartialThenFail(fragments) => {
                    for f in fragments {
                        yield Ok(f.to_string());
                    }
                    yield Err(LlmError::Stream("connection reset".to_string()));
                }
                Script::FailTimes(n, fragments) => {
                    if previous_calls < n {
                        yield Err(LlmError::Status { status: 429, body: "rate limited".to_string() });
                    } else {
                        for f in fragments {
                            yield Ok(f.to_string());
                        }
                    }
                }
            }
        })
    }
}

/// Sleeper that returns immediately and records requested delays.
#[derive(Default)]
pub struct RecordingSleeper {
    delays: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn delays(&self) -> Vec<Duration> {
        self.delays.lock().unwrap().clone()
    }
}

impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.delays.lock().unwrap().push(duration);
    }
}
