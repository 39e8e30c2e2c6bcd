//! Routing policy file hot reload.
//!
//! Provides:
//! - `load_policy_file()` -- Read and parse a JSON policy document
//! - `apply_policy_file()` -- Load a file and replace the live policy
//! - `watch_policy_file()` -- Debounced watcher that re-applies the file on change
//! - `PolicyWatcher` -- RAII handle that keeps the watcher alive

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use notify_debouncer_mini::notify::{RecommendedWatcher, RecursiveMode};
use notify_debouncer_mini::{DebounceEventResult, Debouncer, new_debouncer};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use zeno_core::policy::repository::PolicyRepository;
use zeno_core::policy::service::PolicyService;
use zeno_types::error::PolicyError;
use zeno_types::policy::RoutingPolicy;

const DEBOUNCE: Duration = Duration::from_millis(300);

/// Errors from loading or watching a policy file.
#[derive(Debug, thiserror::Error)]
pub enum PolicyFileError {
    #[error("failed to read policy file '{path}': {reason}")]
    Read { path: String, reason: String },

    #[error("failed to parse policy file '{path}': {reason}")]
    Parse { path: String, reason: String },

    #[error(transparent)]
    Rejected(#[from] PolicyError),

    #[error("watcher creation failed: {0}")]
    WatcherCreation(String),

    #[error("failed to watch path '{path}': {reason}")]
    WatchPath { path: String, reason: String },
}

/// Read and parse a routing policy JSON document. Does not validate.
pub async fn load_policy_file(path: &Path) -> Result<RoutingPolicy, PolicyFileError> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| PolicyFileError::Read {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
    serde_json::from_str(&content).map_err(|e| PolicyFileError::Parse {
        path: path.display().to_string(),
        reason: e.to_string(),
    })
}

/// Load `path` and make it the live policy.
pub async fn apply_policy_file<P: PolicyRepository>(
    path: &Path,
    service: &PolicyService<P>,
) -> Result<(), PolicyFileError> {
    let policy = load_policy_file(path).await?;
    service.replace_policy(policy).await?;
    Ok(())
}

/// RAII handle that keeps a policy file watcher alive.
///
/// Dropping it stops the watcher and the reload task.
pub struct PolicyWatcher {
    _debouncer: Debouncer<RecommendedWatcher>,
    reload_task: JoinHandle<()>,
    path: PathBuf,
}

impl PolicyWatcher {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for PolicyWatcher {
    fn drop(&mut self) {
        self.reload_task.abort();
        tracing::debug!(path = %self.path.display(), "policy watcher dropped");
    }
}

/// Watch `path` and re-apply it whenever it changes.
///
/// The parent directory is watched so editors that replace the file by
/// rename are still picked up. A file that fails to parse or validate is
/// logged and the previous policy stays live. Must be called inside a
/// tokio runtime.
pub fn watch_policy_file<P>(
    path: &Path,
    service: Arc<PolicyService<P>>,
) -> Result<PolicyWatcher, PolicyFileError>
where
    P: PolicyRepository + 'static,
{
    let path = std::path::absolute(path).map_err(|e| PolicyFileError::WatchPath {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;
    let dir = path
        .parent()
        .map(Path::to_path_buf)
        .ok_or_else(|| PolicyFileError::WatchPath {
            path: path.display().to_string(),
            reason: "path has no parent directory".to_string(),
        })?;

    // one pending reload is enough; extra signals collapse into it
    let (tx, mut rx) = mpsc::channel::<()>(1);
    let target = path.clone();

    let mut debouncer = new_debouncer(DEBOUNCE, move |result: DebounceEventResult| match result {
        Ok(events) => {
            if events.iter().any(|e| e.path == target) {
                let _ = tx.try_send(());
            }
        }
        Err(err) => {
            tracing::warn!(error = %err, "policy watcher error");
        }
    })
    .map_err(|e| PolicyFileError::WatcherCreation(e.to_string()))?;

    debouncer
        .watcher()
        .watch(&dir, RecursiveMode::NonRecursive)
        .map_err(|e| PolicyFileError::WatchPath {
            path: dir.display().to_string(),
            reason: e.to_string(),
        })?;

    let reload_path = path.clone();
    let reload_task = tokio::spawn(async move {
        while rx.recv().await.is_some() {
            match apply_policy_file(&reload_path, &service).await {
                Ok(()) => tracing::info!(path = %reload_path.display(), "policy file reloaded"),
                Err(err) => tracing::warn!(
                    path = %reload_path.display(),
                    error = %err,
                    "policy file rejected, keeping previous policy"
                ),
            }
        }
    });

    tracing::info!(path = %path.display(), "policy file watcher started");

    Ok(PolicyWatcher {
        _debouncer: debouncer,
        reload_task,
        path,
    })
}
