use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};

use crate::types::TargetLanguage;

/// Global notice shown when the credential is rejected mid-batch.
pub const PERMISSION_NOTICE: &str = "API Key permission denied. Please reconnect.";

struct SessionInner {
    target_language: TargetLanguage,
    has_credential: bool,
    global_error: Option<String>,
}

/// Session-wide application state owned by the orchestrator.
///
/// Every field changes only through the transition methods below, so a
/// presentation layer can hold an `Arc` and read it at any time.
pub struct SessionState {
    inner: Mutex<SessionInner>,
    batch_running: AtomicBool,
    cancel_requested: AtomicBool,
}

/// Serializable copy of [`SessionState`] for a front-end.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub target_language: TargetLanguage,
    pub has_credential: bool,
    pub batch_running: bool,
    pub global_error: Option<String>,
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new(true)
    }
}

impl SessionState {
    /// `has_credential` reflects whether an API key was resolved at startup.
    pub fn new(has_credential: bool) -> Self {
        Self {
            inner: Mutex::new(SessionInner {
                target_language: TargetLanguage::default(),
                has_credential,
                global_error: None,
            }),
            batch_running: AtomicBool::new(false),
            cancel_requested: AtomicBool::new(false),
        }
    }

    fn inner(&self) -> MutexGuard<'_, SessionInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn target_language(&self) -> TargetLanguage {
        self.inner().target_language
    }

    /// Applies to the next batch run; a running batch keeps the language it started with.
    pub fn set_target_language(&self, language: TargetLanguage) {
        self.inner().target_language = language;
    }

    pub fn has_credential(&self) -> bool {
        self.inner().has_credential
    }

    pub fn invalidate_credential(&self) {
        self.inner().has_credential = false;
    }

    /// The user supplied a working credential again.
    pub fn reconnect(&self) {
        let mut inner = self.inner();
        inner.has_credential = true;
        inner.global_error = None;
    }

    pub fn global_error(&self) -> Option<String> {
        self.inner().global_error.clone()
    }

    pub fn set_global_error(&self, message: impl Into<String>) {
        self.inner().global_error = Some(message.into());
    }

    pub fn clear_global_error(&self) {
        self.inner().global_error = None;
    }

    pub fn is_batch_running(&self) -> bool {
        self.batch_running.load(Ordering::SeqCst)
    }

    /// Set the running flag. Returns `false` if a batch was already running.
    pub(crate) fn try_begin_batch(&self) -> bool {
        self.batch_running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    pub(crate) fn end_batch(&self) {
        self.batch_running.store(false, Ordering::SeqCst);
    }

    /// Ask the running batch to stop before it dispatches the next item.
    pub fn request_cancel(&self) {
        self.cancel_requested.store(true, Ordering::SeqCst);
    }

    pub(crate) fn take_cancel_request(&self) -> bool {
        self.cancel_requested.swap(false, Ordering::SeqCst)
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let inner = self.inner();
        SessionSnapshot {
            target_language: inner.target_language,
            has_credential: inner.has_credential,
            batch_running: self.is_batch_running(),
            global_error: inner.global_error.clone(),
        }
    }
}
