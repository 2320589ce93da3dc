//! Cooperative cancellation shared between a running analysis and its owner.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use log::debug;

use crate::core::error::{DetectError, DetectResult};

#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// `Err(Cancelled)` once cancelled, for use at suspension points.
    pub fn check(&self) -> DetectResult<()> {
        if self.is_cancelled() {
            Err(DetectError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Holds the token of the analysis currently in flight.
///
/// Starting a new run cancels whatever run was registered before it.
#[derive(Debug, Clone, Default)]
pub struct RunSlot {
    active: Arc<Mutex<Option<CancelToken>>>,
}

impl RunSlot {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Option<CancelToken>> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn begin(&self) -> CancelToken {
        let token = CancelToken::new();
        if let Some(previous) = self.lock().replace(token.clone()) {
            if !previous.is_cancelled() {
                debug!("⏹️ superseding previous analysis run");
            }
            previous.cancel();
        }
        token
    }

    /// Cancel the active run, if any. Returns whether one was registered.
    pub fn cancel_active(&self) -> bool {
        match self.lock().as_ref() {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    pub fn finish(&self, token: &CancelToken) {
        let mut active = self.lock();
        let is_same = active
            .as_ref()
            .map(|t| Arc::ptr_eq(&t.flag, &token.flag))
            .unwrap_or(false);
        if is_same {
            *active = None;
        }
    }
}
