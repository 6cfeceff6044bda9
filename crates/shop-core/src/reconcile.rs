//! # Reconciliation
//!
//! Hook invoked whenever processor-side state and local rows drift apart
//! after a partial failure. The default hook only logs; an operational
//! job can implement [`ReconciliationHook`] to queue compensating actions
//! (refunds, customer cleanup, re-detach).

use crate::error::{ReconciliationGap, ShopError};
use std::sync::Arc;
use tracing::error;

/// Receives every reconciliation gap detected by the core.
pub trait ReconciliationHook: Send + Sync {
    /// Called once per gap, before the error is returned to the caller.
    fn report(&self, gap: &ReconciliationGap);
}

/// Shared hook (dynamic dispatch)
pub type SharedReconciliationHook = Arc<dyn ReconciliationHook>;

/// Logs gaps at `error` level with every identifier needed for manual repair.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingReconciliation;

impl ReconciliationHook for LoggingReconciliation {
    fn report(&self, gap: &ReconciliationGap) {
        error!(
            kind = gap.label(),
            user_id = %gap.user_id(),
            "Reconciliation required: {}",
            gap
        );
    }
}

/// Report a gap and turn it into the error returned to the caller.
pub(crate) fn raise(hook: &dyn ReconciliationHook, gap: ReconciliationGap) -> ShopError {
    hook.report(&gap);
    ShopError::Reconciliation { gap }
}
