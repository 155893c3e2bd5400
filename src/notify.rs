use tracing::info;

/// Outbound hook for downstream consumers (report generation, student
/// notification). Fire-and-forget by contract: implementations swallow their
/// own failures and must never affect the lifecycle transaction, which has
/// already committed by the time the hook runs.
pub trait Notifier: Send {
    fn bulk_operation_applied(&self, operation: &str, group_ids: &[String]);
}

/// Default hook: emits a tracing event and nothing else.
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn bulk_operation_applied(&self, operation: &str, group_ids: &[String]) {
        info!(operation, groups = group_ids.len(), "bulk operation applied");
    }
}

/// Drops every event. Used in tests.
#[allow(dead_code)]
pub struct NullNotifier;

impl Notifier for NullNotifier {
    fn bulk_operation_applied(&self, _operation: &str, _group_ids: &[String]) {}
}
