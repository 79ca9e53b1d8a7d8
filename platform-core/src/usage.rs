//! Usage-reporting hook
//!
//! The control plane that bills/meters a deployment is an external
//! collaborator: this crate only defines the seam the Retention Engine calls
//! into after a run to propagate aggregated freed bytes upstream. Production
//! deployments wire a reporter that posts to `CONTROL_PLANE_URL`; this crate
//! ships only [`NoopUsageReporter`], which drops the report.

use std::future::Future;

use crate::ids::ProjectId;

/// Fire-and-forget usage propagation invoked after a retention run.
///
/// A failure here must never fail the retention run itself — callers are
/// expected to log and swallow the error, never propagate it with `?`.
pub trait UsageReporter: Send + Sync {
    /// Report that `project_id` freed `bytes_freed` bytes of storage in one
    /// retention run.
    fn report_freed_bytes(&self, project_id: &ProjectId, bytes_freed: u64) -> impl Future<Output = ()> + Send;
}

/// Default reporter: drops every report. Used when no control plane is
/// configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopUsageReporter;

impl UsageReporter for NoopUsageReporter {
    async fn report_freed_bytes(&self, _project_id: &ProjectId, _bytes_freed: u64) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn noop_reporter_accepts_any_report() {
        let reporter = NoopUsageReporter;
        reporter.report_freed_bytes(&ProjectId::new(), 1024).await;
    }
}
