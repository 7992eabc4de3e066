//! Ordered, failure-isolating distribution to all sinks

use std::sync::Arc;

use super::{IssueContent, Sink};
use crate::sources::Issue;

/// Distributes issues to a fixed, ordered list of sinks
#[derive(Clone, Default)]
pub struct SinkFanout {
    sinks: Arc<Vec<Arc<dyn Sink>>>,
}

impl SinkFanout {
    /// Create a fanout over `sinks`, in delivery order
    pub fn new(sinks: Vec<Arc<dyn Sink>>) -> Self {
        Self {
            sinks: Arc::new(sinks),
        }
    }

    /// Number of sinks
    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    /// Whether there is no sink at all
    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }

    /// Whether at least one sink is critical
    pub fn any_critical(&self) -> bool {
        self.sinks.iter().any(|sink| sink.is_critical())
    }

    /// Deliver `issue` to every sink, in order
    ///
    /// Every sink is attempted exactly once, whatever happened to the previous
    /// ones. Returns false when a critical sink failed.
    pub async fn distribute(&self, issue: &Issue, content: &IssueContent) -> bool {
        let mut success = true;

        for sink in self.sinks.iter() {
            match sink.deliver(issue, content).await {
                Ok(()) => {
                    tracing::debug!(sink = %sink.name(), issue = %issue, "Issue delivered");
                }
                Err(e) if sink.is_critical() => {
                    tracing::error!(
                        sink = %sink.name(),
                        issue = %issue,
                        error = %e,
                        "Critical sink cannot process the new issue"
                    );
                    success = false;
                }
                Err(e) => {
                    tracing::warn!(
                        sink = %sink.name(),
                        issue = %issue,
                        error = %e,
                        "A sink cannot process the new issue"
                    );
                }
            }
        }

        success
    }
}
