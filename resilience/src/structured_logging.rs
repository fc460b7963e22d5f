//! Correlation-id propagation for tracing spans.
//!
//! The core logs every pipeline stage through `tracing`; this module just
//! standardizes how a request's id gets attached to a span so log lines
//! across analysis, decomposition, routing, execution, arbitration and
//! synthesis can be joined back together by `request_id`.

use tracing::{info_span, Span};
use uuid::Uuid;

/// Open a span scoped to one request, carrying its id on every event
/// emitted underneath it.
pub fn request_span(request_id: Uuid, stage: &'static str) -> Span {
    info_span!("pipeline_stage", request_id = %request_id, stage)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn span_is_constructed_without_panicking() {
        let _span = request_span(Uuid::new_v4(), "analysis");
    }
}
