use jsonschema::JSONSchema;
use once_cell::sync::Lazy;
use serde_json::Value;
use tracing::warn;

static EVENT_ENVELOPE_SCHEMA_RAW: &str = include_str!("../schemas/event_envelope.schema.json");

static EVENT_ENVELOPE_SCHEMA: Lazy<JSONSchema> = Lazy::new(|| {
    let parsed: Value = serde_json::from_str(EVENT_ENVELOPE_SCHEMA_RAW)
        .expect("event envelope schema is valid JSON");
    JSONSchema::compile(&parsed).expect("event envelope schema compiles")
});

/// Validate a serialized event envelope against the wire-format schema.
pub fn validate_event_envelope(value: &Value) -> Result<(), crate::error::ContractError> {
    EVENT_ENVELOPE_SCHEMA.validate(value).map_err(|errors| {
        let message = errors
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("; ");
        warn!(error = %message, "event envelope failed schema validation");
        crate::error::ContractError::Validation(message)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn accepts_well_formed_envelope() {
        let envelope = json!({
            "request_id": "3fae1a1e-9b4f-4e36-9b3c-5a8e6b7f0d11",
            "type": "processing_started",
            "data": { "execution_mode": "Balanced" },
            "ts": "2026-01-01T00:00:00Z"
        });
        assert!(validate_event_envelope(&envelope).is_ok());
    }

    #[test]
    fn rejects_unknown_type() {
        let envelope = json!({
            "request_id": "3fae1a1e-9b4f-4e36-9b3c-5a8e6b7f0d11",
            "type": "not_a_real_event",
            "data": {},
            "ts": "2026-01-01T00:00:00Z"
        });
        assert!(validate_event_envelope(&envelope).is_err());
    }
}
