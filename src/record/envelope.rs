use serde::Deserialize;
use serde_json::Value;

use super::normalize::normalize_all;
use super::OpportunityRecord;
use crate::error::{Error, Result};

/// Response shapes returned by the opportunity endpoints.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Envelope {
    /// `{ "success": true, "opportunities": [...] }`
    Flat {
        opportunities: Vec<Value>,
    },
    /// `{ "success": true, "data": { "opportunities": [...] } }`
    Nested {
        data: NestedData,
    },
    /// A bare list, as returned by the proxy endpoint.
    Bare(Vec<Value>),
}

#[derive(Debug, Deserialize)]
struct NestedData {
    opportunities: Vec<Value>,
}

impl Envelope {
    fn into_items(self) -> Vec<Value> {
        match self {
            Envelope::Flat { opportunities, .. } => opportunities,
            Envelope::Nested { data, .. } => data.opportunities,
            Envelope::Bare(items) => items,
        }
    }
}

/// Decode a JSON response body into canonical records.
pub fn decode_payload(body: &str) -> Result<Vec<OpportunityRecord>> {
    let value: Value = serde_json::from_str(body)?;
    decode_value(value)
}

/// Decode an already-parsed response into canonical records.
///
/// Fails only on the envelope: `success: false` or an unrecognized shape.
/// Malformed items inside a recognized envelope are normalized, not rejected.
pub fn decode_value(value: Value) -> Result<Vec<OpportunityRecord>> {
    if value.get("success").and_then(Value::as_bool) == Some(false) {
        let detail = value
            .get("error")
            .or_else(|| value.get("message"))
            .and_then(Value::as_str)
            .unwrap_or("no detail");
        log::warn!("Opportunity endpoint reported failure: {detail}");
        return Err(Error::Payload(format!("endpoint reported failure: {detail}")));
    }

    let envelope: Envelope = serde_json::from_value(value).map_err(|_| {
        Error::Payload("expected `opportunities`, `data.opportunities`, or a list".into())
    })?;
    let items = envelope.into_items();
    log::debug!("Decoded {} raw opportunities", items.len());
    Ok(normalize_all(&items))
}
