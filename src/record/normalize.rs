use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde_json::Value;

use super::{Contact, OpportunityRecord, Status};
use crate::date_util::parse_timestamp;

/// Placeholder name for records without one.
pub const UNTITLED: &str = "Untitled";

/// One place a concept can live in a raw record.
#[derive(Debug, Clone, Copy)]
enum FieldShape {
    /// `{ "key": ... }`
    Flat(&'static str),
    /// `{ "outer": { "key": ... } }`
    Nested(&'static str, &'static str),
    /// `{ "outer": { "a": ..., "b": ... } }`, joined with a space.
    NestedPair(&'static str, &'static str, &'static str),
}

use FieldShape::{Flat, Nested, NestedPair};

// Shapes are tried in order; the first present, non-null value wins.
const ID: &[FieldShape] = &[Flat("id"), Flat("_id")];
const NAME: &[FieldShape] = &[Flat("name"), Flat("title")];
const MONETARY_VALUE: &[FieldShape] = &[Flat("monetaryValue"), Flat("value"), Flat("amount")];
const STATUS: &[FieldShape] = &[Flat("status")];
const PIPELINE: &[FieldShape] = &[Flat("pipelineId"), Flat("pipeline_id")];
const ASSIGNED_TO: &[FieldShape] = &[Flat("assignedTo"), Flat("ownerId"), Flat("assigned_to")];
const CREATED_AT: &[FieldShape] = &[Flat("createdAt"), Flat("created"), Flat("dateAdded")];
const UPDATED_AT: &[FieldShape] = &[Flat("updatedAt"), Flat("updated")];
const STATUS_CHANGED_AT: &[FieldShape] = &[Flat("lastStatusChangeAt"), Flat("lastStatusChange")];
const CONTACT_NAME: &[FieldShape] = &[
    Nested("contact", "name"),
    NestedPair("contact", "firstName", "lastName"),
    Flat("contactName"),
];
const CONTACT_EMAIL: &[FieldShape] = &[
    Nested("contact", "email"),
    Flat("email"),
    Flat("contactEmail"),
];
const CONTACT_TAGS: &[FieldShape] = &[Nested("contact", "tags"), Flat("tags")];

/// Map a raw opportunity into its canonical shape.
///
/// Never fails: every field falls back to a default, and a non-object
/// input yields a fully defaulted record.
pub fn normalize(raw: &Value) -> OpportunityRecord {
    let status = text(raw, STATUS)
        .map(|s| Status::parse(&s))
        .unwrap_or(Status::Unknown);

    OpportunityRecord {
        id: text(raw, ID).unwrap_or_default(),
        name: text(raw, NAME).unwrap_or_else(|| UNTITLED.to_string()),
        monetary_value: monetary_value(raw),
        status,
        pipeline_id: text(raw, PIPELINE),
        assigned_to: text(raw, ASSIGNED_TO),
        created_at: timestamp(raw, CREATED_AT),
        updated_at: timestamp(raw, UPDATED_AT),
        last_status_change_at: timestamp(raw, STATUS_CHANGED_AT),
        contact: contact(raw),
    }
}

/// Normalize every element of a raw list.
pub fn normalize_all(raw: &[Value]) -> Vec<OpportunityRecord> {
    raw.iter().map(normalize).collect()
}

fn lookup<'a>(raw: &'a Value, shape: FieldShape) -> Option<&'a Value> {
    let v = match shape {
        Flat(key) => raw.get(key),
        Nested(outer, key) => raw.get(outer).and_then(|o| o.get(key)),
        NestedPair(..) => None,
    };
    v.filter(|v| !v.is_null())
}

fn first_value<'a>(raw: &'a Value, shapes: &[FieldShape]) -> Option<&'a Value> {
    shapes.iter().find_map(|&shape| lookup(raw, shape))
}

fn scalar_text(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => {
            let s = s.trim();
            (!s.is_empty()).then(|| s.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn text(raw: &Value, shapes: &[FieldShape]) -> Option<String> {
    shapes.iter().find_map(|&shape| match shape {
        NestedPair(outer, a, b) => {
            let obj = raw.get(outer)?;
            let parts: Vec<String> = [a, b]
                .iter()
                .filter_map(|k| obj.get(*k).and_then(scalar_text))
                .collect();
            (!parts.is_empty()).then(|| parts.join(" "))
        }
        _ => lookup(raw, shape).and_then(scalar_text),
    })
}

fn monetary_value(raw: &Value) -> f64 {
    let parsed = match first_value(raw, MONETARY_VALUE) {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => {
            let cleaned: String = s
                .trim()
                .chars()
                .filter(|c| *c != '$' && *c != ',')
                .collect();
            cleaned.parse::<f64>().ok()
        }
        _ => None,
    };
    match parsed {
        Some(v) if v.is_finite() && v > 0.0 => v,
        Some(v) if v == 0.0 => 0.0,
        Some(v) => {
            log::trace!("Clamping monetary value {v} to 0");
            0.0
        }
        None => 0.0,
    }
}

fn timestamp(raw: &Value, shapes: &[FieldShape]) -> Option<DateTime<Utc>> {
    let v = first_value(raw, shapes)?;
    let parsed = parse_timestamp(v);
    if parsed.is_none() {
        log::warn!("Ignoring unparseable timestamp {v}");
    }
    parsed
}

fn tags(raw: &Value) -> BTreeSet<String> {
    let clean = |s: &str| {
        let s = s.trim();
        (!s.is_empty()).then(|| s.to_string())
    };
    match first_value(raw, CONTACT_TAGS) {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .filter_map(clean)
            .collect(),
        Some(Value::String(s)) => clean(s.as_str()).into_iter().collect(),
        _ => BTreeSet::new(),
    }
}

fn contact(raw: &Value) -> Option<Contact> {
    let contact = Contact {
        name: text(raw, CONTACT_NAME),
        email: text(raw, CONTACT_EMAIL),
        tags: tags(raw),
    };
    if contact.name.is_none() && contact.email.is_none() && contact.tags.is_empty() {
        None
    } else {
        Some(contact)
    }
}
