//! # Wire Format
//!
//! Decoding of text frames from the push stream into `StreamEvent`s.
//!
//! Two field spellings are accepted:
//!
//! | Meaning | Canonical | Legacy |
//! |---------|-----------|--------|
//! | kind    | `kind`      | `action`   |
//! | subject | `subjectId` | `contract` |
//!
//! Correlation and outcome fields are left in the field bag; the correlator
//! decides which names it reads.

use crate::entities::{EventKind, StreamEvent, SubjectId};
use crate::errors::DecodeError;
use serde_json::Value;

const KIND_FIELDS: [&str; 2] = ["kind", "action"];
const SUBJECT_FIELDS: [&str; 3] = ["subjectId", "subject_id", "contract"];

/// What to do with one raw frame.
#[derive(Debug, Clone, PartialEq)]
pub enum FrameDecision {
    /// Empty or whitespace-only frame (keep-alive).
    Blank,
    /// Well-formed event ready for dispatch.
    Event(StreamEvent),
    /// Unparseable payload, to be dropped.
    Malformed(DecodeError),
}

/// Classify a raw text frame.
pub fn decode_frame(text: &str) -> FrameDecision {
    if text.trim().is_empty() {
        return FrameDecision::Blank;
    }
    match decode_event(text) {
        Ok(event) => FrameDecision::Event(event),
        Err(e) => FrameDecision::Malformed(e),
    }
}

/// Decode one JSON event.
pub fn decode_event(text: &str) -> Result<StreamEvent, DecodeError> {
    let value: Value =
        serde_json::from_str(text).map_err(|e| DecodeError::InvalidJson(e.to_string()))?;
    let Value::Object(mut fields) = value else {
        return Err(DecodeError::NotAnObject);
    };

    let kind = KIND_FIELDS
        .iter()
        .find_map(|k| fields.get(*k).and_then(Value::as_str))
        .filter(|k| !k.is_empty())
        .map(EventKind::new)
        .ok_or(DecodeError::MissingKind)?;

    let mut subject_id = None;
    for key in SUBJECT_FIELDS {
        match fields.get(key) {
            None | Some(Value::Null) => continue,
            Some(Value::String(s)) => {
                subject_id = Some(SubjectId::new(s.clone()));
                break;
            }
            Some(_) => return Err(DecodeError::InvalidSubject),
        }
    }

    for key in KIND_FIELDS.iter().chain(SUBJECT_FIELDS.iter()) {
        fields.remove(*key);
    }

    Ok(StreamEvent {
        kind,
        subject_id,
        fields,
    })
}
