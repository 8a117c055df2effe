//! Batch protocol v1: one entry per request, one header per record.
//!
//! ```text
//! x-reduct-time-1000: 4,text/plain,label1=value1,label2="a,b"
//! x-reduct-time-2000: 3,text/plain
//! ```

use super::constants::{CONTENT_TYPE_HEADER, DEFAULT_CONTENT_TYPE, ERROR_PREFIX, TIME_PREFIX};
use super::labels::{format_label_value, split_label_pairs, RawLabelValue};
use super::{concat_payloads, parse_content_length, BatchCodec, DecodedBatch, EncodedBatch, ParsedBatchHeader, ProtocolVersion};
use crate::core::error::{RecordError, RecordErrors, ReductError, Result};
use crate::core::types::{Batch, Labels};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;

static ERROR_HEADER_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^x-reduct-error-(\d+)$").unwrap());

/// Codec for the single-entry batch protocol.
#[derive(Clone, Copy, Debug, Default)]
pub struct BatchCodecV1;

impl BatchCodec for BatchCodecV1 {
    fn version(&self) -> ProtocolVersion {
        ProtocolVersion::V1
    }

    fn encode(&self, batch: &Batch, default_entry: Option<&str>) -> Result<EncodedBatch> {
        let resolved = batch.resolve(default_entry)?;

        let entry = match resolved.first() {
            Some(first) => first.entry,
            None => default_entry.unwrap_or_default(),
        };
        if let Some(other) = resolved.iter().find(|r| r.entry != entry) {
            return Err(ReductError::Resolution(format!(
                "Batch protocol v1 writes to one entry, got '{}' and '{}'",
                entry, other.entry
            )));
        }

        let mut headers = BTreeMap::new();
        let mut content_length = 0;
        for record in &resolved {
            let item = record.item;
            let name = format!("{}{}", TIME_PREFIX, item.timestamp);
            if headers.contains_key(&name) {
                return Err(ReductError::Resolution(format!(
                    "Duplicate timestamp {} for entry '{}'",
                    item.timestamp, entry
                )));
            }
            headers.insert(name, format_record(item.size(), &item.content_type, &item.labels)?);
            content_length += item.size();
        }
        headers.insert(CONTENT_TYPE_HEADER.to_string(), DEFAULT_CONTENT_TYPE.to_string());

        let entries = if entry.is_empty() { Vec::new() } else { vec![entry.to_string()] };
        Ok(EncodedBatch {
            headers,
            content_length,
            body: concat_payloads(&resolved),
            entries,
            start_ts: 0,
        })
    }

    fn decode(&self, headers: &BTreeMap<String, String>, default_entry: Option<&str>) -> Result<DecodedBatch> {
        let entry = default_entry.ok_or_else(|| {
            ReductError::Resolution("Batch protocol v1 needs an entry name to decode records".to_string())
        })?;

        let mut parsed = Vec::new();
        for (name, value) in headers {
            let lower = name.to_ascii_lowercase();
            let Some(suffix) = lower.strip_prefix(TIME_PREFIX) else {
                continue;
            };
            let timestamp = suffix.parse::<u64>().map_err(|_| {
                ReductError::WireFormat(format!(
                    "Invalid header '{}': must be an unix timestamp in microseconds",
                    name
                ))
            })?;
            let (content_length, content_type, labels) = parse_record(value)?;
            parsed.push(ParsedBatchHeader {
                entry_index: 0,
                timestamp,
                content_length,
                content_type,
                labels,
            });
        }

        parsed.sort_by_key(|h| h.timestamp);
        Ok(DecodedBatch {
            entries: vec![entry.to_string()],
            headers: parsed,
        })
    }

    fn decode_errors(&self, headers: &BTreeMap<String, String>, sent: &EncodedBatch) -> Result<RecordErrors> {
        let mut errors = RecordErrors::new();
        for (name, value) in headers {
            if !name.to_ascii_lowercase().starts_with(ERROR_PREFIX) {
                continue;
            }
            let timestamp = ERROR_HEADER_REGEX
                .captures(name)
                .and_then(|caps| caps[1].parse::<u64>().ok())
                .ok_or_else(|| ReductError::WireFormat(format!("Invalid error header '{}'", name)))?;
            let entry = sent.entries.first().ok_or_else(|| {
                ReductError::WireFormat(format!("Error header '{}' for an empty batch", name))
            })?;
            errors.insert((entry.clone(), timestamp), RecordError::from_header(value)?);
        }
        Ok(errors)
    }
}

fn format_record(size: u64, content_type: &str, labels: &Labels) -> Result<String> {
    if content_type.contains(',') {
        return Err(ReductError::WireFormat(format!(
            "Content type '{}' must not contain a comma",
            content_type
        )));
    }

    let mut value = format!("{},{}", size, content_type);
    for (name, label) in labels {
        if name.is_empty() || name.contains([',', '=', '"']) || name.trim() != name {
            return Err(ReductError::WireFormat(format!(
                "Label name '{}' can't be sent with batch protocol v1",
                name
            )));
        }
        value.push(',');
        value.push_str(name);
        value.push('=');
        value.push_str(&format_label_value(label)?);
    }
    Ok(value)
}

/// Parse `size,contentType[,label=value]*`.
fn parse_record(raw: &str) -> Result<(u64, String, Labels)> {
    let (size, rest) = raw.split_once(',').ok_or_else(|| {
        ReductError::WireFormat(format!("Invalid batched header value '{}'", raw))
    })?;
    let content_length = parse_content_length(size, raw)?;

    let (content_type, labels_raw) = match rest.split_once(',') {
        Some((content_type, labels)) => (content_type, labels),
        None => (rest, ""),
    };

    let labels = split_label_pairs(labels_raw)?
        .into_iter()
        .map(|(name, value)| {
            let value = match value {
                RawLabelValue::Plain(v) | RawLabelValue::Quoted(v) => v,
            };
            (name.to_string(), value.to_string())
        })
        .collect();

    Ok((content_length, content_type.trim().to_string(), labels))
}
