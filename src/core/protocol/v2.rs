//! Batch protocol v2: many entries per request with delta-encoded metadata.
//!
//! ```text
//! x-reduct-entries: entry-0,entry%201
//! x-reduct-start-ts: 1000
//! x-reduct-labels: label1,label2
//! x-reduct-0-0: 4,text/plain,0=value1
//! x-reduct-0-1000: 3
//! x-reduct-1-500: 2,,1="a,b"
//! ```
//!
//! A record header only carries what changed since the previous record of
//! the same entry: an empty content type keeps the previous one, and the
//! label segment is a [`labels`](super::labels) delta.

use super::constants::{
    CONTENT_TYPE_HEADER, DEFAULT_CONTENT_TYPE, ENTRIES_HEADER, ERROR_PREFIX, HEADER_PREFIX,
    LABELS_HEADER, START_TS_HEADER,
};
use super::entry_name::{decode_name_list, encode_name_list};
use super::labels::{apply_label_delta, diff_labels, encode_label_delta, parse_label_delta, LabelNameTable};
use super::{concat_payloads, parse_content_length, BatchCodec, DecodedBatch, EncodedBatch, ParsedBatchHeader, ProtocolVersion};
use crate::core::error::{RecordError, RecordErrors, ReductError, Result};
use crate::core::types::{Batch, Labels};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{BTreeMap, HashMap};

static RECORD_HEADER_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^x-reduct-(\d+)-(\d+)$").unwrap());

static ERROR_HEADER_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^x-reduct-error-(\d+)-(\d+)$").unwrap());

/// Codec for the multi-entry batch protocol.
#[derive(Clone, Copy, Debug, Default)]
pub struct BatchCodecV2;

impl BatchCodec for BatchCodecV2 {
    fn version(&self) -> ProtocolVersion {
        ProtocolVersion::V2
    }

    fn encode(&self, batch: &Batch, default_entry: Option<&str>) -> Result<EncodedBatch> {
        let resolved = batch.resolve(default_entry)?;

        let mut headers = BTreeMap::new();
        headers.insert(CONTENT_TYPE_HEADER.to_string(), DEFAULT_CONTENT_TYPE.to_string());

        let Some(start_ts) = resolved.iter().map(|r| r.item.timestamp).min() else {
            headers.insert(ENTRIES_HEADER.to_string(), String::new());
            headers.insert(START_TS_HEADER.to_string(), "0".to_string());
            return Ok(EncodedBatch {
                headers,
                content_length: 0,
                body: Default::default(),
                entries: Vec::new(),
                start_ts: 0,
            });
        };

        // Items are sorted by entry name, so first-seen order is sorted order
        // and (entryIndex, timestamp) matches the body layout.
        let mut entries: Vec<String> = Vec::new();
        let mut label_table = LabelNameTable::new();
        let mut previous: HashMap<usize, (&str, &Labels)> = HashMap::new();
        let mut content_length = 0;

        for record in &resolved {
            let item = record.item;
            let entry_index = match entries.iter().position(|e| e == record.entry) {
                Some(idx) => idx,
                None => {
                    entries.push(record.entry.to_string());
                    entries.len() - 1
                }
            };

            let delta = item.timestamp - start_ts;
            let name = format!("{}{}-{}", HEADER_PREFIX, entry_index, delta);
            if headers.contains_key(&name) {
                return Err(ReductError::Resolution(format!(
                    "Duplicate timestamp {} for entry '{}'",
                    item.timestamp, record.entry
                )));
            }

            let prev = previous.get(&entry_index);
            let content_type = if item.content_type.is_empty() {
                DEFAULT_CONTENT_TYPE
            } else {
                item.content_type.as_str()
            };
            if content_type.contains(',') {
                return Err(ReductError::WireFormat(format!(
                    "Content type '{}' must not contain a comma",
                    content_type
                )));
            }

            let content_type_part = match prev {
                Some((prev_type, _)) if *prev_type == content_type => "",
                _ => content_type,
            };
            let ops = diff_labels(&item.labels, prev.map(|(_, labels)| *labels));
            let label_part = encode_label_delta(&ops, &mut label_table)?;

            let mut value = item.size().to_string();
            if !content_type_part.is_empty() || !label_part.is_empty() {
                value.push(',');
                value.push_str(content_type_part);
            }
            if !label_part.is_empty() {
                value.push(',');
                value.push_str(&label_part);
            }

            headers.insert(name, value);
            previous.insert(entry_index, (content_type, &item.labels));
            content_length += item.size();
        }

        headers.insert(
            ENTRIES_HEADER.to_string(),
            encode_name_list(entries.iter().map(String::as_str)),
        );
        headers.insert(START_TS_HEADER.to_string(), start_ts.to_string());
        if !label_table.is_empty() {
            headers.insert(LABELS_HEADER.to_string(), label_table.to_header());
        }

        Ok(EncodedBatch {
            headers,
            content_length,
            body: concat_payloads(&resolved),
            entries,
            start_ts,
        })
    }

    fn decode(&self, headers: &BTreeMap<String, String>, _default_entry: Option<&str>) -> Result<DecodedBatch> {
        let mut records = Vec::new();
        for (name, value) in headers {
            if let Some(caps) = RECORD_HEADER_REGEX.captures(name) {
                let entry_index = parse_index(&caps[1], name)?;
                let delta = parse_delta(&caps[2], name)?;
                records.push((entry_index, delta, value.as_str()));
            }
        }
        // Header maps don't keep the order the server wrote them in.
        records.sort_by_key(|(entry_index, delta, _)| (*entry_index, *delta));

        let entries = parse_entries(headers, !records.is_empty())?;
        if records.is_empty() {
            return Ok(DecodedBatch {
                entries,
                headers: Vec::new(),
            });
        }
        let start_ts = parse_start_ts(headers)?;
        let label_table = match header(headers, LABELS_HEADER) {
            Some(value) => Some(LabelNameTable::from_header(value)?),
            None => None,
        };

        let mut parsed: Vec<ParsedBatchHeader> = Vec::with_capacity(records.len());
        let mut last_per_entry: HashMap<usize, usize> = HashMap::new();
        for (entry_index, delta, value) in records {
            if entry_index >= entries.len() {
                return Err(ReductError::WireFormat(format!(
                    "Invalid header '{}{}-{}': entry index out of range",
                    HEADER_PREFIX, entry_index, delta
                )));
            }
            let timestamp = start_ts.checked_add(delta).ok_or_else(|| {
                ReductError::WireFormat(format!("Timestamp overflow in header '{}{}-{}'", HEADER_PREFIX, entry_index, delta))
            })?;

            let prev = last_per_entry.get(&entry_index).map(|i| &parsed[*i]);
            let (content_length, content_type, labels) = parse_record(value, prev, label_table.as_ref())?;

            last_per_entry.insert(entry_index, parsed.len());
            parsed.push(ParsedBatchHeader {
                entry_index,
                timestamp,
                content_length,
                content_type,
                labels,
            });
        }

        Ok(DecodedBatch {
            entries,
            headers: parsed,
        })
    }

    fn decode_errors(&self, headers: &BTreeMap<String, String>, sent: &EncodedBatch) -> Result<RecordErrors> {
        let error_headers: Vec<(&String, &String)> = headers
            .iter()
            .filter(|(name, _)| name.to_ascii_lowercase().starts_with(ERROR_PREFIX))
            .collect();
        if error_headers.is_empty() {
            return Ok(RecordErrors::new());
        }

        let entries = match header(headers, ENTRIES_HEADER) {
            Some(value) if !value.trim().is_empty() => decode_name_list(value)?,
            _ => sent.entries.clone(),
        };
        let start_ts = match header(headers, START_TS_HEADER) {
            Some(_) => parse_start_ts(headers)?,
            None => sent.start_ts,
        };

        let mut errors = RecordErrors::new();
        for (name, value) in error_headers {
            let caps = ERROR_HEADER_REGEX
                .captures(name)
                .ok_or_else(|| ReductError::WireFormat(format!("Invalid error header '{}'", name)))?;
            let entry_index = parse_index(&caps[1], name)?;
            let delta = parse_delta(&caps[2], name)?;
            let entry = entries.get(entry_index).ok_or_else(|| {
                ReductError::WireFormat(format!(
                    "Invalid error header '{}': entry index out of range",
                    name
                ))
            })?;
            let timestamp = start_ts.checked_add(delta).ok_or_else(|| {
                ReductError::WireFormat(format!("Timestamp overflow in header '{}'", name))
            })?;
            errors.insert((entry.clone(), timestamp), RecordError::from_header(value)?);
        }
        Ok(errors)
    }
}

fn header<'a>(headers: &'a BTreeMap<String, String>, name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

fn parse_index(raw: &str, name: &str) -> Result<usize> {
    raw.parse::<usize>().map_err(|_| {
        ReductError::WireFormat(format!(
            "Invalid header '{}': entry index must be a number",
            name
        ))
    })
}

fn parse_delta(raw: &str, name: &str) -> Result<u64> {
    raw.parse::<u64>().map_err(|_| {
        ReductError::WireFormat(format!(
            "Invalid header '{}': must be an unix timestamp in microseconds",
            name
        ))
    })
}

/// Entry table. An empty table is only valid for a batch without records.
fn parse_entries(headers: &BTreeMap<String, String>, has_records: bool) -> Result<Vec<String>> {
    match header(headers, ENTRIES_HEADER).map(str::trim) {
        Some("") if !has_records => Ok(Vec::new()),
        Some(value) if !value.is_empty() => decode_name_list(value),
        _ => Err(ReductError::WireFormat(format!(
            "{} header is required",
            ENTRIES_HEADER
        ))),
    }
}

fn parse_start_ts(headers: &BTreeMap<String, String>) -> Result<u64> {
    let value = header(headers, START_TS_HEADER)
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ReductError::WireFormat(format!("{} header is required", START_TS_HEADER)))?;
    value
        .parse::<u64>()
        .map_err(|_| ReductError::WireFormat(format!("Invalid {} header '{}'", START_TS_HEADER, value)))
}

/// Parse `size[,contentType][,labelDelta]` against the previous record of
/// the same entry.
fn parse_record(
    raw: &str,
    prev: Option<&ParsedBatchHeader>,
    label_table: Option<&LabelNameTable>,
) -> Result<(u64, String, Labels)> {
    let Some((size, rest)) = raw.split_once(',') else {
        let content_length = parse_content_length(raw, raw)?;
        let prev = prev.ok_or_else(|| {
            ReductError::WireFormat(
                "Content-type and labels must be provided for the first record of an entry".to_string(),
            )
        })?;
        return Ok((content_length, prev.content_type.clone(), prev.labels.clone()));
    };
    let content_length = parse_content_length(size, raw)?;

    let (content_type, labels_raw) = match rest.split_once(',') {
        Some((content_type, labels)) => (content_type.trim(), Some(labels)),
        None => (rest.trim(), None),
    };

    let content_type = if !content_type.is_empty() {
        content_type.to_string()
    } else if let Some(prev) = prev {
        prev.content_type.clone()
    } else {
        DEFAULT_CONTENT_TYPE.to_string()
    };

    let empty = Labels::new();
    let base = prev.map(|p| &p.labels).unwrap_or(&empty);
    let labels = match labels_raw {
        Some(raw_labels) => apply_label_delta(base, &parse_label_delta(raw_labels, label_table)?),
        None => base.clone(),
    };

    Ok((content_length, content_type, labels))
}
