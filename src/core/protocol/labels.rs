//! Label delta encoding.
//!
//! A record's labels are sent as the difference to the previous record of
//! the same entry. Each op is `name=value`, `name="quoted value"` or `name=`
//! (remove). In v2 the name is an index into a label name table that is
//! shared by the whole batch.

use crate::core::error::{ReductError, Result};
use crate::core::protocol::entry_name::{decode_name_list, encode_name_list};
use crate::core::types::Labels;
use std::collections::{BTreeSet, HashMap};

/// One change to a label map. `value: None` removes the label.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LabelDeltaOp {
    pub key: String,
    pub value: Option<String>,
}

impl LabelDeltaOp {
    pub fn set(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: Some(value.into()),
        }
    }

    pub fn remove(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: None,
        }
    }
}

/// Ops that turn `previous` into `current`, sorted by label name.
///
/// `None` for `previous` means the first record of an entry and diffs
/// against an empty map.
pub fn diff_labels(current: &Labels, previous: Option<&Labels>) -> Vec<LabelDeltaOp> {
    let empty = Labels::new();
    let previous = previous.unwrap_or(&empty);

    let keys: BTreeSet<&String> = current.keys().chain(previous.keys()).collect();
    keys.into_iter()
        .filter_map(|key| match (previous.get(key), current.get(key)) {
            (prev, Some(value)) if prev != Some(value) => Some(LabelDeltaOp::set(key, value)),
            (Some(_), None) => Some(LabelDeltaOp::remove(key)),
            _ => None,
        })
        .collect()
}

/// Apply ops in order to a copy of `base`. Later ops win.
pub fn apply_label_delta(base: &Labels, ops: &[LabelDeltaOp]) -> Labels {
    let mut labels = base.clone();
    for op in ops {
        match &op.value {
            Some(value) => {
                labels.insert(op.key.clone(), value.clone());
            }
            None => {
                labels.remove(&op.key);
            }
        }
    }
    labels
}

/// Append-only table of label names.
///
/// A name gets the next free index the first time it is seen.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LabelNameTable {
    names: Vec<String>,
    index: HashMap<String, usize>,
}

impl LabelNameTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn index_of(&mut self, name: &str) -> usize {
        if let Some(idx) = self.index.get(name) {
            return *idx;
        }
        let idx = self.names.len();
        self.names.push(name.to_string());
        self.index.insert(name.to_string(), idx);
        idx
    }

    pub fn name(&self, idx: usize) -> Option<&str> {
        self.names.get(idx).map(String::as_str)
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Header value: percent-encoded names in index order.
    pub fn to_header(&self) -> String {
        encode_name_list(self.names.iter().map(String::as_str))
    }

    /// Parse a header value. Names keep their position even when repeated.
    pub fn from_header(value: &str) -> Result<Self> {
        let value = value.trim();
        if value.is_empty() {
            return Err(ReductError::WireFormat(
                "x-reduct-labels header is empty".to_string(),
            ));
        }
        let mut table = Self::new();
        for name in decode_name_list(value)? {
            let idx = table.names.len();
            table.index.entry(name.clone()).or_insert(idx);
            table.names.push(name);
        }
        Ok(table)
    }
}

/// Value of a `name=value` pair as written on the wire.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RawLabelValue<'a> {
    Plain(&'a str),
    Quoted(&'a str),
}

/// Format a label value, quoting it when it would not survive parsing bare.
///
/// Values that need quotes and contain `"` cannot be represented.
pub fn format_label_value(value: &str) -> Result<String> {
    let needs_quotes = value.is_empty()
        || value.contains([',', '='])
        || value.starts_with('"')
        || value.trim() != value;
    if !needs_quotes {
        return Ok(value.to_string());
    }
    if value.contains('"') {
        return Err(ReductError::WireFormat(format!(
            "Label value '{}' can't be quoted",
            value
        )));
    }
    Ok(format!("\"{}\"", value))
}

/// Split a label segment into `(name, value)` pairs.
///
/// A value starting with `"` runs to the next `"` and may contain commas.
pub fn split_label_pairs(raw: &str) -> Result<Vec<(&str, RawLabelValue<'_>)>> {
    let invalid = || ReductError::WireFormat(format!("Invalid label segment '{}'", raw));

    let mut pairs = Vec::new();
    let mut rest = raw.trim();
    while !rest.is_empty() {
        let (key, after) = rest.split_once('=').ok_or_else(invalid)?;
        let key = key.trim();
        if key.is_empty() {
            return Err(invalid());
        }

        let after = after.trim_start();
        if let Some(quoted) = after.strip_prefix('"') {
            let end = quoted.find('"').ok_or_else(invalid)?;
            pairs.push((key, RawLabelValue::Quoted(&quoted[..end])));
            let tail = quoted[end + 1..].trim_start();
            rest = if tail.is_empty() {
                tail
            } else {
                tail.strip_prefix(',').ok_or_else(invalid)?.trim_start()
            };
        } else {
            match after.split_once(',') {
                Some((value, tail)) => {
                    pairs.push((key, RawLabelValue::Plain(value.trim())));
                    rest = tail.trim_start();
                }
                None => {
                    pairs.push((key, RawLabelValue::Plain(after.trim())));
                    rest = "";
                }
            }
        }
    }
    Ok(pairs)
}

/// Encode ops with names replaced by their index in `table`.
pub fn encode_label_delta(ops: &[LabelDeltaOp], table: &mut LabelNameTable) -> Result<String> {
    let mut parts = Vec::with_capacity(ops.len());
    for op in ops {
        let idx = table.index_of(&op.key);
        let value = match &op.value {
            Some(value) => format_label_value(value)?,
            None => String::new(),
        };
        parts.push(format!("{}={}", idx, value));
    }
    Ok(parts.join(","))
}

/// Parse a label delta segment.
///
/// With a table, numeric names are resolved as indices and must be in range.
/// Other names are taken literally but must not start with `@`, which is
/// reserved for computed labels. A bare empty value removes the label.
pub fn parse_label_delta(raw: &str, table: Option<&LabelNameTable>) -> Result<Vec<LabelDeltaOp>> {
    split_label_pairs(raw)?
        .into_iter()
        .map(|(key, value)| {
            let key = resolve_label_name(key, table)?;
            let value = match value {
                RawLabelValue::Quoted(v) => Some(v.to_string()),
                RawLabelValue::Plain("") => None,
                RawLabelValue::Plain(v) => Some(v.to_string()),
            };
            Ok(LabelDeltaOp { key, value })
        })
        .collect()
}

fn resolve_label_name(raw: &str, table: Option<&LabelNameTable>) -> Result<String> {
    if let Some(table) = table {
        if let Ok(idx) = raw.parse::<usize>() {
            return table.name(idx).map(str::to_string).ok_or_else(|| {
                ReductError::WireFormat(format!("Label index '{}' is out of range", raw))
            });
        }
    }

    if raw.starts_with('@') {
        return Err(ReductError::WireFormat(format!(
            "Label name '{}' must not start with '@': reserved for computed labels",
            raw
        )));
    }
    Ok(raw.to_string())
}
