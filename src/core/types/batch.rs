//! Pending records for a batched write.

use crate::core::error::{ReductError, Result};
use crate::core::protocol::constants::DEFAULT_CONTENT_TYPE;
use crate::core::types::Labels;
use bytes::Bytes;
use std::time::Instant;

/// A record waiting to be written.
#[derive(Clone, Debug, PartialEq)]
pub struct BatchItem {
    /// Target entry. `None` means the default entry of the write call.
    pub entry: Option<String>,
    /// UNIX timestamp in microseconds.
    pub timestamp: u64,
    pub payload: Bytes,
    pub content_type: String,
    pub labels: Labels,
}

impl BatchItem {
    pub fn new(timestamp: u64, payload: impl Into<Bytes>) -> Self {
        Self {
            entry: None,
            timestamp,
            payload: payload.into(),
            content_type: DEFAULT_CONTENT_TYPE.to_string(),
            labels: Labels::new(),
        }
    }

    pub fn with_entry(mut self, entry: impl Into<String>) -> Self {
        self.entry = Some(entry.into());
        self
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = content_type.into();
        self
    }

    pub fn with_label(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(name.into(), value.into());
        self
    }

    pub fn with_labels(mut self, labels: Labels) -> Self {
        self.labels = labels;
        self
    }

    #[inline]
    pub fn size(&self) -> u64 {
        self.payload.len() as u64
    }
}

/// A batch item with its entry resolved.
#[derive(Clone, Copy, Debug)]
pub struct ResolvedItem<'a> {
    pub entry: &'a str,
    pub item: &'a BatchItem,
}

/// Ordered collection of records written in one request.
///
/// Items keep insertion order; [`Batch::resolve`] produces the wire order.
/// Records with equal `(entry, timestamp)` are all kept here; the codecs
/// refuse to encode them because their header names would collide.
#[derive(Clone, Debug, Default)]
pub struct Batch {
    items: Vec<BatchItem>,
    total_size: u64,
    last_access: Option<Instant>,
}

impl Batch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, item: BatchItem) {
        self.total_size += item.size();
        self.last_access = Some(Instant::now());
        self.items.push(item);
    }

    /// Add a record for an explicit entry.
    pub fn add(&mut self, entry: impl Into<String>, timestamp: u64, payload: impl Into<Bytes>) {
        self.push(BatchItem::new(timestamp, payload).with_entry(entry));
    }

    pub fn items(&self) -> &[BatchItem] {
        &self.items
    }

    /// Total payload size in bytes.
    pub fn size(&self) -> u64 {
        self.total_size
    }

    /// When an item was last added. Useful to flush a batch by timeout.
    pub fn last_access(&self) -> Option<Instant> {
        self.last_access
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.total_size = 0;
        self.last_access = None;
    }

    /// Resolve entries and sort by `(entry, timestamp)`.
    ///
    /// The sort is stable, so records with equal keys keep insertion order.
    pub fn resolve<'a>(&'a self, default_entry: Option<&'a str>) -> Result<Vec<ResolvedItem<'a>>> {
        let mut resolved = self
            .items
            .iter()
            .map(|item| {
                let entry = item.entry.as_deref().or(default_entry).ok_or_else(|| {
                    ReductError::Resolution(format!(
                        "Record at {} has no entry name and no default entry was given",
                        item.timestamp
                    ))
                })?;
                Ok(ResolvedItem { entry, item })
            })
            .collect::<Result<Vec<_>>>()?;

        resolved.sort_by(|a, b| {
            a.entry
                .cmp(b.entry)
                .then(a.item.timestamp.cmp(&b.item.timestamp))
        });
        Ok(resolved)
    }
}

impl Extend<BatchItem> for Batch {
    fn extend<T: IntoIterator<Item = BatchItem>>(&mut self, iter: T) {
        for item in iter {
            self.push(item);
        }
    }
}
