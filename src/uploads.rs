//! Bounded cache of uploaded tables, so a report can be requested for any
//! row after the preview was sent.

use std::collections::{HashMap, VecDeque};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::errors::UploadError;
use crate::fields::{ColumnMap, ReportRecord};

pub const DEFAULT_CAPACITY: usize = 10;

/// A table as delivered by the tabular source: headers in file order and
/// one string map per row.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UploadedTable {
    pub file_name: String,
    pub headers: Vec<String>,
    #[serde(default)]
    pub rows: Vec<HashMap<String, String>>,
}

impl UploadedTable {
    pub fn row(&self, index: usize) -> Option<&HashMap<String, String>> {
        self.rows.get(index)
    }
}

#[derive(Debug, Clone)]
pub struct StoredUpload {
    pub table: UploadedTable,
    pub columns: ColumnMap,
}

#[derive(Debug)]
pub struct UploadStore {
    capacity: usize,
    next_seq: u64,
    uploads: HashMap<String, StoredUpload>,
    // Keys per chat, oldest first.
    by_chat: HashMap<i64, VecDeque<String>>,
}

impl Default for UploadStore {
    fn default() -> Self {
        UploadStore::new(DEFAULT_CAPACITY)
    }
}

impl UploadStore {
    pub fn new(capacity: usize) -> Self {
        UploadStore {
            capacity: capacity.max(1),
            next_seq: 1,
            uploads: HashMap::new(),
            by_chat: HashMap::new(),
        }
    }

    /// Stores a table for `chat_id` and returns its key. The chat's oldest
    /// upload is evicted once it holds more than `capacity` tables.
    pub fn insert(&mut self, chat_id: i64, table: UploadedTable) -> Result<String, UploadError> {
        if table.headers.is_empty() {
            return Err(UploadError::NoColumns);
        }

        let key = format!("{}_{}", chat_id, self.next_seq);
        self.next_seq += 1;

        let columns = ColumnMap::resolve(&table.headers);
        debug!(key = %key, ?columns, "resolved upload columns");
        info!(
            "Stored {} ({} rows) as {}",
            table.file_name,
            table.rows.len(),
            key
        );
        self.uploads
            .insert(key.clone(), StoredUpload { table, columns });

        let keys = self.by_chat.entry(chat_id).or_default();
        keys.push_back(key.clone());
        while keys.len() > self.capacity {
            if let Some(evicted) = keys.pop_front() {
                debug!(key = %evicted, "evicting upload");
                self.uploads.remove(&evicted);
            }
        }

        Ok(key)
    }

    pub fn get(&self, key: &str) -> Result<&StoredUpload, UploadError> {
        self.uploads.get(key).ok_or_else(|| UploadError::NotFound {
            key: key.to_string(),
        })
    }

    /// Resolves one stored row into a report record.
    pub fn record(&self, key: &str, row: usize) -> Result<ReportRecord, UploadError> {
        let upload = self.get(key)?;
        let values = upload.table.row(row).ok_or_else(|| UploadError::RowNotFound {
            key: key.to_string(),
            row,
        })?;
        Ok(upload
            .columns
            .record(values, chrono::Utc::now().fixed_offset()))
    }

    pub fn len(&self) -> usize {
        self.uploads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.uploads.is_empty()
    }
}
