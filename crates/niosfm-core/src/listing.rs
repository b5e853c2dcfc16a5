use crate::error::CoreError;
use crate::events::{EventBus, Table};
use chrono::{DateTime, Utc};
use niosfm_wapi::{return_fields, GridClient};
use serde_json::Value;
use std::fmt;
use tracing::{debug, info, warn};

pub const LISTING_RESOURCE: &str = "tftpfiledir";
const LISTING_FIELDS: &[&str] = &["name", "type", "last_modify"];
const LISTING_COLUMNS: [&str; 3] = ["Name", "Type", "Modified"];

/// Opaque WAPI object reference; only meaningful within one listing.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct FileRef(String);

impl FileRef {
    pub fn new(reference: impl Into<String>) -> Self {
        Self(reference.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FileRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FileKind {
    File,
    Directory,
    Other(String),
}

impl FileKind {
    pub fn from_wapi(value: &str) -> Self {
        match value {
            "FILE" => FileKind::File,
            "DIRECTORY" => FileKind::Directory,
            other => FileKind::Other(other.to_string()),
        }
    }

    pub fn label(&self) -> &str {
        match self {
            FileKind::File => "FILE",
            FileKind::Directory => "DIRECTORY",
            FileKind::Other(raw) => raw,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileEntry {
    pub name: String,
    pub kind: FileKind,
    pub modified_at: Option<DateTime<Utc>>,
    pub reference: FileRef,
}

pub struct ListingCache {
    directory: String,
    files: Vec<FileEntry>,
    generation: u64,
}

impl ListingCache {
    pub fn new(directory: impl Into<String>) -> Self {
        Self {
            directory: directory.into(),
            files: Vec::new(),
            generation: 0,
        }
    }

    pub fn directory(&self) -> &str {
        &self.directory
    }

    pub fn files(&self) -> &[FileEntry] {
        &self.files
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn clear(&mut self) {
        if !self.files.is_empty() {
            debug!(directory = %self.directory, files = self.files.len(), "listing cleared");
        }
        self.files.clear();
        self.generation += 1;
    }

    pub fn resolve(&self, reference: &FileRef) -> Option<&FileEntry> {
        self.files.iter().find(|e| &e.reference == reference)
    }

    pub async fn refresh(
        &mut self,
        client: &dyn GridClient,
        bus: &EventBus,
    ) -> Result<Table, CoreError> {
        let fields = return_fields(LISTING_FIELDS);
        let query = [
            ("directory", self.directory.as_str()),
            ("_return_fields", fields.as_str()),
        ];
        let resp = match client.get(LISTING_RESOURCE, &query).await {
            Ok(resp) => resp,
            Err(err) => {
                warn!(error = %err, "listing read failed");
                bus.text(format!("List failed: {}", err));
                return Err(CoreError::Wapi(err));
            }
        };
        if !resp.is_ok() {
            let text = resp
                .diagnostic()
                .text
                .unwrap_or_else(|| "no diagnostic".to_string());
            warn!(status = resp.status, text = %text, "listing rejected");
            bus.text(format!("{} {}", resp.status, text));
            return Err(CoreError::Rejected {
                status: resp.status,
                text,
            });
        }
        match self.apply(&resp.body) {
            Ok(table) => {
                info!(
                    directory = %self.directory,
                    entries = table.len(),
                    files = self.files.len(),
                    "listing refreshed"
                );
                bus.table(table.clone());
                Ok(table)
            }
            Err(err) => {
                bus.text(format!("List failed: {}", err));
                Err(err)
            }
        }
    }

    pub fn apply(&mut self, body: &Value) -> Result<Table, CoreError> {
        let items = body
            .as_array()
            .ok_or_else(|| CoreError::Invalid("listing reply is not an array".to_string()))?;
        let mut table = Table::new(LISTING_COLUMNS);
        let mut files = Vec::new();
        for item in items {
            let name = item
                .get("name")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            let kind = FileKind::from_wapi(item.get("type").and_then(Value::as_str).unwrap_or(""));
            let modified_at = item
                .get("last_modify")
                .and_then(Value::as_i64)
                .and_then(|secs| DateTime::from_timestamp(secs, 0));
            table.push_row(vec![
                name.clone(),
                kind.label().to_string(),
                format_modified(modified_at),
            ]);
            if kind != FileKind::File {
                continue;
            }
            match item.get("_ref").and_then(Value::as_str) {
                Some(reference) => files.push(FileEntry {
                    name,
                    kind,
                    modified_at,
                    reference: FileRef::new(reference),
                }),
                None => warn!(name = %name, "file entry without reference skipped"),
            }
        }
        self.files = files;
        self.generation += 1;
        Ok(table)
    }
}

pub fn format_modified(modified_at: Option<DateTime<Utc>>) -> String {
    match modified_at {
        Some(ts) => ts.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
        None => "-".to_string(),
    }
}
