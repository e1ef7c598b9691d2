use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The empty path denotes the device list.
pub const ROOT_PATH: &str = "";

pub const UNKNOWN_NAME: &str = "Unknown Name";
pub const UNKNOWN_PATH: &str = "Unknown Path";

/// Returns true for the reserved root markers (`""` and `"/"`).
pub fn is_root(path: &str) -> bool {
    path.is_empty() || path == "/"
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    pub path: String,
    pub name: String,
    pub is_dir: bool,
    pub size: u64,
    pub modified_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DirectoryListing {
    pub path: String,
    pub sub_dirs: Vec<Entry>,
    pub files: Vec<Entry>,
}

impl DirectoryListing {
    pub fn len(&self) -> usize {
        self.sub_dirs.len() + self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Directories first, then files, in backend order.
    pub fn entries(&self) -> impl Iterator<Item = &Entry> {
        self.sub_dirs.iter().chain(self.files.iter())
    }

    pub fn find_sub_dir(&self, name: &str) -> Option<&Entry> {
        let wanted = name.to_lowercase();
        self.sub_dirs
            .iter()
            .find(|entry| entry.is_dir && entry.name.to_lowercase() == wanted)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Disk {
    pub device: String,
    pub mount_point: String,
    pub filesystem_type: String,
    pub total_bytes: u64,
    pub free_bytes: u64,
    pub used_bytes: u64,
    pub used_percent: f64,
}

impl Disk {
    pub fn new(
        device: impl Into<String>,
        mount_point: impl Into<String>,
        filesystem_type: impl Into<String>,
        total_bytes: u64,
        free_bytes: u64,
    ) -> Self {
        let used_bytes = total_bytes.saturating_sub(free_bytes);
        let used_percent = if total_bytes == 0 {
            0.0
        } else {
            used_bytes as f64 * 100.0 / total_bytes as f64
        };

        Self {
            device: device.into(),
            mount_point: mount_point.into(),
            filesystem_type: filesystem_type.into(),
            total_bytes,
            free_bytes,
            used_bytes,
            used_percent,
        }
    }
}

/// Stream item as published by a search backend. Every field may be absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawEntry {
    pub path: Option<String>,
    pub name: Option<String>,
    pub is_dir: Option<bool>,
    pub size: Option<u64>,
    #[serde(alias = "mod_time")]
    pub modified_at: Option<DateTime<Utc>>,
}

impl RawEntry {
    pub fn is_complete(&self) -> bool {
        self.path.is_some()
            && self.name.is_some()
            && self.is_dir.is_some()
            && self.size.is_some()
            && self.modified_at.is_some()
    }

    /// Fills missing fields with placeholders; `now` stands in for an unknown
    /// modification time.
    pub fn normalize(self, now: DateTime<Utc>) -> Entry {
        Entry {
            path: self.path.unwrap_or_else(|| UNKNOWN_PATH.to_string()),
            name: self.name.unwrap_or_else(|| UNKNOWN_NAME.to_string()),
            is_dir: self.is_dir.unwrap_or(false),
            size: self.size.unwrap_or(0),
            modified_at: self.modified_at.unwrap_or(now),
        }
    }
}

impl From<Entry> for RawEntry {
    fn from(entry: Entry) -> Self {
        Self {
            path: Some(entry.path),
            name: Some(entry.name),
            is_dir: Some(entry.is_dir),
            size: Some(entry.size),
            modified_at: Some(entry.modified_at),
        }
    }
}
