//! Transient in-memory URLs for previewing binary payloads.

use std::collections::HashMap;
use uuid::Uuid;

/// Scheme prefix of every URL handed out by [`ObjectUrls`].
pub const OBJECT_URL_PREFIX: &str = "blob:simos-notes/";

#[derive(Debug, Clone)]
struct ObjectUrlEntry {
    mime_type: String,
    data: Vec<u8>,
}

/// Registry of live object URLs. Each URL stays fetchable until revoked.
#[derive(Debug, Default)]
pub struct ObjectUrls {
    entries: HashMap<String, ObjectUrlEntry>,
}

impl ObjectUrls {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a payload and returns a fresh URL for it.
    pub fn create(&mut self, mime_type: &str, data: Vec<u8>) -> String {
        let url = format!("{OBJECT_URL_PREFIX}{}", Uuid::new_v4());
        self.entries.insert(
            url.clone(),
            ObjectUrlEntry {
                mime_type: mime_type.to_string(),
                data,
            },
        );
        url
    }

    /// Returns the MIME type and bytes behind `url`.
    pub fn fetch(&self, url: &str) -> Option<(&str, &[u8])> {
        self.entries
            .get(url)
            .map(|e| (e.mime_type.as_str(), e.data.as_slice()))
    }

    /// Releases `url`. Returns whether it was live.
    pub fn revoke(&mut self, url: &str) -> bool {
        self.entries.remove(url).is_some()
    }

    pub fn revoke_all<'a>(&mut self, urls: impl IntoIterator<Item = &'a String>) {
        for url in urls {
            self.revoke(url);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
