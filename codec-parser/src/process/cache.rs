use std::collections::HashMap;

use crate::structs::header::CodecHeader;

/// Per-parser cache of decoded headers keyed by their raw bytes.
///
/// Decoding is a pure function of the key bytes, so any stored entry is
/// correct for as long as the stream keeps using that encoding. The cache
/// starts disabled; [`enable`](HeaderCache::enable) is called once two
/// consecutive frames confirm sync and [`reset`](HeaderCache::reset) when sync
/// is lost or the codec changes.
#[derive(Debug)]
pub struct HeaderCache<H> {
    headers: HashMap<Box<[u8]>, H>,
    enabled: bool,
}

impl<H> Default for HeaderCache<H> {
    fn default() -> Self {
        Self {
            headers: HashMap::new(),
            enabled: false,
        }
    }
}

impl<H: Clone> HeaderCache<H> {
    pub fn get_header(&self, key: &[u8]) -> Option<H> {
        self.headers.get(key).cloned()
    }

    /// Stores `header` under `key`; ignored while the cache is disabled.
    pub fn set_header(&mut self, key: &[u8], header: &H) {
        if self.enabled && !self.headers.contains_key(key) {
            self.headers.insert(key.into(), header.clone());
        }
    }

    pub fn enable(&mut self) {
        self.enabled = true;
    }

    /// Clears every entry and disables caching.
    pub fn reset(&mut self) {
        self.headers.clear();
        self.enabled = false;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn len(&self) -> usize {
        self.headers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }
}

/// Codec configuration notifications derived from emitted frames.
#[derive(Debug, Clone, PartialEq)]
pub enum CodecEvent {
    /// First header of the stream.
    Header(CodecHeader),
    /// The configuration changed (or was established); carries the new identity.
    Update(CodecHeader),
}

/// Remembers the last announced configuration.
///
/// Survives cache resets so a resync onto an unchanged stream stays silent.
#[derive(Debug, Default)]
pub struct IdentityTracker {
    current: Option<CodecHeader>,
    header_sent: bool,
}

impl IdentityTracker {
    /// Compares the header of an emitted frame against the current identity.
    pub fn observe(&mut self, header: &CodecHeader) -> Vec<CodecEvent> {
        let mut events = Vec::new();

        if !self.header_sent {
            self.header_sent = true;
            events.push(CodecEvent::Header(header.clone()));
        }

        let identity = header.identity();
        if self.current.as_ref() != Some(&identity) {
            events.push(CodecEvent::Update(identity.clone()));
            self.current = Some(identity);
        }

        events
    }

    pub fn current(&self) -> Option<&CodecHeader> {
        self.current.as_ref()
    }

    pub fn reset(&mut self) {
        self.current = None;
        self.header_sent = false;
    }
}
