//! Session marker recording that navigation started from the career view.

use std::collections::HashMap;

use tracing::debug;

pub const ENTRY_FLOW_KEY: &str = "lovable_entry_flow";
pub const CAREER_FLOW: &str = "career_flow";

/// Session-scoped key/value storage. Writes are visible to the next read.
pub trait SessionStorage {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&mut self, key: &str, value: &str);
    fn remove(&mut self, key: &str);
}

/// Storage that lives as long as the process session.
#[derive(Debug, Default, Clone)]
pub struct MemorySession {
    values: HashMap<String, String>,
}

impl MemorySession {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStorage for MemorySession {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) {
        self.values.insert(key.to_string(), value.to_string());
    }

    fn remove(&mut self, key: &str) {
        self.values.remove(key);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryFlow {
    Absent,
    CareerFlow,
    /// Written by some other entry point.
    Other(String),
}

impl EntryFlow {
    fn from_stored(value: Option<String>) -> Self {
        match value {
            None => EntryFlow::Absent,
            Some(value) if value == CAREER_FLOW => EntryFlow::CareerFlow,
            Some(value) => EntryFlow::Other(value),
        }
    }
}

/// Header chrome chosen by views downstream of a navigation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderLayout {
    Career,
    Standard,
}

pub struct EntryFlowMarker<S: SessionStorage> {
    storage: S,
}

impl<S: SessionStorage> EntryFlowMarker<S> {
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    /// Last writer wins.
    pub fn mark_career_flow(&mut self) {
        debug!(key = ENTRY_FLOW_KEY, "marking career entry flow");
        self.storage.set(ENTRY_FLOW_KEY, CAREER_FLOW);
    }

    pub fn read(&self) -> EntryFlow {
        EntryFlow::from_stored(self.storage.get(ENTRY_FLOW_KEY))
    }

    pub fn header_layout(&self) -> HeaderLayout {
        match self.read() {
            EntryFlow::CareerFlow => HeaderLayout::Career,
            EntryFlow::Absent | EntryFlow::Other(_) => HeaderLayout::Standard,
        }
    }

    /// Session teardown.
    pub fn clear(&mut self) {
        self.storage.remove(ENTRY_FLOW_KEY);
    }
}
