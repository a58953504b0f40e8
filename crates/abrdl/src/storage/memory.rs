use super::SegmentStorage;
use crate::error::AbrResult;
use bytes::Bytes;
use std::sync::{Arc, Mutex};

/// Keeps segments in memory, in the order they were written.
#[derive(Clone, Default)]
pub struct MemoryStorage {
    segments: Arc<Mutex<Vec<(String, Bytes)>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Names in write order. An overwritten name keeps its original position.
    pub fn names(&self) -> Vec<String> {
        self.lock().iter().map(|(name, _)| name.clone()).collect()
    }

    pub fn get(&self, name: &str) -> Option<Bytes> {
        self.lock()
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, data)| data.clone())
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<(String, Bytes)>> {
        // a panic while holding the lock leaves the Vec intact
        self.segments.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl SegmentStorage for MemoryStorage {
    async fn write(&self, name: &str, data: Bytes) -> AbrResult<()> {
        let mut segments = self.lock();
        match segments.iter_mut().find(|(n, _)| n == name) {
            Some((_, existing)) => *existing = data,
            None => segments.push((name.to_string(), data)),
        }
        Ok(())
    }
}
