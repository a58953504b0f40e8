pub mod file;
pub mod memory;

use crate::error::AbrResult;
use bytes::Bytes;
use std::{future::Future, path::PathBuf, sync::Arc};

/// Durable destination of downloaded segments.
pub trait SegmentStorage: Send + Sync + 'static {
    /// Store `data` under `name`, replacing anything stored under the same name.
    fn write(&self, name: &str, data: Bytes) -> impl Future<Output = AbrResult<()>> + Send;

    /// Hint a location for the stored segments.
    fn location_hint(&self) -> Option<String> {
        None
    }
}

impl<S> SegmentStorage for Arc<S>
where
    S: SegmentStorage,
{
    fn write(&self, name: &str, data: Bytes) -> impl Future<Output = AbrResult<()>> + Send {
        self.as_ref().write(name, data)
    }

    fn location_hint(&self) -> Option<String> {
        self.as_ref().location_hint()
    }
}

pub enum AbrStorage {
    Memory(memory::MemoryStorage),
    File(file::FileStorage),
}

impl AbrStorage {
    pub fn memory() -> Self {
        Self::Memory(memory::MemoryStorage::new())
    }

    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self::File(file::FileStorage::new(path.into()))
    }
}

impl SegmentStorage for AbrStorage {
    async fn write(&self, name: &str, data: Bytes) -> AbrResult<()> {
        match self {
            AbrStorage::Memory(storage) => storage.write(name, data).await,
            AbrStorage::File(storage) => storage.write(name, data).await,
        }
    }

    fn location_hint(&self) -> Option<String> {
        match self {
            AbrStorage::Memory(storage) => storage.location_hint(),
            AbrStorage::File(storage) => storage.location_hint(),
        }
    }
}
