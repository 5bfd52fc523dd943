use crate::domain::error::TermLinkResult;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Consumer of byte chunks.
///
/// Implemented by the transport write side, the display, and the echo
/// branch. A write either delivers the whole chunk or fails; partial
/// delivery is the implementation's problem, never the caller's.
#[async_trait]
pub trait ByteSink: Send + Sync {
    async fn write(&self, chunk: &[u8]) -> TermLinkResult<()>;
}

/// Producer of byte chunks.
///
/// `Ok(Some(chunk))` carries data; an empty chunk is a soft transfer
/// boundary and the caller re-enters its loop. `Ok(None)` is end of
/// stream. `Err` is a transport failure.
#[async_trait]
pub trait ByteSource: Send {
    async fn read(&mut self) -> TermLinkResult<Option<Vec<u8>>>;
}

/// Shared local-echo toggle.
///
/// Flipped by the UI layer, read per chunk by the write pump's echo
/// fan-out. Clones share the same flag.
#[derive(Debug, Clone, Default)]
pub struct EchoState {
    enabled: Arc<AtomicBool>,
}

impl EchoState {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled: Arc::new(AtomicBool::new(enabled)),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    pub fn set(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    /// Flip the flag and return the new value.
    pub fn toggle(&self) -> bool {
        !self.enabled.fetch_xor(true, Ordering::Relaxed)
    }
}
