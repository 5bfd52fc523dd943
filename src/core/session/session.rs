use crate::core::stream::{ByteSink, ByteSource};
use crate::domain::{config::SerialConfig, error::TermLinkResult};
use async_trait::async_trait;
use std::sync::Arc;

/// Handle for releasing a session's underlying transport.
#[async_trait]
pub trait SessionHandle: Send {
    async fn close(&mut self) -> TermLinkResult<()>;
}

/// One open transport connection with fixed framing parameters.
///
/// Created by a successful open call, destroyed by [`SessionHandle::close`].
/// Exactly one session may be open at a time; the controller owns it
/// exclusively for its lifetime and splits it into its read side, write
/// side, and close handle when the duplex run starts.
pub struct Session {
    config: SerialConfig,
    read_side: Box<dyn ByteSource>,
    write_side: Arc<dyn ByteSink>,
    handle: Box<dyn SessionHandle>,
}

impl Session {
    pub fn new(
        config: SerialConfig,
        read_side: Box<dyn ByteSource>,
        write_side: Arc<dyn ByteSink>,
        handle: Box<dyn SessionHandle>,
    ) -> Self {
        Self {
            config,
            read_side,
            write_side,
            handle,
        }
    }

    /// Get the framing configuration this session was opened with.
    pub fn config(&self) -> &SerialConfig {
        &self.config
    }

    pub(crate) fn into_parts(
        self,
    ) -> (
        Box<dyn ByteSource>,
        Arc<dyn ByteSink>,
        Box<dyn SessionHandle>,
    ) {
        (self.read_side, self.write_side, self.handle)
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
