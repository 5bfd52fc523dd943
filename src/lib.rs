//! TermLink Library
//!
//! Serial terminal library: opens a serial transport session and
//! duplexes bytes between it and a terminal display, with an optional
//! local-echo branch and cooperative cancellation of the whole run.

pub mod cli;
pub mod core;
pub mod domain;
pub mod infrastructure;

pub use crate::core::session::{Session, SessionController, SessionEvent, SessionHandle};
pub use crate::core::stream::{ByteSink, ByteSource, EchoState};
pub use crate::domain::config::{FlowControl, Parity, SerialConfig, TermLinkConfig};
pub use crate::domain::error::{TermLinkError, TermLinkResult};
