// Core module - Stream abstractions and session lifecycle
pub mod session;
pub mod stream;

pub use session::{Session, SessionController, SessionEvent, SessionHandle};
pub use stream::{ByteSink, ByteSource, EchoState};
