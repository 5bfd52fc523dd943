// Session module - Connection lifecycle and duplex pumps
pub mod controller;
pub mod pump;
pub mod session;

pub use controller::{SessionController, SessionEvent};
pub use session::{Session, SessionHandle};
