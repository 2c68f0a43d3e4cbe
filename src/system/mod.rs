//! Node orchestration: worker threads, shared state and transport messages.

pub mod messages;
pub mod node;
pub mod shared_state;

pub use messages::{ImageMsg, ImuMsg, Stamp};
pub use node::{ShutdownReport, SlamNode, StopMode};
pub use shared_state::SharedState;
