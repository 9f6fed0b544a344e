//! UI-facing facade: method-name dispatch over JSON values and the
//! "today's steps changed" event stream.

mod commands;
mod error;
pub mod events;

pub use commands::StepChannel;
pub use error::{ChannelError, ChannelFailure};
pub use events::{StepEvents, StepSink};
