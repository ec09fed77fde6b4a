pub mod message;
pub mod ser;

pub use message::{Message, MessageCommand, VersionMessage};
pub use ser::{Reader, SerError, SerResult, Writer};

/// Upper bound on a single framed message, command and payload included
pub const MAX_MESSAGE_SIZE: usize = 32 * 1024 * 1024;
