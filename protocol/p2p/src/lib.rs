pub mod adaptor;
pub mod common;
pub mod errors;
pub mod peer;
pub mod router;
pub mod wire;

pub use adaptor::{Adaptor, ConnectionInitializer, Hub};
pub use common::{NetAddress, DEFAULT_TIMEOUT};
pub use errors::ProtocolError;
pub use peer::{Peer, PeerProperties};
pub use router::{IncomingRoute, Router};
pub use wire::{Message, MessageCommand, VersionMessage};
