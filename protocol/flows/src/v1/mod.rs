pub mod address;
pub mod blockrelay;
pub mod handshake;
pub mod ibd;
pub mod ping;
pub mod rejects;
pub mod request_handlers;
pub mod txrelay;

pub use handshake::NornConnectionInitializer;
