pub mod address_store;
pub mod banned_address_store;
