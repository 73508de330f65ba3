pub mod cache;
pub mod monitor;
pub mod platform;
pub mod record;
pub mod registry;
pub mod snapshot;
pub mod source;
pub mod worker;
