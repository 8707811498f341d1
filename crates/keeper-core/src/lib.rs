mod errors;
pub mod proto;

pub use errors::CoreError;

pub const PROTOCOL_VERSION: u32 = 1;
