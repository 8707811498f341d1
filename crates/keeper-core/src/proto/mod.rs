mod backup;
mod error;
mod identity;
mod rpc;
mod server;
mod types;

pub use backup::*;
pub use error::*;
pub use identity::*;
pub use rpc::*;
pub use server::*;
pub use types::*;
