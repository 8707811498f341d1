pub mod playerdb;

pub use playerdb::{LookupError, PlayerDbClient, PlayerLookup, ResolvedPlayer};
