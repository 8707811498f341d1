pub mod errors;

pub mod launch;
pub mod properties;
pub mod setup;

pub use errors::ProvisionError;
pub use launch::LaunchPlan;
pub use properties::Properties;

pub const SERVER_PROPERTIES: &str = "server.properties";
pub const EULA_FILE: &str = "eula.txt";
