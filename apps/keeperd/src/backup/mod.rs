pub mod archive;
pub mod ops;
pub mod remote;
pub mod scheduler;

pub use ops::BackupService;
pub use remote::{CloudCredentials, RemoteStore, S3CliStore};
pub use scheduler::{spawn_scheduler, BackupSchedule};
