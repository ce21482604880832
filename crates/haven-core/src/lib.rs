pub mod config;
pub mod error;
pub mod keys;
pub mod store;
pub mod types;

pub use config::{AppConfig, AppviewConfig, HostConfig, JwtConfig, StoreConfig};
pub use error::{PdsError, PdsResult};
pub use store::{Store, StoreTx, Watch};
pub use types::{
    Actor, AccountStatus, Record, RepoEvent, RepoEventType, RepoHead, RepoOp, RepoOpAction,
};
