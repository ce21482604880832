pub mod actors;
pub mod auth;
pub mod error;
pub mod firehose;
pub mod host_router;
pub mod proxy;
pub mod routes;
pub mod state;

pub use auth::{AuthenticatedActor, Authenticator, JwtBearerAuthenticator};
pub use firehose::dispatch::FirehoseHandle;
pub use proxy::pipethrough::AppviewProxy;
pub use routes::build_router;
pub use state::AppState;
