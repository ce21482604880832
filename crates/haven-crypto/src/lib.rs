pub mod did;
pub mod jwt;
pub mod password;
pub mod signing;
pub mod tid;

pub use did::create_did_plc_operation;
pub use jwt::{
    AccessTokenClaims, RefreshTokenClaims, create_access_token, create_refresh_token,
    validate_access_token, validate_refresh_token,
};
pub use password::{hash_password, verify_password};
pub use signing::SigningKey;
pub use tid::TidGenerator;
