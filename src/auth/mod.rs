/// Authentication building blocks
///
/// Token codec (access/refresh JWTs), password hashing, the per-account
/// refresh-token set, and the ephemeral verification/reset token store.

mod claims;
mod jwt;
mod password;

pub mod ephemeral_token;
pub mod refresh_tokens;

pub use claims::Claims;
pub use jwt::issue_access_token;
pub use jwt::issue_refresh_token;
pub use jwt::verify_access_token;
pub use jwt::verify_refresh_token;
pub use password::hash_password;
pub use password::verify_password;
