/// Request-level guards and instrumentation

mod auth_gate;
mod logging;
mod reset_guard;

pub use auth_gate::AuthGate;
pub use logging::RequestLogger;
pub use reset_guard::ensure_valid_reset_token;
