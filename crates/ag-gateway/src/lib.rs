//! AuthGate HTTP Gateway
//!
//! Route handlers binding the provider flows to user-visible endpoints, the
//! signed-cookie browser session, and error-to-response mapping. Wiring into
//! a listening server lives in `bin/ag-server`.

pub mod auth_api;
pub mod error;
pub mod session_cookie;
pub mod state;
pub mod verification_api;

pub use auth_api::auth_router;
pub use error::{ErrorResponse, GatewayError};
pub use session_cookie::{CookieSession, SessionCodec};
pub use state::GatewayState;
pub use verification_api::verification_router;
