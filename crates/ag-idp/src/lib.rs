//! AuthGate Identity Provider Protocol
//!
//! Client-side protocol handling for a Logto-compatible OIDC provider:
//!
//! - [`signin`] - the browser-facing authorization code flow, scoped to one
//!   browser session via the [`store::SessionStore`] adapter
//! - [`broker`] - the machine-to-machine client-credentials exchange
//! - [`management`] - typed calls onto the provider's management REST API
//!
//! The provider itself is a remote system with a fixed wire contract; nothing
//! here implements provider internals.

pub mod broker;
pub mod error;
pub mod management;
pub mod pkce;
pub mod signin;
pub mod store;
pub mod tokens;

pub use broker::{BrokerOptions, CachedTokenBroker, TokenBroker, TokenGrant};
pub use error::{Error, Result};
pub use management::{
    CodeCheck, CodeDelivery, CreateUser, ManagementClient, Page, PasswordVerdict, UserProfile,
};
pub use signin::{ProviderOptions, SignInSession, UserInfo};
pub use store::{keys, MemorySession, SessionStore};
pub use tokens::{IdTokenClaims, StringOrVec, TokenResponse};
