//! Authenticated HTTP client with single-flight credential refresh
//!
//! Wraps a `reqwest::Client` so every outgoing request is annotated with the
//! stored access token, and every 401 is routed through one shared refresh
//! coordinator. However many requests fail at once, the reissue call runs
//! exactly once; every blocked request is replayed with the new token, or
//! fails together with the reissue.
//!
//! Request lifecycle:
//! 1. `RequestAnnotator` attaches `Authorization: Bearer <access>` unless the
//!    URL matches an exempt pattern (exempt requests get the header stripped)
//! 2. The request is dispatched; non-401 responses return unchanged
//! 3. On 401 the request is marked retried and parked on `RefreshCoordinator`
//! 4. The first parked request starts a reissue; later ones queue behind it
//! 5. Success → new pair persisted, every parked request replayed once
//! 6. Failure → `SessionInvalidator` clears the store and broadcasts
//!    `SessionEvent::ForcedLogout`, every parked request gets the error

pub mod annotator;
pub mod client;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod invalidator;
mod metrics;
pub mod request;

pub use annotator::{Annotation, RequestAnnotator};
pub use client::AuthClient;
pub use config::{ClientConfig, DEFAULT_EXEMPT_PATTERNS};
pub use coordinator::RefreshCoordinator;
pub use error::{Error, RefreshError, Result};
pub use invalidator::{SessionEvent, SessionInvalidator};
pub use request::PendingRequest;

pub use session_auth::{CredentialPair, FileStore, KeyValueStore, MemoryStore, TokenStore};
