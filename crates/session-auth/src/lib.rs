//! Session credential persistence and token reissue
//!
//! Provides the persistence seam for the access/refresh credential pair and
//! the call that trades an expiring pair for a fresh one. This crate has no
//! knowledge of request interception or refresh coordination; those live in
//! `session-client`.
//!
//! Credential flow:
//! 1. Sign-in elsewhere stores a pair via `TokenStore::store_pair()`
//! 2. Outgoing requests read `TokenStore::access_token()`
//! 3. On 401 the coordinator reads `TokenStore::credential_pair()` and calls
//!    `TokenExchanger::exchange()`
//! 4. The fresh pair is written back with `TokenStore::store_pair()`
//! 5. A failed reissue wipes everything with `TokenStore::clear()`

pub mod constants;
pub mod credentials;
pub mod error;
pub mod store;
pub mod token;

pub use constants::*;
pub use credentials::{CredentialPair, TokenStore};
pub use error::{Error, Result};
pub use store::{FileStore, KeyValueStore, MemoryStore, StoreFuture};
pub use token::{TokenExchanger, parse_bearer};
