//! Storage keys and wire-level names for the reissue protocol

/// Store key holding the current access token
pub const ACCESS_TOKEN_KEY: &str = "access_token";

/// Store key holding the current refresh token
pub const REFRESH_TOKEN_KEY: &str = "refresh_token";

/// Store key holding the cached user identity (cleared on logout)
pub const USER_IDENTITY_KEY: &str = "user_identity";

/// Default header carrying the refresh token, on both the reissue request
/// and the reissue response.
pub const DEFAULT_REFRESH_HEADER: &str = "refresh-token";

/// Default path of the reissue endpoint, relative to the API base URL
pub const DEFAULT_REFRESH_PATH: &str = "/auth/reissue";

/// Authorization scheme used for access tokens
pub const BEARER_SCHEME: &str = "Bearer";
