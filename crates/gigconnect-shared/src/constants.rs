/// Application name
pub const APP_NAME: &str = "Gigconnect";

/// Maximum message body length in bytes (64 KiB)
pub const MAX_MESSAGE_BODY_LEN: usize = 65_536;

/// Largest user id every backend can store (SQLite integers are signed)
pub const MAX_USER_ID: u64 = i64::MAX as u64;

/// Maximum subject length in bytes
pub const MAX_SUBJECT_LEN: usize = 512;

/// Default capacity of the engine's event broadcast channel
pub const DEFAULT_EVENT_BUFFER: usize = 256;

/// Default HTTP API port (server)
pub const DEFAULT_HTTP_PORT: u16 = 8080;

/// Prefixes used by [`crate::types::ConversationId::for_pair`]
pub const FREELANCER_KEY_PREFIX: char = 'f';
pub const ESTABLISHMENT_KEY_PREFIX: char = 'e';
