use std::time::Duration;

/// Key prefix of ledger records; the remainder of the key is the changeset script.
pub const LEDGER_KEY_PREFIX: &str = "changelog::";

/// Key of the singleton migration lock document.
pub const LOCK_DOCUMENT_KEY: &str = "docmove::lock";

pub const DESIGN_DOCUMENT_EXTENSION: &str = "json";
pub const QUERY_SCRIPT_EXTENSION: &str = "n1ql";
pub const SEARCH_INDEX_EXTENSION: &str = "fts";
pub const DOCUMENT_FILE_EXTENSION: &str = "json";

/// Placeholder bound to the target bucket name in query scripts.
pub const BUCKET_PLACEHOLDER: &str = "bucket";

pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_LOCK_RETRY_INTERVAL: Duration = Duration::from_millis(100);
pub const MAX_LOCK_BACKOFF: Duration = Duration::from_secs(2);

pub const DEFAULT_OWNER_PREFIX: &str = "docmove";
