/// ======================= JSON-RPC =======================
pub const JSONRPC_VERSION: &str = "2.0";

/// Error code the node returns when the requested block or transaction does not exist
pub const RPC_NOT_FOUND_CODE: i64 = -100;

pub const RPC_METHOD_BLOCK_HEIGHT: &str = "block_height";
pub const RPC_METHOD_BLOCK_GET: &str = "block_get";
pub const RPC_METHOD_TRANSACTION_GET: &str = "transaction_get";

/// ======================= Graph collections =======================
pub const ACCOUNTS_COLLECTION: &str = "accounts";
pub const HOTSPOTS_COLLECTION: &str = "hotspots";
pub const PAYMENTS_COLLECTION: &str = "payments";
pub const POC_RECEIPTS_COLLECTION: &str = "poc_receipts";
pub const FOLLOWER_INFO_COLLECTION: &str = "follower_info";

/// Key of the singleton checkpoint document
pub const FOLLOWER_INFO_KEY: &str = "follower_info";

/// ======================= Inventory feed =======================
pub const GATEWAY_INVENTORY_PREFIX: &str = "gateway_inventory_";

/// ======================= Follower defaults =======================
pub const DEFAULT_BLOCK_INVENTORY_SIZE: u64 = 5_000;
pub const DEFAULT_IDLE_INTERVAL_MS: u64 = 10_000;
pub const DEFAULT_RETRY_BACKOFF_MS: u64 = 10_000;
pub const DEFAULT_MAX_BLOCK_ATTEMPTS: usize = 50;
pub const DEFAULT_INVENTORY_REFRESH_BLOCKS: u64 = 500;
pub const DEFAULT_TRANSACTION_WORKERS: usize = 1;

pub const NANOS_PER_SECOND: f64 = 1_000_000_000.0;
