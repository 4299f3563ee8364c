pub mod config;
pub mod follower;
pub mod inventory;
pub mod postgres;
pub mod rpc;

pub use anyhow::anyhow;
pub use anyhow::Context;
pub use anyhow::Error;
pub use anyhow::Result;
pub use config::ConfigError;
pub use follower::FollowerError;
pub use inventory::InventoryError;
pub use postgres::PostgresClientError;
pub use rpc::NodeClientError;

// For consistent error handling with location info
#[macro_export]
macro_rules! err_with_loc {
  ($err:expr) => {
    anyhow::anyhow!($err).context(format!("at {}:{}", file!(), line!()))
  };
}
