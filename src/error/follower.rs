use thiserror::Error;

#[derive(Error, Debug)]
pub enum FollowerError {
    #[error("Block {height} still failing after {attempts} attempts, refusing to skip it")]
    RetriesExhausted { height: u64, attempts: usize },

    #[error("Inventory bootstrap requested but neither a feed url nor a local path is configured")]
    MissingInventorySource,
}
