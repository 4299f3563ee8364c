use thiserror::Error;

#[derive(Error, Debug)]
pub enum InventoryError {
    #[error("[Inventory] Failed to fetch {url}: {reason}")]
    Fetch { url: String, reason: String },

    #[error("[Inventory] Failed to parse {source_name}: {reason}")]
    Parse { source_name: String, reason: String },
}
