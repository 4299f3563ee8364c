pub mod block;
pub mod record;
pub mod sync_state;
pub mod transaction;

pub use block::Block;
pub use block::TransactionReference;
pub use record::AccountRecord;
pub use record::BlockRecords;
pub use record::GeoPoint;
pub use record::HotspotRecord;
pub use record::NormalizedRecords;
pub use record::PaymentEdge;
pub use record::ReceiptEdge;
pub use sync_state::FollowerInfo;
pub use sync_state::SyncState;
pub use transaction::Transaction;
pub use transaction::TransactionKind;
