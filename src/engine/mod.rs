pub mod follower;
pub mod tabi;

pub use follower::Follower;
pub use follower::FollowerPhase;
pub use tabi::Tabi;
