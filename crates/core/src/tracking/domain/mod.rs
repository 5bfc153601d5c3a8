pub mod track;
pub mod tracker;

pub use track::Track;
pub use tracker::IdentityTracker;
