pub mod domain;
pub mod infrastructure;

pub use domain::{IdentityTracker, Track};
