pub mod bytetrack;
pub mod centroid_tracker;
pub mod reid_layer;

pub use bytetrack::ByteTrackAssociator;
pub use centroid_tracker::CentroidTracker;
pub use reid_layer::ReidLayer;
