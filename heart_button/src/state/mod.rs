mod model;
mod store;

pub use model::{Isrc, LikedTrackIndex, ResolvedTrack, TrackId};
pub use store::{LikedStore, SharedStore};
