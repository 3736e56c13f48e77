use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

const TRACK_URI_PREFIX: &str = "spotify:track:";
const LOCAL_URI_PREFIX: &str = "spotify:local:";

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
/// An opaque identifier of one playable track in the remote catalog
pub struct TrackId(String);

impl TrackId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Constructs a track id from a catalog URI, stripping the
    /// `spotify:track:` prefix if present. Local-file URIs are kept
    /// whole so they stay recognizable as local.
    pub fn from_uri(uri: &str) -> Self {
        match uri.strip_prefix(TRACK_URI_PREFIX) {
            Some(id) => Self(id.to_string()),
            None => Self(uri.to_string()),
        }
    }

    /// Whether the track is a local file, which has no catalog entry
    /// and can never be resolved to a recording identifier.
    pub fn is_local(&self) -> bool {
        self.0.starts_with(LOCAL_URI_PREFIX)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
/// An ISRC, shared by every release of the same underlying recording
pub struct Isrc(String);

impl Isrc {
    /// Returns `None` for an empty string: a track without a resolved
    /// ISRC is represented by the absence of a value, never by an
    /// empty sentinel.
    pub fn new(isrc: impl Into<String>) -> Option<Self> {
        let isrc = isrc.into();
        if isrc.is_empty() {
            None
        } else {
            Some(Self(isrc))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Isrc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
/// The result of one catalog lookup. `isrc` is `None` when the catalog
/// carries no ISRC for the track; such tracks stay unresolved.
pub struct ResolvedTrack {
    pub id: TrackId,
    pub isrc: Option<Isrc>,
}

/// The authoritative local mapping of liked tracks to their recordings
pub type LikedTrackIndex = HashMap<TrackId, Isrc>;
