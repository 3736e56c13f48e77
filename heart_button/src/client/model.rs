use serde::Deserialize;

#[derive(Debug, Deserialize)]
/// A pagination object returned by the collection endpoints
pub struct Page<T> {
    pub items: Vec<T>,
    pub next: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SavedTrack {
    pub track: Track,
}

#[derive(Debug, Deserialize)]
pub struct Track {
    pub id: String,
    #[serde(default)]
    pub external_ids: ExternalIds,
}

#[derive(Debug, Default, Deserialize)]
pub struct ExternalIds {
    pub isrc: Option<String>,
}

#[derive(Debug, Deserialize)]
/// The body of a batched track lookup. Unknown ids come back as `null`
/// entries, which are skipped.
pub struct Tracks {
    pub tracks: Vec<Option<Track>>,
}

#[derive(Debug, Deserialize)]
pub struct ApiError {
    pub error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
pub struct ApiErrorBody {
    pub status: u16,
    pub message: String,
}
