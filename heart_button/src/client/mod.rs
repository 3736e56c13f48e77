use std::sync::Arc;

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use crate::state::{Isrc, ResolvedTrack, TrackId};
use crate::utils::map_join;

mod model;

const API_BASE_URL: &str = "https://api.spotify.com/v1";

/// The maximum number of ids accepted by the batched track lookup endpoint
pub const BATCH_LOOKUP_LIMIT: usize = 50;

/// Supplies a bearer token for catalog requests. Authentication is owned by
/// the host; the client only asks for a usable token per request.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn access_token(&self) -> Result<String>;
}

/// The remote catalog/collection contract the core consumes
#[async_trait]
pub trait CatalogApi: Send + Sync {
    /// Fetches the user's full liked collection as a flattened ordered list
    async fn list_liked_tracks(&self) -> Result<Vec<TrackId>>;

    /// Looks up up to [`BATCH_LOOKUP_LIMIT`] tracks in one call
    async fn batch_lookup(&self, ids: &[TrackId]) -> Result<Vec<ResolvedTrack>>;

    async fn lookup_track(&self, id: &TrackId) -> Result<ResolvedTrack>;

    async fn add_to_liked(&self, ids: &[TrackId]) -> Result<()>;

    async fn remove_from_liked(&self, ids: &[TrackId]) -> Result<()>;
}

pub type SharedCatalog = Arc<dyn CatalogApi>;

/// A [`CatalogApi`] implementation against the Spotify Web API
pub struct SpotifyClient {
    http: reqwest::Client,
    token: Arc<dyn TokenProvider>,
}

impl SpotifyClient {
    pub fn new(token: Arc<dyn TokenProvider>) -> Self {
        Self {
            http: reqwest::Client::new(),
            token,
        }
    }

    /// calls a GET HTTP request to the API server,
    /// and parses the response into a specific type `T`.
    async fn internal_call<T>(&self, url: &str) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        let access_token = self.token.access_token().await?;
        Ok(self
            .http
            .get(url)
            .header(
                reqwest::header::AUTHORIZATION,
                format!("Bearer {access_token}"),
            )
            .send()
            .await?
            .json::<T>()
            .await?)
    }

    /// Sends a request whose success response carries no useful body
    /// (the liked-collection add/remove endpoints).
    async fn send_no_content(&self, method: reqwest::Method, url: &str) -> Result<()> {
        let access_token = self.token.access_token().await?;
        let response = self
            .http
            .request(method, url)
            .header(
                reqwest::header::AUTHORIZATION,
                format!("Bearer {access_token}"),
            )
            .send()
            .await?;
        let status = response.status();
        let body = response.text().await?;
        check_no_content_response(url, status, &body)
    }

    /// gets all paging items starting from a pagination object of the first page
    async fn all_paging_items<T>(&self, first_page: model::Page<T>) -> Result<Vec<T>>
    where
        T: serde::de::DeserializeOwned,
    {
        let mut items = first_page.items;
        let mut maybe_next = first_page.next;
        while let Some(url) = maybe_next {
            let mut next_page = self.internal_call::<model::Page<T>>(&url).await?;
            items.append(&mut next_page.items);
            maybe_next = next_page.next;
        }
        Ok(items)
    }
}

/// The add/remove endpoints reply with an empty body on success, so an empty
/// body is never treated as a parse failure. A non-empty body on a 2xx
/// response is reported as an error when it carries an error payload and
/// logged otherwise.
fn check_no_content_response(url: &str, status: reqwest::StatusCode, body: &str) -> Result<()> {
    if !status.is_success() {
        return Err(anyhow!("request to {url} failed with status {status}: {body}"));
    }
    if body.trim().is_empty() {
        return Ok(());
    }
    match serde_json::from_str::<model::ApiError>(body) {
        Ok(err) => Err(anyhow!(
            "request to {url} failed with status {}: {}",
            err.error.status,
            err.error.message
        )),
        Err(err) => {
            tracing::warn!("Unexpected body in a successful response from {url}: {err:#} ({body})");
            Ok(())
        }
    }
}

fn resolved_track(track: model::Track) -> ResolvedTrack {
    ResolvedTrack {
        id: TrackId::new(track.id),
        isrc: track.external_ids.isrc.and_then(Isrc::new),
    }
}

#[async_trait]
impl CatalogApi for SpotifyClient {
    async fn list_liked_tracks(&self) -> Result<Vec<TrackId>> {
        let first_page = self
            .internal_call::<model::Page<model::SavedTrack>>(&format!(
                "{API_BASE_URL}/me/tracks?limit=50"
            ))
            .await?;
        let items = self.all_paging_items(first_page).await?;
        Ok(items
            .into_iter()
            .map(|item| TrackId::new(item.track.id))
            .collect())
    }

    async fn batch_lookup(&self, ids: &[TrackId]) -> Result<Vec<ResolvedTrack>> {
        if ids.len() > BATCH_LOOKUP_LIMIT {
            return Err(anyhow!(
                "batch lookup limited to {BATCH_LOOKUP_LIMIT} ids, got {}",
                ids.len()
            ));
        }
        let ids = map_join(ids, TrackId::as_str, ",");
        let body = self
            .internal_call::<model::Tracks>(&format!("{API_BASE_URL}/tracks?ids={ids}"))
            .await?;
        Ok(body
            .tracks
            .into_iter()
            .flatten()
            .map(resolved_track)
            .collect())
    }

    async fn lookup_track(&self, id: &TrackId) -> Result<ResolvedTrack> {
        let track = self
            .internal_call::<model::Track>(&format!("{API_BASE_URL}/tracks/{id}"))
            .await?;
        Ok(resolved_track(track))
    }

    async fn add_to_liked(&self, ids: &[TrackId]) -> Result<()> {
        let ids = map_join(ids, TrackId::as_str, ",");
        self.send_no_content(
            reqwest::Method::PUT,
            &format!("{API_BASE_URL}/me/tracks?ids={ids}"),
        )
        .await
    }

    async fn remove_from_liked(&self, ids: &[TrackId]) -> Result<()> {
        let ids = map_join(ids, TrackId::as_str, ",");
        self.send_no_content(
            reqwest::Method::DELETE,
            &format!("{API_BASE_URL}/me/tracks?ids={ids}"),
        )
        .await
    }
}
