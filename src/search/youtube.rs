use std::time::Duration;

use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::SearchSettings;
use crate::track::Track;

use super::{SearchBackend, SearchError};

/// YouTube Data API v3 client.
pub struct YoutubeClient {
    client: Client,
    base_url: String,
    api_key: String,
    category_id: String,
}

impl YoutubeClient {
    pub fn new(settings: &SearchSettings) -> Result<Self, SearchError> {
        let client = Client::builder()
            .timeout(Duration::from_millis(settings.timeout_ms))
            .build()?;

        Ok(Self {
            client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            api_key: settings.api_key.trim().to_string(),
            category_id: settings.category_id.clone(),
        })
    }

    fn get<Q: Serialize>(&self, endpoint: &str, query: &Q) -> Result<String, SearchError> {
        if self.api_key.is_empty() {
            return Err(SearchError::MissingApiKey);
        }

        let url = format!("{}/{}", self.base_url, endpoint);
        debug!(url = %url, "search request");
        let response = self
            .client
            .get(url)
            .query(query)
            .query(&[("key", self.api_key.as_str())])
            .send()?;

        let status = response.status();
        let body = response.text()?;
        if !status.is_success() {
            return Err(SearchError::Status {
                status: status.as_u16(),
                message: api_error_message(&body),
            });
        }
        Ok(body)
    }
}

impl SearchBackend for YoutubeClient {
    fn search(&self, query: &str, max_results: u32) -> Result<Vec<Track>, SearchError> {
        #[derive(Serialize)]
        #[serde(rename_all = "camelCase")]
        struct Query<'a> {
            part: &'a str,
            max_results: u32,
            q: &'a str,
            #[serde(rename = "type")]
            kind: &'a str,
            video_category_id: &'a str,
        }

        let body = self.get(
            "search",
            &Query {
                part: "snippet",
                max_results,
                q: query,
                kind: "video",
                video_category_id: &self.category_id,
            },
        )?;
        parse_search_response(&body)
    }

    fn lookup(&self, video_id: &str) -> Result<Option<Track>, SearchError> {
        let body = self.get("videos", &[("part", "snippet"), ("id", video_id)])?;
        Ok(parse_videos_response(&body)?.into_iter().next())
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    id: Option<SearchItemId>,
    snippet: Option<Snippet>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchItemId {
    video_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct VideosResponse {
    #[serde(default)]
    items: Vec<VideoItem>,
}

#[derive(Debug, Deserialize)]
struct VideoItem {
    id: Option<String>,
    snippet: Option<Snippet>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct Snippet {
    title: String,
    channel_title: String,
    description: String,
    thumbnails: Thumbnails,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Thumbnails {
    high: Option<Thumbnail>,
    medium: Option<Thumbnail>,
    default: Option<Thumbnail>,
}

#[derive(Debug, Deserialize)]
struct Thumbnail {
    url: String,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiError,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: String,
}

pub(super) fn parse_search_response(body: &str) -> Result<Vec<Track>, SearchError> {
    let response: SearchResponse = serde_json::from_str(body)?;
    Ok(response
        .items
        .into_iter()
        .filter_map(|item| {
            let id = item.id?.video_id.filter(|id| !id.is_empty())?;
            Some(to_track(id, item.snippet.unwrap_or_default()))
        })
        .collect())
}

pub(super) fn parse_videos_response(body: &str) -> Result<Vec<Track>, SearchError> {
    let response: VideosResponse = serde_json::from_str(body)?;
    Ok(response
        .items
        .into_iter()
        .filter_map(|item| {
            let id = item.id.filter(|id| !id.is_empty())?;
            Some(to_track(id, item.snippet.unwrap_or_default()))
        })
        .collect())
}

fn to_track(id: String, snippet: Snippet) -> Track {
    let thumbnails = snippet.thumbnails;
    let thumbnail_url = thumbnails
        .high
        .or(thumbnails.medium)
        .or(thumbnails.default)
        .map(|t| t.url)
        .unwrap_or_default();

    Track {
        id,
        title: unescape_html(&snippet.title),
        artist: unescape_html(&snippet.channel_title),
        description: unescape_html(&snippet.description),
        thumbnail_url,
    }
}

fn api_error_message(body: &str) -> String {
    match serde_json::from_str::<ApiErrorBody>(body) {
        Ok(b) => b.error.message,
        Err(_) => body.chars().take(200).collect(),
    }
}

/// Undo the entity escaping the API applies to snippet text.
pub(super) fn unescape_html(s: &str) -> String {
    // `&amp;` last, so `&amp;quot;` stays `&quot;`.
    s.replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&#039;", "'")
        .replace("&apos;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}
