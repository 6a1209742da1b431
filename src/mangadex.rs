use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use url::Url;

use crate::error::{Error, Result};
use crate::language::{DEFAULT_LANGUAGE, LanguageCode};

/// Feed page size. Chapters beyond the newest `FEED_PAGE_SIZE` in one
/// interval are never seen.
pub const FEED_PAGE_SIZE: u32 = 10;

pub const CHAPTER_URL_BASE: &str = "https://mangadex.org/chapter/";

pub fn chapter_url(chapter_id: &str) -> String {
    format!("{CHAPTER_URL_BASE}{chapter_id}")
}

/// One entry of a title's chapter feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChapterEvent {
    pub id: String,
    pub volume: Option<String>,
    pub chapter: String,
    /// Chapter-specific title. `None` when the feed sends `null` or `""`.
    pub title: Option<String>,
    pub translated_language: LanguageCode,
    pub created_at: DateTime<Utc>,
    pub publish_at: Option<DateTime<Utc>>,
    pub pages: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TitleMetadata {
    pub id: String,
    pub title: BTreeMap<String, String>,
    pub description: BTreeMap<String, String>,
    pub original_language: Option<String>,
    pub status: Option<String>,
    pub year: Option<i32>,
    pub content_rating: Option<String>,
    pub last_chapter: Option<String>,
    pub available_translated_languages: Vec<LanguageCode>,
}

impl TitleMetadata {
    /// Series title in `language`, then English, then the first title by key.
    pub fn display_title(&self, language: &LanguageCode) -> String {
        let non_empty = |key: &str| self.title.get(key).filter(|t| !t.is_empty());
        non_empty(language.as_str())
            .or_else(|| non_empty(DEFAULT_LANGUAGE))
            .or_else(|| self.title.values().find(|t| !t.is_empty()))
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
pub trait ChapterSource: Send + Sync {
    /// Newest-first, at most [`FEED_PAGE_SIZE`] events.
    async fn fetch_recent_events(
        &self,
        manga_id: &str,
        languages: &[LanguageCode],
    ) -> Result<Vec<ChapterEvent>>;

    async fn fetch_title_metadata(&self, manga_id: &str) -> Result<TitleMetadata>;
}

#[derive(Debug, Clone)]
pub struct MangaDexClient {
    base_url: Url,
    http: reqwest::Client,
}

impl MangaDexClient {
    pub fn new(base_url: Url, http: reqwest::Client) -> Result<Self> {
        if base_url.cannot_be_a_base() {
            return Err(Error::config(format!(
                "mangadex base url cannot be a base: {base_url}"
            )));
        }
        Ok(Self { base_url, http })
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
        context: &str,
    ) -> Result<T> {
        let response = request
            .send()
            .await
            .map_err(|err| Error::transport(format!("send {context}"), err))?;

        let status = response.status();
        if status.as_u16() >= 400 {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Upstream { status, body });
        }

        let raw = response
            .text()
            .await
            .map_err(|err| Error::transport(format!("read {context} body"), err))?;
        serde_json::from_str(&raw).map_err(|source| Error::Decode {
            context: format!("decode {context}"),
            source,
        })
    }
}

#[async_trait]
impl ChapterSource for MangaDexClient {
    async fn fetch_recent_events(
        &self,
        manga_id: &str,
        languages: &[LanguageCode],
    ) -> Result<Vec<ChapterEvent>> {
        let url = self.endpoint(&["manga", manga_id, "feed"]);

        let mut query: Vec<(&str, String)> = languages
            .iter()
            .map(|language| ("translatedLanguage[]", language.to_string()))
            .collect();
        query.push(("limit", FEED_PAGE_SIZE.to_string()));
        query.push(("order[createdAt]", "desc".to_owned()));

        tracing::debug!(manga_id, ?languages, request_url = %url, "getting feed");
        let feed: FeedResponse = self
            .get_json(self.http.get(url).query(&query), "mangadex feed request")
            .await?;

        Ok(feed.data.into_iter().map(ChapterEvent::from).collect())
    }

    async fn fetch_title_metadata(&self, manga_id: &str) -> Result<TitleMetadata> {
        let url = self.endpoint(&["manga", manga_id]);

        tracing::debug!(manga_id, request_url = %url, "getting manga");
        let manga: MangaResponse = self
            .get_json(self.http.get(url), "mangadex manga request")
            .await?;

        Ok(manga.data.into())
    }
}

#[derive(Debug, Deserialize)]
#[allow(dead_code)]
struct FeedResponse {
    result: String,
    #[serde(default)]
    response: String,
    data: Vec<ChapterData>,
    #[serde(default)]
    limit: u32,
    #[serde(default)]
    offset: u32,
    #[serde(default)]
    total: u32,
}

#[derive(Debug, Deserialize)]
struct ChapterData {
    id: String,
    attributes: ChapterAttributes,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChapterAttributes {
    volume: Option<String>,
    chapter: Option<String>,
    title: Option<String>,
    #[serde(default)]
    translated_language: LanguageCode,
    publish_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    #[serde(default)]
    pages: u32,
}

impl From<ChapterData> for ChapterEvent {
    fn from(data: ChapterData) -> Self {
        let attributes = data.attributes;
        Self {
            id: data.id,
            volume: attributes.volume,
            chapter: attributes.chapter.unwrap_or_default(),
            title: attributes.title.filter(|title| !title.is_empty()),
            translated_language: attributes.translated_language,
            created_at: attributes.created_at,
            publish_at: attributes.publish_at,
            pages: attributes.pages,
        }
    }
}

#[derive(Debug, Deserialize)]
#[allow(dead_code)]
struct MangaResponse {
    result: String,
    #[serde(default)]
    response: String,
    data: MangaData,
}

#[derive(Debug, Deserialize)]
struct MangaData {
    id: String,
    attributes: MangaAttributes,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MangaAttributes {
    #[serde(default, deserialize_with = "localized_strings")]
    title: BTreeMap<String, String>,
    #[serde(default, deserialize_with = "localized_strings")]
    description: BTreeMap<String, String>,
    original_language: Option<String>,
    status: Option<String>,
    year: Option<i32>,
    content_rating: Option<String>,
    last_chapter: Option<String>,
    #[serde(default)]
    available_translated_languages: Vec<Option<LanguageCode>>,
}

impl From<MangaData> for TitleMetadata {
    fn from(data: MangaData) -> Self {
        let attributes = data.attributes;
        Self {
            id: data.id,
            title: attributes.title,
            description: attributes.description,
            original_language: attributes.original_language,
            status: attributes.status,
            year: attributes.year,
            content_rating: attributes.content_rating,
            last_chapter: attributes.last_chapter.filter(|c| !c.is_empty()),
            available_translated_languages: attributes
                .available_translated_languages
                .into_iter()
                .flatten()
                .collect(),
        }
    }
}

/// MangaDex sends an empty localized string map as `[]` instead of `{}`.
fn localized_strings<'de, D>(deserializer: D) -> Result<BTreeMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Localized {
        Map(BTreeMap<String, String>),
        Empty(Vec<serde_json::Value>),
    }

    Ok(match Localized::deserialize(deserializer)? {
        Localized::Map(map) => map,
        Localized::Empty(_) => BTreeMap::new(),
    })
}
