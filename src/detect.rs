use chrono::{DateTime, Utc};

use crate::mangadex::{ChapterEvent, chapter_url};

/// A new chapter picked out of a feed, before the series title is known.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectedChapter {
    pub chapter_id: String,
    pub chapter: String,
    pub title_override: Option<String>,
    pub url: String,
    pub created_at: DateTime<Utc>,
}

impl DetectedChapter {
    pub fn into_update(self, manga_id: &str, series_title: &str) -> UpdateRecord {
        UpdateRecord {
            manga_id: manga_id.to_owned(),
            title: resolve_display_title(series_title, self.title_override.as_deref()),
            chapter: self.chapter,
            url: self.url,
        }
    }
}

/// What gets announced for one title in one cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateRecord {
    pub manga_id: String,
    pub title: String,
    pub chapter: String,
    pub url: String,
}

/// Returns the first event, in feed order, created strictly after `watermark`.
///
/// Only one chapter is reported per call even when several qualify.
pub fn detect(events: &[ChapterEvent], watermark: DateTime<Utc>) -> Option<DetectedChapter> {
    let event = events.iter().find(|event| event.created_at > watermark)?;
    Some(DetectedChapter {
        chapter_id: event.id.clone(),
        chapter: event.chapter.clone(),
        title_override: event.title.clone(),
        url: chapter_url(&event.id),
        created_at: event.created_at,
    })
}

pub fn resolve_display_title(series_title: &str, title_override: Option<&str>) -> String {
    match title_override {
        Some(chapter_title) => format!("{series_title} - {chapter_title}"),
        None => series_title.to_owned(),
    }
}
