use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize};
use url::Url;

use crate::error::{Error, Result};
use crate::language::LanguageCode;
use crate::logging::LogLevel;

pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(60 * 60);
pub const DEFAULT_MANGADEX_BASE_URL: &str = "https://api.mangadex.org/";
pub const DEFAULT_AVATAR_URL: &str = "https://image.spreadshirtmedia.net/image-server/v1/compositions/T1599A1PA5076PT10X11Y7D318959464W4338H5200/views/1,width=550,height=550,appearanceId=1,backgroundColor=FFFFFF,noPt=true/laughing-cat-in-manga-kawaii-style-square-fridge-magnet.jpg";

/// One tracked title and the translations we care about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchTarget {
    #[serde(default)]
    pub manga_id: String,
    #[serde(default, deserialize_with = "nullable_languages")]
    pub translated_languages: Vec<LanguageCode>,
}

/// `null` reads the same as a missing or empty list.
fn nullable_languages<'de, D>(deserializer: D) -> std::result::Result<Vec<LanguageCode>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<LanguageCode>>::deserialize(deserializer)?.unwrap_or_default())
}

impl WatchTarget {
    pub fn new(manga_id: impl Into<String>) -> Self {
        Self {
            manga_id: manga_id.into(),
            translated_languages: vec![LanguageCode::default_language()],
        }
    }

    /// Language used to pick the series title for notifications.
    pub fn primary_language(&self) -> LanguageCode {
        self.translated_languages
            .first()
            .cloned()
            .unwrap_or_else(LanguageCode::default_language)
    }
}

/// Parses the JSON config file form. Every record must carry a non-empty
/// `manga_id`; missing, `null` or empty languages default to `en`.
pub fn parse_watch_targets(raw: &str) -> Result<Vec<WatchTarget>> {
    let mut targets: Vec<WatchTarget> = serde_json::from_str(raw)
        .map_err(|err| Error::config(format!("failed to decode config file: {err}")))?;

    for (index, target) in targets.iter_mut().enumerate() {
        if target.manga_id.is_empty() {
            return Err(Error::config(format!("manga ID is empty on index {index}")));
        }

        if target.translated_languages.is_empty() {
            target.translated_languages = vec![LanguageCode::default_language()];
            continue;
        }
        if let Some(language) = target.translated_languages.iter().find(|l| !l.is_valid()) {
            return Err(Error::config(format!(
                "invalid language on index {index}: {language}"
            )));
        }
    }

    Ok(targets)
}

pub fn load_watch_targets_file(path: &Path) -> Result<Vec<WatchTarget>> {
    let raw = std::fs::read_to_string(path).map_err(|err| {
        Error::config(format!(
            "failed to open config file {}: {err}",
            path.display()
        ))
    })?;
    parse_watch_targets(&raw)
}

/// Builds targets from a bare id list. Empty ids are skipped, not rejected.
pub fn watch_targets_from_ids<I, S>(ids: I) -> Vec<WatchTarget>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    ids.into_iter()
        .filter_map(|id| {
            let id = id.as_ref().trim();
            (!id.is_empty()).then(|| WatchTarget::new(id))
        })
        .collect()
}

pub fn parse_interval(raw: &str) -> Result<Duration> {
    let interval = humantime::parse_duration(raw.trim())
        .map_err(|err| {
            Error::config(format!(
                "invalid SCHEDULE_RUN_INTERVAL {raw:?}: {err} \
                 (use whole units such as 30m, 1h or 1h30m; fractions like 1.5h are not accepted)"
            ))
        })?;
    if interval.is_zero() {
        return Err(Error::config("SCHEDULE_RUN_INTERVAL must be greater than zero"));
    }
    Ok(interval)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetSource {
    File(PathBuf),
    MangaIds(String),
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub interval: Duration,
    pub targets: Vec<WatchTarget>,
    pub target_source: TargetSource,
    pub webhook_url: Url,
    pub avatar_url: String,
    pub mangadex_base_url: Url,
    pub log_level: Option<LogLevel>,
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`Settings::from_env`] but reads variables through `lookup`.
    /// Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let interval = match var("SCHEDULE_RUN_INTERVAL") {
            Some(raw) => parse_interval(&raw)?,
            None => DEFAULT_INTERVAL,
        };

        let target_source = match (var("CONFIG_FILE_PATH"), var("MANGA_IDS")) {
            (Some(path), _) => TargetSource::File(PathBuf::from(path)),
            (None, Some(ids)) => TargetSource::MangaIds(ids),
            (None, None) => {
                return Err(Error::config(
                    "no CONFIG_FILE_PATH or MANGA_IDS found in environment",
                ));
            }
        };
        let targets = match &target_source {
            TargetSource::File(path) => load_watch_targets_file(path)?,
            TargetSource::MangaIds(ids) => watch_targets_from_ids(ids.split(',')),
        };

        let webhook_url = var("WEBHOOK_URL")
            .ok_or_else(|| Error::config("WEBHOOK_URL environment variable not set"))?;
        let webhook_url = Url::parse(&webhook_url)
            .map_err(|err| Error::config(format!("invalid WEBHOOK_URL: {err}")))?;

        let mangadex_base_url =
            var("MANGADEX_BASE_URL").unwrap_or_else(|| DEFAULT_MANGADEX_BASE_URL.to_string());
        let mangadex_base_url = Url::parse(&mangadex_base_url)
            .map_err(|err| Error::config(format!("invalid MANGADEX_BASE_URL: {err}")))?;

        let avatar_url = var("WEBHOOK_AVATAR_URL").unwrap_or_else(|| DEFAULT_AVATAR_URL.to_string());
        let log_level = var("LOG_LEVEL").and_then(|raw| LogLevel::parse(&raw));

        Ok(Self {
            interval,
            targets,
            target_source,
            webhook_url,
            avatar_url,
            mangadex_base_url,
            log_level,
        })
    }
}
