use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use tokio::time::Instant;

use crate::config::WatchTarget;
use crate::detect::{UpdateRecord, detect};
use crate::error::{Error, Result};
use crate::mangadex::ChapterSource;
use crate::webhook::Notifier;

/// Upper bound for a single feed request, on top of the cycle deadline.
pub const FEED_FETCH_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    FetchFeed,
    FetchMetadata,
    Deliver,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::FetchFeed => "fetch_feed",
            Self::FetchMetadata => "fetch_metadata",
            Self::Deliver => "deliver",
        })
    }
}

#[derive(Debug)]
pub enum TargetOutcome {
    NoUpdate,
    Notified(UpdateRecord),
    Failed { stage: Stage, error: Error },
}

#[derive(Debug)]
pub struct CycleReport {
    /// Events created after this instant counted as new.
    pub cutoff: DateTime<Utc>,
    pub next_deadline: DateTime<Utc>,
    /// One entry per watch target, in configuration order.
    pub outcomes: Vec<(String, TargetOutcome)>,
}

impl CycleReport {
    pub fn notified(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|(_, outcome)| matches!(outcome, TargetOutcome::Notified(_)))
            .count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|(_, outcome)| matches!(outcome, TargetOutcome::Failed { .. }))
            .count()
    }
}

pub struct Scheduler {
    source: Arc<dyn ChapterSource>,
    notifier: Arc<dyn Notifier>,
    targets: Vec<WatchTarget>,
    interval: Duration,
    interval_delta: TimeDelta,
    watermark: DateTime<Utc>,
}

impl Scheduler {
    /// The first cycle treats everything created in the interval before
    /// `started_at` as new.
    pub fn new(
        source: Arc<dyn ChapterSource>,
        notifier: Arc<dyn Notifier>,
        targets: Vec<WatchTarget>,
        interval: Duration,
        started_at: DateTime<Utc>,
    ) -> Result<Self> {
        let interval_delta = TimeDelta::from_std(interval)
            .map_err(|err| Error::config(format!("schedule interval out of range: {err}")))?;
        let watermark = started_at
            .checked_sub_signed(interval_delta)
            .unwrap_or(DateTime::<Utc>::MIN_UTC);

        Ok(Self {
            source,
            notifier,
            targets,
            interval,
            interval_delta,
            watermark,
        })
    }

    pub fn with_watermark(mut self, watermark: DateTime<Utc>) -> Self {
        self.watermark = watermark;
        self
    }

    pub fn watermark(&self) -> DateTime<Utc> {
        self.watermark
    }

    pub async fn run_forever(mut self) {
        loop {
            let report = self.run_cycle(Utc::now()).await;

            let wait = (report.next_deadline - Utc::now())
                .to_std()
                .unwrap_or(Duration::ZERO);
            tracing::debug!(duration = ?wait, "sleeping");
            tokio::time::sleep(wait).await;
        }
    }

    /// Runs one pass over every target. The watermark moves to
    /// `now + interval` before any target is processed; detection compares
    /// against the previous value.
    pub async fn run_cycle(&mut self, now: DateTime<Utc>) -> CycleReport {
        let cutoff = self.watermark;
        let next_deadline = now
            .checked_add_signed(self.interval_delta)
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
            .max(cutoff);
        self.watermark = next_deadline;

        let cycle_deadline = Instant::now() + self.interval;
        tracing::debug!(
            %cutoff,
            next_schedule_run = %next_deadline,
            targets = self.targets.len(),
            "running scheduled run"
        );

        let mut outcomes = Vec::with_capacity(self.targets.len());
        for target in &self.targets {
            let outcome = match self.process_target(target, cutoff, cycle_deadline).await {
                Ok(Some(update)) => TargetOutcome::Notified(update),
                Ok(None) => TargetOutcome::NoUpdate,
                Err((stage, error)) => {
                    tracing::error!(
                        manga_id = %target.manga_id,
                        %stage,
                        error = %error,
                        "target skipped for this cycle"
                    );
                    TargetOutcome::Failed { stage, error }
                }
            };
            outcomes.push((target.manga_id.clone(), outcome));
        }

        let report = CycleReport {
            cutoff,
            next_deadline,
            outcomes,
        };
        tracing::info!(
            notified = report.notified(),
            failed = report.failed(),
            next_schedule_run = %next_deadline,
            "scheduled run finished"
        );
        report
    }

    async fn process_target(
        &self,
        target: &WatchTarget,
        cutoff: DateTime<Utc>,
        cycle_deadline: Instant,
    ) -> std::result::Result<Option<UpdateRecord>, (Stage, Error)> {
        let manga_id = target.manga_id.as_str();

        let feed_deadline = cycle_deadline.min(Instant::now() + FEED_FETCH_TIMEOUT);
        let events = bounded(
            feed_deadline,
            "mangadex feed request",
            self.source
                .fetch_recent_events(manga_id, &target.translated_languages),
        )
        .await
        .map_err(|err| (Stage::FetchFeed, err))?;

        let Some(detected) = detect(&events, cutoff) else {
            tracing::debug!(manga_id, events = events.len(), "no new chapter");
            return Ok(None);
        };

        let metadata = bounded(
            cycle_deadline,
            "mangadex manga request",
            self.source.fetch_title_metadata(manga_id),
        )
        .await
        .map_err(|err| (Stage::FetchMetadata, err))?;

        let series_title = metadata.display_title(&target.primary_language());
        let update = detected.into_update(manga_id, &series_title);
        tracing::info!(?update, "found update");

        bounded(
            cycle_deadline,
            "discord webhook",
            self.notifier.deliver(&update),
        )
        .await
        .map_err(|err| (Stage::Deliver, err))?;

        Ok(Some(update))
    }
}

async fn bounded<T, F>(deadline: Instant, context: &str, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    tokio::time::timeout_at(deadline, fut)
        .await
        .map_err(|_| Error::timed_out(context))?
}
