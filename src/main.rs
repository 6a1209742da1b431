use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context as _;
use chrono::Utc;

use mangawatch::config::{Settings, TargetSource};
use mangawatch::mangadex::MangaDexClient;
use mangawatch::scheduler::Scheduler;
use mangawatch::webhook::DiscordWebhook;

const USER_AGENT: &str = concat!("mangawatch/", env!("CARGO_PKG_VERSION"));

#[tokio::main]
async fn main() -> ExitCode {
    if let Err(err) = try_main().await {
        eprintln!("{err:#}");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

async fn try_main() -> anyhow::Result<()> {
    let settings = Settings::from_env().context("load settings")?;
    mangawatch::logging::init(settings.log_level).context("init logging")?;

    match &settings.target_source {
        TargetSource::File(path) => {
            tracing::info!(path = %path.display(), "loaded watch targets from config file");
        }
        TargetSource::MangaIds(_) => tracing::info!("loaded watch targets from MANGA_IDS"),
    }
    if settings.targets.is_empty() {
        tracing::warn!("no watch targets configured; cycles will do nothing");
    }
    tracing::info!(
        targets = settings.targets.len(),
        interval = %humantime::format_duration(settings.interval),
        mangadex = %settings.mangadex_base_url,
        "starting mangawatch"
    );

    let http = reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .build()
        .context("build http client")?;
    let source = MangaDexClient::new(settings.mangadex_base_url.clone(), http.clone())
        .context("build mangadex client")?;
    let notifier = DiscordWebhook::new(http, settings.webhook_url.clone(), settings.avatar_url);

    let scheduler = Scheduler::new(
        Arc::new(source),
        Arc::new(notifier),
        settings.targets,
        settings.interval,
        Utc::now(),
    )
    .context("build scheduler")?;
    let task = tokio::spawn(scheduler.run_forever());

    let signal = shutdown_signal().await?;
    tracing::info!(signal, "shutting down");
    task.abort();

    Ok(())
}

async fn shutdown_signal() -> anyhow::Result<&'static str> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut terminate =
            signal(SignalKind::terminate()).context("install SIGTERM handler")?;
        tokio::select! {
            res = tokio::signal::ctrl_c() => {
                res.context("listen for ctrl-c")?;
                Ok("SIGINT")
            }
            _ = terminate.recv() => Ok("SIGTERM"),
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await.context("listen for ctrl-c")?;
        Ok("ctrl-c")
    }
}
