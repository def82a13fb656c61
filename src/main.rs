//! Dry-run driver.
//!
//! Reads a scenario describing one head and the state of both collaborators,
//! reconciles the head once against in-memory interpreters, and prints the
//! effects the bot would have performed.
//!
//! ```text
//! ci-reconciler scenario.json
//! ```

use std::path::PathBuf;

use anyhow::{Context, bail};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ci_reconciler::bot::{Bot, ContextError, Io};
use ci_reconciler::cache::{CachingHost, FileCache};
use ci_reconciler::effects::{Effect, HostState, RecordingHost, RecordingRunner, RunnerState};
use ci_reconciler::settings::Settings;
use ci_reconciler::types::Head;

#[derive(Debug, Deserialize)]
struct Scenario {
    head: Head,
    #[serde(default)]
    host: HostState,
    #[serde(default)]
    runner: RunnerState,
}

#[derive(Debug, Serialize)]
struct Outcome {
    effects: Vec<Effect>,
    errors: Vec<ContextError>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ci_reconciler=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let Some(path) = std::env::args_os().nth(1).map(PathBuf::from) else {
        bail!("usage: ci-reconciler <scenario.json>");
    };
    let raw = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let scenario: Scenario = serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse {}", path.display()))?;

    let settings = Settings::from_env();
    let cache = FileCache::open(&settings.cache_path, settings.cache_ttl())
        .with_context(|| format!("failed to open cache {}", settings.cache_path.display()))?;

    let host = CachingHost::new(RecordingHost::new(scenario.host), cache);
    let runner = RecordingRunner::new(scenario.runner);
    let io = Io::new(&host, &runner, CancellationToken::new());

    tracing::info!(head = %scenario.head, "Reconciling");
    let current = Bot::new(settings).run(scenario.head, &io).await?;

    let purged = host.purge().context("failed to purge cache")?;
    tracing::debug!(purged, "Cache purged");

    let effects = host
        .inner()
        .effects()
        .into_iter()
        .map(Effect::Host)
        .chain(runner.effects().into_iter().map(Effect::Runner))
        .collect();
    let outcome = Outcome {
        effects,
        errors: current.errors,
    };
    println!("{}", serde_json::to_string_pretty(&outcome)?);
    Ok(())
}
