use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use class_reminder::bot::ReminderBot;
use class_reminder::config::{BotConfig, DEFAULT_CONFIG_PATH};
use class_reminder::notify::LogSink;
use class_reminder::schedule::{Clock, Runner, SystemClock};

#[derive(Parser, Debug)]
#[command(name = "class-reminder", about = "Announces the day's classes and reminds the group before each one")]
struct Cli {
    /// Path to the JSON config file
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Fire every job once right away and log to stdout
    #[arg(long)]
    test: bool,
}

fn init_logging(config: &BotConfig, test_mode: bool) -> anyhow::Result<Option<WorkerGuard>> {
    let default_level = if test_mode { "class_reminder=debug" } else { "class_reminder=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    if test_mode {
        tracing_subscriber::fmt().with_env_filter(filter).init();
        return Ok(None);
    }

    std::fs::create_dir_all(&config.log_dir)
        .with_context(|| format!("cannot create log directory {}", config.log_dir.display()))?;
    let appender = tracing_appender::rolling::never(&config.log_dir, "record.log");
    let (writer, guard) = tracing_appender::non_blocking(appender);
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .init();
    Ok(Some(guard))
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = BotConfig::load(&cli.config)
        .with_context(|| format!("failed to load config from {}", cli.config.display()))?;
    let _guard = init_logging(&config, cli.test)?;

    let clock = SystemClock::new(config.offset()?);
    let now = clock.now();
    info!(config = %cli.config.display(), test_mode = cli.test, "starting class reminder");

    let mut bot = ReminderBot::from_config(config, Box::new(LogSink), now.date_naive())
        .context("failed to initialize bot")?;

    let mut runner = Runner::new(clock);
    for (fire_at, job) in bot.initial_jobs(now, cli.test) {
        runner.schedule(fire_at, job);
    }
    for entry in runner.pending() {
        info!(id = entry.id, job = entry.job.label(), fire_at = %entry.fire_at, "job scheduled");
    }

    tokio::select! {
        _ = runner.run(&mut bot) => {}
        _ = tokio::signal::ctrl_c() => info!("interrupted, shutting down"),
    }
    Ok(())
}
