use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use log::info;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::Notify;

use stride_lib::models::catalog;
use stride_lib::{
    AppConfig, CompletionRecorder, Database, DesktopDevices, Interval, RunRequest,
    RunStateListener, RunTrackingService, SettingsStore,
};

#[derive(Debug, Parser)]
#[command(name = "stride", about = "Couch to 5K workouts in the terminal")]
struct Cli {
    /// Workout to run, counted from 1. Defaults to the recommended one.
    #[arg(long)]
    run: Option<usize>,

    /// List the program with completion counts and exit.
    #[arg(long)]
    list: bool,
}

struct ConsoleObserver {
    finished: Arc<Notify>,
}

impl RunStateListener for ConsoleObserver {
    fn on_tick(&self, interval_remaining: &str, total_remaining: &str) {
        println!("  {interval_remaining}  (total {total_remaining})");
    }

    fn on_interval_changed(&self, index: usize, interval: &Interval) {
        println!("> {} {} for {}s", index + 1, interval.title, interval.duration);
    }

    fn on_halfway(&self) {
        println!("> Halfway there");
    }

    fn on_run_completed(&self) {
        println!("> Workout complete");
        self.finished.notify_one();
    }

    fn on_run_state_changed(&self, running: bool) {
        println!("{}", if running { "[running]" } else { "[paused]" });
    }

    fn on_session_declined(&self, reason: &str) {
        println!("Cannot start workout: {reason}");
        self.finished.notify_one();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    let cli = Cli::parse();
    let config = AppConfig::from_env();
    info!("Stride starting with data in {}", config.data_dir.display());

    std::fs::create_dir_all(&config.data_dir)
        .with_context(|| format!("Failed to create {}", config.data_dir.display()))?;
    let database = Database::new(config.database_path())?;
    let settings = SettingsStore::new(config.settings_path())?;
    let program = catalog::program()?;

    if cli.list {
        return list(&database, &program).await;
    }

    let run_index = match cli.run {
        Some(0) => bail!("workouts are numbered from 1"),
        Some(n) if n > program.len() => bail!("there are only {} workouts", program.len()),
        Some(n) => n - 1,
        None => database.recommended_run_index(program.len()).await?,
    };
    let run = program[run_index].clone();
    println!("{}: {}", run.name, run.description);
    println!("Commands: p = pause/resume, s = skip, q = quit");

    let devices = Arc::new(DesktopDevices::new(
        config.focus_mode,
        tokio::runtime::Handle::current(),
    ));
    let recorder: Arc<dyn CompletionRecorder> = Arc::new(database.clone());
    let service = RunTrackingService::new(devices, Some(recorder), config.service_options())?;

    let finished = Arc::new(Notify::new());
    let _binding = service.bind(Arc::new(ConsoleObserver {
        finished: finished.clone(),
    }));

    service.begin(Some(RunRequest {
        run,
        run_index,
        settings: settings.workout(),
    }))?;
    service.start();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            _ = finished.notified() => break,
            line = lines.next_line() => {
                let Some(line) = line.context("Failed to read stdin")? else {
                    break;
                };
                match line.trim() {
                    "p" => service.toggle(),
                    "s" => service.skip(),
                    "q" => break,
                    "" => {}
                    other => println!("Unknown command '{other}'"),
                }
            }
        }
    }

    service.close().await;
    service.ui().flush();
    Ok(())
}

async fn list(database: &Database, program: &[stride_lib::Run]) -> Result<()> {
    let progress = database.list_progress().await?;
    let recommended = database.recommended_run_index(program.len()).await?;

    for (index, run) in program.iter().enumerate() {
        let count = progress
            .iter()
            .find(|entry| entry.run_index == index)
            .map_or(0, |entry| entry.completion_count);
        let marker = if index == recommended { "*" } else { " " };
        println!(
            "{marker} {:>2}. {:<14} {:>3} min  done {count}x  {}",
            index + 1,
            run.name,
            run.total_duration() / 60,
            run.description
        );
    }
    Ok(())
}
