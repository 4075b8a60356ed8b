use indicatif::{ProgressBar, ProgressStyle};
use rmu::config::Config;
use rmu::core::RmuResult;
use rmu::di::ServiceContainer;
use rmu::resolver::ResolveStrategy;
use rmu::updater::{UpdateOrchestrator, UpdateOutcome, UpdateSummary};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Command-line overrides for one update run
pub struct UpdateOptions {
    pub dir: Option<PathBuf>,
    pub dry_run: bool,
    pub token: Option<String>,
    pub strategy: Option<ResolveStrategy>,
    pub jobs: Option<usize>,
    pub timeout: Option<u64>,
}

pub async fn run(options: UpdateOptions) -> RmuResult<()> {
    let mut config = Config::load()?;
    apply_overrides(&mut config, &options);

    let dir = match options.dir {
        Some(dir) => dir,
        None => config.get_mods_dir()?,
    };
    let dry_run = config.dry_run;

    let container = ServiceContainer::from_config(config)?;
    let orchestrator = UpdateOrchestrator::from_container(&container);

    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("Cancelling, waiting for running mods to stop...");
            ctrl_c.cancel();
        }
    });

    if dry_run {
        println!("Dry run: no files will be written");
    }
    println!("Checking mods in {}", dir.display());

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner} [{elapsed_precise}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner.set_message("checking mods");

    let mut done = 0usize;
    let result = orchestrator
        .run_with_progress(&dir, dry_run, &cancel, |path, outcome| {
            done += 1;
            spinner.set_message(format!("{} checked", done));
            let line = format_line(path, outcome, dry_run);
            spinner.suspend(|| println!("{}", line));
        })
        .await;
    spinner.finish_and_clear();

    let outcomes = result?;
    let summary = UpdateSummary::from_outcomes(outcomes.values());
    if summary.total() == 0 {
        println!("No mods found");
    } else {
        println!("\n{}", summary);
    }
    Ok(())
}

fn apply_overrides(config: &mut Config, options: &UpdateOptions) {
    if options.dry_run {
        config.dry_run = true;
    }
    if let Some(ref token) = options.token {
        config.token_override = Some(token.clone());
    }
    if let Some(strategy) = options.strategy {
        config.strategy = strategy;
    }
    if let Some(jobs) = options.jobs {
        config.max_concurrent = jobs.max(1);
    }
    if let Some(timeout) = options.timeout {
        config.deadline_secs = Some(timeout);
    }
}

fn format_line(path: &Path, outcome: &UpdateOutcome, dry_run: bool) -> String {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    match outcome {
        UpdateOutcome::Updated if dry_run => format!("  ↑ {} (would update)", name),
        UpdateOutcome::Updated => format!("  ↑ {} updated", name),
        UpdateOutcome::Unchanged => format!("  ✓ {} up to date", name),
        UpdateOutcome::Failed(reason) => format!("  ✗ {} ({})", name, reason),
        UpdateOutcome::Cancelled => format!("  - {} cancelled", name),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options() -> UpdateOptions {
        UpdateOptions {
            dir: None,
            dry_run: false,
            token: None,
            strategy: None,
            jobs: None,
            timeout: None,
        }
    }

    #[test]
    fn test_token_flag_is_a_run_override() {
        let mut config = Config {
            token: Some("stored".to_string()),
            ..Config::default()
        };
        let options = UpdateOptions {
            token: Some("from-flag".to_string()),
            ..options()
        };
        apply_overrides(&mut config, &options);

        assert_eq!(config.token_override.as_deref(), Some("from-flag"));
        assert_eq!(config.token.as_deref(), Some("stored"));
    }

    #[test]
    fn test_jobs_never_below_one() {
        let mut config = Config::default();
        let options = UpdateOptions {
            jobs: Some(0),
            ..options()
        };
        apply_overrides(&mut config, &options);
        assert_eq!(config.max_concurrent, 1);
    }
}
