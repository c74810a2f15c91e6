use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;

use bb_release::cli::orchestration::{run_release_workflow, ReleaseWorkflowArgs};
use bb_release::config::{self, Config, Step};
use bb_release::domain::VersionBump;
use bb_release::fetch::HttpRawFetcher;
use bb_release::forge::GitLabForge;
use bb_release::git::Git2WorkingCopy;
use bb_release::ui::{self, FixedPrompt, Prompt, TerminalPrompt};
use bb_release::ReleaseError;

#[derive(clap::Parser)]
#[command(
    name = "bb-release",
    about = "Cut Big Bang release branches, build release notes and bump version references"
)]
struct Args {
    #[arg(short, long, help = "Custom configuration file path")]
    config: Option<PathBuf>,

    #[arg(short, long, help = "Path to the local Big Bang clone")]
    bb_path: Option<PathBuf>,

    #[arg(short, long, help = "Release type: major, minor or patch")]
    release_type: Option<VersionBump>,

    #[arg(
        short,
        long = "step",
        value_delimiter = ',',
        help = "Steps to run (check-last-release, create-release-branch, \
                build-release-notes, upgrade-version-references)"
    )]
    steps: Vec<Step>,

    #[arg(short, long, help = "Skip confirmation prompts")]
    yes: bool,

    #[arg(long, help = "Print release notes to stdout without creating or writing anything")]
    dry_run: bool,

    #[arg(short, long, action = clap::ArgAction::Count, help = "Increase log verbosity")]
    verbose: u8,

    #[arg(short = 'V', long, help = "Print version information")]
    version: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    if args.version {
        println!("bb-release {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let mut config = match config::load_config(args.config.as_deref()) {
        Ok(cfg) => cfg,
        Err(e) => {
            ui::display_error(&format!("Error loading config: {}", e));
            std::process::exit(1);
        }
    };
    if let Some(bb_path) = &args.bb_path {
        config.bb_path = bb_path.clone();
    }

    setup_logging(&config, args.verbose);

    match run(&args, &config) {
        Ok(()) => Ok(()),
        Err(e) => match e.downcast_ref::<ReleaseError>() {
            Some(ReleaseError::Cancelled(reason)) => {
                println!("Operation cancelled by user ({}).", reason);
                Ok(())
            }
            _ => {
                ui::display_error(&format!("{:#}", e));
                std::process::exit(1);
            }
        },
    }
}

fn run(args: &Args, config: &Config) -> Result<()> {
    let token = config.forge.require_token()?;
    let timeout = Duration::from_secs(config.forge.timeout_secs);

    let forge = GitLabForge::new(&config.forge.url, config.forge.project_id, token, timeout)
        .context("Failed to set up the forge client")?;
    let fetcher = HttpRawFetcher::new(timeout).context("Failed to set up the HTTP client")?;
    let working_copy = Git2WorkingCopy::open(&config.bb_path).with_context(|| {
        format!(
            "Cannot open Big Bang repository at {}",
            config.bb_path.display()
        )
    })?;

    let workflow_args = ReleaseWorkflowArgs {
        release_type: args.release_type,
        steps: if args.steps.is_empty() {
            None
        } else {
            Some(args.steps.clone())
        },
        assume_yes: args.yes,
        dry_run: args.dry_run,
    };

    let prompt: Box<dyn Prompt> = if args.yes || !config.interactive {
        Box::new(FixedPrompt(true))
    } else {
        Box::new(TerminalPrompt)
    };

    let result = run_release_workflow(
        &workflow_args,
        config,
        &forge,
        &working_copy,
        &fetcher,
        prompt.as_ref(),
    )?;

    ui::display_success(&format!(
        "Release {} prepared on {} (previous {})",
        result.next.tag, result.release_branch, result.previous.tag
    ));
    if !result.upgraded_packages.is_empty() {
        ui::display_status(&format!(
            "Upgraded packages: {}",
            result.upgraded_packages.join(", ")
        ));
    }
    if !result.skipped_packages.is_empty() {
        ui::display_status(&format!(
            "Skipped packages (manual intervention required): {}",
            result.skipped_packages.join(", ")
        ));
    }

    Ok(())
}

fn setup_logging(config: &Config, verbosity: u8) {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let level = match verbosity {
        0 => config.log_level.parse().unwrap_or(tracing::Level::INFO),
        1 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };

    let filter = tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into());

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .init();
}
