//! `tbp` - transcription batch pipeline.
//!
//! Usage:
//!   tbp init-config
//!   tbp run
//!   tbp resolve
//!   tbp status <JOB_ID>
//!   tbp publish --source-path out/ --repo-path ../transcripts --owner lab ...

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{bail, Context as _, Result};
use chrono::Local;
use clap::{Args, Parser, Subcommand};

use tbp_core::config::{
    ConfigManager, CredentialResolver, NoPrompt, Settings, TerminalPrompt, GIT_TOKEN_ENV,
};
use tbp_core::logging::{init_tracing, init_tracing_with_file, LogCallback, LogLevel};
use tbp_core::orchestrator::{build_services, execute_run, Context};
use tbp_core::process::{CommandRunner, ProcessCommandRunner};
use tbp_core::publish::{
    AuthenticatedRemote, GitCli, PublishOutcome, PublishRequest, RepositoryPublisher,
};
use tbp_core::scheduler::{SlurmScheduler, StatusSource};
use tbp_core::work_items::{self, HttpSheetSource, ResolveOptions};

#[derive(Parser, Debug)]
#[command(name = "tbp", version, about = "Transcription batch pipeline")]
struct Cli {
    /// Config file (default: the per-user config directory)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Debug-level console logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the whole pipeline once
    Run {
        /// Fail instead of prompting for missing credentials
        #[arg(long)]
        no_prompt: bool,
    },
    /// Publish a directory to a fresh branch of the repository
    Publish(PublishArgs),
    /// List the incomplete work items without fetching anything
    Resolve {
        /// Print the items as JSON
        #[arg(long)]
        json: bool,
    },
    /// Query the scheduler once for a job's status
    Status { job_id: String },
    /// Write a commented default config file
    InitConfig,
}

/// Every flag overrides the matching config value.
#[derive(Args, Debug)]
struct PublishArgs {
    #[arg(long)]
    source_path: Option<PathBuf>,
    #[arg(long)]
    repo_path: Option<PathBuf>,
    #[arg(long)]
    owner: Option<String>,
    #[arg(long)]
    repo_name: Option<String>,
    #[arg(long)]
    username: Option<String>,
    /// Access token (prefer $GIT_TOKEN)
    #[arg(long)]
    token: Option<String>,
    #[arg(long)]
    branch_prefix: Option<String>,
    #[arg(long)]
    host: Option<String>,
    #[arg(long)]
    default_branch: Option<String>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match dispatch(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn dispatch(cli: Cli) -> Result<ExitCode> {
    let config_path = cli.config.clone().unwrap_or_else(default_config_path);
    let verbose = cli.verbose;

    match cli.command {
        Command::InitConfig => init_config(config_path),
        Command::Run { no_prompt } => run(config_path, verbose, no_prompt),
        Command::Publish(args) => publish(config_path, verbose, args),
        Command::Resolve { json } => resolve(config_path, verbose, json),
        Command::Status { job_id } => status(config_path, verbose, &job_id),
    }
}

fn default_config_path() -> PathBuf {
    directories::ProjectDirs::from("", "", "tbp")
        .map(|dirs| dirs.config_dir().join("pipeline.toml"))
        .unwrap_or_else(|| PathBuf::from("pipeline.toml"))
}

fn console_level(settings: &Settings, verbose: bool) -> LogLevel {
    if verbose {
        LogLevel::Debug
    } else {
        settings.logging.level
    }
}

fn load_partial(config_path: PathBuf) -> Result<Settings> {
    let mut manager = ConfigManager::new(config_path);
    manager
        .load_partial()
        .with_context(|| format!("reading {}", manager.path().display()))?;
    Ok(manager.into_settings())
}

fn init_config(config_path: PathBuf) -> Result<ExitCode> {
    let manager = ConfigManager::new(&config_path);
    manager
        .create_default()
        .with_context(|| format!("writing {}", config_path.display()))?;
    println!("Wrote {}", config_path.display());
    println!("Fill in the empty required fields before `tbp run`.");
    Ok(ExitCode::SUCCESS)
}

fn run(config_path: PathBuf, verbose: bool, no_prompt: bool) -> Result<ExitCode> {
    let mut manager = ConfigManager::new(&config_path);
    manager
        .load()
        .with_context(|| format!("loading {}", config_path.display()))?;
    manager.ensure_dirs_exist()?;
    let settings = manager.into_settings();

    let _guard = if settings.logging.file_logging {
        init_tracing_with_file(console_level(&settings, verbose), &settings.logs_dir())
    } else {
        init_tracing(console_level(&settings, verbose));
        None
    };

    let credentials = if no_prompt {
        CredentialResolver::new(NoPrompt)
    } else {
        CredentialResolver::new(TerminalPrompt)
    };
    let services = build_services(&settings, &credentials)?;

    let echo: LogCallback = Box::new(|line: &str| println!("{}", line));
    let ctx = Context::create(settings, services, Some(echo))?;
    tracing::info!("Run {} logging to {:?}", ctx.run_id, ctx.logger.log_path());

    match execute_run(&ctx) {
        Ok(report) => {
            if let Some(reason) = &report.result.halted {
                tracing::info!("Run ended early: {}", reason);
            }
            if let Some(path) = &report.summary_path {
                println!("Summary: {}", path.display());
            }
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            eprintln!("Run failed: {}", e);
            if let Some(path) = ctx.logger.log_path() {
                eprintln!("Full log: {}", path.display());
            }
            Ok(ExitCode::FAILURE)
        }
    }
}

fn publish(config_path: PathBuf, verbose: bool, args: PublishArgs) -> Result<ExitCode> {
    let mut settings = load_partial(config_path)?;
    init_tracing(console_level(&settings, verbose));

    let git = &mut settings.git;
    if let Some(owner) = args.owner {
        git.owner = owner;
    }
    if let Some(repo) = args.repo_name {
        git.repo = repo;
    }
    if let Some(username) = args.username {
        git.username = username;
    }
    if let Some(prefix) = args.branch_prefix {
        git.branch_prefix = prefix;
    }
    if let Some(host) = args.host {
        git.host = host;
    }
    if let Some(branch) = args.default_branch {
        git.default_branch = branch;
    }
    if let Some(token) = args.token {
        git.token = Some(token);
    }

    for (value, flag) in [
        (&settings.git.owner, "--owner"),
        (&settings.git.repo, "--repo-name"),
        (&settings.git.username, "--username"),
    ] {
        if value.trim().is_empty() {
            bail!("{} is required (flag or [git] config)", flag);
        }
    }

    let token = CredentialResolver::new(TerminalPrompt).resolve(
        settings.git.token.as_deref(),
        GIT_TOKEN_ENV,
        "git token",
    )?;

    let request = PublishRequest {
        source_dir: args.source_path.unwrap_or_else(|| settings.output_dir()),
        repo_path: args.repo_path.unwrap_or_else(|| settings.git_repo_path()),
        branch_prefix: settings.git.branch_prefix.clone(),
        default_branch: settings.git.default_branch.clone(),
        started_at: Local::now(),
    };

    let runner: Arc<dyn CommandRunner> = Arc::new(ProcessCommandRunner);
    let publisher = RepositoryPublisher::new(
        GitCli::new(&settings.git.binary, runner),
        AuthenticatedRemote::from_settings(&settings.git, token),
    );
    println!(
        "Publishing {} to {}",
        request.source_dir.display(),
        publisher.remote()
    );

    match publisher.publish(&request)? {
        PublishOutcome::Pushed {
            branch,
            files,
            pull_request_url,
        } => {
            println!("Pushed {} file(s) to {}", files.len(), branch);
            println!("Open a pull request: {}", pull_request_url);
        }
        PublishOutcome::NoChanges { branch } => {
            println!("No new changes after sync; nothing pushed ({})", branch);
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn resolve(config_path: PathBuf, verbose: bool, json: bool) -> Result<ExitCode> {
    let settings = load_partial(config_path)?;
    init_tracing(console_level(&settings, verbose));

    if settings.sheet.url.trim().is_empty() {
        bail!("sheet.url is not configured");
    }

    let source = HttpSheetSource::from_settings(&settings.sheet);
    let items = work_items::resolve(&source, &ResolveOptions::from(&settings.sheet))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&items)?);
    } else if items.is_empty() {
        println!("No incomplete work items");
    } else {
        for item in &items {
            if item.verified {
                println!("{}", item.identifier);
            } else {
                println!("{}\t(unverified label: {})", item.identifier, item.raw_label);
            }
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn status(config_path: PathBuf, verbose: bool, job_id: &str) -> Result<ExitCode> {
    let settings = load_partial(config_path)?;
    init_tracing(console_level(&settings, verbose));

    let runner: Arc<dyn CommandRunner> = Arc::new(ProcessCommandRunner);
    let scheduler = SlurmScheduler::new(&settings.scheduler, runner);
    let probe = scheduler.query_status(job_id);

    let source = match probe.source {
        StatusSource::LiveQueue => "live queue",
        StatusSource::Accounting => "accounting",
        StatusSource::Assumed {
            queries_failed: false,
        } => "not listed anywhere; assumed finished",
        StatusSource::Assumed {
            queries_failed: true,
        } => "scheduler unreachable; status unverified",
    };
    println!("{}: {} ({})", job_id, probe.status, source);
    Ok(ExitCode::SUCCESS)
}
