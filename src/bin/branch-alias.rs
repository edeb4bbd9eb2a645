// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use branch_alias::{
    config::Settings,
    git::{BranchSource, Git2BranchSource},
    jira::{JiraService, ReqwestTransport},
    notify::{Notifier, TracingNotifier},
    path::{default_config_file, default_state_file},
    store::{AliasStore, TomlFileBackend},
    watch::RepositoryWatcher,
    BranchAliasManager, SyncEngine,
};

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::{io::ErrorKind, path::PathBuf, process::exit, sync::Arc, time::Duration};
use tracing::{debug, error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Debug, Clone, Parser)]
#[command(
    about,
    override_usage = "\n  branch-alias [options] <command>",
    subcommand_help_heading = "Commands",
    version
)]
struct Cli {
    /// Path to settings file.
    #[arg(short, long, value_name = "path", global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    async fn run(self) -> Result<()> {
        let settings = load_settings(self.config)?;
        match self.command {
            Command::Sync => run_sync(settings).await,
            Command::Check => run_check(settings).await,
            Command::List(opts) => run_list(settings, opts).await,
            Command::Status => run_status(settings).await,
            Command::Links => run_links(settings).await,
            Command::ToggleRemote => run_toggle_remote(settings).await,
            Command::ToggleRepo(opts) => run_toggle_repo(settings, opts).await,
            Command::Validate => run_validate(settings),
            Command::TokenUrl => run_token_url(settings),
            Command::Watch(opts) => run_watch(settings, opts).await,
        }
    }
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Rebuild aliases of every branch from Jira.
    Sync,

    /// Look up aliases only for branches that do not have one yet.
    Check,

    /// List branches with their aliases.
    #[command(override_usage = "branch-alias list [options] [<repo>]")]
    List(ListOptions),

    /// Summarize checked out branch of every repository.
    Status,

    /// Print Jira links of checked out issues.
    Links,

    /// Flip visibility of remote branches.
    ToggleRemote,

    /// Flip expansion state of repository in listings.
    #[command(override_usage = "branch-alias toggle-repo [options] <repo>")]
    ToggleRepo(ToggleRepoOptions),

    /// Check settings for problems.
    Validate,

    /// Print URL of page where Jira access tokens are generated.
    TokenUrl,

    /// Watch repositories and look up aliases of new branches.
    Watch(WatchOptions),
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct ListOptions {
    /// Root path of repository to list. Lists every repository if omitted.
    #[arg(value_name = "repo")]
    pub repo: Option<PathBuf>,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct ToggleRepoOptions {
    /// Root path of repository to toggle.
    #[arg(required = true, value_name = "repo")]
    pub repo: PathBuf,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct WatchOptions {
    /// Seconds between repository polls.
    #[arg(short, long, value_name = "secs", default_value_t = 5)]
    pub interval: u64,
}

#[tokio::main]
async fn main() {
    let layer = fmt::layer()
        .compact()
        .with_target(false)
        .with_timer(false)
        .without_time();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(layer)
        .with(filter)
        .init();

    if let Err(error) = run().await {
        error!("{error:?}");
        exit(1);
    }

    exit(0)
}

async fn run() -> Result<()> {
    Cli::parse().run().await
}

fn load_settings(path: Option<PathBuf>) -> Result<Settings> {
    let explicit = path.is_some();
    let path = match path {
        Some(path) => path,
        None => default_config_file()?,
    };

    match std::fs::read_to_string(&path) {
        Ok(data) => data
            .parse()
            .with_context(|| format!("failed to parse settings at {:?}", path.display())),
        Err(error) if error.kind() == ErrorKind::NotFound && !explicit => {
            debug!("no settings at {:?}, using defaults", path.display());
            Ok(Settings::default())
        }
        Err(error) => {
            Err(error).with_context(|| format!("failed to read settings at {:?}", path.display()))
        }
    }
}

async fn build_manager(settings: &Settings, interactive: bool) -> Result<BranchAliasManager> {
    let notifier: Arc<dyn Notifier> = Arc::new(TracingNotifier);
    let state_file = match &settings.state_file {
        Some(path) => path.clone(),
        None => default_state_file()?,
    };

    let source = Git2BranchSource::new(&settings.repositories, interactive);
    let tracker = JiraService::new(settings, ReqwestTransport::new()?, notifier.clone());
    let store = AliasStore::load(TomlFileBackend::new(state_file)).await?;

    Ok(BranchAliasManager::new(SyncEngine::new(source, tracker, store, notifier)))
}

fn ensure_valid(settings: &Settings) -> Result<()> {
    let validation = settings.validate();
    for warning in &validation.warnings {
        warn!("{warning}");
    }

    if !validation.is_valid() {
        for error in &validation.errors {
            error!("{error}");
        }
        return Err(anyhow!("configuration is invalid, fix the errors above first"));
    }

    Ok(())
}

fn spinner(message: &'static str) -> Result<ProgressBar> {
    let bar = ProgressBar::new_spinner();
    bar.set_style(ProgressStyle::with_template(
        "{spinner:.green} {elapsed_precise:.green}  {msg}",
    )?);
    bar.set_message(message);
    bar.enable_steady_tick(Duration::from_millis(100));

    Ok(bar)
}

async fn run_sync(settings: Settings) -> Result<()> {
    ensure_valid(&settings)?;
    let mut manager = build_manager(&settings, true).await?;

    let bar = spinner("syncing with Jira")?;
    manager
        .engine_mut()
        .source_mut()
        .set_progress(Some(bar.clone()));
    let result = manager.sync_with_jira().await;
    bar.finish_and_clear();

    if !result.success {
        return Err(anyhow!("sync failed"));
    }

    info!("synced {} issue keys", result.synced_count);
    Ok(())
}

async fn run_check(settings: Settings) -> Result<()> {
    let mut manager = build_manager(&settings, false).await?;
    match manager.on_repositories_changed().await {
        Some(result) if !result.success => Err(anyhow!("incremental sync failed")),
        Some(_) => Ok(()),
        None => {
            info!("every branch already has an alias");
            Ok(())
        }
    }
}

async fn run_list(settings: Settings, opts: ListOptions) -> Result<()> {
    let manager = build_manager(&settings, true).await?;
    let repositories = manager.engine().source().repositories();

    if let Some(target) = opts.repo {
        let target = target.canonicalize().unwrap_or(target);
        let repo = repositories
            .iter()
            .find(|repo| repo.root() == target)
            .ok_or_else(|| anyhow!("repository {:?} is not configured", target.display()))?;
        for entry in manager.get_aliases(repo.root()).await {
            println!("{}\t{}", entry.branch_name, entry.display_text);
        }
        return Ok(());
    }

    for repo in &repositories {
        let expanded = manager.is_repository_expanded(repo.root());
        let marker = if expanded { "v" } else { ">" };
        println!("{marker} {} ({})", repo.name(), repo.root().display());
        if !expanded {
            continue;
        }

        for entry in manager.get_aliases(repo.root()).await {
            println!("    {}\t{}", entry.branch_name, entry.display_text);
        }
    }

    Ok(())
}

async fn run_status(settings: Settings) -> Result<()> {
    let manager = build_manager(&settings, false).await?;
    let summary = manager.status_summary().await;
    println!("{}", summary.text);
    println!();
    println!("{}", summary.tooltip);

    Ok(())
}

async fn run_links(settings: Settings) -> Result<()> {
    ensure_valid(&settings)?;
    let manager = build_manager(&settings, false).await?;
    let links = manager.jira_links().await;
    if links.urls.is_empty() {
        warn!("no Jira issue found for current branches");
        return Ok(());
    }

    if links.diverged {
        info!("repositories are on different branches");
    }
    for url in links.urls {
        println!("{url}");
    }

    Ok(())
}

async fn run_toggle_remote(settings: Settings) -> Result<()> {
    let mut manager = build_manager(&settings, false).await?;
    let shown = manager.toggle_remote_branches().await?;
    info!("remote branches {}", if shown { "shown" } else { "hidden" });

    Ok(())
}

async fn run_toggle_repo(settings: Settings, opts: ToggleRepoOptions) -> Result<()> {
    let mut manager = build_manager(&settings, false).await?;
    let target = opts.repo.canonicalize().unwrap_or(opts.repo);
    let expanded = manager.toggle_repository(target.clone()).await?;
    info!("{:?} {}", target.display(), if expanded { "expanded" } else { "collapsed" });

    Ok(())
}

fn run_validate(settings: Settings) -> Result<()> {
    ensure_valid(&settings)?;
    info!("configuration is valid");

    Ok(())
}

fn run_token_url(settings: Settings) -> Result<()> {
    let notifier: Arc<dyn Notifier> = Arc::new(TracingNotifier);
    let tracker = JiraService::new(&settings, ReqwestTransport::new()?, notifier);
    let url = tracker
        .token_page_url()
        .ok_or_else(|| anyhow!("configure JIRA base URL first"))?;
    println!("{url}");

    Ok(())
}

async fn run_watch(settings: Settings, opts: WatchOptions) -> Result<()> {
    let mut manager = build_manager(&settings, false).await?;
    let mut watcher = RepositoryWatcher::new();
    watcher.on_did_change_repositories(|_| {
        debug!("branches changed, checking for missing aliases")
    });
    manager.on_did_change_aliases(|_| info!("aliases updated"));

    manager.on_repositories_changed().await;
    watcher.poll(manager.engine().source()).await;

    let mut ticker = tokio::time::interval(Duration::from_secs(opts.interval.max(1)));
    info!("watching {} repositories", manager.engine().source().repositories().len());
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                manager.engine_mut().source_mut().refresh();
                if watcher.poll(manager.engine().source()).await {
                    manager.on_repositories_changed().await;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("stop watching");
                return Ok(());
            }
        }
    }
}
