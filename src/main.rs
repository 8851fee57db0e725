//! repo-resolver: browse hosted git repositories through their symlinks and submodules
//!
//! # Usage
//! ```bash
//! repo-resolver ls org/repo src                       # List a directory
//! repo-resolver cat org/repo src/vendor/lib/x.txt     # Print a file, following submodules
//! repo-resolver serve org/repo --port 3001            # Serve the HTTP API
//! repo-resolver clone org/repo ./checkout --commit abc123
//! ```

use std::io::Write;
use std::path::PathBuf;

use anyhow::Context;
use axum::Router;
use clap::{Args, Parser, Subcommand};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use repo_resolver::clone::{CloneAcquirer, CloneRequest};
use repo_resolver::config::ResolverConfig;
use repo_resolver::filter::ExcludedPaths;
use repo_resolver::models::{Link, Provider, Source};
use repo_resolver::routes::{self, AppState};
use repo_resolver::session::ContentsOptions;

/// Read repository contents across GitHub, GitLab, Bitbucket, Azure DevOps and local clones
#[derive(Parser)]
#[command(name = "repo-resolver")]
#[command(about = "Read repositories through their symlinks and submodules", long_about = None)]
struct Cli {
    /// JSON configuration file (endpoints, timeouts, credentials)
    #[arg(short, long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Clone)]
struct SourceArgs {
    /// Repository name (`owner/repo`, `org/project/_git/repo` on Azure) or checkout path
    #[arg(value_name = "REPO")]
    repo: String,

    /// github, gitlab, bitbucket, azure or local
    #[arg(short, long, default_value = "github")]
    provider: String,

    /// Base directory paths are relative to
    #[arg(short, long, default_value = "")]
    directory: String,

    #[arg(short, long)]
    branch: Option<String>,

    /// Pin a commit instead of resolving the branch head
    #[arg(long)]
    commit: Option<String>,

    /// Hide entries at or below this path in listings (repeatable)
    #[arg(long = "exclude", value_name = "PATH")]
    excluded: Vec<String>,
}

impl SourceArgs {
    fn source(&self) -> anyhow::Result<Source> {
        let provider: Provider = self.provider.parse()?;
        let mut source = Source::new(provider, self.repo.clone()).with_directory(&self.directory);
        if let Some(branch) = &self.branch {
            source = source.with_branch(branch.clone());
        }
        if let Some(commit) = &self.commit {
            source = source.with_commit(commit.clone());
        }
        Ok(source)
    }

    fn state(&self, config: ResolverConfig) -> anyhow::Result<AppState> {
        Ok(AppState::new(config, self.source()?, ExcludedPaths::new(&self.excluded)))
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the HTTP API for one repository
    Serve {
        #[command(flatten)]
        source: SourceArgs,

        /// Port to run the server on
        #[arg(long, default_value = "3001")]
        port: u16,
    },
    /// List a directory
    Ls {
        #[command(flatten)]
        source: SourceArgs,

        #[arg(value_name = "PATH", default_value = "")]
        path: String,

        /// Do not follow symlinks and submodules
        #[arg(long)]
        no_follow: bool,
    },
    /// Print a file to stdout
    Cat {
        #[command(flatten)]
        source: SourceArgs,

        #[arg(value_name = "PATH")]
        path: String,

        /// Do not follow symlinks and submodules
        #[arg(long)]
        no_follow: bool,
    },
    /// Clone a repository into a directory, retrying transient failures
    Clone {
        #[arg(value_name = "REPO")]
        repo: String,

        #[arg(value_name = "TARGET")]
        target: PathBuf,

        #[arg(short, long, default_value = "github")]
        provider: String,

        #[arg(short, long)]
        branch: Option<String>,

        /// Check out this commit after cloning
        #[arg(long)]
        commit: Option<String>,

        /// Skip submodules
        #[arg(long)]
        no_submodules: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "warn".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = match &cli.config {
        Some(path) => ResolverConfig::load(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        None => ResolverConfig::default(),
    };

    match cli.command {
        Commands::Serve { source, port } => serve(source.state(config)?, port).await,
        Commands::Ls {
            source,
            path,
            no_follow,
        } => {
            let options = ContentsOptions {
                follow_redirections: !no_follow,
                ..Default::default()
            };
            let entries = source
                .state(config)?
                .with_session(move |session| session.repo_contents(&path, options))
                .await?;

            for entry in entries {
                match entry.link {
                    Some(Link::Symlink { target }) => println!("{:<9} {} -> /{}", "symlink", entry.path, target),
                    Some(Link::Submodule { url, commit }) => println!(
                        "{:<9} {} -> {}@{}",
                        "submodule",
                        entry.path,
                        url.as_deref().unwrap_or("?"),
                        commit
                    ),
                    None => println!("{:<9} {}", entry.entry_type.as_str(), entry.path),
                }
            }
            Ok(())
        }
        Commands::Cat {
            source,
            path,
            no_follow,
        } => {
            let bytes = source
                .state(config)?
                .with_session(move |session| session.read_file(&path, !no_follow))
                .await?;
            std::io::stdout().write_all(&bytes)?;
            Ok(())
        }
        Commands::Clone {
            repo,
            target,
            provider,
            branch,
            commit,
            no_submodules,
        } => {
            let provider: Provider = provider.parse()?;
            let request = CloneRequest {
                host: config.endpoints.host(provider),
                branch,
                commit,
                submodules: config.clone.submodules && !no_submodules,
                ..CloneRequest::new(provider, repo)
            };

            // The acquirer blocks (and sleeps between retries)
            let checkout = tokio::task::spawn_blocking(move || {
                CloneAcquirer::new(config.clone.retry_policy(), config.credential_store()).clone(&request, &target)
            })
            .await??;
            println!("{}", checkout.display());
            Ok(())
        }
    }
}

async fn serve(state: AppState, port: u16) -> anyhow::Result<()> {
    let source = state.source().clone();

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .merge(routes::create_router(state))
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    let addr = format!("127.0.0.1:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to port {}, try another with --port", port))?;

    println!();
    println!("  Repository: {}:{}", source.provider, source.repo);
    if !source.directory.is_empty() {
        println!("  Directory:  /{}", source.directory);
    }
    println!("  Server:     http://{}", addr);
    println!();
    println!("  Press Ctrl+C to stop");
    println!();

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
        }
        println!("\n  Shutting down...");
    };

    axum::serve(listener, app).with_graceful_shutdown(shutdown).await?;

    Ok(())
}
