use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use comicfeed::cli::targets::{atom_path, load_list};
use comicfeed::cli::{Cli, Commands};
use comicfeed::config::Config;
use comicfeed::domain::ConditionalRequest;
use comicfeed::fetcher::HttpFetcher;
use comicfeed::output::to_atom;
use comicfeed::server;
use comicfeed::services::FeedService;
use comicfeed::sources::SiteRegistry;

#[tokio::main]
async fn main() {
    init_logging();

    if let Err(e) = run().await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(std::io::stderr)
        .init();
}

async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = Config::from_env()?;

    let fetcher = HttpFetcher::new(&config)?;
    let service = FeedService::new(SiteRegistry::new(), Box::new(fetcher));

    match cli.command {
        Commands::Fetch {
            targets,
            list,
            atom,
        } => cmd_fetch(&service, targets, list, &atom).await,
        Commands::Serve { listen } => {
            let listen = listen.unwrap_or_else(|| config.listen.clone());
            server::serve(Arc::new(service), &listen).await?;
            Ok(())
        }
    }
}

async fn cmd_fetch(
    service: &FeedService,
    mut targets: Vec<String>,
    list: Option<PathBuf>,
    atom_dir: &Path,
) -> anyhow::Result<()> {
    targets.retain(|t| !t.is_empty());

    let mut errored = false;
    if let Some(list) = &list {
        match load_list(list) {
            Ok(loaded) => targets.extend(loaded),
            Err(e) => {
                eprintln!("cannot load file({}): {}", list.display(), e);
                errored = true;
            }
        }
    }

    if targets.is_empty() {
        bail!("no target found from --targets nor --list");
    }

    for target in &targets {
        print!("Fetch {} ", target);
        match process_target(service, target, atom_dir).await {
            Ok(path) => println!("-> {}", path.display()),
            Err(e) => {
                println!();
                eprintln!("Error: {:#}", e);
                errored = true;
            }
        }
    }

    if errored {
        bail!("one or more targets failed");
    }
    Ok(())
}

async fn process_target(
    service: &FeedService,
    target: &str,
    atom_dir: &Path,
) -> anyhow::Result<PathBuf> {
    let result = service
        .get_feed(target, &ConditionalRequest::none())
        .await?;

    let xml = to_atom(&result.feed)?;

    let path = atom_path(atom_dir, &result.name);
    fs::write(&path, xml).with_context(|| format!("cannot write {}", path.display()))?;

    Ok(path)
}
