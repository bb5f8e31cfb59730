//! Renzoku command-line interface.
//!
//! ```text
//! renzoku download --chapter-url https://mangapoisk.io/manga/foo/chapter/1-1 --auto-next 5
//! renzoku download --chapter-url https://mangapoisk.io/manga/foo/chapter/1-1 --all
//! renzoku download --slug foo --dry-run
//! renzoku audit --slug foo
//! ```
//!
//! Exits with status 0 on success and 2 on any unrecoverable failure.

use clap::{ArgGroup, Args, Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};

use renzoku::audit::{AuditReport, audit_title};
use renzoku::logging;
use renzoku::prelude::*;

const EXIT_FAILURE: u8 = 2;
const MISSING_PREVIEW: usize = 10;

/// Crawl manga chapters and download their pages.
#[derive(Parser, Debug)]
#[command(name = "renzoku")]
#[command(author, version, about)]
struct Cli {
    /// YAML configuration file (default: config/config.yaml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Download one chapter, a run of chapters, or a whole title
    Download(DownloadArgs),
    /// Compare the chapters listed online with the local library
    Audit(AuditArgs),
}

#[derive(Args, Debug)]
#[command(group(ArgGroup::new("target").required(true).args(["chapter_url", "slug"])))]
struct DownloadArgs {
    /// Chapter page to start from
    #[arg(long)]
    chapter_url: Option<String>,

    /// Title slug; downloads every chapter on its index page
    #[arg(long)]
    slug: Option<String>,

    /// Site base URL for --slug (overrides app.site)
    #[arg(long)]
    site: Option<String>,

    /// Output directory overriding the library layout
    #[arg(long)]
    out: Option<PathBuf>,

    /// List pages without downloading
    #[arg(long)]
    dry_run: bool,

    /// Follow N more chapters by incrementing the chapter number
    #[arg(long, default_value_t = 0, requires = "chapter_url")]
    auto_next: usize,

    /// Crawl the whole title of --chapter-url
    #[arg(long, requires = "chapter_url", conflicts_with = "auto_next")]
    all: bool,

    /// Re-download pages that already exist
    #[arg(short, long)]
    force: bool,
}

#[derive(Args, Debug)]
struct AuditArgs {
    /// Title slug
    #[arg(long)]
    slug: String,

    /// Site base URL (overrides app.site)
    #[arg(long)]
    site: Option<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match Config::load_or_default(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("[ERR] {}", e);
            return ExitCode::from(EXIT_FAILURE);
        }
    };

    let guard = match logging::init(&config.app.log_dir, cli.verbose) {
        Ok(guard) => Some(guard),
        Err(e) => {
            eprintln!("[WARN] logging disabled: {}", e);
            None
        }
    };
    if let Some(guard) = &guard {
        info!(log = %guard.path().display(), "renzoku starting");
    }

    let result = match cli.command {
        Command::Download(args) => run_download(args, config).await,
        Command::Audit(args) => run_audit(args, config).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "run failed");
            if guard.is_none() {
                eprintln!("[ERR] {}", e);
            }
            ExitCode::from(EXIT_FAILURE)
        }
    }
}

async fn run_download(args: DownloadArgs, mut config: Config) -> Result<()> {
    if let Some(site) = args.site {
        config.app.site = site;
    }

    let mut builder = RunOptionsBuilder::default();
    builder
        .dry_run(args.dry_run)
        .force(args.force)
        .auto_next(args.auto_next);
    if let Some(out) = args.out {
        builder.out_dir(out);
    }
    let options = builder
        .build()
        .map_err(|e| Error::config(e.to_string()))?;

    let pipeline = Pipeline::new(config, options)?;
    let summary = match (args.chapter_url, args.slug) {
        (Some(url), _) => {
            let start = ChapterUrl::parse(&url)?;
            if args.all {
                pipeline.run_all(&start).await?
            } else {
                pipeline.run_chapter(&start).await?
            }
        }
        (None, Some(slug)) => pipeline.run_slug(&slug).await?,
        (None, None) => return Err(Error::config("--chapter-url or --slug is required")),
    };

    if args.dry_run {
        for chapter in &summary.chapters {
            println!("# {} -> {}", chapter.url, chapter.output_dir.display());
            for page in &chapter.pages {
                println!("{} {}", page.index, page.url);
            }
        }
    }

    if let Some(reason) = &summary.termination {
        info!(%reason, "crawl stopped");
    }
    info!(
        chapters = summary.chapters_processed(),
        saved = summary.pages_saved(),
        skipped = summary.pages_skipped(),
        "done"
    );
    Ok(())
}

async fn run_audit(args: AuditArgs, config: Config) -> Result<()> {
    let site = args.site.unwrap_or_else(|| config.app.site.clone());
    let resolver = ChapterResolver::new(HttpClient::from_config(&config)?);

    let report = audit_title(
        &resolver,
        &site,
        &args.slug,
        &config.app.downloads_dir,
        &config.layout,
    )
    .await?;
    print_audit(&report, &config.layout.volume_prefix);
    Ok(())
}

fn print_audit(report: &AuditReport, volume_prefix: &str) {
    println!("Slug: {}", report.slug);
    println!("Online chapters: {}", report.online_total);
    println!("Local chapters: {}", report.local_total);

    for volume in &report.volumes {
        println!(
            "{}{:02}: online={} {} | local={} {} | missing={} {}",
            volume_prefix,
            volume.major,
            volume.online.len(),
            span(&volume.online),
            volume.local.len(),
            span(&volume.local),
            volume.missing.len(),
            preview(&volume.missing),
        );
    }

    if report.is_complete() {
        println!("All online chapters are present locally.");
    } else {
        println!("Missing locally: {}", report.missing_total());
    }
}

fn span(ids: &[ChapterId]) -> String {
    match (ids.first(), ids.last()) {
        (Some(first), Some(last)) => format!("[{} .. {}]", first.minor_str(), last.minor_str()),
        _ => "[]".to_string(),
    }
}

fn preview(ids: &[ChapterId]) -> String {
    let shown: Vec<&str> = ids
        .iter()
        .take(MISSING_PREVIEW)
        .map(|id| id.minor_str())
        .collect();
    let more = if ids.len() > MISSING_PREVIEW { " ..." } else { "" };
    format!("[{}]{}", shown.join(", "), more)
}
