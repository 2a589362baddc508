use anyhow::{anyhow, Context, Result};
use chrono::{Local, TimeZone};
use clap::{ArgAction, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, info, warn};
use simplelog::{ConfigBuilder, LevelFilter, WriteLogger};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tag_core::{
    Resolution, SimilarityPolicy, SqliteTagStore, TagError, TagKind, TagMergeRecord, TagNode,
    TagService, TagStore,
};

mod cluster;
mod report;

use cluster::TagCluster;

const DEFAULT_DB: &str = "data/tags.sqlite3";
const DEFAULT_REPORT: &str = "output/tag_clusters.csv";
const DEFAULT_LOG: &str = "logs/tag-cleanup.log";

#[derive(Parser, Debug)]
#[command(
    name = "tag-cleanup",
    version,
    about = "Find, merge and undo duplicate photo tags"
)]
struct Cli {
    /// Tag database (SQLite), created if missing.
    #[arg(long, global = true, default_value = DEFAULT_DB)]
    db: PathBuf,

    /// JSON file overriding the similarity thresholds.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Dry-run mode: print what would change without writing.
    #[arg(long, global = true, action = ArgAction::SetTrue)]
    dry_run: bool,

    /// Debug logs, written to logs/tag-cleanup.log unless --log-file is given.
    #[arg(long, global = true, action = ArgAction::SetTrue)]
    debug: bool,

    /// Explicit log file path (enables file logging). Ignored if empty.
    #[arg(long, global = true, default_value = "")]
    log_file: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Load `item_id,tag,kind` rows into the database.
    Import {
        #[arg(long = "csv")]
        csv_path: PathBuf,
    },
    /// Group similar tags and write the clusters to a CSV report.
    Scan {
        #[arg(long = "csv", default_value = DEFAULT_REPORT)]
        csv_path: PathBuf,
    },
    /// Merge every cluster into its most used tag.
    AutoMerge,
    /// Merge the given source tags into a target tag.
    Merge {
        #[arg(long)]
        target: String,
        #[arg(required = true)]
        sources: Vec<String>,
    },
    /// Manage alternative names.
    Alias {
        #[command(subcommand)]
        action: AliasCommand,
    },
    /// Show which tag a free-form name maps to.
    Resolve { name: String },
    /// List merges that can still be undone, newest first.
    History {
        /// Only merges after this Unix time in milliseconds.
        #[arg(long, default_value_t = 0)]
        since: i64,
    },
    /// Restore the source tag of a merge.
    Undo { merge_id: String },
    /// Print the tag hierarchy.
    Tree,
}

#[derive(Subcommand, Debug)]
enum AliasCommand {
    Add { alias: String, target: String },
    Get { alias: String },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli);
    run(cli)
}

fn init_console_logger() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
}

// A file logger with --debug or --log-file (debug level only with --debug),
// env_logger on stderr otherwise.
fn init_logging(cli: &Cli) {
    if !cli.debug && cli.log_file.is_empty() {
        init_console_logger();
        return;
    }
    let log_path = if cli.log_file.is_empty() {
        PathBuf::from(DEFAULT_LOG)
    } else {
        PathBuf::from(&cli.log_file)
    };
    if let Some(parent) = log_path.parent() {
        let _ = fs::create_dir_all(parent);
    }
    let file = match fs::File::create(&log_path) {
        Ok(file) => file,
        Err(e) => {
            eprintln!("cannot create log file {:?} ({e}), logging to stderr", log_path);
            init_console_logger();
            return;
        }
    };
    let level = if cli.debug { LevelFilter::Debug } else { LevelFilter::Info };
    let cfg = ConfigBuilder::new()
        .set_time_format_rfc3339()
        .set_target_level(LevelFilter::Off)
        .build();
    match WriteLogger::init(level, cfg, file) {
        Ok(()) => eprintln!("writing {} log to {:?}", level, log_path),
        Err(e) => eprintln!("file logger init failed: {e}"),
    }
}

fn load_policy(path: Option<&Path>) -> Result<SimilarityPolicy> {
    let Some(path) = path else {
        return Ok(SimilarityPolicy::default());
    };
    let text = fs::read_to_string(path).with_context(|| format!("reading config {:?}", path))?;
    let policy: SimilarityPolicy =
        serde_json::from_str(&text).with_context(|| format!("parsing config {:?}", path))?;
    debug!("similarity policy: {:?}", policy);
    Ok(policy)
}

fn open_service(cli: &Cli) -> Result<TagService<SqliteTagStore>> {
    let policy = load_policy(cli.config.as_deref())?;
    if let Some(parent) = cli.db.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let store = SqliteTagStore::open(&cli.db)
        .with_context(|| format!("opening tag database {:?}", cli.db))?;
    Ok(TagService::with_policy(store, policy))
}

fn run(cli: Cli) -> Result<()> {
    let mut service = open_service(&cli)?;
    let dry_run = cli.dry_run;
    match &cli.command {
        Command::Import { csv_path } => import(&mut service, csv_path, dry_run),
        Command::Scan { csv_path } => {
            let clusters = find_clusters(&service)?;
            report::write_cluster_csv(csv_path, &clusters)?;
            println!(
                "{} clusters found. CSV written to {:?}.",
                clusters.len(),
                csv_path
            );
            Ok(())
        }
        Command::AutoMerge => auto_merge(&mut service, dry_run),
        Command::Merge { target, sources } => {
            if dry_run {
                for source in planned_sources(&service, target, sources)? {
                    println!("[DRY-RUN] merge {} -> {}", source, target);
                }
                return Ok(());
            }
            let records = service.merge_tags(target, sources)?;
            for record in &records {
                print_record(record);
            }
            Ok(())
        }
        Command::Alias { action } => match action {
            AliasCommand::Add { alias, target } => {
                if dry_run {
                    println!("[DRY-RUN] alias {} -> {}", alias, target);
                    return Ok(());
                }
                service.create_alias(alias, target)?;
                println!("{} -> {}", alias.to_lowercase(), target);
                Ok(())
            }
            AliasCommand::Get { alias } => {
                match service.get_tag_by_alias(alias)? {
                    Some(id) => println!("{}", id),
                    None => println!("No tag for alias {:?}.", alias),
                }
                Ok(())
            }
        },
        Command::Resolve { name } => {
            match service.resolve(name)? {
                Some(resolution) => {
                    let how = match &resolution {
                        Resolution::Alias(_) => "alias",
                        Resolution::Exact(_) => "exact",
                        Resolution::Similar(_) => "similar",
                    };
                    println!("{} ({})", resolution.tag_id(), how);
                }
                None => println!("No tag matches {:?}.", name),
            }
            Ok(())
        }
        Command::History { since } => {
            let records = service.undoable_merges(*since)?;
            if records.is_empty() {
                println!("No undoable merges.");
            }
            for record in &records {
                print_record(record);
            }
            Ok(())
        }
        Command::Undo { merge_id } => {
            if dry_run {
                println!("[DRY-RUN] undo {}", merge_id);
                return Ok(());
            }
            service.undo_merge(merge_id)?;
            println!("Undone {}.", merge_id);
            Ok(())
        }
        Command::Tree => {
            let tree = service.tag_tree()?;
            print_tree(&tree, 0);
            Ok(())
        }
    }
}

fn import(service: &mut TagService<SqliteTagStore>, path: &Path, dry_run: bool) -> Result<()> {
    let rows = report::read_import_rows(path)?;
    println!(
        "Importing {} rows {}from {:?}",
        rows.len(),
        if dry_run { "(dry-run) " } else { "" },
        path
    );
    if dry_run {
        return Ok(());
    }
    let mut imported = 0usize;
    for row in rows {
        let kind = match row.kind.as_deref().filter(|kind| !kind.is_empty()) {
            None => TagKind::Manual,
            Some(kind) => match kind.parse::<TagKind>() {
                Ok(kind) => kind,
                Err(e) => {
                    warn!("{}: skipping tag {:?}: {}", row.item_id, row.tag, e);
                    continue;
                }
            },
        };
        let tag_id = service.get_or_create_tag(&row.tag, kind, None)?;
        service.store_mut().add_tag_to_item(&row.item_id, &tag_id)?;
        imported += 1;
    }
    info!("imported {} item tags", imported);
    println!("Done. {} item tags imported.", imported);
    Ok(())
}

/// Sources `merge_tags` would fold into `target`, checked the same way:
/// unknown ids fail, the target and repeats are skipped.
fn planned_sources<'a, S: TagStore>(
    service: &TagService<S>,
    target: &str,
    sources: &'a [String],
) -> Result<Vec<&'a str>> {
    if service.store().tag(target)?.is_none() {
        return Err(TagError::TagNotFound(target.to_string()).into());
    }
    let mut planned: Vec<&str> = Vec::new();
    for source in sources {
        if source == target || planned.contains(&source.as_str()) {
            continue;
        }
        if service.store().tag(source)?.is_none() {
            return Err(TagError::TagNotFound(source.clone()).into());
        }
        planned.push(source.as_str());
    }
    Ok(planned)
}

fn find_clusters(service: &TagService<SqliteTagStore>) -> Result<Vec<TagCluster>> {
    let tags = service.store().tags()?;
    let mut usage = HashMap::with_capacity(tags.len());
    for tag in &tags {
        usage.insert(tag.id.clone(), service.store().items_with_tag(&tag.id)?.len());
    }
    let pb = ProgressBar::new(tags.len() as u64);
    pb.set_style(
        ProgressStyle::with_template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}")
            .map_err(|e| anyhow!("progress template: {e}"))?,
    );
    pb.set_message("comparing tags");
    let clusters = cluster::cluster_tags(&tags, &usage, service.policy(), &pb);
    pb.finish_and_clear();
    debug!("{} tags, {} clusters", tags.len(), clusters.len());
    Ok(clusters)
}

fn auto_merge(service: &mut TagService<SqliteTagStore>, dry_run: bool) -> Result<()> {
    let clusters = find_clusters(service)?;
    if clusters.is_empty() {
        println!("No similar tags detected.");
        return Ok(());
    }
    let mut merged = 0usize;
    for cluster in &clusters {
        let target = cluster.target();
        let sources: Vec<&str> = cluster.sources().map(|m| m.tag.id.as_str()).collect();
        for member in cluster.sources() {
            println!(
                "{}merge {:?} ({}) -> {:?} ({})",
                if dry_run { "[DRY-RUN] " } else { "" },
                member.tag.name,
                member.tag.id,
                target.tag.name,
                target.tag.id
            );
        }
        if dry_run {
            continue;
        }
        merged += service.merge_tags(&target.tag.id, &sources)?.len();
    }
    if !dry_run {
        println!("Done. {} tags merged in {} clusters.", merged, clusters.len());
    }
    Ok(())
}

fn print_record(record: &TagMergeRecord) {
    let when = Local
        .timestamp_millis_opt(record.merged_at)
        .single()
        .map(|at| at.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| record.merged_at.to_string());
    println!(
        "{}  {}  {:?} ({}) -> {}",
        record.id, when, record.source_tag_name, record.source_tag_id, record.target_tag_id
    );
}

fn print_tree(nodes: &[TagNode], depth: usize) {
    for node in nodes {
        println!("{}{} [{}]", "  ".repeat(depth), node.tag.name, node.tag.id);
        print_tree(&node.children, depth + 1);
    }
}
