//! `dagkit`: chunk files into content-addressed DAGs, fetch and export them,
//! and sync directory snapshots over a content-addressed object store.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use dagkit::facade::{self, SyncSsOptions};
use dagkit::{Cid, LocalBlockSource, MemoryBlockStore, NodeConfig, ProgressReporter};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "dagkit", version, about = "Content-addressed DAG object store")]
struct Cli {
    /// Path to a JSON node config file; falls back to built-in defaults.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Chunk a file into a balanced DAG and print its root CID.
    Add { path: PathBuf },

    /// Materialize a DAG rooted at `cid` into a file.
    Get { cid: Cid, path: PathBuf },

    /// Local-only DAG queries and transfer.
    #[command(subcommand)]
    Dag(DagCommand),

    /// Sync a directory snapshot object.
    Syncss {
        snapshot_cid: Cid,
        target_dir: PathBuf,
        #[arg(long)]
        only_dag: bool,
        #[arg(long)]
        only_check: bool,
        #[arg(long)]
        save_snapshot: bool,
        /// Read the snapshot's `PATH,CID,SIZE` lines from this local file
        /// instead of fetching `snapshot_cid` over the store.
        #[arg(long = "file-list")]
        file_list: Option<PathBuf>,
        #[arg(long)]
        sssize: Option<u64>,
    },
}

#[derive(Subcommand)]
enum DagCommand {
    /// Check whether a block is present in the local store.
    Has { cid: Cid },
    /// Report shape (size, links) for a block, fetched under a deadline.
    Stat {
        cid: Cid,
        #[arg(long, default_value_t = 30)]
        timeout: u64,
    },
    /// Walk and fetch every block reachable from the given roots.
    Sync {
        roots: Vec<Cid>,
        #[arg(short, long)]
        concurrency: Option<usize>,
        /// Read additional roots from a file, one CID per line.
        #[arg(short = 'f', long = "file-list")]
        file_list: Option<PathBuf>,
    },
    /// Export a DAG as a CAR archive.
    Export {
        cid: Cid,
        /// Destination file; if omitted, `--filestore-root` must be given and
        /// the output is written to its nested piece-path location instead.
        path: Option<PathBuf>,
        #[arg(long)]
        pad: bool,
        #[arg(long)]
        batch: Option<usize>,
        /// Write into `piece_path(root, cid)` under this directory instead of
        /// an explicit `path`.
        #[arg(long, conflicts_with = "path")]
        filestore_root: Option<PathBuf>,
        /// Treat the source as network-enabled; otherwise a locally-absent
        /// root or link surfaces as `not-found` rather than a generic error.
        #[arg(long)]
        swarm: bool,
    },
    /// Import one or more CAR archives into the local store.
    Import { paths: Vec<PathBuf> },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => NodeConfig::from_json(&std::fs::read(path)?)?,
        None => NodeConfig::default(),
    };
    // A real deployment would open a persistent, on-disk store here; this
    // binary is a reference harness over the library, so it keeps one
    // process-lifetime in-memory store.
    let store = Arc::new(MemoryBlockStore::new());

    match cli.command {
        Command::Add { path } => {
            let (reporter, mut rx) =
                ProgressReporter::start(config.progress_cadence(), CancellationToken::new());
            let handle = tokio::spawn(async move {
                while rx.changed().await.is_ok() {
                    let event = rx.borrow().clone();
                    if !event.msg.is_empty() {
                        println!("{}", event.msg);
                    }
                }
            });
            let cid = facade::add(&*store, &path, config.chunk_size, &reporter).await?;
            reporter.close();
            handle.abort();
            println!("{cid}");
        }
        Command::Get { cid, path } => {
            let (reporter, _rx) =
                ProgressReporter::start(config.progress_cadence(), CancellationToken::new());
            facade::get(&*store, cid, &path, &reporter).await?;
            reporter.close();
        }
        Command::Dag(DagCommand::Has { cid }) => {
            println!("{}", facade::dag_has(&*store, &cid)?);
        }
        Command::Dag(DagCommand::Stat { cid, timeout }) => {
            let source = LocalBlockSource::new(store.clone());
            let stat = facade::dag_stat(&source, cid, Duration::from_secs(timeout)).await?;
            println!(
                "hash={} cumulativeSize={} blockSize={} numLinks={}",
                stat.hash, stat.cumulative_size, stat.block_size, stat.num_links
            );
        }
        Command::Dag(DagCommand::Sync {
            mut roots,
            concurrency,
            file_list,
        }) => {
            if let Some(list_path) = file_list {
                let text = tokio::fs::read_to_string(&list_path).await?;
                for line in text.lines().filter(|l| !l.trim().is_empty()) {
                    roots.push(line.trim().parse()?);
                }
            }
            let source = Arc::new(LocalBlockSource::new(store.clone()));
            let mut rx = facade::dag_sync(
                store.clone(),
                source,
                roots,
                concurrency.unwrap_or(config.concurrency),
                config.fetch_timeout(),
                CancellationToken::new(),
            );
            while let Some(line) = rx.recv().await {
                println!("{line}");
            }
        }
        Command::Dag(DagCommand::Export {
            cid,
            path,
            pad,
            batch,
            filestore_root,
            swarm,
        }) => {
            let dest = match (path, filestore_root) {
                (Some(path), _) => path,
                (None, Some(root)) => dagkit::piece::piece_path(&root, &cid.to_string()),
                (None, None) => {
                    anyhow::bail!("either a destination path or --filestore-root is required")
                }
            };
            let source = Arc::new(LocalBlockSource::new(store.clone()));
            facade::dag_export(
                source,
                cid,
                &dest,
                pad,
                batch.unwrap_or(config.concurrency),
                swarm,
            )
            .await?;
        }
        Command::Dag(DagCommand::Import { paths }) => {
            for path in paths {
                let roots = facade::dag_import(&*store, &path).await?;
                for root in roots {
                    println!("{root}");
                }
            }
        }
        Command::Syncss {
            snapshot_cid,
            target_dir,
            only_dag,
            only_check,
            save_snapshot,
            file_list,
            sssize,
        } => {
            let source = Arc::new(LocalBlockSource::new(store.clone()));
            let (reporter, mut rx) =
                ProgressReporter::start(config.progress_cadence(), CancellationToken::new());
            let progress_task = tokio::spawn(async move {
                while rx.changed().await.is_ok() {
                    let event = rx.borrow().clone();
                    println!("{}/{}", event.current, event.total);
                }
            });
            let opts = SyncSsOptions {
                only_check,
                only_dag,
                save_snapshot,
                file_list,
                sssize: sssize.unwrap_or(config.sssize),
                concurrency: config.concurrency,
                fetch_timeout: config.fetch_timeout(),
            };
            facade::sync_ss(store, source, snapshot_cid, &target_dir, opts, &reporter).await?;
            reporter.close();
            progress_task.abort();
        }
    }

    Ok(())
}
