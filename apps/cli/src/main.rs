//! panbridge command-line entry point.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::Context;
use clap::{Parser, Subcommand};
use panbridge_driver::{DriverConfig, PanDriver, RemoteObject, StreamSource};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "panbridge")]
#[command(about = "Manage files on the remote storage provider", long_about = None)]
struct Cli {
    /// Configuration file (default: $XDG_CONFIG_HOME/panbridge/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List a folder
    Ls {
        /// Folder id (default: the configured root)
        folder: Option<String>,
    },

    /// Upload a local file, resuming a previous attempt if possible
    Put {
        /// Local file to upload
        file: PathBuf,

        /// Destination folder id (default: the configured root)
        #[arg(long)]
        folder: Option<String>,

        /// Offer the file's hash first and skip the transfer if the
        /// provider already holds it
        #[arg(long)]
        instant: bool,
    },

    /// Print the download URL of a file
    Link {
        /// File id
        id: String,
    },

    /// Create a folder
    Mkdir {
        name: String,

        /// Parent folder id (default: the configured root)
        #[arg(long)]
        parent: Option<String>,
    },

    /// Rename a file or folder
    Rename {
        id: String,
        new_name: String,

        /// The object is a folder
        #[arg(long)]
        dir: bool,
    },

    /// Move a file or folder into another folder
    Mv {
        id: String,
        /// Destination folder id
        target: String,

        /// The object is a folder
        #[arg(long)]
        dir: bool,
    },

    /// Delete a file or folder
    Rm {
        id: String,

        /// The object is a folder
        #[arg(long)]
        dir: bool,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut config =
        DriverConfig::load(cli.config.as_deref()).context("failed to load configuration")?;
    if let Commands::Put { instant: true, .. } = cli.command {
        config.upload.instant_upload = true;
    }

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(run(config, cli.command))
}

async fn run(config: DriverConfig, command: Commands) -> anyhow::Result<()> {
    let cancel = CancellationToken::new();
    let driver = PanDriver::new(config)?.with_cancel(cancel.clone());

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupted, cancelling");
            cancel.cancel();
        }
    });

    let root = driver.root_folder_id().to_string();
    match command {
        Commands::Ls { folder } => {
            for obj in driver.list(folder.as_deref().unwrap_or(&root)).await? {
                print_object(&obj);
            }
        }
        Commands::Put { file, folder, .. } => {
            let source = StreamSource::open(&file)
                .await
                .with_context(|| format!("cannot read {}", file.display()))?;
            let last = AtomicU64::new(0);
            let progress = |percent: f64| {
                let whole = percent.floor() as u64;
                if last.fetch_max(whole, Ordering::Relaxed) < whole {
                    tracing::info!(percent = whole, "upload progress");
                }
            };
            match driver
                .put(folder.as_deref().unwrap_or(&root), source, &progress)
                .await?
            {
                Some(obj) => print_object(&obj),
                None => println!("uploaded {}", file.display()),
            }
        }
        Commands::Link { id } => {
            println!("{}", driver.link(&RemoteObject::reference(id, false)).await?);
        }
        Commands::Mkdir { name, parent } => {
            let dir = driver
                .make_dir(parent.as_deref().unwrap_or(&root), &name)
                .await?;
            print_object(&dir);
        }
        Commands::Rename { id, new_name, dir } => {
            let obj = driver
                .rename(&RemoteObject::reference(id, dir), &new_name)
                .await?;
            print_object(&obj);
        }
        Commands::Mv { id, target, dir } => {
            driver
                .move_to(&RemoteObject::reference(id, dir), &target)
                .await?;
        }
        Commands::Rm { id, dir } => {
            driver.remove(&RemoteObject::reference(id, dir)).await?;
        }
    }
    Ok(())
}

fn print_object(obj: &RemoteObject) {
    let kind = if obj.is_dir { "d" } else { "-" };
    let modified = obj
        .modified
        .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "-".into());
    println!("{kind} {:>12} {:>16} {:<10} {}", obj.size, modified, obj.id, obj.name);
}
