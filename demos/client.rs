use anyhow::Context;
use clap::{Parser, Subcommand};
use log::LevelFilter;
use remotefs::{
    client::{self, RemoteFileSystem},
    config::ClientConfig,
    protocol::FolderDescriptor,
};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "remotefs-client")]
#[command(about = "Talks to a remotefs server", long_about = None)]
struct Args {
    /// Path to a JSON configuration file
    #[arg(short, long, conflicts_with_all = ["addr", "key"])]
    config: Option<PathBuf>,

    /// Server address
    #[arg(short, long, default_value = "127.0.0.1:11000")]
    addr: String,

    /// Security key of the user
    #[arg(short, long, env = "REMOTEFS_KEY", default_value = "")]
    key: String,

    /// Section size for reads and writes
    #[arg(short, long)]
    section_bytes: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the drives
    Drives,
    /// List a folder
    Ls {
        path: String,
        #[arg(short, long)]
        recursive: bool,
    },
    /// Show one file
    Stat { path: String },
    /// Download a file
    Get { remote: String, local: PathBuf },
    /// Upload a file
    Put { local: PathBuf, remote: String },
    /// Delete a file or folder
    Rm { path: String },
    /// Move a file or folder
    Mv { from: String, to: String },
    /// Create a folder
    Mkdir { path: String },
}

fn print_folder(folder: &FolderDescriptor, depth: usize) {
    let indent = "  ".repeat(depth);
    println!("{indent}{}/ ({} bytes)", folder.name, folder.length);

    if let Some(errors) = &folder.errors {
        println!("{indent}  ! {errors:?}");
    }

    for file in &folder.files {
        println!("{indent}  {} ({} bytes)", file.name, file.length);
    }

    for child in &folder.folders {
        print_folder(child, depth + 1);
    }
}

async fn execute(fs: &RemoteFileSystem, command: Command) -> anyhow::Result<()> {
    match command {
        Command::Drives => {
            for drive in fs.get_drives().await? {
                println!("{}\t{}", drive.name, drive.path);
            }
        }
        Command::Ls { path, recursive } => match fs.get_folder(path, true, recursive).await? {
            Some(folder) => print_folder(&folder, 0),
            None => println!("no such folder"),
        },
        Command::Stat { path } => match fs.get_file(path).await? {
            Some(file) => println!("{file:#?}"),
            None => println!("no such file"),
        },
        Command::Get { remote, local } => {
            let data = fs.read(remote).await?;
            tokio::fs::write(&local, &data).await?;
            println!("{} bytes written to {}", data.len(), local.display());
        }
        Command::Put { local, remote } => {
            let file = tokio::fs::File::open(&local)
                .await
                .with_context(|| format!("opening {}", local.display()))?;
            let length = file.metadata().await?.len();
            fs.write_by_section(remote, file, length).await?;
            println!("{length} bytes uploaded");
        }
        Command::Rm { path } => fs.delete_file(path).await?,
        Command::Mv { from, to } => fs.move_file(from, to).await?,
        Command::Mkdir { path } => fs.create_folder(path).await?,
    }

    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::builder()
        .filter_level(LevelFilter::Warn)
        .parse_default_env()
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => ClientConfig::load(path)?,
        None => ClientConfig::new(args.addr, args.key),
    };

    if let Some(section_bytes) = args.section_bytes {
        config.section_bytes = section_bytes;
    }

    let fs = client::connect(&config).await?;
    let result = execute(&fs, args.command).await;
    fs.close()?;

    result
}
