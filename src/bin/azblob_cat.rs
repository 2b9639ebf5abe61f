//! Print the blobs matching a glob, or stream a byte range of one blob.
//!
//! ```text
//! azblob-cat 'az://logs/2024/**/*.csv' --settings azure.json
//! azblob-cat az://logs/2024/01/a.csv --offset 100 --length 64
//! ```

use std::path::PathBuf;

use anyhow::{Context, Result};
use azblobfs::services::blob::{ACCOUNT_NAME_SETTING, BUFFER_SIZE_SETTING, glob};
use azblobfs::{AzureBlobFileSystem, AzureParsedUrl, FileOpener, OpenFlags, SettingsFileOpener};
use clap::Parser;
use tokio::io::AsyncWriteExt;
use tracing_subscriber::EnvFilter;

const CHUNK_SIZE: usize = 64 * 1024;

#[derive(Parser, Debug)]
#[command(name = "azblob-cat", about = "Read blobs through the Azure blob file system")]
struct Args {
    /// `azure://` or `az://` path, may contain wildcards
    path: String,

    /// JSON file with settings, e.g. azure_account_name or azure_read_buffer_size
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Storage account for short `az://container/key` paths
    #[arg(long)]
    account_name: Option<String>,

    /// Read-ahead buffer size in bytes
    #[arg(long)]
    buffer_size: Option<usize>,

    /// First byte to print
    #[arg(long, default_value_t = 0)]
    offset: u64,

    /// Number of bytes to print, defaults to the rest of the blob
    #[arg(long)]
    length: Option<u64>,

    /// Only check whether the blob exists
    #[arg(long)]
    exists: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let mut opener = match &args.settings {
        Some(path) => SettingsFileOpener::from_json_file(path)?,
        None => SettingsFileOpener::new(),
    };
    if let Some(account) = &args.account_name {
        opener.set(ACCOUNT_NAME_SETTING, account.as_str());
    }
    if let Some(buffer_size) = args.buffer_size {
        opener.set(BUFFER_SIZE_SETTING, buffer_size);
    }

    let fs = AzureBlobFileSystem::default();
    let parsed = AzureParsedUrl::parse(&args.path)?;

    if args.exists {
        let exists = fs.file_exists(&args.path, Some(&opener)).await;
        println!("{}", exists);
        return Ok(());
    }

    if glob::shared_prefix(&parsed.path).is_some() {
        for path in fs.glob(&args.path, Some(&opener)).await? {
            println!("{}", path);
        }
    } else {
        cat(&fs, &opener, &args).await?;
    }

    if let Some(context) = opener.client_context() {
        context.query_end().await;
    }

    Ok(())
}

async fn cat(fs: &AzureBlobFileSystem, opener: &SettingsFileOpener, args: &Args) -> Result<()> {
    let mut handle = fs
        .open_file(&args.path, OpenFlags::READ, Some(opener))
        .await
        .with_context(|| format!("Failed to open {}", args.path))?;

    let size = fs.file_size(&handle);
    let end = match args.length {
        Some(length) => args.offset.saturating_add(length).min(size),
        None => size,
    };
    tracing::info!(
        "Reading bytes {}..{} of {} (last modified {:?})",
        args.offset,
        end,
        args.path,
        fs.last_modified_time(&handle)
    );

    fs.seek(&mut handle, args.offset);
    let mut stdout = tokio::io::stdout();
    let mut buf = vec![0u8; CHUNK_SIZE];

    while fs.seek_position(&handle) < end {
        let want = (end - fs.seek_position(&handle)).min(CHUNK_SIZE as u64) as usize;
        let n = fs.read(&mut handle, &mut buf[..want]).await?;
        if n == 0 {
            break;
        }
        stdout.write_all(&buf[..n]).await?;
    }
    stdout.flush().await?;

    Ok(())
}
