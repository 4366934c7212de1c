//! Vidcast CLI: upload a video file and publish it.
//!
//! Set VIDCAST_API_URL (or API_URL). Block size and the local size limit come
//! from UPLOAD_BLOCK_SIZE_BYTES and MAX_FILE_SIZE_BYTES.

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use vidcast_api_client::{ApiClient, ChunkUploader, UploaderConfig};
use vidcast_cli::{format_bytes, init_tracing, percent};

#[derive(Parser)]
#[command(name = "vidcast", about = "Vidcast upload CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Upload a video in blocks, then publish it and print the locators
    Upload {
        /// Path to the video file
        file: std::path::PathBuf,
        /// Block size in bytes (overrides UPLOAD_BLOCK_SIZE_BYTES)
        #[arg(long)]
        block_size: Option<u64>,
    },
    /// Register an upload and print its signed upload URL
    Register {
        /// File name including its extension
        file_name: String,
    },
    /// Publish an already committed upload
    Publish {
        /// Asset id returned by `register`
        asset_id: String,
        /// File name the upload was committed under
        file_name: String,
    },
}

fn print_json(value: &impl Serialize) -> anyhow::Result<()> {
    let out = serde_json::to_string_pretty(value).context("Serialize response")?;
    println!("{}", out);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    dotenvy::dotenv().ok();

    let client = ApiClient::from_env()
        .context("Failed to create API client. Set VIDCAST_API_URL (or API_URL)")?;

    let cli = Cli::parse();

    match cli.command {
        Commands::Upload { file, block_size } => {
            let mut config = UploaderConfig::from_env()?;
            if let Some(block_size) = block_size {
                anyhow::ensure!(block_size > 0, "--block-size must be greater than 0");
                config.block_size = block_size;
            }

            let last_percent = AtomicU64::new(u64::MAX);
            let uploader =
                ChunkUploader::new(client.client().clone(), config).with_progress(move |done, total| {
                    let pct = percent(done, total);
                    if last_percent.swap(pct, Ordering::Relaxed) != pct {
                        tracing::info!(
                            "Uploaded {} of {} ({}%)",
                            format_bytes(done),
                            format_bytes(total),
                            pct
                        );
                    }
                });

            let outcome = client.upload_video(&file, &uploader).await?;
            print_json(&outcome)?;
        }
        Commands::Register { file_name } => {
            let response = client.create_asset(&file_name).await?;
            print_json(&response)?;
        }
        Commands::Publish {
            asset_id,
            file_name,
        } => {
            let response = client.publish(&asset_id, &file_name).await?;
            print_json(&response)?;
        }
    }

    Ok(())
}
