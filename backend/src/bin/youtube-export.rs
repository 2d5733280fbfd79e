//! Exports a YouTube channel's playlists as JSON `Playlist` documents.

use anyhow::{Context, Result};
use backend::config::{init_logger, load_environment, EXPORT_COMPONENT};
use backend::services::youtube::YoutubeClient;
use clap::Parser;
use log::info;
use std::fs;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(about = "Export a YouTube channel's playlists as playlist documents")]
struct Args {
    #[arg(help = "YouTube channel id, e.g. UC...")]
    channel_id: String,

    #[arg(long, env = "YOUTUBE_API_KEY", hide_env_values = true, help = "YouTube Data API v3 key")]
    api_key: String,

    #[arg(short, long, help = "Write to this file instead of stdout")]
    output: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    load_environment();
    let args = Args::parse();
    init_logger(EXPORT_COMPONENT);
    info!("Exporting playlists of channel {}", args.channel_id);

    let client = YoutubeClient::new(args.api_key);
    let playlists = client.export_channel(&args.channel_id).await?;
    let json = serde_json::to_string_pretty(&playlists)?;

    match args.output {
        Some(path) => {
            fs::write(&path, json).with_context(|| format!("writing {}", path.display()))?;
            info!("Wrote {} playlists to {}", playlists.len(), path.display());
        }
        None => println!("{json}"),
    }
    Ok(())
}
