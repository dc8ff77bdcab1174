use clap::{Parser, Subcommand};
use eyre::Context;
use std::io::IsTerminal;
use std::path::PathBuf;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;
use youtube_uploader::{Config, PrivacyStatus, VideoMetadata, YouTube};

/// Upload and manage YouTube videos for accounts authorized through Google OAuth.
#[derive(Parser, Debug)]
#[command(name = "youtube-uploader", version)]
struct Cli {
    #[command(flatten)]
    config: Config,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the OAuth consent flow in a browser and store the resulting token
    Authorize {
        #[arg(long)]
        account: String,
    },
    /// Upload a video, optionally with a custom thumbnail
    Upload {
        #[arg(long)]
        account: String,
        /// Video file to upload
        file: PathBuf,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        description: Option<String>,
        /// Keyword tag, may be given more than once
        #[arg(long = "tag")]
        tags: Vec<String>,
        #[arg(long)]
        category_id: Option<String>,
        #[arg(long, value_enum, default_value_t)]
        privacy: PrivacyStatus,
        /// PNG image to set as the video's thumbnail
        #[arg(long)]
        thumbnail: Option<PathBuf>,
    },
    /// Check whether a video exists
    Exists {
        #[arg(long)]
        account: String,
        id: String,
    },
    /// Delete a video
    Delete {
        #[arg(long)]
        account: String,
        id: String,
    },
    /// Show what is known about an account's stored token
    Status {
        #[arg(long)]
        account: String,
    },
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .with_ansi(std::io::stdout().is_terminal())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let yt = YouTube::connect(&cli.config)
        .await
        .context("set up YouTube client")?;

    match cli.command {
        Command::Authorize { account } => {
            let bundle = yt
                .credentials()
                .refresher()
                .authenticate()
                .await
                .context("authorize account")?;
            yt.credentials()
                .save_token(&bundle, &account)
                .await
                .context("store access token")?;
            eprintln!(
                "Authorized {account} (refresh token: {})",
                if bundle.has_refresh_token() { "yes" } else { "no" }
            );
        }
        Command::Upload {
            account,
            file,
            title,
            description,
            tags,
            category_id,
            privacy,
            thumbnail,
        } => {
            let metadata = VideoMetadata {
                title,
                description,
                tags: (!tags.is_empty()).then_some(tags),
                category_id,
            };
            let mut video = yt
                .upload(&file, &metadata, privacy, &account)
                .await
                .with_context(|| format!("upload {}", file.display()))?;
            if let Some(thumbnail) = thumbnail {
                video = yt
                    .with_thumbnail(video, &thumbnail, &account)
                    .await
                    .with_context(|| format!("set thumbnail {}", thumbnail.display()))?;
            }
            println!("{}", serde_json::to_string_pretty(&video)?);
        }
        Command::Exists { account, id } => {
            let exists = yt.exists(&id, &account).await.context("look up video")?;
            println!("{exists}");
            if !exists {
                std::process::exit(1);
            }
        }
        Command::Delete { account, id } => {
            yt.delete(&id, &account).await.context("delete video")?;
            eprintln!("Deleted {id}");
        }
        Command::Status { account } => {
            let has_token = yt.has_token(&account).await?;
            println!("token:         {}", if has_token { "stored" } else { "none" });
            if has_token {
                let refreshable = yt.has_refresh_token(&account).await?;
                let expired = yt.is_access_token_expired(&account).await?;
                println!("refresh token: {}", if refreshable { "yes" } else { "no" });
                println!("access token:  {}", if expired { "expired" } else { "valid" });
            }
        }
    }

    Ok(())
}
