//! `loopin`: command-line client for the Loop.in campus feed.
//!
//! Lists the feed, shows threaded comments, reacts, replies and deletes
//! against a running server.

mod commands;
mod config;

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use loopin_feed::PostKind;

use commands::comments::TargetKind;

/// Loop.in CLI tool.
#[derive(Parser, Debug)]
#[command(name = "loopin", about = "Loop.in campus feed client")]
struct Cli {
    /// Path to client config file (default: ~/.loopin/config.toml).
    #[arg(long = "config", global = true)]
    config: Option<String>,

    /// Server URL; overrides LOOPIN_SERVER and the config file.
    #[arg(long = "server", global = true)]
    server: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List the feed, newest first.
    Posts {
        /// Show at most this many posts.
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Show a post with its comment tree.
    Show { post: u64 },

    /// Create a post.
    Create {
        #[arg(long)]
        title: String,
        #[arg(long)]
        content: String,
        #[arg(long, default_value = loopin_feed::model::DEFAULT_DEPARTMENT)]
        department: String,
        #[arg(long = "type", value_enum, default_value_t = KindArg::Discussion)]
        kind: KindArg,
        /// Comma-separated tags.
        #[arg(long)]
        tags: Option<String>,
    },

    /// Comment on a post, or reply to a comment with --parent.
    Reply {
        post: u64,
        content: String,
        /// Comment to reply to.
        #[arg(long)]
        parent: Option<u64>,
    },

    /// Toggle a reaction on a post or comment.
    React {
        #[arg(value_enum)]
        target: TargetArg,
        id: u64,
        emoji: String,
        /// Post that owns the comment (comment targets only).
        #[arg(long)]
        post: Option<u64>,
    },

    /// Delete one of your posts.
    Delete {
        post: u64,
        /// Skip confirmation.
        #[arg(long = "yes", short = 'y')]
        yes: bool,
    },

    /// Store a bearer token in the config file.
    Login {
        #[arg(long)]
        token: String,
    },

    /// Clear the stored token.
    Logout,

    /// Show the signed-in user.
    Whoami,

    /// Show version.
    Version,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum TargetArg {
    Post,
    Comment,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum KindArg {
    Discussion,
    Question,
    Announcement,
}

impl From<KindArg> for PostKind {
    fn from(k: KindArg) -> Self {
        match k {
            KindArg::Discussion => PostKind::Discussion,
            KindArg::Question => PostKind::Question,
            KindArg::Announcement => PostKind::Announcement,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config_path = cli
        .config
        .map(PathBuf::from)
        .unwrap_or_else(config::ClientConfig::default_path);
    let server = cli.server.as_deref();

    match cli.command {
        Commands::Posts { limit } => {
            commands::posts::list(&config_path, server, limit).await?;
        }

        Commands::Show { post } => {
            commands::posts::show(&config_path, server, post).await?;
        }

        Commands::Create {
            title,
            content,
            department,
            kind,
            tags,
        } => {
            let new = commands::posts::NewPost {
                title,
                content,
                department,
                kind: kind.into(),
                tags,
            };
            commands::posts::create(&config_path, server, new).await?;
        }

        Commands::Reply {
            post,
            content,
            parent,
        } => {
            commands::comments::reply(&config_path, server, post, parent, &content).await?;
        }

        Commands::React {
            target,
            id,
            emoji,
            post,
        } => {
            let kind = match target {
                TargetArg::Post => TargetKind::Post,
                TargetArg::Comment => TargetKind::Comment,
            };
            commands::comments::react(&config_path, server, kind, id, post, &emoji).await?;
        }

        Commands::Delete { post, yes } => {
            if !yes {
                eprint!("Delete post #{}? [y/N]: ", post);
                let mut s = String::new();
                std::io::stdin().read_line(&mut s)?;
                if !s.trim().eq_ignore_ascii_case("y") {
                    println!("Cancelled.");
                    return Ok(());
                }
            }
            commands::posts::delete(&config_path, server, post).await?;
        }

        Commands::Login { token } => {
            commands::account::save_token(&token, server, &config_path)?;
        }

        Commands::Logout => {
            commands::account::logout(&config_path)?;
        }

        Commands::Whoami => {
            commands::account::whoami(&config_path, server).await?;
        }

        Commands::Version => {
            println!("loopin cli v{}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
