//! CLI issuing one replicated mutation

use clap::{Parser, Subcommand};
use rwcache::{Client, Config, Item, Verb};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "rwcache")]
#[command(about = "Replicate memcached writes to every server")]
#[command(version)]
struct Cli {
    /// Config file (TOML)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Servers (comma-separated host:port), overrides the config file
    #[arg(long, value_delimiter = ',')]
    servers: Vec<String>,

    /// Dial and I/O timeout in milliseconds
    #[arg(long)]
    timeout_ms: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Store a value on every server
    Set {
        key: String,
        value: String,

        /// Expiration in seconds
        #[arg(long, default_value = "0")]
        exptime: i32,

        #[arg(long, default_value = "0")]
        flags: u32,
    },

    /// Store a value only where the key is absent
    Add {
        key: String,
        value: String,

        #[arg(long, default_value = "0")]
        exptime: i32,

        #[arg(long, default_value = "0")]
        flags: u32,
    },

    /// Compare-and-swap with a token from a previous get
    Cas {
        key: String,
        value: String,

        #[arg(long)]
        token: u64,

        #[arg(long, default_value = "0")]
        exptime: i32,
    },

    /// Delete a key from every server
    Delete { key: String },

    /// Increment a counter
    Incr {
        key: String,
        #[arg(default_value = "1")]
        delta: u64,
    },

    /// Decrement a counter
    Decr {
        key: String,
        #[arg(default_value = "1")]
        delta: u64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load config from file, then override with CLI arguments
    let mut config = Config::load_from(cli.config.as_deref())?;
    if !cli.servers.is_empty() {
        config.servers = cli.servers;
    }
    if let Some(timeout_ms) = cli.timeout_ms {
        config.timeout_ms = timeout_ms;
    }

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.log_level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let client = Client::from_config(&config)?;

    match cli.command {
        Commands::Set {
            key,
            value,
            exptime,
            flags,
        } => {
            client
                .set(Item::new(key, value).with_expiration(exptime).with_flags(flags))
                .await?;
            println!("STORED");
        }

        Commands::Add {
            key,
            value,
            exptime,
            flags,
        } => {
            client
                .add(Item::new(key, value).with_expiration(exptime).with_flags(flags))
                .await?;
            println!("STORED");
        }

        Commands::Cas {
            key,
            value,
            token,
            exptime,
        } => {
            client
                .compare_and_swap(Item::new(key, value).with_cas(token).with_expiration(exptime))
                .await?;
            println!("STORED");
        }

        Commands::Delete { key } => {
            client.delete(&key).await?;
            println!("DELETED");
        }

        Commands::Incr { key, delta } => {
            println!("{}", client.increment_or_decrement(Verb::Incr, &key, delta).await?);
        }

        Commands::Decr { key, delta } => {
            println!("{}", client.increment_or_decrement(Verb::Decr, &key, delta).await?);
        }
    }

    Ok(())
}
