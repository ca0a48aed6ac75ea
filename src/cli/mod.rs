use std::path::PathBuf;
use anyhow::Context;
use clap::{Parser, Subcommand};
use log::{info, LevelFilter};
use crate::client::TagmarkClient;
use crate::config;
use crate::config::AppConfig;
use crate::library::default_registry;
use crate::storage::FileStorage;

#[derive(Parser, Debug)]
#[command(name = "tagmark", version, about = "Bookmark and tag books and quotes from your browser")]
pub struct Cli {
    #[arg(long, global = true, env = "TAGMARK_CONFIG", help = "Path to the config file [default: ~/.tagmark/config.json]")]
    pub config: Option<PathBuf>,

    #[arg(long, global = true, env = "TAGMARK_WORKDIR", help = "Directory holding the database file")]
    pub workdir: Option<String>,

    #[arg(long, global = true, env = "TAGMARK_LOG_LEVEL", default_value = "info", help = "Log level: off, error, warn, info, debug, trace")]
    pub log_level: LevelFilter,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start the web server
    Serve {
        #[arg(long, env = "TAGMARK_PORT", help = "Port to listen on [default: a random free port]")]
        port: Option<u16>,
    },
    /// Manage user accounts
    User {
        #[command(subcommand)]
        command: UserCommand,
    },
    /// Fill an empty database with demo readers, books and quotes
    Seed,
    /// Read or change persisted settings (keys: work-dir, port, login-url)
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[derive(Subcommand, Debug)]
pub enum UserCommand {
    Add {
        username: String,
        password: String,
        #[arg(long, default_value = "")]
        first_name: String,
        #[arg(long, default_value = "")]
        last_name: String,
    },
    Remove {
        username: String,
    },
    List,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    Get { key: String },
    Set { key: String, value: String },
}

pub async fn open_client(config: &AppConfig) -> anyhow::Result<TagmarkClient> {
    let storage = FileStorage::new(config.db_path.clone())?;
    let mut client = TagmarkClient::new(storage, default_registry());
    client.init().await.context("failed to load database")?;
    Ok(client)
}

pub async fn add_user(config: &AppConfig, username: &str, password: &str, first_name: &str, last_name: &str) -> anyhow::Result<()> {
    let mut client = open_client(config).await?;
    let user = client.create_user(username, password, first_name, last_name).await?;
    println!("User created: {} (id {})", user, user.id);
    Ok(())
}

pub async fn remove_user(config: &AppConfig, username: &str) -> anyhow::Result<()> {
    let mut client = open_client(config).await?;
    let user = client.delete_user(username).await?;
    println!("User removed: {}", user);
    Ok(())
}

pub async fn list_users(config: &AppConfig) -> anyhow::Result<()> {
    let client = open_client(config).await?;
    for user in client.get_all_users() {
        println!("{}\t{}\t{}", user.id, user.username, user.full_name());
    }
    Ok(())
}

const DEMO_PASSWORD: &str = "tagmark";

/// Creates two readers, a few books and quotes. Does nothing when users already exist.
pub async fn seed(client: &mut TagmarkClient) -> anyhow::Result<bool> {
    if !client.get_all_users().is_empty() {
        return Ok(false);
    }
    let juan = client.create_user("juan", DEMO_PASSWORD, "Juan", "Cruz").await?;
    client.create_user("maria", DEMO_PASSWORD, "Maria", "Clara").await?;

    let dune = client.create_book(juan.id, "Dune", Some("A stark desert planet and the spice everyone wants.")).await?;
    client.create_quote(dune.id, "Fear is the mind-killer.").await?;
    client.create_quote(dune.id, "The mystery of life isn't a problem to solve, but a reality to experience.").await?;

    let foundation = client.create_book(juan.id, "Foundation", None).await?;
    client.create_quote(foundation.id, "Violence is the last refuge of the incompetent.").await?;

    client.create_book(juan.id, "Neuromancer", Some("The sky above the port was the color of television.")).await?;
    info!("demo data created");
    Ok(true)
}

pub async fn seed_demo(config: &AppConfig) -> anyhow::Result<()> {
    let mut client = open_client(config).await?;
    if seed(&mut client).await? {
        println!("Demo data created. Log in as juan or maria with password '{}'.", DEMO_PASSWORD);
    } else {
        println!("Database already has users, nothing to seed.");
    }
    Ok(())
}

pub fn get_config_value(config: &AppConfig, key: &str) -> anyhow::Result<String> {
    let value = match key {
        "work-dir" => format!("{:?}", config.file_config.workdir),
        "port" => format!("{:?}", config.file_config.port),
        "login-url" => format!("{:?}", config.file_config.login_url),
        _ => anyhow::bail!("Invalid key: {}", key),
    };
    Ok(value)
}

pub fn set_config_value(mut config: AppConfig, key: &str, value: &str) -> anyhow::Result<()> {
    match key {
        "work-dir" => {
            let path = PathBuf::from(value);
            if !path.is_dir() {
                anyhow::bail!("Path does not exist or is not a directory: {:?}", path);
            }
            config.file_config.workdir = Some(path.display().to_string());
        },
        "port" => {
            let port = value.parse::<u16>().with_context(|| format!("Invalid port: {}", value))?;
            config.file_config.port = Some(port);
        },
        "login-url" => {
            if !value.starts_with('/') {
                anyhow::bail!("Login URL must be a local path starting with '/': {}", value);
            }
            config.file_config.login_url = Some(value.to_string());
        },
        _ => anyhow::bail!("Invalid key: {}", key),
    }
    config::write_file_config(&config.config_path, &config.file_config)?;
    Ok(())
}
