use std::time::SystemTime;
use clap::Parser;
use fern::colors::{Color, ColoredLevelConfig};
use log::{error, LevelFilter};
use tagmark_lib::cli::{self, Cli, Command, ConfigCommand, UserCommand};
use tagmark_lib::config::AppConfig;
use tagmark_lib::web_ui;

fn setup_logging(level: LevelFilter) -> anyhow::Result<()> {
    let colors = ColoredLevelConfig::new()
        .error(Color::Red)
        .warn(Color::Yellow)
        .info(Color::Green)
        .debug(Color::Blue)
        .trace(Color::Magenta);
    fern::Dispatch::new()
        .format(move |out, message, record| {
            out.finish(format_args!(
                "[{} {} {}] {}",
                humantime::format_rfc3339_seconds(SystemTime::now()),
                colors.color(record.level()),
                record.target(),
                message
            ))
        })
        .level(level)
        .level_for("hyper", LevelFilter::Warn)
        .chain(std::io::stderr())
        .apply()?;
    Ok(())
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Command::Serve { port } => {
            let config = AppConfig::new(cli.config, cli.workdir, port)?;
            let client = cli::open_client(&config).await?;
            web_ui::serve(config, client).await
        },
        Command::User { command } => {
            let config = AppConfig::new(cli.config, cli.workdir, None)?;
            match command {
                UserCommand::Add { username, password, first_name, last_name } => {
                    cli::add_user(&config, &username, &password, &first_name, &last_name).await
                },
                UserCommand::Remove { username } => cli::remove_user(&config, &username).await,
                UserCommand::List => cli::list_users(&config).await,
            }
        },
        Command::Seed => {
            let config = AppConfig::new(cli.config, cli.workdir, None)?;
            cli::seed_demo(&config).await
        },
        Command::Config { command } => {
            let config = AppConfig::new(cli.config, cli.workdir, None)?;
            match command {
                ConfigCommand::Get { key } => {
                    println!("{}: {}", key, cli::get_config_value(&config, &key)?);
                    Ok(())
                },
                ConfigCommand::Set { key, value } => {
                    cli::set_config_value(config, &key, &value)?;
                    println!("{} set to: {}", key, value);
                    Ok(())
                },
            }
        },
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    if let Err(e) = setup_logging(cli.log_level) {
        eprintln!("Failed to set up logging: {}", e);
    }
    if let Err(e) = run(cli).await {
        error!("{:#}", e);
        std::process::exit(1);
    }
}
