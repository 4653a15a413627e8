use std::io::Read;
use std::path::Path;
use std::process::ExitCode;

use anyhow::{Context, Result};
use tokio::net::TcpListener;

use kml_validator::config::{Config, ConfigManager};
use kml_validator::logging::{LoggingConfig, init_logging};
use kml_validator::result::ValidationStatus;
use kml_validator::server::{self, AppState};
use kml_validator::{Cli, Command};

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse_args();

    init_logging(&LoggingConfig::from_verbosity(cli.verbosity()))?;

    let config = ConfigManager::load_config(&cli)
        .await
        .context("failed to load configuration")?;

    match &cli.command {
        Command::Serve { .. } => {
            run_server(&config).await?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Check { file } => check_document(&config, file).await,
    }
}

async fn run_server(config: &Config) -> Result<()> {
    let state = AppState::from_config(config)?;
    let app = server::router(state, config.server.max_body_bytes);

    let listener = TcpListener::bind(&config.server.bind)
        .await
        .with_context(|| format!("failed to bind {}", config.server.bind))?;
    server::serve(listener, app).await?;
    Ok(())
}

async fn check_document(config: &Config, file: &Path) -> Result<ExitCode> {
    let document = read_document(file).await?;

    let state = AppState::from_config(config)?;
    let schemas = state.schemas.get().await.cloned();
    let validator = state.validator.clone();
    let result =
        tokio::task::spawn_blocking(move || validator.validate(schemas.as_ref(), &document))
            .await
            .context("validation task failed")?;

    print!("{}", result.to_json_line()?);

    Ok(match result.status() {
        ValidationStatus::Valid => ExitCode::SUCCESS,
        ValidationStatus::Invalid => ExitCode::from(1),
        ValidationStatus::InternalError => ExitCode::from(2),
    })
}

async fn read_document(file: &Path) -> Result<Vec<u8>> {
    if file == Path::new("-") {
        let mut document = Vec::new();
        std::io::stdin()
            .read_to_end(&mut document)
            .context("failed to read standard input")?;
        Ok(document)
    } else {
        tokio::fs::read(file)
            .await
            .with_context(|| format!("failed to read {}", file.display()))
    }
}
