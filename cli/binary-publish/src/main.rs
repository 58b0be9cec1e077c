mod errors;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use libherokubuildpack::log::log_header;
use publish_artifacts::{publish, unpublish, Storage};
use publish_config::{capture_env, read_project_config, Overrides, DEFAULT_CONFIG_FILE};

use crate::errors::{on_error, BinaryPublishError};

// Silence unused dependency warning for
// dependencies only used in tests
#[cfg(test)]
use assert_cmd as _;
#[cfg(test)]
use predicates as _;
#[cfg(test)]
use test_support as _;

const TOOL_NAME: &str = "binary-publish";

/// Publishes a pre-built binary package to S3
#[derive(Parser, Debug)]
#[command(name = "binary-publish", version)]
struct Cli {
    /// Project config file
    #[arg(long, short, env = "BINARY_PUBLISH_CONFIG", default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Upload the staged tarball unless that version already exists remotely
    Publish(TargetArgs),
    /// Remove a published tarball
    Unpublish(TargetArgs),
}

#[derive(Args, Debug)]
struct TargetArgs {
    /// Staged tarball to upload, instead of the configured one
    #[arg(long)]
    tarball: Option<PathBuf>,

    /// Remote file name, instead of the configured one
    #[arg(long)]
    package_file: Option<String>,
}

impl From<&TargetArgs> for Overrides {
    fn from(value: &TargetArgs) -> Self {
        Overrides {
            tarball: value.tarball.clone(),
            package_file: value.package_file.clone(),
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    log_header(TOOL_NAME);

    match run(&cli).await {
        Ok(message) => {
            println!("{message}");
            std::process::exit(0);
        }
        Err(error) => {
            on_error(&error);
            std::process::exit(1);
        }
    }
}

async fn run(cli: &Cli) -> Result<String, BinaryPublishError> {
    let config = read_project_config(&cli.config)?;
    let env = capture_env();

    match &cli.command {
        Command::Publish(args) => {
            let (request, storage) = config.resolve(&env, &args.into())?;
            let published = publish(&request, || Storage::connect(&storage)).await?;
            Ok(published.to_string())
        }
        Command::Unpublish(args) => {
            let (request, storage) = config.resolve(&env, &args.into())?;
            let unpublished = unpublish(&request, || Storage::connect(&storage)).await?;
            Ok(format!("[{}] {unpublished}", request.package_name))
        }
    }
}
