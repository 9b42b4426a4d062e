mod backend;
mod commands;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use licdata_iac_config::{Backend, Settings};
use licdata_iac_core::StackIdentity;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "licdata-iac")]
#[command(about = "Event-driven infrastructure lifecycle for Licdata", long_about = None)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct GlobalArgs {
    /// Stack name (e.g. acme-prod)
    #[arg(short = 's', long = "stack", env = "LICDATA_STACK", global = true)]
    stack: Option<String>,

    /// Project name
    #[arg(
        short = 'p',
        long = "project",
        env = "LICDATA_PROJECT",
        default_value = "licdata",
        global = true
    )]
    project: String,

    /// Cloud location (e.g. westeurope)
    #[arg(short = 'l', long = "location", env = "LICDATA_LOCATION", global = true)]
    location: Option<String>,

    /// Provisioning backend: local or pulumi (overrides the settings file)
    #[arg(long, env = "LICDATA_BACKEND", global = true)]
    backend: Option<Backend>,

    /// Debug logging (RUST_LOG still wins)
    #[arg(short, long, global = true)]
    verbose: bool,
}

impl GlobalArgs {
    fn identity(&self) -> anyhow::Result<StackIdentity> {
        let stack = self
            .stack
            .clone()
            .context("Stack name required: --stack <NAME> or LICDATA_STACK")?;
        let location = self
            .location
            .clone()
            .context("Location required: --location <LOCATION> or LICDATA_LOCATION")?;
        Ok(StackIdentity::new(stack, self.project.clone(), location))
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Create or update the base infrastructure
    Up,
    /// Remove every resource of the stack
    Down,
    /// Run a container image on the stack
    DockerUp {
        /// Image name (defaults to the configured image)
        #[arg(long)]
        image_name: Option<String>,
        /// Image version (defaults to the configured image)
        #[arg(long)]
        image_version: Option<String>,
        /// Full image reference, used instead of the stack's registry
        #[arg(long)]
        image_url: Option<String>,
    },
    /// Remove the Docker-dependent resources, keeping the base infrastructure
    DockerDown,
    /// Ask the image pipeline for the configured image
    ImageDetails {
        /// Registry user the pipeline pushes with
        #[arg(long)]
        credential_name: Option<String>,
        /// Registry the pipeline pushes to
        #[arg(long)]
        registry_url: Option<String>,
    },
    /// Handle JSON events read from stdin, one per line
    Dispatch,
    /// Show version
    Version,
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    // stdout carries the event stream
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.global.verbose);

    if matches!(cli.command, Commands::Version) {
        println!("licdata-iac {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let settings = Settings::discover().context("Failed to load settings")?;
    if let Some(source) = &settings.source {
        tracing::debug!("Settings loaded from {}", source.display());
    }
    let backend = cli.global.backend.unwrap_or(settings.backend);
    let factory = backend::operation_factory(&settings, backend);
    let mut output = commands::output::Output::new();

    match cli.command {
        Commands::Dispatch => {
            commands::dispatch::handle(&factory, &mut output).await?;
        }
        Commands::Up => {
            let request = commands::request::update_infrastructure(cli.global.identity()?);
            commands::request::handle(&factory, &request, &mut output).await?;
        }
        Commands::Down => {
            let request = commands::request::remove_infrastructure(cli.global.identity()?);
            commands::request::handle(&factory, &request, &mut output).await?;
        }
        Commands::DockerUp {
            image_name,
            image_version,
            image_url,
        } => {
            let request = commands::request::update_docker_resources(
                cli.global.identity()?,
                &settings.image,
                image_name,
                image_version,
                image_url,
            );
            commands::request::handle(&factory, &request, &mut output).await?;
        }
        Commands::DockerDown => {
            let request = commands::request::remove_docker_resources(cli.global.identity()?);
            commands::request::handle(&factory, &request, &mut output).await?;
        }
        Commands::ImageDetails {
            credential_name,
            registry_url,
        } => {
            let request = commands::request::docker_image_details(
                cli.global.identity()?,
                credential_name,
                registry_url,
            );
            commands::request::handle(&factory, &request, &mut output).await?;
        }
        Commands::Version => unreachable!("handled above"),
    }

    if output.finish() {
        std::process::exit(1);
    }
    Ok(())
}
