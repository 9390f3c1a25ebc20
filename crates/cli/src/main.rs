use anyhow::Context;
use clap::{Parser, Subcommand};
use libris_kernel::settings::Settings;

#[derive(Parser)]
#[command(name = "libris", about = "LIBRIS book catalog service")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Start the HTTP server
    Serve,
    /// Print the resolved configuration and exit
    Config,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let settings = Settings::load().with_context(|| "failed to load LIBRIS settings")?;
    libris_telemetry::init(&settings.telemetry);

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => {
            tracing::info!(env = ?settings.environment, "libris serve starting");
            libris_app::run(settings).await?;
        }
        Command::Config => {
            println!("{:#?}", settings);
        }
    }

    Ok(())
}
