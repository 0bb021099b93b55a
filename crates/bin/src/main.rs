use std::sync::Arc;

use clap::Parser;
use docbranch::{InMemoryRemote, Store};
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;
mod output;

use cli::{Cli, Commands};
use output::OutputFormat;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("docbranch=info".parse()?),
        )
        .init();

    let cli = Cli::parse();
    let format = OutputFormat::from(cli.format);

    let remote = Arc::new(InMemoryRemote::load_from_file(&cli.file).await?);
    tracing::info!(file = %cli.file.display(), docs = remote.len(), "loaded documents");
    let store = Store::with_config(remote.clone(), cli.store_config());

    let modified = match &cli.command {
        Commands::List => commands::docs::list(&remote, &store, format).await?,
        Commands::Show(args) => commands::docs::show(args, &store, format).await?,
        Commands::New(args) => commands::docs::new(args, &store, format).await?,
        Commands::Branch(args) => commands::branch::branch(args, &store, format).await?,
        Commands::Pull(args) => commands::branch::pull(args, &store, format).await?,
        Commands::Merge(args) => commands::branch::merge(args, &store, format).await?,
    };

    if modified {
        for snapshot in store.snapshots() {
            remote.put(snapshot);
        }
        remote.save_to_file(&cli.file).await?;
        tracing::info!(file = %cli.file.display(), docs = remote.len(), "saved documents");
    }
    Ok(())
}
