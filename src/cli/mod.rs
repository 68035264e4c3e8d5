mod show;
mod sync;

use crate::error::Result;
use clap::{Parser, Subcommand};

pub use show::ShowResource;
pub use sync::SyncArgs;

#[derive(Parser, Debug)]
#[command(name = "till-sync")]
#[command(about = "Reconcile PrivatBank statements against Poster POS transactions", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    pub async fn run(&self) -> Result<()> {
        match &self.command {
            Commands::Sync(args) => args.execute().await,
            Commands::Show { resource } => resource.execute().await,
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Fetch both ledgers for the lookback period, reconcile them and report
    Sync(SyncArgs),
    Show {
        #[command(subcommand)]
        resource: ShowResource,
    },
}
