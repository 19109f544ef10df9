use clap::{Parser, Subcommand};

/// Anonymous token service for the eValuation API
#[derive(Parser)]
#[command(name = "anon-gateway", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the token API server
    Serve {
        /// Port to bind (overrides ANON_PORT)
        #[arg(short, long)]
        port: Option<u16>,
    },
}
