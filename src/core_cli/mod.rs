use clap::{Parser, Subcommand};

/// Command-line arguments
#[derive(Parser, Debug)]
#[command(name = "sandftp", about = "A sandboxed FTP server and client written in Rust.")]
pub struct Cli {
    /// Path to the configuration file
    #[arg(short, long)]
    pub config: Option<String>,

    /// Enable verbose mode
    #[arg(short, long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Serve the storage root over FTP
    Serve {
        /// Address to bind
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on
        #[arg(short, long)]
        port: Option<u16>,

        /// Directory exposed as "/"
        #[arg(short, long)]
        root: Option<String>,
    },

    /// Run a test session against a server: login, SYST, PWD, LIST, QUIT
    Probe {
        #[arg(long)]
        host: Option<String>,

        #[arg(short, long)]
        port: Option<u16>,

        #[arg(short, long, default_value = "anonymous")]
        user: String,

        #[arg(long, default_value = "guest")]
        password: String,

        /// Directory to list
        #[arg(long)]
        path: Option<String>,
    },
}
