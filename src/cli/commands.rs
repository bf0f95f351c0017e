use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "comicfeed")]
#[command(about = "Turns serialized comic and web-novel pages into Atom feeds")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Fetch targets once and write one Atom file per target
    Fetch {
        /// Comma-separated target URLs
        #[arg(short, long, value_delimiter = ',')]
        targets: Vec<String>,

        /// File with one target URL per line (blank lines and `#` comments skipped)
        #[arg(short, long)]
        list: Option<PathBuf>,

        /// Directory the `<name>.atom` files are written to
        #[arg(short, long)]
        atom: PathBuf,
    },

    /// Serve feeds over HTTP at /entry/<target URL>
    Serve {
        /// Listen address, overrides COMICFEED_LISTEN
        #[arg(long)]
        listen: Option<String>,
    },
}
