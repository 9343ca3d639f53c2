//! Command line interface built on clap.
//!
//! Defines [`Cli`] with the [`Command`] subcommands (skim, run) and the
//! global `--verbose` flag.

use std::num::NonZeroUsize;
use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// skimrun: skim ids from piped listings and fan them out to parallel jobs.
#[derive(Debug, Parser)]
#[command(name = "skimrun", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Log what the runner is doing (stderr).
    #[arg(long, short, global = true, default_value_t = false)]
    pub verbose: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Print the ids from piped input, after any given on the command line.
    Skim {
        /// Ids placed before the piped ones.
        args: Vec<String>,
    },

    /// Run a command once per id, a bounded number at a time.
    Run {
        /// Maximum number of items running at once [default: 10].
        #[arg(long, short = 'j')]
        jobs: Option<NonZeroUsize>,

        /// Kill an item still running after this many seconds.
        #[arg(long, value_name = "SECS")]
        timeout: Option<u64>,

        /// Write each item's stdout to DIR/<id>.
        #[arg(long, value_name = "DIR")]
        out_dir: Option<PathBuf>,

        /// Id to run before the piped ones. Repeatable.
        #[arg(long = "id", value_name = "ID")]
        ids: Vec<String>,

        /// Print the batch report as JSON instead of a summary.
        #[arg(long, default_value_t = false)]
        json: bool,

        /// Program to run, then its arguments. `{}` marks where the id goes.
        #[arg(last = true, required = true, num_args = 1..)]
        command: Vec<String>,
    },
}
