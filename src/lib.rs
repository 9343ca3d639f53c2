//! Pipe-friendly helpers for resource-listing commands.
//!
//! Two independent pieces:
//!
//! - [`skim`] reads a previous command's output and keeps the first column
//!   of every non-`#` line, so listings can be piped into the next command.
//! - [`runner`] runs one work item per id with a cap on how many run at once,
//!   and waits for all of them before returning.
//!
//! ```no_run
//! use skimrun::runner::{BoundedRunner, Budget, CommandTemplate};
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let ids = skimrun::skim::extract_words(skimrun::skim::piped_stdin(), &[] as &[&str])?;
//! let template = CommandTemplate::new("aws", ["cloudformation", "describe-stacks", "--stack-name"]);
//!
//! let mut runner = BoundedRunner::new(Budget::new(4)?);
//! for id in &ids {
//!     runner.submit(template.render(id)).await?;
//! }
//! let report = runner.drain().await?;
//! println!("{} failed", report.failed);
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod runner;
pub mod skim;
pub mod ui;

pub use error::{RunnerError, SkimError, SkimrunError};
