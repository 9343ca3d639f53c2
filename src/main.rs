use anyhow::{Context, Result, bail};
use clap::Parser;
use tracing::error;

use skimrun::SkimrunError;
use skimrun::cli::{Cli, Command};
use skimrun::config::SkimrunConfig;
use skimrun::logging::init_logging;
use skimrun::runner::{BoundedRunner, Budget, CommandTemplate};
use skimrun::skim;
use skimrun::ui::{self, BatchProgress};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Command::Skim { args } => {
            let line = skim_line(&args)?;
            println!("{line}");
        }
        Command::Run {
            jobs,
            timeout,
            out_dir,
            ids,
            json,
            command,
        } => {
            let config = SkimrunConfig::load()?;

            let budget = match jobs {
                Some(n) => Budget::new(n.get())?,
                None => config.budget()?,
            };
            let timeout = timeout
                .map(std::time::Duration::from_secs)
                .or(config.item_timeout());
            let out_dir = out_dir.or(config.output_dir);

            let Some((program, args)) = command.split_first() else {
                bail!("no command given");
            };
            let mut template = CommandTemplate::new(program.clone(), args.iter().cloned())
                .with_timeout(timeout);
            if let Some(dir) = out_dir {
                std::fs::create_dir_all(&dir)
                    .with_context(|| format!("creating output dir {}", dir.display()))?;
                template = template.with_output_dir(dir);
            }

            // Read everything up front: items must not compete with us for stdin.
            let tokens = skim_words(&ids)?;

            let mut runner = BoundedRunner::new(budget);
            let progress = BatchProgress::start(tokens.len(), budget.get(), runner.gauge());
            let mut start_failure = None;
            for token in &tokens {
                if let Err(e) = runner.submit(template.render(token)).await {
                    error!(%token, error = %e, "could not start item; stopping submissions");
                    start_failure = Some(e);
                    break;
                }
                progress.submitted(token);
            }

            // Items already running are always waited for and reported.
            progress.draining();
            let report = runner.drain().await?;
            progress.finish();

            if json {
                ui::print_json(&report)?;
            } else {
                ui::print_summary(&report);
            }

            if let Some(e) = start_failure {
                return Err(SkimrunError::from(e).into());
            }
        }
    }

    Ok(())
}

fn skim_line(args: &[String]) -> Result<String, SkimrunError> {
    Ok(skim::extract(skim::piped_stdin(), args)?)
}

fn skim_words(args: &[String]) -> Result<Vec<String>, SkimrunError> {
    Ok(skim::extract_words(skim::piped_stdin(), args)?)
}
