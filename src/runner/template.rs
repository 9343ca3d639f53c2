use std::path::{Path, PathBuf};
use std::time::Duration;

use super::WorkItem;

/// Placeholder replaced by the token in template arguments.
pub const PLACEHOLDER: &str = "{}";

/// A command line to run once per token.
///
/// Every `{}` in an argument becomes the token. With no `{}` anywhere the
/// token is appended as the last argument, the way `xargs -n1` would.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandTemplate {
    program: String,
    args: Vec<String>,
    output_dir: Option<PathBuf>,
    timeout: Option<Duration>,
}

impl CommandTemplate {
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
            output_dir: None,
            timeout: None,
        }
    }

    /// Give each item its own stdout file under `dir`, named after its token.
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(dir.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn render(&self, token: &str) -> WorkItem {
        let templated = self.args.iter().any(|a| a.contains(PLACEHOLDER));
        let mut args: Vec<String> = self
            .args
            .iter()
            .map(|a| a.replace(PLACEHOLDER, token))
            .collect();
        if !templated {
            args.push(token.to_string());
        }

        let mut item = WorkItem::new(self.program.clone())
            .args(args)
            .with_label(token);
        if let Some(dir) = &self.output_dir {
            item = item.stdout_to(output_slot(dir, token));
        }
        if let Some(timeout) = self.timeout {
            item = item.with_timeout(timeout);
        }
        item
    }
}

/// Output file for `token` under `dir`. Path separators and dot-only names
/// are neutralised so every token stays inside `dir`.
pub fn output_slot(dir: &Path, token: &str) -> PathBuf {
    let mut name: String = token
        .chars()
        .map(|c| match c {
            '/' | '\\' | '\0' => '_',
            c => c,
        })
        .collect();
    if name.is_empty() || name.chars().all(|c| c == '.') {
        name = name.replace('.', "_");
        name.insert(0, '_');
    }
    dir.join(name)
}
