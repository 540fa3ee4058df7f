use anyhow::Result;
use console::style;
use tracing::debug;

use gosling_core::config::Settings;
use gosling_runtime::migrations::{RunReport, StatusReport};
use gosling_runtime::{Command, Database, Outcome, RunOptions};

/// A command name and the arguments forwarded with it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub command: String,
    pub args: Vec<String>,
}

impl Invocation {
    /// `None` when there is nothing to run and usage should be shown.
    pub fn new(command: Option<&str>, args: &[String]) -> Option<Self> {
        let command = command?;
        if command == "help" {
            return None;
        }

        let mut args = args.to_vec();
        // `create NAME` always produces a SQL migration.
        if command == "create" && args.len() == 1 {
            args.push("sql".to_string());
        }

        Some(Self {
            command: command.to_string(),
            args,
        })
    }
}

/// Runs one invocation against the configured database.
pub struct MigrateCommand {
    invocation: Invocation,
    settings: Settings,
}

impl MigrateCommand {
    pub fn new(invocation: Invocation, settings: Settings) -> Self {
        Self {
            invocation,
            settings,
        }
    }

    pub async fn execute(self) -> Result<()> {
        let command = Command::parse(&self.invocation.command, &self.invocation.args)?;
        let options = RunOptions::from_settings(&self.settings);
        debug!(
            "Running {} with migrations from {}",
            command.name(),
            options.dir.display()
        );

        let db = if command.needs_database() {
            let dialect = self.settings.validate()?;
            Some(Database::connect(dialect, &self.settings.dbstring).await?)
        } else {
            None
        };

        let outcome = gosling_runtime::run(&command, db.as_ref(), &options).await;
        if let Some(db) = &db {
            db.close().await;
        }

        print!("{}", render(&outcome?));
        Ok(())
    }
}

/// Human-readable report of an outcome.
pub fn render(outcome: &Outcome) -> String {
    match outcome {
        Outcome::Migrated(report) => render_report(report),
        Outcome::Status(status) => render_status(status),
        Outcome::Version(version) => format!("gosling: version {}\n", version),
        Outcome::Created(path) => format!(
            "  {} Created new migration {}\n",
            style("✓").green(),
            style(path.display()).cyan()
        ),
    }
}

fn render_report(report: &RunReport) -> String {
    let mut out = String::new();

    for name in &report.rolled_back {
        out.push_str(&format!("  {} Rolled back: {}\n", style("✓").green(), name));
    }
    for name in &report.applied {
        out.push_str(&format!("  {} Applied: {}\n", style("✓").green(), name));
    }
    if report.applied.is_empty() && report.rolled_back.is_empty() {
        out.push_str(&format!("  {} No migrations to run\n", style("ℹ").blue()));
    }

    out.push_str(&format!(
        "  {} Current version: {}\n",
        style("ℹ").blue(),
        report.current_version
    ));
    out
}

fn render_status(status: &StatusReport) -> String {
    let mut out = String::new();

    if status.entries.is_empty() {
        out.push_str(&format!("  {} No migrations found\n", style("ℹ").blue()));
        return out;
    }

    out.push_str(&format!(
        "    {:<24} {}\n",
        style("Applied At").bold(),
        style("Migration").bold()
    ));
    out.push_str("    ========================================\n");

    for entry in &status.entries {
        let applied = match entry.applied_at {
            Some(at) => at.format("%Y-%m-%d %H:%M:%S").to_string(),
            None => "Pending".to_string(),
        };
        let name = if entry.has_file {
            style(entry.file_name.as_str()).cyan().to_string()
        } else {
            format!("{} (file missing)", style(entry.file_name.as_str()).red())
        };
        let marker = match entry.applied_at {
            Some(_) => style("✓").green(),
            None => style("○").yellow(),
        };
        out.push_str(&format!("  {} {:<24} {}\n", marker, applied, name));
    }

    out.push_str(&format!(
        "\n  {} {} applied, {} pending, current version {}\n",
        style("ℹ").blue(),
        status.applied(),
        status.pending(),
        status.current_version
    ));
    out
}
