mod dialect;
mod executor;
mod generator;
mod ledger;
mod planner;
mod runner;
mod source;

pub use dialect::LedgerSql;
pub use executor::MigrationExecutor;
pub use generator::{MigrationGenerator, SUPPORTED_KINDS};
pub use ledger::{current_version, Ledger, LedgerEntry};
pub use planner::{Direction, MissingPolicy, Planner, Step, VersionState};
pub use runner::{MigrationRunner, RunOptions, RunReport, StatusEntry, StatusReport};
pub use source::{load_migrations, parse_migration, Migration, Section};
