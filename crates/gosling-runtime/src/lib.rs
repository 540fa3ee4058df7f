pub mod command;
pub mod db;
pub mod migrations;

pub use command::{run, Command, Outcome};
pub use db::Database;
pub use migrations::{MigrationGenerator, MigrationRunner, RunOptions};
