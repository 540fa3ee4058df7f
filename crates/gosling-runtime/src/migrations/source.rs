//! Migration source: loads and parses versioned SQL files from a directory.
//!
//! Files are named `<version>_<name>.sql`, where `version` is a positive
//! integer (usually a `yyyymmddHHMMSS` timestamp). Sections are marked with
//! annotation comments:
//!
//! ```sql
//! -- +gosling Up
//! CREATE TABLE users (id INTEGER PRIMARY KEY);
//!
//! -- +gosling Down
//! DROP TABLE users;
//! ```
//!
//! `-- +gosling StatementBegin` / `-- +gosling StatementEnd` keep a block
//! together as one statement, and `-- +gosling NO TRANSACTION` runs the whole
//! file outside a transaction. Files annotated with `-- +goose` are read
//! the same way.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use gosling_core::error::{GoslingError, Result};
use tracing::debug;

/// Prefix of every annotation comment.
const ANNOTATION_PREFIX: &str = "-- +gosling";

/// Annotation prefixes accepted when reading files.
const ACCEPTED_PREFIXES: [&str; 2] = [ANNOTATION_PREFIX, "-- +goose"];

/// A single versioned migration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Migration {
    /// Version parsed from the filename prefix.
    pub version: i64,
    /// Name part of the filename (without version and extension).
    pub name: String,
    /// Path the migration was loaded from.
    pub path: PathBuf,
    /// Statements applied when migrating up.
    pub up: Section,
    /// Statements applied when rolling back.
    pub down: Section,
}

impl Migration {
    /// File name as shown in status output.
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .and_then(|s| s.to_str())
            .map(str::to_string)
            .unwrap_or_else(|| format!("{}_{}.sql", self.version, self.name))
    }
}

/// One direction of a migration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Section {
    pub statements: Vec<String>,
    pub use_transaction: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Annotation {
    Up,
    Down,
    StatementBegin,
    StatementEnd,
    NoTransaction,
}

fn parse_annotation(line: &str) -> Option<std::result::Result<Annotation, String>> {
    let line = line.trim();
    let rest = ACCEPTED_PREFIXES
        .iter()
        .find_map(|prefix| line.strip_prefix(prefix))
        .filter(|rest| rest.starts_with(char::is_whitespace))?
        .trim();
    let annotation = match rest.to_ascii_lowercase().as_str() {
        "up" => Annotation::Up,
        "down" => Annotation::Down,
        "statementbegin" => Annotation::StatementBegin,
        "statementend" => Annotation::StatementEnd,
        "no transaction" => Annotation::NoTransaction,
        _ => return Some(Err(format!("unknown annotation {:?}", rest))),
    };
    Some(Ok(annotation))
}

/// Split `<version>_<name>` into its parts.
fn parse_file_stem(stem: &str) -> std::result::Result<(i64, String), String> {
    let (version, name) = stem
        .split_once('_')
        .ok_or_else(|| "filename must look like <version>_<name>.sql".to_string())?;

    let version: i64 = version
        .parse()
        .map_err(|_| format!("version {:?} is not a number", version))?;
    if version < 1 {
        return Err("version must be greater than zero".to_string());
    }

    Ok((version, name.to_string()))
}

/// Parse a migration file's content.
pub fn parse_migration(path: &Path, content: &str) -> Result<Migration> {
    let invalid = |reason: String| GoslingError::InvalidMigration {
        path: path.to_path_buf(),
        reason,
    };

    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| invalid("invalid filename".to_string()))?;
    let (version, name) = parse_file_stem(stem).map_err(invalid)?;

    let mut up = Vec::new();
    let mut down = Vec::new();
    let mut current: Option<Annotation> = None;
    let mut seen_up = false;
    let mut use_transaction = true;
    let mut buffer = String::new();
    let mut block: Option<String> = None;

    for line in content.lines() {
        if let Some(annotation) = parse_annotation(line) {
            let annotation = annotation.map_err(invalid)?;
            match annotation {
                Annotation::Up | Annotation::Down => {
                    if block.is_some() {
                        return Err(invalid("section change inside StatementBegin".to_string()));
                    }
                    flush(&mut buffer, current, &mut up, &mut down);
                    if annotation == Annotation::Up {
                        seen_up = true;
                    }
                    current = Some(annotation);
                }
                Annotation::StatementBegin => {
                    if current.is_none() {
                        return Err(invalid("StatementBegin outside of a section".to_string()));
                    }
                    if block.is_some() {
                        return Err(invalid("nested StatementBegin".to_string()));
                    }
                    flush(&mut buffer, current, &mut up, &mut down);
                    block = Some(String::new());
                }
                Annotation::StatementEnd => {
                    let statement = block
                        .take()
                        .ok_or_else(|| invalid("StatementEnd without StatementBegin".to_string()))?;
                    let statement = statement.trim().trim_end_matches(';').trim();
                    if !statement.is_empty() {
                        push(current, statement.to_string(), &mut up, &mut down);
                    }
                }
                Annotation::NoTransaction => use_transaction = false,
            }
            continue;
        }

        if let Some(block) = block.as_mut() {
            block.push_str(line);
            block.push('\n');
        } else if current.is_some() {
            buffer.push_str(line);
            buffer.push('\n');
        }
    }

    if block.is_some() {
        return Err(invalid("unterminated StatementBegin".to_string()));
    }
    if !seen_up {
        return Err(invalid(format!("missing '{} Up' annotation", ANNOTATION_PREFIX)));
    }
    flush(&mut buffer, current, &mut up, &mut down);

    Ok(Migration {
        version,
        name,
        path: path.to_path_buf(),
        up: Section {
            statements: up,
            use_transaction,
        },
        down: Section {
            statements: down,
            use_transaction,
        },
    })
}

fn push(current: Option<Annotation>, statement: String, up: &mut Vec<String>, down: &mut Vec<String>) {
    match current {
        Some(Annotation::Up) => up.push(statement),
        Some(Annotation::Down) => down.push(statement),
        _ => {}
    }
}

fn flush(
    buffer: &mut String,
    current: Option<Annotation>,
    up: &mut Vec<String>,
    down: &mut Vec<String>,
) {
    for statement in split_sql_statements(buffer) {
        if !is_comment_only(&statement) {
            push(current, statement, up, down);
        }
    }
    buffer.clear();
}

fn is_comment_only(statement: &str) -> bool {
    statement.lines().all(|l| {
        let l = l.trim();
        l.is_empty() || l.starts_with("--")
    })
}

/// Split SQL into individual statements.
///
/// Semicolons inside single-quoted strings, line comments and dollar-quoted
/// bodies (`$$ ... $$`, `$tag$ ... $tag$`) do not end a statement.
fn split_sql_statements(sql: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut current = String::new();
    let mut dollar_tag: Option<String> = None;
    let mut in_single_quote = false;
    let mut in_line_comment = false;
    let mut chars = sql.chars().peekable();

    while let Some(c) = chars.next() {
        current.push(c);

        if in_line_comment {
            if c == '\n' {
                in_line_comment = false;
            }
            continue;
        }
        if in_single_quote {
            if c == '\'' {
                in_single_quote = false;
            }
            continue;
        }

        if c == '$' {
            let mut tag = String::from("$");
            while let Some(&next) = chars.peek() {
                if next == '$' {
                    chars.next();
                    tag.push('$');
                    current.push('$');
                    break;
                } else if next.is_alphanumeric() || next == '_' {
                    chars.next();
                    tag.push(next);
                    current.push(next);
                } else {
                    break;
                }
            }

            if tag.len() >= 2 && tag.ends_with('$') {
                match &dollar_tag {
                    Some(open) if *open == tag => dollar_tag = None,
                    None => dollar_tag = Some(tag),
                    Some(_) => {}
                }
            }
            continue;
        }

        if dollar_tag.is_some() {
            continue;
        }

        match c {
            '\'' => in_single_quote = true,
            '-' if chars.peek() == Some(&'-') => in_line_comment = true,
            ';' => {
                let stmt = current.trim().trim_end_matches(';').trim().to_string();
                if !stmt.is_empty() {
                    statements.push(stmt);
                }
                current.clear();
            }
            _ => {}
        }
    }

    let stmt = current.trim().trim_end_matches(';').trim().to_string();
    if !stmt.is_empty() {
        statements.push(stmt);
    }

    statements
}

/// Load migrations from a directory, sorted by version.
///
/// Only `*.sql` files are considered. Two files with the same version are an
/// error.
pub fn load_migrations(dir: &Path) -> Result<Vec<Migration>> {
    if !dir.is_dir() {
        return Err(GoslingError::Migration(format!(
            "no migration directory {}",
            dir.display()
        )));
    }

    let mut migrations = Vec::new();
    let mut seen: HashMap<i64, PathBuf> = HashMap::new();

    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();

        if !path.is_file() || path.extension().map(|e| e != "sql").unwrap_or(true) {
            continue;
        }

        let content = std::fs::read_to_string(&path)?;
        let migration = parse_migration(&path, &content)?;

        if let Some(other) = seen.insert(migration.version, path.clone()) {
            return Err(GoslingError::InvalidMigration {
                path,
                reason: format!(
                    "duplicate version {} (also used by {})",
                    migration.version,
                    other.display()
                ),
            });
        }

        migrations.push(migration);
    }

    migrations.sort_by_key(|m| m.version);

    debug!("Loaded {} migrations from {}", migrations.len(), dir.display());
    Ok(migrations)
}
