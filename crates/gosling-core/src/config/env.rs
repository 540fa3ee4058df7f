use std::collections::HashMap;

/// Snapshot of the environment variables the runner reads.
///
/// Empty values count as unset.
#[derive(Debug, Clone, Default)]
pub struct EnvVars {
    vars: HashMap<String, String>,
}

impl EnvVars {
    pub const DIALECT: &'static str = "DATABASE_DIALECT";
    pub const USERNAME: &'static str = "DATABASE_USERNAME";
    pub const USER: &'static str = "DATABASE_USER";
    pub const PASSWORD: &'static str = "DATABASE_PASSWORD";
    pub const HOST: &'static str = "DATABASE_HOST";
    pub const PORT: &'static str = "DATABASE_PORT";
    pub const NAME: &'static str = "DATABASE_NAME";
    pub const MIGRATION_PATH: &'static str = "MIGRATION_PATH";

    const KNOWN: [&'static str; 8] = [
        Self::DIALECT,
        Self::USERNAME,
        Self::USER,
        Self::PASSWORD,
        Self::HOST,
        Self::PORT,
        Self::NAME,
        Self::MIGRATION_PATH,
    ];

    /// Read the known variables from the process environment.
    pub fn from_process() -> Self {
        Self::from_pairs(
            Self::KNOWN
                .iter()
                .filter_map(|key| std::env::var(key).ok().map(|v| (key.to_string(), v))),
        )
    }

    pub fn from_pairs(pairs: impl IntoIterator<Item = (String, String)>) -> Self {
        Self {
            vars: pairs.into_iter().filter(|(_, v)| !v.is_empty()).collect(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    /// `DATABASE_USERNAME`, falling back to `DATABASE_USER`.
    pub fn username(&self) -> Option<&str> {
        self.get(Self::USERNAME).or_else(|| self.get(Self::USER))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_values_are_unset() {
        let env = EnvVars::from_pairs([
            ("DATABASE_HOST".to_string(), String::new()),
            ("DATABASE_NAME".to_string(), "app".to_string()),
        ]);
        assert_eq!(env.get(EnvVars::HOST), None);
        assert_eq!(env.get(EnvVars::NAME), Some("app"));
    }

    #[test]
    fn test_username_fallback() {
        let env = EnvVars::from_pairs([("DATABASE_USER".to_string(), "legacy".to_string())]);
        assert_eq!(env.username(), Some("legacy"));
    }
}
