//! Planner: computes which migrations to run, in which direction and order.
//!
//! Planning is pure; it only looks at the versions available on disk and the
//! versions recorded in the ledger.

use std::collections::BTreeSet;

use gosling_core::error::{GoslingError, Result};

/// Direction of a single step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
}

/// One migration to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Step {
    pub version: i64,
    pub direction: Direction,
}

impl Step {
    fn up(version: i64) -> Self {
        Self {
            version,
            direction: Direction::Up,
        }
    }

    fn down(version: i64) -> Self {
        Self {
            version,
            direction: Direction::Down,
        }
    }
}

/// How to treat pending migrations older than the current version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MissingPolicy {
    /// Refuse to migrate up until the gap is resolved.
    #[default]
    Strict,
    /// Apply them in version order before newer ones.
    Allow,
}

impl MissingPolicy {
    pub fn from_allow(allow_missing: bool) -> Self {
        if allow_missing {
            MissingPolicy::Allow
        } else {
            MissingPolicy::Strict
        }
    }
}

/// Applied and on-disk state of one version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VersionState {
    pub version: i64,
    pub applied: bool,
    pub has_file: bool,
}

#[derive(Debug)]
pub struct Planner {
    available: BTreeSet<i64>,
    applied: BTreeSet<i64>,
}

impl Planner {
    pub fn new(
        available: impl IntoIterator<Item = i64>,
        applied: impl IntoIterator<Item = i64>,
    ) -> Self {
        Self {
            available: available.into_iter().collect(),
            applied: applied.into_iter().collect(),
        }
    }

    /// Highest applied version, 0 when none.
    pub fn current_version(&self) -> i64 {
        self.applied.last().copied().unwrap_or(0)
    }

    /// Available versions not yet applied, ascending.
    pub fn pending(&self) -> Vec<i64> {
        self.available.difference(&self.applied).copied().collect()
    }

    /// Pending versions lower than the current version.
    pub fn missing(&self) -> Vec<i64> {
        let current = self.current_version();
        self.pending().into_iter().filter(|v| *v < current).collect()
    }

    /// Apply pending migrations up to and including `target` (all when `None`).
    pub fn up(&self, target: Option<i64>, policy: MissingPolicy) -> Result<Vec<Step>> {
        let missing = self.missing();
        if policy == MissingPolicy::Strict && !missing.is_empty() {
            return Err(GoslingError::MissingMigrations(missing));
        }

        Ok(self
            .pending()
            .into_iter()
            .filter(|v| target.map_or(true, |t| *v <= t))
            .map(Step::up)
            .collect())
    }

    /// Apply only the next pending migration.
    pub fn up_by_one(&self, policy: MissingPolicy) -> Result<Vec<Step>> {
        let mut steps = self.up(None, policy)?;
        if steps.is_empty() {
            return Err(GoslingError::Migration("no next version found".to_string()));
        }
        steps.truncate(1);
        Ok(steps)
    }

    /// Roll back the latest applied migration.
    pub fn down(&self) -> Result<Vec<Step>> {
        let latest = self.latest()?;
        Ok(vec![Step::down(latest)])
    }

    /// Roll back every applied migration newer than `target`, newest first.
    ///
    /// A target of 0 rolls back everything.
    pub fn down_to(&self, target: i64) -> Result<Vec<Step>> {
        if target < 0 {
            return Err(GoslingError::InvalidArgument(format!(
                "version must not be negative: {}",
                target
            )));
        }

        self.applied
            .iter()
            .rev()
            .take_while(|v| **v > target)
            .map(|v| self.require_file(*v).map(|_| Step::down(*v)))
            .collect()
    }

    /// Roll back and re-apply the latest applied migration.
    pub fn redo(&self) -> Result<Vec<Step>> {
        let latest = self.latest()?;
        Ok(vec![Step::down(latest), Step::up(latest)])
    }

    /// Every known version, available or applied, ascending.
    pub fn status(&self) -> Vec<VersionState> {
        self.available
            .union(&self.applied)
            .map(|v| VersionState {
                version: *v,
                applied: self.applied.contains(v),
                has_file: self.available.contains(v),
            })
            .collect()
    }

    fn latest(&self) -> Result<i64> {
        let latest = self
            .applied
            .last()
            .copied()
            .ok_or(GoslingError::NoCurrentVersion)?;
        self.require_file(latest)?;
        Ok(latest)
    }

    fn require_file(&self, version: i64) -> Result<()> {
        if self.available.contains(&version) {
            Ok(())
        } else {
            Err(GoslingError::VersionNotFound(version))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn versions(steps: &[Step]) -> Vec<(i64, Direction)> {
        steps.iter().map(|s| (s.version, s.direction)).collect()
    }

    #[test]
    fn test_up_from_empty() {
        let planner = Planner::new([1, 2, 3], []);
        let steps = planner.up(None, MissingPolicy::Strict).unwrap();
        assert_eq!(
            versions(&steps),
            vec![(1, Direction::Up), (2, Direction::Up), (3, Direction::Up)]
        );
        assert_eq!(planner.current_version(), 0);
    }

    #[test]
    fn test_up_nothing_pending() {
        let planner = Planner::new([1, 2], [1, 2]);
        assert!(planner.up(None, MissingPolicy::Strict).unwrap().is_empty());
    }

    #[test]
    fn test_up_to_target() {
        let planner = Planner::new([1, 2, 3, 4], [1]);
        let steps = planner.up(Some(3), MissingPolicy::Strict).unwrap();
        assert_eq!(versions(&steps), vec![(2, Direction::Up), (3, Direction::Up)]);
    }

    #[test]
    fn test_up_to_target_between_versions() {
        let planner = Planner::new([10, 20, 30], []);
        let steps = planner.up(Some(25), MissingPolicy::Strict).unwrap();
        assert_eq!(versions(&steps), vec![(10, Direction::Up), (20, Direction::Up)]);
    }

    #[test]
    fn test_strict_policy_rejects_missing() {
        let planner = Planner::new([1, 2, 3], [1, 3]);
        assert_eq!(planner.missing(), vec![2]);

        let err = planner.up(None, MissingPolicy::Strict).unwrap_err();
        assert!(matches!(err, GoslingError::MissingMigrations(ref v) if v == &vec![2]));
    }

    #[test]
    fn test_allow_policy_applies_missing_first() {
        let planner = Planner::new([1, 2, 3, 4], [1, 3]);
        let steps = planner.up(None, MissingPolicy::Allow).unwrap();
        assert_eq!(versions(&steps), vec![(2, Direction::Up), (4, Direction::Up)]);
    }

    #[test]
    fn test_up_by_one() {
        let planner = Planner::new([1, 2, 3], [1]);
        let steps = planner.up_by_one(MissingPolicy::Strict).unwrap();
        assert_eq!(versions(&steps), vec![(2, Direction::Up)]);

        let done = Planner::new([1], [1]);
        assert!(done.up_by_one(MissingPolicy::Strict).is_err());
    }

    #[test]
    fn test_down_latest() {
        let planner = Planner::new([1, 2, 3], [1, 2]);
        assert_eq!(versions(&planner.down().unwrap()), vec![(2, Direction::Down)]);
    }

    #[test]
    fn test_down_with_nothing_applied() {
        let planner = Planner::new([1, 2], []);
        assert!(matches!(planner.down(), Err(GoslingError::NoCurrentVersion)));
        assert!(matches!(planner.redo(), Err(GoslingError::NoCurrentVersion)));
    }

    #[test]
    fn test_down_requires_file() {
        let planner = Planner::new([1], [1, 2]);
        assert!(matches!(planner.down(), Err(GoslingError::VersionNotFound(2))));
    }

    #[test]
    fn test_down_to_descending() {
        let planner = Planner::new([1, 2, 3, 4], [1, 2, 3, 4]);
        let steps = planner.down_to(2).unwrap();
        assert_eq!(
            versions(&steps),
            vec![(4, Direction::Down), (3, Direction::Down)]
        );
    }

    #[test]
    fn test_down_to_zero_resets() {
        let planner = Planner::new([1, 2], [1, 2]);
        let steps = planner.down_to(0).unwrap();
        assert_eq!(
            versions(&steps),
            vec![(2, Direction::Down), (1, Direction::Down)]
        );
        assert!(Planner::new([1], []).down_to(0).unwrap().is_empty());
    }

    #[test]
    fn test_down_to_negative() {
        let planner = Planner::new([1], [1]);
        assert!(planner.down_to(-1).is_err());
    }

    #[test]
    fn test_status_covers_available_and_applied() {
        let planner = Planner::new([1, 3], [1, 2]);
        let state = |version, applied, has_file| VersionState {
            version,
            applied,
            has_file,
        };
        assert_eq!(
            planner.status(),
            vec![state(1, true, true), state(2, true, false), state(3, false, true)]
        );
    }

    #[test]
    fn test_redo() {
        let planner = Planner::new([1, 2], [1, 2]);
        assert_eq!(
            versions(&planner.redo().unwrap()),
            vec![(2, Direction::Down), (2, Direction::Up)]
        );
    }
}
