use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;
use tracing::debug;

/// The three balance categories checked on every chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Spendable,
    Staking,
    Unbonding,
}

impl Category {
    pub const ALL: [Category; 3] = [Category::Spendable, Category::Staking, Category::Unbonding];

    /// Human-facing check name used in logs and error reports.
    pub fn check_name(&self) -> &'static str {
        match self {
            Category::Spendable => "balance",
            Category::Staking => "staking balance",
            Category::Unbonding => "unbonding balance",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.check_name())
    }
}

/// First key on which the two sides disagree.
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize)]
#[error("{key}: {expected} != {}", .actual.as_deref().unwrap_or("<missing>"))]
pub struct Mismatch {
    pub key: String,
    pub expected: String,
    /// `None` when the key is absent on the actual side
    pub actual: Option<String>,
}

/// Category-specific key -> exact decimal amount string.
///
/// Keys are denoms for spendable balances, canonical validator addresses for
/// staking, and `validator_height` for unbonding entries. Amounts are never
/// parsed: two snapshots agree only when the strings are identical.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct BalanceSnapshot(BTreeMap<String, String>);

impl BalanceSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert(&mut self, key: impl Into<String>, amount: impl Into<String>) {
        self.0.insert(key.into(), amount.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Asymmetric containment: every entry of `self` must appear in `actual`
    /// with an identical amount. Extra keys in `actual` are ignored. Stops at
    /// the first differing key.
    pub fn contains(&self, actual: &BalanceSnapshot) -> Result<(), Mismatch> {
        for (key, expected) in &self.0 {
            match actual.0.get(key) {
                Some(amount) if amount == expected => {
                    debug!(key = %key, value = %expected, "balance correct");
                }
                other => {
                    return Err(Mismatch {
                        key: key.clone(),
                        expected: expected.clone(),
                        actual: other.cloned(),
                    });
                }
            }
        }
        Ok(())
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for BalanceSnapshot {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// Heights arrive as JSON numbers from the aggregator and as strings from
/// the node; both must render identically.
pub fn normalize_height(raw: &str) -> String {
    let trimmed = raw.trim();
    match trimmed.parse::<u64>() {
        Ok(height) => height.to_string(),
        Err(_) => trimmed.to_string(),
    }
}

pub fn unbonding_key(validator: &str, creation_height: &str) -> String {
    format!("{}_{}", validator, normalize_height(creation_height))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(entries: &[(&str, &str)]) -> BalanceSnapshot {
        entries.iter().copied().collect()
    }

    #[test]
    fn test_extra_actual_keys_are_ignored() {
        let expected = snapshot(&[("atom", "100")]);
        let actual = snapshot(&[("atom", "100"), ("osmo", "5")]);
        assert!(expected.contains(&actual).is_ok());
    }

    #[test]
    fn test_differing_value_names_key_and_both_values() {
        let expected = snapshot(&[("atom", "100")]);
        let actual = snapshot(&[("atom", "99")]);

        let mismatch = expected.contains(&actual).unwrap_err();
        assert_eq!(mismatch.key, "atom");
        assert_eq!(mismatch.expected, "100");
        assert_eq!(mismatch.actual.as_deref(), Some("99"));
        assert_eq!(mismatch.to_string(), "atom: 100 != 99");
    }

    #[test]
    fn test_missing_key_on_actual_side_fails() {
        let expected = snapshot(&[("uatom", "1")]);
        let mismatch = expected.contains(&BalanceSnapshot::new()).unwrap_err();
        assert_eq!(mismatch.actual, None);
        assert!(mismatch.to_string().contains("<missing>"));
    }

    #[test]
    fn test_empty_expected_is_always_contained() {
        let actual = snapshot(&[("uatom", "1")]);
        assert!(BalanceSnapshot::new().contains(&actual).is_ok());
    }

    #[test]
    fn test_comparison_is_on_exact_strings() {
        let expected = snapshot(&[("uatom", "100")]);
        let actual = snapshot(&[("uatom", "100.0")]);
        assert!(expected.contains(&actual).is_err());
    }

    #[test]
    fn test_stops_at_first_failing_key() {
        let expected = snapshot(&[("a", "1"), ("b", "2")]);
        let actual = snapshot(&[("a", "0"), ("b", "0")]);
        let mismatch = expected.contains(&actual).unwrap_err();
        assert_eq!(mismatch.key, "a");
    }

    #[test]
    fn test_unbonding_key_normalizes_height() {
        assert_eq!(unbonding_key("abcd", "42"), "abcd_42");
        assert_eq!(unbonding_key("abcd", " 0042 "), "abcd_42");
        assert_eq!(unbonding_key("abcd", &42u64.to_string()), "abcd_42");
    }

    #[test]
    fn test_check_names() {
        assert_eq!(Category::Spendable.to_string(), "balance");
        assert_eq!(Category::Staking.to_string(), "staking balance");
        assert_eq!(Category::Unbonding.to_string(), "unbonding balance");
    }
}
