//! Ensemble votes, risk levels and prediction records.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::account::UserId;
use super::features::{Domain, FeatureVector};

/// Classifier family in the three-model ensemble.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelTag {
    /// Tabular foundation-model classifier
    Tabpfn,
    /// Gradient-boosted trees (XGBoost export)
    Xgb,
    /// Gradient-boosted trees (LightGBM export)
    Lgb,
}

impl ModelTag {
    /// Every family, in evaluation order.
    pub const ALL: [ModelTag; 3] = [ModelTag::Tabpfn, ModelTag::Xgb, ModelTag::Lgb];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Tabpfn => "tabpfn",
            Self::Xgb => "xgb",
            Self::Lgb => "lgb",
        }
    }
}

impl std::fmt::Display for ModelTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-family binary labels (0 = negative, 1 = positive).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Votes(BTreeMap<ModelTag, u8>);

impl Votes {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a family's label; any non-zero label counts as positive.
    pub fn insert(&mut self, tag: ModelTag, label: u8) {
        self.0.insert(tag, u8::from(label != 0));
    }

    #[must_use]
    pub fn get(&self, tag: ModelTag) -> Option<u8> {
        self.0.get(&tag).copied()
    }

    /// Number of positive votes.
    #[must_use]
    pub fn total(&self) -> u8 {
        self.0.values().sum()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ModelTag, u8)> + '_ {
        self.0.iter().map(|(t, v)| (*t, *v))
    }
}

impl FromIterator<(ModelTag, u8)> for Votes {
    fn from_iter<I: IntoIterator<Item = (ModelTag, u8)>>(iter: I) -> Self {
        let mut votes = Self::new();
        for (tag, label) in iter {
            votes.insert(tag, label);
        }
        votes
    }
}

/// Three-level risk category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    /// No family voted positive
    Low,
    /// One or two families voted positive
    Medium,
    /// All three families voted positive
    High,
}

impl RiskLevel {
    /// Ordinal used by trend charts (low=1, medium=2, high=3).
    #[must_use]
    pub fn ordinal(self) -> u8 {
        match self {
            Self::Low => 1,
            Self::Medium => 2,
            Self::High => 3,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RiskLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            other => Err(format!("unknown risk level '{other}'")),
        }
    }
}

/// Map a positive-vote count to a risk level.
///
/// Shared by both domains: 0 is low, 1-2 medium, 3 high.
#[must_use]
pub fn classify_risk(total: u8) -> RiskLevel {
    if total > 2 {
        RiskLevel::High
    } else if total >= 1 {
        RiskLevel::Medium
    } else {
        RiskLevel::Low
    }
}

/// Reduce ensemble votes to a risk level.
#[must_use]
pub fn aggregate(votes: &Votes) -> RiskLevel {
    classify_risk(votes.total())
}

/// Outcome of one assessment, before persistence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assessment {
    #[serde(flatten)]
    pub votes: Votes,
    pub risk: RiskLevel,
}

impl Assessment {
    #[must_use]
    pub fn from_votes(votes: Votes) -> Self {
        let risk = aggregate(&votes);
        Self { votes, risk }
    }
}

/// Stored prediction (append-only history row).
#[derive(Debug, Clone, PartialEq)]
pub struct PredictionRecord {
    pub id: String,
    pub user_id: UserId,
    pub domain: Domain,
    pub features: FeatureVector,
    pub votes: Votes,
    pub risk: RiskLevel,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl PredictionRecord {
    /// Create a new record stamped with the current time.
    #[must_use]
    pub fn new(user_id: UserId, features: FeatureVector, assessment: Assessment) -> Self {
        Self {
            id: uuid_v4(),
            user_id,
            domain: features.domain(),
            features,
            votes: assessment.votes,
            risk: assessment.risk,
            created_at: chrono::Utc::now(),
        }
    }
}

/// Generate a random UUID v4 string using a ChaCha20 CSPRNG.
pub(crate) fn uuid_v4() -> String {
    use rand::Rng;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    let mut rng = ChaCha20Rng::from_entropy();
    let bytes: [u8; 16] = rng.gen();

    format!(
        "{:02x}{:02x}{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}{:02x}{:02x}{:02x}{:02x}",
        bytes[0], bytes[1], bytes[2], bytes[3],
        bytes[4], bytes[5],
        (bytes[6] & 0x0f) | 0x40, bytes[7],
        (bytes[8] & 0x3f) | 0x80, bytes[9],
        bytes[10], bytes[11], bytes[12], bytes[13], bytes[14], bytes[15]
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn votes(tabpfn: u8, xgb: u8, lgb: u8) -> Votes {
        [(ModelTag::Tabpfn, tabpfn), (ModelTag::Xgb, xgb), (ModelTag::Lgb, lgb)]
            .into_iter()
            .collect()
    }

    #[test]
    fn test_classify_risk_partition() {
        assert_eq!(classify_risk(0), RiskLevel::Low);
        assert_eq!(classify_risk(1), RiskLevel::Medium);
        assert_eq!(classify_risk(2), RiskLevel::Medium);
        assert_eq!(classify_risk(3), RiskLevel::High);
    }

    #[test]
    fn test_both_call_site_rules_agree() {
        // diabetes: > 2 high, > 0 medium; heart: > 2 high, >= 1 medium
        let diabetes = |t: u8| {
            if t > 2 {
                RiskLevel::High
            } else if t > 0 {
                RiskLevel::Medium
            } else {
                RiskLevel::Low
            }
        };
        let heart = |t: u8| {
            if t > 2 {
                RiskLevel::High
            } else if t >= 1 {
                RiskLevel::Medium
            } else {
                RiskLevel::Low
            }
        };
        for total in 0..=3 {
            assert_eq!(diabetes(total), classify_risk(total));
            assert_eq!(heart(total), classify_risk(total));
        }
    }

    #[test]
    fn test_aggregate_votes() {
        assert_eq!(aggregate(&votes(1, 1, 0)), RiskLevel::Medium);
        assert_eq!(aggregate(&votes(1, 1, 1)), RiskLevel::High);
        assert_eq!(aggregate(&votes(0, 0, 0)), RiskLevel::Low);
    }

    #[test]
    fn test_votes_coerce_to_binary() {
        let v = votes(7, 0, 1);
        assert_eq!(v.get(ModelTag::Tabpfn), Some(1));
        assert_eq!(v.total(), 2);
    }

    #[test]
    fn test_assessment_serializes_flat() {
        let assessment = Assessment::from_votes(votes(1, 1, 0));
        let json = serde_json::to_value(&assessment).expect("serialize");
        assert_eq!(
            json,
            serde_json::json!({"tabpfn": 1, "xgb": 1, "lgb": 0, "risk": "medium"})
        );
    }

    #[test]
    fn test_risk_ordinals() {
        assert_eq!(RiskLevel::Low.ordinal(), 1);
        assert_eq!(RiskLevel::Medium.ordinal(), 2);
        assert_eq!(RiskLevel::High.ordinal(), 3);
        assert_eq!("HIGH".parse::<RiskLevel>(), Ok(RiskLevel::High));
    }

    #[test]
    fn test_uuid_generation() {
        let id1 = uuid_v4();
        let id2 = uuid_v4();
        assert_ne!(id1, id2);
        assert_eq!(id1.len(), 36);
    }
}
