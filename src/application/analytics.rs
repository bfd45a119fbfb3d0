//! Analytics: risk distribution, monthly trend and latest risk per domain.
//!
//! [`reduce`] is a pure function over a user's full history; the service only
//! loads that history from storage.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;

use crate::domain::{Domain, PredictionRecord, RiskLevel, UserId};
use crate::ports::PredictionStore;
use crate::GlimpseError;

/// Record count per risk level. All three levels are always present.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RiskCounts {
    pub low: usize,
    pub medium: usize,
    pub high: usize,
}

impl RiskCounts {
    fn add(&mut self, risk: RiskLevel) {
        match risk {
            RiskLevel::Low => self.low += 1,
            RiskLevel::Medium => self.medium += 1,
            RiskLevel::High => self.high += 1,
        }
    }

    #[must_use]
    pub fn total(&self) -> usize {
        self.low + self.medium + self.high
    }
}

/// One value per domain.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PerDomain<T> {
    pub diabetes: T,
    pub heart_disease: T,
}

impl<T> PerDomain<T> {
    fn get_mut(&mut self, domain: Domain) -> &mut T {
        match domain {
            Domain::Diabetes => &mut self.diabetes,
            Domain::HeartDisease => &mut self.heart_disease,
        }
    }
}

/// Month bucket of the trend; each domain carries the ordinal (1-3) of the
/// month's most recent record, or `null`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrendPoint {
    /// `YYYY-MM`, UTC
    pub month: String,
    #[serde(flatten)]
    pub levels: PerDomain<Option<u8>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AnalyticsReport {
    pub counts: PerDomain<RiskCounts>,
    pub trend: Vec<TrendPoint>,
    pub latest: PerDomain<Option<RiskLevel>>,
}

/// Summarize a user's records.
///
/// Input order does not matter; records are ordered by `created_at`, and
/// among equal timestamps the later one in the input wins.
#[must_use]
pub fn reduce(records: &[PredictionRecord]) -> AnalyticsReport {
    let mut ordered: Vec<&PredictionRecord> = records.iter().collect();
    ordered.sort_by_key(|r| r.created_at);

    let mut report = AnalyticsReport::default();
    let mut months: BTreeMap<String, PerDomain<Option<u8>>> = BTreeMap::new();

    for record in ordered {
        report.counts.get_mut(record.domain).add(record.risk);
        *report.latest.get_mut(record.domain) = Some(record.risk);

        let month = record.created_at.format("%Y-%m").to_string();
        *months.entry(month).or_default().get_mut(record.domain) = Some(record.risk.ordinal());
    }

    report.trend = months
        .into_iter()
        .map(|(month, levels)| TrendPoint { month, levels })
        .collect();
    report
}

/// Service for per-user analytics.
pub struct AnalyticsService<S>
where
    S: PredictionStore,
{
    storage: Arc<S>,
}

impl<S> AnalyticsService<S>
where
    S: PredictionStore,
    S::Error: Into<crate::adapters::StorageError>,
{
    /// Create a new analytics service.
    pub fn new(storage: Arc<S>) -> Self {
        Self { storage }
    }

    /// Build the analytics report for `user`.
    ///
    /// # Errors
    /// Returns error if storage fails.
    pub fn report(&self, user: UserId) -> Result<AnalyticsReport, GlimpseError> {
        let records = self
            .storage
            .history(user)
            .map_err(|e| GlimpseError::Storage(e.into()))?;
        let report = reduce(&records);

        tracing::info!(
            user = %user,
            records = records.len(),
            months = report.trend.len(),
            "Generated analytics report"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::SqliteStorage;
    use crate::domain::{Assessment, FeatureVector, ModelTag, Votes};
    use chrono::{TimeZone, Utc};

    fn record(domain: Domain, positives: u8, (y, m, d): (i32, u32, u32)) -> PredictionRecord {
        let width = domain.feature_names().len();
        let votes: Votes = ModelTag::ALL
            .into_iter()
            .enumerate()
            .map(|(i, tag)| (tag, u8::from((i as u8) < positives)))
            .collect();
        let mut rec = PredictionRecord::new(
            UserId(1),
            FeatureVector::from_numbers(domain, &vec![0.0; width]).expect("vector"),
            Assessment::from_votes(votes),
        );
        rec.created_at = Utc
            .with_ymd_and_hms(y, m, d, 8, 30, 0)
            .single()
            .expect("valid date");
        rec
    }

    #[test]
    fn test_empty_history() {
        let report = reduce(&[]);
        assert_eq!(report.counts.diabetes, RiskCounts::default());
        assert!(report.trend.is_empty());
        assert_eq!(report.latest.heart_disease, None);
    }

    #[test]
    fn test_counts_per_domain() {
        let records = vec![
            record(Domain::Diabetes, 0, (2024, 1, 1)),
            record(Domain::Diabetes, 2, (2024, 1, 2)),
            record(Domain::Diabetes, 3, (2024, 2, 1)),
            record(Domain::HeartDisease, 1, (2024, 1, 3)),
        ];
        let report = reduce(&records);
        assert_eq!(
            report.counts.diabetes,
            RiskCounts {
                low: 1,
                medium: 1,
                high: 1
            }
        );
        assert_eq!(report.counts.heart_disease.medium, 1);
        assert_eq!(report.counts.heart_disease.total(), 1);
    }

    #[test]
    fn test_month_bucket_uses_latest_record() {
        // Out of order on purpose.
        let records = vec![
            record(Domain::Diabetes, 3, (2024, 3, 20)),
            record(Domain::Diabetes, 0, (2024, 3, 2)),
            record(Domain::HeartDisease, 1, (2024, 1, 15)),
            record(Domain::Diabetes, 1, (2024, 1, 10)),
        ];
        let report = reduce(&records);

        let months: Vec<&str> = report.trend.iter().map(|p| p.month.as_str()).collect();
        assert_eq!(months, vec!["2024-01", "2024-03"]);

        assert_eq!(report.trend[0].levels.diabetes, Some(2));
        assert_eq!(report.trend[0].levels.heart_disease, Some(2));
        assert_eq!(report.trend[1].levels.diabetes, Some(3));
        assert_eq!(report.trend[1].levels.heart_disease, None);

        assert_eq!(report.latest.diabetes, Some(RiskLevel::High));
        assert_eq!(report.latest.heart_disease, Some(RiskLevel::Medium));
    }

    #[test]
    fn test_trend_serializes_flat() {
        let report = reduce(&[record(Domain::HeartDisease, 3, (2023, 12, 31))]);
        let json = serde_json::to_value(&report).expect("serialize");
        assert_eq!(
            json["trend"][0],
            serde_json::json!({"month": "2023-12", "diabetes": null, "heart_disease": 3})
        );
        assert_eq!(json["latest"]["heart_disease"], "high");
        assert_eq!(json["counts"]["diabetes"]["low"], 0);
    }

    #[test]
    fn test_service_reads_user_history() {
        let storage = Arc::new(SqliteStorage::in_memory().expect("Should create db"));
        storage
            .record(&record(Domain::Diabetes, 2, (2024, 5, 5)))
            .expect("save");
        let service = AnalyticsService::new(Arc::clone(&storage));

        let report = service.report(UserId(1)).expect("report");
        assert_eq!(report.counts.diabetes.medium, 1);
        assert_eq!(service.report(UserId(2)).expect("report").trend.len(), 0);
    }
}
