//! Metric aggregation: fold daily rows into totals, then derive CTR and cost ratios.
//!
//! Currency totals are re-rounded to two decimals after every fold step, so stored
//! snapshots match the running-total behaviour reports have always had.
//! Ratios are zero whenever their denominator is zero.

use crate::domain::entities::Platform;
use crate::domain::insights::{normalize, Cost, InsightBatch};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

const MICROS_PER_UNIT: u64 = 1_000_000;

/// Round half away from zero and pin the scale to two digits ("2.8" -> "2.80").
pub fn fixed2(value: Decimal) -> Decimal {
    let mut rounded = value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(2);
    rounded
}

/// `numerator / denominator`, or zero when the denominator is zero.
fn ratio(numerator: Decimal, denominator: Decimal) -> Decimal {
    if denominator.is_zero() {
        return fixed2(Decimal::ZERO);
    }
    fixed2(numerator.checked_div(denominator).unwrap_or(Decimal::ZERO))
}

fn micros_to_units(micros: u64) -> Decimal {
    Decimal::from(micros) / Decimal::from(MICROS_PER_UNIT)
}

/// Aggregated Meta snapshot. Keys match what reports have always stored for Meta.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MetaMetrics {
    pub impressions: u64,
    pub clicks: u64,
    pub spend: Decimal,
    pub conversions: u64,
    pub ctr: Decimal,
    pub cpc: Decimal,
    pub cost_per_conversion: Decimal,
}

/// Aggregated Google snapshot; cost stays in micros.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct GoogleMetrics {
    pub impressions: u64,
    pub clicks: u64,
    #[serde(with = "micros_as_string")]
    pub cost_micros: u64,
    pub conversions: u64,
    pub ctr: Decimal,
    pub average_cpc: Decimal,
    pub cost_per_conversion: Decimal,
}

/// Platform-agnostic view over an aggregated snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CanonicalMetrics {
    Meta(MetaMetrics),
    Google(GoogleMetrics),
}

impl CanonicalMetrics {
    pub fn platform(&self) -> Platform {
        match self {
            CanonicalMetrics::Meta(_) => Platform::Meta,
            CanonicalMetrics::Google(_) => Platform::Google,
        }
    }

    pub fn impressions(&self) -> u64 {
        match self {
            CanonicalMetrics::Meta(m) => m.impressions,
            CanonicalMetrics::Google(m) => m.impressions,
        }
    }

    pub fn clicks(&self) -> u64 {
        match self {
            CanonicalMetrics::Meta(m) => m.clicks,
            CanonicalMetrics::Google(m) => m.clicks,
        }
    }

    pub fn conversions(&self) -> u64 {
        match self {
            CanonicalMetrics::Meta(m) => m.conversions,
            CanonicalMetrics::Google(m) => m.conversions,
        }
    }

    pub fn ctr(&self) -> Decimal {
        match self {
            CanonicalMetrics::Meta(m) => m.ctr,
            CanonicalMetrics::Google(m) => m.ctr,
        }
    }

    pub fn cost_per_click(&self) -> Decimal {
        match self {
            CanonicalMetrics::Meta(m) => m.cpc,
            CanonicalMetrics::Google(m) => m.average_cpc,
        }
    }

    pub fn cost_per_conversion(&self) -> Decimal {
        match self {
            CanonicalMetrics::Meta(m) => m.cost_per_conversion,
            CanonicalMetrics::Google(m) => m.cost_per_conversion,
        }
    }

    /// Total spend in currency units, two decimals.
    pub fn total_spend(&self) -> Decimal {
        match self {
            CanonicalMetrics::Meta(m) => m.spend,
            CanonicalMetrics::Google(m) => fixed2(micros_to_units(m.cost_micros)),
        }
    }
}

#[derive(Default)]
struct Totals {
    impressions: u64,
    clicks: u64,
    conversions: u64,
    spend: Decimal,
    cost_micros: u64,
}

/// Fold a batch into one snapshot of the batch's platform.
pub fn aggregate(batch: &InsightBatch) -> CanonicalMetrics {
    let mut totals = Totals {
        spend: fixed2(Decimal::ZERO),
        ..Totals::default()
    };
    for row in normalize(batch) {
        totals.impressions = totals.impressions.saturating_add(row.impressions);
        totals.clicks = totals.clicks.saturating_add(row.clicks);
        totals.conversions = totals.conversions.saturating_add(row.conversions);
        match row.cost {
            Cost::Currency(amount) => {
                totals.spend = fixed2(totals.spend.saturating_add(amount));
            }
            Cost::Micros(micros) => {
                totals.cost_micros = totals.cost_micros.saturating_add(micros);
            }
        }
    }

    let impressions = Decimal::from(totals.impressions);
    let clicks = Decimal::from(totals.clicks);
    let conversions = Decimal::from(totals.conversions);
    let ctr = if totals.impressions == 0 {
        fixed2(Decimal::ZERO)
    } else {
        ratio(clicks * Decimal::ONE_HUNDRED, impressions)
    };

    match batch {
        InsightBatch::Meta(_) => CanonicalMetrics::Meta(MetaMetrics {
            impressions: totals.impressions,
            clicks: totals.clicks,
            spend: totals.spend,
            conversions: totals.conversions,
            ctr,
            cpc: ratio(totals.spend, clicks),
            cost_per_conversion: ratio(totals.spend, conversions),
        }),
        InsightBatch::Google(_) => {
            let cost = micros_to_units(totals.cost_micros);
            CanonicalMetrics::Google(GoogleMetrics {
                impressions: totals.impressions,
                clicks: totals.clicks,
                cost_micros: totals.cost_micros,
                conversions: totals.conversions,
                ctr,
                average_cpc: ratio(cost, clicks),
                cost_per_conversion: ratio(cost, conversions),
            })
        }
    }
}

/// Empty snapshot for a platform (no insight rows in the period).
pub fn empty(platform: Platform) -> CanonicalMetrics {
    match platform {
        Platform::Meta => aggregate(&InsightBatch::Meta(Vec::new())),
        Platform::Google => aggregate(&InsightBatch::Google(Vec::new())),
    }
}

mod micros_as_string {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &u64, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::insights::{GoogleInsight, GoogleMetricValues, MetaInsight, RawNumber};

    fn meta_row(impressions: &str, clicks: &str, spend: &str, conversions: &str) -> MetaInsight {
        MetaInsight {
            impressions: RawNumber::new(impressions),
            clicks: RawNumber::new(clicks),
            spend: RawNumber::new(spend),
            conversions: RawNumber::new(conversions),
            ..MetaInsight::default()
        }
    }

    fn google_row(impressions: &str, clicks: &str, micros: &str, conversions: &str) -> GoogleInsight {
        GoogleInsight {
            metrics: GoogleMetricValues {
                impressions: RawNumber::new(impressions),
                clicks: RawNumber::new(clicks),
                cost_micros: RawNumber::new(micros),
                conversions: RawNumber::new(conversions),
            },
            ..GoogleInsight::default()
        }
    }

    #[test]
    fn weekly_meta_scenario() {
        let batch = InsightBatch::Meta(vec![meta_row("125000", "3500", "4500.50", "280")]);
        let CanonicalMetrics::Meta(m) = aggregate(&batch) else {
            panic!("expected meta metrics");
        };
        assert_eq!(m.ctr.to_string(), "2.80");
        assert_eq!(m.cpc.to_string(), "1.29");
        assert_eq!(m.cost_per_conversion.to_string(), "16.07");
        assert_eq!(m.spend.to_string(), "4500.50");
    }

    #[test]
    fn google_micros_scenario() {
        let batch = InsightBatch::Google(vec![google_row("95000", "2800", "3200000000", "220")]);
        let CanonicalMetrics::Google(m) = aggregate(&batch) else {
            panic!("expected google metrics");
        };
        assert_eq!(m.ctr.to_string(), "2.95");
        assert_eq!(m.average_cpc.to_string(), "1.14");
        assert_eq!(m.cost_per_conversion.to_string(), "14.55");
        assert_eq!(m.cost_micros, 3_200_000_000);
    }

    #[test]
    fn sums_counters_and_treats_garbage_as_zero() {
        let batch = InsightBatch::Meta(vec![
            meta_row("100", "10", "1.005", "1"),
            meta_row("abc", "5", "2.10", ""),
            meta_row("50", "x", "0.333", "2"),
        ]);
        let metrics = aggregate(&batch);
        assert_eq!(metrics.impressions(), 150);
        assert_eq!(metrics.clicks(), 15);
        assert_eq!(metrics.conversions(), 3);
        // 1.005 -> 1.01, + 2.10 -> 3.11, + 0.333 -> 3.44 (3.443 re-rounded)
        assert_eq!(metrics.total_spend().to_string(), "3.44");
    }

    #[test]
    fn zero_denominators_yield_zero_ratios() {
        for batch in [
            InsightBatch::Meta(Vec::new()),
            InsightBatch::Google(Vec::new()),
            InsightBatch::Meta(vec![meta_row("0", "0", "12.00", "0")]),
            InsightBatch::Google(vec![google_row("0", "0", "5000000", "0")]),
        ] {
            let metrics = aggregate(&batch);
            assert_eq!(metrics.ctr(), Decimal::ZERO);
            assert_eq!(metrics.cost_per_click(), Decimal::ZERO);
            assert_eq!(metrics.cost_per_conversion(), Decimal::ZERO);
            assert!(!metrics.ctr().is_sign_negative());
        }
    }

    #[test]
    fn snapshot_keys_are_platform_specific() {
        let meta = serde_json::to_value(empty(Platform::Meta)).unwrap();
        assert_eq!(meta["spend"], "0.00");
        assert_eq!(meta["cost_per_conversion"], "0.00");

        let google = serde_json::to_value(aggregate(&InsightBatch::Google(vec![google_row(
            "10", "1", "1500000", "0",
        )])))
        .unwrap();
        assert_eq!(google["costMicros"], "1500000");
        assert_eq!(google["averageCpc"], "1.50");
        assert_eq!(google["ctr"], "10.00");
    }

    #[test]
    fn stored_snapshot_deserializes_to_its_platform() {
        let google = aggregate(&InsightBatch::Google(vec![google_row("1", "1", "1", "1")]));
        let json = serde_json::to_string(&google).unwrap();
        let back: CanonicalMetrics = serde_json::from_str(&json).unwrap();
        assert_eq!(back.platform(), Platform::Google);
        assert_eq!(back, google);
    }
}
