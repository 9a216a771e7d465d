//! Raw per-platform insight records and their normalization into uniform daily rows.
//!
//! Ad platforms report numeric metrics as decimal strings (sometimes as bare numbers).
//! Normalization never fails: anything missing or unparsable becomes zero.

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::str::FromStr;

/// A metric value exactly as the provider sent it.
///
/// Strings are kept verbatim, numbers are kept in their JSON text form,
/// anything else (null, objects, arrays) is treated as absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawNumber(Option<String>);

impl RawNumber {
    pub fn new(value: impl Into<String>) -> Self {
        Self(Some(value.into()))
    }

    pub fn as_str(&self) -> Option<&str> {
        self.0.as_deref()
    }

    /// Non-negative integer; fractional values truncate, garbage is zero.
    pub fn count(&self) -> u64 {
        let Some(text) = self.as_str().map(str::trim) else {
            return 0;
        };
        if let Ok(n) = text.parse::<u64>() {
            return n;
        }
        match text.parse::<f64>() {
            Ok(f) if f.is_finite() && f > 0.0 => f.trunc() as u64,
            _ => 0,
        }
    }

    /// Non-negative decimal amount; garbage is zero.
    pub fn amount(&self) -> Decimal {
        self.as_str()
            .map(str::trim)
            .and_then(|s| Decimal::from_str(s).ok())
            .filter(|d| d.is_sign_positive())
            .unwrap_or(Decimal::ZERO)
    }
}

impl<'de> Deserialize<'de> for RawNumber {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = serde_json::Value::deserialize(deserializer)?;
        Ok(match value {
            serde_json::Value::String(s) => RawNumber(Some(s)),
            serde_json::Value::Number(n) => RawNumber(Some(n.to_string())),
            _ => RawNumber(None),
        })
    }
}

impl Serialize for RawNumber {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match &self.0 {
            Some(s) => serializer.serialize_str(s),
            None => serializer.serialize_none(),
        }
    }
}

/// One row of Meta's `/insights` edge (with `time_increment=1`, one per day).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetaInsight {
    #[serde(default)]
    pub impressions: RawNumber,
    #[serde(default)]
    pub clicks: RawNumber,
    #[serde(default)]
    pub spend: RawNumber,
    #[serde(default)]
    pub conversions: RawNumber,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_start: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_stop: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoogleMetricValues {
    #[serde(default)]
    pub impressions: RawNumber,
    #[serde(default)]
    pub clicks: RawNumber,
    #[serde(default)]
    pub cost_micros: RawNumber,
    #[serde(default)]
    pub conversions: RawNumber,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GoogleSegments {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
}

/// One row of a Google Ads `customer` query segmented by date.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GoogleInsight {
    #[serde(default)]
    pub metrics: GoogleMetricValues,
    #[serde(default)]
    pub segments: GoogleSegments,
}

/// Raw insight records, tagged by the platform that produced them.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum InsightBatch {
    Meta(Vec<MetaInsight>),
    Google(Vec<GoogleInsight>),
}

impl InsightBatch {
    pub fn len(&self) -> usize {
        match self {
            InsightBatch::Meta(rows) => rows.len(),
            InsightBatch::Google(rows) => rows.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Cost in the platform's native unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cost {
    /// Currency units, e.g. yen or dollars (Meta `spend`).
    Currency(Decimal),
    /// Millionths of a currency unit (Google `costMicros`).
    Micros(u64),
}

/// A normalized per-period record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DailyMetrics {
    pub date: Option<String>,
    pub impressions: u64,
    pub clicks: u64,
    pub conversions: u64,
    pub cost: Cost,
}

impl MetaInsight {
    pub fn normalize(&self) -> DailyMetrics {
        DailyMetrics {
            date: self.date_start.clone(),
            impressions: self.impressions.count(),
            clicks: self.clicks.count(),
            conversions: self.conversions.count(),
            cost: Cost::Currency(self.spend.amount()),
        }
    }
}

impl GoogleInsight {
    pub fn normalize(&self) -> DailyMetrics {
        DailyMetrics {
            date: self.segments.date.clone(),
            impressions: self.metrics.impressions.count(),
            clicks: self.metrics.clicks.count(),
            conversions: self.metrics.conversions.count(),
            cost: Cost::Micros(self.metrics.cost_micros.count()),
        }
    }
}

/// Normalize every record of a batch, preserving order.
pub fn normalize(batch: &InsightBatch) -> Vec<DailyMetrics> {
    match batch {
        InsightBatch::Meta(rows) => rows.iter().map(MetaInsight::normalize).collect(),
        InsightBatch::Google(rows) => rows.iter().map(GoogleInsight::normalize).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_number_parses_strings_and_numbers() {
        let row: MetaInsight = serde_json::from_str(
            r#"{"impressions":"1200","clicks":35,"spend":"12.34","conversions":null,"date_start":"2024-03-01"}"#,
        )
        .unwrap();
        let daily = row.normalize();
        assert_eq!(daily.impressions, 1200);
        assert_eq!(daily.clicks, 35);
        assert_eq!(daily.conversions, 0);
        assert_eq!(daily.cost, Cost::Currency(Decimal::new(1234, 2)));
        assert_eq!(daily.date.as_deref(), Some("2024-03-01"));
    }

    #[test]
    fn unparsable_fields_degrade_to_zero() {
        let row: MetaInsight = serde_json::from_str(
            r#"{"impressions":"n/a","clicks":{"value":3},"spend":"-5","conversions":"7.9"}"#,
        )
        .unwrap();
        let daily = row.normalize();
        assert_eq!(daily.impressions, 0);
        assert_eq!(daily.clicks, 0);
        assert_eq!(daily.cost, Cost::Currency(Decimal::ZERO));
        assert_eq!(daily.conversions, 7);
    }

    #[test]
    fn google_rows_read_nested_metrics() {
        let row: GoogleInsight = serde_json::from_str(
            r#"{"metrics":{"impressions":"950","clicks":"28","costMicros":"32000000","conversions":2.0},
                "segments":{"date":"2024-03-02"}}"#,
        )
        .unwrap();
        let daily = row.normalize();
        assert_eq!(daily.impressions, 950);
        assert_eq!(daily.clicks, 28);
        assert_eq!(daily.conversions, 2);
        assert_eq!(daily.cost, Cost::Micros(32_000_000));
    }

    #[test]
    fn missing_blocks_normalize_to_zero_record() {
        let row: GoogleInsight = serde_json::from_str("{}").unwrap();
        assert_eq!(
            row.normalize(),
            DailyMetrics {
                date: None,
                impressions: 0,
                clicks: 0,
                conversions: 0,
                cost: Cost::Micros(0),
            }
        );
    }
}
