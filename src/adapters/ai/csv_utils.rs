//! CSV rendering of the daily breakdown appended to analysis prompts.
//!
//! Semicolon-delimited, one row per insight record, cost always in currency units.

use crate::domain::insights::{normalize, Cost, DailyMetrics};
use crate::domain::metrics::fixed2;
use crate::domain::InsightBatch;
use rust_decimal::Decimal;

const HEADER: [&str; 5] = ["Date", "Impressions", "Clicks", "Cost", "Conversions"];

fn cost_units(cost: Cost) -> Decimal {
    match cost {
        Cost::Currency(amount) => fixed2(amount),
        Cost::Micros(micros) => fixed2(Decimal::from(micros) / Decimal::from(1_000_000u64)),
    }
}

fn row(daily: &DailyMetrics) -> [String; 5] {
    [
        daily.date.clone().unwrap_or_else(|| "-".to_string()),
        daily.impressions.to_string(),
        daily.clicks.to_string(),
        cost_units(daily.cost).to_string(),
        daily.conversions.to_string(),
    ]
}

/// `Date;Impressions;Clicks;Cost;Conversions` with a header row.
///
/// Returns `Ok(None)` for an empty batch so callers can omit the section entirely.
pub fn daily_breakdown_csv(batch: &InsightBatch) -> Result<Option<String>, csv::Error> {
    if batch.is_empty() {
        return Ok(None);
    }

    let mut wtr = csv::WriterBuilder::new()
        .delimiter(b';')
        .has_headers(false)
        .from_writer(Vec::new());

    wtr.write_record(HEADER)?;
    for daily in normalize(batch) {
        wtr.write_record(row(&daily))?;
    }

    wtr.flush()?;
    let bytes = wtr
        .into_inner()
        .map_err(|e| csv::Error::from(std::io::Error::other(e.to_string())))?;

    String::from_utf8(bytes)
        .map(Some)
        .map_err(|e| {
            csv::Error::from(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                e.to_string(),
            ))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::insights::{GoogleInsight, GoogleMetricValues, GoogleSegments, MetaInsight, RawNumber};

    #[test]
    fn empty_batch_has_no_csv() {
        assert!(daily_breakdown_csv(&InsightBatch::Meta(Vec::new())).unwrap().is_none());
    }

    #[test]
    fn meta_rows_render_currency() {
        let batch = InsightBatch::Meta(vec![MetaInsight {
            impressions: RawNumber::new("1200"),
            clicks: RawNumber::new("35"),
            spend: RawNumber::new("12.3"),
            conversions: RawNumber::new("2"),
            date_start: Some("2024-03-01".into()),
            date_stop: Some("2024-03-01".into()),
        }]);
        let csv = daily_breakdown_csv(&batch).unwrap().unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], "Date;Impressions;Clicks;Cost;Conversions");
        assert_eq!(lines[1], "2024-03-01;1200;35;12.30;2");
    }

    #[test]
    fn google_micros_convert_to_units() {
        let batch = InsightBatch::Google(vec![GoogleInsight {
            metrics: GoogleMetricValues {
                impressions: RawNumber::new("950"),
                clicks: RawNumber::new("28"),
                cost_micros: RawNumber::new("32005000"),
                conversions: RawNumber::default(),
            },
            segments: GoogleSegments {
                date: None,
            },
        }]);
        let csv = daily_breakdown_csv(&batch).unwrap().unwrap();
        assert_eq!(csv.lines().nth(1), Some("-;950;28;32.01;0"));
    }
}
