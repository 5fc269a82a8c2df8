//! Year-bucketed sales aggregation over an uploaded row set.
//!
//! Coercion rules:
//! * the date field must be a string in one of the accepted layouts, otherwise the row is dropped;
//! * a sales field that is absent, `null` or blank marks the row as missing and drops it;
//! * any other sales value that is not a finite, non-negative number counts as `0`.

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::config::AnalyticsConfig;
use crate::domain::rows::Row;
use crate::error::{InsightError, InsightResult};

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
];

const OFFSET_DATETIME_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%z", "%Y-%m-%d %H:%M:%S%z"];

// Day/month order does not matter here, only the year is kept.
const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%m/%d/%Y",
    "%d/%m/%Y",
    "%d-%m-%Y",
    "%m-%d-%Y",
    "%b %d, %Y",
    "%B %d, %Y",
    "%d %b %Y",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SalesAggregate {
    pub year: i32,
    pub sales: f64,
    pub percentage: f64,
}

#[derive(Debug, Clone)]
pub struct AnalyticsEngine {
    date_field: String,
    sales_field: String,
}

impl AnalyticsEngine {
    pub fn new(config: &AnalyticsConfig) -> Self {
        Self {
            date_field: config.date_field.clone(),
            sales_field: config.sales_field.clone(),
        }
    }

    /// One entry per year present, ascending. `NoData` when no row survives filtering.
    pub fn sales_by_year(&self, rows: &[Row]) -> InsightResult<Vec<SalesAggregate>> {
        let mut per_year: BTreeMap<i32, f64> = BTreeMap::new();
        let mut skipped = 0usize;

        for row in rows {
            let year = row.get(&self.date_field).and_then(parse_year);
            let sales = coerce_sales(row.get(&self.sales_field));
            match (year, sales) {
                (Some(year), Some(sales)) => *per_year.entry(year).or_insert(0.0) += sales,
                _ => skipped += 1,
            }
        }

        if per_year.is_empty() {
            log::info!("No usable rows for aggregation ({} rows skipped).", rows.len());
            return Err(InsightError::NoData);
        }
        if skipped > 0 {
            log::debug!("Skipped {} of {} rows during aggregation.", skipped, rows.len());
        }

        let grand_total: f64 = per_year.values().sum();
        Ok(per_year
            .into_iter()
            .map(|(year, total)| SalesAggregate {
                year,
                sales: round2(total),
                percentage: if grand_total > 0.0 {
                    round2(total / grand_total * 100.0)
                } else {
                    0.0
                },
            })
            .collect())
    }
}

/// Year of a date-like value, `None` when it cannot be parsed.
pub fn parse_year(value: &Value) -> Option<i32> {
    let text = value.as_str()?.trim();
    if text.is_empty() {
        return None;
    }
    if text.len() == 4 && text.chars().all(|c| c.is_ascii_digit()) {
        return text.parse().ok();
    }
    if let Ok(timestamp) = DateTime::parse_from_rfc3339(text) {
        return Some(timestamp.year());
    }
    if let Some(timestamp) = OFFSET_DATETIME_FORMATS
        .iter()
        .find_map(|fmt| DateTime::parse_from_str(text, fmt).ok())
    {
        return Some(timestamp.year());
    }
    if let Some(dt) = DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
    {
        return Some(dt.year());
    }
    if let Some(date) = DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(text, fmt).ok())
    {
        return Some(date.year());
    }
    // year-month, e.g. "2020-06"
    NaiveDate::parse_from_str(&format!("{}-01", text), "%Y-%m-%d")
        .ok()
        .map(|d| d.year())
}

/// Sales amount of a row; `None` only when the value is missing.
pub fn coerce_sales(value: Option<&Value>) -> Option<f64> {
    let raw = match value? {
        Value::Null => return None,
        Value::String(s) if s.trim().is_empty() => return None,
        Value::String(s) => s.trim().parse::<f64>().unwrap_or(0.0),
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::Bool(b) => {
            if *b {
                1.0
            } else {
                0.0
            }
        }
        Value::Array(_) | Value::Object(_) => 0.0,
    };
    Some(if raw.is_finite() && raw > 0.0 { raw } else { 0.0 })
}

/// Renders one `"<year>: <sales> milioni, <percentage>%"` line per entry.
pub fn render_stats(entries: &[SalesAggregate]) -> String {
    entries
        .iter()
        .map(|e| format!("{}: {:.2} milioni, {:.2}%", e.year, e.sales, e.percentage))
        .collect::<Vec<_>>()
        .join("\n")
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;

    fn engine() -> AnalyticsEngine {
        AnalyticsEngine::new(&AnalyticsConfig::default())
    }

    fn rows(values: Vec<Value>) -> Vec<Row> {
        values
            .into_iter()
            .map(|v| v.as_object().cloned().unwrap())
            .collect()
    }

    #[test]
    fn bad_dates_are_excluded() {
        let data = rows(vec![
            json!({"release_date": "2020-01-01", "total_sales": "10"}),
            json!({"release_date": "2020-06-01", "total_sales": "30"}),
            json!({"release_date": "bad", "total_sales": "5"}),
        ]);
        let stats = engine().sales_by_year(&data).unwrap();
        assert_eq!(
            stats,
            vec![SalesAggregate {
                year: 2020,
                sales: 40.0,
                percentage: 100.0
            }]
        );
    }

    #[test]
    fn empty_row_set_has_no_data() {
        assert_matches!(engine().sales_by_year(&[]), Err(InsightError::NoData));
    }

    #[test]
    fn rows_without_usable_dates_have_no_data() {
        let data = rows(vec![
            json!({"release_date": "soon", "total_sales": 3}),
            json!({"title": "no date at all", "total_sales": 4}),
        ]);
        assert_matches!(engine().sales_by_year(&data), Err(InsightError::NoData));
    }

    #[test]
    fn years_are_ascending_with_shares() {
        let data = rows(vec![
            json!({"release_date": "2021-03-04", "total_sales": 1.5}),
            json!({"release_date": "2019-11-30", "total_sales": "3"}),
            json!({"release_date": "2021-12-31", "total_sales": 1.5}),
            json!({"release_date": "2020-01-01", "total_sales": 2}),
        ]);
        let stats = engine().sales_by_year(&data).unwrap();
        let years: Vec<i32> = stats.iter().map(|s| s.year).collect();
        assert_eq!(years, vec![2019, 2020, 2021]);
        assert_eq!(stats[0].sales, 3.0);
        assert_eq!(stats[0].percentage, 37.5);
        assert_eq!(stats[1].percentage, 25.0);
        assert_eq!(stats[2].sales, 3.0);
        assert_eq!(stats[2].percentage, 37.5);
    }

    #[test]
    fn unparseable_sales_count_as_zero_but_missing_sales_drop_the_row() {
        let data = rows(vec![
            json!({"release_date": "2018-01-01", "total_sales": "n/a"}),
            json!({"release_date": "2019-01-01", "total_sales": null}),
            json!({"release_date": "2020-01-01", "total_sales": "  "}),
            json!({"release_date": "2021-01-01"}),
            json!({"release_date": "2022-01-01", "total_sales": "8"}),
        ]);
        let stats = engine().sales_by_year(&data).unwrap();
        let years: Vec<i32> = stats.iter().map(|s| s.year).collect();
        assert_eq!(years, vec![2018, 2022]);
        assert_eq!(stats[0].sales, 0.0);
        assert_eq!(stats[0].percentage, 0.0);
        assert_eq!(stats[1].percentage, 100.0);
    }

    #[test]
    fn zero_grand_total_yields_zero_percentages() {
        let data = rows(vec![
            json!({"release_date": "2010-05-05", "total_sales": 0}),
            json!({"release_date": "2011-05-05", "total_sales": "oops"}),
            json!({"release_date": "2012-05-05", "total_sales": -4}),
        ]);
        let stats = engine().sales_by_year(&data).unwrap();
        assert_eq!(stats.len(), 3);
        assert!(stats.iter().all(|s| s.percentage == 0.0 && s.sales == 0.0));
    }

    #[test]
    fn shares_sum_to_one_hundred_and_sales_to_grand_total() {
        let mut values = Vec::new();
        let mut grand_total = 0.0;
        for i in 0..97u32 {
            let sales = f64::from(i * 37 % 101) / 7.0;
            grand_total += sales;
            let year = 1990 + (i * 13 % 23);
            values.push(json!({
                "release_date": format!("{}-0{}-1{}", year, 1 + i % 9, i % 10),
                "total_sales": sales.to_string(),
                "title": format!("game {}", i),
            }));
        }
        let stats = engine().sales_by_year(&rows(values)).unwrap();

        let pct_sum: f64 = stats.iter().map(|s| s.percentage).sum();
        let sales_sum: f64 = stats.iter().map(|s| s.sales).sum();
        let tolerance = 0.005 * stats.len() as f64 + 1e-9;
        assert!((pct_sum - 100.0).abs() <= tolerance, "percentages sum to {}", pct_sum);
        assert!((sales_sum - grand_total).abs() <= tolerance, "{} vs {}", sales_sum, grand_total);
        assert!(stats.windows(2).all(|w| w[0].year < w[1].year));
    }

    #[test]
    fn custom_field_names_are_honoured() {
        let engine = AnalyticsEngine::new(&AnalyticsConfig {
            date_field: "published".to_string(),
            sales_field: "units".to_string(),
        });
        let data = rows(vec![
            json!({"published": "2001", "units": 12.346}),
            json!({"release_date": "2002-01-01", "total_sales": 99}),
        ]);
        let stats = engine.sales_by_year(&data).unwrap();
        assert_eq!(stats.len(), 1);
        assert_eq!(stats[0].year, 2001);
        assert_eq!(stats[0].sales, 12.35);
    }

    #[test]
    fn date_layouts() {
        assert_eq!(parse_year(&json!("2020-01-01")), Some(2020));
        assert_eq!(parse_year(&json!("2020-01-01T10:20:30Z")), Some(2020));
        assert_eq!(parse_year(&json!("2020-01-01 10:20:30")), Some(2020));
        assert_eq!(parse_year(&json!("2019/12/31")), Some(2019));
        assert_eq!(parse_year(&json!("12/31/2019")), Some(2019));
        assert_eq!(parse_year(&json!("31/12/2019")), Some(2019));
        assert_eq!(parse_year(&json!("2018-06")), Some(2018));
        assert_eq!(parse_year(&json!(" 1999 ")), Some(1999));
        assert_eq!(parse_year(&json!("bad")), None);
        assert_eq!(parse_year(&json!("")), None);
        assert_eq!(parse_year(&json!("2020-13-45")), None);
        assert_eq!(parse_year(&json!(2020)), None);
        assert_eq!(parse_year(&Value::Null), None);
    }

    #[test]
    fn dashed_named_month_and_offset_layouts() {
        assert_eq!(parse_year(&json!("05-01-2020")), Some(2020));
        assert_eq!(parse_year(&json!("12-31-2019")), Some(2019));
        assert_eq!(parse_year(&json!("Jan 5, 2020")), Some(2020));
        assert_eq!(parse_year(&json!("January 5, 2020")), Some(2020));
        assert_eq!(parse_year(&json!("5 Jan 2020")), Some(2020));
        assert_eq!(parse_year(&json!("2020-01-01T10:00:00+0200")), Some(2020));
        assert_eq!(parse_year(&json!("2021-07-04 08:00:00-0500")), Some(2021));
        assert_eq!(parse_year(&json!("Jan 45, 2020")), None);
    }

    #[test]
    fn sales_coercion() {
        assert_eq!(coerce_sales(Some(&json!("12.5"))), Some(12.5));
        assert_eq!(coerce_sales(Some(&json!(" 7 "))), Some(7.0));
        assert_eq!(coerce_sales(Some(&json!(3))), Some(3.0));
        assert_eq!(coerce_sales(Some(&json!("abc"))), Some(0.0));
        assert_eq!(coerce_sales(Some(&json!("NaN"))), Some(0.0));
        assert_eq!(coerce_sales(Some(&json!(-2.0))), Some(0.0));
        assert_eq!(coerce_sales(Some(&json!(true))), Some(1.0));
        assert_eq!(coerce_sales(Some(&json!([1]))), Some(0.0));
        assert_eq!(coerce_sales(Some(&Value::Null)), None);
        assert_eq!(coerce_sales(Some(&json!(""))), None);
        assert_eq!(coerce_sales(None), None);
    }

    #[test]
    fn stats_text_lines() {
        let text = render_stats(&[
            SalesAggregate { year: 2019, sales: 12.5, percentage: 25.0 },
            SalesAggregate { year: 2020, sales: 37.5, percentage: 75.0 },
        ]);
        assert_eq!(text, "2019: 12.50 milioni, 25.00%\n2020: 37.50 milioni, 75.00%");
    }
}
