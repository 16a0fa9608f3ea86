use std::cmp::Ordering;

use chrono::{Datelike, NaiveDate};

use crate::models::{
    ActivityRecord, CategoryAmount, CategoryBreakdownEntry, CategoryTrendPoint,
    MonthlyBreakdownEntry, MonthlyCategoryBreakdown, PeriodSummary,
};

pub const OTHERS_CATEGORY: &str = "Others";
pub const UNCATEGORIZED: &str = "Uncategorized";
/// Month label for a period that has no start date.
pub const UNKNOWN_MONTH: &str = "00-00-00";

fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

// ---------------------------------------------------------------------------
// Category breakdown
// ---------------------------------------------------------------------------

/// Positive spend per category across `periods`, largest first.
///
/// Only positive amounts count toward a category and categories that end up at zero are left
/// out. Totals are rounded to cents. Equal totals keep the order in which the categories were
/// first seen. With `top_n`, everything past the first `top_n` entries is folded into a trailing
/// `Others` entry, which is present even when nothing was folded.
pub fn category_breakdown(
    periods: &[PeriodSummary],
    top_n: Option<usize>,
) -> Vec<CategoryBreakdownEntry> {
    let mut totals: Vec<CategoryBreakdownEntry> = Vec::new();
    for period in periods {
        for CategoryAmount { category, amount } in &period.categories {
            if *amount <= 0.0 {
                continue;
            }
            match totals.iter_mut().find(|e| &e.category == category) {
                Some(existing) => existing.amount += amount,
                None => totals.push(CategoryBreakdownEntry {
                    category: category.clone(),
                    amount: *amount,
                }),
            }
        }
    }

    let mut entries: Vec<CategoryBreakdownEntry> = totals
        .into_iter()
        .map(|e| CategoryBreakdownEntry {
            amount: round_cents(e.amount),
            ..e
        })
        .filter(|e| e.amount > 0.0)
        .collect();
    // sort_by is stable, so ties stay in first-seen order
    entries.sort_by(|a, b| b.amount.partial_cmp(&a.amount).unwrap_or(Ordering::Equal));

    let Some(top_n) = top_n else {
        return entries;
    };
    let rest = if entries.len() > top_n {
        entries.split_off(top_n)
    } else {
        Vec::new()
    };
    let others: f64 = rest.iter().map(|e| e.amount).sum();
    entries.push(CategoryBreakdownEntry {
        category: OTHERS_CATEGORY.to_string(),
        amount: round_cents(others),
    });
    entries
}

// ---------------------------------------------------------------------------
// Monthly breakdown
// ---------------------------------------------------------------------------

fn month_label(period: &PeriodSummary) -> String {
    period
        .start_date
        .clone()
        .unwrap_or_else(|| UNKNOWN_MONTH.to_string())
}

fn positive_spend(period: &PeriodSummary) -> f64 {
    period
        .categories
        .iter()
        .map(|c| c.amount)
        .filter(|a| *a > 0.0)
        .sum()
}

/// Total positive spend per period, one entry per period in the order given.
pub fn monthly_breakdown(periods: &[PeriodSummary]) -> Vec<MonthlyBreakdownEntry> {
    periods
        .iter()
        .map(|period| MonthlyBreakdownEntry {
            month: month_label(period),
            amount: round_cents(positive_spend(period)),
            start_date: period.start_date.clone(),
            end_date: period.end_date.clone(),
        })
        .collect()
}

/// A period's spend with its `top_n` largest categories itemized and the rest folded into
/// `Others`. The itemized entries and `Others` add up to `amount`.
pub fn monthly_category_breakdown(
    period: &PeriodSummary,
    top_n: usize,
) -> MonthlyCategoryBreakdown {
    MonthlyCategoryBreakdown {
        month: month_label(period),
        amount: round_cents(positive_spend(period)),
        start_date: period.start_date.clone(),
        end_date: period.end_date.clone(),
        breakdown: category_breakdown(std::slice::from_ref(period), Some(top_n)),
    }
}

/// Net amount booked to `category` in each period, in the order given. Periods without the
/// category report 0.
pub fn category_trend(periods: &[PeriodSummary], category: &str) -> Vec<CategoryTrendPoint> {
    periods
        .iter()
        .map(|period| {
            let amount: f64 = period
                .categories
                .iter()
                .filter(|c| c.category == category)
                .map(|c| c.amount)
                .sum();
            CategoryTrendPoint {
                month: month_label(period),
                amount: round_cents(amount),
            }
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Periods
// ---------------------------------------------------------------------------

/// Newest period first. Periods missing a start date compare equal to everything.
pub fn sort_by_recency(periods: &mut [PeriodSummary]) {
    periods.sort_by(|a, b| match (&a.start_date, &b.start_date) {
        (Some(a), Some(b)) => b.cmp(a),
        _ => Ordering::Equal,
    });
}

fn last_day_of_month(date: NaiveDate) -> Option<NaiveDate> {
    let (y, m) = if date.month() == 12 {
        (date.year() + 1, 1)
    } else {
        (date.year(), date.month() + 1)
    };
    NaiveDate::from_ymd_opt(y, m, 1)?.pred_opt()
}

/// Calendar months touching `[start, end]`, as inclusive `(first_day, last_day)` date strings.
pub fn month_periods(start: NaiveDate, end: NaiveDate) -> Vec<(String, String)> {
    let mut periods = Vec::new();
    let Some(mut current) = start.with_day(1) else {
        return periods;
    };
    while current <= end {
        let Some(last) = last_day_of_month(current) else {
            break;
        };
        periods.push((
            current.format("%Y-%m-%d").to_string(),
            last.format("%Y-%m-%d").to_string(),
        ));
        let Some(next) = last.succ_opt() else {
            break;
        };
        current = next;
    }
    periods
}

/// One summary per `(start, end)` period, summing record amounts per category for records dated
/// within the period (both ends inclusive). Records without a category are grouped as
/// `Uncategorized`.
pub fn summarize_periods(
    records: &[ActivityRecord],
    periods: &[(String, String)],
) -> Vec<PeriodSummary> {
    periods
        .iter()
        .map(|(start, end)| {
            let mut categories: Vec<CategoryAmount> = Vec::new();
            for r in records
                .iter()
                .filter(|r| r.date.as_str() >= start.as_str() && r.date.as_str() <= end.as_str())
            {
                let name = if r.category.trim().is_empty() {
                    UNCATEGORIZED
                } else {
                    r.category.as_str()
                };
                match categories.iter_mut().find(|c| c.category == name) {
                    Some(existing) => existing.amount += r.amount,
                    None => categories.push(CategoryAmount {
                        category: name.to_string(),
                        amount: r.amount,
                    }),
                }
            }
            PeriodSummary {
                start_date: Some(start.clone()),
                end_date: Some(end.clone()),
                categories,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn period(start: Option<&str>, cats: &[(&str, f64)]) -> PeriodSummary {
        PeriodSummary {
            start_date: start.map(str::to_string),
            end_date: None,
            categories: cats
                .iter()
                .map(|(c, a)| CategoryAmount {
                    category: c.to_string(),
                    amount: *a,
                })
                .collect(),
        }
    }

    fn entry(category: &str, amount: f64) -> CategoryBreakdownEntry {
        CategoryBreakdownEntry {
            category: category.to_string(),
            amount,
        }
    }

    #[test]
    fn test_top_n_folds_rest_into_others() {
        let periods = vec![period(
            Some("2025-01-01"),
            &[("C", 10.0), ("A", 50.0), ("D", 5.0), ("B", 30.0)],
        )];
        let result = category_breakdown(&periods, Some(2));
        assert_eq!(result, vec![entry("A", 50.0), entry("B", 30.0), entry("Others", 15.0)]);
    }

    #[test]
    fn test_others_appended_even_when_empty() {
        let periods = vec![period(None, &[("A", 5.0)])];
        let result = category_breakdown(&periods, Some(3));
        assert_eq!(result, vec![entry("A", 5.0), entry("Others", 0.0)]);
    }

    #[test]
    fn test_no_top_n_returns_everything_summed_across_periods() {
        let periods = vec![
            period(Some("2025-02-01"), &[("Dining", 20.0), ("Rent", 1000.0)]),
            period(Some("2025-01-01"), &[("Dining", 15.5), ("Refund", -30.0)]),
        ];
        let result = category_breakdown(&periods, None);
        assert_eq!(result, vec![entry("Rent", 1000.0), entry("Dining", 35.5)]);

        let total: f64 = result.iter().map(|e| e.amount).sum();
        assert_eq!(total, 1035.5);
    }

    #[test]
    fn test_negative_and_zero_categories_excluded() {
        let periods = vec![period(None, &[("Refunds", -10.0), ("Zero", 0.0), ("Fees", 0.001)])];
        assert!(category_breakdown(&periods, None).is_empty());
    }

    #[test]
    fn test_amounts_rounded_to_cents() {
        let periods = vec![period(None, &[("A", 0.1), ("A", 0.2), ("B", 1.005)])];
        let result = category_breakdown(&periods, None);
        assert_eq!(result[0].category, "B");
        assert_eq!(result[1], entry("A", 0.3));
    }

    #[test]
    fn test_ties_keep_first_seen_order() {
        let periods = vec![period(None, &[("X", 10.0), ("Y", 20.0), ("Z", 10.0), ("W", 10.0)])];
        let result = category_breakdown(&periods, None);
        let names: Vec<&str> = result.iter().map(|e| e.category.as_str()).collect();
        assert_eq!(names, vec!["Y", "X", "Z", "W"]);
    }

    #[test]
    fn test_monthly_breakdown_preserves_order_and_count() {
        let periods = vec![
            period(Some("2025-03-01"), &[("A", 10.0), ("Refund", -4.0)]),
            period(None, &[("A", 1.0)]),
            period(Some("2025-01-01"), &[]),
        ];
        let result = monthly_breakdown(&periods);
        assert_eq!(result.len(), 3);
        assert_eq!(result[0].month, "2025-03-01");
        assert_eq!(result[0].amount, 10.0);
        assert_eq!(result[1].month, UNKNOWN_MONTH);
        assert_eq!(result[1].start_date, None);
        assert_eq!(result[2].month, "2025-01-01");
        assert_eq!(result[2].amount, 0.0);
    }

    #[test]
    fn test_monthly_category_breakdown_itemizes_top_categories() {
        let p = PeriodSummary {
            start_date: Some("2025-03-01".to_string()),
            end_date: Some("2025-03-31".to_string()),
            categories: vec![
                CategoryAmount { category: "Rent".to_string(), amount: 1200.0 },
                CategoryAmount { category: "Dining".to_string(), amount: 80.0 },
                CategoryAmount { category: "Gas".to_string(), amount: 45.5 },
                CategoryAmount { category: "Refund".to_string(), amount: -20.0 },
                CategoryAmount { category: "Books".to_string(), amount: 12.25 },
            ],
        };
        let month = monthly_category_breakdown(&p, 2);
        assert_eq!(month.month, "2025-03-01");
        assert_eq!(month.end_date.as_deref(), Some("2025-03-31"));
        assert_eq!(month.amount, 1337.75);
        assert_eq!(
            month.breakdown,
            vec![entry("Rent", 1200.0), entry("Dining", 80.0), entry("Others", 57.75)]
        );
        let itemized: f64 = month.breakdown.iter().map(|e| e.amount).sum();
        assert_eq!(itemized, month.amount);
    }

    #[test]
    fn test_monthly_category_breakdown_of_empty_period() {
        let month = monthly_category_breakdown(&period(None, &[]), 5);
        assert_eq!(month.month, UNKNOWN_MONTH);
        assert_eq!(month.amount, 0.0);
        assert_eq!(month.breakdown, vec![entry("Others", 0.0)]);
    }

    #[test]
    fn test_category_trend_one_point_per_period() {
        let periods = vec![
            period(Some("2025-01-01"), &[("Dining", 20.0), ("Gas", 10.0), ("Dining", 5.5)]),
            period(Some("2025-02-01"), &[("Gas", 30.0)]),
            period(Some("2025-03-01"), &[("Dining", 12.0), ("Dining", -2.0)]),
        ];
        let trend = category_trend(&periods, "Dining");
        let points: Vec<(&str, f64)> = trend.iter().map(|p| (p.month.as_str(), p.amount)).collect();
        assert_eq!(points, vec![("2025-01-01", 25.5), ("2025-02-01", 0.0), ("2025-03-01", 10.0)]);
        assert!(category_trend(&[], "Dining").is_empty());
    }

    #[test]
    fn test_sort_by_recency() {
        let mut periods = vec![
            period(Some("2025-01-01"), &[]),
            period(Some("2025-03-01"), &[]),
            period(Some("2025-02-01"), &[]),
        ];
        sort_by_recency(&mut periods);
        let starts: Vec<_> = periods.iter().map(|p| p.start_date.clone().unwrap()).collect();
        assert_eq!(starts, vec!["2025-03-01", "2025-02-01", "2025-01-01"]);
    }

    #[test]
    fn test_month_periods_cover_range() {
        let start = NaiveDate::from_ymd_opt(2024, 11, 15).unwrap();
        let end = NaiveDate::from_ymd_opt(2025, 2, 3).unwrap();
        let periods = month_periods(start, end);
        assert_eq!(
            periods,
            vec![
                ("2024-11-01".to_string(), "2024-11-30".to_string()),
                ("2024-12-01".to_string(), "2024-12-31".to_string()),
                ("2025-01-01".to_string(), "2025-01-31".to_string()),
                ("2025-02-01".to_string(), "2025-02-28".to_string()),
            ]
        );
    }

    #[test]
    fn test_summarize_periods_groups_by_category() {
        let records = vec![
            ActivityRecord::new("1", "2025-01-31", "", "Dining", 10.0, "a"),
            ActivityRecord::new("2", "2025-02-01", "", "Dining", 5.0, "b"),
            ActivityRecord::new("3", "2025-02-14", "", "", 7.0, "c"),
            ActivityRecord::new("4", "2025-02-28", "", "Dining", 2.5, "d"),
        ];
        let periods = vec![
            ("2025-01-01".to_string(), "2025-01-31".to_string()),
            ("2025-02-01".to_string(), "2025-02-28".to_string()),
        ];
        let summaries = summarize_periods(&records, &periods);
        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[0].categories.len(), 1);
        assert_eq!(summaries[0].categories[0].amount, 10.0);
        assert_eq!(
            summaries[1].categories,
            vec![
                CategoryAmount { category: "Dining".to_string(), amount: 7.5 },
                CategoryAmount { category: UNCATEGORIZED.to_string(), amount: 7.0 },
            ]
        );
    }
}
