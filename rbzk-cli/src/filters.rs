//! Date filtering for downloaded attendance logs

use chrono::{Datelike, Duration, NaiveDate};
use clap::Args;

use rbzk::Attendance;

#[derive(Debug, Default, Args)]
pub struct LogFilter {
    /// Only today's punches
    #[arg(long, conflicts_with_all = ["yesterday", "week", "month"])]
    pub today: bool,

    /// Only yesterday's punches
    #[arg(long, conflicts_with_all = ["week", "month"])]
    pub yesterday: bool,

    /// Punches since the start of the current week
    #[arg(long, conflicts_with = "month")]
    pub week: bool,

    /// Punches since the start of the current month
    #[arg(long)]
    pub month: bool,

    /// Start date, YYYY-MM-DD
    #[arg(long)]
    pub start_date: Option<NaiveDate>,

    /// End date, YYYY-MM-DD
    #[arg(long)]
    pub end_date: Option<NaiveDate>,

    /// Keep only the most recent N punches
    #[arg(long)]
    pub limit: Option<usize>,
}

impl LogFilter {
    /// Resolve the shorthand flags into a date range relative to
    /// `today`; explicit dates win over shorthands.
    fn range(&self, today: NaiveDate) -> (Option<NaiveDate>, Option<NaiveDate>) {
        let (mut start, mut end) = if self.today {
            (Some(today), Some(today))
        } else if self.yesterday {
            let y = today - Duration::days(1);
            (Some(y), Some(y))
        } else if self.week {
            let monday = today - Duration::days(today.weekday().num_days_from_monday() as i64);
            (Some(monday), Some(today))
        } else if self.month {
            (today.with_day(1), Some(today))
        } else {
            (None, None)
        };

        if self.start_date.is_some() {
            start = self.start_date;
        }
        if self.end_date.is_some() {
            end = self.end_date;
        }

        (start, end)
    }

    /// Filter already-downloaded logs.
    pub fn apply(&self, logs: Vec<Attendance>, today: NaiveDate) -> Vec<Attendance> {
        let (start, end) = self.range(today);

        let mut kept: Vec<Attendance> = logs
            .into_iter()
            .filter(|log| {
                let date = log.timestamp.date();
                start.is_none_or(|s| date >= s) && end.is_none_or(|e| date <= e)
            })
            .collect();

        if let Some(limit) = self.limit {
            if kept.len() > limit {
                kept.drain(..kept.len() - limit);
            }
        }

        kept
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Timelike};
    use pretty_assertions::assert_eq;

    fn log(date: NaiveDate, h: u32) -> Attendance {
        Attendance {
            uid: 1,
            user_id: "10".to_string(),
            timestamp: date.and_hms_opt(h, 0, 0).unwrap(),
            status: 1,
            punch: 0,
        }
    }

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn sample() -> Vec<Attendance> {
        vec![
            log(day(2025, 6, 1), 8),
            log(day(2025, 6, 9), 8),  // Monday
            log(day(2025, 6, 11), 8),
            log(day(2025, 6, 12), 8), // "today"
            log(day(2025, 6, 12), 17),
        ]
    }

    #[test]
    fn test_no_filter_keeps_everything() {
        let filter = LogFilter::default();
        assert_eq!(filter.apply(sample(), day(2025, 6, 12)).len(), 5);
    }

    #[test]
    fn test_today() {
        let filter = LogFilter {
            today: true,
            ..LogFilter::default()
        };
        let kept = filter.apply(sample(), day(2025, 6, 12));
        assert_eq!(kept.len(), 2);
    }

    #[test]
    fn test_yesterday() {
        let filter = LogFilter {
            yesterday: true,
            ..LogFilter::default()
        };
        let kept = filter.apply(sample(), day(2025, 6, 12));
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].timestamp.date(), day(2025, 6, 11));
    }

    #[test]
    fn test_week_starts_monday() {
        // 2025-06-12 is a Thursday; the week began on the 9th
        let filter = LogFilter {
            week: true,
            ..LogFilter::default()
        };
        let kept = filter.apply(sample(), day(2025, 6, 12));
        assert_eq!(kept.len(), 4);
    }

    #[test]
    fn test_month() {
        let filter = LogFilter {
            month: true,
            ..LogFilter::default()
        };
        let kept = filter.apply(sample(), day(2025, 6, 12));
        assert_eq!(kept.len(), 5);
    }

    #[test]
    fn test_explicit_range_wins() {
        let filter = LogFilter {
            month: true,
            start_date: Some(day(2025, 6, 10)),
            end_date: Some(day(2025, 6, 11)),
            ..LogFilter::default()
        };
        let kept = filter.apply(sample(), day(2025, 6, 12));
        assert_eq!(kept.len(), 1);
    }

    #[test]
    fn test_limit_keeps_most_recent() {
        let filter = LogFilter {
            limit: Some(2),
            ..LogFilter::default()
        };
        let kept = filter.apply(sample(), day(2025, 6, 12));
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[1].timestamp.hour(), 17);
    }
}
