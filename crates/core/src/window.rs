use crate::photo::Photo;
use chrono::{Days, Months, NaiveDate};
use std::fmt;

/// Inclusive date range used to decide which track files are relevant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub oldest: NaiveDate,
    pub newest: NaiveDate,
}

impl TimeWindow {
    /// Whether a `YYYYMMDD` key falls inside the window.
    ///
    /// Keys are fixed-width and zero padded, so string order matches date order.
    pub fn contains_key(&self, key: &str) -> bool {
        let oldest = date_key(self.oldest);
        let newest = date_key(self.newest);
        oldest.as_str() <= key && key <= newest.as_str()
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.contains_key(&date_key(date))
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..={}", self.oldest, self.newest)
    }
}

pub fn date_key(date: NaiveDate) -> String {
    date.format("%Y%m%d").to_string()
}

/// Window for track discovery.
///
/// `months_back` wins when set. Otherwise the photo range is padded by one day
/// before and one month after. Returns `None` when there is nothing to span.
pub fn compute_window(
    months_back: Option<u32>,
    photos: &[Photo],
    today: NaiveDate,
) -> Option<TimeWindow> {
    if let Some(months) = months_back {
        let oldest = today
            .checked_sub_months(Months::new(months))
            .unwrap_or(NaiveDate::MIN);
        return Some(TimeWindow {
            oldest,
            newest: today,
        });
    }

    let dates = photos.iter().map(|photo| photo.timestamp().date());
    let min = dates.clone().min()?;
    let max = dates.max()?;
    Some(TimeWindow {
        oldest: min.checked_sub_days(Days::new(1)).unwrap_or(min),
        newest: max.checked_add_months(Months::new(1)).unwrap_or(max),
    })
}
