use chrono::{Datelike, NaiveDate};
use serde::Serialize;

use super::domain::Locale;

/// Calendar age split into whole years, months and days.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AgeBreakdown {
    pub years: u32,
    pub months: u32,
    pub days: u32,
    #[serde(skip)]
    month_length: u32,
}

/// Calendar subtraction of `date_of_birth` from `today`.
///
/// A negative day difference borrows the length of the month before `today`'s month (and of
/// earlier months if one borrow is not enough, e.g. Jan 31 to Mar 1); a negative month
/// difference borrows twelve months from the years. The leftover days are always shorter than
/// the last borrowed month, or than `today`'s month when nothing was borrowed, so a zero-month
/// breakdown stays under one month in [`AgeBreakdown::in_months`]. Returns `None` for a birth
/// date after `today`.
pub fn calculate_age(date_of_birth: NaiveDate, today: NaiveDate) -> Option<AgeBreakdown> {
    if date_of_birth > today {
        return None;
    }

    let mut years = today.year() - date_of_birth.year();
    let mut months = today.month() as i32 - date_of_birth.month() as i32;
    let mut days = today.day() as i32 - date_of_birth.day() as i32;

    let mut month_length = days_in_month(today.year(), today.month());
    let (mut borrow_year, mut borrow_month) = (today.year(), today.month());
    while days < 0 {
        (borrow_year, borrow_month) = previous_month(borrow_year, borrow_month);
        month_length = days_in_month(borrow_year, borrow_month);
        months -= 1;
        days += month_length as i32;
    }
    while months < 0 {
        years -= 1;
        months += 12;
    }

    Some(AgeBreakdown {
        years: years.max(0) as u32,
        months: months as u32,
        days: days as u32,
        month_length,
    })
}

fn previous_month(year: i32, month: u32) -> (i32, u32) {
    if month == 1 {
        (year - 1, 12)
    } else {
        (year, month - 1)
    }
}

fn days_in_month(year: i32, month: u32) -> u32 {
    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .and_then(|first| first.pred_opt())
        .map(|last| last.day())
        .unwrap_or(30)
}

impl AgeBreakdown {
    /// Fractional age in months; the leftover days count against the last borrowed month's length.
    pub fn in_months(&self) -> f64 {
        let whole = f64::from(self.years) * 12.0 + f64::from(self.months);
        whole + f64::from(self.days) / f64::from(self.month_length.max(1))
    }

    /// Human readable age: years and months once a year old, months and days under a year,
    /// days only under a month.
    pub fn display(&self, locale: Locale) -> String {
        let mut parts = Vec::with_capacity(2);
        if self.years > 0 {
            parts.push(unit(locale, self.years, Unit::Year));
            if self.months > 0 {
                parts.push(unit(locale, self.months, Unit::Month));
            }
        } else if self.months > 0 {
            parts.push(unit(locale, self.months, Unit::Month));
            if self.days > 0 {
                parts.push(unit(locale, self.days, Unit::Day));
            }
        } else if self.days > 0 {
            parts.push(unit(locale, self.days, Unit::Day));
        }

        if parts.is_empty() {
            return match locale {
                Locale::Arabic => "حديث الولادة".to_string(),
                Locale::English => "newborn".to_string(),
            };
        }

        let separator = match locale {
            Locale::Arabic => " و ",
            Locale::English => " and ",
        };
        parts.join(separator)
    }
}

#[derive(Clone, Copy)]
enum Unit {
    Year,
    Month,
    Day,
}

fn unit(locale: Locale, count: u32, unit: Unit) -> String {
    match locale {
        Locale::Arabic => {
            let word = match unit {
                Unit::Year => "سنة",
                Unit::Month => "شهر",
                Unit::Day => "يوم",
            };
            format!("{count} {word}")
        }
        Locale::English => {
            let word = match unit {
                Unit::Year => "year",
                Unit::Month => "month",
                Unit::Day => "day",
            };
            if count == 1 {
                format!("{count} {word}")
            } else {
                format!("{count} {word}s")
            }
        }
    }
}
