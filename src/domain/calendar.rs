//! US exchange calendar: weekends and the federal holidays the exchange
//! closes for.
//!
//! Columbus Day and Veterans Day are bank holidays only; the exchange trades
//! on them. Juneteenth closes the exchange from 2022. Fixed-date holidays
//! falling on a Saturday are observed on the Friday before, on a Sunday the
//! Monday after, except New Year's Day on a Saturday, which is not observed.

use chrono::{Datelike, Duration, NaiveDate, Weekday};

pub fn is_weekend(date: NaiveDate) -> bool {
    matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

pub fn is_trading_day(date: NaiveDate) -> bool {
    !is_weekend(date) && !is_us_holiday(date)
}

/// First trading day strictly after `date`.
pub fn next_trading_day(date: NaiveDate) -> NaiveDate {
    let mut next = date + Duration::days(1);
    while !is_trading_day(next) {
        next += Duration::days(1);
    }
    next
}

pub fn is_us_holiday(date: NaiveDate) -> bool {
    us_holidays(date.year()).contains(&date)
}

pub fn us_holidays(year: i32) -> Vec<NaiveDate> {
    let mut days = Vec::with_capacity(9);

    days.extend(new_year(year));
    days.extend(nth_weekday(year, 1, Weekday::Mon, 3));
    days.extend(nth_weekday(year, 2, Weekday::Mon, 3));
    days.extend(last_weekday(year, 5, Weekday::Mon));
    if year >= 2022 {
        days.extend(observed(year, 6, 19));
    }
    days.extend(observed(year, 7, 4));
    days.extend(nth_weekday(year, 9, Weekday::Mon, 1));
    days.extend(nth_weekday(year, 11, Weekday::Thu, 4));
    days.extend(observed(year, 12, 25));

    days
}

fn new_year(year: i32) -> Option<NaiveDate> {
    let date = NaiveDate::from_ymd_opt(year, 1, 1)?;
    match date.weekday() {
        Weekday::Sat => None,
        Weekday::Sun => Some(date + Duration::days(1)),
        _ => Some(date),
    }
}

fn observed(year: i32, month: u32, day: u32) -> Option<NaiveDate> {
    let date = NaiveDate::from_ymd_opt(year, month, day)?;
    Some(match date.weekday() {
        Weekday::Sat => date - Duration::days(1),
        Weekday::Sun => date + Duration::days(1),
        _ => date,
    })
}

fn nth_weekday(year: i32, month: u32, weekday: Weekday, n: u8) -> Option<NaiveDate> {
    NaiveDate::from_weekday_of_month_opt(year, month, weekday, n)
}

fn last_weekday(year: i32, month: u32, weekday: Weekday) -> Option<NaiveDate> {
    let first_of_next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)?
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)?
    };
    let last = first_of_next - Duration::days(1);
    let back = (7 + last.weekday().num_days_from_monday() - weekday.num_days_from_monday()) % 7;
    Some(last - Duration::days(back as i64))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn weekends_are_not_trading_days() {
        assert!(!is_trading_day(d(2021, 10, 16))); // Saturday
        assert!(!is_trading_day(d(2021, 10, 17))); // Sunday
        assert!(is_trading_day(d(2021, 10, 15)));
    }

    #[test]
    fn floating_holidays_2021() {
        assert!(is_us_holiday(d(2021, 1, 18))); // MLK
        assert!(is_us_holiday(d(2021, 2, 15))); // Washington's Birthday
        assert!(is_us_holiday(d(2021, 5, 31))); // Memorial Day
        assert!(is_us_holiday(d(2021, 9, 6))); // Labor Day
        assert!(is_us_holiday(d(2021, 11, 25))); // Thanksgiving
    }

    #[test]
    fn observed_fixed_holidays() {
        // 2021-07-04 is a Sunday
        assert!(is_us_holiday(d(2021, 7, 5)));
        // 2021-12-25 is a Saturday
        assert!(is_us_holiday(d(2021, 12, 24)));
        // 2023-01-01 is a Sunday
        assert!(is_us_holiday(d(2023, 1, 2)));
    }

    #[test]
    fn saturday_new_year_is_not_observed() {
        // 2022-01-01 is a Saturday; the exchange opened on Dec 31
        assert!(is_trading_day(d(2021, 12, 31)));
        assert!(!is_us_holiday(d(2022, 1, 1)));
    }

    #[test]
    fn exchange_trades_on_bank_only_holidays() {
        assert!(is_trading_day(d(2020, 10, 12))); // Columbus Day
        assert!(is_trading_day(d(2021, 10, 11))); // Columbus Day
        assert!(is_trading_day(d(2020, 11, 11))); // Veterans Day
    }

    #[test]
    fn juneteenth_only_from_2022() {
        assert!(is_trading_day(d(2021, 6, 18))); // Jun 19 2021 is a Saturday
        assert!(!is_us_holiday(d(2020, 6, 19)));
        assert!(is_us_holiday(d(2022, 6, 20))); // observed, Jun 19 is a Sunday
        assert!(is_us_holiday(d(2023, 6, 19)));
    }

    #[test]
    fn ordinary_day_is_not_a_holiday() {
        assert!(!is_us_holiday(d(2021, 3, 10)));
    }

    #[test]
    fn next_trading_day_skips_weekend_and_holiday() {
        // Friday 2021-09-03 → Labor Day Monday → Tuesday
        assert_eq!(next_trading_day(d(2021, 9, 3)), d(2021, 9, 7));
        assert_eq!(next_trading_day(d(2021, 3, 10)), d(2021, 3, 11));
    }

    #[test]
    fn last_weekday_of_month() {
        assert_eq!(last_weekday(2020, 5, Weekday::Mon), Some(d(2020, 5, 25)));
        assert_eq!(last_weekday(2021, 12, Weekday::Fri), Some(d(2021, 12, 31)));
    }
}
