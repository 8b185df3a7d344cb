//! Business day helpers
//!
//! Doctor schedules store the working day as an Indonesian day name
//! (`SENIN`, `SELASA`, ...). Queue queries match registrations by date and
//! schedules by that name.

use chrono::{Datelike, Local, NaiveDate, Weekday};

/// Schedule day name for a weekday
pub fn day_name(weekday: Weekday) -> &'static str {
    match weekday {
        Weekday::Sun => "AKHAD",
        Weekday::Mon => "SENIN",
        Weekday::Tue => "SELASA",
        Weekday::Wed => "RABU",
        Weekday::Thu => "KAMIS",
        Weekday::Fri => "JUMAT",
        Weekday::Sat => "SABTU",
    }
}

/// Parse a schedule day name, case-insensitively
pub fn parse_day_name(name: &str) -> Option<Weekday> {
    match name.trim().to_ascii_uppercase().as_str() {
        "AKHAD" => Some(Weekday::Sun),
        "SENIN" => Some(Weekday::Mon),
        "SELASA" => Some(Weekday::Tue),
        "RABU" => Some(Weekday::Wed),
        "KAMIS" => Some(Weekday::Thu),
        "JUMAT" => Some(Weekday::Fri),
        "SABTU" => Some(Weekday::Sat),
        _ => None,
    }
}

/// A registration date together with its schedule day name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusinessDay {
    pub date: NaiveDate,
    pub day: &'static str,
}

impl BusinessDay {
    pub fn from_date(date: NaiveDate) -> Self {
        Self {
            date,
            day: day_name(date.weekday()),
        }
    }

    /// Today in the server's local time zone
    pub fn today() -> Self {
        Self::from_date(Local::now().date_naive())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_day_names() {
        assert_eq!(day_name(Weekday::Sun), "AKHAD");
        assert_eq!(day_name(Weekday::Fri), "JUMAT");

        for weekday in [
            Weekday::Mon,
            Weekday::Tue,
            Weekday::Wed,
            Weekday::Thu,
            Weekday::Fri,
            Weekday::Sat,
            Weekday::Sun,
        ] {
            assert_eq!(parse_day_name(day_name(weekday)), Some(weekday));
        }
        assert_eq!(parse_day_name(" senin "), Some(Weekday::Mon));
        assert_eq!(parse_day_name("MONDAY"), None);
    }

    #[test]
    fn test_business_day_from_date() {
        let day = BusinessDay::from_date(NaiveDate::from_ymd_opt(2024, 3, 8).unwrap());
        assert_eq!(day.day, "JUMAT");
    }
}
