use chrono::{Datelike, NaiveDate};

const SHORT_MONTHS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

// School years run July through June.
const SCHOOL_YEAR_START_MONTH: u32 = 7;

// Turns a gradebook date such as `"Sep-14"` into a full date.
//
// The portal never prints a year and only ever shows the current school
// year, so the year is inferred from `today`: July to December belong to the
// calendar year the school year started in, January to June to the next one.
pub fn parse_portal_date(text: &str, today: NaiveDate) -> Option<NaiveDate> {
    let (month, day) = text.trim().split_once('-')?;
    let month = SHORT_MONTHS.iter().position(|m| *m == month)? as u32 + 1;
    let day: u32 = day.parse().ok()?;

    let school_year_start = if today.month() >= SCHOOL_YEAR_START_MONTH {
        today.year()
    } else {
        today.year() - 1
    };
    let year = if month >= SCHOOL_YEAR_START_MONTH {
        school_year_start
    } else {
        school_year_start + 1
    };

    NaiveDate::from_ymd_opt(year, month, day)
}
