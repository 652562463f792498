use std::sync::LazyLock;

use chrono::NaiveDate;
use log::warn;
use regex::Regex;
use scraper::{Html, Selector};

use super::{attendance_event, echo, form, student_choice, District};
use crate::error::{Error, Result};
use crate::models::{AttendanceEvent, StudentChoice};
use crate::page_state::PageState;
use crate::transport::{Form, Method};
use crate::utils::html::{element_text, first_text, has_match};

const LOGIN_URL: &str =
    "https://accesscenter.roundrockisd.org/HomeAccess/Account/LogOn?ReturnUrl=%2fhomeaccess%2f";
const PICKER_URL: &str = "https://accesscenter.roundrockisd.org/HomeAccess/Frame/StudentPicker";
const GRADES_URL: &str = "https://accesscenter.roundrockisd.org/HomeAccess/content/student/gradespeed.aspx?target=https://gradebook.roundrockisd.org/pc/displaygrades.aspx";
const CYCLE_URL: &str = "https://gradebook.roundrockisd.org/pc/displaygrades.aspx";
const ATTENDANCE_URL: &str =
    "https://accesscenter.roundrockisd.org/HomeAccess/Content/Attendance/MonthlyView.aspx";

static BUTTONS: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(".sg-button").expect("button selector"));
static PICKER_ROWS: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(".sg-student-picker-row").expect("picker row selector"));
static PICKER_NAME: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(".sg-picker-student-name").expect("picker name selector"));
static PICKER_ID: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("input[name=studentId]").expect("picker id selector"));
static SESSION_MARKERS: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("#MainContent, form#StudentPicker, .DataTable, table#plnMain_cldAttendance")
        .expect("session selector")
});
static CALENDAR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("table#plnMain_cldAttendance").expect("calendar selector"));
static CALENDAR_HEADER_CELLS: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("table.sg-asp-calendar-header td").expect("calendar header selector")
});
static TD: LazyLock<Selector> = LazyLock::new(|| Selector::parse("td").expect("cell selector"));
static DAY_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d+$").expect("day regex"));

// Round Rock ISD: Home Access Center in front of a GradeSpeed gradebook.
pub struct RoundRock;

impl District for RoundRock {
    fn id(&self) -> &'static str {
        "roundrock"
    }

    fn name(&self) -> &'static str {
        "Round Rock ISD"
    }

    fn login_url(&self) -> &str {
        LOGIN_URL
    }

    fn login_method(&self) -> Method {
        Method::Post
    }

    fn make_login_query(&self, user: &str, pass: &str, state: &PageState) -> Form {
        let mut query = form([
            ("Database", "10"),
            ("LogOnDetails.UserName", user),
            ("LogOnDetails.Password", pass),
        ]);
        echo(&mut query, "__VIEWSTATE", state.viewstate.as_ref());
        echo(&mut query, "__EVENTVALIDATION", state.event_validation.as_ref());
        query
    }

    // Only accounts with several students get a "Change Student" button.
    fn requires_disambiguation(&self, doc: &Html) -> bool {
        doc.select(&BUTTONS)
            .any(|button| element_text(button).contains("Change Student"))
    }

    fn student_picker_url(&self) -> Option<&str> {
        Some(PICKER_URL)
    }

    fn disambiguate_url(&self) -> &str {
        PICKER_URL
    }

    fn disambiguate_method(&self) -> Method {
        Method::Post
    }

    fn make_disambiguate_query(&self, student_id: &str, _state: &PageState) -> Form {
        form([("studentId", student_id), ("url", "/HomeAccess/Home/WeekView")])
    }

    fn student_choices(&self, doc: &Html) -> Vec<StudentChoice> {
        doc.select(&PICKER_ROWS)
            .filter_map(|row| {
                let name = first_text(row, &PICKER_NAME)?;
                let student_id = row.select(&PICKER_ID).next()?.value().attr("value")?.to_string();
                Some(student_choice(name, student_id))
            })
            .collect()
    }

    fn grades_url(&self) -> &str {
        GRADES_URL
    }

    fn grades_method(&self) -> Method {
        Method::Get
    }

    fn make_grades_query(&self, _state: &PageState) -> Form {
        Form::new()
    }

    fn cycle_url(&self) -> &str {
        CYCLE_URL
    }

    fn cycle_method(&self) -> Method {
        Method::Get
    }

    fn make_cycle_query(&self, url_hash: &str, _state: Option<&PageState>) -> Form {
        form([("data", url_hash)])
    }

    fn cycle_detail_needs_averages_page_state(&self) -> bool {
        true
    }

    fn title_column(&self) -> usize {
        0
    }

    fn period_column(&self) -> usize {
        1
    }

    fn grades_start_column(&self) -> usize {
        2
    }

    fn exam_weight(&self) -> f64 {
        15.0
    }

    fn weighted_gpa_boost(&self) -> f64 {
        1.0
    }

    fn is_session_valid(&self, doc: &Html) -> bool {
        has_match(doc, &SESSION_MARKERS)
    }

    fn attendance_url(&self) -> &str {
        ATTENDANCE_URL
    }

    fn attendance_method(&self) -> Method {
        Method::Get
    }

    // A month calendar; days with events carry "block\nexplanation" pairs in their title.
    fn attendance_events(&self, doc: &Html) -> Result<Vec<AttendanceEvent>> {
        let calendar = doc
            .select(&CALENDAR)
            .next()
            .ok_or_else(|| Error::MalformedPage("attendance page has no calendar".to_string()))?;
        // "September 2013"; the cells around it are the previous/next links
        let month = calendar
            .select(&CALENDAR_HEADER_CELLS)
            .nth(1)
            .map(element_text)
            .ok_or_else(|| Error::MalformedPage("attendance calendar has no month".to_string()))?;

        let mut events = Vec::new();
        for cell in calendar.select(&TD) {
            let day = element_text(cell);
            if !DAY_REGEX.is_match(&day) {
                continue;
            }
            let Some(title) = cell.value().attr("title") else {
                continue;
            };
            let Ok(date) = NaiveDate::parse_from_str(&format!("{day} {month}"), "%d %B %Y") else {
                warn!("unreadable attendance day {day} {month}");
                continue;
            };

            let lines: Vec<&str> = title.lines().map(str::trim).collect();
            for pair in lines.chunks(2) {
                match (pair[0].parse::<u32>(), pair.get(1)) {
                    (Ok(block), Some(explanation)) => {
                        events.push(attendance_event(date, block, explanation.to_string()))
                    }
                    _ => warn!("skipping attendance entry {pair:?} on {date}"),
                }
            }
        }

        Ok(events)
    }
}
