mod austin;
mod round_rock;

pub use austin::Austin;
pub use round_rock::RoundRock;

use scraper::Html;

use chrono::NaiveDate;

use crate::error::Result;
use crate::models::{AttendanceEvent, StudentChoice, StudentInfo};
use crate::page_state::PageState;
use crate::transport::{Form, Method};
use crate::utils::hash::sha1_hex;

// Everything that differs between two GradeSpeed installations: URLs, forms,
// table columns, and how to recognise a usable page.
pub trait District: Send + Sync {
    // Short stable key, e.g. `"austin"`.
    fn id(&self) -> &'static str;
    // Display name, e.g. `"Austin ISD"`.
    fn name(&self) -> &'static str;

    // Login page and the form that posts the credentials back to it.
    fn login_url(&self) -> &str;
    fn login_method(&self) -> Method;
    fn make_login_query(&self, user: &str, pass: &str, state: &PageState) -> Form;

    // Whether the page after login asks which student to show.
    fn requires_disambiguation(&self, doc: &Html) -> bool;
    // Page to load the student choices from when they are not on the page
    // returned by the login itself.
    fn student_picker_url(&self) -> Option<&str> {
        None
    }
    // Request that selects one student.
    fn disambiguate_url(&self) -> &str;
    fn disambiguate_method(&self) -> Method;
    fn make_disambiguate_query(&self, student_id: &str, state: &PageState) -> Form;
    fn student_choices(&self, doc: &Html) -> Vec<StudentChoice>;

    // Averages page.
    fn grades_url(&self) -> &str;
    fn grades_method(&self) -> Method;
    fn make_grades_query(&self, state: &PageState) -> Form;

    // Detail page for one cycle.
    fn cycle_url(&self) -> &str;
    fn cycle_method(&self) -> Method;
    // `state` is the averages page's state when the district needs it, otherwise `None`.
    fn make_cycle_query(&self, url_hash: &str, state: Option<&PageState>) -> Form;
    fn cycle_detail_needs_averages_page_state(&self) -> bool;

    // Columns of a course row on the averages page.
    fn title_column(&self) -> usize;
    fn period_column(&self) -> usize;
    fn grades_start_column(&self) -> usize;

    // Percent of a semester grade that comes from the exam (0-100).
    fn exam_weight(&self) -> f64;
    // Grade points added for honors courses; 0 when the district has none.
    fn weighted_gpa_boost(&self) -> f64;

    // Whether the page belongs to a logged-in session, as opposed to a login form or error page.
    fn is_session_valid(&self, doc: &Html) -> bool;

    // Attendance page for the current student.
    fn attendance_url(&self) -> &str;
    fn attendance_method(&self) -> Method;
    // Every absence or tardy listed on the attendance page.
    fn attendance_events(&self, doc: &Html) -> Result<Vec<AttendanceEvent>>;

    // Name and school of the current student, when the page shows them.
    fn student_info(&self, _doc: &Html) -> Option<StudentInfo> {
        None
    }
}

// Every supported district.
pub fn all() -> Vec<Box<dyn District>> {
    vec![Box::new(Austin), Box::new(RoundRock)]
}

// The district with the given `id`, if supported.
pub fn by_id(id: &str) -> Option<Box<dyn District>> {
    all().into_iter().find(|district| district.id() == id)
}

// Builds a form from literal pairs.
fn form<const N: usize>(fields: [(&str, &str); N]) -> Form {
    fields
        .into_iter()
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect()
}

// Echoes a postback field when the page had it; omits it otherwise.
fn echo(form: &mut Form, key: &str, value: Option<&String>) {
    if let Some(value) = value {
        form.insert(key.to_string(), value.clone());
    }
}

// Choice ids hash the name with the portal's student id.
fn student_choice(name: String, student_id: String) -> StudentChoice {
    StudentChoice {
        id: sha1_hex(&format!("{name}|{student_id}")),
        name,
        student_id,
    }
}

// Event ids hash the date with the block, so one absence keeps its id across fetches.
fn attendance_event(date: NaiveDate, block: u32, explanation: String) -> AttendanceEvent {
    AttendanceEvent {
        id: sha1_hex(&format!("{date}|{block}")),
        date,
        block,
        explanation,
    }
}
