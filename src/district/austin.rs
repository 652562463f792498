use std::sync::LazyLock;

use chrono::NaiveDate;
use log::warn;
use scraper::{Html, Selector};

use super::{attendance_event, echo, form, student_choice, District};
use crate::error::{Error, Result};
use crate::models::{AttendanceEvent, StudentChoice, StudentInfo};
use crate::page_state::PageState;
use crate::transport::{Form, Method};
use crate::utils::html::{document_text, element_text, first_text, has_match};

const LOGIN_URL: &str = "https://gradespeed.austinisd.org/pc/default.aspx?DistrictID=227901";
const PARENT_MAIN_URL: &str = "https://gradespeed.austinisd.org/pc/ParentMain.aspx";
const GRADES_URL: &str = "https://gradespeed.austinisd.org/pc/ParentStudentGrades.aspx";
const ATTENDANCE_URL: &str = "https://gradespeed.austinisd.org/pc/ParentStudentAttend.aspx";

static STUDENT_SELECT: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("#_ctl0_ddlStudents").expect("student select selector"));
static STUDENT_OPTIONS: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("#_ctl0_ddlStudents option").expect("student option selector"));
static STUDENT_NAME: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(".StudentName").expect("student name selector"));
static SCHOOL_NAME: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(".DistrictName span").expect("school name selector"));
static DATA_TABLE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(".DataTable").expect("data table selector"));
static DATA_ROWS: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(".DataRow, .DataRowAlt").expect("data row selector"));
static TD: LazyLock<Selector> = LazyLock::new(|| Selector::parse("td").expect("cell selector"));

// Austin ISD: a plain GradeSpeed parent portal.
pub struct Austin;

impl District for Austin {
    fn id(&self) -> &'static str {
        "austin"
    }

    fn name(&self) -> &'static str {
        "Austin ISD"
    }

    fn login_url(&self) -> &str {
        LOGIN_URL
    }

    fn login_method(&self) -> Method {
        Method::Post
    }

    fn make_login_query(&self, user: &str, pass: &str, state: &PageState) -> Form {
        let mut query = form([
            ("__EVENTTARGET", ""),
            ("__EVENTARGUMENT", ""),
            ("__LASTFOCUS", ""),
            ("__scrollLeft", "0"),
            ("__scrollTop", "0"),
            ("ddlDistricts", ""),
            ("txtUserName", user),
            ("txtPassword", pass),
            ("ddlLanguage", "en"),
            ("btnLogOn", "Log On"),
        ]);
        echo(&mut query, "__VIEWSTATE", state.viewstate.as_ref());
        query
    }

    fn requires_disambiguation(&self, doc: &Html) -> bool {
        has_match(doc, &STUDENT_SELECT)
    }

    fn disambiguate_url(&self) -> &str {
        PARENT_MAIN_URL
    }

    fn disambiguate_method(&self) -> Method {
        Method::Post
    }

    fn make_disambiguate_query(&self, student_id: &str, state: &PageState) -> Form {
        let mut query = form([
            ("__EVENTTARGET", "_ctl0$ddlStudents"),
            ("__EVENTARGUMENT", ""),
            ("__LASTFOCUS", ""),
            ("__scrollLeft", "0"),
            ("__scrollTop", "0"),
            ("__RUNEVENTTARGET", ""),
            ("__RUNEVENTARGUMENT", ""),
            ("__RUNEVENTARGUMENT2", ""),
            ("_ctl0:ddlStudents", student_id),
        ]);
        echo(&mut query, "__VIEWSTATE", state.viewstate.as_ref());
        echo(&mut query, "__EVENTVALIDATION", state.event_validation.as_ref());
        query
    }

    fn student_choices(&self, doc: &Html) -> Vec<StudentChoice> {
        doc.select(&STUDENT_OPTIONS)
            .map(|option| {
                let student_id = option.value().attr("value").unwrap_or("").to_string();
                student_choice(element_text(option), student_id)
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
        GRADES_URL
    }

    fn cycle_method(&self) -> Method {
        Method::Get
    }

    fn make_cycle_query(&self, url_hash: &str, _state: Option<&PageState>) -> Form {
        form([("data", url_hash)])
    }

    fn cycle_detail_needs_averages_page_state(&self) -> bool {
        false
    }

    fn title_column(&self) -> usize {
        1
    }

    fn period_column(&self) -> usize {
        2
    }

    fn grades_start_column(&self) -> usize {
        3
    }

    fn exam_weight(&self) -> f64 {
        25.0
    }

    fn weighted_gpa_boost(&self) -> f64 {
        0.0
    }

    fn is_session_valid(&self, doc: &Html) -> bool {
        document_text(doc).contains("Log Out")
    }

    fn student_info(&self, doc: &Html) -> Option<StudentInfo> {
        let name = first_text(doc.root_element(), &STUDENT_NAME)?;
        // "018 - LASA High School"; the number is of no use to anyone
        let school = first_text(doc.root_element(), &SCHOOL_NAME)?;
        let school = school
            .split_once('-')
            .map(|(_, rest)| rest.trim().to_string())
            .unwrap_or(school);
        Some(StudentInfo { name, school })
    }

    fn attendance_url(&self) -> &str {
        ATTENDANCE_URL
    }

    fn attendance_method(&self) -> Method {
        Method::Get
    }

    fn attendance_events(&self, doc: &Html) -> Result<Vec<AttendanceEvent>> {
        let table = doc
            .select(&DATA_TABLE)
            .next()
            .ok_or_else(|| Error::MalformedPage("attendance page has no .DataTable".to_string()))?;

        let mut events = Vec::new();
        let mut current_date: Option<NaiveDate> = None;

        // One row per block; the date cell is only filled on a day's first row
        for row in table.select(&DATA_ROWS) {
            let cells: Vec<String> = row.select(&TD).map(element_text).collect();
            let [date, block, explanation, ..] = cells.as_slice() else {
                return Err(Error::MalformedPage(format!(
                    "attendance row has only {} cells",
                    cells.len()
                )));
            };

            // "9/3/2013 Tue"
            if let Some(day) = date.split(' ').next().filter(|day| !day.is_empty()) {
                current_date = NaiveDate::parse_from_str(day, "%m/%d/%Y").ok();
                if current_date.is_none() {
                    warn!("unreadable attendance date {date:?}");
                }
            }

            let (Some(date), Ok(block)) = (current_date, block.parse::<u32>()) else {
                warn!("skipping attendance row {cells:?}");
                continue;
            };
            events.push(attendance_event(date, block, explanation.clone()));
        }

        Ok(events)
    }
}

#[cfg(test)]
mod test {
    use super::Austin;
    use crate::district::District;
    use crate::error::Error;
    use crate::page_state::PageState;
    use chrono::NaiveDate;
    use scraper::Html;

    const PARENT_MAIN: &str = r#"<html><body>
        <a href="logout.aspx">Log Out</a>
        <div class="StudentHeader"><span class="StudentName">Seifert, Tristan</span></div>
        <div class="DistrictName"><span>018 - LASA High School</span></div>
        <select id="_ctl0_ddlStudents" name="_ctl0:ddlStudents">
            <option value="112840">Seifert, Tristan</option>
            <option value="112841">Seifert, Marie</option>
        </select>
    </body></html>"#;

    #[test]
    fn login_query_echoes_viewstate_only_when_present() {
        let state = PageState { viewstate: Some("vs".to_string()), ..PageState::default() };
        let query = Austin.make_login_query("user", "pass", &state);
        assert_eq!(query.get("__VIEWSTATE").map(String::as_str), Some("vs"));
        assert_eq!(query.get("txtUserName").map(String::as_str), Some("user"));
        assert_eq!(query.get("txtPassword").map(String::as_str), Some("pass"));

        let query = Austin.make_login_query("user", "pass", &PageState::default());
        assert!(!query.contains_key("__VIEWSTATE"));
    }

    #[test]
    fn disambiguation_reads_the_student_dropdown() {
        let doc = Html::parse_document(PARENT_MAIN);
        assert!(Austin.is_session_valid(&doc));
        assert!(Austin.requires_disambiguation(&doc));

        let choices = Austin.student_choices(&doc);
        assert_eq!(choices.len(), 2);
        assert_eq!(choices[0].name, "Seifert, Tristan");
        assert_eq!(choices[0].student_id, "112840");
        assert_eq!(choices[0].id.len(), 40);
        assert_ne!(choices[0].id, choices[1].id);
    }

    #[test]
    fn disambiguate_query_targets_the_dropdown() {
        let state = PageState {
            viewstate: Some("vs".to_string()),
            event_validation: Some("ev".to_string()),
            ..PageState::default()
        };
        let query = Austin.make_disambiguate_query("112840", &state);
        assert_eq!(query.get("__EVENTTARGET").map(String::as_str), Some("_ctl0$ddlStudents"));
        assert_eq!(query.get("_ctl0:ddlStudents").map(String::as_str), Some("112840"));
        assert_eq!(query.get("__EVENTVALIDATION").map(String::as_str), Some("ev"));
    }

    #[test]
    fn reads_student_info() {
        let info = Austin.student_info(&Html::parse_document(PARENT_MAIN)).unwrap();
        assert_eq!(info.name, "Seifert, Tristan");
        assert_eq!(info.school, "LASA High School");
        assert_eq!(info.first_name(), "Tristan");
    }

    #[test]
    fn attendance_rows_carry_the_date_forward() {
        let doc = Html::parse_document(
            r#"<table class="DataTable">
                <tr class="TableHeader"><th>Date</th><th>Period</th><th>Code</th></tr>
                <tr class="DataRow"><td>9/3/2013 Tue</td><td>2</td><td>Absent - Unexcused</td></tr>
                <tr class="DataRowAlt"><td></td><td>3</td><td>Tardy</td></tr>
                <tr class="DataRow"><td>9/17/2013 Tue</td><td>HR</td><td>Tardy</td></tr>
            </table>"#,
        );
        let events = Austin.attendance_events(&doc).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].date, NaiveDate::from_ymd_opt(2013, 9, 3).unwrap());
        assert_eq!(events[1].block, 3);
        assert_eq!(events[1].explanation, "Tardy");
    }

    #[test]
    fn short_attendance_row_is_malformed() {
        let doc = Html::parse_document(
            r#"<table class="DataTable"><tr class="DataRow"><td>9/3/2013</td><td>2</td></tr></table>"#,
        );
        assert!(matches!(Austin.attendance_events(&doc), Err(Error::MalformedPage(_))));
    }

    #[test]
    fn login_page_is_not_a_valid_session() {
        let doc = Html::parse_document("<form><input id='txtUserName'></form>");
        assert!(!Austin.is_session_valid(&doc));
        assert!(!Austin.requires_disambiguation(&doc));
    }
}
