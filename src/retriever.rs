use std::collections::HashMap;

use log::{debug, info, warn};
use scraper::Html;

use crate::district::District;
use crate::error::{Error, Result};
use crate::models::{AttendanceEvent, ClassGrades, Course, StudentChoice};
use crate::page_state::PageState;
use crate::parser::GradeParser;
use crate::transport::{Form, Method, Transport};

// Where a session stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Unauthenticated,
    AwaitingDisambiguation,
    Authenticated,
}

// What `login` leads to.
#[derive(Debug, Clone, PartialEq)]
pub enum LoginOutcome {
    // The account has several students; pick one with `choose_student`.
    NeedsDisambiguation(Vec<StudentChoice>),
    Authenticated,
}

#[derive(Debug)]
enum SessionState {
    Unauthenticated,
    AwaitingDisambiguation {
        page_state: PageState,
    },
    Authenticated {
        page_state: PageState,
        averages: Option<AveragesSnapshot>,
    },
}

// What the last averages page leaves behind for cycle requests.
#[derive(Debug)]
struct AveragesSnapshot {
    page_state: PageState,
    // url-hash -> (semester index, cycle index)
    locations: HashMap<String, (usize, usize)>,
}

// The parts of a page the driver needs, read before the next await.
struct Inspected {
    valid: bool,
    page_state: PageState,
    disambiguation: Option<Vec<StudentChoice>>,
}

// One logged-in (or logging-in) portal session for one district. Every method
// takes `&mut self`, so requests within a session run strictly in order.
pub struct GradeRetriever<T: Transport> {
    transport: T,
    district: Box<dyn District>,
    state: SessionState,
}

impl<T: Transport> GradeRetriever<T> {
    // Starts logged out; call `login` first.
    pub fn new(transport: T, district: Box<dyn District>) -> Self {
        GradeRetriever {
            transport,
            district,
            state: SessionState::Unauthenticated,
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn district(&self) -> &dyn District {
        self.district.as_ref()
    }

    pub fn parser(&self) -> GradeParser<'_> {
        GradeParser::new(self.district.as_ref())
    }

    // Where the session is, without the state it carries.
    pub fn stage(&self) -> Stage {
        match self.state {
            SessionState::Unauthenticated => Stage::Unauthenticated,
            SessionState::AwaitingDisambiguation { .. } => Stage::AwaitingDisambiguation,
            SessionState::Authenticated { .. } => Stage::Authenticated,
        }
    }

    // Loads the login page, posts the credentials with its postback state,
    // and checks whether a student has to be chosen. Restarts the session
    // when called again.
    pub async fn login(&mut self, user: &str, pass: &str) -> Result<LoginOutcome> {
        self.state = SessionState::Unauthenticated;

        let login_page = self
            .transport
            .send(Method::Get, self.district.login_url(), &Form::new())
            .await?;
        let state = PageState::from_html(&login_page);
        let query = self.district.make_login_query(user, pass, &state);

        let response = self
            .transport
            .send(self.district.login_method(), self.district.login_url(), &query)
            .await?;
        let inspected = self.inspect_login_response(&response);
        if !inspected.valid {
            return Err(self.invalid(self.district.login_url()));
        }

        let (page_state, choices) = match (inspected.disambiguation, self.district.student_picker_url()) {
            (None, _) => {
                info!("logged in to {}", self.district.name());
                self.state = SessionState::Authenticated {
                    page_state: inspected.page_state,
                    averages: None,
                };
                return Ok(LoginOutcome::Authenticated);
            }
            (Some(choices), None) => (inspected.page_state, choices),
            // the choices live on a separate picker page
            (Some(_), Some(picker_url)) => {
                let picker_url = picker_url.to_string();
                let picker = self.fetch_valid(Method::Get, &picker_url, &Form::new()).await?;
                let doc = Html::parse_document(&picker);
                (PageState::extract(&doc), self.district.student_choices(&doc))
            }
        };

        info!(
            "{} requires choosing one of {} students",
            self.district.name(),
            choices.len()
        );
        self.state = SessionState::AwaitingDisambiguation { page_state };
        Ok(LoginOutcome::NeedsDisambiguation(choices))
    }

    // Submits the chosen student's portal id (`StudentChoice::student_id`).
    pub async fn choose_student(&mut self, student_id: &str) -> Result<()> {
        let query = match &self.state {
            SessionState::AwaitingDisambiguation { page_state } => {
                self.district.make_disambiguate_query(student_id, page_state)
            }
            _ => return Err(contract("choose_student called when no student choice is pending")),
        };

        let url = self.district.disambiguate_url().to_string();
        let body = self
            .fetch_valid(self.district.disambiguate_method(), &url, &query)
            .await?;

        info!("chose student {student_id}");
        self.state = SessionState::Authenticated {
            page_state: PageState::from_html(&body),
            averages: None,
        };
        Ok(())
    }

    // Raw averages page, validated.
    pub async fn get_averages(&mut self) -> Result<String> {
        let query = match &self.state {
            SessionState::Authenticated { page_state, .. } => self.district.make_grades_query(page_state),
            _ => return Err(contract("averages requested before logging in")),
        };

        let url = self.district.grades_url().to_string();
        self.fetch_valid(self.district.grades_method(), &url, &query).await
    }

    // Fetches and parses the averages page. The session remembers the page
    // state and where each cycle's url-hash sits for later cycle requests.
    pub async fn fetch_averages(&mut self) -> Result<Vec<Course>> {
        let body = self.get_averages().await?;
        let courses = self.parser().parse_averages(&body)?;

        let locations = courses
            .iter()
            .flat_map(|course| &course.semesters)
            .flat_map(|semester| {
                semester.cycles.iter().filter_map(move |cycle| {
                    let hash = cycle.url_hash.clone()?;
                    Some((hash, (semester.index, cycle.index)))
                })
            })
            .collect();
        let snapshot = AveragesSnapshot {
            page_state: PageState::from_html(&body),
            locations,
        };

        if let SessionState::Authenticated { averages, .. } = &mut self.state {
            *averages = Some(snapshot);
        }
        debug!("parsed {} courses", courses.len());
        Ok(courses)
    }

    // Raw cycle page for `url_hash`. Districts that replay the averages
    // page's postback state need that page passed as `averages_page`.
    pub async fn get_cycle(&mut self, url_hash: &str, averages_page: Option<&str>) -> Result<String> {
        let state = if self.district.cycle_detail_needs_averages_page_state() {
            match averages_page {
                Some(page) => Some(PageState::from_html(page)),
                None => return Err(contract("this district needs the averages page to load a cycle")),
            }
        } else {
            None
        };
        self.request_cycle(url_hash, state).await
    }

    // Fetches and parses one cycle's detail. `Ok(None)` when the portal
    // sends its empty placeholder page.
    pub async fn fetch_cycle_detail(&mut self, url_hash: &str) -> Result<Option<ClassGrades>> {
        let (state, location) = match &self.state {
            SessionState::Authenticated { averages, .. } => {
                let location = averages
                    .as_ref()
                    .and_then(|snapshot| snapshot.locations.get(url_hash).copied());
                let state = if self.district.cycle_detail_needs_averages_page_state() {
                    match averages {
                        Some(snapshot) => Some(snapshot.page_state.clone()),
                        None => return Err(contract("fetch the averages before a cycle's detail")),
                    }
                } else {
                    None
                };
                (state, location)
            }
            _ => return Err(contract("cycle detail requested before logging in")),
        };

        let (semester_index, cycle_index) = location.unwrap_or_else(|| {
            warn!("url-hash {url_hash} was not on the last averages page");
            (0, 0)
        });

        let body = self.request_cycle(url_hash, state).await?;
        self.parser()
            .parse_class_grades(&body, url_hash, semester_index, cycle_index)
    }

    // Fetches and parses the current student's attendance page.
    pub async fn fetch_attendance(&mut self) -> Result<Vec<AttendanceEvent>> {
        if !matches!(self.state, SessionState::Authenticated { .. }) {
            return Err(contract("attendance requested before logging in"));
        }

        let url = self.district.attendance_url().to_string();
        let body = self
            .fetch_valid(self.district.attendance_method(), &url, &Form::new())
            .await?;
        self.parser().parse_attendance(&body)
    }

    // Cycle pages are fetched only once a student is chosen.
    async fn request_cycle(&mut self, url_hash: &str, state: Option<PageState>) -> Result<String> {
        if !matches!(self.state, SessionState::Authenticated { .. }) {
            return Err(contract("cycle requested before logging in"));
        }

        let query = self.district.make_cycle_query(url_hash, state.as_ref());
        let url = self.district.cycle_url().to_string();
        self.fetch_valid(self.district.cycle_method(), &url, &query).await
    }

    // Sends a request and rejects pages that fail the district's validity check.
    async fn fetch_valid(&self, method: Method, url: &str, form: &Form) -> Result<String> {
        let body = self.transport.send(method, url, form).await?;
        if !self.district.is_session_valid(&Html::parse_document(&body)) {
            return Err(self.invalid(url));
        }
        Ok(body)
    }

    // Validity, postback state and student choices of the page a login or choice returned.
    fn inspect_login_response(&self, body: &str) -> Inspected {
        let doc = Html::parse_document(body);
        let valid = self.district.is_session_valid(&doc);
        let disambiguation = (valid && self.district.requires_disambiguation(&doc))
            .then(|| self.district.student_choices(&doc));
        Inspected {
            valid,
            page_state: PageState::extract(&doc),
            disambiguation,
        }
    }

    fn invalid(&self, url: &str) -> Error {
        warn!("{} rejected the session at {url}", self.district.name());
        Error::InvalidSessionOutput { url: url.to_string() }
    }
}

fn contract(message: &str) -> Error {
    Error::CallerContract(message.to_string())
}
