use std::sync::LazyLock;

use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine;
use log::{debug, warn};
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::calc;
use crate::district::District;
use crate::error::{Error, Result};
use crate::grade::{GradeValue, NoGrade};
use crate::models::{
    Assignment, AttendanceEvent, Category, ClassGrades, Course, Cycle, Semester, StudentInfo,
};
use crate::utils::hash::sha1_hex;
use crate::utils::html::{element_text, first_text};
use crate::utils::numeric::{is_numeric, parse_numeric};

static CYCLE_HEADER_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^cycle (\d+)$").expect("cycle header regex"));
static EXAM_HEADER_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^exam (\d+)$").expect("exam header regex"));
static SEMESTER_HEADER_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^semester (\d+)$").expect("semester header regex"));
static CUMULATIVE_GPA_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)cumulative gpa").expect("cumulative gpa regex"));

static CLASS_NAME_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(.*) \(Period (\d+)\)").expect("class name regex"));
static CATEGORY_NAME_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(.*) - (\d+)%$").expect("category name regex"));
// IB-MYP grading phrases the weight per assignment
static ALT_CATEGORY_NAME_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(.*) - Each assignment counts (\d+)").expect("alt category name regex")
});
static DIGITS_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+").expect("digits regex"));

static EXTRA_CREDIT_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(?:extra credit|ec)$").expect("extra credit regex"));
static EXTRA_CREDIT_NOTE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)extra credit").expect("extra credit note regex"));

static DATA_TABLE: LazyLock<Selector> = LazyLock::new(|| selector(".DataTable"));
static HEADER_ROW: LazyLock<Selector> = LazyLock::new(|| selector("tr.TableHeader"));
static TH: LazyLock<Selector> = LazyLock::new(|| selector("th"));
static TR: LazyLock<Selector> = LazyLock::new(|| selector("tr"));
static TD: LazyLock<Selector> = LazyLock::new(|| selector("td"));
static LINK: LazyLock<Selector> = LazyLock::new(|| selector("a"));
static DATA_ROWS: LazyLock<Selector> = LazyLock::new(|| selector("tr.DataRow, tr.DataRowAlt"));
static EMAIL_LINK: LazyLock<Selector> = LazyLock::new(|| selector(".EmailLink"));
static CLASS_NAME: LazyLock<Selector> = LazyLock::new(|| selector(".ClassName"));
static CATEGORY_NAME: LazyLock<Selector> = LazyLock::new(|| selector(".CategoryName"));
static CURRENT_AVERAGE: LazyLock<Selector> = LazyLock::new(|| selector(".CurrentAverage"));
static POINTS_POSSIBLE_CELL: LazyLock<Selector> =
    LazyLock::new(|| selector("td.AssignmentPointsPossible"));
static ASSIGNMENT_NAME: LazyLock<Selector> = LazyLock::new(|| selector(".AssignmentName"));
static DATE_DUE: LazyLock<Selector> = LazyLock::new(|| selector(".DateDue"));
static DATE_ASSIGNED: LazyLock<Selector> = LazyLock::new(|| selector(".DateAssigned"));
static ASSIGNMENT_NOTE: LazyLock<Selector> = LazyLock::new(|| selector(".AssignmentNote"));
static ASSIGNMENT_GRADE: LazyLock<Selector> = LazyLock::new(|| selector(".AssignmentGrade"));
static POINTS_POSSIBLE: LazyLock<Selector> =
    LazyLock::new(|| selector(".AssignmentPointsPossible"));

// Grade cell links carry a base64 payload whose padding is sometimes stripped.
const DATA_PAYLOAD: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

// Selectors below are literals known to parse.
fn selector(css: &'static str) -> Selector {
    Selector::parse(css).expect("static selector")
}

// How the averages table groups its columns, read from the header row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SemesterLayout {
    pub semesters: usize,
    pub cycles_per_semester: usize,
    pub has_exams: bool,
    pub has_semester_averages: bool,
}

impl SemesterLayout {
    // Counts "Cycle N" columns and reads the highest "Semester N" (or
    // "Exam N" when there is no semester column). Cycles are split evenly
    // across semesters with integer division, so irregular headers truncate.
    pub fn infer<S: AsRef<str>>(headers: &[S]) -> SemesterLayout {
        let mut cycle_columns: usize = 0;
        let mut semesters: usize = 0;
        let mut has_exams = false;
        let mut has_semester_averages = false;

        for header in headers {
            let text = header.as_ref().trim();
            if CYCLE_HEADER_REGEX.is_match(text) {
                cycle_columns += 1;
            } else if let Some(caps) = EXAM_HEADER_REGEX.captures(text) {
                has_exams = true;
                semesters = semesters.max(caps[1].parse().unwrap_or(0));
            } else if let Some(caps) = SEMESTER_HEADER_REGEX.captures(text) {
                has_semester_averages = true;
                semesters = semesters.max(caps[1].parse().unwrap_or(0));
            }
        }

        let semesters = semesters.max(1);
        SemesterLayout {
            semesters,
            cycles_per_semester: cycle_columns / semesters,
            has_exams,
            has_semester_averages,
        }
    }

    // Columns one semester takes up in a course row.
    fn block_width(&self) -> usize {
        self.cycles_per_semester
            + usize::from(self.has_exams)
            + usize::from(self.has_semester_averages)
    }
}

// Parses portal pages for one district.
pub struct GradeParser<'a> {
    district: &'a dyn District,
}

impl<'a> GradeParser<'a> {
    pub fn new(district: &'a dyn District) -> Self {
        GradeParser { district }
    }

    // Every course on the averages page.
    pub fn parse_averages(&self, html: &str) -> Result<Vec<Course>> {
        let doc = Html::parse_document(html);

        let grade_table = doc
            .select(&DATA_TABLE)
            .next()
            .ok_or_else(|| malformed("averages page has no .DataTable"))?;
        let header_row = grade_table
            .select(&HEADER_ROW)
            .next()
            .ok_or_else(|| malformed("grades table has no header row"))?;

        let headers: Vec<String> = header_row.select(&TH).map(element_text).collect();
        let layout = SemesterLayout::infer(&headers);
        debug!("averages table layout: {:?}", layout);

        grade_table
            .select(&DATA_ROWS)
            .filter(|row| !is_cumulative_gpa_row(*row))
            .map(|row| self.parse_course(row, &layout))
            .collect()
    }

    // One cycle's categories and assignments. `Ok(None)` when the portal
    // answered with its empty placeholder page.
    pub fn parse_class_grades(
        &self,
        html: &str,
        url_hash: &str,
        semester_index: usize,
        cycle_index: usize,
    ) -> Result<Option<ClassGrades>> {
        let doc = Html::parse_document(html);

        // sometimes GradeSpeed returns a page with nothing on it
        let class_name = match doc.select(&CLASS_NAME).next() {
            Some(cell) => element_text(cell),
            None => {
                debug!("cycle page has no class name; treating it as empty");
                return Ok(None);
            }
        };

        let caps = CLASS_NAME_REGEX
            .captures(&class_name)
            .ok_or_else(|| malformed(format!("unexpected class name {class_name:?}")))?;
        let title = caps[1].to_string();
        let period = caps[2]
            .parse()
            .map_err(|_| malformed(format!("bad period in {class_name:?}")))?;

        let average = doc
            .select(&CURRENT_AVERAGE)
            .next()
            .map(element_text)
            .and_then(|text| DIGITS_REGEX.find(&text).and_then(|m| m.as_str().parse().ok()));

        let course_id = course_id_from_url_hash(url_hash);

        let names: Vec<ElementRef> = doc.select(&CATEGORY_NAME).collect();
        // the first table is the overall summary, not a category
        let tables: Vec<ElementRef> = doc.select(&DATA_TABLE).skip(1).collect();
        if names.len() != tables.len() {
            return Err(malformed(format!(
                "{} category names but {} category tables",
                names.len(),
                tables.len()
            )));
        }

        let categories = names
            .into_iter()
            .zip(tables)
            .map(|(name, table)| parse_category(name, table, &course_id))
            .collect::<Result<Vec<_>>>()?;

        Ok(Some(ClassGrades {
            title,
            period,
            url_hash: url_hash.to_string(),
            semester_index,
            cycle_index,
            average,
            categories,
        }))
    }

    // Name and school of the student the page belongs to.
    pub fn parse_student_info(&self, html: &str) -> Option<StudentInfo> {
        self.district.student_info(&Html::parse_document(html))
    }

    // Attendance events, laid out differently by every district.
    pub fn parse_attendance(&self, html: &str) -> Result<Vec<AttendanceEvent>> {
        let events = self.district.attendance_events(&Html::parse_document(html))?;
        debug!("parsed {} attendance events", events.len());
        Ok(events)
    }

    // One row of the averages table.
    fn parse_course(&self, row: ElementRef, layout: &SemesterLayout) -> Result<Course> {
        let cells: Vec<ElementRef> = row.select(&TD).collect();

        let title = cells
            .get(self.district.title_column())
            .map(|cell| element_text(*cell))
            .ok_or_else(|| malformed(format!("course row has only {} cells", cells.len())))?;
        let period = cells
            .get(self.district.period_column())
            .and_then(|cell| element_text(*cell).parse().ok());

        let (teacher_name, teacher_email) = match row.select(&EMAIL_LINK).next() {
            Some(link) => (element_text(link), mailto_address(link.value().attr("href").unwrap_or(""))),
            None => {
                warn!("no teacher link for {title}");
                (String::new(), String::new())
            }
        };

        let course_id = self.find_course_num(&cells).map(|num| sha1_hex(&num));

        let needed = self.district.grades_start_column() + layout.semesters * layout.block_width();
        if cells.len() < needed {
            return Err(malformed(format!(
                "row for {title} has {} cells, layout needs {needed}",
                cells.len()
            )));
        }

        let semesters = (0..layout.semesters)
            .map(|index| {
                let offset = self.district.grades_start_column() + index * layout.block_width();
                let cycle_cells = &cells[offset..offset + layout.cycles_per_semester];
                let mut next = offset + layout.cycles_per_semester;

                let exam_cell = if layout.has_exams {
                    next += 1;
                    Some(cells[next - 1])
                } else {
                    None
                };
                let average_cell = if layout.has_semester_averages {
                    Some(cells[next])
                } else {
                    None
                };

                self.parse_semester(cycle_cells, exam_cell, average_cell, index)
            })
            .collect();

        Ok(Course {
            title,
            period,
            teacher_name,
            teacher_email,
            course_id,
            semesters,
        })
    }

    // One semester block: its cycles, exam and semester average.
    fn parse_semester(
        &self,
        cycle_cells: &[ElementRef],
        exam_cell: Option<ElementRef>,
        average_cell: Option<ElementRef>,
        index: usize,
    ) -> Semester {
        let cycles: Vec<Cycle> = cycle_cells
            .iter()
            .enumerate()
            .map(|(i, cell)| parse_cycle(*cell, i))
            .collect();

        let exam_grade = match exam_cell {
            Some(cell) => parse_exam(&element_text(cell)),
            None => GradeValue::None(NoGrade::NotApplicable),
        };

        // letter-grade districts cannot be recomputed; take their word for it
        let average = match average_cell.map(|cell| GradeValue::parse(&element_text(cell))) {
            Some(letter @ GradeValue::Letter(_)) => letter,
            _ => calc::semester_average(&cycles, &exam_grade, self.district.exam_weight()),
        };

        Semester {
            index,
            cycles,
            exam_grade,
            average,
        }
    }

    // The course number comes from the first grade link right of the start column.
    fn find_course_num(&self, cells: &[ElementRef]) -> Option<String> {
        let href = cells
            .iter()
            .skip(self.district.grades_start_column())
            .find_map(|cell| cell.select(&LINK).next())?
            .value()
            .attr("href")?;

        let num = data_param(href).and_then(|data| course_num_from_payload(&decode_url(data)));
        if num.is_none() {
            warn!("could not read a course number from {href}");
        }
        num
    }
}

fn malformed(message: impl Into<String>) -> Error {
    Error::MalformedPage(message.into())
}

// The portal appends a GPA row to the averages table.
fn is_cumulative_gpa_row(row: ElementRef) -> bool {
    row.select(&TD)
        .next()
        .map(|cell| CUMULATIVE_GPA_REGEX.is_match(&element_text(cell)))
        .unwrap_or(false)
}

// One cycle cell; the link carries the url-hash of the detail page.
fn parse_cycle(cell: ElementRef, index: usize) -> Cycle {
    // no link means the cycle has not been graded yet
    let link = match cell.select(&LINK).next() {
        Some(link) => link,
        None => {
            return Cycle {
                index,
                average: GradeValue::None(NoGrade::NotAGrade),
                url_hash: None,
            }
        }
    };

    Cycle {
        index,
        average: GradeValue::parse(&element_text(link)),
        url_hash: link
            .value()
            .attr("href")
            .and_then(data_param)
            .map(decode_url),
    }
}

// Exam cells print "EX" or "Exc" for an exempt student.
fn parse_exam(text: &str) -> GradeValue {
    match text {
        "EX" | "Exc" => GradeValue::None(NoGrade::Exempt),
        _ => GradeValue::parse(text),
    }
}

// A category header and the table of assignments under it.
fn parse_category(name: ElementRef, table: ElementRef, course_id: &str) -> Result<Category> {
    let header = element_text(name);
    let (title, weight) = parse_category_header(&header)
        .ok_or_else(|| malformed(format!("unrecognised category header {header:?}")))?;

    // without a points-possible column everything is out of 100
    let is_100_pt = table.select(&POINTS_POSSIBLE_CELL).next().is_none();

    let average = table
        .select(&TR)
        .last()
        .and_then(|row| {
            let cells: Vec<ElementRef> = row.select(&TD).collect();
            let label = cells
                .iter()
                .position(|cell| element_text(*cell).contains("Average"))?;
            cells.get(label + 1).map(|cell| element_text(*cell))
        })
        .and_then(|text| {
            let average = parse_numeric(&text);
            if average.is_none() && !text.is_empty() {
                warn!("category {title:?} has an unreadable average {text:?}");
            }
            average
        });

    let id = sha1_hex(&format!("{course_id}|{header}"));

    let assignments = table
        .select(&DATA_ROWS)
        .map(|row| parse_assignment(row, is_100_pt, &id))
        .collect::<Result<Vec<_>>>()?;

    Ok(Category {
        id,
        title,
        weight,
        average,
        bonus: calc::category_bonus(&assignments),
        assignments,
    })
}

// One assignment row of a category table.
fn parse_assignment(row: ElementRef, is_100_pt: bool, category_id: &str) -> Result<Assignment> {
    let title = first_text(row, &ASSIGNMENT_NAME)
        .ok_or_else(|| malformed("assignment row without a name"))?;
    let points_text = first_text(row, &ASSIGNMENT_GRADE)
        .ok_or_else(|| malformed(format!("assignment {title:?} has no grade cell")))?;
    let date_due = first_text(row, &DATE_DUE).unwrap_or_default();
    let date_assigned = first_text(row, &DATE_ASSIGNED).unwrap_or_default();
    let note = first_text(row, &ASSIGNMENT_NOTE).unwrap_or_default();

    let points_possible = if is_100_pt {
        100.0
    } else {
        first_text(row, &POINTS_POSSIBLE)
            .and_then(|text| parse_numeric(&text))
            .filter(|possible| *possible > 0.0)
            .ok_or_else(|| malformed(format!("assignment {title:?} has no points possible")))?
    };

    let (points_earned, weight) = parse_points(&points_text);

    Ok(Assignment {
        id: sha1_hex(&format!("{category_id}|{title}")),
        extra_credit: is_extra_credit(&title, &note),
        title,
        date_due,
        date_assigned,
        points_earned,
        points_possible,
        weight,
        note,
    })
}

// Points earned and the assignment's weight. Teachers may write `88x0.6`
// for 88 points at weight 0.6; text that is not a number (say `Exc`) means
// no grade at the default weight of 1.
pub fn parse_points(text: &str) -> (GradeValue, f64) {
    let no_grade = (GradeValue::None(NoGrade::NotAGrade), 1.0);

    if text.contains('x') {
        let mut parts = text.split('x');
        return match (parts.next(), parts.next()) {
            (Some(earned), Some(weight)) if is_numeric(earned) && is_numeric(weight) => {
                match (earned.parse(), weight.parse()) {
                    (Ok(earned), Ok(weight)) => (GradeValue::Fractional(earned), weight),
                    _ => no_grade,
                }
            }
            _ => no_grade,
        };
    }

    match parse_numeric(text) {
        Some(earned) => (GradeValue::Fractional(earned), 1.0),
        None => no_grade,
    }
}

// Title and weight from a category header such as `"Tests - 40%"` or
// `"Labs - Each assignment counts 10"`.
pub fn parse_category_header(text: &str) -> Option<(String, f64)> {
    let caps = CATEGORY_NAME_REGEX
        .captures(text)
        .or_else(|| ALT_CATEGORY_NAME_REGEX.captures(text))?;
    let weight = caps[2].parse().ok()?;
    Some((caps[1].to_string(), weight))
}

// Best guess only: the portal has no extra-credit flag, so this goes by the
// title or the note.
pub fn is_extra_credit(title: &str, note: &str) -> bool {
    EXTRA_CREDIT_REGEX.is_match(title) || EXTRA_CREDIT_NOTE_REGEX.is_match(note)
}

// The raw value of the `data` query parameter of a grade link.
fn data_param(href: &str) -> Option<&str> {
    let (_, rest) = href.split_once("data=")?;
    Some(rest.split('&').next().unwrap_or(rest))
}

// decodeURIComponent semantics: '+' stays a plus.
fn decode_url(text: &str) -> String {
    urlencoding::decode(text)
        .map(|decoded| decoded.into_owned())
        .unwrap_or_else(|_| text.to_string())
}

// Base64 payload behind the `data` parameter.
fn decode_payload(data: &str) -> Option<String> {
    let bytes = DATA_PAYLOAD.decode(data).ok()?;
    Some(String::from_utf8_lossy(&bytes).into_owned())
}

// The payload is pipe-delimited; the fourth field is the course number.
fn course_num_from_payload(data: &str) -> Option<String> {
    decode_payload(data)?
        .split('|')
        .nth(3)
        .map(str::to_string)
}

// The same course id `parse_averages` assigns, derived from a
// cycle's url-hash. Falls back to hashing the whole payload, then the hash
// itself, when the payload does not have the usual shape.
pub fn course_id_from_url_hash(url_hash: &str) -> String {
    let data = decode_url(url_hash);
    if let Some(num) = course_num_from_payload(&data) {
        return sha1_hex(&num);
    }
    match decode_payload(&data) {
        Some(payload) => sha1_hex(&payload),
        None => sha1_hex(url_hash),
    }
}

// Address part of a `mailto:` link.
fn mailto_address(href: &str) -> String {
    match Url::parse(href) {
        Ok(url) if url.scheme() == "mailto" => decode_url(url.path()),
        _ => href.trim_start_matches("mailto:").to_string(),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn infers_two_semesters_of_three_cycles() {
        let headers = [
            "Course", "Period", "Cycle 1", "Cycle 2", "Cycle 3", "Exam 1", "Semester 1", "Cycle 4",
            "Cycle 5", "Cycle 6", "Exam 2", "Semester 2",
        ];
        let layout = SemesterLayout::infer(&headers);
        assert_eq!(
            layout,
            SemesterLayout {
                semesters: 2,
                cycles_per_semester: 3,
                has_exams: true,
                has_semester_averages: true,
            }
        );
        assert_eq!(layout.block_width(), 5);
    }

    #[test]
    fn infers_a_single_semester_without_exams() {
        let layout = SemesterLayout::infer(&["Course", "CYCLE 1", "cycle 2"]);
        assert_eq!(layout.semesters, 1);
        assert_eq!(layout.cycles_per_semester, 2);
        assert!(!layout.has_exams);
        assert!(!layout.has_semester_averages);
    }

    #[test]
    fn irregular_headers_truncate() {
        let headers = ["Cycle 1", "Cycle 2", "Cycle 3", "Cycle 4", "Cycle 5", "Semester 1", "Semester 2"];
        assert_eq!(SemesterLayout::infer(&headers).cycles_per_semester, 2);
    }

    #[test]
    fn weighted_points() {
        assert_eq!(parse_points("88x0.6"), (GradeValue::Fractional(88.0), 0.6));
        assert_eq!(parse_points("Exc"), (GradeValue::None(NoGrade::NotAGrade), 1.0));
        assert_eq!(parse_points("Excx2"), (GradeValue::None(NoGrade::NotAGrade), 1.0));
        assert_eq!(parse_points("88x"), (GradeValue::None(NoGrade::NotAGrade), 1.0));
        assert_eq!(parse_points("95"), (GradeValue::Fractional(95.0), 1.0));
        assert_eq!(parse_points(""), (GradeValue::None(NoGrade::NotAGrade), 1.0));
    }

    #[test]
    fn category_headers() {
        assert_eq!(parse_category_header("Tests - 40%"), Some(("Tests".to_string(), 40.0)));
        assert_eq!(
            parse_category_header("Labs - Each assignment counts 10"),
            Some(("Labs".to_string(), 10.0))
        );
        assert_eq!(parse_category_header("Daily Work - 30"), None);
    }

    #[test]
    fn extra_credit_guesses() {
        assert!(is_extra_credit("Extra Credit", ""));
        assert!(is_extra_credit("EC", ""));
        assert!(is_extra_credit("Poster", "counts as extra credit"));
        assert!(!is_extra_credit("Extra Credit Quiz", ""));
        assert!(!is_extra_credit("Quiz", "(Dropped)"));
    }

    #[test]
    fn exam_cells() {
        assert_eq!(parse_exam("EX"), GradeValue::None(NoGrade::Exempt));
        assert_eq!(parse_exam("Exc"), GradeValue::None(NoGrade::Exempt));
        assert_eq!(parse_exam("87"), GradeValue::Integer(87));
        assert_eq!(parse_exam(""), GradeValue::None(NoGrade::NotAGrade));
    }

    #[test]
    fn data_param_and_payload() {
        // "x|y|z|4567|w"
        let href = "?data=eHx5fHp8NDU2N3x3&from=grades";
        let data = data_param(href).unwrap();
        assert_eq!(data, "eHx5fHp8NDU2N3x3");
        assert_eq!(course_num_from_payload(data).as_deref(), Some("4567"));
        assert_eq!(course_id_from_url_hash(data), sha1_hex("4567"));
    }

    #[test]
    fn url_hash_is_percent_decoded_but_keeps_plus() {
        assert_eq!(decode_url("ab%2Bc%3D%3D"), "ab+c==");
        assert_eq!(decode_url("ab+c"), "ab+c");
    }

    #[test]
    fn teacher_email_from_mailto() {
        assert_eq!(mailto_address("mailto:jane.doe@austinisd.org"), "jane.doe@austinisd.org");
        assert_eq!(mailto_address("jane.doe@austinisd.org"), "jane.doe@austinisd.org");
    }
}
