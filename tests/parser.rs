use gradespeed::district::by_id;
use gradespeed::parser::course_id_from_url_hash;
use gradespeed::utils::hash::sha1_hex;
use chrono::NaiveDate;
use gradespeed::{Error, GradeParser, GradeValue, LetterGrade, NoGrade};

const AVERAGES: &str = include_str!("fixtures/austin_averages.html");
const CYCLE: &str = include_str!("fixtures/austin_cycle.html");
const EMPTY_CYCLE: &str = include_str!("fixtures/austin_empty_cycle.html");
const ATTENDANCE: &str = include_str!("fixtures/austin_attendance.html");

const ENGLISH_C1: &str = "MjAxM3wyMjc5MDF8MDQxMnwwODE0LTN8MXxDMQ==";

#[test]
fn averages_page_yields_every_course_but_the_gpa_row() {
    let austin = by_id("austin").unwrap();
    let courses = GradeParser::new(austin.as_ref()).parse_averages(AVERAGES).unwrap();

    assert_eq!(courses.len(), 2);
    assert_eq!(courses[0].title, "English I");
    assert_eq!(courses[1].title, "Art II");
    assert!(courses.iter().all(|course| course.semesters.len() == 2));
}

#[test]
fn numeric_course_is_laid_out_and_recomputed() {
    let austin = by_id("austin").unwrap();
    let courses = GradeParser::new(austin.as_ref()).parse_averages(AVERAGES).unwrap();
    let english = &courses[0];

    assert_eq!(english.period, Some(2));
    assert_eq!(english.teacher_name, "Smith, Jane");
    assert_eq!(english.teacher_email, "jane.smith@austinisd.org");
    assert_eq!(english.course_id.as_deref(), Some("8281e1e33364161e9bf4d19b2c4950937f56acac"));

    let fall = &english.semesters[0];
    assert_eq!(fall.cycles.len(), 3);
    assert_eq!(fall.cycles[0].average, GradeValue::Integer(95));
    assert_eq!(fall.cycles[0].url_hash.as_deref(), Some(ENGLISH_C1));
    assert_eq!(fall.cycles[2].index, 2);
    assert_eq!(fall.exam_grade, GradeValue::Integer(90));
    // (91.33 * 75 + 90 * 25) / 100
    assert_eq!(fall.average, GradeValue::Integer(91));

    let spring = &english.semesters[1];
    assert_eq!(spring.index, 1);
    assert_eq!(spring.cycles[0].average, GradeValue::Integer(93));
    assert!(spring.cycles[1].average.is_none());
    assert_eq!(spring.cycles[1].url_hash, None);
    assert!(spring.exam_grade.is_none());
    // one graded cycle and no exam
    assert_eq!(spring.average, GradeValue::Integer(93));
}

#[test]
fn letter_course_keeps_the_portal_semester_grade() {
    let austin = by_id("austin").unwrap();
    let courses = GradeParser::new(austin.as_ref()).parse_averages(AVERAGES).unwrap();
    let art = &courses[1];

    assert_eq!(art.course_id.as_deref(), Some(sha1_hex("5520-1").as_str()));
    let fall = &art.semesters[0];
    assert_eq!(fall.cycles[1].average, GradeValue::Letter(LetterGrade::BPlus));
    assert_eq!(fall.exam_grade, GradeValue::None(NoGrade::Exempt));
    assert_eq!(fall.average, GradeValue::Letter(LetterGrade::A));
    assert!(art.semesters[1].average.is_none());
}

#[test]
fn averages_page_without_a_table_is_malformed() {
    let austin = by_id("austin").unwrap();
    let result = GradeParser::new(austin.as_ref()).parse_averages("<html><body>Log Out</body></html>");
    assert!(matches!(result, Err(Error::MalformedPage(_))));
}

#[test]
fn short_course_row_is_malformed() {
    let html = r#"<table class="DataTable">
        <tr class="TableHeader"><th>Teacher</th><th>Course</th><th>Period</th><th>Cycle 1</th><th>Cycle 2</th></tr>
        <tr class="DataRow"><td>Smith</td><td>English I</td><td>2</td><td>95</td></tr>
    </table>"#;
    let austin = by_id("austin").unwrap();
    let result = GradeParser::new(austin.as_ref()).parse_averages(html);
    assert!(matches!(result, Err(Error::MalformedPage(_))));
}

#[test]
fn cycle_page_categories_and_assignments() {
    let austin = by_id("austin").unwrap();
    let grades = GradeParser::new(austin.as_ref())
        .parse_class_grades(CYCLE, ENGLISH_C1, 0, 0)
        .unwrap()
        .unwrap();

    assert_eq!(grades.title, "English I");
    assert_eq!(grades.period, 2);
    assert_eq!(grades.url_hash, ENGLISH_C1);
    assert_eq!(grades.average, Some(89));
    assert_eq!(grades.categories.len(), 3);

    let daily = &grades.categories[0];
    assert_eq!(daily.title, "Daily Work");
    assert_eq!(daily.weight, 30.0);
    assert_eq!(daily.average, Some(95.5));
    assert_eq!(daily.bonus, 5.0);
    assert_eq!(daily.assignments.len(), 5);

    let homework = &daily.assignments[0];
    assert_eq!(homework.points_earned, GradeValue::Fractional(88.0));
    assert_eq!(homework.weight, 0.6);
    assert_eq!(homework.points_possible, 100.0);
    assert_eq!(homework.date_due, "Sep-05");
    assert_eq!(homework.note, "");
    assert!(daily.assignments[2].points_earned.is_none());
    assert!(daily.assignments[3].extra_credit);
    assert_eq!(daily.assignments[4].note, "(Dropped)");

    let tests = &grades.categories[1];
    assert_eq!(tests.weight, 70.0);
    assert_eq!(tests.assignments[0].points_possible, 50.0);
    assert_eq!(tests.assignments[1].points_possible, 20.0);
    assert_eq!(tests.bonus, 0.0);

    let labs = &grades.categories[2];
    assert_eq!(labs.title, "Labs");
    assert_eq!(labs.weight, 10.0);
    assert_eq!(labs.average, None);

    // (95.5 * 30 + 90 * 70) / 100 + 5
    assert_eq!(grades.computed_average(), GradeValue::Integer(97));
}

#[test]
fn cycle_ids_chain_from_the_course() {
    let austin = by_id("austin").unwrap();
    let parser = GradeParser::new(austin.as_ref());
    let courses = parser.parse_averages(AVERAGES).unwrap();
    let grades = parser.parse_class_grades(CYCLE, ENGLISH_C1, 0, 0).unwrap().unwrap();

    let course_id = course_id_from_url_hash(ENGLISH_C1);
    assert_eq!(courses[0].course_id.as_deref(), Some(course_id.as_str()));

    let daily = &grades.categories[0];
    assert_eq!(daily.id, sha1_hex(&format!("{course_id}|Daily Work - 30%")));
    assert_eq!(daily.assignments[0].id, sha1_hex(&format!("{}|Homework 1", daily.id)));

    // same page, same ids
    let again = parser.parse_class_grades(CYCLE, ENGLISH_C1, 0, 0).unwrap().unwrap();
    assert_eq!(again, grades);
}

#[test]
fn placeholder_cycle_page_is_empty() {
    let austin = by_id("austin").unwrap();
    let grades = GradeParser::new(austin.as_ref())
        .parse_class_grades(EMPTY_CYCLE, ENGLISH_C1, 0, 0)
        .unwrap();
    assert_eq!(grades, None);
}

#[test]
fn category_count_mismatch_is_malformed() {
    let html = r#"<h3 class="ClassName">English I (Period 2)</h3>
        <table class="DataTable"><tr><td>summary</td></tr></table>
        <h4 class="CategoryName">Daily Work - 30%</h4>
        <h4 class="CategoryName">Tests - 70%</h4>
        <table class="DataTable"><tr><td>Average</td><td>90</td></tr></table>"#;
    let austin = by_id("austin").unwrap();
    let result = GradeParser::new(austin.as_ref()).parse_class_grades(html, ENGLISH_C1, 0, 0);
    assert!(matches!(result, Err(Error::MalformedPage(_))));
}

#[test]
fn student_info_from_the_averages_page() {
    let austin = by_id("austin").unwrap();
    let info = GradeParser::new(austin.as_ref()).parse_student_info(AVERAGES).unwrap();
    assert_eq!(info.name, "Seifert, Tristan");
    assert_eq!(info.school, "LASA High School");
}

#[test]
fn attendance_table_lists_every_block() {
    let austin = by_id("austin").unwrap();
    let events = GradeParser::new(austin.as_ref()).parse_attendance(ATTENDANCE).unwrap();

    let entries: Vec<_> = events.iter().map(|event| (event.date, event.block)).collect();
    let sep_3 = NaiveDate::from_ymd_opt(2013, 9, 3).unwrap();
    let oct_21 = NaiveDate::from_ymd_opt(2013, 10, 21).unwrap();
    assert_eq!(entries, vec![(sep_3, 2), (sep_3, 5), (oct_21, 1)]);
    assert_eq!(events[0].explanation, "Absent - Unexcused");
    assert_eq!(events[0].id, sha1_hex("2013-09-03|2"));
}

#[test]
fn attendance_calendar_titles_become_events() {
    let html = r##"<html><body><div id="MainContent">
        <table id="plnMain_cldAttendance">
            <tr><td><table class="sg-asp-calendar-header"><tr>
                <td><a href="#prev">&lt;</a></td><td>October 2013</td><td><a href="#next">&gt;</a></td>
            </tr></table></td></tr>
            <tr>
                <td>14</td>
                <td title="4&#10;Absent - Excused">15</td>
                <td title="1&#10;Tardy&#10;7&#10;Absent - Unexcused">16</td>
            </tr>
        </table>
    </div></body></html>"##;
    let round_rock = by_id("roundrock").unwrap();
    let events = GradeParser::new(round_rock.as_ref()).parse_attendance(html).unwrap();

    assert_eq!(events.len(), 3);
    assert_eq!(events[0].date, NaiveDate::from_ymd_opt(2013, 10, 15).unwrap());
    assert_eq!((events[0].block, events[0].explanation.as_str()), (4, "Absent - Excused"));
    assert_eq!((events[2].block, events[2].explanation.as_str()), (7, "Absent - Unexcused"));
    assert_eq!(events[2].id, sha1_hex("2013-10-16|7"));
}

#[test]
fn attendance_page_without_a_table_is_malformed() {
    let austin = by_id("austin").unwrap();
    let result = GradeParser::new(austin.as_ref()).parse_attendance("<html><body>Log Out</body></html>");
    assert!(matches!(result, Err(Error::MalformedPage(_))));
}
