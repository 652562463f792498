use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::calc;
use crate::grade::GradeValue;
use crate::utils::date::parse_portal_date;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Assignment {
    pub id: String,
    pub title: String,
    pub date_due: String,
    pub date_assigned: String,
    // Only ever `GradeValue::None` or `GradeValue::Fractional`.
    pub points_earned: GradeValue,
    pub points_possible: f64,
    pub weight: f64,
    pub note: String,
    pub extra_credit: bool,
}

impl Assignment {
    // Renders the score the way a gradebook cell would: "95", "18/20", "88×0.6".
    pub fn points_string(&self) -> String {
        let earned = match self.points_earned.as_number() {
            Some(earned) => earned,
            None => return "-".to_string(),
        };

        let mut pts = earned.to_string();
        if self.points_possible != 100.0 {
            pts.push_str(&format!("/{}", self.points_possible));
        }
        if self.weight != 1.0 {
            pts.push_str(&format!("\u{00D7}{}", self.weight));
        }
        pts
    }

    // Portal dates carry no year; `today` picks the school year.
    pub fn due_date(&self, today: NaiveDate) -> Option<NaiveDate> {
        parse_portal_date(&self.date_due, today)
    }

    pub fn assigned_date(&self, today: NaiveDate) -> Option<NaiveDate> {
        parse_portal_date(&self.date_assigned, today)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Category {
    pub id: String,
    pub title: String,
    // Declared percentage; weights across a cycle need not add up to 100.
    pub weight: f64,
    pub average: Option<f64>,
    pub bonus: f64,
    pub assignments: Vec<Assignment>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Cycle {
    pub index: usize,
    pub average: GradeValue,
    pub url_hash: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Semester {
    pub index: usize,
    pub cycles: Vec<Cycle>,
    pub exam_grade: GradeValue,
    pub average: GradeValue,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Course {
    pub title: String,
    pub period: Option<u32>,
    pub teacher_name: String,
    pub teacher_email: String,
    pub course_id: Option<String>,
    pub semesters: Vec<Semester>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ClassGrades {
    pub title: String,
    pub period: u32,
    pub url_hash: String,
    pub semester_index: usize,
    pub cycle_index: usize,
    pub average: Option<i32>,
    pub categories: Vec<Category>,
}

impl ClassGrades {
    // Our own cycle average from the categories, for comparison with `average`.
    pub fn computed_average(&self) -> GradeValue {
        calc::cycle_average(&self.categories)
    }
}

// One selectable student on an account linked to several.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct StudentChoice {
    pub id: String,
    pub name: String,
    pub student_id: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct StudentInfo {
    pub name: String,
    pub school: String,
}

impl StudentInfo {
    // Works for both "Last, First Middle" and "First Middle Last".
    pub fn first_name(&self) -> &str {
        let given = self.name.rsplit(", ").next().unwrap_or(&self.name);
        given.split(' ').next().unwrap_or(given)
    }
}

// Which way a grade moved since the previous fetch.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum GradeChangeKind {
    New,
    Up,
    Down,
}

// One changed grade. `id` is the cycle's url-hash for averages and the
// assignment id for cycle detail.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct GradeChange {
    pub id: String,
    pub kind: GradeChangeKind,
    pub new_grade: String,
    pub detected_at: DateTime<Utc>,
}

// One absence or tardy; `id` is the SHA-1 of "date|block".
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct AttendanceEvent {
    pub id: String,
    pub date: NaiveDate,
    pub block: u32,
    pub explanation: String,
}
