use std::cmp::Ordering;

use chrono::Utc;
use log::debug;

use crate::grade::GradeValue;
use crate::models::{ClassGrades, Course, GradeChange, GradeChangeKind};

// How a grade moved from `old` to `new`; `None` when it did not, or when the new grade is gone.
fn grade_movement(old: &GradeValue, new: &GradeValue) -> Option<GradeChangeKind> {
    if new.is_none() || old == new {
        return None;
    }
    if old.is_none() {
        return Some(GradeChangeKind::New);
    }

    let ordering = match (old, new) {
        (GradeValue::Letter(old), GradeValue::Letter(new)) => old.cmp(new),
        _ => match (old.as_number(), new.as_number()) {
            (Some(old), Some(new)) => new.partial_cmp(&old)?,
            // a letter turned into a number or the other way round
            _ => return Some(GradeChangeKind::New),
        },
    };

    match ordering {
        Ordering::Greater => Some(GradeChangeKind::Up),
        Ordering::Less => Some(GradeChangeKind::Down),
        Ordering::Equal => None,
    }
}

// Courses are the same course when their ids match, or their titles when either has no id.
fn same_course(old: &Course, new: &Course) -> bool {
    match (&old.course_id, &new.course_id) {
        (Some(old_id), Some(new_id)) => old_id == new_id,
        _ => old.title == new.title,
    }
}

// Points as the portal shows them: "88", or "45/50" when not out of 100.
fn points_text(earned: f64, possible: f64) -> String {
    if possible == 100.0 {
        earned.to_string()
    } else {
        format!("{earned}/{possible}")
    }
}

// Compares two fetches of the averages page and lists every cycle grade that appeared or moved.
pub fn diff_courses(previous_courses: &[Course], fetched_courses: &[Course]) -> Vec<GradeChange> {
    let detected_at = Utc::now();
    let mut changes = Vec::new();

    // Iterate through the new courses; courses can appear or disappear between fetches
    for new_course in fetched_courses {
        let cycle_pairs: Vec<_> = match previous_courses.iter().find(|old| same_course(old, new_course)) {
            // Compare the cycles position by position within each semester
            Some(old_course) => old_course
                .semesters
                .iter()
                .zip(&new_course.semesters)
                .flat_map(|(old_sem, new_sem)| old_sem.cycles.iter().zip(&new_sem.cycles))
                .map(|(old_cycle, new_cycle)| (old_cycle.average, new_cycle))
                .collect(),
            // Entire course is new, every graded cycle counts as new
            None => new_course
                .semesters
                .iter()
                .flat_map(|semester| &semester.cycles)
                .map(|cycle| (GradeValue::default(), cycle))
                .collect(),
        };

        for (old_average, new_cycle) in cycle_pairs {
            // Only cycles with a detail link can be looked up later
            let Some(url_hash) = &new_cycle.url_hash else {
                continue;
            };
            if let Some(kind) = grade_movement(&old_average, &new_cycle.average) {
                changes.push(GradeChange {
                    id: url_hash.clone(),
                    kind,
                    new_grade: new_cycle.average.to_string(),
                    detected_at,
                });
            }
        }
    }

    debug!("{} cycle grades changed", changes.len());
    changes
}

// Compares two fetches of one cycle's detail and lists every assignment grade that appeared or moved.
pub fn diff_class_grades(previous: &ClassGrades, fetched: &ClassGrades) -> Vec<GradeChange> {
    let detected_at = Utc::now();
    let mut changes = Vec::new();

    // Iterate through the new categories, matched by id
    for new_category in &fetched.categories {
        let old_category = previous.categories.iter().find(|c| c.id == new_category.id);

        for new_assignment in &new_category.assignments {
            let Some(earned) = new_assignment.points_earned.as_number() else {
                continue;
            };

            // A category or assignment the old page did not have is new
            let old_earned = old_category
                .and_then(|category| category.assignments.iter().find(|a| a.id == new_assignment.id))
                .map(|assignment| assignment.points_earned)
                .unwrap_or_default();

            if let Some(kind) = grade_movement(&old_earned, &new_assignment.points_earned) {
                changes.push(GradeChange {
                    id: new_assignment.id.clone(),
                    kind,
                    new_grade: points_text(earned, new_assignment.points_possible),
                    detected_at,
                });
            }
        }
    }

    debug!("{} assignment grades changed in {}", changes.len(), fetched.title);
    changes
}
