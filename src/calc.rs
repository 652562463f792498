use crate::grade::GradeValue;
use crate::models::{Assignment, Category, Cycle};
use crate::utils::numeric::mean;

// Note text the portal appends to assignments that no longer count.
const DROPPED_NOTE: &str = "(Dropped)";

// Round half away from zero, the portal's rounding.
fn round_grade(value: f64) -> GradeValue {
    GradeValue::Integer(value.round() as i32)
}

// Weighted average of every graded, non-extra-credit, non-dropped
// assignment, on a 0-100 scale.
pub fn category_average(assignments: &[Assignment]) -> Option<f64> {
    let mut weighted_total = 0.0;
    let mut weights = 0.0;

    for assignment in assignments {
        if assignment.extra_credit || assignment.note.contains(DROPPED_NOTE) {
            continue;
        }
        if let Some(earned) = assignment.points_earned.as_number() {
            weighted_total += earned * 100.0 * assignment.weight / assignment.points_possible;
            weights += assignment.weight;
        }
    }

    if weights == 0.0 {
        return None;
    }
    Some(weighted_total / weights)
}

// Points from graded extra-credit assignments. Zero, never `None`, when a
// category has none.
pub fn category_bonus(assignments: &[Assignment]) -> f64 {
    assignments
        .iter()
        .filter(|assignment| assignment.extra_credit)
        .filter_map(|assignment| assignment.points_earned.as_number())
        .sum()
}

// Weighted average of the categories that have an average, plus the bonus
// of every category, rounded to an integer.
pub fn cycle_average(categories: &[Category]) -> GradeValue {
    let mut weighted_total = 0.0;
    let mut weights = 0.0;

    for category in categories {
        if let Some(average) = category.average {
            weighted_total += average * category.weight;
            weights += category.weight;
        }
    }

    if weights == 0.0 {
        return GradeValue::default();
    }

    // bonuses count even for categories without an average
    let bonus: f64 = categories.iter().map(|category| category.bonus).sum();
    round_grade(weighted_total / weights + bonus)
}

// Share of the semester grade carried by the cycles: `100 - exam_weight`,
// scaled down by the fraction of cycles that are graded.
pub fn cycle_block_weight(graded_cycles: usize, total_cycles: usize, exam_weight: f64) -> f64 {
    let total = if total_cycles == 0 { 1 } else { total_cycles };
    (100.0 - exam_weight) * graded_cycles as f64 / total as f64
}

// Semester average from the cycle averages and the exam. Letter grades and
// missing grades are left out of the arithmetic.
pub fn semester_average(cycles: &[Cycle], exam_grade: &GradeValue, exam_weight: f64) -> GradeValue {
    let graded: Vec<f64> = cycles
        .iter()
        .filter_map(|cycle| cycle.average.as_number())
        .collect();

    let mut weighted_total = 0.0;
    let mut weights = 0.0;

    let cycle_weight = cycle_block_weight(graded.len(), cycles.len(), exam_weight);
    if let Some(cycle_mean) = mean(&graded) {
        if cycle_weight > 0.0 {
            weighted_total += cycle_mean * cycle_weight;
            weights += cycle_weight;
        }
    }

    if let Some(exam) = exam_grade.as_number() {
        weighted_total += exam * exam_weight;
        weights += exam_weight;
    }

    if weights == 0.0 {
        return GradeValue::default();
    }
    round_grade(weighted_total / weights)
}
