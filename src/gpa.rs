use crate::models::Course;

// Grade points for one semester grade. Below 70 earns nothing; otherwise
// `(grade - 60) / 10`, capped at 4, plus `offset` (0 unweighted, 1 for a
// 5.0 scale, 2 for a 6.0 scale, or a district's honors boost).
pub fn grade_point(grade: f64, offset: f64) -> f64 {
    if grade < 70.0 {
        return 0.0;
    }
    ((grade - 60.0) / 10.0).min(4.0) + offset
}

// Mean of the grade points of every integer semester average; None when there are none.
fn average_points<F>(courses: &[Course], offset_for: F) -> Option<f64>
where
    F: Fn(&Course) -> f64,
{
    let points: Vec<f64> = courses
        .iter()
        .flat_map(|course| {
            let offset = offset_for(course);
            course
                .semesters
                .iter()
                .filter_map(|semester| semester.average.as_integer())
                .map(move |average| grade_point(f64::from(average), offset))
        })
        .collect();

    if points.is_empty() {
        return None;
    }
    Some(points.iter().sum::<f64>() / points.len() as f64)
}

// Mean grade point of every integer semester average, honors ignored.
pub fn unweighted_gpa(courses: &[Course]) -> Option<f64> {
    average_points(courses, |_| 0.0)
}

// Like `unweighted_gpa`, but courses whose title is listed in
// `honors_titles` (exact match) earn `offset` extra points.
pub fn weighted_gpa(courses: &[Course], honors_titles: &[String], offset: f64) -> Option<f64> {
    average_points(courses, |course| {
        if honors_titles.iter().any(|title| *title == course.title) {
            offset
        } else {
            0.0
        }
    })
}
