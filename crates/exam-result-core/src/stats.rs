//! Summary counts derived from a result record

use crate::model::ResultRecord;

/// Aggregate numbers shown under a result
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StatsSummary {
    /// Number of courses in the record
    pub total_courses: usize,
    /// Mean of the integer scores, `None` when no score qualifies
    pub average_score: Option<f64>,
    /// Courses whose status reads "pass", when status is reported
    pub passed: Option<usize>,
    /// `total_courses - passed`, when status is reported
    pub failed: Option<usize>,
}

/// Computes summary counts for a record.
///
/// Only scores made entirely of ASCII digits take part in the average.
/// Pass/fail counts are reported only when the *first* course carries a
/// status; later courses without one count as failed.
#[must_use]
pub fn compute_stats(record: &ResultRecord) -> StatsSummary {
    let courses = &record.courses;
    let total_courses = courses.len();

    let scores: Vec<f64> = courses
        .iter()
        .filter_map(|course| course.score.as_deref())
        .filter_map(integer_score)
        .collect();

    let average_score = if scores.is_empty() {
        None
    } else {
        Some(scores.iter().sum::<f64>() / as_f64(scores.len()))
    };

    let status_reported = courses.first().is_some_and(|course| course.status.is_some());
    let (passed, failed) = if status_reported {
        let passed = courses
            .iter()
            .filter(|course| {
                course
                    .status
                    .as_deref()
                    .is_some_and(|status| status.eq_ignore_ascii_case("pass"))
            })
            .count();
        (Some(passed), Some(total_courses - passed))
    } else {
        (None, None)
    };

    StatsSummary {
        total_courses,
        average_score,
        passed,
        failed,
    }
}

fn integer_score(raw: &str) -> Option<f64> {
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    raw.parse::<f64>().ok()
}

#[allow(clippy::cast_precision_loss)]
const fn as_f64(n: usize) -> f64 {
    n as f64
}
