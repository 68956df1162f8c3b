use exam_result_core::model::{Course, ResultRecord, Student};
use exam_result_core::presenter::progress_frame;
use exam_result_core::session::{validate_first_name, validate_registration};
use exam_result_core::stats::compute_stats;
use proptest::prelude::*;

proptest! {
    /// Registration numbers of 6 to 10 digits pass; any surrounding whitespace fails.
    #[test]
    fn accepts_digit_registrations(number in "[0-9]{6,10}", pad in "[ \t]{1,3}") {
        prop_assert!(validate_registration(&number));
        let padded = format!("{pad}{number}");
        prop_assert!(!validate_registration(&padded));
    }

    #[test]
    fn rejects_registrations_of_wrong_length(number in "[0-9]{0,5}|[0-9]{11,16}") {
        prop_assert!(!validate_registration(&number));
    }

    #[test]
    fn rejects_registrations_with_other_characters(
        head in "[0-9]{3}",
        bad in "[a-zA-Z./_-]",
        tail in "[0-9]{3,5}",
    ) {
        let input = format!("{head}{bad}{tail}");
        prop_assert!(!validate_registration(&input));
    }

    #[test]
    fn accepts_latin_names(name in "[A-Za-z][A-Za-z -]{0,24}") {
        prop_assert!(validate_first_name(&name));
    }

    #[test]
    fn rejects_names_with_digits_or_symbols(
        name in "[A-Za-z]{1,8}",
        bad in "[0-9@#_.'!]",
    ) {
        let input = format!("{name}{bad}");
        prop_assert!(!validate_first_name(&input));
    }

    /// The average always lies between the smallest and largest counted score.
    #[test]
    fn average_is_bounded(scores in proptest::collection::vec(0u32..=100, 1..12)) {
        let record = ResultRecord {
            student: Student::default(),
            courses: scores
                .iter()
                .map(|score| Course {
                    score: Some(score.to_string()),
                    ..Course::default()
                })
                .collect(),
        };

        let stats = compute_stats(&record);
        let average = stats.average_score.unwrap_or(-1.0);
        let min = f64::from(scores.iter().copied().min().unwrap_or_default());
        let max = f64::from(scores.iter().copied().max().unwrap_or_default());

        prop_assert_eq!(stats.total_courses, scores.len());
        prop_assert!(average >= min && average <= max, "{} outside [{}, {}]", average, min, max);
        prop_assert_eq!(stats.passed, None);
    }

    #[test]
    fn progress_frame_always_has_four_cells(percent in 0u8..=255) {
        let frame = progress_frame(percent);
        let cells = frame.chars().filter(|c| *c == '🟩' || *c == '⬜').count();
        prop_assert_eq!(cells, 4);
        prop_assert!(frame.ends_with("%)"));
    }
}
