//! Rendering of fetched records: progress frames, result summary, statistics
//! and the post-result menu.
//!
//! All rich texts are Telegram HTML; upstream values are escaped.

use crate::keyboard::Keyboard;
use crate::model::{Language, ResultRecord};
use crate::stats::StatsSummary;
use crate::utils::truncate_str;
use crate::views::view;
use html_escape::encode_text;

/// Progress percentages shown while a lookup runs, in order
pub const PROGRESS_STEPS: [u8; 5] = [0, 25, 50, 75, 100];

/// Marker appended to a text-only result
pub const PHOTO_UNAVAILABLE: &str = "\n📷 <i>Photo unavailable</i>";

/// Maximum caption length accepted for photo messages
pub const CAPTION_LIMIT: usize = 1024;

/// Maximum length of an inline query
pub const SHARE_TEXT_LIMIT: usize = 256;

const MISSING: &str = "N/A";
const RESULT_HEADER: &str = "🎓 <b>Student Result</b>";
const PROGRESS_CELLS: u8 = 4;

/// Progress bar frame, e.g. `🟩🟩⬜⬜ (50%)`
#[must_use]
pub fn progress_frame(percent: u8) -> String {
    let percent = percent.min(100);
    let filled = percent / (100 / PROGRESS_CELLS);
    let mut frame = "🟩".repeat(usize::from(filled));
    frame.push_str(&"⬜".repeat(usize::from(PROGRESS_CELLS - filled)));
    frame.push_str(&format!(" ({percent}%)"));
    frame
}

fn field(value: Option<&String>) -> String {
    value.map_or_else(|| MISSING.to_string(), |v| encode_text(v).into_owned())
}

/// HTML summary of the student identity and course list
#[must_use]
pub fn render_summary(record: &ResultRecord) -> String {
    let student = &record.student;
    let mut text = format!(
        "{RESULT_HEADER}\n\n\
         👤 <b>Name:</b> {}\n\
         🎂 <b>Age:</b> {}\n\
         🏫 <b>School:</b> {}\n\
         📍 <b>Woreda:</b> {}\n\
         🚻 <b>Gender:</b> {}\n\
         📚 <b>Courses:</b>\n",
        field(student.name.as_ref()),
        field(student.age.as_ref()),
        field(student.school.as_ref()),
        field(student.woreda.as_ref()),
        field(student.gender.as_ref()),
    );

    for course in &record.courses {
        text.push_str(&format!("📖 • <b>{}</b>\n", field(course.name.as_ref())));
    }

    text
}

/// Plain-text summary used as the share query
#[must_use]
pub fn share_text(record: &ResultRecord) -> String {
    let student = &record.student;
    let plain = |value: Option<&String>| value.map_or(MISSING, String::as_str).to_string();

    let courses: Vec<String> = record
        .courses
        .iter()
        .map(|course| plain(course.name.as_ref()))
        .collect();

    let text = format!(
        "🎓 Student Result\n👤 Name: {}\n🏫 School: {}\n📚 Courses: {}",
        plain(student.name.as_ref()),
        plain(student.school.as_ref()),
        courses.join(", "),
    );
    truncate_str(text, SHARE_TEXT_LIMIT)
}

/// One outbound message carrying the result
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResultMessage {
    /// Photo with an HTML caption
    Photo {
        /// Image bytes
        bytes: Vec<u8>,
        /// HTML caption
        caption: String,
    },
    /// HTML text
    Text(String),
}

/// Messages that present the result, with or without the photo.
///
/// A summary too long for a caption is sent as a separate text after the photo.
#[must_use]
pub fn result_messages(summary: &str, photo: Option<Vec<u8>>) -> Vec<ResultMessage> {
    match photo {
        Some(bytes) if summary.chars().count() <= CAPTION_LIMIT => vec![ResultMessage::Photo {
            bytes,
            caption: summary.to_string(),
        }],
        Some(bytes) => vec![
            ResultMessage::Photo {
                bytes,
                caption: RESULT_HEADER.to_string(),
            },
            ResultMessage::Text(summary.to_string()),
        ],
        None => vec![ResultMessage::Text(without_photo(summary))],
    }
}

/// Summary with the photo-unavailable marker
#[must_use]
pub fn without_photo(summary: &str) -> String {
    format!("{summary}{PHOTO_UNAVAILABLE}")
}

/// HTML statistics block
#[must_use]
pub fn stats_text(stats: &StatsSummary) -> String {
    let mut text = format!(
        "📊 <b>Result Statistics</b>\n📚 Total Courses: {}\n",
        stats.total_courses
    );

    if let Some(average) = stats.average_score {
        text.push_str(&format!("📈 Average Score: {average:.2}\n"));
    }

    match (stats.passed, stats.failed) {
        (Some(passed), Some(failed)) => {
            text.push_str(&format!("✅ Passed: {passed}\n🚫 Failed: {failed}"));
        }
        _ => text.push_str("ℹ️ Pass/Fail status not available"),
    }

    text
}

/// Text and keyboard of the post-result menu
#[must_use]
pub fn post_result_menu(language: Language, record: &ResultRecord) -> (String, Keyboard) {
    (
        view(language).results_ready().to_string(),
        Keyboard::result_actions(&share_text(record)),
    )
}
