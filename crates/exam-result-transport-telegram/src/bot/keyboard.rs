//! Core keyboards rendered as Telegram inline markup

use exam_result_core::keyboard::{ButtonKind, Keyboard};
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup};

/// Converts a core keyboard into inline markup, row for row
#[must_use]
pub fn to_markup(keyboard: &Keyboard) -> InlineKeyboardMarkup {
    let rows: Vec<Vec<InlineKeyboardButton>> = keyboard
        .rows
        .iter()
        .map(|row| {
            row.iter()
                .map(|button| match &button.kind {
                    ButtonKind::Callback(data) => {
                        InlineKeyboardButton::callback(button.label.clone(), data.clone())
                    }
                    ButtonKind::SwitchInline(query) => {
                        InlineKeyboardButton::switch_inline_query(button.label.clone(), query.clone())
                    }
                })
                .collect()
        })
        .collect();

    InlineKeyboardMarkup::new(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use exam_result_core::keyboard::Action;
    use teloxide::types::InlineKeyboardButtonKind;

    #[test]
    fn test_region_menu_layout_is_preserved() {
        let markup = to_markup(&Keyboard::region_menu());
        let core = Keyboard::region_menu();

        assert_eq!(markup.inline_keyboard.len(), core.rows.len());
        let first = &markup.inline_keyboard[0][0];
        assert_eq!(first.text, core.rows[0][0].label);
        assert!(matches!(
            &first.kind,
            InlineKeyboardButtonKind::CallbackData(data) if data.starts_with("region_")
        ));
    }

    #[test]
    fn test_share_button_uses_inline_query() {
        let markup = to_markup(&Keyboard::result_actions("🎓 Student Result"));
        let buttons: Vec<_> = markup.inline_keyboard.iter().flatten().collect();

        assert!(buttons.iter().any(|b| matches!(
            &b.kind,
            InlineKeyboardButtonKind::SwitchInlineQuery(query) if query == "🎓 Student Result"
        )));
        assert!(buttons.iter().any(|b| matches!(
            &b.kind,
            InlineKeyboardButtonKind::CallbackData(data) if *data == Action::BackToMenu.callback_data()
        )));
    }
}
