//! Transport-neutral inline keyboards and the button actions they carry

use crate::model::{Language, Region};

/// Callback data prefix of language buttons
pub const LANGUAGE_PREFIX: &str = "language_";
/// Callback data prefix of region buttons
pub const REGION_PREFIX: &str = "region_";

/// What a button does when pressed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ButtonKind {
    /// Sends callback data back to the bot
    Callback(String),
    /// Opens inline-query mode in another chat with the given query text
    SwitchInline(String),
}

/// A single inline button
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Button {
    /// Label shown to the user
    pub label: String,
    /// Button behaviour
    pub kind: ButtonKind,
}

impl Button {
    /// Button that triggers `action`
    #[must_use]
    pub fn action(label: impl Into<String>, action: &Action) -> Self {
        Self {
            label: label.into(),
            kind: ButtonKind::Callback(action.callback_data()),
        }
    }

    /// Button that switches to inline mode with `query`
    #[must_use]
    pub fn switch_inline(label: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            kind: ButtonKind::SwitchInline(query.into()),
        }
    }
}

/// Rows of inline buttons attached to a message
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Keyboard {
    /// Button rows, top to bottom
    pub rows: Vec<Vec<Button>>,
}

impl Keyboard {
    /// Keyboard from explicit rows
    #[must_use]
    pub const fn new(rows: Vec<Vec<Button>>) -> Self {
        Self { rows }
    }

    /// Language picker shown after `/start`
    #[must_use]
    pub fn language_menu() -> Self {
        Self::new(vec![
            vec![Button::action("English 🇬🇧", &Action::ChooseLanguage(Language::En))],
            vec![Button::action("Amharic 🇪🇹", &Action::ChooseLanguage(Language::Am))],
        ])
    }

    /// Region picker with a back button to the language picker
    #[must_use]
    pub fn region_menu() -> Self {
        let mut rows: Vec<Vec<Button>> = Region::ALL
            .into_iter()
            .map(|region| vec![Button::action(region.display_name(), &Action::ChooseRegion(region))])
            .collect();
        rows.push(vec![Button::action("🔙 Back", &Action::BackToLanguage)]);
        Self::new(rows)
    }

    /// Post-result actions; the share button pre-fills `share_text`
    #[must_use]
    pub fn result_actions(share_text: &str) -> Self {
        Self::new(vec![
            vec![Button::action("🏠 Back to Menu", &Action::BackToMenu)],
            vec![Button::action("🔔 Subscribe for Updates", &Action::Subscribe)],
            vec![Button::switch_inline("📤 Share Result", share_text)],
        ])
    }

    /// Every button in row order
    pub fn buttons(&self) -> impl Iterator<Item = &Button> {
        self.rows.iter().flatten()
    }
}

/// Decoded callback button press
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Language picker choice
    ChooseLanguage(Language),
    /// Region picker choice
    ChooseRegion(Region),
    /// Back from the region picker
    BackToLanguage,
    /// Start a new lookup from the main menu
    CheckResult,
    /// About screen
    About,
    /// Credits screen
    Credits,
    /// Switch the interface to the given language
    SwitchLanguage(Language),
    /// Open the feedback prompt
    Feedback,
    /// Clear the exchange and show a fresh main menu
    BackToMenu,
    /// Subscribe to result release updates
    Subscribe,
    /// Decorative header button
    Noop,
    /// Anything else
    Unknown(String),
}

impl Action {
    /// Decodes callback data, accepting the `_amharic` aliases of menu buttons
    #[must_use]
    pub fn parse(data: &str) -> Self {
        if let Some(code) = data.strip_prefix(LANGUAGE_PREFIX) {
            return Language::parse(code)
                .map_or_else(|| Self::Unknown(data.to_string()), Self::ChooseLanguage);
        }
        if let Some(code) = data.strip_prefix(REGION_PREFIX) {
            return Region::parse(code)
                .map_or_else(|| Self::Unknown(data.to_string()), Self::ChooseRegion);
        }

        match data {
            "change_to_amharic" => return Self::SwitchLanguage(Language::Am),
            "change_to_english" => return Self::SwitchLanguage(Language::En),
            _ => {}
        }

        match data.strip_suffix("_amharic").unwrap_or(data) {
            "back_to_language" => Self::BackToLanguage,
            "check_result" => Self::CheckResult,
            "about" => Self::About,
            "creator" => Self::Credits,
            "feedback" => Self::Feedback,
            "back_to_menu" => Self::BackToMenu,
            "subscribe" => Self::Subscribe,
            "noop" => Self::Noop,
            _ => Self::Unknown(data.to_string()),
        }
    }

    /// Encodes the action as callback data
    #[must_use]
    pub fn callback_data(&self) -> String {
        match self {
            Self::ChooseLanguage(language) => format!("{LANGUAGE_PREFIX}{}", language.code()),
            Self::ChooseRegion(region) => format!("{REGION_PREFIX}{}", region.code()),
            Self::BackToLanguage => "back_to_language".to_string(),
            Self::CheckResult => "check_result".to_string(),
            Self::About => "about".to_string(),
            Self::Credits => "creator".to_string(),
            Self::SwitchLanguage(Language::Am) => "change_to_amharic".to_string(),
            Self::SwitchLanguage(Language::En) => "change_to_english".to_string(),
            Self::Feedback => "feedback".to_string(),
            Self::BackToMenu => "back_to_menu".to_string(),
            Self::Subscribe => "subscribe".to_string(),
            Self::Noop => "noop".to_string(),
            Self::Unknown(data) => data.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_callback_data_round_trips() {
        let actions = [
            Action::ChooseLanguage(Language::En),
            Action::ChooseLanguage(Language::Am),
            Action::ChooseRegion(Region::Sw),
            Action::BackToLanguage,
            Action::CheckResult,
            Action::About,
            Action::Credits,
            Action::SwitchLanguage(Language::Am),
            Action::SwitchLanguage(Language::En),
            Action::Feedback,
            Action::BackToMenu,
            Action::Subscribe,
            Action::Noop,
        ];
        for action in actions {
            assert_eq!(Action::parse(&action.callback_data()), action);
        }
    }

    #[test]
    fn test_amharic_aliases_and_unknown_data() {
        assert_eq!(Action::parse("check_result_amharic"), Action::CheckResult);
        assert_eq!(Action::parse("feedback_amharic"), Action::Feedback);
        assert_eq!(Action::parse("creator_amharic"), Action::Credits);
        assert_eq!(
            Action::parse("language_fr"),
            Action::Unknown("language_fr".to_string())
        );
        assert_eq!(
            Action::parse("region_tigray"),
            Action::Unknown("region_tigray".to_string())
        );
    }

    #[test]
    fn test_region_menu_lists_regions_then_back() {
        let keyboard = Keyboard::region_menu();
        assert_eq!(keyboard.rows.len(), Region::ALL.len() + 1);
        assert_eq!(keyboard.rows[0][0].label, "Addis Ababa");
        assert_eq!(
            keyboard.rows[4][0].kind,
            ButtonKind::Callback("back_to_language".to_string())
        );
    }

    #[test]
    fn test_result_actions_share_button() {
        let keyboard = Keyboard::result_actions("Abel: 3 courses");
        let share = keyboard.buttons().last();
        assert_eq!(
            share.map(|b| &b.kind),
            Some(&ButtonKind::SwitchInline("Abel: 3 courses".to_string()))
        );
    }
}
