//! Static string tables for both supported languages
//!
//! Every user-facing dialogue text lives here. Texts that only exist in
//! English fall back to the trait's default methods, so the Amharic table
//! overrides just what it translates.

use crate::keyboard::{Action, Button, Keyboard};
use crate::model::Language;

/// Bilingual language picker prompt, identical in both tables
pub const LANGUAGE_PROMPT: &str = "🌍 Please choose your language:\n\n🌍 እባክዎ ቋንቋዎን ይምረጡ:";

/// Dialogue texts for one interface language
pub trait DialogueView: Send + Sync {
    /// Region picker right after the language choice
    fn welcome_region_prompt(&self) -> &'static str;
    /// Region picker reached from the main menu
    fn region_prompt(&self) -> &'static str;
    /// Registration number prompt
    fn registration_prompt(&self) -> &'static str;
    /// Registration validation failure
    fn invalid_registration(&self) -> &'static str;
    /// First name prompt
    fn first_name_prompt(&self) -> &'static str;
    /// First name validation failure
    fn invalid_first_name(&self) -> &'static str;
    /// Feedback prompt
    fn feedback_prompt(&self) -> &'static str;
    /// Empty feedback rejection
    fn feedback_empty(&self) -> &'static str;
    /// Feedback accepted
    fn feedback_thanks(&self) -> &'static str;
    /// Feedback could not be stored
    fn feedback_failed(&self) -> &'static str;
    /// Greeting above the main menu
    fn main_menu_greeting(&self) -> &'static str;
    /// About screen
    fn about(&self) -> &'static str;
    /// Credits screen
    fn credits(&self) -> &'static str;
    /// Subscription confirmation
    fn subscribed(&self) -> &'static str;
    /// Main menu keyboard
    fn main_menu(&self) -> Keyboard;

    /// Unknown language button
    fn invalid_language(&self) -> &'static str {
        "❌ Invalid language selection. Please try again."
    }

    /// Unknown region button
    fn invalid_region(&self) -> &'static str {
        "❌ Invalid region selection. Please try again."
    }

    /// Unexpected failure
    fn generic_error(&self) -> &'static str {
        "❌ An error occurred. Please try again later."
    }

    /// Lookup started without all identity fields
    fn missing_information(&self) -> &'static str {
        "❌ Missing required information"
    }

    /// A second lookup was requested while one is still running
    fn lookup_in_progress(&self) -> &'static str {
        "⏳ Your previous request is still being processed. Please wait for it to finish."
    }

    /// Lookup ended without a record
    fn no_data_found(&self) -> &'static str {
        "🔴 No data found. Please check your details and try again."
    }

    /// Final state of the progress message
    fn request_completed(&self) -> &'static str {
        "✅ Request completed!"
    }

    /// Text above the post-result actions
    fn results_ready(&self) -> &'static str {
        "🎓 Here are your results and stats above. What would you like to do next?"
    }

    /// Shown to users outside the gating channel
    fn join_channel(&self, channel: &str) -> String {
        format!("🚫 You must join our channel to use this bot.\n\nPlease join {channel} and try again.")
    }
}

/// English texts
pub struct EnglishView;

impl DialogueView for EnglishView {
    fn welcome_region_prompt(&self) -> &'static str {
        "🎓 Welcome to the Ethiopian Student Results Bot!\n\nPlease select your region:"
    }

    fn region_prompt(&self) -> &'static str {
        "Please select your region:"
    }

    fn registration_prompt(&self) -> &'static str {
        "Please provide your registration number:"
    }

    fn invalid_registration(&self) -> &'static str {
        "❌ Invalid registration number. Try again."
    }

    fn first_name_prompt(&self) -> &'static str {
        "📝 Now please enter your first name:"
    }

    fn invalid_first_name(&self) -> &'static str {
        "❌ Invalid first name. Try again."
    }

    fn feedback_prompt(&self) -> &'static str {
        "📝 Please type your feedback:"
    }

    fn feedback_empty(&self) -> &'static str {
        "❌ Feedback cannot be empty. Please try again."
    }

    fn feedback_thanks(&self) -> &'static str {
        "✅ Thank you for your feedback!"
    }

    fn feedback_failed(&self) -> &'static str {
        "❌ An error occurred while submitting your feedback. Please try again later."
    }

    fn main_menu_greeting(&self) -> &'static str {
        "🌟 Welcome back! Please choose an option:"
    }

    fn about(&self) -> &'static str {
        "ℹ️ About the bot\n\nThis bot helps Ethiopian students check their results."
    }

    fn credits(&self) -> &'static str {
        "❤️ Created by t.me/Tegene"
    }

    fn subscribed(&self) -> &'static str {
        "🔔 You are now subscribed to receive updates when your final marks are released!"
    }

    fn main_menu(&self) -> Keyboard {
        Keyboard::new(vec![
            vec![Button::action("🌟 Ethiopian Student Results 🌟", &Action::Noop)],
            vec![
                Button::action("📚 Check Result", &Action::CheckResult),
                Button::action("ℹ️ About Bot", &Action::About),
            ],
            vec![
                Button::action("🌐 Switch Language", &Action::SwitchLanguage(Language::Am)),
                Button::action("📝 Send Feedback", &Action::Feedback),
            ],
            vec![Button::action("❤️ Credits", &Action::Credits)],
        ])
    }
}

/// Amharic texts
pub struct AmharicView;

impl DialogueView for AmharicView {
    fn welcome_region_prompt(&self) -> &'static str {
        "🎓 እንኳን ወደ ኢትዮጵያ የተማሪ ውጤት ቦት በደህና መጡ!\n\nእባክዎ ክልልዎን ይምረጡ:"
    }

    fn region_prompt(&self) -> &'static str {
        "እባክዎ ክልልዎን ይምረጡ:"
    }

    fn registration_prompt(&self) -> &'static str {
        "እባክዎ የምዝገባ ቁጥርዎን ያስገቡ:"
    }

    fn invalid_registration(&self) -> &'static str {
        "❌ የማያገለግል የምዝገባ ቁጥር። እባክዎ ደግመው ይሞክሩ።"
    }

    fn first_name_prompt(&self) -> &'static str {
        "📝 እባክዎ የእርስዎን የመጀመሪያ ስም ያስገቡ:"
    }

    fn invalid_first_name(&self) -> &'static str {
        "❌ የማያገለግል የመጀመሪያ ስም። እባክዎ ደግመው ይሞክሩ።"
    }

    fn feedback_prompt(&self) -> &'static str {
        "📝 እባክዎ አስተያየትዎን ይፃፉ:"
    }

    fn feedback_empty(&self) -> &'static str {
        "❌ አስተያየት ባዶ መሆን አይችልም። እባክዎ ደግመው ይሞክሩ።"
    }

    fn feedback_thanks(&self) -> &'static str {
        "✅ ለአስተያየትዎ እናመሰግናለን!"
    }

    fn feedback_failed(&self) -> &'static str {
        "❌ አስተያየትዎን በማስገባት ላይ ስህተት ተከስቷል። እባክዎ ቆይተው ይሞክሩ።"
    }

    fn main_menu_greeting(&self) -> &'static str {
        "🌟 እንኳን ደህና መጡ! እባክዎ አማራጭ ይምረጡ:"
    }

    fn about(&self) -> &'static str {
        "ℹ️ ስለ ቦቱ\n\nይህ ቦት ለኢትዮጵያውያን ተማሪዎች ውጤታቸውን ለማየት ይረዳቸዋል።"
    }

    fn credits(&self) -> &'static str {
        "❤️ በ t.me/Tegene የተሰራ"
    }

    fn subscribed(&self) -> &'static str {
        "🔔 የመጨረሻ ክፍል ውጤቶች ሲለቀቁ ለማሳወቅ ተመዝግበዋል!"
    }

    fn main_menu(&self) -> Keyboard {
        Keyboard::new(vec![
            vec![Button::action("🌟 የኢትዮጵያ ተማሪ ውጤት ማሳያ 🌟", &Action::Noop)],
            vec![
                Button::action("📚 ውጤት ለማየት", &Action::CheckResult),
                Button::action("ℹ️ ስለ ቦቱ", &Action::About),
            ],
            vec![
                Button::action("🌐 ቋንቋ ለመቀየር", &Action::SwitchLanguage(Language::En)),
                Button::action("📝 አስተያየት ለመላክ", &Action::Feedback),
            ],
            vec![Button::action("❤️ ተገኔ", &Action::Credits)],
        ])
    }
}

/// String table for a language
#[must_use]
pub fn view(language: Language) -> &'static dyn DialogueView {
    match language {
        Language::En => &EnglishView,
        Language::Am => &AmharicView,
    }
}

/// A dialogue message the state machine asks to show
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reply {
    /// Bilingual language picker
    LanguageMenu,
    /// Welcome text with the region picker
    WelcomeRegionMenu,
    /// Region picker
    RegionMenu,
    /// Unknown language button
    InvalidLanguage,
    /// Unknown region button, with the picker again
    InvalidRegion,
    /// Registration number prompt
    RegistrationPrompt,
    /// Registration validation failure
    InvalidRegistration,
    /// First name prompt
    FirstNamePrompt,
    /// First name validation failure
    InvalidFirstName,
    /// Feedback prompt
    FeedbackPrompt,
    /// Empty feedback rejection
    FeedbackEmpty,
    /// Feedback accepted, with the main menu
    FeedbackThanks,
    /// Feedback could not be stored
    FeedbackFailed,
    /// Membership gate notice
    JoinChannel,
    /// Main menu
    MainMenu,
    /// About screen with the main menu
    About,
    /// Credits screen with the main menu
    Credits,
    /// Subscription confirmation
    Subscribed,
    /// Unexpected failure
    GenericError,
    /// Lookup started without all identity fields
    MissingInformation,
    /// Lookup refused because another one is running
    LookupInProgress,
    /// Lookup ended without a record
    NoDataFound,
    /// Final state of the progress message
    RequestCompleted,
}

impl Reply {
    /// Text and keyboard of this reply in `language`; `channel` is the gating channel handle
    #[must_use]
    pub fn render(self, language: Language, channel: &str) -> (String, Option<Keyboard>) {
        let v = view(language);
        let text = |s: &str| s.to_string();

        match self {
            Self::LanguageMenu => (text(LANGUAGE_PROMPT), Some(Keyboard::language_menu())),
            Self::WelcomeRegionMenu => (
                text(v.welcome_region_prompt()),
                Some(Keyboard::region_menu()),
            ),
            Self::RegionMenu => (text(v.region_prompt()), Some(Keyboard::region_menu())),
            Self::InvalidLanguage => (text(v.invalid_language()), None),
            Self::InvalidRegion => (text(v.invalid_region()), Some(Keyboard::region_menu())),
            Self::RegistrationPrompt => (text(v.registration_prompt()), None),
            Self::InvalidRegistration => (text(v.invalid_registration()), None),
            Self::FirstNamePrompt => (text(v.first_name_prompt()), None),
            Self::InvalidFirstName => (text(v.invalid_first_name()), None),
            Self::FeedbackPrompt => (text(v.feedback_prompt()), None),
            Self::FeedbackEmpty => (text(v.feedback_empty()), None),
            Self::FeedbackThanks => (text(v.feedback_thanks()), Some(v.main_menu())),
            Self::FeedbackFailed => (text(v.feedback_failed()), None),
            Self::JoinChannel => (v.join_channel(channel), None),
            Self::MainMenu => (text(v.main_menu_greeting()), Some(v.main_menu())),
            Self::About => (text(v.about()), Some(v.main_menu())),
            Self::Credits => (text(v.credits()), Some(v.main_menu())),
            Self::Subscribed => (text(v.subscribed()), None),
            Self::GenericError => (text(v.generic_error()), None),
            Self::MissingInformation => (text(v.missing_information()), None),
            Self::LookupInProgress => (text(v.lookup_in_progress()), None),
            Self::NoDataFound => (text(v.no_data_found()), None),
            Self::RequestCompleted => (text(v.request_completed()), None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keyboard::ButtonKind;

    #[test]
    fn test_amharic_falls_back_for_untranslated_texts() {
        assert_eq!(
            view(Language::Am).no_data_found(),
            view(Language::En).no_data_found()
        );
        assert_ne!(
            view(Language::Am).registration_prompt(),
            view(Language::En).registration_prompt()
        );
    }

    #[test]
    fn test_main_menu_switch_button_targets_other_language() {
        for language in [Language::En, Language::Am] {
            let menu = view(language).main_menu();
            let target = Action::SwitchLanguage(language.toggled()).callback_data();
            assert!(menu
                .buttons()
                .any(|b| b.kind == ButtonKind::Callback(target.clone())));
        }
    }

    #[test]
    fn test_join_channel_mentions_channel() {
        let (text, keyboard) = Reply::JoinChannel.render(Language::En, "@results_channel");
        assert!(text.contains("Please join @results_channel"));
        assert!(keyboard.is_none());
    }

    #[test]
    fn test_invalid_region_repeats_picker() {
        let (_, keyboard) = Reply::InvalidRegion.render(Language::Am, "@c");
        assert_eq!(keyboard, Some(Keyboard::region_menu()));
        let (_, keyboard) = Reply::InvalidLanguage.render(Language::Am, "@c");
        assert_eq!(keyboard, None);
    }
}
