//! Pure dialogue state machine
//!
//! [`transition`] validates one input against the session, updates it and
//! returns the effects the engine has to carry out. It never touches the
//! network, so every row of the dialogue table can be tested synchronously.

use crate::keyboard::Action;
use crate::session::{ConversationSession, Stage};
use crate::storage::UsageAction;
use crate::views::Reply;
use tracing::debug;

/// One user input, already decoded from the transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    /// `/start`, with the result of the membership check
    Start {
        /// Whether the user is in the gating channel
        is_member: bool,
    },
    /// `/feedback`
    FeedbackCommand,
    /// Inline button press
    Action(Action),
    /// Free text message
    Text(String),
}

/// Work requested by a transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Replace the message the button belongs to, or send a new one
    Show(Reply),
    /// Send a new message
    Send(Reply),
    /// Tell the admins a user passed the gate
    NotifyNewUser,
    /// Append a usage event
    RecordUsage(UsageAction),
    /// Persist a subscription and confirm it
    Subscribe,
    /// Persist the feedback text and confirm it
    SaveFeedback(String),
    /// Delete tracked messages, clear the session and show a fresh menu
    ResetToMenu,
    /// Run the fetch pipeline; always the last effect
    RunPipeline,
}

/// Applies `input` to `session` and returns the effects to execute, in order
pub fn transition(session: &mut ConversationSession, input: Input) -> Vec<Effect> {
    let stage = session.stage();
    debug!(?stage, ?input, "Dialogue input");

    match (stage, input) {
        (_, Input::Start { is_member: false }) => {
            session.reset();
            session.set_stage(Stage::Done);
            vec![Effect::Send(Reply::JoinChannel)]
        }
        (_, Input::Start { is_member: true }) => {
            session.reset();
            session.set_stage(Stage::Language);
            vec![
                Effect::NotifyNewUser,
                Effect::RecordUsage(UsageAction::Start),
                Effect::Send(Reply::LanguageMenu),
            ]
        }
        (_, Input::FeedbackCommand) => {
            session.set_stage(Stage::Feedback);
            vec![Effect::Send(Reply::FeedbackPrompt)]
        }
        (_, Input::Action(Action::Feedback)) => {
            session.set_stage(Stage::Feedback);
            vec![Effect::Show(Reply::FeedbackPrompt)]
        }
        (_, Input::Action(Action::BackToMenu)) => vec![Effect::ResetToMenu],
        (_, Input::Action(Action::Subscribe)) => vec![
            Effect::Subscribe,
            Effect::RecordUsage(UsageAction::Subscribe),
        ],
        (_, Input::Action(Action::CheckResult)) => {
            session.set_stage(Stage::Region);
            vec![Effect::Show(Reply::RegionMenu)]
        }

        (Stage::Language, Input::Action(Action::ChooseLanguage(language))) => {
            session.set_language(language);
            session.set_stage(Stage::Region);
            vec![Effect::Show(Reply::WelcomeRegionMenu)]
        }
        (Stage::Language, Input::Action(_)) => vec![Effect::Show(Reply::InvalidLanguage)],

        (Stage::Region, Input::Action(Action::BackToLanguage)) => {
            session.set_stage(Stage::Language);
            vec![Effect::Show(Reply::LanguageMenu)]
        }
        (Stage::Region, Input::Action(Action::ChooseRegion(region))) => {
            session.set_region(region);
            session.set_stage(Stage::Registration);
            vec![Effect::Show(Reply::RegistrationPrompt)]
        }
        (Stage::Region, Input::Action(_)) => vec![Effect::Show(Reply::InvalidRegion)],

        (Stage::Registration, Input::Text(text)) => match session.set_registration(&text) {
            Ok(()) => {
                session.set_stage(Stage::FirstName);
                vec![Effect::Send(Reply::FirstNamePrompt)]
            }
            Err(_) => vec![Effect::Send(Reply::InvalidRegistration)],
        },

        (Stage::FirstName, Input::Text(text)) => match session.set_first_name(&text) {
            Ok(()) => {
                session.set_stage(Stage::Done);
                vec![Effect::RunPipeline]
            }
            Err(_) => vec![Effect::Send(Reply::InvalidFirstName)],
        },

        (Stage::Feedback, Input::Text(text)) => {
            let feedback = text.trim();
            if feedback.is_empty() {
                vec![Effect::Send(Reply::FeedbackEmpty)]
            } else {
                session.set_stage(Stage::Done);
                vec![Effect::SaveFeedback(feedback.to_string())]
            }
        }

        (
            Stage::Registration | Stage::FirstName | Stage::Feedback | Stage::Done | Stage::Menu,
            Input::Action(action),
        ) => menu_action(session, action),

        (Stage::Language | Stage::Region | Stage::Done | Stage::Menu, Input::Text(_)) => {
            debug!(?stage, "Ignoring text outside a text prompt");
            Vec::new()
        }
    }
}

/// Main menu buttons, valid whenever no picker is waiting for a choice
fn menu_action(session: &mut ConversationSession, action: Action) -> Vec<Effect> {
    match action {
        Action::About => vec![Effect::Show(Reply::About)],
        Action::Credits => vec![Effect::Show(Reply::Credits)],
        Action::SwitchLanguage(language) => {
            session.set_language(language);
            vec![Effect::Show(Reply::MainMenu)]
        }
        Action::Noop
        | Action::ChooseLanguage(_)
        | Action::ChooseRegion(_)
        | Action::BackToLanguage
        | Action::Unknown(_) => {
            debug!(?action, "Ignoring stale or unknown button");
            Vec::new()
        }
        // handled before stage dispatch
        Action::CheckResult | Action::Feedback | Action::BackToMenu | Action::Subscribe => {
            Vec::new()
        }
    }
}
