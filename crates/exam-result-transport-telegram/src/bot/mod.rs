/// Command, text and callback handlers
pub mod handlers;
/// Conversion of core keyboards into inline markup
pub mod keyboard;
/// Resilient messaging with automatic retry for Telegram API operations
pub mod resilient;
/// `Transport` implementation backed by the Bot API
pub mod transport;
