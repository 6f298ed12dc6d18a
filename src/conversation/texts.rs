//! Fixed user-facing texts the controller appends or surfaces.

/// Shown when none of the default image candidates could be loaded
pub const DEFAULT_IMAGE_NOT_FOUND: &str = "No default image found. Please upload one manually.";

/// Appended when the analysis call fails outright
pub const ANALYSIS_FAILED_APOLOGY: &str = "The image is loaded, but the AI analysis ran into a \
problem (please check the API key). You can still try asking me about it.";

/// Appended when a chat call fails
pub const CHAT_FAILED_APOLOGY: &str = "Sorry, something went wrong during the analysis. Please \
check the network or API configuration.";

/// Welcome turn embedding the analysis summary
pub fn welcome_message(summary: &str) -> String {
    format!(
        "✨ Visual index ready!\nThis image shows: {}\nAsk me anything about its details.",
        summary
    )
}
