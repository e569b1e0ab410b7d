//! Terminal navigation for terminated sessions.

use copoto_client::Navigator;
use parking_lot::Mutex;
use url::form_urlencoded;

/// Navigator for a command-line session.
///
/// The "location" is the API path of the command being run. Being sent to
/// login means telling the user how to sign in again.
#[derive(Debug, Default)]
pub struct TerminalNavigator {
    location: Mutex<Option<String>>,
}

impl TerminalNavigator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Navigator positioned at `path` with its query parameters.
    pub fn at(path: &str, query: &[(String, String)]) -> Self {
        let mut location = format!("/{}", path.trim_start_matches('/'));
        if !query.is_empty() {
            let encoded = form_urlencoded::Serializer::new(String::new())
                .extend_pairs(query)
                .finish();
            location.push(if location.contains('?') { '&' } else { '?' });
            location.push_str(&encoded);
        }

        let navigator = Self::new();
        *navigator.location.lock() = Some(location);
        navigator
    }
}

impl Navigator for TerminalNavigator {
    fn current_location(&self) -> Option<String> {
        self.location.lock().clone()
    }

    fn to_login(&self) {
        eprintln!("Session expired. Run 'copoto login <id>' to sign in again.");
        if let Some(location) = self.current_location() {
            eprintln!("Then run 'copoto resume' to return to {}.", location);
        }
    }

    fn to_location(&self, location: &str) {
        tracing::debug!(location, "Navigating");
        *self.location.lock() = Some(location.to_string());
    }
}
