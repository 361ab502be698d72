//! Routing identity used to address the transport.

/// Identity and routing parameters for one participant's connection.
///
/// Supplied by whoever knows the participant's session binding; the client
/// only uses it to build the socket address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    /// Scheme and host, e.g. `wss://lab.example.org`.
    pub base_url: String,
    /// Application (experiment) name.
    pub app_name: String,
    /// Group identifier.
    pub group_id: String,
    /// Participant code.
    pub participant_code: String,
}

impl Endpoint {
    /// Creates an endpoint.
    #[must_use]
    pub fn new(
        base_url: impl Into<String>,
        app_name: impl Into<String>,
        group_id: impl Into<String>,
        participant_code: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            app_name: app_name.into(),
            group_id: group_id.into(),
            participant_code: participant_code.into(),
        }
    }

    /// Returns the socket address for this participant.
    #[must_use]
    pub fn url(&self) -> String {
        format!(
            "{}/redwood/app-name/{}/group/{}/participant/{}/",
            self.base_url.trim_end_matches('/'),
            self.app_name,
            self.group_id,
            self.participant_code
        )
    }
}
