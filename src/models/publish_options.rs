use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Optional metadata attached to a published channel message.
///
/// # Example
///
/// ```rust
/// use pylon_link::PublishOptions;
///
/// let options = PublishOptions::new()
///     .with_publisher_id("user-42")
///     .with_subtopic("europe.news");
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PublishOptions {
    /// Identity the gateway attaches to the delivered message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub publisher_id: Option<String>,

    /// Subtopic for selector matching on the subscriber side.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subtopic: Option<String>,

    /// Free-form headers for selector matching on the subscriber side.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub headers: Option<JsonValue>,
}

impl PublishOptions {
    /// Create empty publish options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the publisher identity.
    pub fn with_publisher_id(mut self, publisher_id: impl Into<String>) -> Self {
        self.publisher_id = Some(publisher_id.into());
        self
    }

    /// Set the subtopic.
    pub fn with_subtopic(mut self, subtopic: impl Into<String>) -> Self {
        self.subtopic = Some(subtopic.into());
        self
    }

    /// Set message headers.
    pub fn with_headers(mut self, headers: JsonValue) -> Self {
        self.headers = Some(headers);
        self
    }
}
