//! Behavior event types for the tracker.
//!
//! Input events describe what a source observed. Behavior events are what the
//! batcher queues and delivers. Key content is only kept for allow-listed
//! navigation keys, never for characters.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Maximum number of characters of clicked element text kept in metadata.
pub const MAX_CLICK_TEXT_CHARS: usize = 100;

/// Keys that may be recorded. Character keys never appear here.
pub const SAFE_KEYS: &[&str] = &[
    "Enter",
    "Tab",
    "Escape",
    "ArrowUp",
    "ArrowDown",
    "ArrowLeft",
    "ArrowRight",
    "PageUp",
    "PageDown",
    "Home",
    "End",
];

/// Check whether a key name is on the allow-list.
pub fn is_safe_key(key: &str) -> bool {
    SAFE_KEYS.contains(&key)
}

/// Behavior event classification. The serialized name is the delivered action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BehaviorEventType {
    PageView,
    Click,
    Scroll,
    Key,
    MouseMove,
}

impl BehaviorEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            BehaviorEventType::PageView => "page_view",
            BehaviorEventType::Click => "click",
            BehaviorEventType::Scroll => "scroll",
            BehaviorEventType::Key => "key",
            BehaviorEventType::MouseMove => "mouse_move",
        }
    }

    /// Types that fire often enough to need throttling.
    pub fn is_high_frequency(&self) -> bool {
        matches!(self, BehaviorEventType::MouseMove | BehaviorEventType::Scroll)
    }
}

impl std::fmt::Display for BehaviorEventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A queued behavior event.
///
/// Fields are private so an event cannot change after it is created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BehaviorEvent {
    event_type: BehaviorEventType,
    /// Milliseconds since the Unix epoch
    timestamp: i64,
    page: String,
    metadata: Map<String, Value>,
}

impl BehaviorEvent {
    pub fn new(
        event_type: BehaviorEventType,
        timestamp: i64,
        page: impl Into<String>,
        metadata: Map<String, Value>,
    ) -> Self {
        Self {
            event_type,
            timestamp,
            page: page.into(),
            metadata,
        }
    }

    pub fn event_type(&self) -> BehaviorEventType {
        self.event_type
    }

    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    pub fn page(&self) -> &str {
        &self.page
    }

    pub fn metadata(&self) -> &Map<String, Value> {
        &self.metadata
    }

    /// Action name sent to the activity endpoint.
    pub fn action(&self) -> &'static str {
        self.event_type.as_str()
    }

    /// Metadata as delivered: the event metadata plus its timestamp.
    pub fn delivery_metadata(&self) -> Map<String, Value> {
        let mut metadata = self.metadata.clone();
        metadata.insert("timestamp".to_string(), Value::from(self.timestamp));
        metadata
    }
}

/// Description of a clicked element.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClickTarget {
    pub tag: String,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub class: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
}

impl ClickTarget {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            ..Self::default()
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_class(mut self, class: impl Into<String>) -> Self {
        self.class = Some(class.into());
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// Build click metadata. Text is trimmed and truncated.
    pub fn to_metadata(&self) -> Map<String, Value> {
        let mut metadata = Map::new();
        metadata.insert("tag".to_string(), Value::from(self.tag.to_lowercase()));
        if let Some(ref id) = self.id {
            metadata.insert("id".to_string(), Value::from(id.as_str()));
        }
        if let Some(ref class) = self.class {
            metadata.insert("class".to_string(), Value::from(class.as_str()));
        }
        if let Some(ref text) = self.text {
            let text: String = text.trim().chars().take(MAX_CLICK_TEXT_CHARS).collect();
            if !text.is_empty() {
                metadata.insert("text".to_string(), Value::from(text));
            }
        }
        metadata
    }
}

/// Kind of input a listener subscribes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InputKind {
    Click,
    MouseMove,
    Scroll,
    KeyDown,
    Navigation,
}

/// An input signal dispatched by a source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InputEvent {
    Click(ClickTarget),
    MouseMove { x: f64, y: f64 },
    Scroll { scroll_x: f64, scroll_y: f64 },
    KeyDown { key: String },
    Navigation { path: String },
}

impl InputEvent {
    pub fn kind(&self) -> InputKind {
        match self {
            InputEvent::Click(_) => InputKind::Click,
            InputEvent::MouseMove { .. } => InputKind::MouseMove,
            InputEvent::Scroll { .. } => InputKind::Scroll,
            InputEvent::KeyDown { .. } => InputKind::KeyDown,
            InputEvent::Navigation { .. } => InputKind::Navigation,
        }
    }

    pub fn key(key: impl Into<String>) -> Self {
        InputEvent::KeyDown { key: key.into() }
    }

    pub fn navigation(path: impl Into<String>) -> Self {
        InputEvent::Navigation { path: path.into() }
    }
}
