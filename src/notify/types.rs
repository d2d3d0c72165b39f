use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Where a notification should go before resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DestinationSpec {
    /// A user id already known to accept direct messages.
    Direct(String),
    /// An identity that must be looked up in the remote directory first.
    Email(String),
    /// A named broadcast channel.
    Channel(String),
}

impl DestinationSpec {
    /// Text used to name the intended recipient in reports and mentions.
    pub fn label(&self) -> &str {
        match self {
            Self::Direct(id) | Self::Email(id) | Self::Channel(id) => id,
        }
    }
}

impl fmt::Display for DestinationSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Direct(id) => write!(f, "user {id}"),
            Self::Email(email) => write!(f, "{email}"),
            Self::Channel(id) => write!(f, "channel {id}"),
        }
    }
}

/// Result of resolving a [`DestinationSpec`], computed once per target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum Destination {
    DirectId(String),
    ChannelId(String),
    Unresolved,
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::IntoStaticStr,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum StrategyName {
    /// Post straight to the recipient's implicit channel.
    Direct,
    /// Open a private conversation, or reuse an existing one.
    OpenOrFind,
    /// Post to the fallback channel with an explicit mention.
    Broadcast,
}

impl StrategyName {
    /// The standard evaluation order.
    pub const DEFAULT_ORDER: [Self; 3] = [Self::Direct, Self::OpenOrFind, Self::Broadcast];
}

/// Diagnostic record of one `deliver` call. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeliveryOutcome {
    pub recipient: String,
    pub destination: Destination,
    pub attempted: Vec<StrategyName>,
    pub succeeded: Option<StrategyName>,
    pub errors: BTreeMap<StrategyName, String>,
    /// Why resolution produced [`Destination::Unresolved`], if it did.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolution_error: Option<String>,
}

impl DeliveryOutcome {
    pub(crate) fn new(recipient: &str, destination: Destination) -> Self {
        Self {
            recipient: recipient.to_string(),
            destination,
            attempted: Vec::new(),
            succeeded: None,
            errors: BTreeMap::new(),
            resolution_error: None,
        }
    }

    pub fn delivered(&self) -> bool {
        self.succeeded.is_some()
    }

    /// True when the message only reached the broadcast fallback.
    pub fn used_fallback(&self) -> bool {
        self.succeeded == Some(StrategyName::Broadcast)
    }
}
