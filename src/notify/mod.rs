pub mod dispatcher;
pub mod types;

pub use dispatcher::{DEFAULT_MAX_CONVERSATION_PAGES, Dispatcher, broadcast_text};
pub use types::{DeliveryOutcome, Destination, DestinationSpec, StrategyName};
