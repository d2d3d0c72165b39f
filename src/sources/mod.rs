pub mod github;
pub mod roster;

pub use github::{GitHubClient, OwnerKind};
pub use roster::{LinkRecipient, Roster};
