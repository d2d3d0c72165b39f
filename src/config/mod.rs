pub mod schema;

pub use schema::{
    Config, DetectorConfig, DirectoryConfig, GitHubConfig, ReliabilityConfig, SlackConfig,
};
