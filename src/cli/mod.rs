//! CLI command implementations

pub mod download;
pub mod error;
pub mod export;
pub mod sources;

pub use download::{Cli, Commands, DownloadArgs, DumpArgs, IdentifiersArgs};
pub use error::CliError;
pub use export::ExportDatesArgs;
pub use sources::CollectionsCommand;
