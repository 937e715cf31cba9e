//! CLI command for listing the catalog's collections

use crate::fetcher::CatalogFetcher;
use crate::shutdown::SharedShutdown;
use clap::Args;

use super::download::OutputFormat;
use super::{Cli, CliError};

/// `collections` arguments
#[derive(Debug, Args)]
pub struct CollectionsCommand {
    /// Only collections a full dump would process
    #[arg(long, default_value_t = false)]
    pub eligible: bool,
}

impl CollectionsCommand {
    /// Execute the listing
    pub async fn execute(&self, cli: &Cli, shutdown: SharedShutdown) -> Result<(), CliError> {
        let client = cli.client(shutdown)?;
        let collections: Vec<_> = client
            .list_collections()
            .await?
            .into_iter()
            .filter(|c| !self.eligible || c.is_eligible())
            .collect();

        match cli.output_format {
            OutputFormat::Json => {
                let json = serde_json::to_string_pretty(&collections)
                    .map_err(|e| CliError::ConfigurationError(format!("Failed to serialize collections: {e}")))?;
                println!("{json}");
            }
            OutputFormat::Human => {
                println!("Found {} collections:\n", collections.len());
                for collection in &collections {
                    println!(
                        "{} | {} | {}{}",
                        collection.code,
                        collection.status.as_deref().unwrap_or("-"),
                        if collection.is_active { "active" } else { "inactive" },
                        if collection.is_eligible() { " | eligible" } else { "" }
                    );
                }
            }
        }

        Ok(())
    }
}
