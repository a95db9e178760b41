use anyhow::Result;
use clap::Parser;

use crate::CatalogBuilder;
use crate::cli::SubCommandExtend;
use crate::config::Opts;

#[derive(Parser, Debug, Clone)]
pub struct StatusCommand {}

impl SubCommandExtend for StatusCommand {
    async fn run(&self, opts: &Opts) -> Result<()> {
        let catalog = CatalogBuilder::new(opts.conf_dir.clone()).open().await?;
        let status = catalog.status().await;
        println!("{}", serde_json::to_string_pretty(&status)?);
        Ok(())
    }
}
