use anyhow::Result;
use clap::{Parser, ValueEnum};

use crate::CatalogBuilder;
use crate::catalog::QueryMatch;
use crate::cli::SubCommandExtend;
use crate::config::{EmbedOptions, Opts, SearchOptions};

#[derive(Parser, Debug, Clone)]
pub struct SearchCommand {
    #[command(flatten)]
    pub embed: EmbedOptions,
    #[command(flatten)]
    pub search: SearchOptions,
    /// 被搜索的图片路径
    pub image: String,
    /// 输出格式
    #[arg(long, value_name = "FORMAT", value_enum, default_value_t = OutputFormat::Table)]
    pub output_format: OutputFormat,
}

impl SubCommandExtend for SearchCommand {
    async fn run(&self, opts: &Opts) -> Result<()> {
        let bytes = tokio::fs::read(&self.image).await?;

        let catalog = CatalogBuilder::new(opts.conf_dir.clone())
            .embed_options(self.embed.clone())
            .open()
            .await?;

        let result = catalog.query(bytes, self.search.count as usize).await?;
        print_result(&result, self)
    }
}

fn print_result(result: &[QueryMatch], opts: &SearchCommand) -> Result<()> {
    match opts.output_format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(result)?)
        }
        OutputFormat::Table => {
            for m in result {
                println!("{:.4}\t{}\t{}", m.distance, m.item_id, m.filename.as_deref().unwrap_or("-"));
            }
        }
    }
    Ok(())
}

#[derive(ValueEnum, Debug, Clone, Copy)]
pub enum OutputFormat {
    Json,
    Table,
}
