use anyhow::Result;
use clap::Parser;

use crate::CatalogBuilder;
use crate::cli::SubCommandExtend;
use crate::config::Opts;

#[derive(Parser, Debug, Clone)]
pub struct ItemsCommand {
    /// 只显示最近创建的 N 个物品
    #[arg(long, value_name = "N", value_parser = clap::value_parser!(u32).range(1..))]
    pub recent: Option<u32>,
    /// 以 JSON 格式输出
    #[arg(long)]
    pub json: bool,
}

impl SubCommandExtend for ItemsCommand {
    async fn run(&self, opts: &Opts) -> Result<()> {
        let catalog = CatalogBuilder::new(opts.conf_dir.clone()).open().await?;
        let items = match self.recent {
            Some(n) => catalog.recent_items(n as usize).await?,
            None => catalog.list_items().await?,
        };

        if self.json {
            println!("{}", serde_json::to_string_pretty(&items)?);
            return Ok(());
        }
        for item in items {
            println!(
                "{}\t{}\t{}\t{}",
                item.item_id,
                item.item_name,
                item.ctime,
                item.meta_text.as_deref().unwrap_or("")
            );
        }
        Ok(())
    }
}
