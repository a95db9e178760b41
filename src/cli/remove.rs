use anyhow::Result;
use clap::Parser;
use log::info;

use crate::CatalogBuilder;
use crate::cli::SubCommandExtend;
use crate::config::Opts;

#[derive(Parser, Debug, Clone)]
pub struct RemoveCommand {
    /// 物品 ID
    pub item: String,
    /// 只删除物品中的这张图片
    #[arg(long, value_name = "FILENAME")]
    pub image: Option<String>,
}

impl SubCommandExtend for RemoveCommand {
    async fn run(&self, opts: &Opts) -> Result<()> {
        let catalog = CatalogBuilder::new(opts.conf_dir.clone()).open().await?;
        match &self.image {
            Some(filename) => catalog.delete_image(&self.item, filename).await?,
            None => catalog.delete_item(&self.item).await?,
        }
        let status = catalog.status().await;
        info!("删除成功，索引剩余 {} 个物品", status.item_count);
        Ok(())
    }
}
