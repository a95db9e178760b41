use std::path::PathBuf;

use anyhow::{Result, anyhow};
use clap::Parser;
use log::info;
use ndarray_npy::write_npy;

use crate::cli::SubCommandExtend;
use crate::{CatalogBuilder, Opts};

#[derive(Parser, Debug, Clone)]
pub struct ExportCommand {
    /// 描述符矩阵输出路径，每行所属的物品 ID 会写入同名的 .json 文件
    #[arg(short, long, default_value = "descriptors.npy")]
    pub output: PathBuf,
}

impl SubCommandExtend for ExportCommand {
    async fn run(&self, opts: &Opts) -> Result<()> {
        let catalog = CatalogBuilder::new(opts.conf_dir.clone()).open().await?;
        let (data, owners) = catalog.export().await.ok_or_else(|| anyhow!("索引为空，没有可导出的描述符"))?;
        write_npy(&self.output, &data)?;
        std::fs::write(self.output.with_extension("json"), serde_json::to_vec(&owners)?)?;
        info!("导出成功：{} 个描述符，维度 {}", data.nrows(), data.ncols());
        Ok(())
    }
}
