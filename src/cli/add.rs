use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::Parser;
use futures::StreamExt;
use indicatif::ProgressBar;
use log::info;
use regex::Regex;
use walkdir::WalkDir;

use crate::CatalogBuilder;
use crate::cli::SubCommandExtend;
use crate::config::{EmbedOptions, Opts};
use crate::db::NewItem;
use crate::utils::pb_style;

#[derive(Parser, Debug, Clone)]
pub struct AddCommand {
    #[command(flatten)]
    pub embed: EmbedOptions,
    /// 图片所在目录，每个子目录为一个物品，目录名即物品 ID
    pub path: PathBuf,
    /// 扫描的文件后缀名，多个后缀用逗号分隔
    #[arg(short, long, default_value = "jpg,jpeg,png,webp")]
    pub suffix: String,
}

/// 待导入的图片
struct ImageFile {
    item_id: String,
    filename: String,
    path: PathBuf,
}

impl SubCommandExtend for AddCommand {
    async fn run(&self, opts: &Opts) -> Result<()> {
        let re_suf = Regex::new(&format!("(?i)^({})$", self.suffix.replace(',', "|")))?;
        let files = scan_items(&self.path, &re_suf)?;
        info!("共扫描到 {} 张图片", files.len());

        let catalog = CatalogBuilder::new(opts.conf_dir.clone())
            .embed_options(self.embed.clone())
            .open()
            .await?;

        let pb = ProgressBar::new(files.len() as u64).with_style(pb_style());
        let catalog = &catalog;
        let pb_ref = &pb;
        let added = futures::stream::iter(files)
            .map(|file| async move {
                let result = async {
                    let bytes = tokio::fs::read(&file.path).await?;
                    let item = NewItem { id: &file.item_id, name: None, meta_text: None };
                    catalog.ingest(item, &file.filename, bytes).await?;
                    anyhow::Ok(())
                }
                .await;
                pb_ref.inc(1);
                match result {
                    Ok(()) => {
                        pb_ref.set_message(format!("{}/{}", file.item_id, file.filename));
                        true
                    }
                    Err(e) => {
                        pb_ref.println(format!("添加失败 {}: {e}", file.path.display()));
                        false
                    }
                }
            })
            .buffer_unordered(num_cpus::get())
            .filter(|ok| std::future::ready(*ok))
            .count()
            .await;

        pb.finish_with_message("图片添加完成");

        catalog.rebuild().await?;
        let status = catalog.status().await;
        info!("成功添加 {added} 张图片，索引共 {} 个物品", status.item_count);

        Ok(())
    }
}

/// 扫描目录，每个子目录为一个物品
fn scan_items(root: &Path, re_suf: &Regex) -> Result<Vec<ImageFile>> {
    let mut files = vec![];
    for dir in WalkDir::new(root).min_depth(1).max_depth(1).sort_by_file_name() {
        let dir = dir?;
        if !dir.file_type().is_dir() {
            continue;
        }
        let item_id = dir.file_name().to_string_lossy().into_owned();
        for entry in WalkDir::new(dir.path()).min_depth(1).max_depth(1).sort_by_file_name() {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.into_path();
            let matched = path.extension().map(|s| re_suf.is_match(&s.to_string_lossy()));
            if matched != Some(true) {
                continue;
            }
            let Some(filename) = path.file_name().map(|s| s.to_string_lossy().into_owned()) else {
                continue;
            };
            files.push(ImageFile { item_id: item_id.clone(), filename, path });
        }
    }
    Ok(files)
}
