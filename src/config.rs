use std::convert::Infallible;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::LazyLock;

use clap::{Parser, Subcommand};
use directories::ProjectDirs;

use crate::cli::*;

static CONF_DIR: LazyLock<ConfDir> = LazyLock::new(|| {
    let path = match ProjectDirs::from("", "imgrec", "imgrec") {
        Some(dirs) => dirs.config_dir().to_path_buf(),
        None => PathBuf::from(".imgrec"),
    };
    ConfDir { path }
});

fn default_config_dir() -> &'static str {
    CONF_DIR.path().to_str().unwrap_or(".imgrec")
}

#[derive(Parser, Debug, Clone)]
pub struct EmbedOptions {
    /// 缩略图边长，描述符维度为 3 × 边长²
    ///
    /// 修改该值后已有的描述符将无法使用，需要重新导入所有图片
    #[arg(long, value_name = "N", default_value_t = 16, value_parser = clap::value_parser!(u32).range(1..=256))]
    pub thumb_size: u32,
}

impl Default for EmbedOptions {
    fn default() -> Self {
        Self { thumb_size: 16 }
    }
}

#[derive(Parser, Debug, Clone)]
pub struct SearchOptions {
    /// 显示的结果数量
    #[arg(long, value_name = "COUNT", default_value_t = 5, value_parser = clap::value_parser!(u32).range(1..))]
    pub count: u32,
}

#[derive(Parser, Debug, Clone)]
#[command(name = "imgrec", version)]
pub struct Opts {
    #[command(subcommand)]
    pub subcmd: SubCommand,
    /// imgrec 配置文件目录
    #[arg(short, long, default_value = default_config_dir())]
    pub conf_dir: ConfDir,
}

#[derive(Subcommand, Debug, Clone)]
pub enum SubCommand {
    /// 批量导入图片，每个子目录为一个物品
    Add(AddCommand),
    /// 搜索与图片最相似的物品
    Search(SearchCommand),
    /// 启动 HTTP 服务
    Server(ServerCommand),
    /// 列出所有物品
    Items(ItemsCommand),
    /// 显示索引状态
    Status(StatusCommand),
    /// 删除物品或物品中的一张图片
    Remove(RemoveCommand),
    /// 导出所有描述符
    Export(ExportCommand),
}

#[derive(Debug, Clone)]
pub struct ConfDir {
    path: PathBuf,
}

impl ConfDir {
    pub fn path(&self) -> &Path {
        self.path.as_path()
    }

    /// 返回数据库文件的路径
    pub fn database(&self) -> PathBuf {
        self.path.join("imgrec.db")
    }

    /// 返回图片文件目录
    pub fn blobs(&self) -> PathBuf {
        self.path.join("blobs")
    }
}

impl FromStr for ConfDir {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self { path: PathBuf::from(s) })
    }
}

impl From<&Path> for ConfDir {
    fn from(path: &Path) -> Self {
        Self { path: path.to_path_buf() }
    }
}
