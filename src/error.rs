use std::error::Error as StdError;

pub type BoxError = Box<dyn StdError + Send + Sync>;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// imgrec 的错误类型
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// 描述符维度与索引维度不一致，通常意味着 Embedder 版本发生了变化
    #[error("描述符维度不一致：期望 {expected}，实际 {got}")]
    DimensionMismatch { expected: usize, got: usize },

    /// 数据库中保存的描述符无法解析
    #[error("图片 {image_id} 的描述符已损坏：{reason}")]
    Decode { image_id: i64, reason: String },

    /// 外部服务（数据库、文件存储）不可用
    #[error("{service} 不可用：{source}")]
    UpstreamUnavailable {
        service: &'static str,
        #[source]
        source: BoxError,
    },

    /// 图片无法解码
    #[error("无法读取图片：{0}")]
    UnreadableImage(String),

    #[error("参数错误：{0}")]
    InvalidArgument(String),

    #[error("未找到：{0}")]
    NotFound(String),

    #[error("鉴权失败")]
    Unauthorized,

    #[error("后台任务异常退出：{0}")]
    Join(#[from] tokio::task::JoinError),
}

impl Error {
    pub fn upstream(service: &'static str, source: impl Into<BoxError>) -> Self {
        Self::UpstreamUnavailable { service, source: source.into() }
    }
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        Self::upstream("数据库", err)
    }
}

impl From<sqlx::migrate::MigrateError> for Error {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        Self::upstream("数据库", err)
    }
}

impl From<opencv::Error> for Error {
    fn from(err: opencv::Error) -> Self {
        Self::UnreadableImage(err.message)
    }
}
