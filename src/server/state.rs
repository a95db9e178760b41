use std::sync::Arc;

use crate::Catalog;
use crate::error::{Error, Result};

/// 应用状态
pub struct AppState {
    pub catalog: Catalog,
    /// 默认返回的结果数量
    pub topk: usize,
    /// 鉴权 token
    pub token: String,
}

impl AppState {
    pub fn new(catalog: Catalog, topk: usize, token: String) -> Arc<Self> {
        Arc::new(AppState { catalog, topk, token })
    }

    /// 检查请求携带的 token
    pub fn authorize(&self, token: &str) -> Result<()> {
        if token != self.token {
            return Err(Error::Unauthorized);
        }
        Ok(())
    }
}
