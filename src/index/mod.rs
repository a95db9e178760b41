//! 相似度索引
//!
//! 索引的唯一更新方式是整体重建：每次重建都从 Ledger 读取全部描述符，
//! 在锁外构建新快照，最后一次性替换当前快照。查询只持有快照的 `Arc`，
//! 因此重建过程中的查询会继续使用旧快照。

mod search;
mod store;

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use log::{debug, error, info};
use serde::Serialize;
use tokio::sync::RwLock;
use utoipa::ToSchema;

pub use self::search::*;
pub use self::store::*;
use crate::db::Ledger;
use crate::error::{Error, Result};
use crate::metrics;

/// 索引状态
#[derive(Debug)]
pub enum IndexState {
    /// 尚未进行过任何一次重建
    Uninitialized,
    /// 没有任何描述符
    Empty,
    Ready(Snapshot),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum StateKind {
    Uninitialized,
    Empty,
    Ready,
}

/// 索引状态统计
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct IndexStatus {
    pub state: StateKind,
    /// 索引中不同物品的数量
    pub item_count: usize,
    /// 索引中的向量数量
    pub vector_count: usize,
    /// 描述符维度，索引为空时为 None
    pub dimension: Option<usize>,
}

impl IndexState {
    pub fn status(&self) -> IndexStatus {
        match self {
            Self::Uninitialized => IndexStatus {
                state: StateKind::Uninitialized,
                item_count: 0,
                vector_count: 0,
                dimension: None,
            },
            Self::Empty => {
                IndexStatus { state: StateKind::Empty, item_count: 0, vector_count: 0, dimension: None }
            }
            Self::Ready(snapshot) => IndexStatus {
                state: StateKind::Ready,
                item_count: snapshot.item_count(),
                vector_count: snapshot.len(),
                dimension: Some(snapshot.dimension()),
            },
        }
    }

    pub fn snapshot(&self) -> Option<&Snapshot> {
        match self {
            Self::Ready(snapshot) => Some(snapshot),
            _ => None,
        }
    }

    /// 在当前状态上搜索，没有数据时返回空结果
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<ItemMatch>> {
        if k == 0 {
            return Err(Error::InvalidArgument("k 必须大于 0".to_owned()));
        }
        match self {
            Self::Ready(snapshot) => snapshot.search(query, k),
            _ => Ok(vec![]),
        }
    }
}

struct Published {
    /// 发布该状态的重建序号
    ticket: u64,
    state: Arc<IndexState>,
}

/// 精确 L2 相似度索引
pub struct SimilarityIndex<L> {
    store: VectorStore<L>,
    current: RwLock<Published>,
    tickets: AtomicU64,
}

impl<L: Ledger> SimilarityIndex<L> {
    /// 创建一个未初始化的索引，需要调用 [`Self::rebuild`] 后才有数据
    pub fn new(ledger: L) -> Self {
        Self {
            store: VectorStore::new(ledger),
            current: RwLock::new(Published { ticket: 0, state: Arc::new(IndexState::Uninitialized) }),
            tickets: AtomicU64::new(0),
        }
    }

    pub fn ledger(&self) -> &L {
        self.store.ledger()
    }

    /// 获取当前快照
    pub async fn current(&self) -> Arc<IndexState> {
        self.current.read().await.state.clone()
    }

    /// 从 Ledger 重建索引
    ///
    /// 失败时保留旧快照。多个重建同时进行时，只有最后开始读取 Ledger 的那次结果会被保留。
    pub async fn rebuild(&self) -> Result<()> {
        let ticket = self.tickets.fetch_add(1, Ordering::SeqCst) + 1;
        let start = Instant::now();

        let state = match self.store.build().await {
            Ok(Some(snapshot)) => IndexState::Ready(snapshot),
            Ok(None) => IndexState::Empty,
            Err(e) => {
                error!("重建索引失败，继续使用旧索引: {e}");
                metrics::inc_rebuild_failure();
                return Err(e);
            }
        };
        let status = state.status();

        if self.publish(ticket, state).await {
            let elapsed = start.elapsed().as_secs_f32();
            metrics::observe_rebuild(elapsed, status.vector_count);
            info!(
                "索引重建完成：{} 个物品，{} 个向量，耗时 {:.3}s",
                status.item_count, status.vector_count, elapsed
            );
        }
        Ok(())
    }

    /// 发布新状态，已经有更新的重建发布过时放弃
    async fn publish(&self, ticket: u64, state: IndexState) -> bool {
        let mut current = self.current.write().await;
        if ticket < current.ticket {
            debug!("放弃过期的重建结果 #{ticket}，当前为 #{}", current.ticket);
            return false;
        }
        *current = Published { ticket, state: Arc::new(state) };
        true
    }

    /// 搜索与描述符最接近的 k 个物品
    pub async fn search(&self, query: &[f32], k: usize) -> Result<Vec<ItemMatch>> {
        let state = self.current().await;
        state.search(query, k)
    }

    pub async fn status(&self) -> IndexStatus {
        self.current().await.status()
    }
}
