use std::cmp::Ordering;
use std::collections::BinaryHeap;

use serde::Serialize;
use utoipa::ToSchema;

use super::Snapshot;
use crate::error::{Error, Result};

const LANES: usize = 8;

/// 计算平方欧氏距离
///
/// 使用多个累加器，方便编译器向量化
#[inline]
pub fn squared_l2(va: &[f32], vb: &[f32]) -> f32 {
    debug_assert_eq!(va.len(), vb.len());
    let mut acc = [0f32; LANES];
    let mut ca = va.chunks_exact(LANES);
    let mut cb = vb.chunks_exact(LANES);
    for (a, b) in (&mut ca).zip(&mut cb) {
        for i in 0..LANES {
            let d = a[i] - b[i];
            acc[i] += d * d;
        }
    }
    let tail: f32 = ca
        .remainder()
        .iter()
        .zip(cb.remainder())
        .map(|(a, b)| {
            let d = a - b;
            d * d
        })
        .sum();
    acc.iter().sum::<f32>() + tail
}

/// 单个物品的匹配结果
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct ItemMatch {
    /// 物品 ID
    pub item_id: String,
    /// 该物品所有图片中与查询向量的最小平方距离
    pub distance: f32,
    /// 取得最小距离的图片 ID
    pub image_id: i64,
}

/// 候选物品，按 (距离, 首次出现顺序) 排序
#[derive(Debug, Clone, Copy)]
struct Candidate {
    distance: f32,
    slot: usize,
    row: usize,
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Candidate {}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        self.distance.total_cmp(&other.distance).then(self.slot.cmp(&other.slot))
    }
}

/// 保留最小的 k 个候选
struct TopK {
    heap: BinaryHeap<Candidate>,
    k: usize,
}

impl TopK {
    fn new(k: usize) -> Self {
        Self { heap: BinaryHeap::with_capacity(k + 1), k }
    }

    fn push(&mut self, candidate: Candidate) {
        if self.heap.len() < self.k {
            self.heap.push(candidate);
        } else if let Some(mut top) = self.heap.peek_mut() {
            if candidate < *top {
                *top = candidate;
            }
        }
    }

    fn into_sorted_vec(self) -> Vec<Candidate> {
        self.heap.into_sorted_vec()
    }
}

impl Snapshot {
    /// 计算查询向量到每一行的平方距离
    pub fn distances(&self, query: &[f32]) -> Result<Vec<f32>> {
        let dim = self.dimension();
        if query.len() != dim {
            return Err(Error::DimensionMismatch { expected: dim, got: query.len() });
        }
        if !query.iter().all(|x| x.is_finite()) {
            return Err(Error::InvalidArgument("查询向量包含 NaN 或无穷大".to_owned()));
        }
        match self.matrix.as_slice() {
            Some(data) => Ok(data.chunks_exact(dim).map(|row| squared_l2(row, query)).collect()),
            None => Ok(self
                .matrix
                .outer_iter()
                .map(|row| row.iter().zip(query).map(|(a, b)| (a - b) * (a - b)).sum())
                .collect()),
        }
    }

    /// 搜索与查询向量最接近的 k 个物品
    ///
    /// 每个物品的距离取其所有图片中的最小值，结果按距离升序排列，
    /// 距离相同时按物品在快照中首次出现的顺序排列
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<ItemMatch>> {
        if k == 0 {
            return Err(Error::InvalidArgument("k 必须大于 0".to_owned()));
        }
        let distances = self.distances(query)?;

        // 每个物品的最佳图片
        let mut best: Vec<Option<(f32, usize)>> = vec![None; self.items.len()];
        for (row, (&distance, &slot)) in distances.iter().zip(&self.slots).enumerate() {
            match best[slot] {
                Some((d, _)) if d <= distance => {}
                _ => best[slot] = Some((distance, row)),
            }
        }

        let mut topk = TopK::new(k);
        for (slot, entry) in best.into_iter().enumerate() {
            if let Some((distance, row)) = entry {
                topk.push(Candidate { distance, slot, row });
            }
        }

        Ok(topk
            .into_sorted_vec()
            .into_iter()
            .map(|c| ItemMatch {
                item_id: self.items[c.slot].clone(),
                distance: c.distance,
                image_id: self.image_ids[c.row],
            })
            .collect())
    }
}
