//! 向量仓库：把 Ledger 中的全部描述符物化成一个不可变的快照

use std::collections::HashMap;

use byteorder::{ByteOrder, LittleEndian};
use log::debug;
use ndarray::{Array2, ArrayView1};

use crate::db::{DescriptorRecord, Ledger};
use crate::error::{Error, Result};

/// 将描述符编码为小端序 f32 字节
pub fn encode_descriptor(v: &[f32]) -> Vec<u8> {
    let mut buf = vec![0u8; v.len() * 4];
    LittleEndian::write_f32_into(v, &mut buf);
    buf
}

/// 将小端序 f32 字节解码为描述符
pub fn decode_descriptor(image_id: i64, bytes: &[u8]) -> Result<Vec<f32>> {
    let corrupt = |reason: &str| Error::Decode { image_id, reason: reason.to_owned() };
    if bytes.is_empty() {
        return Err(corrupt("描述符为空"));
    }
    if bytes.len() % 4 != 0 {
        return Err(corrupt(&format!("长度 {} 不是 4 的倍数", bytes.len())));
    }
    let mut v = vec![0f32; bytes.len() / 4];
    LittleEndian::read_f32_into(bytes, &mut v);
    if v.iter().any(|x| !x.is_finite()) {
        return Err(corrupt("包含 NaN 或无穷大"));
    }
    Ok(v)
}

/// 所有图片描述符组成的 N×D 矩阵，以及每一行所属的物品
///
/// 快照构建完成后不可变，重建时整体替换
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub(super) matrix: Array2<f32>,
    /// 每一行对应的图片 ID
    pub(super) image_ids: Vec<i64>,
    /// 每一行对应的物品在 `items` 中的位置
    pub(super) slots: Vec<usize>,
    /// 去重后的物品 ID，按首次出现的顺序排列
    pub(super) items: Vec<String>,
}

impl Snapshot {
    /// 从描述符记录构建快照，记录为空时返回 None
    ///
    /// 任意一条记录损坏或维度不一致都会导致整个构建失败
    pub fn from_records(records: Vec<DescriptorRecord>) -> Result<Option<Self>> {
        let Some(first) = records.first() else {
            return Ok(None);
        };
        let dim = decode_descriptor(first.id, &first.vector)?.len();

        let n = records.len();
        let mut data = Vec::with_capacity(n * dim);
        let mut image_ids = Vec::with_capacity(n);
        let mut slots = Vec::with_capacity(n);
        let mut items = vec![];
        let mut positions = HashMap::new();

        for record in records {
            let v = decode_descriptor(record.id, &record.vector)?;
            if v.len() != dim {
                return Err(Error::DimensionMismatch { expected: dim, got: v.len() });
            }
            data.extend_from_slice(&v);
            image_ids.push(record.id);
            let slot = *positions.entry(record.item_id).or_insert_with_key(|item_id| {
                items.push(item_id.clone());
                items.len() - 1
            });
            slots.push(slot);
        }

        // data 的长度一定是 n * dim
        let matrix = Array2::from_shape_vec((n, dim), data)
            .map_err(|e| Error::Decode { image_id: image_ids[0], reason: e.to_string() })?;

        Ok(Some(Self { matrix, image_ids, slots, items }))
    }

    /// 描述符维度 D
    pub fn dimension(&self) -> usize {
        self.matrix.ncols()
    }

    /// 向量数量 N
    pub fn len(&self) -> usize {
        self.matrix.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 不同物品的数量
    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    pub fn matrix(&self) -> &Array2<f32> {
        &self.matrix
    }

    pub fn row(&self, i: usize) -> ArrayView1<'_, f32> {
        self.matrix.row(i)
    }

    /// 第 i 行所属的物品
    pub fn owner(&self, i: usize) -> &str {
        &self.items[self.slots[i]]
    }

    /// 按行顺序返回所属物品
    pub fn owners(&self) -> impl ExactSizeIterator<Item = &str> + '_ {
        self.slots.iter().map(|&s| self.items[s].as_str())
    }

    pub fn image_id(&self, i: usize) -> i64 {
        self.image_ids[i]
    }
}

/// 向量仓库，持有 Ledger 并负责构建快照
pub struct VectorStore<L> {
    ledger: L,
}

impl<L: Ledger> VectorStore<L> {
    pub fn new(ledger: L) -> Self {
        Self { ledger }
    }

    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    /// 读取 Ledger 中所有描述符并构建快照，没有任何描述符时返回 None
    pub async fn build(&self) -> Result<Option<Snapshot>> {
        let records = self.ledger.list_image_descriptors().await?;
        debug!("从数据库读取了 {} 条描述符", records.len());
        Snapshot::from_records(records)
    }
}
