use opencv::core::{Mat, Size};
use opencv::imgproc::InterpolationFlags;
use opencv::prelude::*;
use opencv::{imgcodecs, imgproc};

use crate::config::EmbedOptions;
use crate::error::{Error, Result};

/// BGR 顺序的 ImageNet 均值
const MEAN: [f32; 3] = [0.406, 0.456, 0.485];
/// BGR 顺序的 ImageNet 标准差
const STD: [f32; 3] = [0.225, 0.224, 0.229];

/// 将图片字节转换为固定长度的描述符
///
/// 同一个 Embedder 对同一张图片总是产生相同的结果，描述符长度等于 [`Embedder::dimension`]
pub trait Embedder: Send + Sync {
    fn dimension(&self) -> usize;

    fn embed(&self, bytes: &[u8]) -> Result<Vec<f32>>;
}

/// 缩略图描述符
///
/// 图片被缩放为 `side × side` 的彩色缩略图，逐像素按通道归一化后展开，维度为 `3 × side²`
#[derive(Debug, Clone, Copy)]
pub struct ThumbnailEmbedder {
    side: i32,
}

impl ThumbnailEmbedder {
    pub fn new(side: u32) -> Self {
        Self { side: side as i32 }
    }

    /// 解码并缩放图片
    fn thumbnail(&self, bytes: &[u8]) -> Result<Mat> {
        if bytes.is_empty() {
            return Err(Error::UnreadableImage("图片为空".to_owned()));
        }
        let buf = Mat::from_slice(bytes)?;
        let img = imgcodecs::imdecode(&buf, imgcodecs::IMREAD_COLOR)?;
        if img.empty() {
            return Err(Error::UnreadableImage("无法识别的图片格式".to_owned()));
        }

        let mut output = Mat::default();
        imgproc::resize(
            &img,
            &mut output,
            Size::new(self.side, self.side),
            0.,
            0.,
            InterpolationFlags::INTER_AREA as i32,
        )?;
        Ok(output)
    }
}

impl From<&EmbedOptions> for ThumbnailEmbedder {
    fn from(opts: &EmbedOptions) -> Self {
        Self::new(opts.thumb_size)
    }
}

impl Embedder for ThumbnailEmbedder {
    fn dimension(&self) -> usize {
        3 * (self.side * self.side) as usize
    }

    fn embed(&self, bytes: &[u8]) -> Result<Vec<f32>> {
        let thumb = self.thumbnail(bytes)?;
        let pixels = thumb.data_bytes()?;
        debug_assert_eq!(pixels.len(), self.dimension());

        Ok(pixels
            .chunks_exact(3)
            .flat_map(|px| (0..3).map(move |c| (px[c] as f32 / 255. - MEAN[c]) / STD[c]))
            .collect())
    }
}
