use super::error::LoopError;
use super::timestamp::TimestampKey;
use image::GrayImage;

/// 像素数据：RGBA 或直接来自解码器的 Y 平面
#[derive(Debug, Clone, PartialEq)]
pub enum Pixels {
    Rgba(Vec<u8>),
    Luma(Vec<u8>),
}

/// 帧数据结构
#[derive(Debug, Clone)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    pub pixels: Pixels,
    pub key: TimestampKey,
}

impl Frame {
    pub fn from_rgba(
        width: u32,
        height: u32,
        data: Vec<u8>,
        key: TimestampKey,
    ) -> Result<Self, LoopError> {
        Self::check_len(key, width, height, 4, data.len())?;
        Ok(Self {
            width,
            height,
            pixels: Pixels::Rgba(data),
            key,
        })
    }

    pub fn from_luma(
        width: u32,
        height: u32,
        y_plane: Vec<u8>,
        key: TimestampKey,
    ) -> Result<Self, LoopError> {
        Self::check_len(key, width, height, 1, y_plane.len())?;
        Ok(Self {
            width,
            height,
            pixels: Pixels::Luma(y_plane),
            key,
        })
    }

    fn check_len(
        key: TimestampKey,
        width: u32,
        height: u32,
        channels: usize,
        actual: usize,
    ) -> Result<(), LoopError> {
        let expected = width as usize * height as usize * channels;
        if expected != actual {
            return Err(LoopError::FrameBuffer {
                key: key.to_string(),
                expected,
                actual,
            });
        }
        Ok(())
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// 单通道亮度（BT.601 权重）
    pub fn luma_plane(&self) -> Vec<u8> {
        match &self.pixels {
            Pixels::Luma(y) => y.clone(),
            Pixels::Rgba(data) => data
                .chunks_exact(4)
                .map(|rgba| {
                    let r = rgba[0] as u32;
                    let g = rgba[1] as u32;
                    let b = rgba[2] as u32;
                    ((r * 299 + g * 587 + b * 114) / 1000) as u8
                })
                .collect(),
        }
    }

    pub fn to_gray_image(&self) -> Result<GrayImage, LoopError> {
        GrayImage::from_raw(self.width, self.height, self.luma_plane()).ok_or_else(|| {
            LoopError::FrameBuffer {
                key: self.key.to_string(),
                expected: self.pixel_count(),
                actual: 0,
            }
        })
    }
}
