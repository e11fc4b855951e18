//! 差值哈希（dHash）签名生成
//!
//! 每帧转灰度后缩放到 `(H+1) x H`，逐行比较相邻像素：左侧更亮记 1，否则记 0，
//! 共 `H²` 位，按高位在前打包成字节。

use super::error::LoopError;
use super::frame::Frame;
use super::timestamp::TimestampKey;
use image::imageops::{self, FilterType};
use log::{debug, info};
use rayon::prelude::*;
use std::collections::HashMap;

/// 打包后的感知哈希签名，生成后不可变
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Signature {
    bytes: Vec<u8>,
    bits: usize,
}

impl Signature {
    /// 从按高位在前打包的字节构造，多余的填充位必须为 0
    pub fn from_bytes(bytes: Vec<u8>, bits: usize) -> Result<Self, LoopError> {
        let malformed = bytes.len() != bits.div_ceil(8) || {
            // 长度一致时填充位不足 8 位
            let padding = bytes.len() * 8 - bits;
            padding > 0 && bytes.last().is_some_and(|last| last & ((1u8 << padding) - 1) != 0)
        };
        if malformed {
            return Err(LoopError::MalformedSignature {
                bits,
                bytes: bytes.len(),
            });
        }
        Ok(Self { bytes, bits })
    }

    pub fn from_bits(bits: &[bool]) -> Self {
        let mut bytes = vec![0u8; bits.len().div_ceil(8)];
        for (i, &set) in bits.iter().enumerate() {
            if set {
                bytes[i / 8] |= 0x80 >> (i % 8);
            }
        }
        Self {
            bytes,
            bits: bits.len(),
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn bit_len(&self) -> usize {
        self.bits
    }

    pub(crate) fn bit(&self, index: usize) -> bool {
        self.bytes[index / 8] & (0x80 >> (index % 8)) != 0
    }

    pub fn count_ones(&self) -> u32 {
        self.bytes.iter().map(|b| b.count_ones()).sum()
    }

    /// XOR + popcount，两个签名必须等长（由 `SignatureMap` 保证）
    pub(crate) fn hamming_distance(&self, other: &Signature) -> u32 {
        debug_assert_eq!(self.bits, other.bits);
        self.bytes
            .iter()
            .zip(other.bytes.iter())
            .map(|(a, b)| (a ^ b).count_ones())
            .sum()
    }
}

/// 计算单帧的 dHash，`hash_size` 为每行比特数
pub fn dhash(frame: &Frame, hash_size: u32) -> Result<Signature, LoopError> {
    check_frame_size(frame, hash_size)?;

    let gray = frame.to_gray_image()?;
    let resized = imageops::resize(&gray, hash_size + 1, hash_size, FilterType::Lanczos3);

    let mut bits = Vec::with_capacity((hash_size * hash_size) as usize);
    for y in 0..hash_size {
        for x in 0..hash_size {
            let left = resized.get_pixel(x, y)[0];
            let right = resized.get_pixel(x + 1, y)[0];
            bits.push(left > right);
        }
    }

    Ok(Signature::from_bits(&bits))
}

fn check_frame_size(frame: &Frame, hash_size: u32) -> Result<(), LoopError> {
    let min_width = hash_size + 1;
    let min_height = hash_size;
    if frame.width < min_width || frame.height < min_height {
        return Err(LoopError::FrameTooSmall {
            key: frame.key.to_string(),
            width: frame.width,
            height: frame.height,
            min_width,
            min_height,
        });
    }
    Ok(())
}

/// 时间戳键 -> 签名，键按时间严格递增
#[derive(Debug, Clone)]
pub struct SignatureMap {
    hash_size: u32,
    keys: Vec<TimestampKey>,
    signatures: Vec<Signature>,
    index: HashMap<TimestampKey, usize>,
}

impl SignatureMap {
    /// 并行为所有帧生成签名；任何一帧尺寸不足都会在哈希之前失败
    pub fn generate(frames: &[Frame], hash_size: u32) -> Result<Self, LoopError> {
        if frames.is_empty() {
            return Err(LoopError::EmptyInput);
        }
        for frame in frames {
            check_frame_size(frame, hash_size)?;
        }

        debug!("Hashing {} frames with {}x{} dhash", frames.len(), hash_size, hash_size);

        let entries = frames
            .par_iter()
            .map(|frame| dhash(frame, hash_size).map(|sig| (frame.key, sig)))
            .collect::<Result<Vec<_>, LoopError>>()?;

        let map = Self::from_signatures(hash_size, entries)?;
        info!("🔑 Generated {} signatures ({} bits each)", map.len(), map.bits());
        Ok(map)
    }

    pub fn from_signatures(
        hash_size: u32,
        entries: Vec<(TimestampKey, Signature)>,
    ) -> Result<Self, LoopError> {
        if entries.is_empty() {
            return Err(LoopError::EmptyInput);
        }

        let bits = hash_size as usize * hash_size as usize;
        let expected = bits.div_ceil(8);

        let mut keys = Vec::with_capacity(entries.len());
        let mut signatures = Vec::with_capacity(entries.len());
        let mut index = HashMap::with_capacity(entries.len());

        for (key, signature) in entries {
            if let Some(previous) = keys.last() {
                if key <= *previous {
                    return Err(LoopError::UnorderedFrames {
                        previous: previous.to_string(),
                        current: key.to_string(),
                    });
                }
            }
            if signature.bit_len() != bits || signature.as_bytes().len() != expected {
                return Err(LoopError::SignatureLength {
                    key: key.to_string(),
                    expected,
                    actual: signature.as_bytes().len(),
                });
            }
            index.insert(key, keys.len());
            keys.push(key);
            signatures.push(signature);
        }

        Ok(Self {
            hash_size,
            keys,
            signatures,
            index,
        })
    }

    pub fn hash_size(&self) -> u32 {
        self.hash_size
    }

    pub fn bits(&self) -> usize {
        self.hash_size as usize * self.hash_size as usize
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// 按时间升序的键
    pub fn keys(&self) -> &[TimestampKey] {
        &self.keys
    }

    pub fn index_of(&self, key: &TimestampKey) -> Option<usize> {
        self.index.get(key).copied()
    }

    pub fn get(&self, key: &TimestampKey) -> Option<&Signature> {
        self.index_of(key).map(|i| &self.signatures[i])
    }

    pub fn key_at(&self, index: usize) -> TimestampKey {
        self.keys[index]
    }

    pub fn signature_at(&self, index: usize) -> &Signature {
        &self.signatures[index]
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &TimestampKey, &Signature)> {
        self.keys
            .iter()
            .zip(self.signatures.iter())
            .enumerate()
            .map(|(i, (k, s))| (i, k, s))
    }
}
