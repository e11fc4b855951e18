//! LSH 分带索引 - 只有至少一个分带完全相同的帧对才进入相似度计算

use super::error::LoopError;
use super::signature::{Signature, SignatureMap};
use super::timestamp::TimestampKey;
use log::{debug, info};
use std::collections::{HashMap, HashSet};

/// 候选帧对，`earlier` 严格早于 `later`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CandidatePair {
    pub earlier_idx: usize,
    pub later_idx: usize,
    pub earlier: TimestampKey,
    pub later: TimestampKey,
}

impl CandidatePair {
    /// 时间跨度（厘秒）
    pub fn span_centis(&self) -> u64 {
        self.later.centis() - self.earlier.centis()
    }
}

#[derive(Debug, Clone, Default)]
pub struct CandidateStats {
    /// 去重后检查过的帧对
    pub tested: usize,
    /// 因时长不在窗口内被丢弃
    pub out_of_window: usize,
}

/// 按分带分桶的索引，每次检测重新构建
pub struct LshIndex {
    band_width: usize,
    buckets: Vec<HashMap<Vec<u8>, Vec<usize>>>,
}

impl LshIndex {
    pub fn build(signatures: &SignatureMap, bands: u32) -> Result<Self, LoopError> {
        let bits = signatures.bits();
        if bands == 0 || bits % bands as usize != 0 {
            return Err(LoopError::InvalidConfig(format!(
                "hashSize² ({}) is not divisible by bands ({})",
                bits, bands
            )));
        }
        let band_width = bits / bands as usize;

        let mut buckets: Vec<HashMap<Vec<u8>, Vec<usize>>> = vec![HashMap::new(); bands as usize];
        for (idx, _, signature) in signatures.iter() {
            for (band, bucket) in buckets.iter_mut().enumerate() {
                bucket
                    .entry(band_key(signature, band, band_width))
                    .or_default()
                    .push(idx);
            }
        }

        debug!(
            "LSH index: {} bands x {} bits, {} buckets",
            bands,
            band_width,
            buckets.iter().map(|b| b.len()).sum::<usize>()
        );

        Ok(Self {
            band_width,
            buckets,
        })
    }

    pub fn bands(&self) -> usize {
        self.buckets.len()
    }

    pub fn band_width(&self) -> usize {
        self.band_width
    }

    /// 桶内至少两帧的桶中，每个无序帧对只产出一次，并提前过滤时长 `[min, max]` 之外的帧对
    ///
    /// 结果按 `(earlier, later)` 排序。
    pub fn candidate_pairs(
        &self,
        signatures: &SignatureMap,
        min_centis: u64,
        max_centis: u64,
    ) -> (Vec<CandidatePair>, CandidateStats) {
        let mut tested: HashSet<(usize, usize)> = HashSet::new();
        let mut stats = CandidateStats::default();
        let mut pairs = Vec::new();

        for bucket_map in &self.buckets {
            for members in bucket_map.values() {
                if members.len() < 2 {
                    continue;
                }
                // 索引即时间顺序
                let mut members = members.clone();
                members.sort_unstable();

                for (i, &a) in members.iter().enumerate() {
                    for &b in &members[i + 1..] {
                        if !tested.insert((a, b)) {
                            continue;
                        }
                        let pair = CandidatePair {
                            earlier_idx: a,
                            later_idx: b,
                            earlier: signatures.key_at(a),
                            later: signatures.key_at(b),
                        };
                        let span = pair.span_centis();
                        if span < min_centis || span > max_centis {
                            stats.out_of_window += 1;
                            continue;
                        }
                        pairs.push(pair);
                    }
                }
            }
        }

        stats.tested = tested.len();
        pairs.sort_unstable();

        info!(
            "🪣 {} candidate pairs ({} tested, {} outside length window)",
            pairs.len(),
            stats.tested,
            stats.out_of_window
        );

        (pairs, stats)
    }
}

/// 取出第 `band` 个分带的比特，按高位在前重新打包
pub(crate) fn band_key(signature: &Signature, band: usize, band_width: usize) -> Vec<u8> {
    let start = band * band_width;
    if start % 8 == 0 && band_width % 8 == 0 {
        return signature.as_bytes()[start / 8..(start + band_width) / 8].to_vec();
    }

    let mut key = vec![0u8; band_width.div_ceil(8)];
    for offset in 0..band_width {
        if signature.bit(start + offset) {
            key[offset / 8] |= 0x80 >> (offset % 8);
        }
    }
    key
}
