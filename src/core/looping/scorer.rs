//! 候选帧对相似度打分
//!
//! 每个帧对的计算互不依赖，在 rayon 线程池上并行执行，工作线程只读签名表。
//! 结果与完成顺序无关，最后显式排序。

use super::error::LoopError;
use super::lsh::CandidatePair;
use super::signature::SignatureMap;
use super::timestamp::TimestampKey;
use log::{debug, info};
use rayon::prelude::*;

/// 中间帧与起始帧的相似度全部不低于该值时，视为静止画面
pub const STABILITY_SIMILARITY: f64 = 0.9;

/// 通过阈值的帧对
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Match {
    pub earlier_idx: usize,
    pub later_idx: usize,
    pub earlier: TimestampKey,
    pub later: TimestampKey,
    /// `(H² - 汉明距离) / H²`
    pub similarity: f64,
}

impl Match {
    pub fn span_centis(&self) -> u64 {
        self.later.centis() - self.earlier.centis()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Verdict {
    Accepted(Match),
    BelowThreshold,
    Static,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScoreStats {
    pub scored: usize,
    pub accepted: usize,
    pub below_threshold: usize,
    pub rejected_static: usize,
}

pub struct SimilarityScorer {
    threshold: f64,
    stability_check: bool,
}

impl SimilarityScorer {
    pub fn new(threshold: f64, stability_check: bool) -> Self {
        Self {
            threshold,
            stability_check,
        }
    }

    /// 并行打分；任何一个帧对出错都会中止整批并返回该错误
    pub fn score(
        &self,
        signatures: &SignatureMap,
        pairs: &[CandidatePair],
    ) -> Result<(Vec<Match>, ScoreStats), LoopError> {
        let verdicts = pairs
            .par_iter()
            .map(|pair| self.judge(signatures, pair))
            .collect::<Result<Vec<_>, LoopError>>()?;

        let mut stats = ScoreStats {
            scored: verdicts.len(),
            ..Default::default()
        };
        let mut matches = Vec::new();
        for verdict in verdicts {
            match verdict {
                Verdict::Accepted(m) => matches.push(m),
                Verdict::BelowThreshold => stats.below_threshold += 1,
                Verdict::Static => stats.rejected_static += 1,
            }
        }
        stats.accepted = matches.len();

        matches.sort_by(|a, b| (a.earlier, a.later).cmp(&(b.earlier, b.later)));

        info!(
            "🔍 {} matches from {} pairs ({} below threshold, {} static)",
            stats.accepted, stats.scored, stats.below_threshold, stats.rejected_static
        );

        Ok((matches, stats))
    }

    fn judge(&self, signatures: &SignatureMap, pair: &CandidatePair) -> Result<Verdict, LoopError> {
        let a = resolve(signatures, pair.earlier, pair.earlier_idx)?;
        let b = resolve(signatures, pair.later, pair.later_idx)?;

        let similarity = similarity(signatures, a, b);
        if similarity < self.threshold {
            return Ok(Verdict::BelowThreshold);
        }

        if self.stability_check && is_static_region(signatures, a, b) {
            debug!(
                "Rejecting {} -> {} ({:.3}): interior frames never diverge",
                pair.earlier, pair.later, similarity
            );
            return Ok(Verdict::Static);
        }

        Ok(Verdict::Accepted(Match {
            earlier_idx: a,
            later_idx: b,
            earlier: pair.earlier,
            later: pair.later,
            similarity,
        }))
    }
}

fn resolve(signatures: &SignatureMap, key: TimestampKey, idx: usize) -> Result<usize, LoopError> {
    match signatures.index_of(&key) {
        Some(found) if found == idx => Ok(found),
        _ => Err(LoopError::MissingSignature(key.to_string())),
    }
}

/// 汉明距离（按索引）
pub fn hamming_distance(signatures: &SignatureMap, a: usize, b: usize) -> u32 {
    signatures
        .signature_at(a)
        .hamming_distance(signatures.signature_at(b))
}

pub fn similarity(signatures: &SignatureMap, a: usize, b: usize) -> f64 {
    let bits = signatures.bits() as f64;
    (bits - hamming_distance(signatures, a, b) as f64) / bits
}

/// `a` 与 `b` 之间的每一帧都与 `a` 保持高度相似；没有中间帧时不算静止
pub fn is_static_region(signatures: &SignatureMap, a: usize, b: usize) -> bool {
    if b <= a + 1 {
        return false;
    }
    ((a + 1)..b).all(|i| similarity(signatures, a, i) >= STABILITY_SIMILARITY)
}
