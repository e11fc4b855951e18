use super::config::LoopConfig;
use super::error::LoopError;
use super::frame::Frame;
use super::lsh::LshIndex;
use super::sampler::{sample_frames, FrameSource};
use super::scorer::SimilarityScorer;
use super::selector::{Segment, SegmentSelector};
use super::signature::SignatureMap;
use log::{debug, info};
use serde::Serialize;
use std::time::{Duration, Instant};

/// 单次检测的统计
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DetectionStats {
    pub frames: usize,
    pub tested_pairs: usize,
    pub candidates: usize,
    pub matches: usize,
    pub rejected_static: usize,
    pub elapsed_ms: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    /// 按优先级排列，不是时间顺序
    pub segments: Vec<Segment>,
    pub stats: DetectionStats,
}

struct Deadline {
    started: Instant,
    budget: Option<Duration>,
}

impl Deadline {
    fn start(budget: Option<Duration>) -> Self {
        Self {
            started: Instant::now(),
            budget,
        }
    }

    fn check(&self, stage: &'static str) -> Result<(), LoopError> {
        let elapsed = self.started.elapsed();
        debug!("Stage '{}' done at {}ms", stage, elapsed.as_millis());
        match self.budget {
            Some(budget) if elapsed > budget => Err(LoopError::TimeBudgetExceeded {
                stage,
                elapsed_ms: elapsed.as_millis(),
                limit_ms: budget.as_millis() as u64,
            }),
            _ => Ok(()),
        }
    }
}

/// 循环片段检测器：签名 -> LSH 候选 -> 并行打分 -> 贪心选段
///
/// 每次调用都是独立的：分桶、签名表和线程池都在调用内创建并释放。
#[derive(Debug)]
pub struct LoopFinder {
    config: LoopConfig,
}

impl LoopFinder {
    /// 配置错误在处理任何帧之前返回
    pub fn new(config: LoopConfig) -> Result<Self, LoopError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &LoopConfig {
        &self.config
    }

    /// 帧必须按时间严格递增
    pub fn run(&self, frames: &[Frame]) -> Result<Detection, LoopError> {
        let deadline = Deadline::start(self.config.time_budget());
        self.run_with_deadline(frames, &deadline)
    }

    pub fn run_source(&self, source: &dyn FrameSource) -> Result<Detection, LoopError> {
        let deadline = Deadline::start(self.config.time_budget());
        let frames = sample_frames(source, &self.config)?;
        deadline.check("sampling")?;
        self.run_with_deadline(&frames, &deadline)
    }

    fn run_with_deadline(&self, frames: &[Frame], deadline: &Deadline) -> Result<Detection, LoopError> {
        if frames.is_empty() {
            return Err(LoopError::EmptyInput);
        }
        if let Some(limit) = self.config.max_frames {
            if frames.len() > limit {
                return Err(LoopError::FrameBudgetExceeded {
                    frames: frames.len(),
                    limit,
                });
            }
        }

        let workers = self.config.worker_count();
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("loop-worker-{}", i))
            .build()
            .map_err(|e| LoopError::WorkerPool(e.to_string()))?;

        info!(
            "🎬 Finding loops in {} frames (len {}-{}s, threshold {}, eval {}, {} workers)",
            frames.len(),
            self.config.min_len,
            self.config.max_len,
            self.config.threshold,
            self.config.rank,
            workers
        );

        pool.install(|| self.run_stages(frames, deadline))
    }

    fn run_stages(&self, frames: &[Frame], deadline: &Deadline) -> Result<Detection, LoopError> {
        let signatures = SignatureMap::generate(frames, self.config.hash_size)?;
        deadline.check("signatures")?;

        let index = LshIndex::build(&signatures, self.config.bands)?;
        let (min_centis, max_centis) = self.config.length_window_centis();
        let (pairs, candidate_stats) = index.candidate_pairs(&signatures, min_centis, max_centis);
        deadline.check("candidates")?;

        let scorer = SimilarityScorer::new(self.config.threshold, self.config.stability_check);
        let (matches, score_stats) = scorer.score(&signatures, &pairs)?;
        deadline.check("scoring")?;

        let segments = SegmentSelector::new(self.config.rank).select(&matches);

        let stats = DetectionStats {
            frames: signatures.len(),
            tested_pairs: candidate_stats.tested,
            candidates: pairs.len(),
            matches: matches.len(),
            rejected_static: score_stats.rejected_static,
            elapsed_ms: deadline.started.elapsed().as_millis() as u64,
        };

        info!(
            "✅ {} loop segments found in {}ms",
            segments.len(),
            stats.elapsed_ms
        );

        Ok(Detection { segments, stats })
    }
}
