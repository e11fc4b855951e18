//! 循环片段检测引擎
//!
//! 核心流程：
//! 1. dHash 签名 - 每帧生成固定长度的感知哈希
//! 2. LSH 分带 - 只比较至少一个分带相同的帧对
//! 3. 并行打分 - 汉明距离换算相似度，可选静止画面检查
//! 4. 贪心选段 - 按策略排序，选出互不重叠的片段

pub mod config;
pub mod error;
pub mod frame;
pub mod lsh;
pub mod pipeline;
pub mod sampler;
pub mod scorer;
pub mod selector;
pub mod signature;
pub mod timestamp;

pub use config::{ClipWindow, LoopConfig, RankPolicy};
pub use error::LoopError;
pub use frame::{Frame, Pixels};
pub use lsh::{CandidatePair, LshIndex};
pub use pipeline::{Detection, DetectionStats, LoopFinder};
pub use sampler::{sample_frames, FrameSource, MockFrameSource, SamplingPlan};
pub use scorer::{Match, SimilarityScorer};
pub use selector::{sort_chronologically, Segment, SegmentSelector};
pub use signature::{dhash, Signature, SignatureMap};
pub use timestamp::TimestampKey;
