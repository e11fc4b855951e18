//! 贪心选择互不重叠的循环片段
//!
//! 按排序策略依次尝试，与已接受片段有任何重叠（端点落入或完全包含）即丢弃，不回溯。

use super::config::RankPolicy;
use super::scorer::Match;
use super::timestamp::centis_to_secs;
use log::info;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// 输出片段（秒）
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub start: f64,
    pub duration: f64,
    pub score: f64,
}

impl Segment {
    pub fn from_match(m: &Match) -> Self {
        Self {
            start: m.earlier.as_secs_f64(),
            duration: centis_to_secs(m.span_centis()),
            score: m.similarity,
        }
    }

    pub fn end(&self) -> f64 {
        self.start + self.duration
    }
}

/// 输出是按优先级排列的；需要时间顺序的调用方用它重排
pub fn sort_chronologically(segments: &mut [Segment]) {
    segments.sort_by(|a, b| a.start.total_cmp(&b.start).then(a.duration.total_cmp(&b.duration)));
}

type MatchOrder = fn(&Match, &Match) -> Ordering;

fn by_quality(a: &Match, b: &Match) -> Ordering {
    b.similarity
        .total_cmp(&a.similarity)
        .then(b.span_centis().cmp(&a.span_centis()))
        .then(a.earlier.cmp(&b.earlier))
        .then(a.later.cmp(&b.later))
}

fn by_length(a: &Match, b: &Match) -> Ordering {
    b.span_centis()
        .cmp(&a.span_centis())
        .then(b.similarity.total_cmp(&a.similarity))
        .then(a.earlier.cmp(&b.earlier))
        .then(a.later.cmp(&b.later))
}

pub struct SegmentSelector {
    order: MatchOrder,
}

impl SegmentSelector {
    pub fn new(policy: RankPolicy) -> Self {
        let order: MatchOrder = match policy {
            RankPolicy::Quality => by_quality,
            RankPolicy::Length => by_length,
        };
        Self { order }
    }

    pub fn rank(&self, matches: &[Match]) -> Vec<Match> {
        let mut ranked = matches.to_vec();
        ranked.sort_by(self.order);
        ranked
    }

    pub fn select(&self, matches: &[Match]) -> Vec<Segment> {
        let mut accepted: Vec<(u64, u64)> = Vec::new();
        let mut segments = Vec::new();

        for m in self.rank(matches) {
            let interval = (m.earlier.centis(), m.later.centis());
            if accepted.iter().any(|&seg| overlaps(interval, seg)) {
                continue;
            }
            accepted.push(interval);
            segments.push(Segment::from_match(&m));
        }

        info!("✂️ Selected {} segments from {} matches", segments.len(), matches.len());
        segments
    }
}

/// 闭区间重叠：任一端点落在已接受区间内，或完全包含已接受区间
pub fn overlaps(candidate: (u64, u64), accepted: (u64, u64)) -> bool {
    let (start, end) = candidate;
    let (seg_start, seg_end) = accepted;
    (start >= seg_start && start <= seg_end)
        || (end >= seg_start && end <= seg_end)
        || (start <= seg_start && end >= seg_end)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::looping::timestamp::TimestampKey;

    fn create_match(start_secs: f64, end_secs: f64, similarity: f64) -> Match {
        let earlier = TimestampKey::from_secs(start_secs).unwrap();
        let later = TimestampKey::from_secs(end_secs).unwrap();
        Match {
            earlier_idx: earlier.centis() as usize,
            later_idx: later.centis() as usize,
            earlier,
            later,
            similarity,
        }
    }

    #[test]
    fn test_overlap_rules() {
        assert!(overlaps((100, 300), (200, 400)));
        assert!(overlaps((300, 500), (100, 300)));
        assert!(overlaps((100, 500), (200, 300)));
        assert!(overlaps((200, 300), (100, 500)));
        assert!(!overlaps((100, 200), (201, 300)));
    }

    #[test]
    fn test_quality_prefers_best_score() {
        let matches = vec![
            create_match(1.0, 2.0, 0.95),
            create_match(1.0, 3.0, 1.0),
            create_match(2.0, 3.0, 0.97),
        ];
        let segments = SegmentSelector::new(RankPolicy::Quality).select(&matches);
        assert_eq!(
            segments,
            vec![Segment {
                start: 1.0,
                duration: 2.0,
                score: 1.0
            }]
        );
    }

    #[test]
    fn test_length_prefers_longest() {
        let matches = vec![
            create_match(1.0, 2.0, 1.0),
            create_match(4.0, 9.5, 0.91),
            create_match(5.0, 6.0, 0.99),
            create_match(10.0, 11.0, 0.93),
        ];
        let segments = SegmentSelector::new(RankPolicy::Length).select(&matches);
        let starts: Vec<f64> = segments.iter().map(|s| s.start).collect();
        assert_eq!(starts, vec![4.0, 1.0, 10.0]);
        assert_eq!(segments[0].duration, 5.5);
    }

    #[test]
    fn test_quality_tie_breaks_by_duration_then_start() {
        let matches = vec![
            create_match(5.0, 6.0, 0.98),
            create_match(1.0, 2.0, 0.98),
            create_match(8.0, 10.0, 0.98),
        ];
        let ranked = SegmentSelector::new(RankPolicy::Quality).rank(&matches);
        let starts: Vec<f64> = ranked.iter().map(|m| m.earlier.as_secs_f64()).collect();
        assert_eq!(starts, vec![8.0, 1.0, 5.0]);
    }

    #[test]
    fn test_length_tie_breaks_by_score_then_start() {
        let matches = vec![
            create_match(5.0, 7.0, 0.96),
            create_match(1.0, 3.0, 0.96),
            create_match(8.0, 10.0, 0.99),
        ];
        let ranked = SegmentSelector::new(RankPolicy::Length).rank(&matches);
        let starts: Vec<f64> = ranked.iter().map(|m| m.earlier.as_secs_f64()).collect();
        assert_eq!(starts, vec![8.0, 1.0, 5.0]);
    }

    #[test]
    fn test_greedy_is_not_optimal() {
        // 一个长片段挡住两个较短但互不重叠的片段
        let matches = vec![
            create_match(1.0, 6.0, 0.99),
            create_match(0.5, 2.0, 0.98),
            create_match(5.0, 7.0, 0.97),
        ];
        let segments = SegmentSelector::new(RankPolicy::Quality).select(&matches);
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].start, 1.0);
    }

    #[test]
    fn test_output_never_overlaps() {
        let mut matches = Vec::new();
        for i in 0..20 {
            let start = i as f64 * 0.5;
            matches.push(create_match(start, start + 1.0 + (i % 3) as f64, 0.9 + (i % 7) as f64 / 100.0));
        }
        for policy in [RankPolicy::Quality, RankPolicy::Length] {
            let segments = SegmentSelector::new(policy).select(&matches);
            for (i, a) in segments.iter().enumerate() {
                for b in &segments[i + 1..] {
                    let a_iv = ((a.start * 100.0).round() as u64, (a.end() * 100.0).round() as u64);
                    let b_iv = ((b.start * 100.0).round() as u64, (b.end() * 100.0).round() as u64);
                    assert!(!overlaps(a_iv, b_iv));
                    assert!(!overlaps(b_iv, a_iv));
                }
            }
        }
    }

    #[test]
    fn test_empty_matches() {
        assert!(SegmentSelector::new(RankPolicy::Quality).select(&[]).is_empty());
    }

    #[test]
    fn test_sort_chronologically() {
        let mut segments = vec![
            Segment { start: 4.0, duration: 1.0, score: 1.0 },
            Segment { start: 1.0, duration: 2.0, score: 0.9 },
        ];
        sort_chronologically(&mut segments);
        assert_eq!(segments[0].start, 1.0);
        assert_eq!(segments[1].end(), 5.0);
    }
}
