use crate::core::looping::{sort_chronologically, Detection, DetectionStats, LoopError, Segment};
use serde::Serialize;

/// 检测结果，序列化后即上传接口的响应体 `{"gifs": [...]}`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoopReport {
    /// 按优先级排列的片段
    pub gifs: Vec<Segment>,
    pub stats: DetectionStats,
}

impl LoopReport {
    pub fn to_json(&self) -> Result<String, LoopError> {
        Ok(serde_json::to_string(self)?)
    }

    /// 按开始时间排列的片段副本
    pub fn chronological(&self) -> Vec<Segment> {
        let mut segments = self.gifs.clone();
        sort_chronologically(&mut segments);
        segments
    }

    pub fn is_empty(&self) -> bool {
        self.gifs.is_empty()
    }
}

impl From<Detection> for LoopReport {
    fn from(detection: Detection) -> Self {
        Self {
            gifs: detection.segments,
            stats: detection.stats,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_report() -> LoopReport {
        LoopReport {
            gifs: vec![
                Segment { start: 4.0, duration: 1.5, score: 1.0 },
                Segment { start: 1.0, duration: 2.0, score: 0.96 },
            ],
            stats: DetectionStats {
                frames: 10,
                ..Default::default()
            },
        }
    }

    #[test]
    fn test_report_json_shape() {
        let json = create_report().to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["gifs"][0]["start"], 4.0);
        assert_eq!(value["gifs"][0]["duration"], 1.5);
        assert_eq!(value["gifs"][1]["score"], 0.96);
        assert_eq!(value["stats"]["frames"], 10);
    }

    #[test]
    fn test_chronological_copy() {
        let report = create_report();
        let ordered = report.chronological();
        assert_eq!(ordered[0].start, 1.0);
        assert_eq!(report.gifs[0].start, 4.0);
    }
}
