//! 抽帧计划 - 解码层与检测引擎之间的边界
//!
//! 解码本身由 `FrameSource` 的实现负责，这里只决定在哪些偏移量上取帧。

use super::config::LoopConfig;
use super::error::LoopError;
use super::frame::Frame;
use super::timestamp::TimestampKey;
use log::{debug, info};

/// 可按时间偏移取帧的视频源
pub trait FrameSource: Send + Sync {
    /// 视频总时长（秒）
    fn duration_secs(&self) -> f64;

    /// 原始帧率，未知时返回 0
    fn fps(&self) -> f64;

    /// 解码 `key` 处的一帧
    fn frame_at(&self, key: TimestampKey) -> Result<Frame, LoopError>;
}

/// 抽帧计划：按时间升序、互不相同的时间戳键
#[derive(Debug, Clone, PartialEq)]
pub struct SamplingPlan {
    pub rate: f64,
    pub keys: Vec<TimestampKey>,
}

impl SamplingPlan {
    pub fn new(duration_secs: f64, source_fps: f64, config: &LoopConfig) -> Result<Self, LoopError> {
        if !duration_secs.is_finite() || duration_secs < 0.0 {
            return Err(LoopError::Decode(format!(
                "source reported an invalid duration: {}",
                duration_secs
            )));
        }

        let rate = if source_fps.is_finite() && source_fps > 0.0 {
            source_fps.min(config.sample_fps)
        } else {
            config.sample_fps
        };
        let step = 1.0 / rate;

        let (start, end) = match config.window {
            Some(window) => (window.start, window.end.min(duration_secs)),
            None => (0.0, duration_secs),
        };

        let mut keys: Vec<TimestampKey> = Vec::new();
        let mut index = 0u64;
        loop {
            let offset = start + index as f64 * step;
            if offset >= end {
                break;
            }
            index += 1;

            let key = TimestampKey::from_secs(offset)?;
            if keys.last().is_some_and(|last| key <= *last) {
                debug!("Skipping offset {:.4}s, collapses onto key {}", offset, key);
                continue;
            }
            keys.push(key);

            if let Some(limit) = config.max_frames {
                if keys.len() > limit {
                    return Err(LoopError::FrameBudgetExceeded {
                        frames: keys.len(),
                        limit,
                    });
                }
            }
        }

        Ok(Self { rate, keys })
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// 按计划从视频源取出全部帧
pub fn sample_frames(source: &dyn FrameSource, config: &LoopConfig) -> Result<Vec<Frame>, LoopError> {
    let plan = SamplingPlan::new(source.duration_secs(), source.fps(), config)?;
    if plan.is_empty() {
        return Err(LoopError::EmptyInput);
    }

    info!(
        "🎞️ Sampling {} frames at {:.2} fps ({:.2}s source)",
        plan.len(),
        plan.rate,
        source.duration_secs()
    );

    let mut frames = Vec::with_capacity(plan.len());
    for key in plan.keys {
        let mut frame = source.frame_at(key)?;
        frame.key = key;
        frames.push(frame);
    }

    Ok(frames)
}

type LumaGenerator = Box<dyn Fn(TimestampKey) -> Vec<u8> + Send + Sync>;

/// 内存中的合成视频源，按偏移量生成 Y 平面
pub struct MockFrameSource {
    duration_secs: f64,
    fps: f64,
    width: u32,
    height: u32,
    generator: LumaGenerator,
}

impl MockFrameSource {
    pub fn new(duration_secs: f64, fps: f64, width: u32, height: u32) -> Self {
        let len = (width * height) as usize;
        Self {
            duration_secs,
            fps,
            width,
            height,
            generator: Box::new(move |_| vec![128u8; len]),
        }
    }

    pub fn with_generator<F>(mut self, generator: F) -> Self
    where
        F: Fn(TimestampKey) -> Vec<u8> + Send + Sync + 'static,
    {
        self.generator = Box::new(generator);
        self
    }
}

impl FrameSource for MockFrameSource {
    fn duration_secs(&self) -> f64 {
        self.duration_secs
    }

    fn fps(&self) -> f64 {
        self.fps
    }

    fn frame_at(&self, key: TimestampKey) -> Result<Frame, LoopError> {
        if key.as_secs_f64() >= self.duration_secs {
            return Err(LoopError::Decode(format!("offset {} is past the end", key)));
        }
        Frame::from_luma(self.width, self.height, (self.generator)(key), key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::looping::config::ClipWindow;

    #[test]
    fn test_rate_capped_by_source_fps() {
        let config = LoopConfig {
            sample_fps: 30.0,
            ..Default::default()
        };
        let plan = SamplingPlan::new(2.0, 10.0, &config).unwrap();
        assert_eq!(plan.rate, 10.0);
        assert_eq!(plan.len(), 20);
        assert_eq!(plan.keys[1].to_string(), "00-00-00.10");
    }

    #[test]
    fn test_unknown_fps_uses_sample_rate() {
        let config = LoopConfig {
            sample_fps: 4.0,
            ..Default::default()
        };
        let plan = SamplingPlan::new(1.0, 0.0, &config).unwrap();
        assert_eq!(plan.rate, 4.0);
        let keys: Vec<u64> = plan.keys.iter().map(|k| k.centis()).collect();
        assert_eq!(keys, vec![0, 25, 50, 75]);
    }

    #[test]
    fn test_keys_strictly_increase() {
        let config = LoopConfig {
            sample_fps: 240.0,
            ..Default::default()
        };
        let plan = SamplingPlan::new(0.1, 240.0, &config).unwrap();
        assert!(plan.keys.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(plan.len(), 11);
    }

    #[test]
    fn test_window_limits_offsets() {
        let config = LoopConfig {
            sample_fps: 2.0,
            window: Some(ClipWindow { start: 1.0, end: 10.0 }),
            ..Default::default()
        };
        let plan = SamplingPlan::new(3.0, 30.0, &config).unwrap();
        let keys: Vec<u64> = plan.keys.iter().map(|k| k.centis()).collect();
        assert_eq!(keys, vec![100, 150, 200, 250]);
    }

    #[test]
    fn test_frame_budget() {
        let config = LoopConfig {
            sample_fps: 10.0,
            max_frames: Some(5),
            ..Default::default()
        };
        let err = SamplingPlan::new(10.0, 30.0, &config).unwrap_err();
        assert!(matches!(err, LoopError::FrameBudgetExceeded { limit: 5, .. }));
    }

    #[test]
    fn test_empty_source_fails() {
        let source = MockFrameSource::new(0.0, 30.0, 16, 16);
        let err = sample_frames(&source, &LoopConfig::default()).unwrap_err();
        assert!(matches!(err, LoopError::EmptyInput));
    }

    #[test]
    fn test_sample_frames_from_mock() {
        let source = MockFrameSource::new(1.0, 25.0, 16, 16)
            .with_generator(|key| vec![(key.centis() % 256) as u8; 256]);
        let config = LoopConfig {
            sample_fps: 5.0,
            ..Default::default()
        };
        let frames = sample_frames(&source, &config).unwrap();
        assert_eq!(frames.len(), 5);
        assert_eq!(frames[2].key.centis(), 40);
        assert_eq!(frames[2].luma_plane()[0], 40);
    }

    #[test]
    fn test_decode_error_propagates() {
        let source = MockFrameSource::new(1.0, 10.0, 16, 16).with_generator(|_| vec![0u8; 3]);
        let err = sample_frames(&source, &LoopConfig::default()).unwrap_err();
        assert!(matches!(err, LoopError::FrameBuffer { .. }));
    }
}
