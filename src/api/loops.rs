//! 循环片段检测器

use crate::api::models::loops::LoopReport;
use crate::core::looping::{Frame, FrameSource, LoopConfig, LoopError, LoopFinder};
use log::info;

/// 循环片段检测器 - 上传层只需传入已解码的帧或视频源
///
/// ```no_run
/// use loop_finder::api::loops::LoopDetector;
/// use loop_finder::core::looping::{LoopConfig, MockFrameSource};
///
/// let detector = LoopDetector::create(LoopConfig::default()).unwrap();
/// let source = MockFrameSource::new(4.0, 30.0, 64, 64);
/// let report = detector.detect_source(&source).unwrap();
/// println!("{}", report.to_json().unwrap());
/// ```
#[derive(Debug)]
pub struct LoopDetector {
    finder: LoopFinder,
}

impl LoopDetector {
    /// 创建检测器，配置非法时直接返回错误
    pub fn create(config: LoopConfig) -> Result<Self, LoopError> {
        crate::init_logging();
        let finder = LoopFinder::new(config)?;
        info!("🎬 LoopDetector: created");
        Ok(Self { finder })
    }

    /// 从 JSON5 配置文本创建（字段名兼容上传表单：minLen、maxLen、threshold、eval）
    pub fn create_from_json5(config: &str) -> Result<Self, LoopError> {
        Self::create(LoopConfig::from_json5(config)?)
    }

    pub fn config(&self) -> &LoopConfig {
        self.finder.config()
    }

    /// 检测按时间递增排列的帧
    pub fn detect(&self, frames: &[Frame]) -> Result<LoopReport, LoopError> {
        let detection = self.finder.run(frames)?;
        Ok(LoopReport::from(detection))
    }

    /// 按配置的采样率从视频源抽帧后检测
    pub fn detect_source(&self, source: &dyn FrameSource) -> Result<LoopReport, LoopError> {
        let detection = self.finder.run_source(source)?;
        Ok(LoopReport::from(detection))
    }
}

impl Drop for LoopDetector {
    fn drop(&mut self) {
        info!("🗑️ LoopDetector: released");
    }
}
