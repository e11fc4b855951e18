use super::error::LoopError;
use super::timestamp::{secs_to_centis_ceil, secs_to_centis_floor};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// 排序策略：按相似度或按片段长度
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RankPolicy {
    /// 相似度高者优先
    #[default]
    Quality,
    /// 时长长者优先
    Length,
}

impl FromStr for RankPolicy {
    type Err = LoopError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "quality" => Ok(RankPolicy::Quality),
            "length" => Ok(RankPolicy::Length),
            other => Err(LoopError::InvalidConfig(format!(
                "eval must be 'quality' or 'length', got '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for RankPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RankPolicy::Quality => write!(f, "quality"),
            RankPolicy::Length => write!(f, "length"),
        }
    }
}

/// 采样窗口（秒），只在 `[start, end)` 内抽帧
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClipWindow {
    pub start: f64,
    pub end: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoopConfig {
    /// 最短循环时长（秒，含）
    #[serde(alias = "minLen")]
    pub min_len: f64,
    /// 最长循环时长（秒，含）
    #[serde(alias = "maxLen")]
    pub max_len: f64,
    /// 最低相似度 [0, 1]
    pub threshold: f64,
    #[serde(alias = "eval")]
    pub rank: RankPolicy,
    /// 签名边长（比特），签名共 hash_size² 位
    #[serde(alias = "hashSize")]
    pub hash_size: u32,
    /// LSH 分带数，必须整除 hash_size²
    pub bands: u32,
    /// 拒绝静止画面造成的伪循环
    #[serde(alias = "stabilityCheck")]
    pub stability_check: bool,
    /// 采样帧率上限，实际帧率取 min(视频帧率, sample_fps)
    #[serde(alias = "sampleFps")]
    pub sample_fps: f64,
    pub window: Option<ClipWindow>,
    /// 并行打分线程数，None 时按 CPU 核数
    pub workers: Option<usize>,
    #[serde(alias = "maxFrames")]
    pub max_frames: Option<usize>,
    #[serde(alias = "timeBudgetMs")]
    pub time_budget_ms: Option<u64>,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            min_len: 0.5,
            max_len: 10.0,
            threshold: 0.95,
            rank: RankPolicy::Quality,
            hash_size: 32,
            bands: 32,
            stability_check: true,
            sample_fps: 30.0,
            window: None,
            workers: None,
            max_frames: None,
            time_budget_ms: None,
        }
    }
}

impl LoopConfig {
    /// 短视频：密集采样，循环更短
    pub fn for_short_clips() -> Self {
        Self {
            min_len: 0.5,
            max_len: 5.0,
            sample_fps: 30.0,
            ..Default::default()
        }
    }

    /// 长视频：稀疏采样并限制帧数
    pub fn for_long_clips() -> Self {
        Self {
            min_len: 1.0,
            max_len: 10.0,
            sample_fps: 10.0,
            hash_size: 16,
            bands: 16,
            max_frames: Some(20_000),
            ..Default::default()
        }
    }

    pub fn from_json5(text: &str) -> Result<Self, LoopError> {
        let config: LoopConfig = json5::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), LoopError> {
        if self.hash_size == 0 {
            return Err(LoopError::InvalidConfig("hashSize must be positive".into()));
        }
        if self.bands == 0 {
            return Err(LoopError::InvalidConfig("bands must be positive".into()));
        }
        let bits = self.signature_bits();
        if bits % self.bands as usize != 0 {
            return Err(LoopError::InvalidConfig(format!(
                "hashSize² ({}) is not divisible by bands ({})",
                bits, self.bands
            )));
        }
        if !self.min_len.is_finite() || !self.max_len.is_finite() || self.min_len < 0.0 {
            return Err(LoopError::InvalidConfig(format!(
                "loop lengths must be finite and non-negative, got [{}, {}]",
                self.min_len, self.max_len
            )));
        }
        if self.min_len > self.max_len {
            return Err(LoopError::InvalidConfig(format!(
                "minLen ({}) exceeds maxLen ({})",
                self.min_len, self.max_len
            )));
        }
        let (min_centis, max_centis) = self.length_window_centis();
        if min_centis > max_centis {
            return Err(LoopError::InvalidConfig(format!(
                "no whole centisecond lies within [{}, {}]",
                self.min_len, self.max_len
            )));
        }
        if !(0.0..=1.0).contains(&self.threshold) {
            return Err(LoopError::InvalidConfig(format!(
                "threshold must be within [0, 1], got {}",
                self.threshold
            )));
        }
        if !self.sample_fps.is_finite() || self.sample_fps <= 0.0 {
            return Err(LoopError::InvalidConfig(format!(
                "sample fps must be positive, got {}",
                self.sample_fps
            )));
        }
        if self.workers == Some(0) {
            return Err(LoopError::InvalidConfig("workers must be at least 1".into()));
        }
        if let Some(window) = self.window {
            if !window.start.is_finite()
                || !window.end.is_finite()
                || window.start < 0.0
                || window.start >= window.end
            {
                return Err(LoopError::InvalidConfig(format!(
                    "clip window [{}, {}) is empty or invalid",
                    window.start, window.end
                )));
            }
        }
        Ok(())
    }

    pub fn signature_bits(&self) -> usize {
        self.hash_size as usize * self.hash_size as usize
    }

    /// 每个分带的比特数（`R = H² / B`）
    pub fn band_width(&self) -> usize {
        self.signature_bits() / self.bands.max(1) as usize
    }

    /// `[min_len, max_len]` 收缩到整厘秒：下界向上取整，上界向下取整
    pub fn length_window_centis(&self) -> (u64, u64) {
        (secs_to_centis_ceil(self.min_len), secs_to_centis_floor(self.max_len))
    }

    pub fn time_budget(&self) -> Option<Duration> {
        self.time_budget_ms.map(Duration::from_millis)
    }

    pub fn worker_count(&self) -> usize {
        self.workers.unwrap_or_else(num_cpus::get).max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = LoopConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.band_width(), 32);
        assert!(LoopConfig::for_short_clips().validate().is_ok());
        assert!(LoopConfig::for_long_clips().validate().is_ok());
    }

    #[test]
    fn test_bands_must_divide_signature() {
        let config = LoopConfig {
            hash_size: 8,
            bands: 3,
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(matches!(err, LoopError::InvalidConfig(_)));
        assert!(err.to_string().contains("64"));
    }

    #[test]
    fn test_rejects_invalid_ranges() {
        let inverted = LoopConfig {
            min_len: 5.0,
            max_len: 1.0,
            ..Default::default()
        };
        assert!(inverted.validate().is_err());

        let threshold = LoopConfig {
            threshold: 1.2,
            ..Default::default()
        };
        assert!(threshold.validate().is_err());

        let zero_hash = LoopConfig {
            hash_size: 0,
            ..Default::default()
        };
        assert!(zero_hash.validate().is_err());

        let zero_bands = LoopConfig {
            bands: 0,
            ..Default::default()
        };
        assert!(zero_bands.validate().is_err());

        let no_workers = LoopConfig {
            workers: Some(0),
            ..Default::default()
        };
        assert!(no_workers.validate().is_err());

        let bad_window = LoopConfig {
            window: Some(ClipWindow { start: 4.0, end: 2.0 }),
            ..Default::default()
        };
        assert!(bad_window.validate().is_err());
    }

    #[test]
    fn test_parse_form_field_names() {
        let config = LoopConfig::from_json5(
            "{ minLen: 1, maxLen: 5, threshold: 0.9, eval: 'length', hashSize: 8, bands: 8 }",
        )
        .unwrap();
        assert_eq!(config.min_len, 1.0);
        assert_eq!(config.max_len, 5.0);
        assert_eq!(config.rank, RankPolicy::Length);
        assert_eq!(config.hash_size, 8);
        assert!(config.stability_check);
    }

    #[test]
    fn test_parse_rejects_invalid_config() {
        let err = LoopConfig::from_json5("{ hash_size: 8, bands: 3 }").unwrap_err();
        assert!(matches!(err, LoopError::InvalidConfig(_)));

        let err = LoopConfig::from_json5("{ eval: 'fastest' }").unwrap_err();
        assert!(matches!(err, LoopError::ConfigParse(_)));
    }

    #[test]
    fn test_rank_policy_from_str() {
        assert_eq!("quality".parse::<RankPolicy>().unwrap(), RankPolicy::Quality);
        assert_eq!(" Length ".parse::<RankPolicy>().unwrap(), RankPolicy::Length);
        assert!("best".parse::<RankPolicy>().is_err());
    }

    #[test]
    fn test_length_window_in_centis() {
        let config = LoopConfig {
            min_len: 1.0,
            max_len: 1.5,
            ..Default::default()
        };
        assert_eq!(config.length_window_centis(), (100, 150));
    }

    #[test]
    fn test_fractional_window_shrinks_inward() {
        let config = LoopConfig {
            min_len: 1.004,
            max_len: 1.006,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(LoopError::InvalidConfig(_))));

        let config = LoopConfig {
            min_len: 1.004,
            max_len: 2.006,
            ..Default::default()
        };
        assert!(config.validate().is_ok());
        assert_eq!(config.length_window_centis(), (101, 200));

        let config = LoopConfig {
            min_len: 0.07,
            max_len: 0.29,
            ..Default::default()
        };
        assert_eq!(config.length_window_centis(), (7, 29));
    }
}
