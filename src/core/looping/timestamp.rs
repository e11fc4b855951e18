//! 采样帧的时间戳键 - 固定两位小数精度（厘秒）

use super::error::LoopError;
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;
use std::str::FromStr;

const CENTIS_PER_SECOND: u64 = 100;

static KEY_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d{2,})-([0-5]\d)-([0-5]\d)\.(\d{2})$").expect("timestamp key pattern is valid")
});

/// 视频内偏移量，以厘秒为单位存储，可精确相减与比较
///
/// 文本形式为 `HH-MM-SS.cc`，例如 `00-00-01.00`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct TimestampKey {
    centis: u64,
}

impl TimestampKey {
    pub const ZERO: TimestampKey = TimestampKey { centis: 0 };

    pub fn from_centis(centis: u64) -> Self {
        Self { centis }
    }

    /// 四舍五入到最近的厘秒
    pub fn from_secs(secs: f64) -> Result<Self, LoopError> {
        if !secs.is_finite() || secs < 0.0 {
            return Err(LoopError::InvalidTimestamp(format!(
                "offset must be a finite, non-negative number of seconds, got {}",
                secs
            )));
        }
        let centis = (secs * CENTIS_PER_SECOND as f64).round();
        if centis > u64::MAX as f64 {
            return Err(LoopError::InvalidTimestamp(format!("offset {}s is too large", secs)));
        }
        Ok(Self {
            centis: centis as u64,
        })
    }

    pub fn centis(&self) -> u64 {
        self.centis
    }

    pub fn as_secs_f64(&self) -> f64 {
        self.centis as f64 / CENTIS_PER_SECOND as f64
    }

    /// 到 `self` 的精确跨度（厘秒），`earlier` 更晚时为 `None`
    pub fn span_since(&self, earlier: TimestampKey) -> Option<u64> {
        self.centis.checked_sub(earlier.centis)
    }
}

impl fmt::Display for TimestampKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let total_secs = self.centis / CENTIS_PER_SECOND;
        let frac = self.centis % CENTIS_PER_SECOND;
        let hours = total_secs / 3600;
        let minutes = (total_secs % 3600) / 60;
        let seconds = total_secs % 60;
        write!(f, "{:02}-{:02}-{:02}.{:02}", hours, minutes, seconds, frac)
    }
}

impl FromStr for TimestampKey {
    type Err = LoopError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let caps = KEY_PATTERN
            .captures(s)
            .ok_or_else(|| LoopError::InvalidTimestamp(format!("malformed key '{}'", s)))?;

        let field = |idx: usize| -> Result<u64, LoopError> {
            caps[idx]
                .parse::<u64>()
                .map_err(|e| LoopError::InvalidTimestamp(format!("'{}': {}", s, e)))
        };

        let hours = field(1)?;
        let minutes = field(2)?;
        let seconds = field(3)?;
        let frac = field(4)?;

        let total_secs = hours
            .checked_mul(3600)
            .and_then(|h| h.checked_add(minutes * 60 + seconds))
            .and_then(|t| t.checked_mul(CENTIS_PER_SECOND))
            .and_then(|t| t.checked_add(frac))
            .ok_or_else(|| LoopError::InvalidTimestamp(format!("'{}' overflows", s)))?;

        Ok(Self { centis: total_secs })
    }
}

/// 浮点误差容忍度，避免 `0.07 * 100 = 7.000000000000001` 被向上取整成 8
const SNAP_EPSILON: f64 = 1e-9;

fn snapped_centis(secs: f64) -> f64 {
    let centis = secs * CENTIS_PER_SECOND as f64;
    let nearest = centis.round();
    if (centis - nearest).abs() < SNAP_EPSILON {
        nearest
    } else {
        centis
    }
}

/// 不小于 `secs` 的最小厘秒数，用作区间下界
pub fn secs_to_centis_ceil(secs: f64) -> u64 {
    snapped_centis(secs).ceil().max(0.0) as u64
}

/// 不大于 `secs` 的最大厘秒数，用作区间上界
pub fn secs_to_centis_floor(secs: f64) -> u64 {
    snapped_centis(secs).floor().max(0.0) as u64
}

pub fn centis_to_secs(centis: u64) -> f64 {
    centis as f64 / CENTIS_PER_SECOND as f64
}
