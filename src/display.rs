//! Localized timestamps for human-facing responses
//!
//! Internally every timestamp is UTC. Conversion to the display offset only
//! happens when a response is rendered.

use chrono::{DateTime, FixedOffset, Offset, Utc};

use crate::types::{MannaError, Result};

/// America/Sao_Paulo (no daylight saving since 2019)
pub const DEFAULT_UTC_OFFSET_MINUTES: i32 = -180;

/// pt-BR style, e.g. `16/10/2026, 14:00:00`
const DISPLAY_FORMAT: &str = "%d/%m/%Y, %H:%M:%S";

#[derive(Debug, Clone, Copy)]
pub struct DisplayClock {
    offset: FixedOffset,
}

impl DisplayClock {
    pub fn from_offset_minutes(minutes: i32) -> Result<Self> {
        minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .map(|offset| Self { offset })
            .ok_or_else(|| MannaError::Config(format!("UTC offset out of range: {} minutes", minutes)))
    }

    pub fn format(&self, at: DateTime<Utc>) -> String {
        at.with_timezone(&self.offset).format(DISPLAY_FORMAT).to_string()
    }

    pub fn now(&self) -> String {
        self.format(Utc::now())
    }
}

impl Default for DisplayClock {
    fn default() -> Self {
        Self {
            offset: FixedOffset::east_opt(DEFAULT_UTC_OFFSET_MINUTES * 60).unwrap_or_else(|| Utc.fix()),
        }
    }
}
