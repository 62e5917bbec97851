//! Time-of-day derived parameters, fixed for the whole of one segment.

use chrono::{DateTime, TimeZone, Timelike, Utc};
use chrono_tz::Tz;
use image::Rgb;

const DARKEST_GREY: u32 = 25;
const LIGHTEST_GREY: u32 = 175;
const MINUTES_TO_NOON: u32 = 12 * 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SceneParams {
    pub hour: u32,
    pub minute: u32,
    pub grey_level: u8,
    pub background: Rgb<u8>,
    pub edge: Rgb<u8>,
}

impl SceneParams {
    pub fn at<T: TimeZone>(time: &DateTime<T>) -> Self {
        Self::from_clock(time.hour(), time.minute())
    }

    pub fn now(zone: Tz) -> Self {
        Self::at(&Utc::now().with_timezone(&zone))
    }

    pub fn from_clock(hour: u32, minute: u32) -> Self {
        let grey_level = grey_level(hour, minute);
        // Most contrasting edge colour for the background.
        let edge = if grey_level > 127 {
            Rgb([0, 0, 0])
        } else {
            Rgb([255, 255, 255])
        };
        Self {
            hour,
            minute,
            grey_level,
            background: Rgb([grey_level; 3]),
            edge,
        }
    }
}

/// Linear from darkest at midnight to lightest at noon, and back.
pub fn grey_level(hour: u32, minute: u32) -> u8 {
    let mut minutes = (hour * 60 + minute) % (24 * 60);
    if minutes > MINUTES_TO_NOON {
        minutes = 2 * MINUTES_TO_NOON - minutes;
    }
    let level = DARKEST_GREY + (LIGHTEST_GREY - DARKEST_GREY) * minutes / MINUTES_TO_NOON;
    level as u8
}
