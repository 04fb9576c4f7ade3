use chrono::{DateTime, Offset, TimeZone, Timelike};
use tracing::debug;

use crate::models::RiskHistoryPoint;

/// Which branch of the window state machine a run took.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowTransition {
    /// History was empty and got its first point.
    Seeded,
    /// Still inside the current 12-hour window; the live point moved.
    SameWindow,
    /// A 00:00 or 12:00 boundary passed since the last point.
    Crossed,
}

/// Epoch milliseconds of the most recent local 00:00 or 12:00 at or before
/// `now`.
pub fn window_boundary<Tz: TimeZone>(now: &DateTime<Tz>) -> i64 {
    let local = now.naive_local();
    let hour = if local.hour() >= 12 { 12 } else { 0 };
    let start = local.date().and_hms_opt(hour, 0, 0).unwrap_or(local);

    match now.timezone().from_local_datetime(&start).earliest() {
        Some(boundary) => boundary.timestamp_millis(),
        // The boundary fell in a DST gap; use the offset in force now.
        None => {
            let offset = i64::from(now.offset().fix().local_minus_utc());
            start.and_utc().timestamp_millis() - offset * 1000
        }
    }
}

/// Advance the total-risk history by one run. At most one live point moves
/// per window; crossing a boundary pins the previous value at the boundary
/// and starts a new live point. Never grows past `capacity` (minimum 2).
pub fn update_total_history<Tz: TimeZone>(
    history: &mut Vec<RiskHistoryPoint>,
    risk: i64,
    now: &DateTime<Tz>,
    capacity: usize,
) -> WindowTransition {
    let live = RiskHistoryPoint {
        timestamp: now.timestamp_millis(),
        risk,
        pinned: false,
    };

    let Some(last) = history.last().copied() else {
        history.push(live);
        return WindowTransition::Seeded;
    };

    let boundary = window_boundary(now);
    if last.timestamp >= boundary {
        if let Some(slot) = history.last_mut() {
            *slot = live;
        }
        return WindowTransition::SameWindow;
    }

    let capacity = capacity.max(2);
    if history.len() >= capacity {
        let excess = history.len() + 1 - capacity;
        history.drain(..excess);
    }
    if let Some(slot) = history.last_mut() {
        *slot = RiskHistoryPoint {
            timestamp: boundary,
            risk: last.risk,
            pinned: true,
        };
    }
    history.push(live);
    debug!(boundary, pinned_risk = last.risk, len = history.len(), "history window crossed");
    WindowTransition::Crossed
}

/// Append to a per-signal history, keeping only the newest `capacity` values.
pub fn push_bounded(history: &mut Vec<i64>, value: i64, capacity: usize) {
    history.push(value);
    if history.len() > capacity {
        let excess = history.len() - capacity;
        history.drain(..excess);
    }
}
