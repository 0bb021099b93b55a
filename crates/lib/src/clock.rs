//! Time sources for `-lastModified` stamps.
//!
//! Branch synchronization compares `<key>-lastModified` dates, so every writer
//! must stamp with the same notion of time. The [`Store`](crate::Store) owns a
//! [`Clock`]; production code uses [`SystemClock`] while tests drive a
//! [`FixedClock`] to get reproducible orderings.
//!
//! ```
//! use docbranch::{Clock, SystemClock};
//!
//! let clock = SystemClock;
//! assert!(clock.now_millis() > 0);
//! ```

use std::fmt::Debug;
use std::time::{SystemTime, UNIX_EPOCH};

use chrono::{DateTime, TimeZone, Utc};

#[cfg(any(test, feature = "testing"))]
use std::sync::Mutex;

/// A provider of the current time.
pub trait Clock: Send + Sync + Debug {
    /// Current time as milliseconds since the Unix epoch.
    fn now_millis(&self) -> u64;

    /// Current time as a UTC date, derived from [`Clock::now_millis`].
    fn now(&self) -> DateTime<Utc> {
        millis_to_date(self.now_millis())
    }
}

/// Converts epoch milliseconds into a UTC date, saturating at the epoch.
pub fn millis_to_date(millis: u64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(millis as i64)
        .single()
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }
}

/// Controllable clock for tests.
///
/// Every call to `now_millis()` returns the current value and then advances it
/// by one millisecond, so consecutive stamps are strictly increasing. Call
/// [`FixedClock::hold`] to freeze it.
///
/// ```
/// use docbranch::{Clock, FixedClock};
///
/// let clock = FixedClock::new(1000);
/// let a = clock.now_millis();
/// let b = clock.now_millis();
/// assert!(b > a);
///
/// let _hold = clock.hold();
/// assert_eq!(clock.now_millis(), clock.now_millis());
/// ```
#[cfg(any(test, feature = "testing"))]
pub struct FixedClock {
    state: Mutex<FixedState>,
}

#[cfg(any(test, feature = "testing"))]
struct FixedState {
    millis: u64,
    held: bool,
}

/// Guard returned by [`FixedClock::hold`]; the clock advances again on drop.
#[cfg(any(test, feature = "testing"))]
pub struct ClockHold<'a>(&'a FixedClock);

#[cfg(any(test, feature = "testing"))]
impl Drop for ClockHold<'_> {
    fn drop(&mut self) {
        self.0.state.lock().unwrap().held = false;
    }
}

#[cfg(any(test, feature = "testing"))]
impl FixedClock {
    pub fn new(millis: u64) -> Self {
        Self {
            state: Mutex::new(FixedState {
                millis,
                held: false,
            }),
        }
    }

    /// Freezes the clock until the returned guard is dropped.
    pub fn hold(&self) -> ClockHold<'_> {
        self.state.lock().unwrap().held = true;
        ClockHold(self)
    }

    pub fn advance(&self, ms: u64) {
        self.state.lock().unwrap().millis += ms;
    }

    pub fn set(&self, ms: u64) {
        self.state.lock().unwrap().millis = ms;
    }

    /// Reads the current value without advancing.
    pub fn get(&self) -> u64 {
        self.state.lock().unwrap().millis
    }
}

#[cfg(any(test, feature = "testing"))]
impl Clock for FixedClock {
    fn now_millis(&self) -> u64 {
        let mut state = self.state.lock().unwrap();
        let t = state.millis;
        if !state.held {
            state.millis += 1;
        }
        t
    }
}

#[cfg(any(test, feature = "testing"))]
impl Default for FixedClock {
    fn default() -> Self {
        // 2024-01-01T00:00:00Z
        Self::new(1_704_067_200_000)
    }
}

#[cfg(any(test, feature = "testing"))]
impl Debug for FixedClock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock().unwrap();
        f.debug_struct("FixedClock")
            .field("millis", &state.millis)
            .field("held", &state.held)
            .finish()
    }
}
