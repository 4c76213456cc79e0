use std::cell::Cell;

/// Milliseconds since the unix epoch.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(pub i64);

pub const MS_PER_DAY: i64 = 24 * 60 * 60 * 1000;

impl Timestamp {
    /// Saturates at the ends of the representable range.
    pub fn plus_days(self, days: i64) -> Self {
        Timestamp(self.0.saturating_add(days.saturating_mul(MS_PER_DAY)))
    }
}

/// Source of wall-clock time.
///
/// Expiry logic takes a clock rather than reading the system time directly so
/// tests can move time forward.
pub trait Clock {
    fn now(&self) -> Timestamp;
}

/// Clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: Cell<i64>,
}

impl ManualClock {
    pub fn new(start: Timestamp) -> Self {
        Self {
            now: Cell::new(start.0),
        }
    }

    pub fn set(&self, t: Timestamp) {
        self.now.set(t.0);
    }

    pub fn advance_days(&self, days: i64) {
        self.now.set(self.now.get() + days * MS_PER_DAY);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        Timestamp(self.now.get())
    }
}

impl<C: Clock + ?Sized> Clock for std::rc::Rc<C> {
    fn now(&self) -> Timestamp {
        (**self).now()
    }
}
