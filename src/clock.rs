use chrono::{DateTime, NaiveDate, TimeDelta, Utc};
use std::cell::Cell;
use std::time::{Duration, Instant};

/// Source of time for timers and day boundaries
pub trait Clock {
    fn now(&self) -> Instant;
    fn today(&self) -> NaiveDate;
    /// Wall-clock time for persisted timestamps
    fn utc_now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn today(&self) -> NaiveDate {
        crate::utils::today()
    }

    fn utc_now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to
#[derive(Debug)]
pub struct ManualClock {
    now: Cell<Instant>,
    today: Cell<NaiveDate>,
    wall: Cell<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(today: NaiveDate) -> Self {
        Self {
            now: Cell::new(Instant::now()),
            today: Cell::new(today),
            wall: Cell::new(today.and_time(chrono::NaiveTime::MIN).and_utc()),
        }
    }

    pub fn advance(&self, by: Duration) {
        self.now.set(self.now.get() + by);
        let by = TimeDelta::from_std(by).unwrap_or(TimeDelta::zero());
        self.wall.set(self.wall.get() + by);
    }

    pub fn advance_millis(&self, millis: u64) {
        self.advance(Duration::from_millis(millis));
    }

    pub fn set_today(&self, today: NaiveDate) {
        self.today.set(today);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.now.get()
    }

    fn today(&self) -> NaiveDate {
        self.today.get()
    }

    fn utc_now(&self) -> DateTime<Utc> {
        self.wall.get()
    }
}
