use std::time::Duration;

use chrono::{DateTime, Utc};

/// Holds a single value for `ttl` after it was stored.
///
/// The clock is passed in on every call. Storing replaces the whole entry.
#[derive(Debug)]
pub struct TtlCache<T> {
    ttl: Duration,
    entry: Option<(T, DateTime<Utc>)>,
}

impl<T> TtlCache<T> {
    pub fn new(ttl: Duration) -> TtlCache<T> {
        TtlCache { ttl, entry: None }
    }

    /// The stored value if it is younger than the ttl. A value stored "in the future", after
    /// the clock was set back, counts as expired.
    pub fn get(&self, now: DateTime<Utc>) -> Option<&T> {
        let (value, stored_at) = self.entry.as_ref()?;
        match (now - *stored_at).to_std() {
            Ok(age) if age < self.ttl => Some(value),
            _ => None,
        }
    }

    pub fn put(&mut self, value: T, now: DateTime<Utc>) {
        self.entry = Some((value, now));
    }
}
