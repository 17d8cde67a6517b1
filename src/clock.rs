use time::{Date, OffsetDateTime, UtcOffset};

/// Source of "today" for DailyLog keys.
pub trait Clock: Send + Sync {
    fn today(&self) -> Date;
}

/// Wall clock shifted to a fixed UTC offset.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    offset: UtcOffset,
}

impl SystemClock {
    pub fn with_offset_hours(hours: i8) -> anyhow::Result<Self> {
        let offset = UtcOffset::from_hms(hours, 0, 0)?;
        Ok(Self { offset })
    }
}

impl Clock for SystemClock {
    fn today(&self) -> Date {
        OffsetDateTime::now_utc().to_offset(self.offset).date()
    }
}

/// ISO-8601 calendar date, the key used in the persisted log book.
pub fn day_key(date: Date) -> String {
    format!(
        "{:04}-{:02}-{:02}",
        date.year(),
        u8::from(date.month()),
        date.day()
    )
}

#[cfg(test)]
pub(crate) struct FixedClock(pub std::sync::Mutex<Date>);

#[cfg(test)]
impl FixedClock {
    pub fn new(date: Date) -> Self {
        Self(std::sync::Mutex::new(date))
    }

    pub fn set(&self, date: Date) {
        *self.0.lock().unwrap() = date;
    }
}

#[cfg(test)]
impl Clock for FixedClock {
    fn today(&self) -> Date {
        *self.0.lock().unwrap()
    }
}
