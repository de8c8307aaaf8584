//! Time and date commands

use chrono::{DateTime, Local, TimeZone};

use crate::registry::{CommandRegistry, RegistryError};

/// "The current time is 03:07 PM"
#[must_use]
pub fn format_time<Tz: TimeZone>(now: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    format!("The current time is {}", now.format("%I:%M %p"))
}

/// "Today is Friday, January 02, 2026"
#[must_use]
pub fn format_date<Tz: TimeZone>(now: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    format!("Today is {}", now.format("%A, %B %d, %Y"))
}

/// "It is Friday, January 02, 2026 at 03:07 PM"
#[must_use]
pub fn format_datetime<Tz: TimeZone>(now: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    format!("It is {}", now.format("%A, %B %d, %Y at %I:%M %p"))
}

/// Register `time`, `date` and `datetime`
///
/// `datetime` is long enough that name containment never fires inside
/// ordinary words ("now" would catch "know" and "snow").
pub(crate) fn register(registry: &mut CommandRegistry) -> Result<(), RegistryError> {
    registry.register_fn("time", ["what time", "current time"], || {
        format_time(&Local::now())
    })?;
    registry.register_fn("date", ["what date", "current date"], || {
        format_date(&Local::now())
    })?;
    registry.register_fn("datetime", ["date and time", "what day"], || {
        format_datetime(&Local::now())
    })?;
    Ok(())
}
