//! Return pricing.
//!
//! A rental is billed per started day: the elapsed time is rounded up to
//! whole days and never drops below one, so a bike returned a minute after
//! it left still costs a full day.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::error::ApiError;
use crate::types::{Bike, Rental, ReturnSummary};

pub const MS_PER_DAY: i64 = 24 * 3600 * 1000;

/// Whole days billed for a rental running from `start` to `end`.
pub fn billable_days(start: DateTime<Utc>, end: DateTime<Utc>) -> i64 {
    let elapsed_ms = (end - start).num_milliseconds();
    if elapsed_ms <= 0 {
        return 1;
    }
    ((elapsed_ms + MS_PER_DAY - 1) / MS_PER_DAY).max(1)
}

/// Fails instead of panicking when the product leaves `Decimal`'s range.
pub fn price_total(price_per_day: Decimal, days: i64) -> Result<Decimal, ApiError> {
    price_per_day
        .checked_mul(Decimal::from(days))
        .ok_or_else(|| ApiError::AmountOverflow(format!("{price_per_day} per day for {days} days")))
}

/// Settle a rental at `now`.
///
/// A missing bike prices the rental at zero instead of failing; the caller
/// may be holding a bike list older than the rental.
pub fn quote_return(
    rental: &Rental,
    bike: Option<&Bike>,
    extra_paid: Option<Decimal>,
    now: DateTime<Utc>,
) -> Result<ReturnSummary, ApiError> {
    let per_day = bike.map(|b| b.price_per_day).unwrap_or(Decimal::ZERO);
    let days = billable_days(rental.start, now);
    let extra = extra_paid.unwrap_or(Decimal::ZERO);
    let paid_now = rental
        .paid_or_zero()
        .checked_add(extra)
        .ok_or_else(|| ApiError::AmountOverflow(format!("paid {} plus {extra}", rental.paid_or_zero())))?;
    Ok(ReturnSummary {
        end: now,
        price_total: price_total(per_day, days)?,
        paid_now,
    })
}
