//! Cassandra-style duration values: months + days + nanoseconds.
//!
//! A table `duration` column is not a plain span of time; months and days do
//! not have a fixed length, so the three components are kept separate and
//! equality is component-wise. There is deliberately no `Ord` impl.

use crate::error::Error;
use std::fmt;
use std::str::FromStr;

const NANOS_PER_SEC: i64 = 1_000_000_000;
const NANOS_PER_MIN: i64 = 60 * NANOS_PER_SEC;
const NANOS_PER_HOUR: i64 = 60 * NANOS_PER_MIN;

/// A `duration` column value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct DataApiDuration {
    pub months: i32,
    pub days: i32,
    pub nanos: i64,
}

impl DataApiDuration {
    /// Builds a duration from its three components.
    #[must_use]
    pub const fn new(months: i32, days: i32, nanos: i64) -> Self {
        Self {
            months,
            days,
            nanos,
        }
    }

    /// True when every component is zero.
    #[must_use]
    pub const fn is_zero(&self) -> bool {
        self.months == 0 && self.days == 0 && self.nanos == 0
    }

    /// True when any component is negative. The wire form requires a uniform
    /// sign across components.
    #[must_use]
    pub const fn is_negative(&self) -> bool {
        self.months < 0 || self.days < 0 || self.nanos < 0
    }
}

impl fmt::Display for DataApiDuration {
    /// ISO-8601 form, e.g. `P1Y2M3DT4H5M6.007S`, `PT0S` for zero.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_zero() {
            return f.write_str("PT0S");
        }
        if self.is_negative() {
            f.write_str("-")?;
        }
        let months = self.months.unsigned_abs();
        let days = self.days.unsigned_abs();
        let mut nanos = self.nanos.unsigned_abs();

        f.write_str("P")?;
        if months >= 12 {
            write!(f, "{}Y", months / 12)?;
        }
        if months % 12 != 0 {
            write!(f, "{}M", months % 12)?;
        }
        if days != 0 {
            write!(f, "{days}D")?;
        }
        if nanos != 0 {
            f.write_str("T")?;
            let hours = nanos / NANOS_PER_HOUR as u64;
            nanos %= NANOS_PER_HOUR as u64;
            let mins = nanos / NANOS_PER_MIN as u64;
            nanos %= NANOS_PER_MIN as u64;
            let secs = nanos / NANOS_PER_SEC as u64;
            nanos %= NANOS_PER_SEC as u64;
            if hours != 0 {
                write!(f, "{hours}H")?;
            }
            if mins != 0 {
                write!(f, "{mins}M")?;
            }
            if secs != 0 || nanos != 0 {
                if nanos == 0 {
                    write!(f, "{secs}S")?;
                } else {
                    // Trim trailing zeros from the fractional part.
                    let mut frac = format!("{nanos:09}");
                    while frac.ends_with('0') {
                        frac.pop();
                    }
                    write!(f, "{secs}.{frac}S")?;
                }
            }
        }
        Ok(())
    }
}

impl FromStr for DataApiDuration {
    type Err = Error;

    /// Parses the ISO-8601 duration form used by the Data API
    /// (`[-]P[nY][nM][nD][T[nH][nM][n[.fff]S]]`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bad = || Error::serialization(format!("invalid duration '{s}'"), &[]);

        let (negative, rest) = s
            .strip_prefix('-')
            .map_or((false, s), |rest| (true, rest));
        let rest = rest.strip_prefix('P').ok_or_else(bad)?;
        if rest.is_empty() {
            return Err(bad());
        }

        let (date_part, time_part) = rest
            .split_once('T')
            .map_or((rest, ""), |(d, t)| (d, t));

        let mut months: i64 = 0;
        let mut days: i64 = 0;
        let mut nanos: i64 = 0;

        let mut num = String::new();
        for ch in date_part.chars() {
            if ch.is_ascii_digit() {
                num.push(ch);
            } else {
                let value: i64 = num.parse().map_err(|_| bad())?;
                num.clear();
                match ch {
                    'Y' => months += value * 12,
                    'M' => months += value,
                    'W' => days += value * 7,
                    'D' => days += value,
                    _ => return Err(bad()),
                }
            }
        }
        if !num.is_empty() {
            return Err(bad());
        }

        for ch in time_part.chars() {
            if ch.is_ascii_digit() || ch == '.' {
                num.push(ch);
            } else {
                match ch {
                    'H' => {
                        let value: i64 = num.parse().map_err(|_| bad())?;
                        nanos += value * NANOS_PER_HOUR;
                    }
                    'M' => {
                        let value: i64 = num.parse().map_err(|_| bad())?;
                        nanos += value * NANOS_PER_MIN;
                    }
                    'S' => {
                        let value: f64 = num.parse().map_err(|_| bad())?;
                        #[allow(clippy::cast_possible_truncation)]
                        {
                            nanos += (value * 1e9).round() as i64;
                        }
                    }
                    _ => return Err(bad()),
                }
                num.clear();
            }
        }
        if !num.is_empty() {
            return Err(bad());
        }

        let sign = if negative { -1 } else { 1 };
        Ok(Self {
            months: i32::try_from(months * sign).map_err(|_| bad())?,
            days: i32::try_from(days * sign).map_err(|_| bad())?,
            nanos: nanos * sign,
        })
    }
}
