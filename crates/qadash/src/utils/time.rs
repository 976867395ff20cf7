use std::sync::OnceLock;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result, bail};
use time::format_description::well_known::Rfc3339;
use time::format_description::{self, OwnedFormatItem};
use time::{Date, OffsetDateTime, PrimitiveDateTime, UtcOffset};

const EPOCH_SECONDS_CUTOFF: i128 = 100_000_000_000;
const EPOCH_MILLIS_CUTOFF: i128 = 100_000_000_000_000;
const NANOS_PER_MILLI: i128 = 1_000_000;

static DATE_FORMAT: OnceLock<Option<OwnedFormatItem>> = OnceLock::new();
static DATETIME_FORMAT: OnceLock<Option<OwnedFormatItem>> = OnceLock::new();

#[must_use]
pub fn unix_timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |duration| {
            u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
        })
}

#[must_use]
pub fn now_utc() -> String {
    format_unix_ms(unix_timestamp_ms())
}

/// Accepts RFC3339, `YYYY-MM-DD`, `YYYY-MM-DD HH:MM:SS` (read as UTC) and
/// epoch seconds or milliseconds.
pub fn parse_timestamp_to_unix_ms(raw: &str) -> Result<u64> {
    let candidate = raw.trim();
    if candidate.is_empty() {
        bail!("timestamp input is empty");
    }

    if let Ok(epoch_raw) = candidate.parse::<i128>() {
        return epoch_to_unix_ms(epoch_raw);
    }

    if let Ok(parsed) = OffsetDateTime::parse(candidate, &Rfc3339) {
        return to_unix_ms(parsed);
    }

    if let Some(format) = datetime_format()
        && let Ok(parsed) = PrimitiveDateTime::parse(candidate, format)
    {
        return to_unix_ms(parsed.assume_utc());
    }

    if let Some(format) = date_format()
        && let Ok(parsed) = Date::parse(candidate, format)
    {
        return to_unix_ms(parsed.midnight().assume_utc());
    }

    bail!("unsupported timestamp format: {candidate}");
}

#[must_use]
pub fn format_unix_ms(timestamp_unix_ms: u64) -> String {
    let nanos = i128::from(timestamp_unix_ms)
        .checked_mul(NANOS_PER_MILLI)
        .unwrap_or(i128::MAX);
    let dt = OffsetDateTime::from_unix_timestamp_nanos(nanos)
        .unwrap_or(OffsetDateTime::UNIX_EPOCH)
        .to_offset(UtcOffset::UTC);
    format!(
        "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}.{:03}Z",
        dt.year(),
        u8::from(dt.month()),
        dt.day(),
        dt.hour(),
        dt.minute(),
        dt.second(),
        dt.millisecond()
    )
}

/// Canonical RFC3339 form of any accepted timestamp.
pub fn normalize_timestamp(raw: &str) -> Result<String> {
    let unix_ms =
        parse_timestamp_to_unix_ms(raw).with_context(|| format!("invalid timestamp `{raw}`"))?;
    Ok(format_unix_ms(unix_ms))
}

fn date_format() -> Option<&'static OwnedFormatItem> {
    DATE_FORMAT
        .get_or_init(|| format_description::parse_owned::<2>("[year]-[month]-[day]").ok())
        .as_ref()
}

fn datetime_format() -> Option<&'static OwnedFormatItem> {
    DATETIME_FORMAT
        .get_or_init(|| {
            format_description::parse_owned::<2>("[year]-[month]-[day] [hour]:[minute]:[second]")
                .ok()
        })
        .as_ref()
}

fn epoch_to_unix_ms(epoch_raw: i128) -> Result<u64> {
    if epoch_raw < 0 {
        bail!("negative epoch values are not supported");
    }

    let epoch_ms = if epoch_raw < EPOCH_SECONDS_CUTOFF {
        epoch_raw.checked_mul(1_000)
    } else if epoch_raw < EPOCH_MILLIS_CUTOFF {
        Some(epoch_raw)
    } else {
        bail!("epoch values finer than milliseconds are not supported");
    }
    .ok_or_else(|| anyhow::anyhow!("epoch conversion overflow"))?;

    u64::try_from(epoch_ms)
        .map_err(|_| anyhow::anyhow!("timestamp exceeds supported unix millisecond range"))
}

fn to_unix_ms(parsed: OffsetDateTime) -> Result<u64> {
    if parsed.unix_timestamp() < 0 {
        bail!("timestamps before 1970-01-01T00:00:00Z are not supported");
    }

    let unix_ms = parsed.unix_timestamp_nanos() / NANOS_PER_MILLI;
    u64::try_from(unix_ms)
        .map_err(|_| anyhow::anyhow!("timestamp exceeds supported unix millisecond range"))
}
