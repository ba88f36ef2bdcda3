//! Rendering of snapshots and raw feeds for the command line.

use std::io::Write;

use anyhow::Result;
use serde::Serialize;
use tracing::debug;

use crate::model::Stop;

/// Writes `value` as JSON followed by a newline.
pub fn write_json<W, T>(out: &mut W, value: &T, pretty: bool) -> Result<()>
where
    W: Write,
    T: Serialize + ?Sized,
{
    if pretty {
        serde_json::to_writer_pretty(&mut *out, value)?;
    } else {
        serde_json::to_writer(&mut *out, value)?;
    }
    writeln!(out)?;
    Ok(())
}

/// One line per stop: id, name, and each inbound vehicle with its ETA.
pub fn write_summary<W: Write>(out: &mut W, snapshot: &[Stop]) -> Result<()> {
    for stop in snapshot {
        writeln!(out, "{} {}", stop.id, stop.name)?;
        for entry in &stop.entries {
            let location = if entry.coordinate.is_unknown() {
                "no live position".to_string()
            } else {
                format!("at {},{}", entry.coordinate.lat, entry.coordinate.lon)
            };
            writeln!(
                out,
                "  {:<7} #{:<6} in {:>5.0}s  {}",
                entry.category(),
                entry.vehicle_id(),
                entry.arrival_seconds,
                location
            )?;
        }
    }
    debug!(stops = snapshot.len(), "Summary written");
    Ok(())
}
