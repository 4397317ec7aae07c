//! Report formatting. Everything goes to stdout; nothing is written to disk.

use crate::probe::ProbeReport;
use crate::OutputFormat;
use anyhow::Result;
use lib_edsdk_ffi::LibraryInfo;
use std::io::Write;

/// Print a probe report.
pub fn print_probe_report(report: &ProbeReport, format: OutputFormat) -> Result<()> {
    let stdout = std::io::stdout();
    write_probe_report(&mut stdout.lock(), report, format)
}

pub fn write_probe_report<W: Write>(f: &mut W, report: &ProbeReport, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Text => {
            writeln!(f, "EVF Probe")?;
            writeln!(f, "=========")?;
            writeln!(f, "Library:  {}", report.library)?;
            if let Some(level) = report.battery_level {
                writeln!(f, "Battery:  {}", level)?;
            }
            if let Some(changes) = report.routing_changes {
                writeln!(f, "Routing change events: {}", changes)?;
            }
            writeln!(f)?;

            for frame in &report.frames {
                match &frame.error {
                    None => {
                        write!(
                            f,
                            "[EVF] frame {:>3} size={} bytes attempts={} ({} ms)",
                            frame.index, frame.size, frame.attempts, frame.elapsed_ms
                        )?;
                        match frame.dimensions {
                            Some((w, h)) => writeln!(f, " jpeg: {}x{}", w, h)?,
                            None => writeln!(f)?,
                        }
                    }
                    Some(error) => {
                        writeln!(f, "[EVF] frame {:>3} FAILED: {}", frame.index, error)?;
                    }
                }
            }

            writeln!(f)?;
            writeln!(
                f,
                "Frames: {}/{} succeeded",
                report.succeeded(),
                report.frames.len()
            )?;
        }
        OutputFormat::Json => {
            writeln!(f, "{}", serde_json::to_string_pretty(report)?)?;
        }
    }
    Ok(())
}

/// Print an entry-point report.
pub fn print_library_info(info: &LibraryInfo, format: OutputFormat) -> Result<()> {
    let stdout = std::io::stdout();
    write_library_info(&mut stdout.lock(), info, format)
}

pub fn write_library_info<W: Write>(f: &mut W, info: &LibraryInfo, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Text => {
            writeln!(f, "Library: {}", info.path)?;
            writeln!(f, "Format:  {:?}", info.format)?;
            writeln!(f, "\nRequired entry points:")?;
            for (name, present) in &info.required {
                writeln!(f, "  [{}] {}", if *present { "ok" } else { "MISSING" }, name)?;
            }
            writeln!(f, "\nOptional entry points:")?;
            for (name, present) in &info.optional {
                writeln!(f, "  [{}] {}", if *present { "ok" } else { "absent" }, name)?;
            }
            writeln!(f)?;
            if info.is_loadable() {
                writeln!(f, "Status: LOADABLE")?;
            } else {
                let missing: Vec<_> = info.missing_required().collect();
                writeln!(f, "Status: NOT LOADABLE - missing {}", missing.join(", "))?;
            }
        }
        OutputFormat::Json => {
            let entries = |list: &[(&'static str, bool)]| {
                list.iter()
                    .map(|(name, present)| (name.to_string(), serde_json::Value::Bool(*present)))
                    .collect::<serde_json::Map<_, _>>()
            };
            let json = serde_json::json!({
                "path": info.path,
                "format": format!("{:?}", info.format),
                "loadable": info.is_loadable(),
                "required": entries(info.required.as_slice()),
                "optional": entries(info.optional.as_slice()),
            });
            writeln!(f, "{}", serde_json::to_string_pretty(&json)?)?;
        }
    }
    Ok(())
}
