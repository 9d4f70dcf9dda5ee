//! Service listing printed by `--list` and the `--print-version` banner.

use std::io::{self, Write};

use crate::services::Service;

/// Writes one `<label>: active|sleeping` line per service.
///
/// # Errors
///
/// Propagates write failures from `out`.
pub fn write_listing<'a>(
    out: &mut dyn Write,
    services: impl IntoIterator<Item = &'a Service>,
) -> io::Result<()> {
    for service in services {
        writeln!(out, "{service}")?;
    }
    out.flush()
}

/// Writes the `<name> - <version>` banner.
///
/// # Errors
///
/// Propagates write failures from `out`.
pub fn write_version(out: &mut dyn Write) -> io::Result<()> {
    writeln!(
        out,
        "{} - {}",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION")
    )?;
    out.flush()
}
