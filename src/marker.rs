use crate::error::*;
use crate::stream::*;
use log::*;
use std::io::{Seek, SeekFrom, Write};

pub const DEFAULT_MARKER: &[u8] = b"__END__";

pub(crate) fn check_marker(marker: &[u8]) -> Result<(), Error> {
    if marker.is_empty() || marker.contains(&b'\n') {
        return make_error(Error::InvalidMarker);
    }
    Ok(())
}

/// Finds the marker line in `file`, appending one if the stream has none,
/// and returns the absolute position where the data segment starts.
///
/// Only a whole line equal to `marker` counts. When the scan ends, the cursor is left at
/// the returned position.
///
/// The stream is changed in two cases only:
///  - the last line equals the marker but has no `\n`: the `\n` is added.
///  - there is no marker line: a `\n` is added if the stream doesn't end with one
///    (an empty stream is left as is), then the marker line is appended.
pub(crate) fn locate_segment<F: Stream + ?Sized>(file: &mut F, marker: &[u8]) -> Result<u64, Error> {
    file.seek(SeekFrom::Start(0))?;
    let mut offset = 0;
    let mut last_byte = None;
    let mut line = Vec::new();
    loop {
        line.clear();
        let n = read_line(file, &mut line)?;
        if n == 0 {
            break;
        }
        offset += n as u64;
        last_byte = line.last().cloned();

        let (content, terminated) = match line.split_last() {
            Some((&b'\n', content)) => (content, true),
            _ => (&line[..], false),
        };
        if content == marker {
            if !terminated {
                file.write_all(b"\n")?;
                offset += 1;
            }
            debug!("Marker found, data segment starts at {}", offset);
            return Ok(offset);
        }
    }

    if last_byte.map_or(false, |b| b != b'\n') {
        file.write_all(b"\n")?;
        offset += 1;
    }
    file.write_all(marker)?;
    file.write_all(b"\n")?;
    offset += marker.len() as u64 + 1;
    info!("No marker line in stream, appended one; data segment starts at {}", offset);
    Ok(offset)
}
