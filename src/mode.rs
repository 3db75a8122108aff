use std::str::FromStr;

/// What happens to the data segment right after it has been located.
///
/// The underlying stream is always opened for both reading and writing; the mode only
/// picks the starting state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Start at the beginning of the segment.
    Read,
    /// Empty the segment.
    Write,
    /// Start at the end of the segment.
    Append,
}

impl Default for Mode {
    fn default() -> Mode {
        Mode::Read
    }
}

/// Parses conventional mode strings: a leading `w` means `Write`, a leading `a` means
/// `Append`, anything else (`"r"`, `"r+"`, `""`, ...) means `Read`.
impl FromStr for Mode {
    type Err = std::convert::Infallible;
    fn from_str(s: &str) -> Result<Mode, Self::Err> {
        Ok(if s.starts_with('w') {
            Mode::Write
        } else if s.starts_with('a') {
            Mode::Append
        } else {
            Mode::Read
        })
    }
}
