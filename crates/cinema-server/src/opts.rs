//! Command line options.

use std::collections::HashSet;
use std::path::PathBuf;

use eyre::{bail, eyre, Result, WrapErr};

/// Smallest accepted reservation timeout, in seconds.
pub const MIN_TIMEOUT: u64 = 1;
/// Largest accepted reservation timeout: one day, in seconds.
pub const MAX_TIMEOUT: u64 = 86_400;
/// Timeout used when `-t` is not given.
pub const DFLT_TIMEOUT: u64 = 5;
/// Port used when `-p` is not given.
pub const DFLT_PORT: u16 = 2022;

/// Parsed command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Opts {
    /// UDP port to listen on.
    pub port: u16,
    /// Reservation lifetime in seconds.
    pub timeout: u64,
    /// Path of the event catalog file.
    pub catalog: PathBuf,
}

impl Opts {
    /// Parses `-X value` pairs from the given tokens (without the
    /// program name).
    ///
    /// Recognized flags are exactly `-p` (port), `-t` (timeout) and
    /// `-f` (catalog path, required). A repeated or unknown flag, a
    /// flag without a value, or an out-of-range value is a startup
    /// error.
    ///
    /// # Errors
    ///
    /// Returns a report naming the offending flag or value.
    pub fn from_args(args: impl IntoIterator<Item = String>) -> Result<Self> {
        let mut port = DFLT_PORT;
        let mut timeout = DFLT_TIMEOUT;
        let mut catalog: Option<PathBuf> = None;
        let mut seen = HashSet::new();

        let mut args = args.into_iter();
        while let Some(flag) = args.next() {
            if !matches!(flag.as_str(), "-p" | "-t" | "-f") {
                bail!("unknown flag {flag}");
            }
            if !seen.insert(flag.clone()) {
                bail!("flag {flag} given more than once");
            }
            let value = args
                .next()
                .ok_or_else(|| eyre!("no value for flag {flag}"))?;
            match flag.as_str() {
                "-p" => {
                    port = value
                        .parse()
                        .wrap_err_with(|| format!("-p takes a port number, got {value:?}"))?;
                }
                "-t" => {
                    timeout = value
                        .parse()
                        .ok()
                        .filter(|t| (MIN_TIMEOUT..=MAX_TIMEOUT).contains(t))
                        .ok_or_else(|| {
                            eyre!("-t takes a timeout in seconds ({MIN_TIMEOUT}-{MAX_TIMEOUT}), got {value:?}")
                        })?;
                }
                "-f" => catalog = Some(PathBuf::from(value)),
                _ => unreachable!("flag set checked above"),
            }
        }

        let catalog = catalog.ok_or_else(|| eyre!("flag -f is required"))?;
        Ok(Self {
            port,
            timeout,
            catalog,
        })
    }
}
