//! Human-readable byte counts.

use std::fmt;
use std::str::FromStr;

use super::FormatError;

/// How sizes are displayed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SizeFormat {
    /// Powers of 1024: `KiB`, `MiB`, ...
    #[default]
    Iec,
    /// Powers of 1000: `KB`, `MB`, ...
    Iso,
    /// The exact byte count.
    Bytes,
}

impl FromStr for SizeFormat {
    type Err = FormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "iec" => Ok(SizeFormat::Iec),
            "iso" => Ok(SizeFormat::Iso),
            "bytes" => Ok(SizeFormat::Bytes),
            _ => Err(FormatError::UnknownSizeFormat(s.to_string())),
        }
    }
}

impl fmt::Display for SizeFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SizeFormat::Iec => "iec",
            SizeFormat::Iso => "iso",
            SizeFormat::Bytes => "bytes",
        })
    }
}

const ORDERS: [&str; 6] = ["K", "M", "G", "T", "P", "E"];

/// Render `size` bytes.
///
/// Scaled values of 100 or more are rounded to an integer, smaller ones keep
/// one decimal. With `short`, the `iB`/`B` tail after the order letter is
/// dropped (`1.5K` instead of `1.5KiB`); plain byte counts always end in `B`.
pub fn render_size(size: u64, format: SizeFormat, short: bool) -> String {
    let (base, tail) = match format {
        SizeFormat::Bytes => return size.to_string(),
        SizeFormat::Iec => (1024.0, "iB"),
        SizeFormat::Iso => (1000.0, "B"),
    };

    let mut n = size as f64;
    let mut order = None;
    for o in ORDERS {
        if n < base {
            break;
        }
        n /= base;
        order = Some(o);
    }

    let rendered = if n >= 100.0 {
        format!("{}", n.round())
    } else {
        format!("{:.1}", n)
    };
    match order {
        None => format!("{}B", rendered),
        Some(o) if short => format!("{}{}", rendered, o),
        Some(o) => format!("{}{}{}", rendered, o, tail),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_iec() {
        assert_eq!(render_size(0, SizeFormat::Iec, false), "0.0B");
        assert_eq!(render_size(999, SizeFormat::Iec, false), "999B");
        assert_eq!(render_size(1024, SizeFormat::Iec, false), "1.0KiB");
        assert_eq!(render_size(1536, SizeFormat::Iec, true), "1.5K");
        assert_eq!(render_size(200 * 1024 * 1024, SizeFormat::Iec, false), "200MiB");
        assert_eq!(render_size(u64::MAX, SizeFormat::Iec, false), "16.0EiB");
    }

    #[test]
    fn test_iso() {
        assert_eq!(render_size(1000, SizeFormat::Iso, false), "1.0KB");
        assert_eq!(render_size(38, SizeFormat::Iso, false), "38.0B");
        assert_eq!(render_size(123_456_789, SizeFormat::Iso, true), "123M");
    }

    #[test]
    fn test_bytes() {
        assert_eq!(render_size(123_456_789, SizeFormat::Bytes, false), "123456789");
    }

    #[test]
    fn test_parse() {
        assert_eq!("IEC".parse::<SizeFormat>().unwrap(), SizeFormat::Iec);
        assert_eq!("bytes".parse::<SizeFormat>().unwrap(), SizeFormat::Bytes);
        assert!("kb".parse::<SizeFormat>().is_err());
    }
}
