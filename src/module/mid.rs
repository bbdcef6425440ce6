//! Typed component IDs and their serial-number generator.
//!
//! A [`Mid`] prints as `L<sn>` or `L<sn>|<addr>` where `L` is the type
//! letter (`D`/`A`/`P`), `sn` a serial number, and `addr` an optional
//! `host:port`. Parsing and formatting round-trip exactly.

use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};

use once_cell::sync::Lazy;

use crate::error::{Error, Result};
use crate::module::ModuleType;

/// Identifier of a registered module.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Mid {
    mtype: ModuleType,
    sn: u64,
    addr: Option<SocketAddr>,
}

impl Mid {
    pub fn new(mtype: ModuleType, sn: u64, addr: Option<SocketAddr>) -> Self {
        Mid { mtype, sn, addr }
    }

    /// Creates an ID with a serial number drawn from the process-wide
    /// generator.
    pub fn generate(mtype: ModuleType, addr: Option<SocketAddr>) -> Self {
        Mid::new(mtype, default_sn_gen().next(), addr)
    }

    pub fn module_type(&self) -> ModuleType {
        self.mtype
    }

    pub fn sn(&self) -> u64 {
        self.sn
    }

    pub fn addr(&self) -> Option<SocketAddr> {
        self.addr
    }
}

impl fmt::Display for Mid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.addr {
            Some(addr) => write!(f, "{}{}|{}", self.mtype.letter(), self.sn, addr),
            None => write!(f, "{}{}", self.mtype.letter(), self.sn),
        }
    }
}

impl FromStr for Mid {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        if s.len() <= 1 {
            return Err(Error::illegal_parameter(format!("MID is too short: {s:?}")));
        }
        let letter = s.chars().next().ok_or_else(|| {
            Error::illegal_parameter(format!("MID is too short: {s:?}"))
        })?;
        let mtype = ModuleType::from_letter(letter).ok_or_else(|| {
            Error::illegal_parameter(format!("MID type letter is invalid: {letter}"))
        })?;
        let rest = &s[letter.len_utf8()..];
        let (sn_str, addr_str) = match rest.rfind('|') {
            Some(idx) => (&rest[..idx], Some(&rest[idx + 1..])),
            None => (rest, None),
        };
        let sn = sn_str
            .parse::<u64>()
            .map_err(|_| Error::illegal_parameter(format!("MID serial number is invalid: {sn_str}")))?;
        let addr = match addr_str {
            // A trailing separator with an empty or malformed address is
            // illegal; addresses must be `ip:port`.
            Some(a) => Some(a.parse::<SocketAddr>().map_err(|_| {
                Error::illegal_parameter(format!("MID address is invalid: {a:?}"))
            })?),
            None => None,
        };
        Ok(Mid { mtype, sn, addr })
    }
}

/// Cyclic serial-number generator. Yields strictly increasing values and
/// wraps from `max` back to `start`.
pub struct SerialGen {
    start: u64,
    max: u64,
    next: AtomicU64,
    cycles: AtomicU64,
}

impl SerialGen {
    /// Creates a generator over `[start, max]`. `start` must be below
    /// `max`.
    pub fn new(start: u64, max: u64) -> Result<Self> {
        if start >= max {
            return Err(Error::illegal_parameter(format!(
                "serial range is invalid: [{start}, {max}]"
            )));
        }
        Ok(SerialGen {
            start,
            max,
            next: AtomicU64::new(start),
            cycles: AtomicU64::new(0),
        })
    }

    pub fn start(&self) -> u64 {
        self.start
    }

    pub fn max(&self) -> u64 {
        self.max
    }

    /// Number of completed wraparounds.
    pub fn cycle_count(&self) -> u64 {
        self.cycles.load(Ordering::Acquire)
    }

    /// The next serial number.
    pub fn next(&self) -> u64 {
        let issued = self
            .next
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                Some(if n >= self.max { self.start } else { n + 1 })
            })
            .unwrap_or(self.start);
        if issued >= self.max {
            self.cycles.fetch_add(1, Ordering::AcqRel);
        }
        issued
    }
}

/// The process-wide generator used by [`Mid::generate`].
pub fn default_sn_gen() -> &'static SerialGen {
    static GEN: Lazy<SerialGen> = Lazy::new(|| SerialGen {
        start: 1,
        max: u64::MAX,
        next: AtomicU64::new(1),
        cycles: AtomicU64::new(0),
    });
    &GEN
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;

    #[test]
    fn format_with_address() {
        let mid = Mid::new(
            ModuleType::Downloader,
            7,
            Some("127.0.0.1:80".parse().unwrap()),
        );
        assert_eq!(mid.to_string(), "D7|127.0.0.1:80");
    }

    #[test]
    fn format_without_address() {
        let mid = Mid::new(ModuleType::Pipeline, 5, None);
        assert_eq!(mid.to_string(), "P5");
    }

    #[test]
    fn parse_without_address() {
        let mid: Mid = "P5".parse().unwrap();
        assert_eq!(mid.module_type(), ModuleType::Pipeline);
        assert_eq!(mid.sn(), 5);
        assert_eq!(mid.addr(), None);
    }

    #[test]
    fn round_trip() {
        for s in ["D7|127.0.0.1:80", "A42|10.0.0.3:9090", "P5", "D1"] {
            let mid: Mid = s.parse().unwrap();
            assert_eq!(mid.to_string(), s);
        }
    }

    #[test]
    fn rejects_illegal_inputs() {
        for s in [
            "",          // empty
            "D",         // missing serial
            "X7",        // unknown type letter
            "Dx",        // non-numeric serial
            "A42|",      // trailing separator, empty address
            "D1|nohost", // address without port
            "D1|foo:80", // non-IP host
            "D1|127.0.0.1:notaport",
        ] {
            assert!(s.parse::<Mid>().is_err(), "expected rejection of {s:?}");
        }
    }

    #[test]
    fn serial_gen_is_monotonic_then_wraps() {
        let sn = SerialGen::new(1, 3).unwrap();
        assert_eq!(sn.next(), 1);
        assert_eq!(sn.next(), 2);
        assert_eq!(sn.next(), 3);
        assert_eq!(sn.cycle_count(), 1);
        assert_eq!(sn.next(), 1);
    }

    #[test]
    fn serial_gen_rejects_bad_range() {
        assert!(SerialGen::new(5, 5).is_err());
        assert!(SerialGen::new(6, 5).is_err());
    }

    #[test]
    fn serial_gen_unique_under_contention() {
        let sn = Arc::new(SerialGen::new(1, u64::MAX).unwrap());
        let mut handles = Vec::new();
        for _ in 0..4 {
            let sn = Arc::clone(&sn);
            handles.push(std::thread::spawn(move || {
                (0..500).map(|_| sn.next()).collect::<Vec<_>>()
            }));
        }
        let mut all = HashSet::new();
        for h in handles {
            for v in h.join().unwrap() {
                assert!(all.insert(v), "duplicate serial {v}");
            }
        }
        assert_eq!(all.len(), 2000);
    }

    #[test]
    fn generate_uses_process_wide_generator() {
        let a = Mid::generate(ModuleType::Downloader, None);
        let b = Mid::generate(ModuleType::Downloader, None);
        assert!(b.sn() > a.sn());
    }
}
