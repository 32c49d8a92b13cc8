//! Gentoo-style package versions
//!
//! Versions look like `1.2.3b_rc1_p2-r4`: dotted numeric components, an
//! optional letter, any number of suffixes and an optional revision.
//!
//! Numeric components are kept as written. The first one compares as an
//! integer. Later ones compare as integers unless either side has a leading
//! zero, in which case trailing zeros are dropped and they compare as
//! strings, so `1.01 < 1.1` and `1.01 == 1.010`.

use crate::{ConfigError, Result};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Version suffix kinds, ordered from lowest to highest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Suffix {
    Alpha,
    Beta,
    Pre,
    Rc,
    P,
}

impl Suffix {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "alpha" => Some(Suffix::Alpha),
            "beta" => Some(Suffix::Beta),
            "pre" => Some(Suffix::Pre),
            "rc" => Some(Suffix::Rc),
            "p" => Some(Suffix::P),
            _ => None,
        }
    }

    fn as_str(&self) -> &'static str {
        match self {
            Suffix::Alpha => "alpha",
            Suffix::Beta => "beta",
            Suffix::Pre => "pre",
            Suffix::Rc => "rc",
            Suffix::P => "p",
        }
    }
}

/// A parsed package version
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Version {
    /// Numeric components as written (e.g., ["1", "02", "3"])
    pub numbers: Vec<String>,
    /// Optional trailing letter (e.g., `b` in `1.2b`)
    pub letter: Option<char>,
    /// Suffixes with their numbers (e.g., `_rc1`)
    pub suffixes: Vec<(Suffix, u64)>,
    /// Revision (`-rN`), zero when absent
    pub revision: u64,
}

impl Version {
    /// Compare ignoring the revision, as the `~` atom operator does
    pub fn eq_without_revision(&self, other: &Version) -> bool {
        let mut a = self.clone();
        let mut b = other.clone();
        a.revision = 0;
        b.revision = 0;
        a == b
    }

    fn compare_suffixes(&self, other: &Version) -> Ordering {
        let len = self.suffixes.len().max(other.suffixes.len());
        for i in 0..len {
            match (self.suffixes.get(i), other.suffixes.get(i)) {
                (Some(a), Some(b)) => match a.cmp(b) {
                    Ordering::Equal => continue,
                    ord => return ord,
                },
                // A missing suffix sorts above everything but _p
                (Some((s, _)), None) => {
                    return if *s == Suffix::P {
                        Ordering::Greater
                    } else {
                        Ordering::Less
                    };
                }
                (None, Some((s, _))) => {
                    return if *s == Suffix::P {
                        Ordering::Less
                    } else {
                        Ordering::Greater
                    };
                }
                (None, None) => break,
            }
        }
        Ordering::Equal
    }
}

impl FromStr for Version {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || ConfigError::Invalid(format!("invalid version: {}", s));

        let (main, revision) = match s.rfind("-r") {
            Some(idx) => {
                let rev = s[idx + 2..].parse::<u64>().map_err(|_| invalid())?;
                (&s[..idx], rev)
            }
            None => (s, 0),
        };

        let mut parts = main.split('_');
        let head = parts.next().filter(|h| !h.is_empty()).ok_or_else(invalid)?;

        let (head, letter) = match head.chars().last() {
            Some(c) if c.is_ascii_lowercase() => (&head[..head.len() - 1], Some(c)),
            _ => (head, None),
        };

        let numbers = head
            .split('.')
            .map(|n| {
                if !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()) {
                    Ok(n.to_string())
                } else {
                    Err(invalid())
                }
            })
            .collect::<Result<Vec<_>>>()?;

        let mut suffixes = Vec::new();
        for part in parts {
            let split = part
                .find(|c: char| c.is_ascii_digit())
                .unwrap_or(part.len());
            let kind = Suffix::parse(&part[..split]).ok_or_else(invalid)?;
            let num = if split == part.len() {
                0
            } else {
                part[split..].parse::<u64>().map_err(|_| invalid())?
            };
            suffixes.push((kind, num));
        }

        Ok(Version {
            numbers,
            letter,
            suffixes,
            revision,
        })
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Version {}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        let len = self.numbers.len().max(other.numbers.len());
        for i in 0..len {
            match (self.numbers.get(i), other.numbers.get(i)) {
                (Some(a), Some(b)) => match compare_component(i, a, b) {
                    Ordering::Equal => continue,
                    ord => return ord,
                },
                (Some(_), None) => return Ordering::Greater,
                (None, Some(_)) => return Ordering::Less,
                (None, None) => break,
            }
        }

        self.letter
            .cmp(&other.letter)
            .then_with(|| self.compare_suffixes(other))
            .then_with(|| self.revision.cmp(&other.revision))
    }
}

/// Compare the `index`th numeric component of two versions
fn compare_component(index: usize, a: &str, b: &str) -> Ordering {
    if index > 0 && (a.starts_with('0') || b.starts_with('0')) {
        return a.trim_end_matches('0').cmp(b.trim_end_matches('0'));
    }
    compare_integers(a, b)
}

/// Compare digit strings by value without overflowing
fn compare_integers(a: &str, b: &str) -> Ordering {
    let a = a.trim_start_matches('0');
    let b = b.trim_start_matches('0');
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.numbers.join("."))?;
        if let Some(letter) = self.letter {
            write!(f, "{}", letter)?;
        }
        for (suffix, num) in &self.suffixes {
            write!(f, "_{}", suffix.as_str())?;
            if *num > 0 {
                write!(f, "{}", num)?;
            }
        }
        if self.revision > 0 {
            write!(f, "-r{}", self.revision)?;
        }
        Ok(())
    }
}
