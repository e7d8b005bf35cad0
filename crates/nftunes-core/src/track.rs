use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Position of a track in its catalog.  For chain catalogs this is the
/// contract index, so it doubles as the `buyTrack` / `canAccess` argument.
pub type TrackId = u64;

const WEI_PER_ETHER: u128 = 1_000_000_000_000_000_000;
const ETHER_DECIMALS: usize = 18;

/// An amount in the chain's smallest unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Wei(pub u128);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseWeiError {
    #[error("empty amount")]
    Empty,
    #[error("invalid digit in amount: {0:?}")]
    InvalidDigit(String),
    #[error("more than 18 decimal places: {0:?}")]
    TooPrecise(String),
    #[error("amount overflows: {0:?}")]
    Overflow(String),
}

impl Wei {
    pub const ZERO: Wei = Wei(0);

    /// Human readable ether amount: "0.01", "0.025", "1.0".
    pub fn format_ether(self) -> String {
        let whole = self.0 / WEI_PER_ETHER;
        let frac = self.0 % WEI_PER_ETHER;
        if frac == 0 {
            return format!("{}.0", whole);
        }
        let digits = format!("{:0width$}", frac, width = ETHER_DECIMALS);
        format!("{}.{}", whole, digits.trim_end_matches('0'))
    }

    /// Parse a decimal ether string ("0.015", "2", ".5") into wei.
    pub fn parse_ether(s: &str) -> Result<Self, ParseWeiError> {
        let s = s.trim();
        if s.is_empty() {
            return Err(ParseWeiError::Empty);
        }
        let (whole, frac) = match s.split_once('.') {
            Some((w, f)) => (w, f),
            None => (s, ""),
        };
        if whole.is_empty() && frac.is_empty() {
            return Err(ParseWeiError::Empty);
        }
        if !whole.chars().chain(frac.chars()).all(|c| c.is_ascii_digit()) {
            return Err(ParseWeiError::InvalidDigit(s.to_string()));
        }
        if frac.len() > ETHER_DECIMALS {
            return Err(ParseWeiError::TooPrecise(s.to_string()));
        }

        let overflow = || ParseWeiError::Overflow(s.to_string());
        let whole: u128 = if whole.is_empty() {
            0
        } else {
            whole.parse().map_err(|_| overflow())?
        };
        let frac_padded = format!("{:0<width$}", frac, width = ETHER_DECIMALS);
        let frac: u128 = frac_padded.parse().map_err(|_| overflow())?;

        whole
            .checked_mul(WEI_PER_ETHER)
            .and_then(|w| w.checked_add(frac))
            .map(Wei)
            .ok_or_else(overflow)
    }

    /// Minimal big-endian hex quantity as used by JSON-RPC ("0x0", "0x2386f26fc10000").
    pub fn to_quantity(self) -> String {
        format!("{:#x}", self.0)
    }
}

impl fmt::Display for Wei {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ETH", self.format_ether())
    }
}

impl FromStr for Wei {
    type Err = ParseWeiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Wei::parse_ether(s)
    }
}

/// A purchasable song.  `unlocked` is relative to the active account and is
/// cleared whenever the account changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Track {
    pub id: TrackId,
    pub title: String,
    pub artist: String,
    pub audio_src: String,
    pub image_src: String,
    pub price: Wei,
    #[serde(default)]
    pub unlocked: bool,
}

impl Track {
    /// Case-insensitive substring match on title or artist.  An empty or
    /// whitespace-only term matches everything.
    pub fn matches(&self, term: &str) -> bool {
        let term = term.trim().to_lowercase();
        if term.is_empty() {
            return true;
        }
        self.title.to_lowercase().contains(&term) || self.artist.to_lowercase().contains(&term)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_ether() {
        assert_eq!(Wei(10_000_000_000_000_000).format_ether(), "0.01");
        assert_eq!(Wei(25_000_000_000_000_000).format_ether(), "0.025");
        assert_eq!(Wei(WEI_PER_ETHER).format_ether(), "1.0");
        assert_eq!(Wei(0).format_ether(), "0.0");
        assert_eq!(Wei(1).format_ether(), "0.000000000000000001");
    }

    #[test]
    fn test_parse_ether() {
        assert_eq!(Wei::parse_ether("0.015").unwrap(), Wei(15_000_000_000_000_000));
        assert_eq!(Wei::parse_ether("2").unwrap(), Wei(2 * WEI_PER_ETHER));
        assert_eq!(Wei::parse_ether(".5").unwrap(), Wei(WEI_PER_ETHER / 2));
        assert!(matches!(Wei::parse_ether(""), Err(ParseWeiError::Empty)));
        assert!(matches!(Wei::parse_ether("."), Err(ParseWeiError::Empty)));
        assert!(matches!(Wei::parse_ether("1.2.3"), Err(ParseWeiError::InvalidDigit(_))));
        assert!(matches!(Wei::parse_ether("-1"), Err(ParseWeiError::InvalidDigit(_))));
        assert!(matches!(
            Wei::parse_ether("0.0000000000000000001"),
            Err(ParseWeiError::TooPrecise(_))
        ));
    }

    #[test]
    fn test_quantity() {
        assert_eq!(Wei(0).to_quantity(), "0x0");
        assert_eq!(Wei(10_000_000_000_000_000).to_quantity(), "0x2386f26fc10000");
    }

    #[test]
    fn test_track_matches() {
        let t = Track {
            id: 1,
            title: "Tailor Swif".into(),
            artist: "A$AP Rocky".into(),
            audio_src: String::new(),
            image_src: String::new(),
            price: Wei::ZERO,
            unlocked: false,
        };
        assert!(t.matches("SWIF"));
        assert!(t.matches("rocky"));
        assert!(t.matches("  "));
        assert!(!t.matches("kendrick"));
    }
}
