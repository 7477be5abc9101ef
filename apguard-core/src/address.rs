use core::fmt;
use core::str::FromStr;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Length of a link-layer address in octets
pub const ETH_ALEN: usize = 6;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AddressParseError {
    #[error("Expected {ETH_ALEN} octets, found {0}")]
    OctetCount(usize),

    #[error("Invalid octet `{0}`")]
    InvalidOctet(String),
}

/// 48-bit identifier of an access point radio.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Bssid([u8; ETH_ALEN]);

impl Bssid {
    pub const ZERO: Bssid = Bssid([0; ETH_ALEN]);
    pub const BROADCAST: Bssid = Bssid([0xff; ETH_ALEN]);

    pub const fn new(octets: [u8; ETH_ALEN]) -> Self {
        Self(octets)
    }

    pub const fn octets(&self) -> [u8; ETH_ALEN] {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0; ETH_ALEN]
    }

    /// Group bit set: multicast or broadcast.
    pub fn is_group(&self) -> bool {
        self.0[0] & 0x01 != 0
    }

    /// Whether this address may identify a single access point.
    pub fn is_unicast(&self) -> bool {
        !self.is_zero() && !self.is_group()
    }
}

impl From<[u8; ETH_ALEN]> for Bssid {
    fn from(octets: [u8; ETH_ALEN]) -> Self {
        Self(octets)
    }
}

impl fmt::Display for Bssid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02x}:{b:02x}:{c:02x}:{d:02x}:{e:02x}:{g:02x}")
    }
}

impl fmt::Debug for Bssid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl FromStr for Bssid {
    type Err = AddressParseError;

    /// Accepts `aa:bb:cc:dd:ee:ff` or `aa-bb-cc-dd-ee-ff`, case-insensitive.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.trim().split([':', '-']).collect();
        if parts.len() != ETH_ALEN {
            return Err(AddressParseError::OctetCount(parts.len()));
        }

        let mut octets = [0u8; ETH_ALEN];
        for (octet, part) in octets.iter_mut().zip(parts) {
            if part.len() != 2 || !part.bytes().all(|byte| byte.is_ascii_hexdigit()) {
                return Err(AddressParseError::InvalidOctet(part.to_string()));
            }
            *octet = u8::from_str_radix(part, 16)
                .map_err(|_| AddressParseError::InvalidOctet(part.to_string()))?;
        }

        Ok(Self(octets))
    }
}

impl Serialize for Bssid {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Bssid {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_display() {
        let bssid: Bssid = "AA:bb:0c:00:Ee:01".parse().unwrap();
        assert_eq!(bssid.octets(), [0xaa, 0xbb, 0x0c, 0x00, 0xee, 0x01]);
        assert_eq!(bssid.to_string(), "aa:bb:0c:00:ee:01");

        let dashed: Bssid = "aa-bb-0c-00-ee-01".parse().unwrap();
        assert_eq!(dashed, bssid);
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(
            "aa:bb:cc".parse::<Bssid>(),
            Err(AddressParseError::OctetCount(3))
        );
        assert_eq!(
            "aa:bb:cc:dd:ee:zz".parse::<Bssid>(),
            Err(AddressParseError::InvalidOctet("zz".to_string()))
        );
        assert_eq!(
            "aa:bb:cc:dd:ee:1".parse::<Bssid>(),
            Err(AddressParseError::InvalidOctet("1".to_string()))
        );
    }

    #[test]
    fn test_unicast_check() {
        assert!(!Bssid::ZERO.is_unicast());
        assert!(!Bssid::BROADCAST.is_unicast());
        assert!(Bssid::BROADCAST.is_group());
        assert!(!Bssid::new([0x01, 0x00, 0x5e, 0x00, 0x00, 0x01]).is_unicast());
        assert!(Bssid::new([0x02, 0x11, 0x22, 0x33, 0x44, 0x55]).is_unicast());
    }

    #[test]
    fn test_serde_as_string() {
        let bssid = Bssid::new([0x10, 0x20, 0x30, 0x40, 0x50, 0x60]);
        let json = serde_json::to_string(&bssid).unwrap();
        assert_eq!(json, "\"10:20:30:40:50:60\"");

        let back: Bssid = serde_json::from_str(&json).unwrap();
        assert_eq!(back, bssid);

        assert!(serde_json::from_str::<Bssid>("\"not-an-address\"").is_err());
    }
}
