use std::fmt;
use std::str::FromStr;

use crate::DecodeError;

/// IEEE 802 MAC-48 hardware address.
///
/// Its text form is six colon separated hex octets (`52:54:00:12:34:56`);
/// hyphens are accepted as separators when parsing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub struct MacAddress(pub [u8; 6]);

impl MacAddress {
    pub fn new(octets: [u8; 6]) -> MacAddress {
        MacAddress(octets)
    }

    pub fn octets(&self) -> [u8; 6] {
        self.0
    }

    /// A locally administered address has bit 1 of the first octet set.
    pub fn is_local(&self) -> bool {
        self.0[0] & 0x02 != 0
    }
}

impl FromStr for MacAddress {
    type Err = DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || DecodeError::InvalidMacAddress(s.to_string());
        let separator = if s.contains('-') { '-' } else { ':' };

        let mut octets = [0u8; 6];
        let mut parts = s.split(separator);
        for octet in octets.iter_mut() {
            let part = parts.next().ok_or_else(invalid)?;
            if part.len() != 2 || !part.bytes().all(|b| b.is_ascii_hexdigit()) {
                return Err(invalid());
            }
            *octet = u8::from_str_radix(part, 16).map_err(|_| invalid())?;
        }
        if parts.next().is_some() {
            return Err(invalid());
        }
        Ok(MacAddress(octets))
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            a, b, c, d, e, g
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_and_format() {
        let mac: MacAddress = "52:54:00:AB:cd:01".parse().unwrap();
        assert_eq!(mac.octets(), [0x52, 0x54, 0x00, 0xab, 0xcd, 0x01]);
        assert_eq!(mac.to_string(), "52:54:00:ab:cd:01");
    }

    #[test]
    fn parse_hyphenated() {
        let mac: MacAddress = "02-00-00-00-00-01".parse().unwrap();
        assert!(mac.is_local());
    }

    #[test]
    fn reject_malformed() {
        for input in [
            "",
            "52:54:00:ab:cd",
            "52:54:00:ab:cd:01:02",
            "52:54:00:ab:cd:zz",
            "525:4:00:ab:cd:01",
            "52:54-00:ab:cd:01",
            "+2:54:00:ab:cd:01",
        ] {
            assert!(
                matches!(input.parse::<MacAddress>(), Err(DecodeError::InvalidMacAddress(_))),
                "{input} should not parse"
            );
        }
    }
}
