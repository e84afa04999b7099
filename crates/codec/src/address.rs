use std::{fmt, net::Ipv4Addr, str::FromStr};

use bytes::BytesMut;

use super::Error;

/// Canonical text size of an ip, `"192.168.000.001"`.
pub const IP_SIZE: usize = 15;

/// Canonical text size of a port, `"65000"`.
pub const PORT_SIZE: usize = 5;

/// Canonical text size of a full address.
pub const ADDRESS_SIZE: usize = IP_SIZE + PORT_SIZE;

/// The listening endpoint of a peer.
///
/// All routing, equality and hashing go through this type; the canonical
/// zero-padded text form only exists on the wire and in logs, and both
/// forms round-trip losslessly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address {
    pub ip: Ipv4Addr,
    pub port: u16,
}

impl Address {
    pub const fn new(ip: Ipv4Addr, port: u16) -> Self {
        Self { ip, port }
    }

    /// Parses the two boot tokens, `"192.168.000.001"` and `"05335"`.
    ///
    /// The ip must be exactly 15 characters of dotted three-digit octets
    /// and the port exactly 5 digits; octets outside 0..=255 and ports
    /// outside u16 are rejected.
    pub fn from_text_parts(ip: &str, port: &str) -> Result<Self, Error> {
        Ok(Self {
            ip: parse_ip(ip)?,
            port: parse_port(port)?,
        })
    }

    /// The canonical 20-character wire form.
    ///
    /// # Test
    ///
    /// ```
    /// use std::net::Ipv4Addr;
    ///
    /// use arbor_peer_codec::Address;
    ///
    /// let address = Address::new(Ipv4Addr::new(192, 168, 1, 1), 5335);
    ///
    /// assert_eq!(address.canonical(), "192.168.001.00105335");
    /// ```
    pub fn canonical(&self) -> String {
        let [a, b, c, d] = self.ip.octets();
        format!("{a:03}.{b:03}.{c:03}.{d:03}{:05}", self.port)
    }

    /// Appends the canonical form to an encode buffer.
    pub fn encode(&self, bytes: &mut BytesMut) {
        bytes.extend_from_slice(self.canonical().as_bytes());
    }

    /// Reads one canonical 20-character address from the front of `text`.
    pub fn decode(text: &str) -> Result<Self, Error> {
        if text.len() < ADDRESS_SIZE || !text.is_char_boundary(ADDRESS_SIZE) {
            return Err(Error::BadAddress);
        }

        Self::from_text_parts(&text[..IP_SIZE], &text[IP_SIZE..ADDRESS_SIZE])
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d] = self.ip.octets();
        write!(f, "{a:03}.{b:03}.{c:03}.{d:03}:{:05}", self.port)
    }
}

impl FromStr for Address {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let (ip, port) = value.split_once(':').ok_or(Error::BadAddress)?;
        Self::from_text_parts(ip, port)
    }
}

fn parse_ip(text: &str) -> Result<Ipv4Addr, Error> {
    if text.len() != IP_SIZE {
        return Err(Error::BadAddress);
    }

    let mut octets = [0u8; 4];
    let mut parts = text.split('.');
    for octet in octets.iter_mut() {
        let part = parts.next().ok_or(Error::BadAddress)?;
        if part.len() != 3 {
            return Err(Error::BadAddress);
        }

        *octet = part.parse().map_err(|_| Error::BadAddress)?;
    }

    if parts.next().is_some() {
        return Err(Error::BadAddress);
    }

    Ok(Ipv4Addr::from(octets))
}

fn parse_port(text: &str) -> Result<u16, Error> {
    if text.len() != PORT_SIZE || !text.bytes().all(|b| b.is_ascii_digit()) {
        return Err(Error::BadAddress);
    }

    text.parse().map_err(|_| Error::BadAddress)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_round_trip() {
        let address = Address::new(Ipv4Addr::new(10, 0, 0, 7), 80);

        assert_eq!(address.canonical(), "010.000.000.00700080");
        assert_eq!(Address::decode(&address.canonical()).unwrap(), address);
    }

    #[test]
    fn rejects_loose_forms() {
        assert!(Address::from_text_parts("192.168.1.1", "05335").is_err());
        assert!(Address::from_text_parts("192.168.001.001", "5335").is_err());
        assert!(Address::from_text_parts("192.168.001.999", "05335").is_err());
        assert!(Address::from_text_parts("192.168.00a.001", "05335").is_err());
        assert!(Address::from_text_parts("192.168.001.001", "99999").is_err());
        assert!(Address::from_text_parts("192.168.001.001", "0533x").is_err());
    }

    #[test]
    fn display_matches_boot_grammar() {
        let address: Address = "192.168.000.001:00001".parse().unwrap();

        assert_eq!(address.to_string(), "192.168.000.001:00001");
        assert_eq!(address.port, 1);
    }
}
