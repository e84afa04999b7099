use bytes::{BufMut, BytesMut};
use num_enum::TryFromPrimitive;

use super::{
    Error, HEADER_SIZE, VERSION,
    address::{ADDRESS_SIZE, Address},
};

/// The wire discriminant of a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, TryFromPrimitive)]
#[repr(u16)]
pub enum PacketKind {
    Register = 1,
    Advertise = 2,
    Join = 3,
    Message = 4,
    Reunion = 5,
}

/// Reunion paths carry a two-digit hop counter, and the tree is at most
/// eight levels deep anyway.
pub const MAX_PATH_ENTRIES: usize = 99;

/// Typed view of a frame body.
///
/// Register and advertise requests only ever travel from a client to the
/// root over its register link; join, message and reunion frames travel
/// between tree neighbors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    /// `"REQ" + ip + port`, the registrant's own listening address.
    RegisterReq { address: Address },
    /// `"RESACK"`.
    RegisterRes,
    /// `"REQ"`.
    AdvertiseReq,
    /// `"RES" + ip + port`, the assigned parent.
    AdvertiseRes { neighbor: Address },
    /// `"JOIN"`.
    Join,
    /// Raw UTF-8 broadcast text.
    Message { text: String },
    /// `"REQ" + nn + path`, originator first, grown one entry per hop.
    ReunionHello { path: Vec<Address> },
    /// `"RES" + nn + path`, next hop first, originator last.
    ReunionHelloBack { path: Vec<Address> },
}

impl Payload {
    pub fn kind(&self) -> PacketKind {
        match self {
            Self::RegisterReq { .. } | Self::RegisterRes => PacketKind::Register,
            Self::AdvertiseReq | Self::AdvertiseRes { .. } => PacketKind::Advertise,
            Self::Join => PacketKind::Join,
            Self::Message { .. } => PacketKind::Message,
            Self::ReunionHello { .. } | Self::ReunionHelloBack { .. } => PacketKind::Reunion,
        }
    }

    fn encode_body(&self) -> String {
        match self {
            Self::RegisterReq { address } => format!("REQ{}", address.canonical()),
            Self::RegisterRes => "RESACK".to_string(),
            Self::AdvertiseReq => "REQ".to_string(),
            Self::AdvertiseRes { neighbor } => format!("RES{}", neighbor.canonical()),
            Self::Join => "JOIN".to_string(),
            Self::Message { text } => text.clone(),
            Self::ReunionHello { path } => encode_path("REQ", path),
            Self::ReunionHelloBack { path } => encode_path("RES", path),
        }
    }

    fn decode_body(kind: PacketKind, body: &str) -> Result<Self, Error> {
        if kind != PacketKind::Message && !body.is_ascii() {
            return Err(Error::BadBody);
        }

        Ok(match kind {
            PacketKind::Register => {
                if body == "RESACK" {
                    Self::RegisterRes
                } else if body.len() == 3 + ADDRESS_SIZE && body.starts_with("REQ") {
                    Self::RegisterReq {
                        address: Address::decode(&body[3..])?,
                    }
                } else {
                    return Err(Error::BadBody);
                }
            }
            PacketKind::Advertise => {
                if body == "REQ" {
                    Self::AdvertiseReq
                } else if body.len() == 3 + ADDRESS_SIZE && body.starts_with("RES") {
                    Self::AdvertiseRes {
                        neighbor: Address::decode(&body[3..])?,
                    }
                } else {
                    return Err(Error::BadBody);
                }
            }
            PacketKind::Join => {
                if body != "JOIN" {
                    return Err(Error::BadBody);
                }

                Self::Join
            }
            PacketKind::Message => Self::Message {
                text: body.to_string(),
            },
            PacketKind::Reunion => {
                let path = decode_path(body)?;
                if body.starts_with("REQ") {
                    Self::ReunionHello { path }
                } else {
                    Self::ReunionHelloBack { path }
                }
            }
        })
    }
}

/// A decoded frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub version: u16,
    pub source: Address,
    pub payload: Payload,
}

impl Packet {
    pub fn new(source: Address, payload: Payload) -> Self {
        Self {
            version: VERSION,
            source,
            payload,
        }
    }

    /// Encodes the frame, header first. The length field is derived from
    /// the body, so the two can never disagree on this side of the wire.
    ///
    /// # Test
    ///
    /// ```
    /// use bytes::BytesMut;
    /// use arbor_peer_codec::{Address, Packet, Payload};
    ///
    /// let packet = Packet::new(
    ///     "192.168.001.001:65000".parse().unwrap(),
    ///     Payload::Message {
    ///         text: "Hello World!".to_string(),
    ///     },
    /// );
    ///
    /// let mut bytes = BytesMut::with_capacity(64);
    /// packet.encode(&mut bytes);
    ///
    /// assert_eq!(
    ///     &bytes[..],
    ///     &b"\x00\x01\x00\x04\x00\x00\x00\x0c\
    ///        \x00\xc0\x00\xa8\x00\x01\x00\x01\
    ///        \x00\x00\xfd\xe8Hello World!"[..],
    /// );
    /// ```
    pub fn encode(&self, bytes: &mut BytesMut) {
        let body = self.payload.encode_body();

        bytes.clear();
        bytes.put_u16(self.version);
        bytes.put_u16(self.payload.kind() as u16);
        bytes.put_u32(body.len() as u32);
        for octet in self.source.ip.octets() {
            bytes.put_u16(octet as u16);
        }
        bytes.put_u32(self.source.port as u32);
        bytes.extend_from_slice(body.as_bytes());
    }

    /// Decodes one complete frame.
    ///
    /// # Test
    ///
    /// ```
    /// use arbor_peer_codec::{Packet, Payload};
    ///
    /// let frame = b"\x00\x01\x00\x03\x00\x00\x00\x04\
    ///               \x00\x0a\x00\x00\x00\x00\x00\x07\
    ///               \x00\x00\x00\x50JOIN";
    ///
    /// let packet = Packet::decode(frame).unwrap();
    ///
    /// assert_eq!(packet.payload, Payload::Join);
    /// assert_eq!(packet.source, "010.000.000.007:00080".parse().unwrap());
    /// ```
    pub fn decode(bytes: &[u8]) -> Result<Self, Error> {
        if bytes.len() < HEADER_SIZE {
            return Err(Error::InvalidInput);
        }

        let version = u16::from_be_bytes(bytes[0..2].try_into()?);
        let kind = PacketKind::try_from(u16::from_be_bytes(bytes[2..4].try_into()?))
            .map_err(|_| Error::UnknownKind)?;

        let length = u32::from_be_bytes(bytes[4..8].try_into()?) as usize;
        if bytes.len() - HEADER_SIZE != length {
            return Err(Error::LengthMismatch);
        }

        let mut octets = [0u8; 4];
        for (i, octet) in octets.iter_mut().enumerate() {
            let wide = u16::from_be_bytes(bytes[8 + i * 2..10 + i * 2].try_into()?);
            *octet = u8::try_from(wide).map_err(|_| Error::BadAddress)?;
        }

        let port = u32::from_be_bytes(bytes[16..20].try_into()?);
        let source = Address::new(
            octets.into(),
            u16::try_from(port).map_err(|_| Error::BadAddress)?,
        );

        let body = std::str::from_utf8(&bytes[HEADER_SIZE..])?;

        Ok(Self {
            version,
            source,
            payload: Payload::decode_body(kind, body)?,
        })
    }
}

fn encode_path(prefix: &str, path: &[Address]) -> String {
    let mut body = String::with_capacity(5 + path.len() * ADDRESS_SIZE);
    body.push_str(prefix);
    body.push_str(&format!("{:02}", path.len()));
    for address in path {
        body.push_str(&address.canonical());
    }

    body
}

fn decode_path(body: &str) -> Result<Vec<Address>, Error> {
    if body.len() < 5 || !(body.starts_with("REQ") || body.starts_with("RES")) {
        return Err(Error::BadBody);
    }

    let entries: usize = body[3..5].parse().map_err(|_| Error::BadBody)?;
    if entries == 0 || body.len() != 5 + entries * ADDRESS_SIZE {
        return Err(Error::BadBody);
    }

    let mut path = Vec::with_capacity(entries);
    for chunk in 0..entries {
        let at = 5 + chunk * ADDRESS_SIZE;
        path.push(Address::decode(&body[at..])?);
    }

    Ok(path)
}
