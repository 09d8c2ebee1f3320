//! Netlink route protocol framing.
//!
//! Encodes link/address dump requests and walks the messages and
//! type-length-value attributes of kernel responses. All integers are in
//! host byte order, as netlink requires.

/// Length of `struct nlmsghdr`.
pub const NLMSG_HDRLEN: usize = 16;
/// Length of `struct ifinfomsg`.
pub const IFINFOMSG_LEN: usize = 16;
/// Length of `struct ifaddrmsg`.
pub const IFADDRMSG_LEN: usize = 8;
/// Length of `struct rtattr`.
pub const RTA_HDRLEN: usize = 4;

pub const NLMSG_ERROR: u16 = 2;
pub const NLMSG_DONE: u16 = 3;

pub const RTM_NEWLINK: u16 = 16;
pub const RTM_GETLINK: u16 = 18;
pub const RTM_NEWADDR: u16 = 20;
pub const RTM_GETADDR: u16 = 22;

pub const NLM_F_REQUEST: u16 = 0x1;
pub const NLM_F_DUMP: u16 = 0x300;

pub const IFLA_ADDRESS: u16 = 1;
pub const IFLA_BROADCAST: u16 = 2;
pub const IFLA_IFNAME: u16 = 3;

pub const IFA_ADDRESS: u16 = 1;
pub const IFA_BROADCAST: u16 = 4;

pub const AF_UNSPEC: u8 = 0;
pub const AF_INET: u8 = 2;
pub const AF_INET6: u8 = 10;
pub const AF_PACKET: u16 = 17;

/// Size of a dump request: header plus `rtgenmsg`, padded to 4 bytes.
pub const DUMP_REQUEST_LEN: usize = align(NLMSG_HDRLEN + 1);

/// Rounds `len` up to the 4-byte netlink alignment.
pub const fn align(len: usize) -> usize {
    (len + 3) & !3
}

fn read_u16(buf: &[u8], at: usize) -> u16 {
    u16::from_ne_bytes([buf[at], buf[at + 1]])
}

fn read_u32(buf: &[u8], at: usize) -> u32 {
    u32::from_ne_bytes([buf[at], buf[at + 1], buf[at + 2], buf[at + 3]])
}

/// Builds a dump request for `kind` (`RTM_GETLINK` or `RTM_GETADDR`) over
/// all address families.
pub fn dump_request(kind: u16, seq: u32) -> [u8; DUMP_REQUEST_LEN] {
    let mut req = [0u8; DUMP_REQUEST_LEN];
    req[0..4].copy_from_slice(&(DUMP_REQUEST_LEN as u32).to_ne_bytes());
    req[4..6].copy_from_slice(&kind.to_ne_bytes());
    req[6..8].copy_from_slice(&(NLM_F_REQUEST | NLM_F_DUMP).to_ne_bytes());
    req[8..12].copy_from_slice(&seq.to_ne_bytes());
    // nlmsg_pid stays 0: the kernel is the destination.
    req[NLMSG_HDRLEN] = AF_UNSPEC;
    req
}

/// One netlink message within a datagram.
#[derive(Debug, Clone, Copy)]
pub struct Message<'a> {
    pub kind: u16,
    pub flags: u16,
    pub seq: u32,
    /// Bytes after the header, up to `nlmsg_len`.
    pub payload: &'a [u8],
}

impl<'a> Message<'a> {
    /// The negative errno carried by an `NLMSG_ERROR` message.
    pub fn error_code(&self) -> Option<i32> {
        (self.kind == NLMSG_ERROR && self.payload.len() >= 4)
            .then(|| read_u32(self.payload, 0) as i32)
    }
}

/// Iterates the messages of one received datagram.
///
/// Stops at the first header whose length is inconsistent with the
/// remaining bytes.
#[derive(Debug, Clone)]
pub struct Messages<'a> {
    buf: &'a [u8],
}

impl<'a> Messages<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf }
    }
}

impl<'a> Iterator for Messages<'a> {
    type Item = Message<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.buf.len() < NLMSG_HDRLEN {
            return None;
        }
        let len = read_u32(self.buf, 0) as usize;
        if len < NLMSG_HDRLEN || len > self.buf.len() {
            self.buf = &[];
            return None;
        }

        let message = Message {
            kind: read_u16(self.buf, 4),
            flags: read_u16(self.buf, 6),
            seq: read_u32(self.buf, 8),
            payload: &self.buf[NLMSG_HDRLEN..len],
        };
        self.buf = self.buf.get(align(len)..).unwrap_or(&[]);
        Some(message)
    }
}

/// One `rtattr` TLV.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Attribute<'a> {
    pub kind: u16,
    pub payload: &'a [u8],
}

/// Iterates an attribute stream.
#[derive(Debug, Clone)]
pub struct Attributes<'a> {
    buf: &'a [u8],
}

impl<'a> Attributes<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf }
    }
}

impl<'a> Iterator for Attributes<'a> {
    type Item = Attribute<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.buf.len() < RTA_HDRLEN {
            return None;
        }
        let len = read_u16(self.buf, 0) as usize;
        if len < RTA_HDRLEN || len > self.buf.len() {
            self.buf = &[];
            return None;
        }

        let attribute = Attribute {
            kind: read_u16(self.buf, 2),
            payload: &self.buf[RTA_HDRLEN..len],
        };
        self.buf = self.buf.get(align(len)..).unwrap_or(&[]);
        Some(attribute)
    }
}

/// Fixed part of an `RTM_NEWLINK` message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IfInfoMsg {
    pub family: u8,
    /// ARP hardware type (`ARPHRD_*`).
    pub hatype: u16,
    pub index: i32,
    pub flags: u32,
}

impl IfInfoMsg {
    /// Splits a message payload into the header and its attribute stream.
    pub fn parse(payload: &[u8]) -> Option<(Self, Attributes<'_>)> {
        if payload.len() < IFINFOMSG_LEN {
            return None;
        }
        let msg = Self {
            family: payload[0],
            hatype: read_u16(payload, 2),
            index: read_u32(payload, 4) as i32,
            flags: read_u32(payload, 8),
        };
        Some((msg, Attributes::new(&payload[IFINFOMSG_LEN..])))
    }
}

/// Fixed part of an `RTM_NEWADDR` message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IfAddrMsg {
    pub family: u8,
    pub prefix_len: u8,
    pub flags: u8,
    pub scope: u8,
    pub index: u32,
}

impl IfAddrMsg {
    /// Splits a message payload into the header and its attribute stream.
    pub fn parse(payload: &[u8]) -> Option<(Self, Attributes<'_>)> {
        if payload.len() < IFADDRMSG_LEN {
            return None;
        }
        let msg = Self {
            family: payload[0],
            prefix_len: payload[1],
            flags: payload[2],
            scope: payload[3],
            index: read_u32(payload, 4),
        };
        Some((msg, Attributes::new(&payload[IFADDRMSG_LEN..])))
    }
}
