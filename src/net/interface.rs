//! Network interface enumeration over rtnetlink.
//!
//! One link dump followed by one address dump. Every link yields a record
//! carrying its link-layer address; every IPv4/IPv6 address yields a further
//! record that copies name, flags and index from the link it belongs to.

use crate::error::CollectError;
use crate::net::rtnl::{
    AF_INET, AF_INET6, AF_PACKET, IFA_ADDRESS, IFA_BROADCAST, IFLA_ADDRESS, IFLA_BROADCAST,
    IFLA_IFNAME, IfAddrMsg, IfInfoMsg, Messages, NLMSG_DONE, NLMSG_ERROR, RTM_GETADDR,
    RTM_GETLINK, RTM_NEWADDR, RTM_NEWLINK, dump_request,
};
use crate::net::socket::NetlinkTransport;
use serde::Serialize;
use std::io;
use std::net::{Ipv4Addr, Ipv6Addr};
use tracing::{debug, trace};

/// Receive buffer size; the kernel keeps dump datagrams under this.
pub const RECV_BUFFER_LEN: usize = 8192;

/// Interface names longer than this (without the NUL) are ignored.
const IFNAMSIZ: usize = 16;

/// Link-layer addresses at least this long are ignored.
const MAX_LINK_ADDR_LEN: usize = 128;

/// Hardware address of a link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LinkLayerAddr {
    pub ifindex: i32,
    /// ARP hardware type (1 for Ethernet, 772 for loopback).
    pub hatype: u16,
    pub bytes: Vec<u8>,
}

/// Address attached to an [`InterfaceRecord`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SockAddr {
    Inet(Ipv4Addr),
    Inet6(Ipv6Addr),
    Packet(LinkLayerAddr),
}

impl SockAddr {
    /// Address family constant (`AF_INET`, `AF_INET6`, `AF_PACKET`).
    pub fn family(&self) -> u16 {
        match self {
            SockAddr::Inet(_) => AF_INET as u16,
            SockAddr::Inet6(_) => AF_INET6 as u16,
            SockAddr::Packet(_) => AF_PACKET,
        }
    }

    /// Builds an IP address from raw attribute bytes in network order.
    ///
    /// Returns `None` for other families or when the length does not match.
    fn from_ip_bytes(family: u8, bytes: &[u8]) -> Option<Self> {
        match family {
            AF_INET => <[u8; 4]>::try_from(bytes)
                .ok()
                .map(|b| SockAddr::Inet(Ipv4Addr::from(b))),
            AF_INET6 => <[u8; 16]>::try_from(bytes)
                .ok()
                .map(|b| SockAddr::Inet6(Ipv6Addr::from(b))),
            _ => None,
        }
    }
}

/// Builds a mask with the leading `prefix_len` bits set.
///
/// Prefix lengths past the address width are clamped to it.
fn prefix_mask<const N: usize>(prefix_len: u8) -> [u8; N] {
    let bits = usize::from(prefix_len).min(N * 8);
    let mut mask = [0u8; N];
    mask[..bits / 8].fill(0xff);
    if bits % 8 != 0 {
        mask[bits / 8] = 0xff << (8 - bits % 8);
    }
    mask
}

/// Synthesizes the netmask for an IP prefix length.
pub fn netmask(family: u8, prefix_len: u8) -> Option<SockAddr> {
    match family {
        AF_INET => Some(SockAddr::Inet(Ipv4Addr::from(prefix_mask::<4>(prefix_len)))),
        AF_INET6 => Some(SockAddr::Inet6(Ipv6Addr::from(prefix_mask::<16>(prefix_len)))),
        _ => None,
    }
}

/// One link or one address of a network interface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InterfaceRecord {
    pub name: String,
    pub index: i32,
    /// `IFF_*` flags of the link.
    pub flags: u32,
    pub address: Option<SockAddr>,
    pub netmask: Option<SockAddr>,
    /// Broadcast or point-to-point destination address.
    pub broadcast: Option<SockAddr>,
}

impl InterfaceRecord {
    /// `true` for link records, which carry a link-layer address.
    pub fn is_link(&self) -> bool {
        matches!(self.address, Some(SockAddr::Packet(_)))
    }
}

/// Takes the bytes before the first NUL of a C string attribute.
fn c_string(payload: &[u8]) -> String {
    let end = payload.iter().position(|&b| b == 0).unwrap_or(payload.len());
    String::from_utf8_lossy(&payload[..end]).into_owned()
}

/// Turns an `RTM_NEWLINK` payload into a link record.
fn link_record(payload: &[u8]) -> Option<InterfaceRecord> {
    let (info, attrs) = IfInfoMsg::parse(payload)?;
    let packet = |bytes: &[u8]| {
        SockAddr::Packet(LinkLayerAddr {
            ifindex: info.index,
            hatype: info.hatype,
            bytes: bytes.to_vec(),
        })
    };

    let mut record = InterfaceRecord {
        name: String::new(),
        index: info.index,
        flags: info.flags,
        address: None,
        netmask: None,
        broadcast: None,
    };
    for attr in attrs {
        match attr.kind {
            IFLA_IFNAME if attr.payload.len() <= IFNAMSIZ => record.name = c_string(attr.payload),
            IFLA_ADDRESS if attr.payload.len() < MAX_LINK_ADDR_LEN => {
                record.address = Some(packet(attr.payload))
            }
            IFLA_BROADCAST if attr.payload.len() < MAX_LINK_ADDR_LEN => {
                record.broadcast = Some(packet(attr.payload))
            }
            _ => {}
        }
    }
    Some(record)
}

/// Turns an `RTM_NEWADDR` payload into an address record.
///
/// `known` holds the records produced so far; the owning link is looked up
/// newest first. Addresses of unknown links yield `None`.
fn address_record(known: &[InterfaceRecord], payload: &[u8]) -> Option<InterfaceRecord> {
    let (msg, attrs) = IfAddrMsg::parse(payload)?;
    let Some(owner) = known.iter().rev().find(|r| r.index as u32 == msg.index) else {
        debug!(index = msg.index, "address for unknown interface index, skipping");
        return None;
    };

    let mut record = InterfaceRecord {
        name: owner.name.clone(),
        index: owner.index,
        flags: owner.flags,
        address: None,
        netmask: None,
        broadcast: None,
    };
    for attr in attrs {
        match attr.kind {
            IFA_ADDRESS => {
                if let Some(addr) = SockAddr::from_ip_bytes(msg.family, attr.payload) {
                    record.address = Some(addr);
                    record.netmask = netmask(msg.family, msg.prefix_len);
                }
            }
            IFA_BROADCAST => {
                if let Some(addr) = SockAddr::from_ip_bytes(msg.family, attr.payload) {
                    record.broadcast = Some(addr);
                }
            }
            _ => {}
        }
    }
    Some(record)
}

/// Lists network interfaces and their addresses.
pub struct InterfaceEnumerator<T: NetlinkTransport> {
    transport: T,
    seq: u32,
}

impl<T: NetlinkTransport> InterfaceEnumerator<T> {
    pub fn new(transport: T) -> Self {
        Self { transport, seq: 0 }
    }

    /// Consumes the enumerator, returning the transport.
    pub fn into_inner(self) -> T {
        self.transport
    }

    /// Dumps all links, then all addresses.
    ///
    /// Records come back newest first: address records precede link
    /// records. Any failure discards everything collected so far.
    pub fn enumerate(&mut self) -> Result<Vec<InterfaceRecord>, CollectError> {
        let mut buf = vec![0u8; RECV_BUFFER_LEN];
        let mut records = Vec::new();

        for kind in [RTM_GETLINK, RTM_GETADDR] {
            self.request(kind)?;
            self.read_responses(&mut buf, &mut records)?;
        }

        records.reverse();
        debug!(count = records.len(), "enumerated network interfaces");
        Ok(records)
    }

    fn request(&mut self, kind: u16) -> Result<(), CollectError> {
        self.seq = self.seq.wrapping_add(1);
        let req = dump_request(kind, self.seq);
        let sent = self.transport.send(&req)?;
        if sent != req.len() {
            return Err(io::Error::new(
                io::ErrorKind::WriteZero,
                format!("short netlink send: {} of {} bytes", sent, req.len()),
            )
            .into());
        }
        Ok(())
    }

    /// Reads datagrams until `NLMSG_DONE`, appending records in discovery order.
    fn read_responses(
        &mut self,
        buf: &mut [u8],
        records: &mut Vec<InterfaceRecord>,
    ) -> Result<(), CollectError> {
        loop {
            let n = self.transport.recv(buf)?;
            if n == 0 {
                return Err(CollectError::Truncated);
            }

            for message in Messages::new(&buf[..n]) {
                match message.kind {
                    NLMSG_DONE => return Ok(()),
                    NLMSG_ERROR => {
                        let errno = message.error_code().map_or(0, |code| -code);
                        return Err(CollectError::Netlink { errno });
                    }
                    RTM_NEWLINK => records.extend(link_record(message.payload)),
                    RTM_NEWADDR => {
                        if let Some(record) = address_record(records, message.payload) {
                            records.push(record);
                        }
                    }
                    kind => trace!(kind, "ignoring netlink message"),
                }
            }
        }
    }
}
