//! Network interface enumeration and utilization.
//!
//! - [`rtnl`] frames netlink route requests and walks the responses
//! - [`interface`] turns link/address dumps into [`InterfaceRecord`]s
//! - [`socket`] provides the kernel transport
//! - [`utilization`] joins link records with their byte counters

pub mod interface;
pub mod rtnl;
pub mod socket;
pub mod utilization;

pub use interface::{InterfaceEnumerator, InterfaceRecord, LinkLayerAddr, SockAddr, netmask};
#[cfg(target_os = "linux")]
pub use socket::RouteSocket;
pub use socket::NetlinkTransport;
pub use utilization::{NetworkInterfaceSample, NetworkUtilizationReporter};
