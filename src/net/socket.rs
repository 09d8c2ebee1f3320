//! Netlink transport abstraction.

use std::io;

/// Datagram transport to the kernel routing subsystem.
///
/// Production code uses [`RouteSocket`]; tests feed scripted datagrams.
pub trait NetlinkTransport {
    /// Sends one request datagram, returning the number of bytes written.
    fn send(&mut self, buf: &[u8]) -> io::Result<usize>;
    /// Receives one datagram into `buf`. `Ok(0)` means the peer closed.
    fn recv(&mut self, buf: &mut [u8]) -> io::Result<usize>;
}

impl<T: NetlinkTransport + ?Sized> NetlinkTransport for &mut T {
    fn send(&mut self, buf: &[u8]) -> io::Result<usize> {
        (**self).send(buf)
    }

    fn recv(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        (**self).recv(buf)
    }
}

#[cfg(target_os = "linux")]
pub use self::linux::RouteSocket;

#[cfg(target_os = "linux")]
mod linux {
    use super::NetlinkTransport;
    use std::io;
    use std::os::fd::{AsRawFd, FromRawFd, OwnedFd};

    /// `AF_NETLINK`/`NETLINK_ROUTE` raw socket. Closed on drop.
    #[derive(Debug)]
    pub struct RouteSocket {
        fd: OwnedFd,
    }

    impl RouteSocket {
        pub fn open() -> io::Result<Self> {
            // SAFETY: plain syscall, the result is checked below.
            let fd = unsafe {
                libc::socket(
                    libc::AF_NETLINK,
                    libc::SOCK_RAW | libc::SOCK_CLOEXEC,
                    libc::NETLINK_ROUTE,
                )
            };
            if fd < 0 {
                return Err(io::Error::last_os_error());
            }
            // SAFETY: `fd` is a freshly opened descriptor owned by nobody else.
            let fd = unsafe { OwnedFd::from_raw_fd(fd) };
            Ok(Self { fd })
        }
    }

    /// Runs a syscall, retrying while it is interrupted by a signal.
    fn retry_interrupted(mut call: impl FnMut() -> isize) -> io::Result<usize> {
        loop {
            let n = call();
            if n >= 0 {
                return Ok(n as usize);
            }
            let err = io::Error::last_os_error();
            if err.kind() != io::ErrorKind::Interrupted {
                return Err(err);
            }
        }
    }

    impl NetlinkTransport for RouteSocket {
        fn send(&mut self, buf: &[u8]) -> io::Result<usize> {
            let fd = self.fd.as_raw_fd();
            // SAFETY: `buf` is valid for reads of `buf.len()` bytes.
            retry_interrupted(|| unsafe { libc::send(fd, buf.as_ptr().cast(), buf.len(), 0) })
        }

        fn recv(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let fd = self.fd.as_raw_fd();
            let (ptr, len) = (buf.as_mut_ptr(), buf.len());
            // SAFETY: `buf` is valid for writes of `len` bytes.
            retry_interrupted(|| unsafe { libc::recv(fd, ptr.cast(), len, 0) })
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        /// Fails the way a syscall does: sets errno and returns -1.
        fn fail_with(errno: i32) -> isize {
            // SAFETY: errno is thread-local.
            unsafe { *libc::__errno_location() = errno };
            -1
        }

        #[test]
        fn test_retry_interrupted_repeats_on_eintr() {
            let mut calls = 0;

            let result = retry_interrupted(|| {
                calls += 1;
                if calls == 1 { fail_with(libc::EINTR) } else { 20 }
            });

            assert_eq!(result.unwrap(), 20);
            assert_eq!(calls, 2);
        }

        #[test]
        fn test_retry_interrupted_returns_other_errors() {
            let mut calls = 0;

            let result = retry_interrupted(|| {
                calls += 1;
                fail_with(libc::EACCES)
            });

            assert_eq!(result.unwrap_err().raw_os_error(), Some(libc::EACCES));
            assert_eq!(calls, 1);
        }
    }
}
