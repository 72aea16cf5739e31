// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2022 Juan Palacios <jpalaciosdev@gmail.com>

//! Conversions between [`SocketAddr`] and the C socket address structures.

use std::{
    io, mem,
    net::{Ipv4Addr, Ipv6Addr, SocketAddr, SocketAddrV4, SocketAddrV6},
    ptr,
};

/// A socket address stored in a `sockaddr_storage`, large enough for any
/// address family.
pub(crate) struct SockAddr {
    storage: libc::sockaddr_storage,
    length: libc::socklen_t,
}

impl SockAddr {
    /// A zeroed address, ready to be filled by the kernel.
    pub fn empty() -> Self {
        SockAddr {
            // Safety: `libc::sockaddr_storage` is a C structure, so it's safe
            // to initialize it with zeros.
            storage: unsafe { mem::zeroed() },
            length: mem::size_of::<libc::sockaddr_storage>() as _,
        }
    }

    /// Copies `length` bytes of the address pointed by `address`.
    ///
    /// # Safety
    ///
    /// The caller must ensure that `address` points to an initialized socket
    /// address of `length` bytes.
    pub unsafe fn from_raw(
        address: *const libc::sockaddr,
        length: libc::socklen_t,
    ) -> io::Result<Self> {
        if length as usize > mem::size_of::<libc::sockaddr_storage>() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "Socket address does not fit in sockaddr_storage",
            ));
        }

        let mut sockaddr = SockAddr::empty();
        ptr::copy_nonoverlapping(
            address as *const u8,
            &mut sockaddr.storage as *mut _ as *mut u8,
            length as usize,
        );
        sockaddr.length = length;

        Ok(sockaddr)
    }

    pub fn as_ptr(&self) -> *const libc::sockaddr {
        &self.storage as *const _ as *const _
    }

    pub fn as_mut_ptr(&mut self) -> *mut libc::sockaddr {
        &mut self.storage as *mut _ as *mut _
    }

    pub fn length(&self) -> libc::socklen_t {
        self.length
    }

    pub fn length_mut(&mut self) -> *mut libc::socklen_t {
        &mut self.length
    }

    /// Attempts to convert the stored address into a [`SocketAddr`].
    ///
    /// # Errors
    ///
    /// An [`io::ErrorKind::InvalidData`] error is returned when the stored
    /// address is not an Internet address or it's truncated.
    pub fn to_socket_addr(&self) -> io::Result<SocketAddr> {
        let length = self.length as usize;
        match self.storage.ss_family as libc::c_int {
            libc::AF_INET if length >= mem::size_of::<libc::sockaddr_in>() => {
                // Safety: The stored address is a `sockaddr_in`, as the
                // family and length have been checked.
                let address = unsafe { &*(self.as_ptr() as *const libc::sockaddr_in) };
                Ok(SocketAddr::V4(SocketAddrV4::new(
                    Ipv4Addr::from(address.sin_addr.s_addr.to_ne_bytes()),
                    u16::from_be(address.sin_port),
                )))
            }
            libc::AF_INET6 if length >= mem::size_of::<libc::sockaddr_in6>() => {
                // Safety: The stored address is a `sockaddr_in6`, as the
                // family and length have been checked.
                let address = unsafe { &*(self.as_ptr() as *const libc::sockaddr_in6) };
                Ok(SocketAddr::V6(SocketAddrV6::new(
                    Ipv6Addr::from(address.sin6_addr.s6_addr),
                    u16::from_be(address.sin6_port),
                    address.sin6_flowinfo,
                    address.sin6_scope_id,
                )))
            }
            family => Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("Unsupported socket address family {} of length {}", family, length),
            )),
        }
    }
}

impl From<&SocketAddr> for SockAddr {
    fn from(value: &SocketAddr) -> Self {
        let mut sockaddr = SockAddr::empty();

        match value {
            SocketAddr::V4(value) => {
                // Safety: `sockaddr_storage` is large and aligned enough to
                // hold a `sockaddr_in`.
                let address = unsafe { &mut *(sockaddr.as_mut_ptr() as *mut libc::sockaddr_in) };
                address.sin_family = libc::AF_INET as _;
                address.sin_port = value.port().to_be();
                address.sin_addr = libc::in_addr {
                    s_addr: u32::from_ne_bytes(value.ip().octets()),
                };
                sockaddr.length = mem::size_of::<libc::sockaddr_in>() as _;
            }
            SocketAddr::V6(value) => {
                // Safety: `sockaddr_storage` is large and aligned enough to
                // hold a `sockaddr_in6`.
                let address = unsafe { &mut *(sockaddr.as_mut_ptr() as *mut libc::sockaddr_in6) };
                address.sin6_family = libc::AF_INET6 as _;
                address.sin6_port = value.port().to_be();
                address.sin6_flowinfo = value.flowinfo();
                address.sin6_addr = libc::in6_addr {
                    s6_addr: value.ip().octets(),
                };
                address.sin6_scope_id = value.scope_id();
                sockaddr.length = mem::size_of::<libc::sockaddr_in6>() as _;
            }
        }

        sockaddr
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ipv4_address_is_stored_in_network_byte_order() {
        let sockaddr = SockAddr::from(&SocketAddr::from((Ipv4Addr::new(8, 8, 4, 4), 53)));
        assert_eq!(
            mem::size_of::<libc::sockaddr_in>(),
            sockaddr.length() as usize
        );

        // Safety: the address was built from an IPv4 socket address.
        let raw = unsafe { &*(sockaddr.as_ptr() as *const libc::sockaddr_in) };
        assert_eq!(libc::AF_INET, raw.sin_family as libc::c_int);
        assert_eq!([0, 53], raw.sin_port.to_ne_bytes());
        assert_eq!([8, 8, 4, 4], raw.sin_addr.s_addr.to_ne_bytes());
    }

    #[test]
    fn ipv6_address_keeps_flow_and_scope() {
        let address = SocketAddr::V6(SocketAddrV6::new(Ipv6Addr::LOCALHOST, 8080, 7, 2));
        let sockaddr = SockAddr::from(&address);

        assert_eq!(
            mem::size_of::<libc::sockaddr_in6>(),
            sockaddr.length() as usize
        );
        assert_eq!(address, sockaddr.to_socket_addr().unwrap());
    }

    #[test]
    fn empty_address_is_not_an_internet_address() {
        let error = SockAddr::empty().to_socket_addr().unwrap_err();
        assert_eq!(io::ErrorKind::InvalidData, error.kind());
    }

    #[test]
    fn truncated_address_is_rejected() {
        let address = SockAddr::from(&SocketAddr::from((Ipv6Addr::LOCALHOST, 80)));

        // Safety: only the first bytes of a valid address are copied.
        let truncated = unsafe { SockAddr::from_raw(address.as_ptr(), 8) }.unwrap();
        assert_eq!(
            io::ErrorKind::InvalidData,
            truncated.to_socket_addr().unwrap_err().kind()
        );
    }

    #[test]
    fn from_raw_copies_the_address() {
        let address = SocketAddr::from((Ipv4Addr::LOCALHOST, 3000));
        let original = SockAddr::from(&address);

        // Safety: `original` holds an initialized address of the given length.
        let copy = unsafe { SockAddr::from_raw(original.as_ptr(), original.length()) }.unwrap();
        assert_eq!(address, copy.to_socket_addr().unwrap());
    }
}
