// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2022 Juan Palacios <jpalaciosdev@gmail.com>

//! This module contains a simple `Socket` implementation built around
//! [`libc::socket`]. `Socket` methods are just direct calls to their ffi
//! counterparts.
//!
//! [`libc::socket`]: https://docs.rs/libc/latest/libc/fn.socket.html

use std::{
    io, mem,
    os::fd::{AsRawFd, RawFd},
    time::Duration,
};

use crate::inet::{Family, Transport};

/// Helper macro to call a libc ffi function.
/// The resulting value is returned into a [std::io::Result].
macro_rules! ffi_call {
    ($name: ident( $( $arg: expr ),* )) => {{
        let result = libc::$name($($arg, )*);
        match result {
            -1 => Err(std::io::Error::last_os_error()),
            _ =>  Ok(result),
        }
    }};

    // handle leading comma
    ($name: ident( $( $arg: expr ),+ ,)) => {
        ffi_call!( $name( $( $arg ),+ ) )
    };
}

pub struct Socket(libc::c_int);

impl Socket {
    /// Attempts to create a new `Socket` in a `domain`, with type `ty` using a
    /// specific `protocol`.
    ///
    /// # Errors
    ///
    /// If this function encounters any form of I/O error, an error variant will be
    /// returned.
    pub fn try_new(
        domain: libc::c_int,
        ty: libc::c_int,
        protocol: libc::c_int,
    ) -> io::Result<Socket> {
        // Safety: It's safe to call the ffi function in this context as it
        // won't produce undefined behaviour on the Rust side upon a failure.
        unsafe { ffi_call!(socket(domain, ty, protocol)).map(Socket) }
    }

    /// Assign an `address` with of a specific `length` to the `Socket`.
    ///
    /// # Safety
    ///
    /// The caller must ensure that the memory pointed by `address` has been
    /// allocated and properly initialized and its size is passed as `length`.
    ///
    /// # Errors
    ///
    /// If this function encounters any form of I/O error, an error variant will be
    /// returned.
    pub unsafe fn bind(
        &self,
        address: *const libc::sockaddr,
        length: libc::socklen_t,
    ) -> io::Result<()> {
        ffi_call!(bind(self.0, address, length)).map(|_| ())
    }

    /// Marks the `Socket` as passive, queueing up to `backlog` pending
    /// connections.
    ///
    /// # Errors
    ///
    /// If this function encounters any form of I/O error, an error variant will be
    /// returned.
    pub fn listen(&self, backlog: libc::c_int) -> io::Result<()> {
        // Safety: `listen` only operates on the descriptor owned by `self`.
        unsafe { ffi_call!(listen(self.0, backlog)).map(|_| ()) }
    }

    /// Connects the `Socket` to the peer at `address`.
    ///
    /// # Safety
    ///
    /// The caller must ensure that the memory pointed by `address` has been
    /// allocated and properly initialized and its size is passed as `length`.
    ///
    /// # Errors
    ///
    /// If this function encounters any form of I/O error, an error variant will be
    /// returned.
    pub unsafe fn connect(
        &self,
        address: *const libc::sockaddr,
        length: libc::socklen_t,
    ) -> io::Result<()> {
        ffi_call!(connect(self.0, address, length)).map(|_| ())
    }

    /// Accepts a pending connection, returning a new `Socket` for it. The peer
    /// address is written into `address`, and its size into `length`.
    ///
    /// # Safety
    ///
    /// The caller must ensure that `address` points to writable memory of the
    /// size pointed by `length`.
    ///
    /// # Errors
    ///
    /// If this function encounters any form of I/O error, an error variant will be
    /// returned.
    pub unsafe fn accept(
        &self,
        address: *mut libc::sockaddr,
        length: *mut libc::socklen_t,
    ) -> io::Result<Socket> {
        ffi_call!(accept(self.0, address, length)).map(Socket)
    }

    /// Writes the address the `Socket` is bound to into `address`, and its
    /// size into `length`.
    ///
    /// # Safety
    ///
    /// The caller must ensure that `address` points to writable memory of the
    /// size pointed by `length`.
    ///
    /// # Errors
    ///
    /// If this function encounters any form of I/O error, an error variant will be
    /// returned.
    pub unsafe fn local_address(
        &self,
        address: *mut libc::sockaddr,
        length: *mut libc::socklen_t,
    ) -> io::Result<()> {
        ffi_call!(getsockname(self.0, address, length)).map(|_| ())
    }

    /// Manipulates the options of the `Socket`.
    ///
    /// # Safety
    ///
    /// The caller must ensure that the memory pointed by `value` has been
    /// allocated and properly initialized and its size is passed as `length`.
    ///
    /// # Errors
    ///
    /// If this function encounters any form of I/O error, an error variant will be
    /// returned.
    pub unsafe fn set_option(
        &self,
        level: libc::c_int,
        name: libc::c_int,
        value: *const libc::c_void,
        length: libc::socklen_t,
    ) -> io::Result<()> {
        ffi_call!(setsockopt(self.0, level, name, value, length)).map(|_| ())
    }

    /// Setups the socket data receiving timeout. Blocking receive and accept
    /// calls fail with [`io::ErrorKind::WouldBlock`] once it expires.
    ///
    /// # Errors
    ///
    /// If this function encounters any form of I/O error, an error variant will be
    /// returned.
    pub fn set_receive_timeout(&self, duration: Duration) -> io::Result<()> {
        let duration = libc::timeval {
            tv_sec: duration.as_secs().clamp(0, i64::MAX as u64) as _,
            tv_usec: duration.subsec_micros() as _,
        };

        // Safety: Calling `Socket::set_option` ffi method with a pointer to
        // duration is safe at this point, now that the structure has been
        // allocated and properly initialized.
        unsafe {
            self.set_option(
                libc::SOL_SOCKET,
                libc::SO_RCVTIMEO,
                &duration as *const _ as *const _,
                mem::size_of_val(&duration) as _,
            )
        }
    }

    /// Transmit a message through the `Socket`, returning the number of bytes
    /// sent.
    ///
    /// # Safety
    ///
    /// The caller must ensure that the memory pointed by `data` has been
    /// allocated and properly initialized and its size is passed as `length`.
    ///
    /// # Errors
    ///
    /// If this function encounters any form of I/O error, an error variant will be
    /// returned.
    pub unsafe fn send(
        &self,
        data: *const libc::c_void,
        length: libc::size_t,
        flags: libc::c_int,
    ) -> io::Result<usize> {
        ffi_call!(send(self.0, data, length, flags)).map(|sent| sent as usize)
    }

    /// Receive a message from the `Socket`, returning the number of bytes
    /// received.
    ///
    /// # Safety
    ///
    /// The caller must ensure that the memory pointed by `buffer` has been
    /// allocated and its size is passed as `length`.
    ///
    /// # Errors
    ///
    /// If this function encounters any form of I/O error, an error variant will be
    /// returned.
    pub unsafe fn receive(
        &self,
        buffer: *mut libc::c_void,
        length: libc::size_t,
        flags: libc::c_int,
    ) -> io::Result<usize> {
        ffi_call!(recv(self.0, buffer, length, flags)).map(|received| received as usize)
    }

    /// Transmit a message through the `Socket` to the peer at `address`.
    ///
    /// # Safety
    ///
    /// The caller must ensure that the memory pointed by `data` and `address`
    /// has been allocated and properly initialized and their sizes are passed
    /// as `length` and `address_length`.
    ///
    /// # Errors
    ///
    /// If this function encounters any form of I/O error, an error variant will be
    /// returned.
    pub unsafe fn send_to(
        &self,
        data: *const libc::c_void,
        length: libc::size_t,
        flags: libc::c_int,
        address: *const libc::sockaddr,
        address_length: libc::socklen_t,
    ) -> io::Result<usize> {
        ffi_call!(sendto(self.0, data, length, flags, address, address_length))
            .map(|sent| sent as usize)
    }

    /// Receive a message from the `Socket`, writing the sender address into
    /// `address`.
    ///
    /// # Safety
    ///
    /// The caller must ensure that the memory pointed by `buffer` has been
    /// allocated and its size is passed as `length`, and that `address` points
    /// to writable memory of the size pointed by `address_length`.
    ///
    /// # Errors
    ///
    /// If this function encounters any form of I/O error, an error variant will be
    /// returned.
    pub unsafe fn receive_from(
        &self,
        buffer: *mut libc::c_void,
        length: libc::size_t,
        flags: libc::c_int,
        address: *mut libc::sockaddr,
        address_length: *mut libc::socklen_t,
    ) -> io::Result<usize> {
        ffi_call!(recvfrom(self.0, buffer, length, flags, address, address_length))
            .map(|received| received as usize)
    }
}

impl AsRawFd for Socket {
    fn as_raw_fd(&self) -> RawFd {
        self.0
    }
}

impl Drop for Socket {
    fn drop(&mut self) {
        // Safety: A Socket instance always have a valid open file descriptor.
        if let Err(e) = unsafe { ffi_call!(close(self.0)) } {
            log::error!("An error occur while closing the socket: {}", e);
        }
    }
}

/// Socket domain of an address `family`, if it names a concrete one.
pub(crate) fn domain(family: Family) -> Option<libc::c_int> {
    match family {
        Family::Inet => Some(libc::AF_INET),
        Family::Inet6 => Some(libc::AF_INET6),
        Family::Unspecified => None,
    }
}

/// Address family used for name resolution hints.
pub(crate) fn hint_family(family: Family) -> libc::c_int {
    domain(family).unwrap_or(libc::AF_UNSPEC)
}

pub(crate) fn socket_type(transport: Transport) -> libc::c_int {
    match transport {
        Transport::Stream => libc::SOCK_STREAM,
        Transport::Datagram => libc::SOCK_DGRAM,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn concrete_families_map_to_socket_domains() {
        assert_eq!(Some(libc::AF_INET), domain(Family::Inet));
        assert_eq!(Some(libc::AF_INET6), domain(Family::Inet6));
        assert_eq!(None, domain(Family::Unspecified));
        assert_eq!(libc::AF_UNSPEC, hint_family(Family::Unspecified));
    }

    #[test]
    fn transports_map_to_socket_types() {
        assert_eq!(libc::SOCK_STREAM, socket_type(Transport::Stream));
        assert_eq!(libc::SOCK_DGRAM, socket_type(Transport::Datagram));
    }

    #[test]
    fn try_new_opens_a_descriptor() {
        let socket = Socket::try_new(libc::AF_INET, libc::SOCK_STREAM, 0).unwrap();
        assert!(socket.as_raw_fd() >= 0);
    }

    #[test]
    fn try_new_fails_on_invalid_domain() {
        let error = Socket::try_new(-1, libc::SOCK_STREAM, 0).err().unwrap();
        assert!(error.raw_os_error().is_some());
    }

    #[test]
    fn set_receive_timeout_on_open_socket() {
        let socket = Socket::try_new(libc::AF_INET, libc::SOCK_DGRAM, 0).unwrap();
        assert!(socket
            .set_receive_timeout(Duration::from_millis(1500))
            .is_ok());
    }
}
