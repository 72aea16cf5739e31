// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2022 Juan Palacios <jpalaciosdev@gmail.com>

//! Formatted message send and bounded receive helpers.
//!
//! Messages are sent in a single call, including their NUL terminator.
//! Receive calls keep the last byte of the buffer for the terminator.

use std::{fmt, io, net::SocketAddr};

use super::{fatal::Operation, sockaddr::SockAddr, socket::Socket};
use crate::inet::{receive_capacity, render_message};

/// Sends a formatted message through a connected socket.
///
/// ```no_run
/// # fn example(socket: &inetsock::io::socket::Socket) -> std::io::Result<()> {
/// inetsock::sendf!(socket, 0, "this is a {}th message", 3)?;
/// # Ok(())
/// # }
/// ```
#[macro_export]
macro_rules! sendf {
    ($socket: expr, $flags: expr, $($arg: tt)*) => {
        $crate::io::message::send_message($socket, $flags, format_args!($($arg)*))
    };
}

/// Sends a formatted message through a datagram socket to a peer address.
#[macro_export]
macro_rules! sendf_to {
    ($socket: expr, $flags: expr, $peer: expr, $($arg: tt)*) => {
        $crate::io::message::send_datagram($socket, $flags, $peer, format_args!($($arg)*))
    };
}

/// Sends the rendered `message` through `socket`, returning the number of
/// bytes sent.
///
/// # Errors
///
/// If this function encounters any form of I/O error, an error variant will be
/// returned.
pub fn send_message(
    socket: &Socket,
    flags: libc::c_int,
    message: fmt::Arguments<'_>,
) -> io::Result<usize> {
    let message = render_message(message);

    // Safety: Calling `Socket::send` ffi method with a pointer to message is
    // safe at this point as the message has been allocated and initialized.
    unsafe { socket.send(message.as_ptr() as *const _, message.len(), flags) }.operation("send")
}

/// Receives at most `buffer.len() - 1` bytes into `buffer` and writes a NUL
/// terminator right after them, returning the number of bytes received.
///
/// # Errors
///
/// An [`io::ErrorKind::InvalidInput`] error is returned for an empty buffer.
/// Receive errors are returned as they are.
pub fn recv_message(socket: &Socket, flags: libc::c_int, buffer: &mut [u8]) -> io::Result<usize> {
    let capacity = capacity(buffer)?;

    // Safety: Calling `Socket::receive` ffi method with a pointer to buffer is
    // safe at this point as the buffer has room for at least `capacity` bytes.
    let received = unsafe { socket.receive(buffer.as_mut_ptr() as *mut _, capacity, flags) }?;
    buffer[received] = 0;

    Ok(received)
}

/// Sends the rendered `message` to `peer` through `socket`, returning the
/// number of bytes sent.
///
/// # Errors
///
/// If this function encounters any form of I/O error, an error variant will be
/// returned.
pub fn send_datagram(
    socket: &Socket,
    flags: libc::c_int,
    peer: &SocketAddr,
    message: fmt::Arguments<'_>,
) -> io::Result<usize> {
    let message = render_message(message);
    let peer = SockAddr::from(peer);

    // Safety: Calling `Socket::send_to` ffi method with pointers to message
    // and peer is safe at this point as both have been allocated and
    // initialized.
    unsafe {
        socket.send_to(
            message.as_ptr() as *const _,
            message.len(),
            flags,
            peer.as_ptr(),
            peer.length(),
        )
    }
    .operation("sendto")
}

/// Receives a datagram the same way [`recv_message`] does, also returning the
/// address of its sender.
///
/// # Errors
///
/// An [`io::ErrorKind::InvalidInput`] error is returned for an empty buffer.
/// Receive errors are returned as they are.
pub fn recv_datagram(
    socket: &Socket,
    flags: libc::c_int,
    buffer: &mut [u8],
) -> io::Result<(usize, SocketAddr)> {
    let capacity = capacity(buffer)?;
    let mut peer = SockAddr::empty();

    // Safety: Calling `Socket::receive_from` ffi method is safe at this point
    // as the buffer has room for at least `capacity` bytes and peer holds an
    // address storage of the length passed along.
    let received = unsafe {
        socket.receive_from(
            buffer.as_mut_ptr() as *mut _,
            capacity,
            flags,
            peer.as_mut_ptr(),
            peer.length_mut(),
        )
    }?;
    buffer[received] = 0;

    Ok((received, peer.to_socket_addr()?))
}

fn capacity(buffer: &[u8]) -> io::Result<usize> {
    receive_capacity(buffer.len())
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "Empty receive buffer"))
}
