// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2022 Juan Palacios <jpalaciosdev@gmail.com>

//! Server and client socket creation.
//!
//! Sockets created by a failing call are closed before the error is returned.

use std::{io, net::SocketAddr};

use super::{
    fatal::Operation,
    resolver,
    sockaddr::SockAddr,
    socket::{domain, socket_type, Socket},
};
use crate::inet::{first_success, Backlog, Family, Service, Transport};

/// Creates an unbound socket of the given `family` and `transport`.
///
/// # Errors
///
/// An [`io::ErrorKind::Unsupported`] error is returned for
/// [`Family::Unspecified`]. If this function encounters any other form of I/O
/// error, an error variant will be returned.
pub fn create_socket(family: Family, transport: Transport) -> io::Result<Socket> {
    let domain = domain(family).ok_or_else(|| {
        io::Error::new(io::ErrorKind::Unsupported, "Unsupported address family")
    })?;

    Socket::try_new(domain, socket_type(transport), 0).operation("socket")
}

/// Creates a server socket bound to `host` and `service`. Connection oriented
/// transports also start listening, queueing up to `backlog` connections.
///
/// Returns the socket together with the address it is actually bound to.
///
/// # Errors
///
/// An [`io::ErrorKind::Unsupported`] error is returned for
/// [`Family::Unspecified`]. If this function encounters any other form of I/O
/// error, an error variant will be returned.
pub fn create_server(
    family: Family,
    transport: Transport,
    host: Option<&str>,
    service: &Service,
    backlog: Backlog,
) -> io::Result<(Socket, SocketAddr)> {
    let socket = create_socket(family, transport)?;
    let address = resolver::resolve_passive(host, service, family, transport)?;

    bind(&socket, &address)?;
    if transport.is_connection_oriented() {
        socket.listen(*backlog.as_ref()).operation("listen")?;
    }

    let address = local_address(&socket)?;
    log::info!("{} server bound to {}", transport, address);

    Ok((socket, address))
}

/// Connects to `host` and `service`, trying the resolved candidate addresses
/// in order until one of them succeeds.
///
/// Returns the connected socket together with the peer address.
///
/// # Errors
///
/// If the name cannot be resolved or every candidate fails, an error variant
/// will be returned. The error of the last candidate is the one returned.
pub fn create_connection(
    family: Family,
    transport: Transport,
    host: &str,
    service: &Service,
) -> io::Result<(Socket, SocketAddr)> {
    let candidates = resolver::resolve(host, service, family, transport)?;

    connect_any(&candidates, transport)
}

/// Tries each of the `candidates` in order and returns a socket connected to
/// the first one that accepts the connection, together with its address.
///
/// Each candidate gets its own socket of the matching family.
///
/// # Errors
///
/// The error of the last candidate is returned when every candidate fails. An
/// [`io::ErrorKind::NotFound`] error is returned when there are no candidates.
pub fn connect_any(
    candidates: &[SocketAddr],
    transport: Transport,
) -> io::Result<(Socket, SocketAddr)> {
    first_success(candidates.iter().copied(), |candidate| {
        log::debug!("Connecting to {} over {}", candidate, transport);
        let socket = create_socket(Family::of(&candidate), transport)?;
        match connect(&socket, &candidate) {
            Ok(()) => Ok((socket, candidate)),
            Err(error) => {
                log::warn!("Couldn't connect to {}: {}", candidate, error);
                Err(error)
            }
        }
    })
}

/// Accepts a pending connection on a listening socket.
///
/// Returns the client socket together with its address.
///
/// # Errors
///
/// If this function encounters any form of I/O error, an error variant will be
/// returned.
pub fn accept_client(listener: &Socket) -> io::Result<(Socket, SocketAddr)> {
    let mut address = SockAddr::empty();

    // Safety: Calling `Socket::accept` ffi method with pointers to address
    // and its length is safe, as both have been allocated and the length
    // holds the address storage size.
    let client = unsafe { listener.accept(address.as_mut_ptr(), address.length_mut()) }
        .operation("accept")?;

    Ok((client, address.to_socket_addr()?))
}

/// Returns the address `socket` is bound to.
///
/// # Errors
///
/// If this function encounters any form of I/O error, an error variant will be
/// returned.
pub fn local_address(socket: &Socket) -> io::Result<SocketAddr> {
    let mut address = SockAddr::empty();

    // Safety: Calling `Socket::local_address` ffi method with pointers to
    // address and its length is safe, as both have been allocated and the
    // length holds the address storage size.
    unsafe { socket.local_address(address.as_mut_ptr(), address.length_mut()) }
        .operation("getsockname")?;

    address.to_socket_addr()
}

fn bind(socket: &Socket, address: &SocketAddr) -> io::Result<()> {
    let address = SockAddr::from(address);

    // Safety: Calling `Socket::bind` ffi method with a pointer to address is
    // safe at this point, now that the structure has been allocated and
    // properly initialized.
    unsafe { socket.bind(address.as_ptr(), address.length()) }.operation("bind")
}

fn connect(socket: &Socket, address: &SocketAddr) -> io::Result<()> {
    let address = SockAddr::from(address);

    // Safety: Calling `Socket::connect` ffi method with a pointer to address
    // is safe at this point, now that the structure has been allocated and
    // properly initialized.
    unsafe { socket.connect(address.as_ptr(), address.length()) }.operation("connect")
}

#[cfg(test)]
mod tests {
    use std::{net::Ipv4Addr, thread};

    use super::*;

    fn loopback_server(transport: Transport) -> (Socket, SocketAddr) {
        create_server(
            Family::Inet,
            transport,
            Some("127.0.0.1"),
            &Service::Port(0),
            Backlog::default(),
        )
        .unwrap()
    }

    #[test]
    fn create_socket_rejects_unspecified_family() {
        let error = create_socket(Family::Unspecified, Transport::Stream).err().unwrap();
        assert_eq!(io::ErrorKind::Unsupported, error.kind());
    }

    #[test]
    fn create_server_rejects_unspecified_family() {
        let error = create_server(
            Family::Unspecified,
            Transport::Stream,
            None,
            &Service::Port(0),
            Backlog::default(),
        )
        .err()
        .unwrap();
        assert_eq!(io::ErrorKind::Unsupported, error.kind());
    }

    #[test]
    fn create_server_reports_the_bound_address() {
        let (_server, address) = loopback_server(Transport::Stream);

        assert_eq!(Ipv4Addr::LOCALHOST, address.ip());
        assert_ne!(0, address.port());
    }

    #[test]
    fn create_server_fails_on_address_in_use() {
        let (_server, address) = loopback_server(Transport::Datagram);

        let error = create_server(
            Family::Inet,
            Transport::Datagram,
            Some("127.0.0.1"),
            &Service::Port(address.port()),
            Backlog::default(),
        )
        .err()
        .unwrap();
        assert_eq!(io::ErrorKind::AddrInUse, error.kind());
        assert!(error.to_string().starts_with("bind: "));
    }

    #[test]
    fn create_server_rejects_foreign_family_address() {
        let result = create_server(
            Family::Inet,
            Transport::Stream,
            Some("::1"),
            &Service::Port(0),
            Backlog::default(),
        );
        assert!(result.is_err());
    }

    #[test]
    fn stream_client_connects_and_gets_accepted() {
        let (server, address) = loopback_server(Transport::Stream);

        let acceptor = thread::spawn(move || accept_client(&server).map(|(_, peer)| peer));

        let (client, peer) = create_connection(
            Family::Unspecified,
            Transport::Stream,
            "127.0.0.1",
            &Service::Port(address.port()),
        )
        .unwrap();
        assert_eq!(address, peer);

        let accepted_peer = acceptor.join().unwrap().unwrap();
        assert_eq!(local_address(&client).unwrap(), accepted_peer);
    }

    /// A bound but not listening socket, which refuses stream connections.
    fn refusing_endpoint() -> (Socket, SocketAddr) {
        let socket = create_socket(Family::Inet, Transport::Stream).unwrap();
        bind(&socket, &SocketAddr::from((Ipv4Addr::LOCALHOST, 0))).unwrap();
        let address = local_address(&socket).unwrap();

        (socket, address)
    }

    #[test]
    fn stream_client_fails_when_nobody_listens() {
        let (_socket, address) = refusing_endpoint();

        let error = create_connection(
            Family::Inet,
            Transport::Stream,
            "127.0.0.1",
            &Service::Port(address.port()),
        )
        .err()
        .unwrap();
        assert_eq!(io::ErrorKind::ConnectionRefused, error.kind());
        assert!(error.to_string().starts_with("connect: "));
    }

    #[test]
    fn connect_any_falls_back_to_the_next_candidate() {
        let (_refusing, refused) = refusing_endpoint();
        let (server, address) = loopback_server(Transport::Stream);

        let acceptor = thread::spawn(move || accept_client(&server).map(|(_, peer)| peer));

        let (client, peer) = connect_any(&[refused, address], Transport::Stream).unwrap();
        assert_eq!(address, peer);

        let accepted_peer = acceptor.join().unwrap().unwrap();
        assert_eq!(local_address(&client).unwrap(), accepted_peer);
    }

    #[test]
    fn connect_any_returns_the_last_candidate_error() {
        let (_first, first) = refusing_endpoint();
        let (_last, last) = refusing_endpoint();

        let error = connect_any(&[first, last], Transport::Stream).err().unwrap();
        assert_eq!(io::ErrorKind::ConnectionRefused, error.kind());
    }

    #[test]
    fn connect_any_without_candidates_fails() {
        let error = connect_any(&[], Transport::Stream).err().unwrap();
        assert_eq!(io::ErrorKind::NotFound, error.kind());
    }

    #[test]
    fn datagram_client_connects_without_a_listener() {
        let (_server, address) = loopback_server(Transport::Datagram);

        let (_client, peer) = create_connection(
            Family::Inet,
            Transport::Datagram,
            "127.0.0.1",
            &Service::Port(address.port()),
        )
        .unwrap();
        assert_eq!(address, peer);
    }
}
