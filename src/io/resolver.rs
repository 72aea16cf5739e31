// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2022 Juan Palacios <jpalaciosdev@gmail.com>

//! Host and service name resolution through [`libc::getaddrinfo`] and
//! [`libc::getnameinfo`].
//!
//! Literal addresses with numeric ports are converted directly, without
//! querying the system resolver.
//!
//! [`libc::getaddrinfo`]: https://docs.rs/libc/latest/libc/fn.getaddrinfo.html
//! [`libc::getnameinfo`]: https://docs.rs/libc/latest/libc/fn.getnameinfo.html

use std::{
    ffi::{CStr, CString},
    io, mem,
    net::SocketAddr,
    ptr,
};

use super::{
    sockaddr::SockAddr,
    socket::{hint_family, socket_type},
};
use crate::inet::{is_ip_address, literal_endpoint, Family, NameInfo, Service, Transport};

/// Service name buffer size for `getnameinfo`, as defined by glibc.
const NI_MAXSERV: usize = 32;

/// Result list of a `getaddrinfo` call. The list is released on drop.
struct AddrInfoList(*mut libc::addrinfo);

impl AddrInfoList {
    /// Collects the socket addresses of the list, in resolver order.
    fn addresses(&self) -> io::Result<Vec<SocketAddr>> {
        let mut addresses = Vec::new();
        let mut entry = self.0;
        while !entry.is_null() {
            // Safety: `entry` is a node of the list returned by `getaddrinfo`,
            // which stays valid until the list is released.
            let info = unsafe { &*entry };
            if !info.ai_addr.is_null() {
                // Safety: `ai_addr` points to an address of `ai_addrlen` bytes.
                let address = unsafe { SockAddr::from_raw(info.ai_addr, info.ai_addrlen) }?;
                addresses.push(address.to_socket_addr()?);
            }
            entry = info.ai_next;
        }

        Ok(addresses)
    }
}

impl Drop for AddrInfoList {
    fn drop(&mut self) {
        if !self.0.is_null() {
            // Safety: The list was allocated by `getaddrinfo` and it's released
            // only once.
            unsafe { libc::freeaddrinfo(self.0) };
        }
    }
}

/// Resolves `host` and `service` into the candidate addresses a client
/// should try, in order.
///
/// # Errors
///
/// If the name cannot be resolved or this function encounters any form of
/// I/O error, an error variant will be returned.
pub fn resolve(
    host: &str,
    service: &Service,
    family: Family,
    transport: Transport,
) -> io::Result<Vec<SocketAddr>> {
    if let Service::Port(port) = service {
        if let Some(address) = literal_endpoint(family, Some(host), *port) {
            return Ok(vec![address]);
        }
    }

    let addresses = lookup(Some(host), service, family, transport, 0)?.addresses()?;
    log::debug!("{} {} resolved to {:?}", host, service, addresses);

    Ok(addresses)
}

/// Resolves the local address a server should bind to. A missing `host`
/// stands for the wildcard address of `family`.
///
/// # Errors
///
/// If the name cannot be resolved or this function encounters any form of
/// I/O error, an error variant will be returned.
pub fn resolve_passive(
    host: Option<&str>,
    service: &Service,
    family: Family,
    transport: Transport,
) -> io::Result<SocketAddr> {
    if let Service::Port(port) = service {
        if let Some(address) = literal_endpoint(family, host, *port) {
            return Ok(address);
        }
    }

    lookup(host, service, family, transport, libc::AI_PASSIVE)?
        .addresses()?
        .into_iter()
        .next()
        .ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("No local address for {}", service),
            )
        })
}

/// Looks up the host and service names of `address`.
///
/// When `numeric` is set, the numeric forms are returned instead of names.
///
/// # Errors
///
/// If the address cannot be translated or this function encounters any form
/// of I/O error, an error variant will be returned.
pub fn name_info(
    address: &SocketAddr,
    transport: Transport,
    numeric: bool,
) -> io::Result<NameInfo> {
    let address = SockAddr::from(address);
    let mut host = [0 as libc::c_char; libc::NI_MAXHOST as usize];
    let mut service = [0 as libc::c_char; NI_MAXSERV];

    let mut flags = 0;
    if transport == Transport::Datagram {
        flags |= libc::NI_DGRAM;
    }
    if numeric {
        flags |= libc::NI_NUMERICHOST | libc::NI_NUMERICSERV;
    }

    // Safety: Both output buffers are allocated with the sizes passed along
    // and the address has been properly initialized.
    let code = unsafe {
        libc::getnameinfo(
            address.as_ptr(),
            address.length(),
            host.as_mut_ptr(),
            host.len() as _,
            service.as_mut_ptr(),
            service.len() as _,
            flags as _,
        )
    };
    if code != 0 {
        return Err(gai_error(code));
    }

    // Safety: `getnameinfo` writes NUL terminated strings on success.
    let (host, service) = unsafe {
        (
            CStr::from_ptr(host.as_ptr()).to_string_lossy().into_owned(),
            CStr::from_ptr(service.as_ptr()).to_string_lossy().into_owned(),
        )
    };

    Ok(NameInfo { host, service })
}

fn lookup(
    host: Option<&str>,
    service: &Service,
    family: Family,
    transport: Transport,
    flags: libc::c_int,
) -> io::Result<AddrInfoList> {
    let numeric_host = host.is_some_and(|host| is_ip_address(Family::Unspecified, host));
    let host = host.map(c_string).transpose()?;
    let service = c_string(&service.to_string())?;

    // Safety: `libc::addrinfo` is a C structure, so it's safe to initialize
    // it with zeros.
    let mut hints = unsafe { mem::zeroed::<libc::addrinfo>() };
    hints.ai_family = hint_family(family);
    hints.ai_socktype = socket_type(transport);
    hints.ai_flags = flags;
    if numeric_host {
        hints.ai_flags |= libc::AI_NUMERICHOST;
    }

    let mut list = ptr::null_mut();

    // Safety: All the pointers passed are either null or point to properly
    // initialized data that outlives the call.
    let code = unsafe {
        libc::getaddrinfo(
            host.as_ref().map_or(ptr::null(), |host| host.as_ptr()),
            service.as_ptr(),
            &hints,
            &mut list,
        )
    };
    if code != 0 {
        return Err(gai_error(code));
    }

    Ok(AddrInfoList(list))
}

fn c_string(value: &str) -> io::Result<CString> {
    CString::new(value).map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))
}

/// Translates a `getaddrinfo` or `getnameinfo` error code.
fn gai_error(code: libc::c_int) -> io::Error {
    if code == libc::EAI_SYSTEM {
        return io::Error::last_os_error();
    }

    // Safety: `gai_strerror` returns a pointer to a static NUL terminated
    // string.
    let message = unsafe { CStr::from_ptr(libc::gai_strerror(code)) }
        .to_string_lossy()
        .into_owned();

    let kind = match code {
        libc::EAI_NONAME => io::ErrorKind::NotFound,
        libc::EAI_SERVICE => io::ErrorKind::InvalidInput,
        _ => io::ErrorKind::Other,
    };

    io::Error::new(kind, message)
}

#[cfg(test)]
mod tests {
    use std::net::{Ipv4Addr, Ipv6Addr};

    use super::*;

    #[test]
    fn resolve_literal_addresses_without_lookup() {
        assert_eq!(
            vec![SocketAddr::from((Ipv4Addr::LOCALHOST, 3000))],
            resolve(
                "127.0.0.1",
                &Service::Port(3000),
                Family::Inet,
                Transport::Stream
            )
            .unwrap()
        );
        assert_eq!(
            vec![SocketAddr::from((Ipv6Addr::LOCALHOST, 3000))],
            resolve(
                "::1",
                &Service::Port(3000),
                Family::Unspecified,
                Transport::Stream
            )
            .unwrap()
        );
    }

    #[test]
    fn resolve_numeric_names_through_the_system_resolver() {
        let service = Service::Name("domain".into());
        let addresses = resolve("127.0.0.1", &service, Family::Inet, Transport::Datagram);

        // the service database may be missing on minimal systems
        if let Ok(addresses) = addresses {
            assert_eq!(vec![SocketAddr::from((Ipv4Addr::LOCALHOST, 53))], addresses);
        }
    }

    #[test]
    fn resolve_fails_on_family_mismatch() {
        assert!(resolve(
            "127.0.0.1",
            &Service::Port(80),
            Family::Inet6,
            Transport::Stream
        )
        .is_err());
    }

    #[test]
    fn resolve_numeric_hosts_of_other_family_fails_with_named_services() {
        let service = Service::Name("domain".into());
        assert!(resolve("127.0.0.1", &service, Family::Inet6, Transport::Datagram).is_err());
        assert!(resolve("::1", &service, Family::Inet, Transport::Datagram).is_err());
    }

    #[test]
    fn resolve_rejects_names_with_nul_bytes() {
        let error = resolve("local\0host", &Service::Port(80), Family::Inet, Transport::Stream)
            .unwrap_err();
        assert_eq!(io::ErrorKind::InvalidInput, error.kind());
    }

    #[test]
    fn resolve_passive_without_host_is_the_wildcard_address() {
        assert_eq!(
            SocketAddr::from((Ipv4Addr::UNSPECIFIED, 8080)),
            resolve_passive(None, &Service::Port(8080), Family::Inet, Transport::Stream).unwrap()
        );
        assert_eq!(
            SocketAddr::from((Ipv6Addr::UNSPECIFIED, 8080)),
            resolve_passive(None, &Service::Port(8080), Family::Inet6, Transport::Datagram)
                .unwrap()
        );
    }

    #[test]
    fn resolve_passive_wildcard_through_the_system_resolver() {
        let address = resolve_passive(
            None,
            &Service::Port(8080),
            Family::Unspecified,
            Transport::Stream,
        )
        .unwrap();

        assert!(address.ip().is_unspecified());
        assert_eq!(8080, address.port());
    }

    #[test]
    fn numeric_name_info() {
        let address = SocketAddr::from((Ipv4Addr::new(8, 8, 8, 8), 53));
        let info = name_info(&address, Transport::Datagram, true).unwrap();

        assert_eq!(
            NameInfo {
                host: "8.8.8.8".into(),
                service: "53".into()
            },
            info
        );
    }

    #[test]
    fn numeric_name_info_of_ipv6_addresses() {
        let address = SocketAddr::from((Ipv6Addr::LOCALHOST, 8080));
        let info = name_info(&address, Transport::Stream, true).unwrap();

        assert_eq!("::1", info.host);
        assert_eq!("8080", info.service);
    }

    #[test]
    fn named_service_fits_the_service_buffer() {
        let address = SocketAddr::from((Ipv4Addr::LOCALHOST, 53));
        let info = name_info(&address, Transport::Datagram, false).unwrap();

        // "domain" when the service database is present, "53" otherwise
        assert!(!info.service.is_empty());
        assert!(info.service.len() < NI_MAXSERV);
    }
}
