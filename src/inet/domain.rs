// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2022 Juan Palacios <jpalaciosdev@gmail.com>

//! Internet domain addressing model.

use std::{
    convert::Infallible,
    fmt,
    net::{IpAddr, SocketAddr},
    str::FromStr,
};

use super::workflow::parse_port_number;

/// Address family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Family {
    Inet,
    Inet6,
    /// Any of the above. Only meaningful for name resolution and client
    /// connections.
    Unspecified,
}

/// Socket transport type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Transport {
    Stream,
    Datagram,
}

/// Port number or service name, like `80` or `http`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Service {
    Port(u16),
    Name(String),
}

/// Maximum number of pending connections queued by a listening socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Backlog(i32);

/// Host and service names of a socket address.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NameInfo {
    pub host: String,
    pub service: String,
}

// --- Implementations

impl Family {
    /// Returns the family of a concrete socket `address`.
    pub fn of(address: &SocketAddr) -> Self {
        match address {
            SocketAddr::V4(_) => Family::Inet,
            SocketAddr::V6(_) => Family::Inet6,
        }
    }

    /// Whether an `ip` address belongs to this family.
    pub fn accepts(&self, ip: &IpAddr) -> bool {
        matches!(
            (self, ip),
            (Family::Unspecified, _)
                | (Family::Inet, IpAddr::V4(_))
                | (Family::Inet6, IpAddr::V6(_))
        )
    }
}

impl fmt::Display for Family {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Family::Inet => write!(f, "IPv4"),
            Family::Inet6 => write!(f, "IPv6"),
            Family::Unspecified => write!(f, "IPv4/IPv6"),
        }
    }
}

impl Transport {
    /// Only connection oriented transports listen for and accept peers.
    pub fn is_connection_oriented(&self) -> bool {
        *self == Transport::Stream
    }
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Transport::Stream => write!(f, "TCP"),
            Transport::Datagram => write!(f, "UDP"),
        }
    }
}

impl From<u16> for Service {
    fn from(value: u16) -> Self {
        Service::Port(value)
    }
}

impl FromStr for Service {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match parse_port_number(s) {
            Some(port) => Service::Port(port),
            None => Service::Name(s.to_owned()),
        })
    }
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Service::Port(port) => write!(f, "{}", port),
            Service::Name(name) => write!(f, "{}", name),
        }
    }
}

impl Default for Backlog {
    fn default() -> Self {
        Backlog(10)
    }
}

impl From<i32> for Backlog {
    fn from(value: i32) -> Self {
        Backlog(value)
    }
}

impl AsRef<i32> for Backlog {
    fn as_ref(&self) -> &i32 {
        &self.0
    }
}

impl fmt::Display for Backlog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for NameInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.service)
    }
}

#[cfg(test)]
mod tests {
    use std::net::{Ipv4Addr, Ipv6Addr};

    use super::*;

    #[test]
    fn service_from_digits_is_a_port() {
        assert_eq!(Service::Port(3000), "3000".parse().unwrap());
        assert_eq!(Service::Port(0), "0".parse().unwrap());
    }

    #[test]
    fn service_from_anything_else_is_a_name() {
        assert_eq!(Service::Name("http".into()), "http".parse().unwrap());
        assert_eq!(Service::Name("8o".into()), "8o".parse().unwrap());
        assert_eq!(Service::Name("70000".into()), "70000".parse().unwrap());
    }

    #[test]
    fn family_of_socket_addresses() {
        let v4 = SocketAddr::from((Ipv4Addr::LOCALHOST, 80));
        let v6 = SocketAddr::from((Ipv6Addr::LOCALHOST, 80));

        assert_eq!(Family::Inet, Family::of(&v4));
        assert_eq!(Family::Inet6, Family::of(&v6));
    }

    #[test]
    fn family_accepts_matching_addresses_only() {
        let v4 = IpAddr::from(Ipv4Addr::LOCALHOST);
        let v6 = IpAddr::from(Ipv6Addr::LOCALHOST);

        assert!(Family::Inet.accepts(&v4));
        assert!(!Family::Inet.accepts(&v6));
        assert!(Family::Inet6.accepts(&v6));
        assert!(!Family::Inet6.accepts(&v4));
        assert!(Family::Unspecified.accepts(&v4));
        assert!(Family::Unspecified.accepts(&v6));
    }

    #[test]
    fn only_streams_are_connection_oriented() {
        assert!(Transport::Stream.is_connection_oriented());
        assert!(!Transport::Datagram.is_connection_oriented());
    }

    #[test]
    fn default_backlog() {
        assert_eq!(&10, Backlog::default().as_ref());
    }
}
