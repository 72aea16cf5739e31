// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2022 Juan Palacios <jpalaciosdev@gmail.com>

//! Internet domain addressing workflows.

use std::{
    borrow::Cow,
    fmt, io,
    net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr},
};

use super::Family;

/// Parses a port number made only of decimal digits.
pub fn parse_port_number(text: &str) -> Option<u16> {
    if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    text.parse().ok()
}

/// Converts a textual IP address of the given `family` into its binary form.
pub fn parse_ip_literal(family: Family, text: &str) -> Option<IpAddr> {
    text.parse::<IpAddr>().ok().filter(|ip| family.accepts(ip))
}

/// Whether `text` is a literal IP address of the given `family`.
pub fn is_ip_address(family: Family, text: &str) -> bool {
    parse_ip_literal(family, text).is_some()
}

/// Builds a socket address without name resolution.
///
/// A missing `host` stands for the wildcard address of `family`. Returns
/// `None` when `host` is not a literal address of `family` or when a wildcard
/// address is requested for [`Family::Unspecified`].
pub fn literal_endpoint(family: Family, host: Option<&str>, port: u16) -> Option<SocketAddr> {
    let ip = match host {
        Some(host) => parse_ip_literal(family, host)?,
        None => match family {
            Family::Inet => Ipv4Addr::UNSPECIFIED.into(),
            Family::Inet6 => Ipv6Addr::UNSPECIFIED.into(),
            Family::Unspecified => return None,
        },
    };

    Some(SocketAddr::new(ip, port))
}

/// Renders a formatted message into its wire form, which includes a trailing
/// NUL terminator.
pub fn render_message(args: fmt::Arguments<'_>) -> Vec<u8> {
    let mut message = fmt::format(args).into_bytes();
    message.push(0);
    message
}

/// Number of bytes that can be received into a buffer of `buffer_len` bytes
/// while keeping room for the NUL terminator.
pub fn receive_capacity(buffer_len: usize) -> Option<usize> {
    buffer_len.checked_sub(1)
}

/// Returns the text of a received message, up to its first NUL byte.
pub fn message_text(bytes: &[u8]) -> Cow<'_, str> {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end])
}

/// Calls `attempt` on each candidate in order and returns the first success.
///
/// # Errors
///
/// Fails with the last error when every candidate fails, or with
/// [`io::ErrorKind::NotFound`] when there are no candidates at all.
pub fn first_success<C, T, F>(
    candidates: impl IntoIterator<Item = C>,
    mut attempt: F,
) -> io::Result<T>
where
    F: FnMut(C) -> io::Result<T>,
{
    let mut last_error = None;
    for candidate in candidates {
        match attempt(candidate) {
            Ok(value) => return Ok(value),
            Err(error) => last_error = Some(error),
        }
    }

    Err(last_error
        .unwrap_or_else(|| io::Error::new(io::ErrorKind::NotFound, "No candidate addresses")))
}
