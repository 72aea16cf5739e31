// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2022 Juan Palacios <jpalaciosdev@gmail.com>

//! Helpers to create, connect and talk through Internet domain sockets over
//! IPv4 and IPv6, using either stream or datagram transports.

pub mod inet;
pub mod io;
