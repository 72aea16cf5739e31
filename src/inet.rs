// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2022 Juan Palacios <jpalaciosdev@gmail.com>

//! Internet domain addressing bounded context.

pub mod domain;
pub mod workflow;

pub use domain::{Backlog, Family, NameInfo, Service, Transport};
pub use workflow::{
    first_success, is_ip_address, literal_endpoint, message_text, parse_ip_literal,
    parse_port_number, receive_capacity, render_message,
};
