// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2022 Juan Palacios <jpalaciosdev@gmail.com>

//! Input / Output utilities and related modules.

pub mod factory;
pub mod fatal;
pub mod message;
pub mod resolver;
pub mod socket;

mod sockaddr;
