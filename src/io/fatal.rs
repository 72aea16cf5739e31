// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2022 Juan Palacios <jpalaciosdev@gmail.com>

//! Error reporting helpers.
//!
//! Failures carry the name of the operation that produced them. Programs
//! that cannot recover from a failure report it and terminate through the
//! `fatal` family of functions.

use std::{fmt, io, process};

use super::socket::Socket;

/// Annotates errors with the name of the failing operation.
pub trait Operation<T> {
    /// Prefixes `name` to the error message, keeping its kind, the way
    /// `perror` does.
    fn operation(self, name: &str) -> io::Result<T>;
}

impl<T> Operation<T> for io::Result<T> {
    fn operation(self, name: &str) -> io::Result<T> {
        self.map_err(|error| io::Error::new(error.kind(), format!("{}: {}", name, error)))
    }
}

/// Unwraps a result or terminates the program reporting its error.
pub trait OrExit<T> {
    fn or_exit(self) -> T;
}

impl<T, E: fmt::Display> OrExit<T> for Result<T, E> {
    fn or_exit(self) -> T {
        match self {
            Ok(value) => value,
            Err(error) => fatal(error),
        }
    }
}

/// Reports `error` and terminates the program.
pub fn fatal(error: impl fmt::Display) -> ! {
    eprintln!("{:#}", error);
    process::exit(libc::EXIT_FAILURE)
}

/// Reports `error`, closes `socket` and terminates the program.
pub fn fatal_with_close(socket: Socket, error: impl fmt::Display) -> ! {
    eprintln!("{:#}", error);
    drop(socket);
    process::exit(libc::EXIT_FAILURE)
}

/// Prints `message` and terminates the program.
pub fn exit_with_message(message: &str) -> ! {
    eprintln!("{}", message);
    process::exit(libc::EXIT_FAILURE)
}

/// Prints `message`, closes `socket` and terminates the program.
pub fn exit_and_close_with_message(socket: Socket, message: &str) -> ! {
    eprintln!("{}", message);
    drop(socket);
    process::exit(libc::EXIT_FAILURE)
}
