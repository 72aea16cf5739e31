// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2022 Juan Palacios <jpalaciosdev@gmail.com>

use anyhow::{Context, Result};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use inetsock::{
    inet::{message_text, Backlog, Family, Service, Transport},
    io::{
        factory,
        fatal::{exit_and_close_with_message, exit_with_message, fatal_with_close, OrExit},
        message, resolver,
        socket::Socket,
    },
    sendf, sendf_to,
};
use std::{
    fmt,
    io::{self, Write},
    net::{IpAddr, SocketAddr},
    sync::{self, atomic},
    time::Duration,
};
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

const CMD_SERVER_NAME: &str = "server";
const CMD_CLIENT_NAME: &str = "client";
const CMD_RESOLVE_NAME: &str = "resolve";
const CMD_LOOKUP_NAME: &str = "lookup";

const ARG_NOCOLOR_NAME: &str = "nocolor";
const ARG_INET_NAME: &str = "inet";
const ARG_INET6_NAME: &str = "inet6";
const ARG_DATAGRAM_NAME: &str = "udp";
const ARG_HOST_NAME: &str = "host";
const ARG_SERVICE_NAME: &str = "service";
const ARG_BACKLOG_NAME: &str = "backlog";
const ARG_MESSAGE_NAME: &str = "message";
const ARG_BUFFER_SIZE_NAME: &str = "buffer-size";
const ARG_ADDRESS_NAME: &str = "address";
const ARG_PORT_NAME: &str = "port";
const ARG_NUMERIC_NAME: &str = "numeric";

const DEFAULT_PORT: u16 = 3000;
const DEFAULT_MESSAGE: &str = "hi this is a message";
const BUFFER_SIZE: usize = 100;

/// Interval between checks of the stop request while the server waits.
const POLL_INTERVAL: Duration = Duration::from_secs(1);

fn main() -> Result<()> {
    simple_logger::init_with_env().context("Couldn't setup logger")?;

    let args = cmdline_args();
    let color = match args.get_flag(ARG_NOCOLOR_NAME) {
        true => ColorChoice::Never,
        false => ColorChoice::Always,
    };
    let mut stdout = StandardStream::stdout(color);

    match args.subcommand() {
        Some((CMD_SERVER_NAME, args)) => run_server(args, &mut stdout),
        Some((CMD_CLIENT_NAME, args)) => run_client(args, &mut stdout),
        Some((CMD_RESOLVE_NAME, args)) => run_resolve(args, &mut stdout),
        Some((CMD_LOOKUP_NAME, args)) => run_lookup(args, &mut stdout),
        _ => unreachable!("a subcommand is required"),
    }
}

fn cmdline_args() -> ArgMatches {
    Command::new(env!("CARGO_CRATE_NAME"))
        .version(env!("CARGO_PKG_VERSION"))
        .subcommand_required(true)
        .arg(
            Arg::new(ARG_NOCOLOR_NAME)
                .long("no-color")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Do not colorize output"),
        )
        .subcommand(
            Command::new(CMD_SERVER_NAME)
                .about("Serve a message to every client")
                .args(family_args())
                .arg(datagram_arg())
                .arg(
                    Arg::new(ARG_HOST_NAME)
                        .short('b')
                        .long("bind")
                        .help("Local address or host name to bind to [default: any]"),
                )
                .arg(service_arg().short('p').long("port"))
                .arg(
                    Arg::new(ARG_BACKLOG_NAME)
                        .long("backlog")
                        .value_parser(value_parser!(i32))
                        .help("Maximum number of pending connections [default: 10]"),
                )
                .arg(message_arg()),
        )
        .subcommand(
            Command::new(CMD_CLIENT_NAME)
                .about("Receive a message from a server")
                .args(family_args())
                .arg(datagram_arg())
                .arg(
                    Arg::new(ARG_HOST_NAME)
                        .required(true)
                        .help("Server address or host name"),
                )
                .arg(service_arg().short('p').long("port"))
                .arg(message_arg())
                .arg(
                    Arg::new(ARG_BUFFER_SIZE_NAME)
                        .long("buffer-size")
                        .value_parser(value_parser!(usize))
                        .help("Receive buffer size, including the terminator [default: 101]"),
                ),
        )
        .subcommand(
            Command::new(CMD_RESOLVE_NAME)
                .about("List the addresses of a host")
                .args(family_args())
                .arg(datagram_arg())
                .arg(Arg::new(ARG_HOST_NAME).required(true).help("Host name"))
                .arg(service_arg()),
        )
        .subcommand(
            Command::new(CMD_LOOKUP_NAME)
                .about("Get the host and service names of an address")
                .arg(datagram_arg())
                .arg(
                    Arg::new(ARG_NUMERIC_NAME)
                        .short('n')
                        .long("numeric")
                        .action(ArgAction::SetTrue)
                        .help("Do not translate to names"),
                )
                .arg(
                    Arg::new(ARG_ADDRESS_NAME)
                        .required(true)
                        .value_parser(value_parser!(IpAddr))
                        .help("IP address"),
                )
                .arg(
                    Arg::new(ARG_PORT_NAME)
                        .required(true)
                        .value_parser(value_parser!(u16))
                        .help("Port number"),
                ),
        )
        .get_matches()
}

fn family_args() -> [Arg; 2] {
    [
        Arg::new(ARG_INET_NAME)
            .short('4')
            .action(ArgAction::SetTrue)
            .conflicts_with(ARG_INET6_NAME)
            .help("Use IPv4 only"),
        Arg::new(ARG_INET6_NAME)
            .short('6')
            .action(ArgAction::SetTrue)
            .help("Use IPv6 only"),
    ]
}

fn datagram_arg() -> Arg {
    Arg::new(ARG_DATAGRAM_NAME)
        .short('u')
        .long("udp")
        .action(ArgAction::SetTrue)
        .help("Use datagrams (UDP) instead of streams (TCP)")
}

fn service_arg() -> Arg {
    Arg::new(ARG_SERVICE_NAME)
        .value_parser(value_parser!(Service))
        .help("Port number or service name")
}

fn message_arg() -> Arg {
    Arg::new(ARG_MESSAGE_NAME)
        .short('m')
        .long("message")
        .default_value(DEFAULT_MESSAGE)
        .help("Message to send")
}

/// Selected address family. `fallback` is used when none was requested.
fn family(args: &ArgMatches, fallback: Family) -> Family {
    if args.get_flag(ARG_INET_NAME) {
        Family::Inet
    } else if args.get_flag(ARG_INET6_NAME) {
        Family::Inet6
    } else {
        fallback
    }
}

fn transport(args: &ArgMatches) -> Transport {
    match args.get_flag(ARG_DATAGRAM_NAME) {
        true => Transport::Datagram,
        false => Transport::Stream,
    }
}

fn service(args: &ArgMatches, fallback: u16) -> Service {
    args.get_one::<Service>(ARG_SERVICE_NAME)
        .cloned()
        .unwrap_or(Service::Port(fallback))
}

fn text_arg<'a>(args: &'a ArgMatches, name: &str) -> &'a str {
    args.get_one::<String>(name)
        .map(String::as_str)
        .unwrap_or_default()
}

fn run_server(args: &ArgMatches, stdout: &mut StandardStream) -> Result<()> {
    let stop = sync::Arc::new(atomic::AtomicBool::new(false));

    let stop_handle = stop.clone();
    ctrlc::set_handler(move || {
        stop_handle.store(true, atomic::Ordering::Relaxed);
    })
    .context("Couldn't set Ctrl-C handler")?;

    let transport = transport(args);
    let backlog = args
        .get_one::<i32>(ARG_BACKLOG_NAME)
        .copied()
        .map(Backlog::from)
        .unwrap_or_default();
    let message = text_arg(args, ARG_MESSAGE_NAME);

    let (server, address) = factory::create_server(
        family(args, Family::Inet),
        transport,
        args.get_one::<String>(ARG_HOST_NAME).map(String::as_str),
        &service(args, DEFAULT_PORT),
        backlog,
    )
    .or_exit();

    if let Err(e) = server.set_receive_timeout(POLL_INTERVAL) {
        fatal_with_close(server, format!("setsockopt: {}", e));
    }

    print_line(
        stdout,
        None,
        format_args!("{} server waiting on {}", transport, address),
    )?;

    while !stop.load(atomic::Ordering::Relaxed) {
        let served = match transport {
            Transport::Stream => serve_stream_client(&server, message),
            Transport::Datagram => serve_datagram(&server, message, stdout),
        };

        match served {
            Err(e) if is_wake_up(&e) => {}
            Err(e) => log::error!("{}", e),
            Ok(()) => {}
        }
    }

    log::info!("Stopping {} server on {}", transport, address);
    Ok(())
}

fn serve_stream_client(server: &Socket, message: &str) -> io::Result<()> {
    let (client, peer) = factory::accept_client(server)?;
    log::info!("Accepted connection from {}", peer);

    let sent = sendf!(&client, 0, "{}", message)?;
    log::debug!("{} bytes sent to {}", sent, peer);

    Ok(())
}

fn serve_datagram(
    server: &Socket,
    message: &str,
    stdout: &mut StandardStream,
) -> io::Result<()> {
    let mut buffer = [0u8; BUFFER_SIZE + 1];
    let (received, peer) = message::recv_datagram(server, 0, &mut buffer)?;

    print_line(
        stdout,
        Some(Color::Green),
        format_args!(
            "received data from {}: {}",
            peer,
            message_text(&buffer[..received])
        ),
    )?;

    let sent = sendf_to!(server, 0, &peer, "{}", message)?;
    log::debug!("{} bytes sent to {}", sent, peer);

    Ok(())
}

/// Whether `error` only signals that the receive timeout expired or a signal
/// arrived.
fn is_wake_up(error: &io::Error) -> bool {
    matches!(
        error.kind(),
        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut | io::ErrorKind::Interrupted
    )
}

fn run_client(args: &ArgMatches, stdout: &mut StandardStream) -> Result<()> {
    let family = family(args, Family::Unspecified);
    let transport = transport(args);
    let host = text_arg(args, ARG_HOST_NAME);
    let service = service(args, DEFAULT_PORT);
    let buffer_size = args
        .get_one::<usize>(ARG_BUFFER_SIZE_NAME)
        .copied()
        .unwrap_or(BUFFER_SIZE + 1);
    let mut buffer = vec![0u8; buffer_size];

    let (received, peer) = match transport {
        Transport::Stream => {
            let (socket, peer) =
                factory::create_connection(family, transport, host, &service).or_exit();
            log::info!("Connected to {}", peer);

            let received = match message::recv_message(&socket, 0, &mut buffer) {
                Ok(0) => exit_and_close_with_message(socket, "Connection closed by the server"),
                Ok(received) => received,
                Err(e) => fatal_with_close(socket, format!("recv: {}", e)),
            };
            (received, peer)
        }
        Transport::Datagram => {
            let server = match resolver::resolve(host, &service, family, transport)
                .or_exit()
                .into_iter()
                .next()
            {
                Some(server) => server,
                None => exit_with_message(&format!("No addresses found for {}", host)),
            };

            let socket = factory::create_socket(Family::of(&server), transport).or_exit();
            if let Err(e) = sendf_to!(&socket, 0, &server, "{}", text_arg(args, ARG_MESSAGE_NAME)) {
                fatal_with_close(socket, e);
            }

            match message::recv_datagram(&socket, 0, &mut buffer) {
                Ok(datagram) => datagram,
                Err(e) => fatal_with_close(socket, format!("recvfrom: {}", e)),
            }
        }
    };

    print_line(
        stdout,
        Some(Color::Green),
        format_args!(
            "received data from {}: {}",
            peer,
            message_text(&buffer[..received])
        ),
    )?;

    Ok(())
}

fn run_resolve(args: &ArgMatches, stdout: &mut StandardStream) -> Result<()> {
    let host = text_arg(args, ARG_HOST_NAME);
    let addresses = resolver::resolve(
        host,
        &service(args, 0),
        family(args, Family::Unspecified),
        transport(args),
    )
    .with_context(|| format!("Couldn't resolve {}", host))?;

    print_line(stdout, None, format_args!("IP addresses for {}:", host))?;
    for address in addresses {
        print_address(stdout, &address)?;
    }

    Ok(())
}

fn print_address(stdout: &mut StandardStream, address: &SocketAddr) -> io::Result<()> {
    let family = Family::of(address);
    let color = match family {
        Family::Inet6 => Some(Color::Cyan),
        _ => None,
    };

    print_line(
        stdout,
        color,
        format_args!("  {}: {} port {}", family, address.ip(), address.port()),
    )
}

fn run_lookup(args: &ArgMatches, stdout: &mut StandardStream) -> Result<()> {
    let ip = args
        .get_one::<IpAddr>(ARG_ADDRESS_NAME)
        .copied()
        .context("Missing address")?;
    let port = args
        .get_one::<u16>(ARG_PORT_NAME)
        .copied()
        .context("Missing port")?;
    let address = SocketAddr::new(ip, port);

    let info = resolver::name_info(&address, transport(args), args.get_flag(ARG_NUMERIC_NAME))
        .with_context(|| format!("Couldn't look up {}", address))?;

    print_line(stdout, None, format_args!("host: {}", info.host))?;
    print_line(stdout, None, format_args!("service: {}", info.service))?;

    Ok(())
}

fn print_line(
    stdout: &mut StandardStream,
    color: Option<Color>,
    line: fmt::Arguments<'_>,
) -> io::Result<()> {
    if let Err(e) = stdout.set_color(ColorSpec::new().set_fg(color)) {
        log::error!("Couldn't setup output color: {}", e);
    }

    writeln!(stdout, "{}", line)?;
    stdout.reset()
}
