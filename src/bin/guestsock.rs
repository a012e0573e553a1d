//! guestsock CLI tool
//!
//! Inspects the proxy configuration and runs a loopback round-trip through
//! the proxy, playing the part of a guest.

use std::net::{Ipv4Addr, SocketAddrV4, UdpSocket};
use std::process;
use std::thread;
use std::time::Duration;

use clap::{Parser, Subcommand};

use guestsock::{
    debug, parse_sockaddr_in, sockaddr_in_bytes, GuestMemory, GuestRam, GuestReturn, LibcSockets,
    ProxyBuilder, ProxyConfig,
};

/// Guest physical address where the demo RAM starts.
const GUEST_RAM_BASE: u64 = 0x4000_0000;
const GUEST_RAM_SIZE: usize = 64 * 1024;

/// Guest buffer layout used by `echo`.
const ADDR_OFF: u64 = 0x0000;
const TX_OFF: u64 = 0x1000;
const RX_OFF: u64 = 0x4000;

#[derive(Parser, Debug)]
#[command(name = "guestsock", version, about = "Host-side socket proxy for microVM guests")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show the effective proxy configuration
    Info,
    /// Send a datagram through the proxy to a local peer and read the echo
    Echo {
        /// Payload to send
        #[arg(long, default_value = "hello from the guest")]
        message: String,
        /// How many times to poll for the reply before giving up
        #[arg(long, default_value_t = 100)]
        polls: u32,
    },
    /// Print version information
    Version,
}

fn main() {
    debug::init_logging();
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Command::Info => cmd_info(),
        Command::Echo { message, polls } => cmd_echo(&message, polls),
        Command::Version => {
            println!("guestsock {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn cmd_info() -> Result<(), Box<dyn std::error::Error>> {
    let config = ProxyConfig::from_env()?;
    println!("Proxy Configuration");
    println!("===================");
    println!("Descriptor slots:   {}", config.max_descriptors);
    println!("Address staging:    {} bytes", config.max_addr_len);
    println!("Transfer staging:   {} bytes", config.max_transfer);

    #[cfg(target_os = "linux")]
    println!("Platform: Linux");
    #[cfg(target_os = "macos")]
    println!("Platform: macOS");

    Ok(())
}

fn cmd_echo(message: &str, polls: u32) -> Result<(), Box<dyn std::error::Error>> {
    let config = ProxyConfig::from_env()?;
    if message.len() > config.max_transfer {
        return Err(format!(
            "message is {} bytes, transfer staging holds {}",
            message.len(),
            config.max_transfer
        )
        .into());
    }

    let mut ram = GuestRam::new(GUEST_RAM_BASE, GUEST_RAM_SIZE)?;
    let mut proxy = ProxyBuilder::from_config(config).build(LibcSockets)?;

    // Host-side peer that echoes one datagram back.
    let peer = UdpSocket::bind(SocketAddrV4::new(Ipv4Addr::LOCALHOST, 0))?;
    let peer_addr = match peer.local_addr()? {
        std::net::SocketAddr::V4(addr) => addr,
        other => return Err(format!("unexpected peer address {}", other).into()),
    };
    println!("[HOST] peer listening on {}", peer_addr);

    let addr = sockaddr_in_bytes(peer_addr);
    ram.write(GUEST_RAM_BASE + ADDR_OFF, &addr)?;
    ram.write(GUEST_RAM_BASE + TX_OFF, message.as_bytes())?;

    let handle = proxy.open(libc::AF_INET, libc::SOCK_DGRAM, 0)?;
    println!("[GUEST] open -> handle {}", handle);

    proxy.connect(&mut ram, handle, GUEST_RAM_BASE + ADDR_OFF, addr.len() as u32)?;
    let sent = proxy.send(&mut ram, handle, GUEST_RAM_BASE + TX_OFF, message.len(), 0)?;
    println!("[GUEST] send -> {} bytes", sent);

    let mut buf = vec![0u8; config.max_transfer];
    let (n, from) = peer.recv_from(&mut buf)?;
    println!("[HOST] peer got {} bytes from {}", n, from);
    peer.send_to(&buf[..n], from)?;

    // The proxy never waits; polling is the guest's job.
    let mut polls_left = polls;
    let received = loop {
        match proxy.recv(&mut ram, handle, GUEST_RAM_BASE + RX_OFF, config.max_transfer, 0) {
            Err(e) if e.is_would_block() && polls_left > 0 => {
                polls_left -= 1;
                thread::sleep(Duration::from_millis(10));
            }
            other => break other,
        }
    };
    let ret = GuestReturn::from_len(&received);
    println!("[GUEST] recv -> value {}, errno {}", ret.value, ret.errno);
    let n = received?;

    let mut reply = vec![0u8; n];
    ram.read(GUEST_RAM_BASE + RX_OFF, &mut reply)?;
    println!("[GUEST] reply {:?}", String::from_utf8_lossy(&reply));

    let mut staged = vec![0u8; addr.len()];
    ram.read(GUEST_RAM_BASE + ADDR_OFF, &mut staged)?;
    if let Some(target) = parse_sockaddr_in(&staged) {
        println!("[GUEST] connected to {}", target);
    }

    proxy.close(handle)?;
    Ok(())
}
