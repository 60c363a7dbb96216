use std::io;
use std::net::{IpAddr, UdpSocket};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use crossbeam_channel::Receiver;

const EXTERNAL_LOOKUP_URL: &str = "https://api.ipify.org";
const LOOKUP_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug)]
pub enum AddressReport {
    Local(IpAddr),
    External(IpAddr),
    Failed { what: &'static str, error: String },
}

/// Looks up the addresses players should connect to, off the main thread.
pub fn spawn_lookup() -> Receiver<AddressReport> {
    let (tx, rx) = crossbeam_channel::unbounded();
    let spawned = thread::Builder::new()
        .name("address-lookup".to_string())
        .spawn(move || {
            let local = match local_ip() {
                Ok(ip) => AddressReport::Local(ip),
                Err(e) => AddressReport::Failed {
                    what: "local",
                    error: e.to_string(),
                },
            };
            let _ = tx.send(local);

            let external = match external_ip() {
                Ok(ip) => AddressReport::External(ip),
                Err(e) => AddressReport::Failed {
                    what: "external",
                    error: format!("{e:#}"),
                },
            };
            let _ = tx.send(external);
        });
    if let Err(e) = spawned {
        log::warn!("Could not start address lookup: {}", e);
    }
    rx
}

/// The address of the interface that routes to the internet. Connecting a
/// UDP socket sends nothing.
fn local_ip() -> io::Result<IpAddr> {
    let socket = UdpSocket::bind("0.0.0.0:0")?;
    socket.connect("8.8.8.8:80")?;
    Ok(socket.local_addr()?.ip())
}

fn external_ip() -> Result<IpAddr> {
    let client = reqwest::blocking::Client::builder()
        .timeout(LOOKUP_TIMEOUT)
        .build()?;
    let body = client
        .get(EXTERNAL_LOOKUP_URL)
        .send()
        .context("address service unreachable")?
        .error_for_status()?
        .text()?;
    body.trim()
        .parse()
        .with_context(|| format!("unexpected response {:?}", body.trim()))
}
