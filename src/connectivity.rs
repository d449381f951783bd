use std::fs;
use std::net::{IpAddr, UdpSocket};
use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use tracing::{debug, info};

/// Network association status. The relay only reads the boolean signal.
pub trait Connectivity {
    fn is_connected(&self) -> bool;

    fn local_addr(&self) -> Option<IpAddr> {
        None
    }
}

impl<C: Connectivity + ?Sized> Connectivity for Box<C> {
    fn is_connected(&self) -> bool {
        (**self).is_connected()
    }

    fn local_addr(&self) -> Option<IpAddr> {
        (**self).local_addr()
    }
}

/// Treats the network as always associated.
#[derive(Debug, Clone, Default)]
pub struct AlwaysConnected;

impl Connectivity for AlwaysConnected {
    fn is_connected(&self) -> bool {
        true
    }

    fn local_addr(&self) -> Option<IpAddr> {
        probe_local_addr("192.0.2.1:9")
    }
}

/// Link state of one interface, read from sysfs.
#[derive(Debug, Clone)]
pub struct InterfaceLink {
    iface: String,
    operstate: PathBuf,
}

impl InterfaceLink {
    pub fn new(iface: &str) -> Self {
        Self::with_sysfs_root(iface, "/sys/class/net")
    }

    pub fn with_sysfs_root(iface: &str, root: impl Into<PathBuf>) -> Self {
        let operstate = root.into().join(iface).join("operstate");
        Self {
            iface: iface.to_string(),
            operstate,
        }
    }

    pub fn iface(&self) -> &str {
        &self.iface
    }
}

impl Connectivity for InterfaceLink {
    fn is_connected(&self) -> bool {
        fs::read_to_string(&self.operstate)
            .map(|s| s.trim() == "up")
            .unwrap_or(false)
    }

    fn local_addr(&self) -> Option<IpAddr> {
        if !self.is_connected() {
            return None;
        }
        probe_local_addr("192.0.2.1:9")
    }
}

/// Local source address the OS would pick to reach `target`. Connecting a UDP socket
/// sends nothing on the wire.
pub fn probe_local_addr(target: &str) -> Option<IpAddr> {
    let socket = UdpSocket::bind("0.0.0.0:0").ok()?;
    socket.connect(target).ok()?;
    socket.local_addr().ok().map(|a| a.ip())
}

/// Block until `link` reports connected, checking every `step`.
pub fn wait_for_association(link: &dyn Connectivity, step: Duration) {
    let mut attempts: u64 = 0;
    while !link.is_connected() {
        attempts += 1;
        if attempts % 10 == 1 {
            info!(attempts, "waiting for network association");
        } else {
            debug!(attempts, "network not associated yet");
        }
        thread::sleep(step);
    }
    info!("network associated");
}
