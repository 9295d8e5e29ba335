//! Native port probe
//!
//! On Linux the kernel socket tables in `/proc/net/tcp{,6}` are read directly;
//! elsewhere the probe falls back to a bind attempt.

use std::io;

use pf_core::error::Result;
use pf_core::traits::PortProbe;
use pf_core::Port;

/// TCP state code for LISTEN in `/proc/net/tcp`
const TCP_LISTEN: &str = "0A";

/// Kernel socket tables scanned for listeners
pub(crate) const PROC_NET_TABLES: [&str; 2] = ["/proc/net/tcp", "/proc/net/tcp6"];

/// Port probe for the local host
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemPortProbe;

impl SystemPortProbe {
    pub fn new() -> Self {
        Self
    }
}

impl PortProbe for SystemPortProbe {
    #[cfg(target_os = "linux")]
    fn is_listening(&self, port: Port) -> Result<bool> {
        Ok(!listening_socket_inodes(port)?.is_empty())
    }

    #[cfg(not(target_os = "linux"))]
    fn is_listening(&self, port: Port) -> Result<bool> {
        Ok(!can_bind(port)?)
    }
}

/// Inodes of every listening TCP socket bound to `port`
pub(crate) fn listening_socket_inodes(port: Port) -> Result<Vec<u64>> {
    let mut inodes = Vec::new();
    for table in PROC_NET_TABLES {
        match std::fs::read_to_string(table) {
            Ok(content) => inodes.extend(parse_listening_inodes(&content, port)),
            // tcp6 is absent when IPv6 is disabled
            Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(inodes)
}

/// Extract listening socket inodes for `port` from one `/proc/net/tcp*` table
pub(crate) fn parse_listening_inodes(table: &str, port: Port) -> Vec<u64> {
    table
        .lines()
        .skip(1)
        .filter_map(|line| {
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() < 10 || fields[3] != TCP_LISTEN {
                return None;
            }
            let (_, local_port) = fields[1].rsplit_once(':')?;
            let local_port = u16::from_str_radix(local_port, 16).ok()?;
            if local_port != port.get() {
                return None;
            }
            fields[9].parse::<u64>().ok()
        })
        .collect()
}

/// Whether both the IPv4 and IPv6 wildcard addresses can be bound
#[cfg_attr(target_os = "linux", allow(dead_code))]
pub(crate) fn can_bind(port: Port) -> Result<bool> {
    for addr in [format!("0.0.0.0:{}", port), format!("[::]:{}", port)] {
        match std::net::TcpListener::bind(&addr) {
            Ok(_) => {}
            Err(e) if e.kind() == io::ErrorKind::AddrInUse => return Ok(false),
            // no IPv6 stack
            Err(e) if e.kind() == io::ErrorKind::AddrNotAvailable => {}
            Err(e) => return Err(e.into()),
        }
    }
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TABLE: &str = "  sl  local_address rem_address   st tx_queue rx_queue tr tm->when retrnsmt   uid  timeout inode
   0: 00000000:1F90 00000000:0000 0A 00000000:00000000 00:00000000 00000000     0        0 31337 1 0000000000000000 100 0 0 10 0
   1: 0100007F:0016 00000000:0000 0A 00000000:00000000 00:00000000 00000000     0        0 4242 1 0000000000000000 100 0 0 10 0
   2: 0100007F:1F90 0100007F:A1B2 01 00000000:00000000 00:00000000 00000000     0        0 5555 1 0000000000000000 20 4 30 10 -1
";

    #[test]
    fn test_parse_listening_inodes_filters_state_and_port() {
        let port = Port::new(8080).unwrap();
        assert_eq!(parse_listening_inodes(TABLE, port), vec![31337]);
        assert_eq!(parse_listening_inodes(TABLE, Port::new(22).unwrap()), vec![4242]);
        assert!(parse_listening_inodes(TABLE, Port::new(443).unwrap()).is_empty());
    }

    #[test]
    fn test_parse_ipv6_table() {
        let table = "  sl  local_address                         remote_address                        st tx_queue rx_queue tr tm->when retrnsmt   uid  timeout inode
   0: 00000000000000000000000000000000:01BB 00000000000000000000000000000000:0000 0A 00000000:00000000 00:00000000 00000000     0        0 777 1 0000000000000000 100 0 0 10 0
";
        assert_eq!(parse_listening_inodes(table, Port::new(443).unwrap()), vec![777]);
    }

    #[test]
    fn test_probe_sees_live_listener() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = Port::new(listener.local_addr().unwrap().port() as u32).unwrap();
        assert!(SystemPortProbe::new().is_listening(port).unwrap());
    }
}
