//! Best-effort reverse DNS.

use std::net::{IpAddr, SocketAddr};

/// Reverse-resolves `ip`, falling back to its textual form. The blocking
/// getnameinfo call runs off the runtime's worker threads.
pub async fn reverse_resolve(ip: IpAddr) -> String {
    let fallback = ip.to_string();
    let task = tokio::task::spawn_blocking(move || {
        dns_lookup::getnameinfo(&SocketAddr::new(ip, 0), 0)
            .ok()
            .map(|(host, _service)| host)
    });
    match task.await {
        Ok(Some(hostname)) => hostname,
        _ => fallback,
    }
}
