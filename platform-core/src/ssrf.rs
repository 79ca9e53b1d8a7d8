//! SSRF guard for proxy-rule target URLs
//!
//! Rejects targets that resolve into private/link-local/metadata address
//! space, with an explicit allowlist for same-cluster hops. Checked once at
//! rule-creation time and lazily re-checked before every proxied request,
//! since DNS answers can change after creation.

use std::net::IpAddr;

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SsrfError {
    #[error("target URL must use https unless the host is in the permitted-internal set")]
    NonHttpsDisallowed,

    #[error("target host resolves into a disallowed private address range")]
    PrivateAddress,

    #[error("target URL has no host")]
    NoHost,
}

/// Hosts explicitly permitted for same-cluster hops despite being "private".
fn is_allowlisted_host(host: &str) -> bool {
    let host = host.trim_end_matches('.');
    host == "localhost"
        || host == "127.0.0.1"
        || host.ends_with(".svc")
        || host.ends_with(".svc.cluster.local")
}

/// Whether `ip` falls in a disallowed private/link-local/metadata range.
pub fn is_blocked_ip(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            v4.is_private()
                || v4.is_loopback()
                || v4.is_link_local()
                || v4 == std::net::Ipv4Addr::new(169, 254, 169, 254)
        }
        IpAddr::V6(v6) => {
            let segments = v6.segments();
            // fc00::/7
            (segments[0] & 0xfe00) == 0xfc00
                // fe80::/10
                || (segments[0] & 0xffc0) == 0xfe80
        }
    }
}

/// Check a target URL's scheme and host against the SSRF policy.
///
/// `resolved_ips` is the set of addresses the host resolved to (the caller
/// performs DNS resolution, since that's an I/O step this module shouldn't
/// own). An empty slice is treated as "could not resolve" and is rejected.
pub fn check(target_url: &http::Uri, resolved_ips: &[IpAddr]) -> Result<(), SsrfError> {
    let host = target_url.host().ok_or(SsrfError::NoHost)?;
    let scheme_is_https = target_url.scheme_str() == Some("https");
    let allowlisted = is_allowlisted_host(host);

    if !scheme_is_https && !allowlisted {
        return Err(SsrfError::NonHttpsDisallowed);
    }

    if allowlisted {
        return Ok(());
    }

    if resolved_ips.is_empty() || resolved_ips.iter().any(|ip| is_blocked_ip(*ip)) {
        return Err(SsrfError::PrivateAddress);
    }

    Ok(())
}
