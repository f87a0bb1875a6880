use std::net::{IpAddr, Ipv4Addr};

use crate::{is_valid_domain, normalize_domain};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TargetError {
    #[error("'{0}' is not a valid domain name")]
    InvalidDomain(String),
    #[error("'{address}' is not a valid IP address (domain '{domain}')")]
    InvalidAddress { domain: String, address: String },
    #[error("'{address}' is not an IPv4 address (domain '{domain}')")]
    NotIpv4 { domain: String, address: String },
}

/// Parses the address of a target. Only IPv4 addresses are served
pub fn parse_target_address(domain: &str, address: &str) -> Result<Ipv4Addr, TargetError> {
    match address.trim().parse::<IpAddr>() {
        Ok(IpAddr::V4(address)) => Ok(address),
        Ok(IpAddr::V6(_)) => Err(TargetError::NotIpv4 {
            domain: domain.into(),
            address: address.into(),
        }),
        Err(_) => Err(TargetError::InvalidAddress {
            domain: domain.into(),
            address: address.into(),
        }),
    }
}

/// Full validation of user-supplied targets. Returns the normalized domain and the parsed address
pub fn validate_target(domain: &str, address: &str) -> Result<(String, Ipv4Addr), TargetError> {
    if !is_valid_domain(domain.trim()) {
        return Err(TargetError::InvalidDomain(domain.into()));
    }
    let address = parse_target_address(domain, address)?;

    Ok((normalize_domain(domain), address))
}
