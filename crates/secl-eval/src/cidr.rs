//! CIDR parsing and constant network sets.
//!
//! Bare IP literals normalise to host networks (`/32`, `/128` for v6). Two
//! networks match when either contains the other, which makes an IP-in-CIDR
//! test the host-network special case of the general rule.

use std::net::IpAddr;

use ipnet::IpNet;
use secl_ast::Pos;

use crate::error::{CompileError, Result};

/// Parse a CIDR, accepting bare IPs as host networks.
pub fn parse_cidr(literal: &str) -> Result<IpNet> {
    if let Ok(net) = literal.parse::<IpNet>() {
        return Ok(net);
    }
    if let Ok(ip) = literal.parse::<IpAddr>() {
        return Ok(host_net(ip));
    }
    Err(CompileError::InvalidCidr {
        pos: Pos::default(),
        literal: literal.to_string(),
    })
}

/// The host network of a single address.
pub fn host_net(ip: IpAddr) -> IpNet {
    match ip {
        IpAddr::V4(v4) => IpNet::V4(ipnet::Ipv4Net::new(v4, 32).expect("/32 is valid")),
        IpAddr::V6(v6) => IpNet::V6(ipnet::Ipv6Net::new(v6, 128).expect("/128 is valid")),
    }
}

/// Whether two networks match: either one contains the other.
pub fn nets_match(a: &IpNet, b: &IpNet) -> bool {
    a.contains(b) || b.contains(a)
}

/// A constant set of networks, precompiled for containment tests.
#[derive(Debug, Clone, Default)]
pub struct CidrValues {
    nets: Vec<IpNet>,
}

impl CidrValues {
    /// Add a CIDR literal member.
    pub fn append_cidr(&mut self, literal: &str) -> Result<()> {
        self.nets.push(parse_cidr(literal)?);
        Ok(())
    }

    /// Add a bare IP member as its host network.
    pub fn append_ip(&mut self, literal: &str) -> Result<()> {
        let ip: IpAddr = literal.parse().map_err(|_| CompileError::InvalidCidr {
            pos: Pos::default(),
            literal: literal.to_string(),
        })?;
        self.nets.push(host_net(ip));
        Ok(())
    }

    /// Whether the candidate network matches any member.
    pub fn matches(&self, candidate: &IpNet) -> bool {
        self.nets.iter().any(|net| nets_match(net, candidate))
    }

    pub fn len(&self) -> usize {
        self.nets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nets.is_empty()
    }
}
