//! Link URI parsing
//!
//! Radio addresses follow `radio://<interface>/<channel>/<datarate>[/<address>]`,
//! e.g. `radio://0/80/2M/E7E7E7E7E7`. `sim://<name>` selects the simulated link.

use super::LinkError;
use std::fmt;
use std::str::FromStr;

/// Highest radio channel (2400 MHz + channel)
pub const MAX_CHANNEL: u8 = 125;

/// Factory default radio address
pub const DEFAULT_ADDRESS: u64 = 0xE7E7E7E7E7;

/// Radio datarate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Datarate {
    Kbps250,
    Mbps1,
    Mbps2,
}

impl fmt::Display for Datarate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Datarate::Kbps250 => write!(f, "250K"),
            Datarate::Mbps1 => write!(f, "1M"),
            Datarate::Mbps2 => write!(f, "2M"),
        }
    }
}

impl FromStr for Datarate {
    type Err = LinkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "250K" => Ok(Datarate::Kbps250),
            "1M" => Ok(Datarate::Mbps1),
            "2M" => Ok(Datarate::Mbps2),
            other => Err(LinkError::InvalidUri(format!("unknown datarate {}", other))),
        }
    }
}

/// Parsed link address
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkUri {
    Radio {
        interface: u8,
        channel: u8,
        datarate: Datarate,
        address: u64,
    },
    Sim {
        name: String,
    },
}

impl LinkUri {
    pub fn is_sim(&self) -> bool {
        matches!(self, LinkUri::Sim { .. })
    }
}

impl fmt::Display for LinkUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkUri::Radio {
                interface,
                channel,
                datarate,
                address,
            } => {
                write!(f, "radio://{}/{}/{}", interface, channel, datarate)?;
                if *address != DEFAULT_ADDRESS {
                    write!(f, "/{:010X}", address)?;
                }
                Ok(())
            }
            LinkUri::Sim { name } => write!(f, "sim://{}", name),
        }
    }
}

impl FromStr for LinkUri {
    type Err = LinkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |why: &str| LinkError::InvalidUri(format!("{}: {}", s, why));

        if let Some(name) = s.strip_prefix("sim://") {
            if name.is_empty() {
                return Err(invalid("missing simulator name"));
            }
            return Ok(LinkUri::Sim { name: name.into() });
        }

        let rest = s
            .strip_prefix("radio://")
            .ok_or_else(|| invalid("expected radio:// or sim://"))?;
        let parts: Vec<&str> = rest.split('/').collect();
        if parts.len() < 3 || parts.len() > 4 {
            return Err(invalid("expected interface/channel/datarate[/address]"));
        }

        let interface: u8 = parts[0].parse().map_err(|_| invalid("bad interface"))?;
        let channel: u8 = parts[1].parse().map_err(|_| invalid("bad channel"))?;
        if channel > MAX_CHANNEL {
            return Err(invalid("channel out of range"));
        }
        let datarate: Datarate = parts[2].parse()?;

        let address = match parts.get(3) {
            Some(hex) if hex.len() == 10 => {
                u64::from_str_radix(hex, 16).map_err(|_| invalid("bad address"))?
            }
            Some(_) => return Err(invalid("address must be 10 hex digits")),
            None => DEFAULT_ADDRESS,
        };

        Ok(LinkUri::Radio {
            interface,
            channel,
            datarate,
            address,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_default_radio_uri() {
        let uri: LinkUri = "radio://0/80/2M".parse().unwrap();
        assert_eq!(
            uri,
            LinkUri::Radio {
                interface: 0,
                channel: 80,
                datarate: Datarate::Mbps2,
                address: DEFAULT_ADDRESS,
            }
        );
        assert_eq!(uri.to_string(), "radio://0/80/2M");
    }

    #[test]
    fn test_parse_with_address() {
        let uri: LinkUri = "radio://1/125/250K/E7E7E7E701".parse().unwrap();
        assert!(matches!(uri, LinkUri::Radio { address: 0xE7E7E7E701, .. }));
        assert_eq!(uri.to_string(), "radio://1/125/250K/E7E7E7E701");
    }

    #[test]
    fn test_parse_sim() {
        let uri: LinkUri = "sim://bench".parse().unwrap();
        assert!(uri.is_sim());
        assert_eq!(uri.to_string(), "sim://bench");
    }

    #[test]
    fn test_rejects_malformed() {
        for bad in [
            "",
            "usb://0",
            "radio://0/80",
            "radio://0/126/2M",
            "radio://0/80/3M",
            "radio://x/80/2M",
            "radio://0/80/2M/E7E7",
            "radio://0/80/2M/ZZZZZZZZZZ",
            "sim://",
        ] {
            assert!(
                matches!(bad.parse::<LinkUri>(), Err(LinkError::InvalidUri(_))),
                "{} should be rejected",
                bad
            );
        }
    }
}
