//! IP address anonymizer

use super::{expect_str, EmptyValuePolicy, FieldAnonymizer};
use crate::anonymization::crypto::cipher::{Direction, Keystream};
use crate::domain::{ObscuraError, Result};
use serde_json::Value;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

/// Reversible IP address anonymizer
///
/// Every IPv4 octet (or IPv6 segment) is shifted modulo its range by a
/// keystream value, so the result is an address of the same family.
///
/// IPv4 addresses must be in dotted-decimal form. IPv6 addresses must be
/// either canonical (RFC 5952: lowercase, compressed) or fully expanded,
/// and the result is written in the same form.
#[derive(Debug, Clone, Default)]
pub struct IpAddressFieldAnonymizer {
    empty: EmptyValuePolicy,
}

impl IpAddressFieldAnonymizer {
    /// Creates an IP address anonymizer
    pub fn new() -> Self {
        Self::default()
    }

    /// Overrides the empty-value policy
    pub fn with_empty_values(mut self, empty: EmptyValuePolicy) -> Self {
        self.empty = empty;
        self
    }

    fn apply(&self, value: &Value, key: &str, direction: Direction) -> Result<Value> {
        let text = expect_str(value, self.name())?;
        let address: IpAddr = text.parse().map_err(|_| {
            ObscuraError::invalid_value(self.name(), format!("'{text}' is not an IP address"))
        })?;
        let expanded = match address {
            IpAddr::V6(v6) if expand(&v6) == text => true,
            _ if address.to_string() == text => false,
            _ => {
                return Err(ObscuraError::invalid_value(
                    self.name(),
                    format!("'{text}' is neither canonical nor fully expanded"),
                ))
            }
        };

        let mut stream = Keystream::new(key);
        let shifted = match address {
            IpAddr::V4(v4) => {
                let octets = v4.octets().map(|octet| {
                    let offset = stream.next_byte();
                    match direction {
                        Direction::Encrypt => octet.wrapping_add(offset),
                        Direction::Decrypt => octet.wrapping_sub(offset),
                    }
                });
                IpAddr::V4(Ipv4Addr::from(octets))
            }
            IpAddr::V6(v6) => {
                let segments = v6.segments().map(|segment| {
                    let offset = stream.next_u16();
                    match direction {
                        Direction::Encrypt => segment.wrapping_add(offset),
                        Direction::Decrypt => segment.wrapping_sub(offset),
                    }
                });
                IpAddr::V6(Ipv6Addr::from(segments))
            }
        };

        Ok(Value::String(match shifted {
            IpAddr::V6(v6) if expanded => expand(&v6),
            other => other.to_string(),
        }))
    }
}

/// Eight groups of four lowercase hex digits
fn expand(address: &Ipv6Addr) -> String {
    address
        .segments()
        .iter()
        .map(|segment| format!("{segment:04x}"))
        .collect::<Vec<_>>()
        .join(":")
}

impl FieldAnonymizer for IpAddressFieldAnonymizer {
    fn name(&self) -> &'static str {
        "ip_address"
    }

    fn empty_values(&self) -> &EmptyValuePolicy {
        &self.empty
    }

    fn encrypt(&self, value: &Value, key: &str) -> Result<Value> {
        self.apply(value, key, Direction::Encrypt)
    }

    fn decrypt(&self, value: &Value, key: &str) -> Result<Value> {
        self.apply(value, key, Direction::Decrypt)
    }
}
