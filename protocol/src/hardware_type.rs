//! BOOTP hardware type module.

use std::fmt;

/// BOOTP hardware type (RFC 1700 `arp-parameters`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HardwareType {
    Undefined = 0,
    Ethernet,
    ExperimentalEthernet,
    AmateurRadio,
    TokenRing,
}

impl fmt::Display for HardwareType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use self::HardwareType::*;
        match self {
            Ethernet => write!(f, "Ethernet"),
            ExperimentalEthernet => write!(f, "Experimental Ethernet"),
            AmateurRadio => write!(f, "Amateur radio"),
            TokenRing => write!(f, "Token ring"),

            Undefined => write!(f, "UNDEFINED"),
        }
    }
}

impl From<u8> for HardwareType {
    fn from(value: u8) -> Self {
        use self::HardwareType::*;
        match value {
            1 => Ethernet,
            2 => ExperimentalEthernet,
            3 => AmateurRadio,
            4 => TokenRing,

            _ => Undefined,
        }
    }
}
