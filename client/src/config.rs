//! The client configuration module.
//!
//! The configuration is provided programmatically. Parsing `dhclient.conf`
//! is an outer concern; everything here is what the protocol engine needs.

use std::path::PathBuf;

use eui48::MacAddress;

use dhcp_protocol::{OptionTag, Options};

use crate::lease::Lease;

/// The per-process client configuration, shared by all interfaces.
pub struct ClientConfig {
    /// Option codes put into the parameter request list of
    /// `DHCPDISCOVER` and `DHCPREQUEST` messages.
    pub requested_options: Vec<OptionTag>,
    /// An offer missing any of these options is not satisfactory
    /// and is dropped.
    pub required_options: Vec<OptionTag>,
    /// Statically configured options merged into every outbound message
    /// unless the message already carries the code.
    pub send_options: Options,
    /// The panic timeout in seconds. No offer within it means falling
    /// back to recorded leases.
    pub timeout: i64,
    /// How long offers are collected before one is picked, in seconds.
    pub select_interval: i64,
    /// How long an `INIT-REBOOT` request is retried before starting
    /// over with discovery, in seconds.
    pub reboot_timeout: i64,
    /// How long to sleep after a failed panic pass before trying
    /// discovery again, in seconds.
    pub retry_interval: i64,
    /// Media descriptors cycled through while discovery gets no answer.
    pub media: Vec<String>,
    /// The configuration script invoked on every network change.
    pub script: PathBuf,
    /// The maximum DHCP message size the client advertises and accepts.
    pub max_message_size: Option<u16>,
    /// The host name sent to the server, if any.
    pub hostname: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        use OptionTag::*;

        ClientConfig {
            requested_options: vec![
                SubnetMask,
                TimeOffset,
                Routers,
                DomainName,
                DomainNameServers,
                BroadcastAddress,
                Hostname,
            ],
            required_options: vec![AddressTime, DhcpServerId],
            send_options: Options::new(),
            timeout: 60,
            select_interval: 0,
            reboot_timeout: 10,
            retry_interval: 300,
            media: Vec::new(),
            script: PathBuf::from("/sbin/dhclient-script"),
            max_message_size: None,
            hostname: None,
        }
    }
}

/// The configuration of one managed network interface.
pub struct InterfaceConfig {
    pub name: String,
    pub hardware_address: MacAddress,
    /// Defaults to the hardware address bytes.
    pub client_id: Option<Vec<u8>>,
    /// An alias address exported to the hook script alongside every lease.
    pub alias: Option<Lease>,
    /// Statically configured fallback leases, tried when discovery
    /// times out. Never written back to the lease database.
    pub static_leases: Vec<Lease>,
}

impl InterfaceConfig {
    pub fn new(name: String, hardware_address: MacAddress) -> Self {
        InterfaceConfig {
            name,
            hardware_address,
            client_id: None,
            alias: None,
            static_leases: Vec::new(),
        }
    }
}
