//! A builder for common DHCP client messages.

use std::net::Ipv4Addr;

use eui48::{MacAddress, EUI48LEN};

use dhcp_protocol::{
    HardwareType, Message, MessageType, OperationCode, OptionTag, Options,
};

use crate::config::ClientConfig;

/// Builds common client messages with some parameters.
pub struct MessageBuilder {
    /// Mandatory `MAC-48` address.
    client_hardware_address: MacAddress,
    /// Is set explicitly by user or defaulted to `client_hardware_address` bytes.
    client_id: Vec<u8>,
    /// The optional machine hostname.
    hostname: Option<String>,
    /// The optional maximum DHCP message size the client will accept.
    max_message_size: Option<u16>,
}

impl MessageBuilder {
    /// Creates a builder with message parameters which will not be changed.
    pub fn new(
        client_hardware_address: MacAddress,
        client_id: Option<Vec<u8>>,
        hostname: Option<String>,
        max_message_size: Option<u16>,
    ) -> Self {
        let client_id =
            client_id.unwrap_or_else(|| client_hardware_address.as_bytes().to_vec());

        MessageBuilder {
            client_hardware_address,
            client_id,
            hostname,
            max_message_size,
        }
    }

    /// Creates a general `DHCPDISCOVER` message.
    ///
    /// Carries the requested address when the client had one before.
    pub fn discover(
        &self,
        config: &ClientConfig,
        transaction_id: u32,
        address_request: Option<Ipv4Addr>,
    ) -> Message {
        let mut options = Options::new();
        self.append_default_options(&mut options);
        options.set_message_type(MessageType::DhcpDiscover);
        options.insert(OptionTag::ParameterList, Self::parameter_list(config));
        if let Some(address) = address_request {
            options.set_ipv4(OptionTag::AddressRequest, address);
        }
        Self::append_send_options(config, &mut options);

        self.message(transaction_id, true, Ipv4Addr::new(0, 0, 0, 0), options)
    }

    /// Creates a `DHCPREQUEST` in `REQUESTING` state, answering a fresh
    /// offer: the only request that names the server being selected.
    pub fn request_selecting(
        &self,
        config: &ClientConfig,
        transaction_id: u32,
        address_request: Ipv4Addr,
        dhcp_server_id: Ipv4Addr,
    ) -> Message {
        let mut options = Options::new();
        self.append_default_options(&mut options);
        options.set_message_type(MessageType::DhcpRequest);
        options.insert(OptionTag::ParameterList, Self::parameter_list(config));
        options.set_ipv4(OptionTag::AddressRequest, address_request);
        options.set_ipv4(OptionTag::DhcpServerId, dhcp_server_id);
        Self::append_send_options(config, &mut options);

        self.message(transaction_id, true, Ipv4Addr::new(0, 0, 0, 0), options)
    }

    /// Creates a `DHCPREQUEST` in `INIT-REBOOT` state.
    pub fn request_init_reboot(
        &self,
        config: &ClientConfig,
        transaction_id: u32,
        address_request: Ipv4Addr,
    ) -> Message {
        let mut options = Options::new();
        self.append_default_options(&mut options);
        options.set_message_type(MessageType::DhcpRequest);
        options.insert(OptionTag::ParameterList, Self::parameter_list(config));
        options.set_ipv4(OptionTag::AddressRequest, address_request);
        Self::append_send_options(config, &mut options);

        self.message(transaction_id, true, Ipv4Addr::new(0, 0, 0, 0), options)
    }

    /// Creates a `DHCPREQUEST` in `BOUND`, `RENEWING` or `REBINDING`
    /// state. The client owns the address, so it goes into `ciaddr`
    /// and not into the requested-address option.
    pub fn request_renew(
        &self,
        config: &ClientConfig,
        transaction_id: u32,
        client_ip_address: Ipv4Addr,
    ) -> Message {
        let mut options = Options::new();
        self.append_default_options(&mut options);
        options.set_message_type(MessageType::DhcpRequest);
        options.insert(OptionTag::ParameterList, Self::parameter_list(config));
        Self::append_send_options(config, &mut options);

        self.message(transaction_id, true, client_ip_address, options)
    }

    /// Creates a general `DHCPDECLINE` message, echoing the declined
    /// address and its server.
    pub fn decline(
        &self,
        transaction_id: u32,
        requested_address: Ipv4Addr,
        dhcp_server_id: Ipv4Addr,
        dhcp_message: Option<String>,
    ) -> Message {
        let mut options = Options::new();
        self.append_default_options(&mut options);
        options.set_message_type(MessageType::DhcpDecline);
        options.set_ipv4(OptionTag::AddressRequest, requested_address);
        options.set_ipv4(OptionTag::DhcpServerId, dhcp_server_id);
        if let Some(ref message) = dhcp_message {
            options.set_string(OptionTag::DhcpMessage, message);
        }

        self.message(transaction_id, true, Ipv4Addr::new(0, 0, 0, 0), options)
    }

    /// Creates a general `DHCPRELEASE` message. The only client message
    /// sent without the broadcast flag.
    pub fn release(
        &self,
        transaction_id: u32,
        client_ip_address: Ipv4Addr,
        dhcp_server_id: Ipv4Addr,
        dhcp_message: Option<String>,
    ) -> Message {
        let mut options = Options::new();
        self.append_default_options(&mut options);
        options.set_message_type(MessageType::DhcpRelease);
        options.set_ipv4(OptionTag::DhcpServerId, dhcp_server_id);
        if let Some(ref message) = dhcp_message {
            options.set_string(OptionTag::DhcpMessage, message);
        }

        self.message(transaction_id, false, client_ip_address, options)
    }

    fn message(
        &self,
        transaction_id: u32,
        is_broadcast: bool,
        client_ip_address: Ipv4Addr,
        options: Options,
    ) -> Message {
        Message {
            operation_code: OperationCode::BootRequest,
            hardware_type: HardwareType::Ethernet,
            hardware_address_length: EUI48LEN as u8,
            hardware_options: 0u8,

            transaction_id,
            seconds: 0u16,
            is_broadcast,

            client_ip_address,
            your_ip_address: Ipv4Addr::new(0, 0, 0, 0),
            server_ip_address: Ipv4Addr::new(0, 0, 0, 0),
            gateway_ip_address: Ipv4Addr::new(0, 0, 0, 0),

            client_hardware_address: self.client_hardware_address.to_owned(),
            server_name: Vec::new(),
            boot_filename: Vec::new(),

            options,
        }
    }

    fn append_default_options(&self, options: &mut Options) {
        if let Some(ref hostname) = self.hostname {
            options.set_string(OptionTag::Hostname, hostname);
        }
        options.insert(OptionTag::ClientId, self.client_id.to_owned());
        if let Some(size) = self.max_message_size {
            options.set_u16(OptionTag::DhcpMaxMessageSize, size);
        }
    }

    /// Statically configured options never override the computed ones.
    fn append_send_options(config: &ClientConfig, options: &mut Options) {
        for (code, data) in config.send_options.iter() {
            if options.get_raw(code).is_none() {
                options.insert_raw(code, data.to_vec());
            }
        }
    }

    fn parameter_list(config: &ClientConfig) -> Vec<u8> {
        config
            .requested_options
            .iter()
            .map(|tag| *tag as u8)
            .collect()
    }
}
