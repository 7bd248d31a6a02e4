//! The DHCP protocol library.
//!
//! Contains the BOOTP/DHCP message, the sparse option set and
//! the serialization/deserialization/validation machinery.

pub mod constants;
pub mod hardware_type;
pub mod operation_code;
pub mod options;

mod codec;
mod deserializer;
mod serializer;
mod validator;

use std::{fmt, net::Ipv4Addr};

use eui48::MacAddress;

pub use self::{
    codec::{Error as CodecError, OptionArea},
    constants::*,
    hardware_type::HardwareType,
    operation_code::OperationCode,
    options::{MessageType, OptionTag, Options, Overload, ValueKind},
    validator::Error as ValidationError,
};

/// DHCP message.
pub struct Message {
    pub operation_code: OperationCode,
    pub hardware_type: HardwareType,
    pub hardware_address_length: u8,
    pub hardware_options: u8,
    pub transaction_id: u32,
    pub seconds: u16,
    pub is_broadcast: bool,
    pub client_ip_address: Ipv4Addr,
    pub your_ip_address: Ipv4Addr,
    pub server_ip_address: Ipv4Addr,
    pub gateway_ip_address: Ipv4Addr,
    pub client_hardware_address: MacAddress,
    pub server_name: Vec<u8>,
    pub boot_filename: Vec<u8>,
    pub options: Options,
}

/// Strips the trailing NUL padding of the fixed-size `sname`/`file` fields.
pub fn trim_field(field: &[u8]) -> &[u8] {
    let mut last = field.len();
    while last > 0 && field[last - 1] == 0 {
        last -= 1;
    }
    &field[..last]
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f)?;
        writeln!(f, "{}HEADER{}", "_".repeat(30), "_".repeat(39))?;
        writeln!(f, "{:32} | {}", "Operation code", self.operation_code)?;
        writeln!(f, "{:32} | {}", "Hardware type", self.hardware_type)?;
        writeln!(
            f,
            "{:32} | {}",
            "Hardware address length", self.hardware_address_length
        )?;
        writeln!(f, "{:32} | {}", "Hardware options", self.hardware_options)?;
        writeln!(f, "{:32} | {}", "Transaction ID", self.transaction_id)?;
        writeln!(f, "{:32} | {}", "Seconds", self.seconds)?;
        writeln!(f, "{:32} | {}", "Broadcast flag", self.is_broadcast)?;
        writeln!(f, "{:32} | {}", "Client IP address", self.client_ip_address)?;
        writeln!(f, "{:32} | {}", "Your IP address", self.your_ip_address)?;
        writeln!(f, "{:32} | {}", "Server IP address", self.server_ip_address)?;
        writeln!(
            f,
            "{:32} | {}",
            "Gateway IP address", self.gateway_ip_address
        )?;
        writeln!(
            f,
            "{:32} | {}",
            "Client hardware address", self.client_hardware_address
        )?;
        writeln!(
            f,
            "{:32} | {:?}",
            "Server name",
            trim_field(&self.server_name)
        )?;
        writeln!(
            f,
            "{:32} | {:?}",
            "Boot filename",
            trim_field(&self.boot_filename)
        )?;

        writeln!(f, "{}OPTIONS{}", "_".repeat(30), "_".repeat(38))?;
        for (code, data) in self.options.iter() {
            let tag = OptionTag::from(code);
            writeln!(
                f,
                "[{:03}] {:027}| {}",
                code,
                tag.name(),
                options::value::pretty_print(tag, data)
            )?;
        }
        writeln!(f, "{}", "_".repeat(75))?;
        Ok(())
    }
}
