//! DHCP message deserialization module.

use std::{io, net::Ipv4Addr};

use bytes::Buf;
use eui48::{MacAddress, EUI48LEN};

use super::{
    codec,
    constants::*,
    options::{Options, Overload},
    Message,
};

/// Checks if there is enough space in buffer to get a value.
macro_rules! check_remaining(
    ($cursor:expr, $length:expr) => (
        if $cursor.remaining() < $length {
            return Err(
                io::Error::new(io::ErrorKind::UnexpectedEof,
                "Buffer is too small or packet has invalid length octets",
            ));
        }
    );
);

impl Message {
    /// DHCP message deserialization.
    ///
    /// # Errors
    /// `io::Error` if the packet is abrupted, too small or contains
    /// invalid length octets.
    pub fn from_bytes(src: &[u8]) -> io::Result<Self> {
        let mut cursor = io::Cursor::new(src);
        check_remaining!(cursor, OFFSET_OPTIONS);

        let mut message = Message {
            operation_code: cursor.get_u8().into(),
            hardware_type: cursor.get_u8().into(),
            hardware_address_length: cursor.get_u8(),
            hardware_options: cursor.get_u8(),
            transaction_id: cursor.get_u32(),
            seconds: cursor.get_u16(),
            // https://tools.ietf.org/html/rfc2131#section-2
            // Leftmost bit (0 bit) is most significant
            is_broadcast: cursor.get_u16() & FLAG_BROADCAST != 0,
            client_ip_address: Ipv4Addr::from(cursor.get_u32()),
            your_ip_address: Ipv4Addr::from(cursor.get_u32()),
            server_ip_address: Ipv4Addr::from(cursor.get_u32()),
            gateway_ip_address: Ipv4Addr::from(cursor.get_u32()),
            client_hardware_address: {
                let position = cursor.position() as usize;
                let address = MacAddress::from_bytes(&src[position..position + EUI48LEN])
                    .map_err(|_| {
                        io::Error::new(io::ErrorKind::InvalidData, "Invalid hardware address")
                    })?;
                cursor.advance(SIZE_HARDWARE_ADDRESS);
                address
            },
            server_name: {
                let position = cursor.position() as usize;
                let vec = Vec::from(&src[position..position + SIZE_SERVER_NAME]);
                cursor.advance(SIZE_SERVER_NAME);
                vec
            },
            boot_filename: {
                let position = cursor.position() as usize;
                let vec = Vec::from(&src[position..position + SIZE_BOOT_FILENAME]);
                cursor.advance(SIZE_BOOT_FILENAME);
                vec
            },
            options: Options::new(),
        };

        if cursor.get_u32() != MAGIC_COOKIE {
            return Err(io::Error::new(io::ErrorKind::InvalidData, "MAGIC_COOKIE"));
        }

        codec::decode(&src[OFFSET_OPTIONS..], &mut message.options)?;
        match message.options.overload() {
            Some(Overload::File) => {
                codec::decode(
                    &src[OFFSET_BOOT_FILENAME..OFFSET_MAGIC_COOKIE],
                    &mut message.options,
                )?;
            }
            Some(Overload::Sname) => {
                codec::decode(
                    &src[OFFSET_SERVER_NAME..OFFSET_BOOT_FILENAME],
                    &mut message.options,
                )?;
            }
            Some(Overload::Both) => {
                codec::decode(
                    &src[OFFSET_BOOT_FILENAME..OFFSET_MAGIC_COOKIE],
                    &mut message.options,
                )?;
                codec::decode(
                    &src[OFFSET_SERVER_NAME..OFFSET_BOOT_FILENAME],
                    &mut message.options,
                )?;
            }
            _ => {}
        }

        Ok(message)
    }
}
