//! DHCP message serialization module.

use std::io;

use bytes::BufMut;

use super::{codec, constants::*, options::Overload, Message};

impl Message {
    /// DHCP message serialization.
    ///
    /// `max_message_size` is the maximum IP datagram the peer accepts
    /// (defaulted to the 576 octets every client must take). Options that
    /// do not fit the main option area are spilled into the `sname`/`file`
    /// header fields when those carry no data of their own.
    ///
    /// # Errors
    /// `io::Error` if the buffer is too small, a header string field
    /// overflows, or the option set overflows the available space even
    /// with overload. Nothing is transmitted from a failed serialization.
    pub fn to_bytes(&self, dst: &mut [u8], max_message_size: Option<u16>) -> io::Result<usize> {
        let max = max_message_size
            .map(usize::from)
            .unwrap_or(SIZE_MESSAGE_MINIMAL)
            .saturating_sub(SIZE_HEADER_IP + SIZE_HEADER_UDP);
        if max <= OFFSET_OPTIONS {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "Maximum message size leaves no option space",
            ));
        }

        let hardware_address = self.client_hardware_address.as_bytes();
        if hardware_address.len() > SIZE_HARDWARE_ADDRESS
            || self.server_name.len() > SIZE_SERVER_NAME
            || self.boot_filename.len() > SIZE_BOOT_FILENAME
        {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "Header field is too long",
            ));
        }

        let policy = match (self.server_name.is_empty(), self.boot_filename.is_empty()) {
            (true, true) => Overload::Both,
            (true, false) => Overload::Sname,
            (false, true) => Overload::File,
            (false, false) => Overload::Undefined,
        };
        let area = codec::encode(&self.options, policy, max - OFFSET_OPTIONS)
            .map_err(|error| io::Error::new(io::ErrorKind::InvalidData, error))?;

        let amount = (OFFSET_OPTIONS + area.options.len()).max(SIZE_MESSAGE_BOOTP_MINIMAL);
        if dst.len() < amount {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "Buffer is too small",
            ));
        }

        let mut cursor: &mut [u8] = dst;
        cursor.put_u8(self.operation_code as u8);
        cursor.put_u8(self.hardware_type as u8);
        cursor.put_u8(self.hardware_address_length);
        cursor.put_u8(self.hardware_options);
        cursor.put_u32(self.transaction_id);
        cursor.put_u16(self.seconds);
        cursor.put_u16(if self.is_broadcast { FLAG_BROADCAST } else { 0 });
        cursor.put_u32(u32::from(self.client_ip_address));
        cursor.put_u32(u32::from(self.your_ip_address));
        cursor.put_u32(u32::from(self.server_ip_address));
        cursor.put_u32(u32::from(self.gateway_ip_address));
        cursor.put_slice(hardware_address);
        cursor.put_slice(&vec![0u8; SIZE_HARDWARE_ADDRESS - hardware_address.len()]);

        if area.sname.is_empty() {
            cursor.put_slice(&self.server_name);
            cursor.put_slice(&vec![0u8; SIZE_SERVER_NAME - self.server_name.len()]);
        } else {
            cursor.put_slice(&area.sname);
            cursor.put_slice(&vec![0u8; SIZE_SERVER_NAME - area.sname.len()]);
        }
        if area.file.is_empty() {
            cursor.put_slice(&self.boot_filename);
            cursor.put_slice(&vec![0u8; SIZE_BOOT_FILENAME - self.boot_filename.len()]);
        } else {
            cursor.put_slice(&area.file);
            cursor.put_slice(&vec![0u8; SIZE_BOOT_FILENAME - area.file.len()]);
        }

        cursor.put_u32(MAGIC_COOKIE);
        cursor.put_slice(&area.options);
        cursor.put_slice(&vec![0u8; amount - OFFSET_OPTIONS - area.options.len()]);

        Ok(amount)
    }
}
