//! DHCP options module.

mod message_type;
mod option_tag;
mod overload;

pub mod value;

pub use self::{
    message_type::MessageType,
    option_tag::{OptionTag, ValueKind},
    overload::Overload,
};

use std::collections::BTreeMap;
use std::net::Ipv4Addr;

/// The DHCP option set.
///
/// An owned sparse mapping from option code to raw value bytes.
/// Codes 0 (pad) and 255 (end) are wire-format markers and are never stored.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Options {
    map: BTreeMap<u8, Vec<u8>>,
}

impl Options {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw value bytes of an option, if present.
    pub fn get(&self, tag: OptionTag) -> Option<&[u8]> {
        self.map.get(&(tag as u8)).map(Vec::as_slice)
    }

    /// Raw value bytes by numeric code, covering options without a name.
    pub fn get_raw(&self, code: u8) -> Option<&[u8]> {
        self.map.get(&code).map(Vec::as_slice)
    }

    /// Stores raw value bytes under an option code.
    ///
    /// The pad and end markers are structural and silently refused.
    pub fn insert(&mut self, tag: OptionTag, data: Vec<u8>) {
        match tag {
            OptionTag::Pad | OptionTag::End | OptionTag::Unknown => {}
            _ => {
                self.map.insert(tag as u8, data);
            }
        }
    }

    /// Stores raw value bytes under a numeric code (used by the decoder,
    /// which must keep options it has no name for).
    pub fn insert_raw(&mut self, code: u8, data: Vec<u8>) {
        if code != OptionTag::Pad as u8 && code != OptionTag::End as u8 {
            self.map.insert(code, data);
        }
    }

    pub fn remove(&mut self, tag: OptionTag) -> Option<Vec<u8>> {
        self.map.remove(&(tag as u8))
    }

    pub fn contains(&self, tag: OptionTag) -> bool {
        self.map.contains_key(&(tag as u8))
    }

    /// Iterates `(code, value)` pairs in ascending code order.
    pub fn iter(&self) -> impl Iterator<Item = (u8, &[u8])> {
        self.map.iter().map(|(code, data)| (*code, data.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    // Typed getters. All of them return `None` both for an absent
    // option and for a value of the wrong size.

    pub fn get_u8(&self, tag: OptionTag) -> Option<u8> {
        match self.get(tag) {
            Some(&[value]) => Some(value),
            _ => None,
        }
    }

    pub fn get_u16(&self, tag: OptionTag) -> Option<u16> {
        match self.get(tag) {
            Some(&[a, b]) => Some(u16::from_be_bytes([a, b])),
            _ => None,
        }
    }

    pub fn get_u32(&self, tag: OptionTag) -> Option<u32> {
        match self.get(tag) {
            Some(&[a, b, c, d]) => Some(u32::from_be_bytes([a, b, c, d])),
            _ => None,
        }
    }

    pub fn get_ipv4(&self, tag: OptionTag) -> Option<Ipv4Addr> {
        self.get_u32(tag).map(Ipv4Addr::from)
    }

    pub fn get_string(&self, tag: OptionTag) -> Option<String> {
        self.get(tag)
            .map(|data| String::from_utf8_lossy(data).into_owned())
    }

    // Typed setters.

    pub fn set_u8(&mut self, tag: OptionTag, value: u8) {
        self.insert(tag, vec![value]);
    }

    pub fn set_u16(&mut self, tag: OptionTag, value: u16) {
        self.insert(tag, value.to_be_bytes().to_vec());
    }

    pub fn set_u32(&mut self, tag: OptionTag, value: u32) {
        self.insert(tag, value.to_be_bytes().to_vec());
    }

    pub fn set_ipv4(&mut self, tag: OptionTag, value: Ipv4Addr) {
        self.set_u32(tag, u32::from(value));
    }

    pub fn set_string(&mut self, tag: OptionTag, value: &str) {
        self.insert(tag, value.as_bytes().to_vec());
    }

    // The options the client logic consumes, by name.

    pub fn message_type(&self) -> Option<MessageType> {
        match self.get_u8(OptionTag::DhcpMessageType).map(MessageType::from) {
            Some(MessageType::Undefined) | None => None,
            mt => mt,
        }
    }

    pub fn set_message_type(&mut self, message_type: MessageType) {
        self.set_u8(OptionTag::DhcpMessageType, message_type as u8);
    }

    pub fn overload(&self) -> Option<Overload> {
        match self.get_u8(OptionTag::Overload).map(Overload::from) {
            Some(Overload::Undefined) | None => None,
            overload => overload,
        }
    }

    pub fn address_time(&self) -> Option<u32> {
        self.get_u32(OptionTag::AddressTime)
    }

    pub fn renewal_time(&self) -> Option<u32> {
        self.get_u32(OptionTag::RenewalTime)
    }

    pub fn rebinding_time(&self) -> Option<u32> {
        self.get_u32(OptionTag::RebindingTime)
    }

    pub fn dhcp_server_id(&self) -> Option<Ipv4Addr> {
        self.get_ipv4(OptionTag::DhcpServerId)
    }

    pub fn address_request(&self) -> Option<Ipv4Addr> {
        self.get_ipv4(OptionTag::AddressRequest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typed_getters_reject_wrong_sizes() {
        let mut options = Options::new();
        options.insert(OptionTag::AddressTime, vec![0x01, 0x02]);
        assert_eq!(options.address_time(), None);

        options.set_u32(OptionTag::AddressTime, 43200);
        assert_eq!(options.address_time(), Some(43200));
    }

    #[test]
    fn structural_markers_are_not_stored() {
        let mut options = Options::new();
        options.insert(OptionTag::Pad, vec![]);
        options.insert(OptionTag::End, vec![]);
        options.insert_raw(0, vec![]);
        options.insert_raw(255, vec![]);
        assert!(options.is_empty());
    }

    #[test]
    fn iteration_is_in_code_order() {
        let mut options = Options::new();
        options.set_message_type(MessageType::DhcpDiscover);
        options.set_ipv4(OptionTag::SubnetMask, Ipv4Addr::new(255, 255, 255, 0));
        options.set_u32(OptionTag::AddressTime, 100);
        let codes: Vec<u8> = options.iter().map(|(code, _)| code).collect();
        assert_eq!(codes, vec![1, 51, 53]);
    }
}
