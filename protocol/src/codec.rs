//! The DHCP option area codec.
//!
//! Encodes the sparse option set into `{code, length, value}` triples and
//! back, including the RFC 2131 option overload of the `sname` and `file`
//! header fields.

use std::io;

use bytes::Buf;
use thiserror::Error;

use super::{
    constants::*,
    options::{OptionTag, Options, Overload},
};

/// The error type returned by `encode`.
#[derive(Debug, Error)]
pub enum Error {
    #[error("option {0} is {1} bytes long and cannot be encoded")]
    OptionTooLong(u8, usize),
    #[error("the option set does not fit into the available option space")]
    Overflow,
}

/// The encoded option space of a message.
///
/// `file` and `sname` are non-empty only when the encoder had to overload
/// them. Each used area is `End`-terminated; triples are never split
/// across areas.
#[derive(Debug, Default)]
pub struct OptionArea {
    pub options: Vec<u8>,
    pub file: Vec<u8>,
    pub sname: Vec<u8>,
}

fn push_triple(area: &mut Vec<u8>, code: u8, data: &[u8]) {
    area.push(code);
    area.push(data.len() as u8);
    area.extend_from_slice(data);
}

/// Serializes `options` into at most `capacity` bytes of main option area,
/// spilling whole triples into the `file` and/or `sname` fields when
/// `policy` makes them available.
///
/// # Errors
/// `Error::Overflow` if the set does not fit even with the allowed overload.
pub fn encode(options: &Options, policy: Overload, capacity: usize) -> Result<OptionArea, Error> {
    let mut triples = Vec::with_capacity(options.len());
    for (code, data) in options.iter() {
        // The overload flag describes the encoding, not the payload.
        if code == OptionTag::Overload as u8 {
            continue;
        }
        if data.len() > u8::max_value() as usize {
            return Err(Error::OptionTooLong(code, data.len()));
        }
        triples.push((code, data));
    }

    let plain: usize = triples
        .iter()
        .map(|(_, data)| SIZE_OPTION_PREFIX + data.len())
        .sum();
    let mut area = OptionArea::default();

    if plain + 1 <= capacity {
        for (code, data) in triples {
            push_triple(&mut area.options, code, data);
        }
        area.options.push(OptionTag::End as u8);
        return Ok(area);
    }

    if policy == Overload::Undefined {
        return Err(Error::Overflow);
    }

    // The main area keeps room for the overload option and the end marker.
    let main_budget = capacity.saturating_sub(SIZE_OPTION_PREFIX + 1 + 1);
    let file_budget = if policy.covers_file() {
        SIZE_BOOT_FILENAME - 1
    } else {
        0
    };
    let sname_budget = if policy.covers_sname() {
        SIZE_SERVER_NAME - 1
    } else {
        0
    };

    let mut current = 0usize;
    for (code, data) in triples {
        let need = SIZE_OPTION_PREFIX + data.len();
        loop {
            let (filled, budget) = match current {
                0 => (area.options.len(), main_budget),
                1 => (area.file.len(), file_budget),
                2 => (area.sname.len(), sname_budget),
                _ => return Err(Error::Overflow),
            };
            if filled + need <= budget {
                break;
            }
            current += 1;
        }
        let target = match current {
            0 => &mut area.options,
            1 => &mut area.file,
            _ => &mut area.sname,
        };
        push_triple(target, code, data);
    }

    let mut overload = 0u8;
    if !area.file.is_empty() {
        area.file.push(OptionTag::End as u8);
        overload |= Overload::File as u8;
    }
    if !area.sname.is_empty() {
        area.sname.push(OptionTag::End as u8);
        overload |= Overload::Sname as u8;
    }

    let mut main = Vec::with_capacity(capacity);
    if overload != 0 {
        push_triple(&mut main, OptionTag::Overload as u8, &[overload]);
    }
    main.extend_from_slice(&area.options);
    main.push(OptionTag::End as u8);
    area.options = main;

    Ok(area)
}

/// Scans one option area into `options`.
///
/// Pad octets are skipped, the scan stops at the end marker, and anything
/// after it is ignored. A triple truncated before the end marker is an error.
///
/// # Errors
/// `io::Error` if a length octet runs past the end of the area.
pub fn decode(src: &[u8], options: &mut Options) -> io::Result<()> {
    let mut cursor = io::Cursor::new(src);
    while cursor.remaining() > 0 {
        let code = cursor.get_u8();
        if code == OptionTag::Pad as u8 {
            continue;
        }
        if code == OptionTag::End as u8 {
            return Ok(());
        }
        if cursor.remaining() < 1 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "Option code without a length octet",
            ));
        }
        let length = cursor.get_u8() as usize;
        if cursor.remaining() < length {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "Packet has invalid length octets",
            ));
        }
        let mut data = vec![0u8; length];
        cursor.copy_to_slice(&mut data);
        options.insert_raw(code, data);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;
    use crate::options::MessageType;

    fn sample() -> Options {
        let mut options = Options::new();
        options.set_message_type(MessageType::DhcpDiscover);
        options.set_ipv4(OptionTag::SubnetMask, Ipv4Addr::new(255, 255, 255, 0));
        options.set_u32(OptionTag::AddressTime, 43200);
        options.set_string(OptionTag::Hostname, "testhost");
        options.insert(OptionTag::ParameterList, vec![1, 3, 6, 15]);
        options
    }

    #[test]
    fn round_trip_within_budget() {
        let options = sample();
        let area = encode(&options, Overload::Undefined, 308).unwrap();
        assert!(area.file.is_empty() && area.sname.is_empty());

        let mut decoded = Options::new();
        decode(&area.options, &mut decoded).unwrap();
        assert_eq!(decoded, options);
    }

    #[test]
    fn spills_into_file_and_sname() {
        let options = sample();
        // Too small for everything, large enough for the overload marker
        // plus a couple of triples.
        let area = encode(&options, Overload::Both, 16).unwrap();
        assert!(!area.file.is_empty());
        assert!(area.file.len() <= SIZE_BOOT_FILENAME);
        assert!(area.sname.len() <= SIZE_SERVER_NAME);

        let mut decoded = Options::new();
        decode(&area.options, &mut decoded).unwrap();
        decode(&area.file, &mut decoded).unwrap();
        decode(&area.sname, &mut decoded).unwrap();
        assert_eq!(decoded.overload(), Some(Overload::File));
        decoded.remove(OptionTag::Overload);
        assert_eq!(decoded, options);
    }

    #[test]
    fn overflow_without_overload_is_an_error() {
        match encode(&sample(), Overload::Undefined, 16) {
            Err(Error::Overflow) => {}
            other => panic!("expected overflow, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn overflow_with_exhausted_overload_is_an_error() {
        let mut options = Options::new();
        options.insert(OptionTag::VendorSpecific, vec![0u8; 200]);
        options.insert(OptionTag::DhcpMessage, vec![0u8; 200]);
        assert!(matches!(
            encode(&options, Overload::File, 8),
            Err(Error::Overflow)
        ));
    }

    #[test]
    fn decode_ignores_bytes_after_end() {
        let mut raw = Vec::new();
        raw.extend_from_slice(&[53, 1, 2, 255]);
        raw.extend_from_slice(&[0xde, 0xad, 0xbe, 0xef]);
        let mut options = Options::new();
        decode(&raw, &mut options).unwrap();
        assert_eq!(options.message_type(), Some(MessageType::DhcpOffer));
        assert_eq!(options.len(), 1);
    }

    #[test]
    fn decode_skips_pad_octets() {
        let raw = [0, 0, 53, 1, 1, 0, 255];
        let mut options = Options::new();
        decode(&raw, &mut options).unwrap();
        assert_eq!(options.message_type(), Some(MessageType::DhcpDiscover));
    }

    #[test]
    fn truncated_triple_is_an_error() {
        let raw = [53, 4, 1];
        let mut options = Options::new();
        assert!(decode(&raw, &mut options).is_err());
    }
}
