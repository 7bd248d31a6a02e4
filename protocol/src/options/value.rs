//! The textual form of option values.
//!
//! Used for the lease database stanzas and the hook environment.

use std::net::Ipv4Addr;

use super::{OptionTag, ValueKind};

fn chunk_ipv4(data: &[u8]) -> Vec<Ipv4Addr> {
    data.chunks_exact(4)
        .map(|chunk| Ipv4Addr::new(chunk[0], chunk[1], chunk[2], chunk[3]))
        .collect()
}

/// Renders an option value in its textual form.
///
/// Addresses are dotted quads, numbers are decimal, text is quoted,
/// anything opaque is colon-separated hex.
pub fn pretty_print(tag: OptionTag, data: &[u8]) -> String {
    match tag.kind() {
        ValueKind::Ipv4 if data.len() == 4 => {
            Ipv4Addr::new(data[0], data[1], data[2], data[3]).to_string()
        }
        ValueKind::Ipv4List if data.len() % 4 == 0 && !data.is_empty() => chunk_ipv4(data)
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<String>>()
            .join(","),
        ValueKind::Ipv4Pairs if data.len() % 8 == 0 && !data.is_empty() => chunk_ipv4(data)
            .chunks_exact(2)
            .map(|pair| format!("{} {}", pair[0], pair[1]))
            .collect::<Vec<String>>()
            .join(","),
        ValueKind::U8 if data.len() == 1 => data[0].to_string(),
        ValueKind::U16 if data.len() == 2 => u16::from_be_bytes([data[0], data[1]]).to_string(),
        ValueKind::U16List if data.len() % 2 == 0 && !data.is_empty() => data
            .chunks_exact(2)
            .map(|chunk| u16::from_be_bytes([chunk[0], chunk[1]]).to_string())
            .collect::<Vec<String>>()
            .join(","),
        ValueKind::U32 if data.len() == 4 => {
            u32::from_be_bytes([data[0], data[1], data[2], data[3]]).to_string()
        }
        ValueKind::Text => {
            let text = String::from_utf8_lossy(data);
            format!("\"{}\"", text.replace('\\', "\\\\").replace('"', "\\\""))
        }
        // A mis-sized value of a known kind still has to be printable.
        _ => data
            .iter()
            .map(|byte| format!("{:02x}", byte))
            .collect::<Vec<String>>()
            .join(":"),
    }
}

/// Parses the textual form produced by `pretty_print` back into value bytes.
///
/// Returns `None` on any shape mismatch.
pub fn parse(tag: OptionTag, text: &str) -> Option<Vec<u8>> {
    let text = text.trim();
    match tag.kind() {
        ValueKind::Ipv4 => {
            let address: Ipv4Addr = text.parse().ok()?;
            Some(address.octets().to_vec())
        }
        ValueKind::Ipv4List => {
            let mut data = Vec::new();
            for part in text.split(',') {
                let address: Ipv4Addr = part.trim().parse().ok()?;
                data.extend_from_slice(&address.octets());
            }
            Some(data)
        }
        ValueKind::Ipv4Pairs => {
            let mut data = Vec::new();
            for part in text.split(',') {
                let mut halves = part.trim().split_whitespace();
                let first: Ipv4Addr = halves.next()?.parse().ok()?;
                let second: Ipv4Addr = halves.next()?.parse().ok()?;
                if halves.next().is_some() {
                    return None;
                }
                data.extend_from_slice(&first.octets());
                data.extend_from_slice(&second.octets());
            }
            Some(data)
        }
        ValueKind::U8 => Some(vec![text.parse::<u8>().ok()?]),
        ValueKind::U16 => Some(text.parse::<u16>().ok()?.to_be_bytes().to_vec()),
        ValueKind::U16List => {
            let mut data = Vec::new();
            for part in text.split(',') {
                data.extend_from_slice(&part.trim().parse::<u16>().ok()?.to_be_bytes());
            }
            Some(data)
        }
        ValueKind::U32 => Some(text.parse::<u32>().ok()?.to_be_bytes().to_vec()),
        ValueKind::Text => {
            let inner = text.strip_prefix('"')?.strip_suffix('"')?;
            Some(
                inner
                    .replace("\\\"", "\"")
                    .replace("\\\\", "\\")
                    .into_bytes(),
            )
        }
        ValueKind::Bytes => parse_hex(text),
    }
}

fn parse_hex(text: &str) -> Option<Vec<u8>> {
    if text.is_empty() {
        return Some(Vec::new());
    }
    text.split(':')
        .map(|part| u8::from_str_radix(part, 16).ok())
        .collect()
}
