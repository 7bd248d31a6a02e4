//! The persistent lease database.
//!
//! A text file of `lease { ... }` stanzas, one per recorded lease, with
//! all timestamps in UTC. The whole file is rewritten at startup and
//! appended to (with a flush) on every acknowledged lease thereafter.

use std::{
    fs::{File, OpenOptions},
    io::{self, Write},
    net::Ipv4Addr,
    path::{Path, PathBuf},
};

use chrono::prelude::*;
use log::warn;

use dhcp_protocol::{options::value, OptionTag, Options};

use crate::{
    error::{Error, Result},
    lease::Lease,
};

/// The persistence half of the hook/persistence gateway.
pub trait LeaseStore {
    /// Records one acknowledged lease. Failures are fatal to the client.
    fn append(&mut self, interface: &str, lease: &Lease) -> Result<()>;
}

/// The lease database file. A process-wide singleton by convention:
/// the dispatch loop is the only writer.
pub struct LeaseFile {
    path: PathBuf,
    file: Option<File>,
}

impl LeaseFile {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        LeaseFile {
            path: path.into(),
            file: None,
        }
    }

    /// Truncates the database and writes out every known lease.
    pub fn rewrite<'a, I>(&mut self, entries: I) -> Result<()>
    where
        I: IntoIterator<Item = (&'a str, &'a Lease)>,
    {
        let mut file = File::create(&self.path).map_err(Error::LeaseDatabase)?;
        for (interface, lease) in entries {
            if lease.is_static {
                continue;
            }
            write_stanza(&mut file, interface, lease).map_err(Error::LeaseDatabase)?;
        }
        file.flush().map_err(Error::LeaseDatabase)?;
        self.file = Some(file);
        Ok(())
    }
}

impl LeaseStore for LeaseFile {
    fn append(&mut self, interface: &str, lease: &Lease) -> Result<()> {
        // Leases from the configuration are not stashed in the database.
        if lease.is_static {
            return Ok(());
        }
        if self.file.is_none() {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.path)
                .map_err(Error::LeaseDatabase)?;
            self.file = Some(file);
        }
        let file = self.file.as_mut().expect("opened above");
        write_stanza(file, interface, lease).map_err(Error::LeaseDatabase)?;
        file.flush().map_err(Error::LeaseDatabase)
    }
}

/// Writes one lease stanza.
pub fn write_stanza<W: Write>(out: &mut W, interface: &str, lease: &Lease) -> io::Result<()> {
    writeln!(out, "lease {{")?;
    writeln!(out, "  interface \"{}\";", interface)?;
    writeln!(out, "  fixed-address {};", lease.address)?;
    if let Some(ref filename) = lease.filename {
        writeln!(out, "  filename \"{}\";", filename)?;
    }
    if let Some(ref server_name) = lease.server_name {
        writeln!(out, "  server-name \"{}\";", server_name)?;
    }
    if let Some(ref medium) = lease.medium {
        writeln!(out, "  medium \"{}\";", medium)?;
    }
    for (code, data) in lease.options.iter() {
        let tag = OptionTag::from(code);
        if tag == OptionTag::Unknown {
            // Unassigned codes keep a numeric name so they survive.
            writeln!(
                out,
                "  option option-{} {};",
                code,
                value::pretty_print(tag, data)
            )?;
        } else {
            writeln!(
                out,
                "  option {} {};",
                tag.name(),
                value::pretty_print(tag, data)
            )?;
        }
    }
    write_time(out, "renew", lease.renewal)?;
    write_time(out, "rebind", lease.rebind)?;
    write_time(out, "expire", lease.expiry)?;
    writeln!(out, "}}")
}

fn write_time<W: Write>(out: &mut W, keyword: &str, timestamp: i64) -> io::Result<()> {
    let t = Utc.timestamp(timestamp, 0);
    writeln!(
        out,
        "  {} {} {}/{}/{} {:02}:{:02}:{:02};",
        keyword,
        t.weekday().num_days_from_sunday(),
        t.year(),
        t.month(),
        t.day(),
        t.hour(),
        t.minute(),
        t.second()
    )
}

/// Reads the lease database back.
///
/// An unreadable file is a first boot, not an error. Malformed stanzas
/// are skipped with a warning so that one corrupt record does not lose
/// the rest of the database.
pub fn read_leases(path: &Path) -> Vec<(String, Lease)> {
    match ::std::fs::read_to_string(path) {
        Ok(contents) => parse_leases(&contents),
        Err(_) => Vec::new(),
    }
}

/// Parses lease stanzas out of the database text.
pub fn parse_leases(text: &str) -> Vec<(String, Lease)> {
    let mut entries = Vec::new();
    let mut builder: Option<StanzaBuilder> = None;

    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == "lease {" {
            builder = Some(StanzaBuilder::default());
            continue;
        }
        if line == "}" {
            if let Some(builder) = builder.take() {
                match builder.finish() {
                    Some(entry) => entries.push(entry),
                    None => warn!("Skipping a malformed lease stanza"),
                }
            }
            continue;
        }
        if let Some(ref mut builder) = builder {
            if !builder.statement(line) {
                warn!("Unrecognized lease statement: {}", line);
            }
        }
    }

    entries
}

#[derive(Default)]
struct StanzaBuilder {
    interface: Option<String>,
    address: Option<Ipv4Addr>,
    filename: Option<String>,
    server_name: Option<String>,
    medium: Option<String>,
    options: Options,
    renewal: Option<i64>,
    rebind: Option<i64>,
    expiry: Option<i64>,
}

impl StanzaBuilder {
    /// Consumes one `keyword value;` line. Returns false when the line
    /// does not parse.
    fn statement(&mut self, line: &str) -> bool {
        let line = match line.strip_suffix(';') {
            Some(line) => line,
            None => return false,
        };
        let (keyword, rest) = match line.split_once(' ') {
            Some(pair) => pair,
            None => return false,
        };
        let rest = rest.trim();

        match keyword {
            "interface" => self.interface = unquote(rest).map(str::to_owned),
            "fixed-address" => self.address = rest.parse().ok(),
            "filename" => self.filename = unquote(rest).map(str::to_owned),
            "server-name" => self.server_name = unquote(rest).map(str::to_owned),
            "medium" => self.medium = unquote(rest).map(str::to_owned),
            "option" => {
                let (name, text) = match rest.split_once(' ') {
                    Some(pair) => pair,
                    None => return false,
                };
                if let Some(code) = name.strip_prefix("option-") {
                    let code: u8 = match code.parse() {
                        Ok(code) => code,
                        Err(_) => return false,
                    };
                    match value::parse(OptionTag::Unknown, text) {
                        Some(data) => self.options.insert_raw(code, data),
                        None => return false,
                    }
                    return true;
                }
                let tag = match OptionTag::from_name(name) {
                    Some(tag) => tag,
                    None => return false,
                };
                match value::parse(tag, text) {
                    Some(data) => self.options.insert(tag, data),
                    None => return false,
                }
            }
            "renew" => self.renewal = parse_time(rest),
            "rebind" => self.rebind = parse_time(rest),
            "expire" => self.expiry = parse_time(rest),
            _ => return false,
        }
        true
    }

    fn finish(self) -> Option<(String, Lease)> {
        Some((
            self.interface?,
            Lease {
                address: self.address?,
                options: self.options,
                server_name: self.server_name,
                filename: self.filename,
                medium: self.medium,
                renewal: self.renewal?,
                rebind: self.rebind?,
                expiry: self.expiry?,
                is_static: false,
            },
        ))
    }
}

fn unquote(text: &str) -> Option<&str> {
    text.strip_prefix('"')?.strip_suffix('"')
}

/// Parses `<wday> <yyyy>/<mm>/<dd> <HH>:<MM>:<SS>`. The weekday is
/// derivable and only checked for presence.
fn parse_time(text: &str) -> Option<i64> {
    let mut words = text.split_whitespace();
    let _weekday: u8 = words.next()?.parse().ok()?;
    let mut date = words.next()?.split('/');
    let year: i32 = date.next()?.parse().ok()?;
    let month: u32 = date.next()?.parse().ok()?;
    let day: u32 = date.next()?.parse().ok()?;
    let mut time = words.next()?.split(':');
    let hour: u32 = time.next()?.parse().ok()?;
    let minute: u32 = time.next()?.parse().ok()?;
    let second: u32 = time.next()?.parse().ok()?;

    Some(
        Utc.ymd_opt(year, month, day)
            .single()?
            .and_hms_opt(hour, minute, second)?
            .timestamp(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_lease() -> Lease {
        let mut options = Options::new();
        options.set_ipv4(OptionTag::SubnetMask, Ipv4Addr::new(255, 255, 255, 0));
        options.insert(
            OptionTag::Routers,
            vec![10, 0, 0, 1],
        );
        options.set_u32(OptionTag::AddressTime, 43200);
        options.set_ipv4(OptionTag::DhcpServerId, Ipv4Addr::new(10, 0, 0, 1));
        options.set_string(OptionTag::DomainName, "example.org");

        Lease {
            address: Ipv4Addr::new(10, 0, 0, 5),
            options,
            server_name: Some("boot1".to_owned()),
            filename: Some("/boot/pxe".to_owned()),
            medium: Some("media0".to_owned()),
            renewal: 1_700_000_000,
            rebind: 1_700_020_000,
            expiry: 1_700_040_000,
            is_static: false,
        }
    }

    #[test]
    fn stanza_round_trip() {
        let lease = sample_lease();
        let mut text = Vec::new();
        write_stanza(&mut text, "eth0", &lease).unwrap();
        let text = String::from_utf8(text).unwrap();

        let entries = parse_leases(&text);
        assert_eq!(entries.len(), 1);
        let (interface, parsed) = &entries[0];
        assert_eq!(interface, "eth0");
        assert_eq!(parsed, &lease);
    }

    #[test]
    fn malformed_stanza_is_skipped() {
        let lease = sample_lease();
        let mut text = Vec::new();
        write_stanza(&mut text, "eth0", &lease).unwrap();
        let mut text = String::from_utf8(text).unwrap();
        text.push_str("lease {\n  interface \"eth1\";\n  what is this;\n}\n");
        // The second stanza has no address or times and must not survive.
        let entries = parse_leases(&text);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].0, "eth0");
    }

    #[test]
    fn static_leases_are_not_persisted() {
        let mut lease = sample_lease();
        lease.is_static = true;

        let directory = ::std::env::temp_dir().join("dhcp-client-db-test");
        let _ = ::std::fs::create_dir_all(&directory);
        let path = directory.join("static.leases");
        let _ = ::std::fs::remove_file(&path);

        let mut file = LeaseFile::new(&path);
        file.append("eth0", &lease).unwrap();
        assert!(read_leases(&path).is_empty());
        let _ = ::std::fs::remove_file(&path);
    }
}
