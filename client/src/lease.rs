//! Client lease implementation.

use std::net::Ipv4Addr;

use dhcp_protocol::{trim_field, Message, Options, Overload};

/// A lease record of the DHCP client.
///
/// Lives in exactly one place at a time: the `active` slot, the pending
/// (`new`) slot, the offered list or the recorded-lease list. Moving it
/// between them transfers ownership.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lease {
    /// The assigned IPv4 address (`yiaddr` of the offer or ack).
    pub address: Ipv4Addr,
    /// Every option the server supplied, sparse by code.
    pub options: Options,
    /// The `sname` header field, when it carried a name and not options.
    pub server_name: Option<String>,
    /// The `file` header field, when it carried a path and not options.
    pub filename: Option<String>,
    /// The medium the lease was obtained under.
    pub medium: Option<String>,
    /// T1, absolute UNIX seconds.
    pub renewal: i64,
    /// T2, absolute UNIX seconds.
    pub rebind: i64,
    /// Absolute UNIX seconds.
    pub expiry: i64,
    /// Came from static configuration; never written to the lease database.
    pub is_static: bool,
}

impl Lease {
    /// Initializes a lease from an offer or acknowledgment.
    ///
    /// The `sname` and `file` header fields are taken only when the
    /// overload option does not claim them for option space.
    pub fn from_message(message: &Message) -> Self {
        let overload = message.options.overload().unwrap_or(Overload::Undefined);

        let server_name = if overload.covers_sname() {
            None
        } else {
            field_to_string(&message.server_name)
        };
        let filename = if overload.covers_file() {
            None
        } else {
            field_to_string(&message.boot_filename)
        };

        Lease {
            address: message.your_ip_address,
            options: message.options.clone(),
            server_name,
            filename,
            medium: None,
            renewal: 0,
            rebind: 0,
            expiry: 0,
            is_static: false,
        }
    }

    /// Creates a statically configured lease for an address.
    pub fn new_static(address: Ipv4Addr, expiry: i64) -> Self {
        Lease {
            address,
            options: Options::new(),
            server_name: None,
            filename: None,
            medium: None,
            renewal: expiry,
            rebind: expiry,
            expiry,
            is_static: true,
        }
    }

    /// Derives the absolute lease milestones from the option values.
    ///
    /// The server-provided renewal and rebinding times are honored when
    /// present; otherwise T1 is half the lease time and T2 grows from the
    /// renewal offset as `renewal + renewal/2 + renewal/4`.
    ///
    /// Returns `None` when the mandatory lease time option is missing.
    pub fn derive_times(&mut self, now: i64) -> Option<()> {
        let lease_time = i64::from(self.options.address_time()?);

        let renewal = self
            .options
            .renewal_time()
            .map(i64::from)
            .unwrap_or(lease_time / 2);
        let rebind = self
            .options
            .rebinding_time()
            .map(i64::from)
            .unwrap_or(renewal + renewal / 2 + renewal / 4);

        self.expiry = now + lease_time;
        self.renewal = now + renewal;
        self.rebind = now + rebind;
        Some(())
    }

    /// The address of the server the lease came from.
    pub fn server_id(&self) -> Option<Ipv4Addr> {
        self.options.dhcp_server_id()
    }

    /// Whether the lease may no longer be used.
    pub fn expired(&self, now: i64) -> bool {
        now > self.expiry
    }
}

fn field_to_string(field: &[u8]) -> Option<String> {
    let trimmed = trim_field(field);
    if trimmed.is_empty() {
        None
    } else {
        Some(String::from_utf8_lossy(trimmed).into_owned())
    }
}
