//! The configuration hook gateway.
//!
//! Network changes are applied by an external shell script. The client
//! writes a throwaway script exporting the interface, the reason and the
//! lease parameters, runs it synchronously and hands the exit code back
//! to the state machine. Only the ARPSEND/ARPCHECK/MEDIUM/TIMEOUT exit
//! codes carry meaning; the rest are ignored by the callers.

use std::{
    fmt,
    fs,
    io::{self, Write},
    path::PathBuf,
    process::Command,
};

use log::{error, warn};

use dhcp_protocol::{options::value, OptionTag, ValueKind};

use crate::lease::Lease;

/// The reason a hook runs, exported as `$reason`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reason {
    Preinit,
    Nbi,
    ArpSend,
    ArpCheck,
    Medium,
    Bound,
    Renew,
    Rebind,
    Timeout,
    Expire,
    Fail,
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use self::Reason::*;
        let name = match self {
            Preinit => "PREINIT",
            Nbi => "NBI",
            ArpSend => "ARPSEND",
            ArpCheck => "ARPCHECK",
            Medium => "MEDIUM",
            Bound => "BOUND",
            Renew => "RENEW",
            Rebind => "REBIND",
            Timeout => "TIMEOUT",
            Expire => "EXPIRE",
            Fail => "FAIL",
        };
        write!(f, "{}", name)
    }
}

/// The variable prefix a lease's parameters are exported under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamPrefix {
    Old,
    New,
    Check,
    Alias,
}

impl ParamPrefix {
    pub fn as_str(self) -> &'static str {
        match self {
            ParamPrefix::Old => "old_",
            ParamPrefix::New => "new_",
            ParamPrefix::Check => "check_",
            ParamPrefix::Alias => "alias_",
        }
    }
}

/// One hook invocation.
pub struct ScriptCall<'a> {
    pub interface: Option<&'a str>,
    pub reason: Reason,
    pub medium: Option<&'a str>,
    pub params: Vec<(ParamPrefix, &'a Lease)>,
}

impl<'a> ScriptCall<'a> {
    pub fn new(interface: &'a str, reason: Reason) -> Self {
        ScriptCall {
            interface: Some(interface),
            reason,
            medium: None,
            params: Vec::new(),
        }
    }

    pub fn medium(mut self, medium: Option<&'a str>) -> Self {
        self.medium = medium;
        self
    }

    pub fn param(mut self, prefix: ParamPrefix, lease: &'a Lease) -> Self {
        self.params.push((prefix, lease));
        self
    }

    pub fn param_opt(mut self, prefix: ParamPrefix, lease: Option<&'a Lease>) -> Self {
        if let Some(lease) = lease {
            self.params.push((prefix, lease));
        }
        self
    }
}

/// The hook half of the hook/persistence gateway.
pub trait Hooks {
    /// Runs the script synchronously and returns its exit code.
    /// Nonzero is a domain signal, not an error.
    fn run(&mut self, call: ScriptCall) -> i32;
}

/// The production hook gateway invoking the configured shell script.
pub struct ClientScript {
    script: PathBuf,
}

impl ClientScript {
    pub fn new<P: Into<PathBuf>>(script: P) -> Self {
        ClientScript {
            script: script.into(),
        }
    }

    fn write_script(&self, call: &ScriptCall) -> io::Result<PathBuf> {
        let path = ::std::env::temp_dir().join(format!("dcs{:06x}", rand::random::<u32>() & 0xff_ffff));
        let mut file = fs::File::create(&path)?;

        writeln!(file, "#!/bin/sh\n")?;
        if let Some(interface) = call.interface {
            writeln!(file, "interface=\"{}\"", interface)?;
            writeln!(file, "export interface")?;
        }
        if let Some(medium) = call.medium {
            writeln!(file, "medium=\"{}\"", medium)?;
            writeln!(file, "export medium")?;
        }
        writeln!(file, "reason=\"{}\"", call.reason)?;
        writeln!(file, "export reason")?;

        for (prefix, lease) in &call.params {
            write_params(&mut file, prefix.as_str(), lease)?;
        }

        writeln!(file, "{}", self.script.display())?;
        writeln!(file, "exit $?")?;
        drop(file);

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&path, fs::Permissions::from_mode(0o700))?;
        }

        Ok(path)
    }
}

impl Hooks for ClientScript {
    fn run(&mut self, call: ScriptCall) -> i32 {
        let path = match self.write_script(&call) {
            Ok(path) => path,
            Err(error) => {
                // Treated as a clean exit: a lost hook must not wedge
                // the protocol engine.
                error!("Can't write the hook script: {}", error);
                return 0;
            }
        };

        let status = Command::new("/bin/sh").arg(&path).status();
        let _ = fs::remove_file(&path);

        match status {
            Ok(status) => status.code().unwrap_or(0),
            Err(error) => {
                warn!("Hook script execution failed: {}", error);
                0
            }
        }
    }
}

/// Exports one lease under a prefix: the address, the boot parameters,
/// every present option under its environment name, and the expiry.
fn write_params<W: Write>(out: &mut W, prefix: &str, lease: &Lease) -> io::Result<()> {
    writeln!(out, "{}ip_address=\"{}\"", prefix, lease.address)?;
    writeln!(out, "export {}ip_address", prefix)?;
    if let Some(ref filename) = lease.filename {
        writeln!(out, "{}filename=\"{}\"", prefix, filename)?;
        writeln!(out, "export {}filename", prefix)?;
    }
    if let Some(ref server_name) = lease.server_name {
        writeln!(out, "{}server_name=\"{}\"", prefix, server_name)?;
        writeln!(out, "export {}server_name", prefix)?;
    }
    for (code, data) in lease.options.iter() {
        let tag = OptionTag::from(code);
        if tag == OptionTag::Unknown {
            continue;
        }
        let name = tag.name().replace('-', "_");
        writeln!(out, "{}{}=\"{}\"", prefix, name, env_value(tag, data))?;
        writeln!(out, "export {}{}", prefix, name)?;
    }
    writeln!(out, "{}expiry=\"{}\"", prefix, lease.expiry)?;
    writeln!(out, "export {}expiry", prefix)
}

/// The shell already quotes the value, so text options go in bare.
fn env_value(tag: OptionTag, data: &[u8]) -> String {
    match tag.kind() {
        ValueKind::Text => String::from_utf8_lossy(data).into_owned(),
        _ => value::pretty_print(tag, data),
    }
}
