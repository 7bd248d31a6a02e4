//! The per-interface protocol state machine.
//!
//! Runs on the single dispatch thread. Every entry point takes the
//! current time and the collaborators as an explicit context, so the
//! whole lease lifecycle is driven by two kinds of events only: a timer
//! expiring and a validated packet arriving. Handlers run to completion.

use std::{collections::VecDeque, net::Ipv4Addr};

use log::{debug, info, warn};
use rand::RngCore;

use dhcp_protocol::{Message, MessageType};

use crate::{
    backoff::Backoff,
    builder::MessageBuilder,
    config::{ClientConfig, InterfaceConfig},
    db::LeaseStore,
    error::{Error, Result},
    hooks::{Hooks, ParamPrefix, Reason, ScriptCall},
    lease::Lease,
    timer::{Handler, TimerKey, Timers},
};

/// The all-ones limited broadcast address.
pub const BROADCAST_ADDRESS: Ipv4Addr = Ipv4Addr::new(255, 255, 255, 255);

/// The client states of RFC 2131 §4.4. Falling back to recorded leases
/// on discovery timeout (the panic path) is a handler, not a state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DhcpState {
    Init,
    Selecting,
    Requesting,
    Rebooting,
    Bound,
    Renewing,
    Rebinding,
}

/// Where outbound messages go. Transmission itself is outside the
/// protocol core; errors are the transport's to log.
pub trait Output {
    fn send(&mut self, destination: Ipv4Addr, message: Message);
}

/// Everything a state machine operation may touch, injected per event.
pub struct Context<'a> {
    /// The current time in UNIX seconds.
    pub now: i64,
    pub config: &'a ClientConfig,
    pub rng: &'a mut dyn RngCore,
    pub timers: &'a mut dyn Timers,
    pub output: &'a mut dyn Output,
    pub hooks: &'a mut dyn Hooks,
    pub db: &'a mut dyn LeaseStore,
}

/// The per-interface client state.
pub struct InterfaceClient {
    index: usize,
    interface: InterfaceConfig,
    builder: MessageBuilder,

    state: DhcpState,
    /// The lease currently configuring the interface.
    active: Option<Lease>,
    /// A lease pending acknowledgment.
    new: Option<Lease>,
    /// Leases collected from `DHCPOFFER`s, in arrival order.
    offered_leases: VecDeque<Lease>,
    /// Recorded and statically configured leases, the panic candidates.
    leases: VecDeque<Lease>,

    /// Correlates requests and replies. Fresh per `DHCPDISCOVER`,
    /// carried through until an acknowledgment settles the exchange.
    xid: u32,
    /// Target of the current unicast exchange.
    destination: Ipv4Addr,
    /// The address being solicited, if any.
    requested_address: Option<Ipv4Addr>,
    backoff: Backoff,
    /// Cursor into the configured media list.
    medium: Option<usize>,
}

impl InterfaceClient {
    pub fn new(index: usize, mut interface: InterfaceConfig, config: &ClientConfig) -> Self {
        let builder = MessageBuilder::new(
            interface.hardware_address,
            interface.client_id.clone(),
            config.hostname.clone(),
            config.max_message_size,
        );
        let static_leases = ::std::mem::replace(&mut interface.static_leases, Vec::new());

        InterfaceClient {
            index,
            interface,
            builder,
            state: DhcpState::Init,
            active: None,
            new: None,
            offered_leases: VecDeque::new(),
            leases: static_leases.into_iter().collect(),
            xid: 0,
            destination: BROADCAST_ADDRESS,
            requested_address: None,
            backoff: Backoff::start(0),
            medium: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.interface.name
    }

    pub fn hardware_address(&self) -> eui48::MacAddress {
        self.interface.hardware_address
    }

    pub fn state(&self) -> DhcpState {
        self.state
    }

    pub fn active_lease(&self) -> Option<&Lease> {
        self.active.as_ref()
    }

    pub fn alias(&self) -> Option<&Lease> {
        self.interface.alias.as_ref()
    }

    /// Recorded leases plus the active one, for database rewrites.
    pub fn known_leases(&self) -> impl Iterator<Item = &Lease> {
        self.leases.iter().chain(self.active.iter())
    }

    /// Takes in one lease read back from the lease database. The most
    /// recently recorded unexpired lease becomes the active candidate
    /// for `INIT-REBOOT`; everything else is kept for the panic path.
    pub fn adopt_recorded(&mut self, lease: Lease, now: i64) {
        if lease.expired(now) {
            self.leases.push_back(lease);
            return;
        }
        if let Some(previous) = self.active.replace(lease) {
            self.leases.push_back(previous);
        }
    }

    fn key(&self, handler: Handler) -> TimerKey {
        TimerKey {
            handler,
            iface: self.index,
        }
    }

    fn medium_name<'a>(&self, config: &'a ClientConfig) -> Option<&'a str> {
        self.medium
            .and_then(|index| config.media.get(index))
            .map(String::as_str)
    }

    /// Brings the interface up: `INIT-REBOOT` when a recorded lease is
    /// still within its rebind time, plain discovery otherwise.
    pub fn start(&mut self, ctx: &mut Context) -> Result<()> {
        let reusable = self
            .active
            .as_ref()
            .map(|lease| lease.rebind >= ctx.now)
            .unwrap_or(false);
        if !reusable {
            return self.state_init(ctx);
        }

        self.state = DhcpState::Rebooting;
        self.xid = ctx.rng.next_u32();
        self.destination = BROADCAST_ADDRESS;
        self.backoff = Backoff::start(ctx.now);
        self.send_request(ctx)
    }

    /// One of the keyed timers fired. The state decides whether the
    /// handler is still legal; a stale firing is dropped.
    pub fn timer_expired(&mut self, ctx: &mut Context, handler: Handler) -> Result<()> {
        match handler {
            Handler::SendDiscover if self.state == DhcpState::Selecting => self.send_discover(ctx),
            Handler::SendRequest
                if match self.state {
                    DhcpState::Requesting
                    | DhcpState::Rebooting
                    | DhcpState::Renewing
                    | DhcpState::Rebinding => true,
                    _ => false,
                } =>
            {
                self.send_request(ctx)
            }
            Handler::StateSelecting => self.state_selecting(ctx),
            Handler::StateBound if self.state == DhcpState::Bound => self.state_bound(ctx),
            Handler::StateInit if self.state == DhcpState::Init => self.state_init(ctx),
            _ => {
                warn!(
                    "Dropping a {:?} timer in state {:?} on {}",
                    handler, self.state, self.interface.name
                );
                Ok(())
            }
        }
    }

    /// A validated inbound message for this interface.
    pub fn receive(&mut self, ctx: &mut Context, message: &Message) -> Result<()> {
        let message_type = match message.validate() {
            Ok(message_type) => message_type,
            Err(error) => {
                warn!("Invalid message on {}: {}", self.interface.name, error);
                return Ok(());
            }
        };
        debug!("{}", message);

        match message_type {
            MessageType::DhcpOffer => self.dhcp_offer(ctx, message),
            MessageType::DhcpAck => self.dhcp_ack(ctx, message),
            MessageType::DhcpNak => self.dhcp_nak(ctx, message),
            other => {
                debug!("Ignoring {} on {}", other, self.interface.name);
                Ok(())
            }
        }
    }

    /// Starts discovery: a fresh transaction, broadcast destination,
    /// and an immediate first `DHCPDISCOVER`.
    fn state_init(&mut self, ctx: &mut Context) -> Result<()> {
        self.xid = ctx.rng.next_u32();
        // If we had an address, try to get it again.
        self.requested_address = self.active.as_ref().map(|lease| lease.address);
        self.destination = BROADCAST_ADDRESS;
        self.state = DhcpState::Selecting;
        self.backoff = Backoff::start(ctx.now);
        self.send_discover(ctx)
    }

    fn send_discover(&mut self, ctx: &mut Context) -> Result<()> {
        // Past the panic timeout the recorded leases are all that's left.
        if self.backoff.past_ceiling(ctx.now, ctx.config.timeout) {
            return self.state_panic(ctx);
        }

        // Try the whole media list before growing the interval, but stop
        // cycling once an offer shows we have the medium right.
        let mut increase = true;
        if self.offered_leases.is_empty() && !ctx.config.media.is_empty() {
            increase = self.cycle_medium(ctx)?;
        }

        if increase {
            self.backoff.next_interval(ctx.rng);
        } else {
            self.backoff.keep_interval();
        }
        let deadline = self.backoff.first_sending + ctx.config.timeout;
        self.backoff.clamp_to_deadline(ctx.now, deadline);

        let message = self
            .builder
            .discover(ctx.config, self.xid, self.requested_address);
        info!(
            "DHCPDISCOVER on {} to {} interval {}",
            self.interface.name,
            BROADCAST_ADDRESS,
            self.backoff.interval()
        );
        ctx.output.send(BROADCAST_ADDRESS, message);

        ctx.timers.schedule(
            ctx.now + self.backoff.interval(),
            self.key(Handler::SendDiscover),
        );
        Ok(())
    }

    /// Advances to the next configured medium and lets the script switch
    /// to it. Returns whether the retry interval should grow this round:
    /// it does not while the first pass over the list is still underway.
    ///
    /// # Errors
    /// `Error::NoValidMedia` when a whole lap fails: that is a broken
    /// configuration, not a retry condition.
    fn cycle_medium(&mut self, ctx: &mut Context) -> Result<bool> {
        let count = ctx.config.media.len();
        let mut failures = 0;
        loop {
            let (next, increase) = match self.medium {
                Some(index) if index + 1 < count => (index + 1, false),
                _ => (0, true),
            };
            self.medium = Some(next);
            let medium = ctx.config.media[next].as_str();
            info!("Trying medium \"{}\" on {}", medium, self.interface.name);

            let code = ctx
                .hooks
                .run(ScriptCall::new(&self.interface.name, Reason::Medium).medium(Some(medium)));
            if code == 0 {
                return Ok(increase);
            }
            failures += 1;
            if failures >= count {
                return Err(Error::NoValidMedia(self.interface.name.clone()));
            }
        }
    }

    fn dhcp_offer(&mut self, ctx: &mut Context, message: &Message) -> Result<()> {
        if self.state != DhcpState::Selecting || message.transaction_id != self.xid {
            info!("DHCPOFFER in wrong transaction or state.");
            return Ok(());
        }

        // An offer missing required parameters is not worth requesting.
        for tag in &ctx.config.required_options {
            if message.options.get(*tag).is_none() {
                info!("DHCPOFFER isn't satisfactory: no {}.", tag.name());
                return Ok(());
            }
        }

        // A second offer of the same address adds nothing.
        if self
            .offered_leases
            .iter()
            .any(|lease| lease.address == message.your_ip_address)
        {
            info!("DHCPOFFER already seen.");
            return Ok(());
        }

        info!(
            "DHCPOFFER of {} on {}",
            message.your_ip_address, self.interface.name
        );
        let mut lease = Lease::from_message(message);
        lease.medium = self.medium_name(ctx.config).map(str::to_owned);

        // Fire off an ARP request for the offered address now; the
        // answer is collected at selection time.
        let code = ctx.hooks.run(
            ScriptCall::new(&self.interface.name, Reason::ArpSend)
                .medium(lease.medium.as_deref())
                .param(ParamPrefix::Check, &lease),
        );
        // A script that cannot send without waiting has already waited.
        let mut arp_wait: i64 = if code != 0 { 0 } else { 2 };

        let mut stop_selecting = self.backoff.first_sending + ctx.config.select_interval;

        if Some(lease.address) == self.requested_address {
            // The address we asked for goes to the head of the line.
            self.offered_leases.push_front(lease);
        } else {
            // Don't stretch the deadline for a second-choice offer.
            if !self.offered_leases.is_empty() && ctx.now + arp_wait > stop_selecting {
                arp_wait = 0;
            }
            self.offered_leases.push_back(lease);
        }

        // Leave enough room for the ARP reply to come back.
        if stop_selecting - ctx.now < arp_wait {
            stop_selecting = ctx.now + arp_wait;
        }
        ctx.timers
            .schedule(stop_selecting, self.key(Handler::StateSelecting));
        Ok(())
    }

    /// The selection deadline passed: ARP-check the collected offers in
    /// arrival order, decline the ones that fail, request the first
    /// survivor and discard the rest.
    fn state_selecting(&mut self, ctx: &mut Context) -> Result<()> {
        if self.state != DhcpState::Selecting {
            warn!("Dropping a selection timer in state {:?}", self.state);
            return Ok(());
        }
        // Either timer could have got us here.
        ctx.timers.cancel(self.key(Handler::StateSelecting));
        ctx.timers.cancel(self.key(Handler::SendDiscover));

        let mut picked: Option<Lease> = None;
        while let Some(lease) = self.offered_leases.pop_front() {
            if picked.is_some() {
                continue;
            }
            let code = ctx.hooks.run(
                ScriptCall::new(&self.interface.name, Reason::ArpCheck)
                    .medium(lease.medium.as_deref())
                    .param(ParamPrefix::Check, &lease),
            );
            if code != 0 {
                // Another machine answered for the address: tell the
                // server and toss the lease.
                self.send_decline(ctx, &lease);
                continue;
            }
            picked = Some(lease);
        }

        // If we just tossed all the leases we were offered, go back
        // to square one.
        let picked = match picked {
            Some(picked) => picked,
            None => return self.send_discover(ctx),
        };

        self.destination = BROADCAST_ADDRESS;
        self.state = DhcpState::Requesting;
        self.backoff = Backoff::start(ctx.now);
        self.new = Some(picked);
        self.send_request(ctx)
    }

    fn send_request(&mut self, ctx: &mut Context) -> Result<()> {
        // An INIT-REBOOT attempt that outlives its timeout falls back
        // to plain discovery.
        if self.state == DhcpState::Rebooting
            && self.backoff.elapsed(ctx.now) > ctx.config.reboot_timeout
        {
            ctx.timers.cancel(self.key(Handler::SendRequest));
            return self.state_init(ctx);
        }

        // Outside REQUESTING the exchange is about the active lease;
        // once that expires the address must be relinquished.
        if self.state != DhcpState::Requesting {
            let expired = match self.active.as_ref() {
                Some(active) => active.expired(ctx.now),
                None => {
                    warn!("No active lease to request on {}", self.interface.name);
                    ctx.timers.cancel(self.key(Handler::SendRequest));
                    return self.state_init(ctx);
                }
            };
            if expired {
                {
                    let active = self.active.as_ref().expect("checked above");
                    ctx.hooks.run(
                        ScriptCall::new(&self.interface.name, Reason::Expire)
                            .param(ParamPrefix::Old, active)
                            .param_opt(ParamPrefix::Alias, self.interface.alias.as_ref()),
                    );
                }
                self.active = None;
                ctx.timers.cancel(self.key(Handler::SendRequest));
                return self.state_init(ctx);
            }
        }

        self.backoff.next_interval(ctx.rng);
        if self.state != DhcpState::Requesting {
            // Make the expiry check above fire right after the lease ends.
            let expiry = self.active.as_ref().expect("checked above").expiry;
            self.backoff.clamp_to_deadline(ctx.now, expiry);
        }

        // Crossing T2 turns renewal into rebinding: from here on any
        // server may answer, so the request is broadcast.
        if self.state == DhcpState::Renewing {
            let rebind = self.active.as_ref().expect("checked above").rebind;
            if ctx.now > rebind {
                self.state = DhcpState::Rebinding;
            }
        }

        let destination = match self.state {
            DhcpState::Requesting | DhcpState::Rebinding => BROADCAST_ADDRESS,
            _ => self.destination,
        };

        let message = match self.state {
            DhcpState::Requesting => {
                let (address, server_id) = match self.new.as_ref() {
                    Some(pending) => (pending.address, pending.server_id()),
                    None => {
                        warn!("No pending lease to request on {}", self.interface.name);
                        return Ok(());
                    }
                };
                let server_id = match server_id {
                    Some(server_id) => server_id,
                    None => {
                        warn!(
                            "Pending lease for {} lacks a server identifier",
                            self.interface.name
                        );
                        self.new = None;
                        return self.state_init(ctx);
                    }
                };
                self.requested_address = Some(address);
                self.builder
                    .request_selecting(ctx.config, self.xid, address, server_id)
            }
            DhcpState::Rebooting => {
                let address = self.active.as_ref().expect("checked above").address;
                self.requested_address = Some(address);
                self.builder.request_init_reboot(ctx.config, self.xid, address)
            }
            _ => {
                let address = self.active.as_ref().expect("checked above").address;
                self.requested_address = None;
                self.builder.request_renew(ctx.config, self.xid, address)
            }
        };

        info!("DHCPREQUEST on {} to {}", self.interface.name, destination);
        ctx.output.send(destination, message);

        ctx.timers.schedule(
            ctx.now + self.backoff.interval(),
            self.key(Handler::SendRequest),
        );
        Ok(())
    }

    fn send_decline(&mut self, ctx: &mut Context, lease: &Lease) {
        let server_id = match lease.server_id() {
            Some(server_id) => server_id,
            None => {
                warn!("Cannot decline {}: no server identifier", lease.address);
                return;
            }
        };
        let message = self.builder.decline(self.xid, lease.address, server_id, None);
        info!("DHCPDECLINE on {} to {}", self.interface.name, BROADCAST_ADDRESS);
        ctx.output.send(BROADCAST_ADDRESS, message);
    }

    fn dhcp_ack(&mut self, ctx: &mut Context, message: &Message) -> Result<()> {
        if message.transaction_id != self.xid {
            info!("DHCPACK in wrong transaction.");
            return Ok(());
        }
        match self.state {
            DhcpState::Rebooting
            | DhcpState::Requesting
            | DhcpState::Renewing
            | DhcpState::Rebinding => {}
            _ => {
                info!("DHCPACK in wrong state.");
                return Ok(());
            }
        }
        info!("DHCPACK on {}", self.interface.name);

        // Stop resending DHCPREQUEST.
        ctx.timers.cancel(self.key(Handler::SendRequest));

        let mut lease = Lease::from_message(message);
        if lease.derive_times(ctx.now).is_none() {
            warn!("DHCPACK carries no lease time.");
            return Ok(());
        }
        lease.medium = self.medium_name(ctx.config).map(str::to_owned);

        // Commit state before the hook runs: a script that blocks or
        // crashes must not lose the lease.
        ctx.db.append(&self.interface.name, &lease)?;

        let reason = match self.state {
            DhcpState::Requesting => Reason::Bound,
            DhcpState::Renewing => Reason::Renew,
            _ => Reason::Rebind,
        };
        ctx.hooks.run(
            ScriptCall::new(&self.interface.name, reason)
                .medium(lease.medium.as_deref())
                .param_opt(ParamPrefix::Old, self.active.as_ref())
                .param(ParamPrefix::New, &lease)
                .param_opt(ParamPrefix::Alias, self.interface.alias.as_ref()),
        );

        // The acknowledged lease replaces the old active one.
        let renewal = lease.renewal;
        self.new = None;
        self.active = Some(lease);

        ctx.timers.schedule(renewal, self.key(Handler::StateBound));
        info!("bound: renewal in {} seconds.", renewal - ctx.now);
        self.state = DhcpState::Bound;
        Ok(())
    }

    fn dhcp_nak(&mut self, ctx: &mut Context, _message: &Message) -> Result<()> {
        match self.state {
            DhcpState::Rebooting
            | DhcpState::Requesting
            | DhcpState::Renewing
            | DhcpState::Rebinding => {}
            _ => {
                info!("DHCPNAK in wrong state.");
                return Ok(());
            }
        }
        if self.active.is_none() {
            info!("DHCPNAK with no active lease.");
            return Ok(());
        }
        info!("DHCPNAK on {}", self.interface.name);

        self.active = None;
        // Stop sending DHCPREQUEST packets.
        ctx.timers.cancel(self.key(Handler::SendRequest));
        self.state = DhcpState::Init;
        self.state_init(ctx)
    }

    /// T1 fired: ask the server that gave us the lease to extend it,
    /// or anyone at all if the lease never named one.
    fn state_bound(&mut self, ctx: &mut Context) -> Result<()> {
        let destination = match self.active.as_ref() {
            Some(active) => active.server_id().unwrap_or(BROADCAST_ADDRESS),
            None => {
                warn!("Renewal timer fired without an active lease.");
                return Ok(());
            }
        };

        self.destination = destination;
        self.backoff = Backoff::start(ctx.now);
        self.state = DhcpState::Renewing;
        self.send_request(ctx)
    }

    /// No offers within the panic timeout: fall back on recorded leases,
    /// trying each unexpired one once until the rotation comes back to
    /// where it started.
    fn state_panic(&mut self, ctx: &mut Context) -> Result<()> {
        info!("No DHCPOFFERS received.");

        let mut loop_start = self.active.as_ref().map(|lease| lease.address);
        if self.active.is_none() && !self.leases.is_empty() {
            loop_start = self.leases.front().map(|lease| lease.address);
            self.active = self.leases.pop_front();
        }

        loop {
            let usable = match self.active.as_ref() {
                None => break,
                Some(active) => active.expiry > ctx.now,
            };
            if usable {
                let code = {
                    let active = self.active.as_ref().expect("checked above");
                    info!("Trying recorded lease {}", active.address);
                    ctx.hooks.run(
                        ScriptCall::new(&self.interface.name, Reason::Timeout)
                            .medium(active.medium.as_deref())
                            .param(ParamPrefix::New, active)
                            .param_opt(ParamPrefix::Alias, self.interface.alias.as_ref()),
                    )
                };
                if code == 0 {
                    let renewal = self.active.as_ref().expect("checked above").renewal;
                    self.state = DhcpState::Bound;
                    if ctx.now < renewal {
                        info!("bound: renewal in {} seconds.", renewal - ctx.now);
                        ctx.timers.schedule(renewal, self.key(Handler::StateBound));
                        return Ok(());
                    }
                    info!("bound: immediate renewal.");
                    return self.state_bound(ctx);
                }
            }

            // If there are no other leases, give up.
            if self.leases.is_empty() {
                if let Some(active) = self.active.take() {
                    self.leases.push_back(active);
                }
                break;
            }

            // Otherwise rotate the active lease to the back and try the
            // next one, stopping when the rotation comes full circle.
            if let Some(retired) = self.active.take() {
                self.leases.push_back(retired);
            }
            let next = self.leases.pop_front().expect("checked above");
            let exhausted = Some(next.address) == loop_start;
            self.active = Some(next);
            if exhausted {
                break;
            }
        }

        // Nothing worked: let the script know and nap before retrying.
        info!("No working leases in persistent database - sleeping.");
        ctx.hooks.run(
            ScriptCall::new(&self.interface.name, Reason::Fail)
                .param_opt(ParamPrefix::Alias, self.interface.alias.as_ref()),
        );
        self.state = DhcpState::Init;
        ctx.timers.schedule(
            ctx.now + ctx.config.retry_interval,
            self.key(Handler::StateInit),
        );
        Ok(())
    }

    /// Gives the active lease back to its server and goes quiet until
    /// the next `start`.
    pub fn release(&mut self, ctx: &mut Context, message: Option<String>) {
        let lease = match self.active.take() {
            Some(lease) => lease,
            None => return,
        };
        ctx.timers.cancel(self.key(Handler::SendRequest));
        ctx.timers.cancel(self.key(Handler::StateBound));

        if let Some(server_id) = lease.server_id() {
            let release = self
                .builder
                .release(self.xid, lease.address, server_id, message);
            info!("DHCPRELEASE on {} to {}", self.interface.name, BROADCAST_ADDRESS);
            ctx.output.send(BROADCAST_ADDRESS, release);
        }
        self.state = DhcpState::Init;
    }
}
