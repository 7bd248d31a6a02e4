//! State machine scenarios, driven with fake collaborators and a
//! hand-cranked clock.

use std::net::Ipv4Addr;

use eui48::{MacAddress, EUI48LEN};
use rand::{rngs::StdRng, SeedableRng};

use dhcp_client::{
    db::LeaseStore, ClientConfig, Context, DhcpState, Error, Handler, InterfaceClient,
    InterfaceConfig, Lease, Output, Reason, Result, ScriptCall, TimerQueue,
};
use dhcp_protocol::{
    HardwareType, Message, MessageType, OperationCode, OptionTag, Options,
};

const MAC: [u8; 6] = [0x00, 0x0c, 0x29, 0x13, 0x0e, 0x37];
const SERVER: Ipv4Addr = Ipv4Addr::new(10, 0, 0, 1);
const OFFERED: Ipv4Addr = Ipv4Addr::new(10, 0, 0, 5);

#[derive(Default)]
struct FakeOutput {
    sent: Vec<(Ipv4Addr, Message)>,
}

impl Output for FakeOutput {
    fn send(&mut self, destination: Ipv4Addr, message: Message) {
        self.sent.push((destination, message));
    }
}

#[derive(Default)]
struct FakeHooks {
    calls: Vec<Reason>,
    failing: Vec<Reason>,
}

impl dhcp_client::Hooks for FakeHooks {
    fn run(&mut self, call: ScriptCall) -> i32 {
        self.calls.push(call.reason);
        if self.failing.contains(&call.reason) {
            1
        } else {
            0
        }
    }
}

#[derive(Default)]
struct FakeStore {
    appended: Vec<(String, Lease)>,
}

impl LeaseStore for FakeStore {
    fn append(&mut self, interface: &str, lease: &Lease) -> Result<()> {
        self.appended.push((interface.to_owned(), lease.clone()));
        Ok(())
    }
}

struct Harness {
    config: ClientConfig,
    rng: StdRng,
    timers: TimerQueue,
    output: FakeOutput,
    hooks: FakeHooks,
    db: FakeStore,
    client: InterfaceClient,
}

impl Harness {
    fn new() -> Self {
        let mut config = ClientConfig::default();
        config.select_interval = 5;
        let client = InterfaceClient::new(
            0,
            InterfaceConfig::new("eth0".to_owned(), MacAddress::new(MAC)),
            &config,
        );
        Harness {
            config,
            rng: StdRng::seed_from_u64(7),
            timers: TimerQueue::new(),
            output: FakeOutput::default(),
            hooks: FakeHooks::default(),
            db: FakeStore::default(),
            client,
        }
    }

    fn start(&mut self, now: i64) -> Result<()> {
        let mut ctx = Context {
            now,
            config: &self.config,
            rng: &mut self.rng,
            timers: &mut self.timers,
            output: &mut self.output,
            hooks: &mut self.hooks,
            db: &mut self.db,
        };
        self.client.start(&mut ctx)
    }

    fn timer(&mut self, now: i64, handler: Handler) -> Result<()> {
        let mut ctx = Context {
            now,
            config: &self.config,
            rng: &mut self.rng,
            timers: &mut self.timers,
            output: &mut self.output,
            hooks: &mut self.hooks,
            db: &mut self.db,
        };
        self.client.timer_expired(&mut ctx, handler)
    }

    fn receive(&mut self, now: i64, message: &Message) -> Result<()> {
        let mut ctx = Context {
            now,
            config: &self.config,
            rng: &mut self.rng,
            timers: &mut self.timers,
            output: &mut self.output,
            hooks: &mut self.hooks,
            db: &mut self.db,
        };
        self.client.receive(&mut ctx, message)
    }

    /// Fires every timer due by `now`, in order.
    fn run_due(&mut self, now: i64) {
        while let Some(key) = self.timers.pop_due(now) {
            self.timer(now, key.handler).unwrap();
        }
    }

    fn last_sent(&self) -> &(Ipv4Addr, Message) {
        self.output.sent.last().expect("nothing was sent")
    }

    fn current_xid(&self) -> u32 {
        self.last_sent().1.transaction_id
    }

    fn hook_count(&self, reason: Reason) -> usize {
        self.hooks.calls.iter().filter(|r| **r == reason).count()
    }
}

fn reply(message_type: MessageType, xid: u32, address: Ipv4Addr, lease_time: u32) -> Message {
    let mut options = Options::new();
    options.set_message_type(message_type);
    options.set_ipv4(OptionTag::DhcpServerId, SERVER);
    if message_type != MessageType::DhcpNak {
        options.set_u32(OptionTag::AddressTime, lease_time);
    }

    Message {
        operation_code: OperationCode::BootReply,
        hardware_type: HardwareType::Ethernet,
        hardware_address_length: EUI48LEN as u8,
        hardware_options: 0,
        transaction_id: xid,
        seconds: 0,
        is_broadcast: false,
        client_ip_address: Ipv4Addr::new(0, 0, 0, 0),
        your_ip_address: address,
        server_ip_address: SERVER,
        gateway_ip_address: Ipv4Addr::new(0, 0, 0, 0),
        client_hardware_address: MacAddress::new(MAC),
        server_name: vec![0u8; 64],
        boot_filename: vec![0u8; 128],
        options,
    }
}

fn recorded_lease(expiry: i64, renewal: i64, rebind: i64) -> Lease {
    let mut options = Options::new();
    options.set_u32(OptionTag::AddressTime, 43200);
    options.set_ipv4(OptionTag::DhcpServerId, SERVER);
    Lease {
        address: OFFERED,
        options,
        server_name: None,
        filename: None,
        medium: None,
        renewal,
        rebind,
        expiry,
        is_static: false,
    }
}

/// Drives a harness to the BOUND state; the lease runs from `now`.
fn bind(harness: &mut Harness, now: i64, lease_time: u32) {
    harness.start(now).unwrap();
    let xid = harness.current_xid();
    harness
        .receive(now + 1, &reply(MessageType::DhcpOffer, xid, OFFERED, lease_time))
        .unwrap();
    harness.run_due(now + harness.config.select_interval);
    assert_eq!(harness.client.state(), DhcpState::Requesting);
    harness
        .receive(
            now + harness.config.select_interval,
            &reply(MessageType::DhcpAck, xid, OFFERED, lease_time),
        )
        .unwrap();
    assert_eq!(harness.client.state(), DhcpState::Bound);
}

#[test]
fn offer_moves_selecting_to_requesting() {
    let mut harness = Harness::new();
    harness.start(0).unwrap();

    assert_eq!(harness.client.state(), DhcpState::Selecting);
    let (destination, discover) = harness.last_sent();
    assert_eq!(*destination, Ipv4Addr::new(255, 255, 255, 255));
    assert_eq!(discover.options.message_type(), Some(MessageType::DhcpDiscover));
    let xid = discover.transaction_id;

    harness
        .receive(1, &reply(MessageType::DhcpOffer, xid, OFFERED, 43200))
        .unwrap();
    assert_eq!(harness.hook_count(Reason::ArpSend), 1);

    harness.run_due(5);
    assert_eq!(harness.hook_count(Reason::ArpCheck), 1);
    assert_eq!(harness.client.state(), DhcpState::Requesting);

    let (destination, request) = harness.last_sent();
    assert_eq!(*destination, Ipv4Addr::new(255, 255, 255, 255));
    assert_eq!(request.options.message_type(), Some(MessageType::DhcpRequest));
    assert!(request.client_ip_address.is_unspecified());
    assert_eq!(request.options.address_request(), Some(OFFERED));
    assert_eq!(request.options.dhcp_server_id(), Some(SERVER));
    assert_eq!(request.transaction_id, xid);
}

#[test]
fn duplicate_offer_is_dropped() {
    let mut harness = Harness::new();
    harness.start(0).unwrap();
    let xid = harness.current_xid();

    let offer = reply(MessageType::DhcpOffer, xid, OFFERED, 43200);
    harness.receive(1, &offer).unwrap();
    harness.receive(2, &offer).unwrap();

    // The second offer never reaches the ARP probe.
    assert_eq!(harness.hook_count(Reason::ArpSend), 1);
}

#[test]
fn offer_with_wrong_xid_is_dropped() {
    let mut harness = Harness::new();
    harness.start(0).unwrap();
    let xid = harness.current_xid();

    harness
        .receive(1, &reply(MessageType::DhcpOffer, xid.wrapping_add(1), OFFERED, 43200))
        .unwrap();
    assert_eq!(harness.hook_count(Reason::ArpSend), 0);
}

#[test]
fn offer_missing_a_required_option_is_dropped() {
    let mut harness = Harness::new();
    harness.config.required_options.push(OptionTag::DomainName);
    harness.start(0).unwrap();
    let xid = harness.current_xid();

    harness
        .receive(1, &reply(MessageType::DhcpOffer, xid, OFFERED, 43200))
        .unwrap();
    assert_eq!(harness.hook_count(Reason::ArpSend), 0);
}

#[test]
fn arp_conflict_declines_the_offer() {
    let mut harness = Harness::new();
    harness.hooks.failing.push(Reason::ArpCheck);
    harness.start(0).unwrap();
    let xid = harness.current_xid();

    harness
        .receive(1, &reply(MessageType::DhcpOffer, xid, OFFERED, 43200))
        .unwrap();
    harness.run_due(5);

    // The conflicted lease was declined and discovery started over.
    let declines: Vec<&Message> = harness
        .output
        .sent
        .iter()
        .map(|(_, message)| message)
        .filter(|message| message.options.message_type() == Some(MessageType::DhcpDecline))
        .collect();
    assert_eq!(declines.len(), 1);
    assert_eq!(declines[0].options.address_request(), Some(OFFERED));
    assert_eq!(harness.client.state(), DhcpState::Selecting);
}

#[test]
fn acknowledgment_binds_and_persists_before_the_hook() {
    let mut harness = Harness::new();
    bind(&mut harness, 0, 43200);

    assert_eq!(harness.hook_count(Reason::Bound), 1);
    assert_eq!(harness.db.appended.len(), 1);
    let (interface, lease) = &harness.db.appended[0];
    assert_eq!(interface, "eth0");
    assert_eq!(lease.address, OFFERED);
    // T1 defaults to half the lease time from the acknowledgment time.
    assert_eq!(lease.renewal, 5 + 21600);
    assert_eq!(lease.rebind, 5 + 21600 + 10800 + 5400);
    assert_eq!(lease.expiry, 5 + 43200);
}

#[test]
fn renewal_timer_unicasts_to_the_leasing_server() {
    let mut harness = Harness::new();
    bind(&mut harness, 0, 43200);
    let renewal = harness.client.active_lease().unwrap().renewal;

    harness.run_due(renewal);
    assert_eq!(harness.client.state(), DhcpState::Renewing);

    let (destination, request) = harness.last_sent();
    assert_eq!(*destination, SERVER);
    assert_eq!(request.options.message_type(), Some(MessageType::DhcpRequest));
    // The client owns the address now: it rides in ciaddr.
    assert_eq!(request.client_ip_address, OFFERED);
    assert_eq!(request.options.address_request(), None);
}

#[test]
fn nak_while_renewing_discards_the_lease_and_restarts() {
    let mut harness = Harness::new();
    bind(&mut harness, 0, 43200);
    let renewal = harness.client.active_lease().unwrap().renewal;
    harness.run_due(renewal);
    assert_eq!(harness.client.state(), DhcpState::Renewing);
    let xid = harness.current_xid();

    harness
        .receive(renewal + 1, &reply(MessageType::DhcpNak, xid, OFFERED, 0))
        .unwrap();

    assert!(harness.client.active_lease().is_none());
    // Discovery restarted under a fresh transaction.
    let (_, discover) = harness.last_sent();
    assert_eq!(discover.options.message_type(), Some(MessageType::DhcpDiscover));
    assert_ne!(discover.transaction_id, xid);

    // No renewal retransmission survives the restart.
    while let Some(key) = harness.timers.pop_due(renewal + 100) {
        assert_ne!(key.handler, Handler::SendRequest);
    }
}

#[test]
fn expiry_fires_the_expire_hook_and_rediscovers() {
    let mut harness = Harness::new();
    bind(&mut harness, 0, 100);
    let active = harness.client.active_lease().unwrap();
    let (renewal, expiry) = (active.renewal, active.expiry);

    harness.run_due(renewal);
    assert_eq!(harness.client.state(), DhcpState::Renewing);

    // No acknowledgment ever arrives; run every retransmission until
    // well past the expiry.
    harness.run_due(expiry + 10);

    assert_eq!(harness.hook_count(Reason::Expire), 1);
    assert!(harness.client.active_lease().is_none());
    let (_, discover) = harness.last_sent();
    assert_eq!(discover.options.message_type(), Some(MessageType::DhcpDiscover));
}

#[test]
fn renewing_broadcasts_after_the_rebind_time() {
    let mut harness = Harness::new();
    bind(&mut harness, 0, 1000);
    let active = harness.client.active_lease().unwrap();
    let (renewal, rebind) = (active.renewal, active.rebind);

    harness.run_due(renewal);
    assert_eq!(harness.client.state(), DhcpState::Renewing);
    assert_eq!(harness.last_sent().0, SERVER);

    harness.run_due(rebind + 1);
    assert_eq!(harness.client.state(), DhcpState::Rebinding);
    assert_eq!(harness.last_sent().0, Ipv4Addr::new(255, 255, 255, 255));
}

#[test]
fn panic_timeout_falls_back_to_a_recorded_lease() {
    let mut harness = Harness::new();
    harness
        .client
        .adopt_recorded(recorded_lease(10_000, 9_000, 9_500), 0);
    // Pretend the recorded lease is too old to reboot with, so the
    // client discovers instead.
    harness.client.adopt_recorded(recorded_lease(-1, -3, -2), 0);

    harness.start(0).unwrap();
    assert_eq!(harness.client.state(), DhcpState::Rebooting);

    // The reboot attempt gives up and discovery takes over.
    harness.run_due(harness.config.reboot_timeout + 2);
    assert_eq!(harness.client.state(), DhcpState::Selecting);

    // No offer ever arrives; the panic timeout trips and the recorded
    // lease is tried and accepted by the TIMEOUT hook.
    let deadline = harness.config.reboot_timeout + 2 + harness.config.timeout + 5;
    harness.run_due(deadline);
    assert_eq!(harness.hook_count(Reason::Timeout), 1);
    assert_eq!(harness.client.state(), DhcpState::Bound);
}

#[test]
fn panic_with_no_leases_fails_and_schedules_a_retry() {
    let mut harness = Harness::new();
    harness.start(0).unwrap();

    harness.run_due(harness.config.timeout + 5);
    assert_eq!(harness.hook_count(Reason::Fail), 1);
    assert_eq!(harness.client.state(), DhcpState::Init);

    // The retry timer brings discovery back.
    let retry_at = harness.config.timeout + 5 + harness.config.retry_interval;
    harness.run_due(retry_at);
    assert_eq!(harness.client.state(), DhcpState::Selecting);
}

#[test]
fn panic_rotation_tries_each_lease_once() {
    let mut harness = Harness::new();
    harness.hooks.failing.push(Reason::Timeout);
    let mut second = recorded_lease(10_000, 9_000, 9_500);
    second.address = Ipv4Addr::new(10, 0, 0, 6);
    second.rebind = -1; // not fresh enough for a reboot
    harness.client.adopt_recorded(second, 0);
    let mut first = recorded_lease(10_000, 9_000, 9_500);
    first.rebind = -1;
    harness.client.adopt_recorded(first, 0);

    harness.start(0).unwrap();
    assert_eq!(harness.client.state(), DhcpState::Selecting);
    harness.run_due(harness.config.timeout + 5);

    // Both candidates were tried exactly once before giving up.
    assert_eq!(harness.hook_count(Reason::Timeout), 2);
    assert_eq!(harness.hook_count(Reason::Fail), 1);
    assert_eq!(harness.client.state(), DhcpState::Init);
}

#[test]
fn reboot_reuses_the_recorded_address() {
    let mut harness = Harness::new();
    harness
        .client
        .adopt_recorded(recorded_lease(10_000, 9_000, 9_500), 0);

    harness.start(0).unwrap();
    assert_eq!(harness.client.state(), DhcpState::Rebooting);

    let (_, request) = harness.last_sent();
    assert_eq!(request.options.message_type(), Some(MessageType::DhcpRequest));
    assert_eq!(request.options.address_request(), Some(OFFERED));
    assert!(request.client_ip_address.is_unspecified());
    // No server is named: any server may confirm the old lease.
    assert_eq!(request.options.dhcp_server_id(), None);

    let xid = harness.current_xid();
    harness
        .receive(1, &reply(MessageType::DhcpAck, xid, OFFERED, 43200))
        .unwrap();
    assert_eq!(harness.client.state(), DhcpState::Bound);
    assert_eq!(harness.db.appended.len(), 1);
}

#[test]
fn exhausted_media_list_is_a_configuration_error() {
    let mut harness = Harness::new();
    harness.config.media = vec!["media0".to_owned(), "media1".to_owned()];
    harness.hooks.failing.push(Reason::Medium);

    match harness.start(0) {
        Err(Error::NoValidMedia(interface)) => assert_eq!(interface, "eth0"),
        other => panic!("expected NoValidMedia, got {:?}", other.map(|_| ())),
    }
    assert_eq!(harness.hook_count(Reason::Medium), 2);
}

#[test]
fn release_returns_the_address_and_goes_quiet() {
    let mut harness = Harness::new();
    bind(&mut harness, 0, 43200);

    {
        let mut ctx = Context {
            now: 10,
            config: &harness.config,
            rng: &mut harness.rng,
            timers: &mut harness.timers,
            output: &mut harness.output,
            hooks: &mut harness.hooks,
            db: &mut harness.db,
        };
        harness.client.release(&mut ctx, Some("Releasing".to_owned()));
    }

    let (_, release) = harness.last_sent();
    assert_eq!(release.options.message_type(), Some(MessageType::DhcpRelease));
    assert!(!release.is_broadcast);
    assert_eq!(release.client_ip_address, OFFERED);
    assert!(harness.client.active_lease().is_none());
    assert_eq!(harness.client.state(), DhcpState::Init);
}
