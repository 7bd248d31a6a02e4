//! The single-threaded dispatch loop.
//!
//! Delivers exactly one event at a time, a timer expiration or an
//! inbound packet, to the per-interface state machines. Handlers run to
//! completion; a blocking hook script therefore stalls every interface,
//! which is the accepted cost of keeping the ordering guarantees simple.

use std::{
    net::{IpAddr, Ipv4Addr, SocketAddr},
    path::PathBuf,
    time::Duration,
};

use chrono::Utc;
use log::{debug, warn};
use rand::{rngs::StdRng, SeedableRng};

use dhcp_framed::DhcpFramed;
use dhcp_protocol::{Message, OperationCode};

use crate::{
    config::{ClientConfig, InterfaceConfig},
    db::{self, LeaseFile},
    error::Result,
    hooks::{ClientScript, Hooks, ParamPrefix, Reason, ScriptCall},
    state::{Context, InterfaceClient, Output},
    timer::TimerQueue,
};

/// Collects outbound messages during a handler; the loop drains them to
/// the socket afterwards, logging and abandoning failed sends.
#[derive(Default)]
struct SendQueue {
    queued: Vec<(Ipv4Addr, Message)>,
}

impl Output for SendQueue {
    fn send(&mut self, destination: Ipv4Addr, message: Message) {
        self.queued.push((destination, message));
    }
}

/// The client service: one socket, one timer queue, one state machine
/// per managed interface.
pub struct Service {
    socket: DhcpFramed,
    config: ClientConfig,
    clients: Vec<InterfaceClient>,
    timers: TimerQueue,
    queue: SendQueue,
    hooks: Box<dyn Hooks>,
    db: LeaseFile,
    lease_path: PathBuf,
    rng: StdRng,
    server_port: u16,
}

impl Service {
    pub fn new(
        socket: DhcpFramed,
        config: ClientConfig,
        interfaces: Vec<InterfaceConfig>,
        lease_path: PathBuf,
        server_port: u16,
    ) -> Self {
        let clients = interfaces
            .into_iter()
            .enumerate()
            .map(|(index, interface)| InterfaceClient::new(index, interface, &config))
            .collect();
        let hooks = Box::new(ClientScript::new(&config.script));

        Service {
            socket,
            clients,
            timers: TimerQueue::new(),
            queue: SendQueue::default(),
            hooks,
            db: LeaseFile::new(&lease_path),
            lease_path,
            rng: StdRng::from_entropy(),
            config,
            server_port,
        }
    }

    /// Replaces the hook gateway, for embedders with their own.
    pub fn with_hooks(mut self, hooks: Box<dyn Hooks>) -> Self {
        self.hooks = hooks;
        self
    }

    /// Runs the client until a fatal error.
    ///
    /// Startup: read the lease database, rewrite it wholesale, run the
    /// PREINIT hook for every interface, then start the state machines
    /// and dispatch.
    pub async fn run(mut self) -> Result<()> {
        if self.clients.is_empty() {
            // No broadcast interfaces: tell the script and stop.
            self.hooks.run(ScriptCall {
                interface: None,
                reason: Reason::Nbi,
                medium: None,
                params: Vec::new(),
            });
            return Ok(());
        }

        let now = Utc::now().timestamp();
        for (interface, lease) in db::read_leases(&self.lease_path) {
            match self
                .clients
                .iter_mut()
                .find(|client| client.name() == interface)
            {
                Some(client) => client.adopt_recorded(lease, now),
                None => debug!(
                    "Dropping a recorded lease for unknown interface {}",
                    interface
                ),
            }
        }

        {
            let entries = self.clients.iter().flat_map(|client| {
                client
                    .known_leases()
                    .map(move |lease| (client.name(), lease))
            });
            self.db.rewrite(entries)?;
        }

        for client in &self.clients {
            self.hooks.run(
                ScriptCall::new(client.name(), Reason::Preinit)
                    .param_opt(ParamPrefix::Alias, client.alias()),
            );
        }

        for index in 0..self.clients.len() {
            let mut ctx = Context {
                now: Utc::now().timestamp(),
                config: &self.config,
                rng: &mut self.rng,
                timers: &mut self.timers,
                output: &mut self.queue,
                hooks: &mut *self.hooks,
                db: &mut self.db,
            };
            self.clients[index].start(&mut ctx)?;
        }

        loop {
            self.flush_queue().await;

            let now = Utc::now().timestamp();
            if let Some(key) = self.timers.pop_due(now) {
                let mut ctx = Context {
                    now,
                    config: &self.config,
                    rng: &mut self.rng,
                    timers: &mut self.timers,
                    output: &mut self.queue,
                    hooks: &mut *self.hooks,
                    db: &mut self.db,
                };
                self.clients[key.iface].timer_expired(&mut ctx, key.handler)?;
                continue;
            }

            let received = match self.timers.next_due() {
                Some(at) => {
                    let wait = (at - now).max(0) as u64;
                    let delay = tokio::time::delay_for(Duration::from_secs(wait));
                    tokio::select! {
                        _ = delay => None,
                        result = self.socket.recv() => match result {
                            Ok(received) => received,
                            Err(error) => {
                                warn!("Socket error: {}", error);
                                None
                            }
                        },
                    }
                }
                None => match self.socket.recv().await {
                    Ok(received) => received,
                    Err(error) => {
                        warn!("Socket error: {}", error);
                        None
                    }
                },
            };

            if let Some((source, message)) = received {
                self.deliver(source, &message)?;
            }
        }
    }

    /// Routes a reply to the interface whose hardware address it names.
    fn deliver(&mut self, source: SocketAddr, message: &Message) -> Result<()> {
        if message.operation_code != OperationCode::BootReply {
            debug!("Ignoring a non-reply from {}", source);
            return Ok(());
        }
        let index = match self.clients.iter().position(|client| {
            client.hardware_address() == message.client_hardware_address
        }) {
            Some(index) => index,
            None => {
                debug!(
                    "Dropping a reply for unknown hardware address {}",
                    message.client_hardware_address
                );
                return Ok(());
            }
        };

        debug!("Reply from {} on {}", source, self.clients[index].name());
        let mut ctx = Context {
            now: Utc::now().timestamp(),
            config: &self.config,
            rng: &mut self.rng,
            timers: &mut self.timers,
            output: &mut self.queue,
            hooks: &mut *self.hooks,
            db: &mut self.db,
        };
        self.clients[index].receive(&mut ctx, message)
    }

    async fn flush_queue(&mut self) {
        let port = self.server_port;
        let max_size = self.config.max_message_size;
        for (destination, message) in self.queue.queued.drain(..) {
            let addr = SocketAddr::new(IpAddr::V4(destination), port);
            if let Err(error) = self.socket.send(addr, &message, max_size).await {
                warn!("send_packet: {}", error);
            }
        }
    }
}
