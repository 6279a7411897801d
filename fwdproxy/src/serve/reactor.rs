/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use log::{debug, info, warn};
use mio::net::{TcpListener, TcpStream};
use mio::{Events, Interest, Poll, Token, Waker};
use rustc_hash::FxHashMap;
use slog::Logger;

use super::resolve::{HostResolver, ResolveDone, ResolverPool, SystemResolver};
use super::{
    HalfConnection, ReactorStats, Role, ServerTaskError, ServerTaskResult, TaskNotes, UnitAction,
};
use crate::config::ProxyConfig;
use crate::log::task::TaskLogForRelay;

const LISTENER: Token = Token(0);
const WAKER: Token = Token(1);
const FIRST_UNIT_TOKEN: usize = 2;

type Unit = HalfConnection<TcpStream>;

#[derive(Clone, Copy)]
struct ReadyEvent {
    token: Token,
    readable: bool,
    writable: bool,
}

/// Used to stop a running [`Reactor`] from another thread.
#[derive(Clone)]
pub struct ReactorHandle {
    quit: Arc<AtomicBool>,
    waker: Arc<Waker>,
    stats: Arc<ReactorStats>,
}

impl ReactorHandle {
    pub fn shutdown(&self) -> io::Result<()> {
        self.quit.store(true, Ordering::Release);
        self.waker.wake()
    }

    pub fn stats(&self) -> &Arc<ReactorStats> {
        &self.stats
    }
}

/// The single threaded event loop that accepts clients and relays all
/// connection pairs.
pub struct Reactor {
    config: ProxyConfig,
    poll: Poll,
    events: Events,
    ready: Vec<ReadyEvent>,
    listener: TcpListener,
    units: FxHashMap<Token, Unit>,
    next_token: usize,
    next_task_id: u64,
    task_logger: Logger,
    stats: Arc<ReactorStats>,
    quit: Arc<AtomicBool>,
    waker: Arc<Waker>,
    resolver: ResolverPool,
}

impl Reactor {
    pub fn new(config: &ProxyConfig) -> io::Result<Self> {
        Reactor::with_resolver(config, SystemResolver)
    }

    /// Create a reactor that looks up upstream hosts with `resolver`.
    pub fn with_resolver<R: HostResolver>(config: &ProxyConfig, resolver: R) -> io::Result<Self> {
        let poll = Poll::new()?;
        let listener = super::listen::new_std_listener(config.listen, config.backlog)?;
        let mut listener = TcpListener::from_std(listener);
        poll.registry()
            .register(&mut listener, LISTENER, Interest::READABLE)?;
        let waker = Arc::new(Waker::new(poll.registry(), WAKER)?);
        let resolver = ResolverPool::spawn(
            config.resolver_threads,
            Arc::new(resolver),
            Arc::clone(&waker),
        )?;

        Ok(Reactor {
            config: config.clone(),
            poll,
            events: Events::with_capacity(config.max_events),
            ready: Vec::with_capacity(config.max_events),
            listener,
            units: FxHashMap::default(),
            next_token: FIRST_UNIT_TOKEN,
            next_task_id: 1,
            task_logger: crate::log::task::get_logger(),
            stats: Arc::new(ReactorStats::default()),
            quit: Arc::new(AtomicBool::new(false)),
            waker,
            resolver,
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn handle(&self) -> ReactorHandle {
        ReactorHandle {
            quit: Arc::clone(&self.quit),
            waker: Arc::clone(&self.waker),
            stats: Arc::clone(&self.stats),
        }
    }

    pub fn stats(&self) -> Arc<ReactorStats> {
        Arc::clone(&self.stats)
    }

    /// Run until a shutdown is requested through a [`ReactorHandle`].
    pub fn run(&mut self) -> io::Result<()> {
        let addr = self.local_addr()?;
        info!("proxy started on {addr}");
        while !self.quit.load(Ordering::Acquire) {
            self.run_once(None)?;
        }
        self.close_all();
        info!("proxy on {addr} stopped");
        Ok(())
    }

    /// Wait for readiness once, and dispatch all received events.
    pub fn run_once(&mut self, timeout: Option<Duration>) -> io::Result<()> {
        if let Err(e) = self.poll.poll(&mut self.events, timeout) {
            return if e.kind() == io::ErrorKind::Interrupted {
                Ok(())
            } else {
                Err(e)
            };
        }

        let mut ready = std::mem::take(&mut self.ready);
        ready.clear();
        ready.extend(self.events.iter().map(|e| ReadyEvent {
            token: e.token(),
            readable: e.is_readable() || e.is_read_closed() || e.is_error(),
            writable: e.is_writable() || e.is_write_closed() || e.is_error(),
        }));
        for ev in &ready {
            match ev.token {
                LISTENER => self.accept_clients(),
                WAKER => self.finish_lookups(),
                token => {
                    if ev.writable {
                        self.handle_unit(token, false);
                    }
                    if ev.readable {
                        self.handle_unit(token, true);
                    }
                }
            }
        }
        self.ready = ready;
        Ok(())
    }

    fn next_token(&mut self) -> Token {
        let token = Token(self.next_token);
        self.next_token = self.next_token.wrapping_add(1).max(FIRST_UNIT_TOKEN);
        token
    }

    fn accept_clients(&mut self) {
        loop {
            match self.listener.accept() {
                Ok((stream, peer)) => self.add_client(stream, peer),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => {
                    warn!("failed to accept client connection: {e}");
                    break;
                }
            }
        }
    }

    fn add_client(&mut self, stream: TcpStream, peer: SocketAddr) {
        let token = self.next_token();
        let notes = TaskNotes::new(self.next_task_id, peer);
        self.next_task_id += 1;

        let unit = HalfConnection::new_client(stream, self.config.buffer_size, notes);
        self.units.insert(token, unit);
        self.stats.add_accepted();
        debug!("accepted client {peer} as {token:?}");
        self.with_task_log(token, |log| log.log_created());

        self.update_pair_interest(token);
    }

    fn handle_unit(&mut self, token: Token, readable: bool) {
        let Some(unit) = self.units.get(&token) else {
            // closed earlier in this round
            return;
        };
        let was_eof = unit.is_eof();
        let was_connecting = unit.is_connecting();

        let action = match unit.opposite() {
            Some(o) => match self.units.get_disjoint_mut([&token, &o]) {
                [Some(this), Some(opposite)] => {
                    if readable {
                        this.on_readable(Some(opposite))
                    } else {
                        this.on_writable(Some(opposite))
                    }
                }
                _ => UnitAction::Close(ServerTaskError::InternalServerError(
                    "opposite unit missing",
                )),
            },
            None => match self.units.get_mut(&token) {
                Some(this) if readable => this.on_readable(None),
                Some(this) => this.on_writable(None),
                None => return,
            },
        };

        if let Some(unit) = self.units.get(&token) {
            if was_connecting && !unit.is_connecting() {
                self.with_task_log(token, |log| log.log_connected());
            }
            if !was_eof && unit.is_eof() {
                match unit.role() {
                    Role::Client => self.with_task_log(token, |log| log.log_client_shutdown()),
                    Role::Upstream => {
                        self.with_task_log(token, |log| log.log_upstream_shutdown())
                    }
                }
            }
        }

        match action {
            UnitAction::Continue => self.update_pair_interest(token),
            UnitAction::Rejected => {
                self.stats.add_rejected();
                debug!("error response queued for {token:?}");
                self.update_pair_interest(token);
            }
            UnitAction::Connect(host) => match self.start_lookup(token, &host) {
                Ok(_) => self.update_pair_interest(token),
                Err(e) => self.teardown(token, e),
            },
            UnitAction::Close(e) => self.teardown(token, e),
        }
    }

    /// Hand the upstream host lookup of a client to the resolver threads.
    ///
    /// The client stays registered, and keeps buffering its request body,
    /// until the result comes back through the waker.
    fn start_lookup(&mut self, client: Token, host: &str) -> ServerTaskResult<()> {
        let port = self.config.upstream_port;
        let Some(client_unit) = self.units.get_mut(&client) else {
            return Err(ServerTaskError::InternalServerError("client unit missing"));
        };
        if let Some(notes) = client_unit.notes_mut() {
            notes.upstream = Some(format!("{host}:{port}"));
        }
        if !self.resolver.submit(client, host, port) {
            return Err(ServerTaskError::InternalServerError("resolver stopped"));
        }
        client_unit.set_resolving(true);
        debug!("resolving {host} for {client:?}");
        Ok(())
    }

    fn finish_lookups(&mut self) {
        while let Some(ResolveDone { token, result }) = self.resolver.try_recv() {
            let Some(unit) = self.units.get_mut(&token) else {
                // closed while resolving
                continue;
            };
            if unit.role() != Role::Client || unit.opposite().is_some() || !unit.is_resolving() {
                continue;
            }
            unit.set_resolving(false);

            match result.and_then(|addr| self.connect_upstream(token, addr)) {
                Ok(_) => self.update_pair_interest(token),
                Err(e) => self.teardown(token, e),
            }
        }
    }

    fn connect_upstream(&mut self, client: Token, addr: SocketAddr) -> ServerTaskResult<()> {
        let stream = TcpStream::connect(addr).map_err(ServerTaskError::UpstreamNotConnected)?;

        let token = self.next_token();
        let Some(client_unit) = self.units.get_mut(&client) else {
            return Err(ServerTaskError::InternalServerError("client unit missing"));
        };
        client_unit.set_opposite(token);
        debug!("connecting to {addr} for {client:?} as {token:?}");

        let unit = HalfConnection::new_upstream(stream, self.config.buffer_size, client);
        self.units.insert(token, unit);
        Ok(())
    }

    fn update_pair_interest(&mut self, token: Token) {
        let opposite = self.units.get(&token).and_then(|u| u.opposite());
        let mut ret = self.update_interest(token);
        if ret.is_ok() {
            if let Some(o) = opposite {
                ret = self.update_interest(o);
            }
        }
        if let Err(e) = ret {
            warn!("failed to update poll registration of {token:?}: {e}");
            self.teardown(
                token,
                ServerTaskError::InternalServerError("poll registration failed"),
            );
        }
    }

    fn update_interest(&mut self, token: Token) -> io::Result<()> {
        let Some(unit) = self.units.get(&token) else {
            return Ok(());
        };
        let opposite = unit.opposite().and_then(|t| self.units.get(&t));
        let interest = unit.interest(opposite);
        match self.units.get_mut(&token) {
            Some(unit) => unit.apply_interest(self.poll.registry(), token, interest),
            None => Ok(()),
        }
    }

    fn with_task_log<F>(&self, token: Token, f: F)
    where
        F: FnOnce(&TaskLogForRelay),
    {
        let Some(unit) = self.units.get(&token) else {
            return;
        };
        let opposite = unit.opposite().and_then(|t| self.units.get(&t));
        let (client, upstream) = match unit.role() {
            Role::Client => (Some(unit), opposite),
            Role::Upstream => (opposite, Some(unit)),
        };
        if let Some(log) = client.and_then(|c| task_log(&self.task_logger, c, upstream)) {
            f(&log);
        }
    }

    /// Remove both units of a pair, which closes their sockets.
    fn teardown(&mut self, token: Token, e: ServerTaskError) {
        let Some(mut unit) = self.units.remove(&token) else {
            return;
        };
        let mut opposite = unit.opposite().and_then(|t| self.units.remove(&t));

        let registry = self.poll.registry();
        let _ = unit.deregister(registry);
        if let Some(o) = opposite.as_mut() {
            let _ = o.deregister(registry);
        }

        debug!("closing {token:?}: {e}");
        if let Some(code) = e.status_code() {
            // only the client unit answers, and only if it sent nothing yet
            unit.send_error_response(code);
            if let Some(o) = opposite.as_mut() {
                o.send_error_response(code);
            }
        }
        let (client, upstream) = match unit.role() {
            Role::Client => (Some(&unit), opposite.as_ref()),
            Role::Upstream => (opposite.as_ref(), Some(&unit)),
        };
        if let Some(client) = client {
            if let Some(log) = task_log(&self.task_logger, client, upstream) {
                log.log(&e);
            }
            self.stats.add_finished();
        }
    }

    fn close_all(&mut self) {
        let clients: Vec<Token> = self
            .units
            .iter()
            .filter(|(_, u)| u.role() == Role::Client)
            .map(|(t, _)| *t)
            .collect();
        for token in clients {
            self.teardown(token, ServerTaskError::CanceledAsServerQuit);
        }
    }
}

fn task_log<'a>(
    logger: &'a Logger,
    client: &'a Unit,
    upstream: Option<&Unit>,
) -> Option<TaskLogForRelay<'a>> {
    let task_notes = client.notes()?;
    let client_stats = client.stats();
    let upstream_stats = upstream.map(|u| u.stats()).unwrap_or_default();
    Some(TaskLogForRelay {
        logger,
        task_notes,
        client_rd_bytes: client_stats.rd_bytes,
        client_wr_bytes: client_stats.wr_bytes,
        upstream_rd_bytes: upstream_stats.rd_bytes,
        upstream_wr_bytes: upstream_stats.wr_bytes,
    })
}
