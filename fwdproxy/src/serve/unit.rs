/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use std::io::{self, Read, Write};
use std::net::Shutdown;

use http::StatusCode;
use mio::event::Source;
use mio::{Interest, Registry, Token};

use fwd_http::{ErrorResponse, HeadPolicyError, HeadTerminator, HttpHead, find_head_end};

use super::{HalfConnectionStats, RelayBuffer, ServerTaskError, ServerTaskResult, TaskNotes};

const HEAD_REWRITE_RESERVE: usize = 1024;

/// The socket operations a unit needs.
pub(crate) trait RelayStream: Read + Write {
    fn shutdown_write(&self) -> io::Result<()>;

    /// Check a pending non-blocking connect, `Ok(false)` if still in progress.
    fn check_connected(&self) -> io::Result<bool>;
}

impl RelayStream for mio::net::TcpStream {
    fn shutdown_write(&self) -> io::Result<()> {
        self.shutdown(Shutdown::Write)
    }

    fn check_connected(&self) -> io::Result<bool> {
        if let Some(e) = self.take_error()? {
            return Err(e);
        }
        match self.peer_addr() {
            Ok(_) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotConnected => Ok(false),
            Err(e) => Err(e),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Role {
    Client,
    Upstream,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum HeadState {
    /// `scanned` bytes at the start of the buffer are known to hold no
    /// terminator end.
    Awaiting { scanned: usize },
    Parsed,
    /// An error response is queued in our own buffer.
    Rejected,
}

pub(crate) enum UnitAction {
    Continue,
    /// The request head is ready, connect to this host.
    Connect(String),
    /// An error response has been queued for the client.
    Rejected,
    Close(ServerTaskError),
}

/// One side of a proxied connection.
///
/// Data read from `stream` is kept in `buf` and written out through the
/// opposite unit. Rejected client units write from their own buffer.
pub(crate) struct HalfConnection<S> {
    role: Role,
    stream: S,
    buf: RelayBuffer,
    head: HeadState,
    eof: bool,
    output_shutdown: bool,
    connecting: bool,
    resolving: bool,
    opposite: Option<Token>,
    registered: Option<Interest>,
    error: Option<ServerTaskError>,
    notes: Option<TaskNotes>,
    stats: HalfConnectionStats,
}

impl<S: RelayStream> HalfConnection<S> {
    pub(crate) fn new_client(stream: S, buffer_size: usize, notes: TaskNotes) -> Self {
        HalfConnection::new(Role::Client, stream, buffer_size, Some(notes))
    }

    /// A unit for an upstream connection that is still in progress.
    pub(crate) fn new_upstream(stream: S, buffer_size: usize, client: Token) -> Self {
        let mut unit = HalfConnection::new(Role::Upstream, stream, buffer_size, None);
        unit.connecting = true;
        unit.opposite = Some(client);
        unit
    }

    fn new(role: Role, stream: S, buffer_size: usize, notes: Option<TaskNotes>) -> Self {
        HalfConnection {
            role,
            stream,
            buf: RelayBuffer::new(buffer_size),
            head: HeadState::Awaiting { scanned: 0 },
            eof: false,
            output_shutdown: false,
            connecting: false,
            resolving: false,
            opposite: None,
            registered: None,
            error: None,
            notes,
            stats: HalfConnectionStats::default(),
        }
    }

    #[inline]
    pub(crate) fn role(&self) -> Role {
        self.role
    }

    #[inline]
    pub(crate) fn opposite(&self) -> Option<Token> {
        self.opposite
    }

    pub(crate) fn set_opposite(&mut self, token: Token) {
        self.opposite = Some(token);
    }

    #[inline]
    pub(crate) fn is_eof(&self) -> bool {
        self.eof
    }

    #[inline]
    pub(crate) fn is_connecting(&self) -> bool {
        self.connecting
    }

    /// The upstream host name lookup of a client is in progress.
    #[inline]
    pub(crate) fn is_resolving(&self) -> bool {
        self.resolving
    }

    pub(crate) fn set_resolving(&mut self, resolving: bool) {
        self.resolving = resolving;
    }

    #[inline]
    fn is_head_parsed(&self) -> bool {
        self.head == HeadState::Parsed
    }

    pub(crate) fn notes(&self) -> Option<&TaskNotes> {
        self.notes.as_ref()
    }

    pub(crate) fn notes_mut(&mut self) -> Option<&mut TaskNotes> {
        self.notes.as_mut()
    }

    pub(crate) fn stats(&self) -> HalfConnectionStats {
        self.stats
    }

    /// The readiness this unit should be registered for.
    pub(crate) fn interest(&self, opposite: Option<&Self>) -> Option<Interest> {
        if self.connecting {
            return Some(Interest::WRITABLE);
        }

        let readable = !self.eof && !self.buf.is_full() && self.head != HeadState::Rejected;
        let writable = !self.output_shutdown
            && match self.head {
                HeadState::Rejected => !self.buf.is_empty(),
                _ => opposite.is_some_and(|o| o.is_head_parsed() && !o.buf.is_empty()),
            };
        match (readable, writable) {
            (true, true) => Some(Interest::READABLE | Interest::WRITABLE),
            (true, false) => Some(Interest::READABLE),
            (false, true) => Some(Interest::WRITABLE),
            (false, false) => None,
        }
    }

    pub(crate) fn on_readable(&mut self, opposite: Option<&mut Self>) -> UnitAction {
        if self.connecting || self.eof || self.head == HeadState::Rejected {
            return UnitAction::Continue;
        }

        let mut action = UnitAction::Continue;
        loop {
            if let Err(e) = self.fill_buf() {
                return UnitAction::Close(e);
            }
            let HeadState::Awaiting { scanned } = self.head else {
                break;
            };
            match self.role {
                Role::Client => match self.check_request_head(scanned) {
                    Ok(Some(host)) => action = UnitAction::Connect(host),
                    Ok(None) if self.eof => {
                        return UnitAction::Close(ServerTaskError::ClosedByClient);
                    }
                    Ok(None) => return UnitAction::Continue,
                    Err(e) => return self.reject_request(e),
                },
                Role::Upstream => match self.check_response_head(scanned) {
                    Ok(true) => {}
                    Ok(false) if self.eof => {
                        let e = ServerTaskError::InvalidUpstreamProtocol(
                            "closed before response head",
                        );
                        return self.reject_response(e, opposite);
                    }
                    Ok(false) => return UnitAction::Continue,
                    Err(e) => return self.reject_response(e, opposite),
                },
            }
            // the head is rewritten, go on reading the body
        }

        match action {
            UnitAction::Continue => self.check_eof(opposite),
            action => action,
        }
    }

    pub(crate) fn on_writable(&mut self, opposite: Option<&mut Self>) -> UnitAction {
        if self.connecting {
            match self.stream.check_connected() {
                Ok(true) => self.connecting = false,
                Ok(false) => return UnitAction::Continue,
                Err(e) => return UnitAction::Close(ServerTaskError::UpstreamNotConnected(e)),
            }
        }
        if self.output_shutdown {
            return UnitAction::Continue;
        }

        if self.head == HeadState::Rejected {
            if let Err(e) = write_from(&mut self.stream, &mut self.buf, &mut self.stats) {
                return UnitAction::Close(self.write_error(e));
            }
            if !self.buf.is_empty() {
                return UnitAction::Continue;
            }
            if let Err(e) = self.shutdown_output() {
                return UnitAction::Close(self.write_error(e));
            }
            let e = self.error.take().unwrap_or(ServerTaskError::Finished);
            return UnitAction::Close(e);
        }

        let Some(opposite) = opposite else {
            return UnitAction::Continue;
        };
        if !opposite.is_head_parsed() {
            return UnitAction::Continue;
        }
        if let Err(e) = write_from(&mut self.stream, &mut opposite.buf, &mut self.stats) {
            return UnitAction::Close(self.write_error(e));
        }
        if opposite.buf.is_empty() {
            opposite.check_eof(Some(self))
        } else {
            UnitAction::Continue
        }
    }

    /// Propagate our peer's EOF once everything it sent has been relayed.
    fn check_eof(&mut self, opposite: Option<&mut Self>) -> UnitAction {
        if !self.eof || !self.buf.is_empty() {
            return UnitAction::Continue;
        }
        let Some(opposite) = opposite else {
            return match self.role {
                Role::Client => UnitAction::Close(ServerTaskError::ClosedByClient),
                Role::Upstream => UnitAction::Close(ServerTaskError::ClosedByUpstream),
            };
        };

        if !opposite.output_shutdown {
            if let Err(e) = opposite.shutdown_output() {
                return UnitAction::Close(opposite.write_error(e));
            }
        }
        if self.output_shutdown {
            let e = self
                .error
                .take()
                .or_else(|| opposite.error.take())
                .unwrap_or(ServerTaskError::Finished);
            UnitAction::Close(e)
        } else {
            UnitAction::Continue
        }
    }

    /// Room kept free while waiting for a head, as the rewritten head may
    /// be larger than the received one.
    fn head_reserve(&self) -> usize {
        (self.buf.capacity() / 4).min(HEAD_REWRITE_RESERVE)
    }

    fn read_limit(&self) -> usize {
        match self.head {
            HeadState::Awaiting { .. } => self.buf.capacity() - self.head_reserve(),
            _ => self.buf.capacity(),
        }
    }

    /// Read until would block, EOF or the buffer is full.
    ///
    /// Reading stops early once a head terminator shows up, so that the head
    /// can be rewritten before any more body data comes in.
    fn fill_buf(&mut self) -> ServerTaskResult<()> {
        let limit = self.read_limit();
        while !self.eof {
            let len = self.buf.len();
            if len >= limit {
                break;
            }
            let unfilled = self.buf.unfilled_mut();
            let max = unfilled.len().min(limit - len);
            match self.stream.read(&mut unfilled[..max]) {
                Ok(0) => self.eof = true,
                Ok(n) => {
                    self.buf.commit(n);
                    self.stats.add_read(n);
                    if let HeadState::Awaiting { scanned } = &mut self.head {
                        let filled = self.buf.filled();
                        if find_head_end(filled, *scanned).is_some() {
                            break;
                        }
                        *scanned = filled.len();
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(self.read_error(e)),
            }
        }
        Ok(())
    }

    /// Find the head terminator in the newly read bytes.
    fn locate_head(
        &mut self,
        scanned: usize,
    ) -> Result<Option<HeadTerminator>, HeadPolicyError> {
        if let Some(t) = find_head_end(self.buf.filled(), scanned) {
            return Ok(Some(t));
        }
        let len = self.buf.len();
        let limit = self.read_limit();
        if len >= limit {
            return Err(HeadPolicyError::PayloadTooLarge(limit));
        }
        self.head = HeadState::Awaiting { scanned: len };
        Ok(None)
    }

    fn check_request_head(&mut self, scanned: usize) -> ServerTaskResult<Option<String>> {
        let Some(t) = self.locate_head(scanned)? else {
            return Ok(None);
        };

        let mut head = HttpHead::parse_request(&self.buf.filled()[..t.offset])
            .map_err(ServerTaskError::ClientParseFailed)?;
        let host = head.upstream_host().map(str::to_string);
        head.normalize()?;
        let host = host.ok_or(HeadPolicyError::MissedHost)?;

        self.buf.replace_head(t.body_start(), &head.serialize())?;
        self.head = HeadState::Parsed;
        Ok(Some(host))
    }

    fn check_response_head(&mut self, scanned: usize) -> ServerTaskResult<bool> {
        let t = match self.locate_head(scanned) {
            Ok(Some(t)) => t,
            Ok(None) => return Ok(false),
            Err(_) => {
                return Err(ServerTaskError::InvalidUpstreamProtocol(
                    "too large response head",
                ));
            }
        };

        let mut head = HttpHead::parse_response(&self.buf.filled()[..t.offset])
            .map_err(ServerTaskError::UpstreamProtocolError)?;
        head.normalize()
            .map_err(|_| ServerTaskError::InternalServerError("response normalize failed"))?;

        self.buf
            .replace_head(t.body_start(), &head.serialize())
            .map_err(|_| ServerTaskError::InvalidUpstreamProtocol("too large response head"))?;
        self.head = HeadState::Parsed;
        Ok(true)
    }

    /// Queue an error response to the client in place of its request.
    fn reject_request(&mut self, e: ServerTaskError) -> UnitAction {
        let code = e.status_code().unwrap_or(StatusCode::BAD_REQUEST);
        let rsp = ErrorResponse::from_status(code).to_head().serialize();
        if self.buf.set_content(&rsp).is_err() {
            return UnitAction::Close(e);
        }
        self.head = HeadState::Rejected;
        self.error = Some(e);
        UnitAction::Rejected
    }

    /// Queue an error response to the client in place of the upstream
    /// response, and stop relaying in both directions.
    fn reject_response(&mut self, e: ServerTaskError, client: Option<&mut Self>) -> UnitAction {
        let Some(client) = client else {
            return UnitAction::Close(e);
        };
        let code = e.status_code().unwrap_or(StatusCode::BAD_GATEWAY);
        let rsp = ErrorResponse::from_status(code).to_head().serialize();
        if self.buf.set_content(&rsp).is_err() {
            return UnitAction::Close(e);
        }
        self.head = HeadState::Parsed;
        self.eof = true;
        self.error = Some(e);
        if !self.output_shutdown {
            // the upstream may already be gone, nothing to do about it
            let _ = self.shutdown_output();
        }

        client.buf.clear();
        client.eof = true;
        UnitAction::Rejected
    }

    /// Send a canned error response to a client that is being closed.
    ///
    /// Only done if nothing has been written to the client yet, and only
    /// what a single non-blocking write accepts is sent.
    pub(crate) fn send_error_response(&mut self, code: StatusCode) {
        if self.role != Role::Client
            || self.output_shutdown
            || self.head == HeadState::Rejected
            || self.stats.wr_bytes > 0
        {
            return;
        }
        let rsp = ErrorResponse::from_status(code).to_head().serialize();
        if let Ok(n) = self.stream.write(&rsp) {
            self.stats.add_write(n);
        }
        let _ = self.shutdown_output();
    }

    fn shutdown_output(&mut self) -> io::Result<()> {
        self.output_shutdown = true;
        match self.stream.shutdown_write() {
            Ok(_) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotConnected => Ok(()),
            Err(e) => Err(e),
        }
    }

    fn read_error(&self, e: io::Error) -> ServerTaskError {
        match self.role {
            Role::Client => ServerTaskError::ClientTcpReadFailed(e),
            Role::Upstream => ServerTaskError::UpstreamReadFailed(e),
        }
    }

    fn write_error(&self, e: io::Error) -> ServerTaskError {
        match self.role {
            Role::Client => ServerTaskError::ClientTcpWriteFailed(e),
            Role::Upstream => ServerTaskError::UpstreamWriteFailed(e),
        }
    }
}

impl<S: RelayStream + Source> HalfConnection<S> {
    /// Bring the registration in line with `interest`.
    pub(crate) fn apply_interest(
        &mut self,
        registry: &Registry,
        token: Token,
        interest: Option<Interest>,
    ) -> io::Result<()> {
        match (self.registered, interest) {
            (None, Some(i)) => registry.register(&mut self.stream, token, i)?,
            (Some(old), Some(i)) if old != i => registry.reregister(&mut self.stream, token, i)?,
            (Some(_), None) => registry.deregister(&mut self.stream)?,
            _ => return Ok(()),
        }
        self.registered = interest;
        Ok(())
    }

    pub(crate) fn deregister(&mut self, registry: &Registry) -> io::Result<()> {
        if self.registered.take().is_some() {
            registry.deregister(&mut self.stream)?;
        }
        Ok(())
    }
}

fn write_from<W: Write>(
    stream: &mut W,
    buf: &mut RelayBuffer,
    stats: &mut HalfConnectionStats,
) -> io::Result<()> {
    while !buf.is_empty() {
        match stream.write(buf.filled()) {
            Ok(0) => return Err(io::Error::from(io::ErrorKind::WriteZero)),
            Ok(n) => {
                buf.consume(n);
                stats.add_write(n);
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(())
}
