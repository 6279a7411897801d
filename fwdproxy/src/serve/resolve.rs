/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use std::io;
use std::net::{SocketAddr, ToSocketAddrs};
use std::sync::Arc;
use std::thread;

use flume::{Receiver, Sender};
use log::debug;
use mio::{Token, Waker};

use super::ServerTaskError;

/// Blocking host name lookup, run on the resolver threads.
pub trait HostResolver: Send + Sync + 'static {
    fn resolve(&self, host: &str, port: u16) -> io::Result<Vec<SocketAddr>>;
}

/// Lookup through the platform resolver.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemResolver;

impl HostResolver for SystemResolver {
    fn resolve(&self, host: &str, port: u16) -> io::Result<Vec<SocketAddr>> {
        Ok((host, port).to_socket_addrs()?.collect())
    }
}

struct ResolveJob {
    token: Token,
    host: String,
    port: u16,
}

pub(super) struct ResolveDone {
    pub(super) token: Token,
    pub(super) result: Result<SocketAddr, ServerTaskError>,
}

/// Resolver threads feeding results back to the reactor.
///
/// Each finished lookup wakes the reactor through its waker.
pub(super) struct ResolverPool {
    job_sender: Sender<ResolveJob>,
    done_receiver: Receiver<ResolveDone>,
}

impl ResolverPool {
    pub(super) fn spawn(
        threads: usize,
        resolver: Arc<dyn HostResolver>,
        waker: Arc<Waker>,
    ) -> io::Result<Self> {
        let (job_sender, job_receiver) = flume::unbounded::<ResolveJob>();
        let (done_sender, done_receiver) = flume::unbounded::<ResolveDone>();

        for i in 0..threads.max(1) {
            let job_receiver = job_receiver.clone();
            let done_sender = done_sender.clone();
            let resolver = Arc::clone(&resolver);
            let waker = Arc::clone(&waker);
            // detached, it quits once the reactor side is dropped
            let _detached_thread = thread::Builder::new()
                .name(format!("resolver#{i}"))
                .spawn(move || {
                    while let Ok(job) = job_receiver.recv() {
                        let result = resolve_first(resolver.as_ref(), &job.host, job.port);
                        let done = ResolveDone {
                            token: job.token,
                            result,
                        };
                        if done_sender.send(done).is_err() {
                            break;
                        }
                        let _ = waker.wake();
                    }
                })?;
        }

        Ok(ResolverPool {
            job_sender,
            done_receiver,
        })
    }

    pub(super) fn submit(&self, token: Token, host: &str, port: u16) -> bool {
        let job = ResolveJob {
            token,
            host: host.to_string(),
            port,
        };
        self.job_sender.send(job).is_ok()
    }

    pub(super) fn try_recv(&self) -> Option<ResolveDone> {
        self.done_receiver.try_recv().ok()
    }
}

fn resolve_first(
    resolver: &dyn HostResolver,
    host: &str,
    port: u16,
) -> Result<SocketAddr, ServerTaskError> {
    match resolver.resolve(host, port) {
        Ok(addrs) => match addrs.into_iter().next() {
            Some(addr) => {
                debug!("resolved {host} to {addr}");
                Ok(addr)
            }
            None => Err(ServerTaskError::UpstreamNotResolved(format!(
                "{host}: no address found"
            ))),
        },
        Err(e) => Err(ServerTaskError::UpstreamNotResolved(format!("{host}: {e}"))),
    }
}
