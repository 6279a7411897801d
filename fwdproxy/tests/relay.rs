/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use std::io::{self, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream};
use std::sync::{Mutex, mpsc};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use fwdproxy::config::ProxyConfig;
use fwdproxy::serve::{HostResolver, Reactor, ReactorHandle, ReactorSnapshot, SystemResolver};

const IO_TIMEOUT: Duration = Duration::from_secs(5);

struct TestProxy {
    addr: SocketAddr,
    handle: ReactorHandle,
    join: Option<JoinHandle<io::Result<()>>>,
}

impl TestProxy {
    fn start(upstream_port: u16) -> Self {
        TestProxy::start_with(upstream_port, SystemResolver)
    }

    fn start_with<R: HostResolver>(upstream_port: u16, resolver: R) -> Self {
        let config = ProxyConfig {
            listen: "127.0.0.1:0".parse().unwrap(),
            buffer_size: 64 * 1024,
            upstream_port,
            resolver_threads: 2,
            ..Default::default()
        };
        let mut reactor = Reactor::with_resolver(&config, resolver).unwrap();
        let addr = reactor.local_addr().unwrap();
        let handle = reactor.handle();
        let join = thread::spawn(move || reactor.run());
        TestProxy {
            addr,
            handle,
            join: Some(join),
        }
    }

    fn connect(&self) -> TcpStream {
        let stream = TcpStream::connect(self.addr).unwrap();
        stream.set_read_timeout(Some(IO_TIMEOUT)).unwrap();
        stream.set_write_timeout(Some(IO_TIMEOUT)).unwrap();
        stream
    }

    fn wait_stats<F>(&self, f: F) -> ReactorSnapshot
    where
        F: Fn(&ReactorSnapshot) -> bool,
    {
        let deadline = Instant::now() + IO_TIMEOUT;
        loop {
            let snapshot = self.handle.stats().snapshot();
            if f(&snapshot) || Instant::now() > deadline {
                return snapshot;
            }
            thread::sleep(Duration::from_millis(10));
        }
    }
}

impl Drop for TestProxy {
    fn drop(&mut self) {
        let _ = self.handle.shutdown();
        if let Some(join) = self.join.take() {
            let _ = join.join();
        }
    }
}

/// Accept one connection, hand it to `f`, and return what `f` returns.
fn spawn_origin<F, T>(f: F) -> (u16, JoinHandle<T>)
where
    F: FnOnce(TcpStream) -> T + Send + 'static,
    T: Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    let join = thread::spawn(move || {
        let (stream, _) = listener.accept().unwrap();
        stream.set_read_timeout(Some(IO_TIMEOUT)).unwrap();
        stream.set_write_timeout(Some(IO_TIMEOUT)).unwrap();
        f(stream)
    });
    (port, join)
}

fn read_head(stream: &mut TcpStream) -> Vec<u8> {
    let mut head = Vec::new();
    let mut byte = [0u8; 1];
    while !head.ends_with(b"\r\n\r\n") {
        match stream.read(&mut byte).unwrap() {
            0 => break,
            _ => head.push(byte[0]),
        }
    }
    head
}

fn read_all(stream: &mut TcpStream) -> Vec<u8> {
    let mut data = Vec::new();
    let _ = stream.read_to_end(&mut data);
    data
}

#[test]
fn forward_get() {
    let (port, origin) = spawn_origin(|mut stream| {
        let head = read_head(&mut stream);
        stream
            .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 5\r\nConnection: keep-alive\r\n\r\nhello")
            .unwrap();
        head
    });
    let proxy = TestProxy::start(port);

    let mut client = proxy.connect();
    client
        .write_all(b"GET http://127.0.0.1/x?y=1 HTTP/1.1\r\nHost: 127.0.0.1\r\nUser-Agent: t\r\n\r\n")
        .unwrap();
    let response = read_all(&mut client);
    assert_eq!(
        response,
        b"HTTP/1.0 200 OK\r\nContent-Length:5\r\nConnection:close\r\n\r\nhello"
    );

    let head = origin.join().unwrap();
    assert_eq!(
        head,
        b"GET /x?y=1 HTTP/1.0\r\nHost:127.0.0.1\r\nUser-Agent:t\r\nConnection:close\r\n\r\n"
    );

    drop(client);
    let stats = proxy.wait_stats(|s| s.finished == 1);
    assert_eq!(stats.accepted, 1);
    assert_eq!(stats.finished, 1);
    assert_eq!(stats.alive, 0);
}

#[test]
fn forward_post_body() {
    let (port, origin) = spawn_origin(|mut stream| {
        let head = read_head(&mut stream);
        let mut body = [0u8; 7];
        stream.read_exact(&mut body).unwrap();
        stream
            .write_all(b"HTTP/1.0 204 No Content\r\n\r\n")
            .unwrap();
        (head, body)
    });
    let proxy = TestProxy::start(port);

    let mut client = proxy.connect();
    client
        .write_all(b"POST /form HTTP/1.1\r\nHost: 127.0.0.1\r\nContent-Length: 7\r\n\r\na=1&b=2")
        .unwrap();
    let response = read_all(&mut client);
    assert_eq!(response, b"HTTP/1.0 204 No Content\r\nConnection:close\r\n\r\n");

    let (head, body) = origin.join().unwrap();
    assert_eq!(
        head,
        b"POST /form HTTP/1.0\r\nHost:127.0.0.1\r\nContent-Length:7\r\nConnection:close\r\n\r\n"
    );
    assert_eq!(&body, b"a=1&b=2");
}

#[test]
fn client_half_close() {
    let (port, origin) = spawn_origin(|mut stream| {
        // the client side shutdown must be seen as eof here
        let data = read_all(&mut stream);
        stream.write_all(b"HTTP/1.0 200 OK\r\n\r\ndone").unwrap();
        data
    });
    let proxy = TestProxy::start(port);

    let mut client = proxy.connect();
    client
        .write_all(b"GET http://127.0.0.1/ HTTP/1.0\r\n\r\n")
        .unwrap();
    client.shutdown(Shutdown::Write).unwrap();
    let response = read_all(&mut client);
    assert_eq!(response, b"HTTP/1.0 200 OK\r\nConnection:close\r\n\r\ndone");

    let data = origin.join().unwrap();
    assert_eq!(
        data,
        b"GET / HTTP/1.0\r\nHost:127.0.0.1\r\nConnection:close\r\n\r\n"
    );
}

#[test]
fn split_request_head() {
    let (port, origin) = spawn_origin(|mut stream| {
        let head = read_head(&mut stream);
        stream.write_all(b"HTTP/1.0 200 OK\r\n\r\n").unwrap();
        head
    });
    let proxy = TestProxy::start(port);

    let mut client = proxy.connect();
    for part in [
        &b"GET /a HTTP/1.1\r\nHo"[..],
        b"st: 127.0.0.1\r\n\r",
        b"\n",
    ] {
        client.write_all(part).unwrap();
        client.flush().unwrap();
        thread::sleep(Duration::from_millis(20));
    }
    let response = read_all(&mut client);
    assert_eq!(response, b"HTTP/1.0 200 OK\r\nConnection:close\r\n\r\n");

    let head = origin.join().unwrap();
    assert_eq!(
        head,
        b"GET /a HTTP/1.0\r\nHost:127.0.0.1\r\nConnection:close\r\n\r\n"
    );
}

#[test]
fn unsupported_method() {
    let proxy = TestProxy::start(80);

    let mut client = proxy.connect();
    client
        .write_all(b"PUT http://127.0.0.1/ HTTP/1.1\r\n\r\n")
        .unwrap();
    let response = read_all(&mut client);
    assert_eq!(
        response,
        b"HTTP/1.0 501 Not Implemented\r\nConnection:close\r\n\r\n"
    );

    let stats = proxy.wait_stats(|s| s.finished == 1);
    assert_eq!(stats.rejected, 1);
    assert_eq!(stats.alive, 0);
}

#[test]
fn non_default_port() {
    let proxy = TestProxy::start(80);

    let mut client = proxy.connect();
    client
        .write_all(b"GET http://127.0.0.1:8080/ HTTP/1.1\r\n\r\n")
        .unwrap();
    let response = read_all(&mut client);
    assert_eq!(response, b"HTTP/1.0 400 Bad Request\r\nConnection:close\r\n\r\n");
}

#[test]
fn malformed_request() {
    let proxy = TestProxy::start(80);

    let mut client = proxy.connect();
    client
        .write_all(b"GET / HTTP/1.1\r\nHost: 127.0.0.1\r\nno colon here\r\n\r\n")
        .unwrap();
    let response = read_all(&mut client);
    assert_eq!(response, b"HTTP/1.0 400 Bad Request\r\nConnection:close\r\n\r\n");
}

#[test]
fn upstream_garbage() {
    let (port, origin) = spawn_origin(|mut stream| {
        let _ = read_head(&mut stream);
        stream.write_all(b"garbage\r\n\r\nmore").unwrap();
        // wait for the proxy to give up on us
        read_all(&mut stream)
    });
    let proxy = TestProxy::start(port);

    let mut client = proxy.connect();
    client
        .write_all(b"GET http://127.0.0.1/ HTTP/1.1\r\n\r\n")
        .unwrap();
    let response = read_all(&mut client);
    assert_eq!(response, b"HTTP/1.0 502 Bad Gateway\r\nConnection:close\r\n\r\n");

    let rest = origin.join().unwrap();
    assert!(rest.is_empty());
}

#[test]
fn upstream_refused() {
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let proxy = TestProxy::start(port);

    let mut client = proxy.connect();
    client
        .write_all(b"GET http://127.0.0.1/ HTTP/1.1\r\n\r\n")
        .unwrap();
    let response = read_all(&mut client);
    assert!(response.is_empty());

    let stats = proxy.wait_stats(|s| s.finished == 1);
    assert_eq!(stats.finished, 1);
    assert_eq!(stats.rejected, 0);
}

#[test]
fn concurrent_pairs() {
    const PAIRS: usize = 4;

    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    let origin = thread::spawn(move || {
        let mut streams = Vec::new();
        for _ in 0..PAIRS {
            let (mut stream, _) = listener.accept().unwrap();
            stream.set_read_timeout(Some(IO_TIMEOUT)).unwrap();
            let head = read_head(&mut stream);
            let path = head
                .split(|b| *b == b' ')
                .nth(1)
                .map(|p| p.to_vec())
                .unwrap_or_default();
            let mut response = b"HTTP/1.0 200 OK\r\n\r\n".to_vec();
            response.extend_from_slice(&path);
            stream.write_all(&response).unwrap();
            streams.push(stream);
        }
    });
    let proxy = TestProxy::start(port);

    let mut clients: Vec<TcpStream> = (0..PAIRS).map(|_| proxy.connect()).collect();
    for (i, client) in clients.iter_mut().enumerate() {
        let request = format!("GET /p{i} HTTP/1.0\r\nHost: 127.0.0.1\r\n\r\n");
        client.write_all(request.as_bytes()).unwrap();
    }
    origin.join().unwrap();
    for (i, client) in clients.iter_mut().enumerate() {
        let response = read_all(client);
        let expected = format!("HTTP/1.0 200 OK\r\nConnection:close\r\n\r\n/p{i}");
        assert_eq!(response, expected.as_bytes());
    }
}

/// Holds lookups of `slow.test` until the gate is opened, then fails them.
/// Every other name is loopback.
struct GatedResolver {
    gate: Mutex<mpsc::Receiver<()>>,
}

impl HostResolver for GatedResolver {
    fn resolve(&self, host: &str, port: u16) -> io::Result<Vec<SocketAddr>> {
        if host == "slow.test" {
            let _ = self.gate.lock().unwrap().recv_timeout(IO_TIMEOUT);
            return Err(io::Error::from(io::ErrorKind::NotFound));
        }
        Ok(vec![SocketAddr::from(([127, 0, 0, 1], port))])
    }
}

#[test]
fn relay_during_slow_lookup() {
    let (port, origin) = spawn_origin(|mut stream| {
        let head = read_head(&mut stream);
        stream.write_all(b"HTTP/1.0 200 OK\r\n\r\nfast").unwrap();
        head
    });
    let (open_gate, gate) = mpsc::channel();
    let proxy = TestProxy::start_with(
        port,
        GatedResolver {
            gate: Mutex::new(gate),
        },
    );

    let mut slow = proxy.connect();
    slow.write_all(b"GET http://slow.test/ HTTP/1.0\r\n\r\n")
        .unwrap();
    let stats = proxy.wait_stats(|s| s.accepted == 1);
    assert_eq!(stats.accepted, 1);

    let mut fast = proxy.connect();
    fast.write_all(b"GET http://fast.test/f HTTP/1.0\r\n\r\n")
        .unwrap();
    let response = read_all(&mut fast);
    assert_eq!(response, b"HTTP/1.0 200 OK\r\nConnection:close\r\n\r\nfast");
    let head = origin.join().unwrap();
    assert_eq!(
        head,
        b"GET /f HTTP/1.0\r\nHost:fast.test\r\nConnection:close\r\n\r\n"
    );

    // the slow pair is still waiting for its lookup
    drop(fast);
    let stats = proxy.wait_stats(|s| s.finished == 1);
    assert_eq!(stats.finished, 1);
    assert_eq!(stats.alive, 1);

    open_gate.send(()).unwrap();
    let response = read_all(&mut slow);
    assert!(response.is_empty());
    let stats = proxy.wait_stats(|s| s.finished == 2);
    assert_eq!(stats.alive, 0);
}
