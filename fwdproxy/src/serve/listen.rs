/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use std::io;
use std::net::SocketAddr;

use socket2::{Domain, SockAddr, Socket, Type};

const DEFAULT_BACKLOG: u32 = 1024;

pub(super) fn new_std_listener(
    addr: SocketAddr,
    backlog: u32,
) -> io::Result<std::net::TcpListener> {
    let socket = Socket::new(Domain::for_address(addr), Type::STREAM, None)?;
    socket.set_nonblocking(true)?;
    if addr.port() != 0 {
        #[cfg(unix)]
        socket.set_reuse_address(true)?; // allow bind to local address if wildcard address is already bound
    }
    let bind_addr: SockAddr = addr.into();
    socket.bind(&bind_addr)?;
    let backlog = if backlog == 0 { DEFAULT_BACKLOG } else { backlog };
    socket.listen(i32::try_from(backlog).unwrap_or(i32::MAX))?;
    Ok(std::net::TcpListener::from(socket))
}
