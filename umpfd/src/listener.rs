//! The event loop: a dual TCP/Unix-domain listener multiplexed with `mio`,
//! plus signal handling via `signal-hook-mio`.
//!
//! Grounded on the original daemon's listener setup: the Unix-domain socket
//! path is unlinked before binding (a stale socket file from a previous,
//! uncleanly-terminated run must not block the new bind) and left
//! world-writable afterwards; the TCP listener clears `IPV6_V6ONLY` so a
//! single `[::]`-bound socket also accepts v4-mapped connections.
//! `SIGINT`/`SIGTERM` both unwind the loop; `SIGHUP`/`SIGPIPE` are logged
//! and otherwise ignored, matching the original's signal callbacks.

use std::collections::HashMap;
use std::io::{self, ErrorKind, Read, Write};
use std::net::SocketAddr;
use std::os::fd::AsRawFd;
use std::path::Path;

use mio::net::{TcpListener, UnixListener};
use mio::{Events, Interest, Poll, Token};
use signal_hook::consts::signal::{SIGHUP, SIGINT, SIGPIPE, SIGTERM};
use signal_hook_mio::v0_8::Signals;

use umpf_store::Store;

use crate::conn::Conn;

const TCP_LISTENER: Token = Token(0);
const UNIX_LISTENER: Token = Token(1);
const SIGNALS: Token = Token(2);
const FIRST_CONN: usize = 3;

enum Socket {
    Tcp(mio::net::TcpStream),
    Unix(mio::net::UnixStream),
}

impl Socket {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Socket::Tcp(s) => s.read(buf),
            Socket::Unix(s) => s.read(buf),
        }
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Socket::Tcp(s) => s.write(buf),
            Socket::Unix(s) => s.write(buf),
        }
    }
}

struct Connection {
    socket: Socket,
    conn: Conn,
}

/// Clears `IPV6_V6ONLY` on a freshly bound dual-stack TCP listener so
/// IPv4-mapped peers can connect to the same `[::]` socket.
fn clear_v6only(listener: &TcpListener) -> io::Result<()> {
    let fd = listener.as_raw_fd();
    let off: libc::c_int = 0;
    let ret = unsafe {
        libc::setsockopt(
            fd,
            libc::IPPROTO_IPV6,
            libc::IPV6_V6ONLY,
            &off as *const libc::c_int as *const libc::c_void,
            std::mem::size_of::<libc::c_int>() as libc::socklen_t,
        )
    };
    if ret != 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

pub struct Listeners {
    poll: Poll,
    tcp: Option<TcpListener>,
    unix: Option<(UnixListener, std::path::PathBuf)>,
    signals: Signals,
    conns: HashMap<Token, Connection>,
    next_token: usize,
}

impl Listeners {
    pub fn bind(tcp_addr: Option<SocketAddr>, unix_path: Option<&Path>) -> io::Result<Self> {
        let poll = Poll::new()?;

        let tcp = match tcp_addr {
            Some(addr) => {
                let mut listener = TcpListener::bind(addr)?;
                clear_v6only(&listener)?;
                poll.registry()
                    .register(&mut listener, TCP_LISTENER, Interest::READABLE)?;
                Some(listener)
            }
            None => None,
        };

        let unix = match unix_path {
            Some(path) => {
                if path.exists() {
                    std::fs::remove_file(path)?;
                }
                let mut listener = UnixListener::bind(path)?;
                poll.registry()
                    .register(&mut listener, UNIX_LISTENER, Interest::READABLE)?;
                #[cfg(unix)]
                {
                    use std::os::unix::fs::PermissionsExt;
                    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o777))?;
                }
                Some((listener, path.to_owned()))
            }
            None => None,
        };

        let mut signals = Signals::new([SIGINT, SIGTERM, SIGHUP, SIGPIPE])?;
        poll.registry()
            .register(&mut signals, SIGNALS, Interest::READABLE)?;

        Ok(Self {
            poll,
            tcp,
            unix,
            signals,
            conns: HashMap::new(),
            next_token: FIRST_CONN,
        })
    }

    /// Runs the event loop until `SIGINT`/`SIGTERM` is observed.
    pub fn run(&mut self, store: &mut Store) -> io::Result<()> {
        let mut events = Events::with_capacity(128);
        'outer: loop {
            self.poll.poll(&mut events, None)?;
            for event in events.iter() {
                match event.token() {
                    TCP_LISTENER => self.accept_tcp()?,
                    UNIX_LISTENER => self.accept_unix()?,
                    SIGNALS => {
                        for sig in self.signals.pending() {
                            match sig {
                                SIGINT | SIGTERM => {
                                    tracing::info!(signal = sig, "shutting down");
                                    break 'outer;
                                }
                                SIGHUP => tracing::info!("SIGHUP received, ignoring"),
                                SIGPIPE => tracing::warn!("SIGPIPE received, ignoring"),
                                _ => {}
                            }
                        }
                    }
                    token => self.handle_conn(token, event, store),
                }
            }
        }
        Ok(())
    }

    fn accept_tcp(&mut self) -> io::Result<()> {
        let Some(listener) = &self.tcp else {
            return Ok(());
        };
        loop {
            match listener.accept() {
                Ok((mut stream, peer)) => {
                    tracing::debug!(%peer, "accepted tcp connection");
                    let token = Token(self.next_token);
                    self.next_token += 1;
                    self.poll
                        .registry()
                        .register(&mut stream, token, Interest::READABLE)?;
                    self.conns.insert(
                        token,
                        Connection {
                            socket: Socket::Tcp(stream),
                            conn: Conn::new(),
                        },
                    );
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock => break,
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    fn accept_unix(&mut self) -> io::Result<()> {
        let Some((listener, _)) = &self.unix else {
            return Ok(());
        };
        loop {
            match listener.accept() {
                Ok((mut stream, _)) => {
                    tracing::debug!("accepted unix-domain connection");
                    let token = Token(self.next_token);
                    self.next_token += 1;
                    self.poll
                        .registry()
                        .register(&mut stream, token, Interest::READABLE)?;
                    self.conns.insert(
                        token,
                        Connection {
                            socket: Socket::Unix(stream),
                            conn: Conn::new(),
                        },
                    );
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock => break,
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    fn handle_conn(&mut self, token: Token, event: &mio::event::Event, store: &mut Store) {
        let mut close = false;
        if let Some(entry) = self.conns.get_mut(&token) {
            if event.is_readable() {
                let mut buf = [0u8; 4096];
                match entry.socket.read(&mut buf) {
                    Ok(0) => close = true,
                    Ok(n) => match entry.conn.feed(&buf[..n], store) {
                        Ok(true) => {
                            let _ = self.poll.registry().reregister(
                                match &mut entry.socket {
                                    Socket::Tcp(s) => s as &mut dyn mio::event::Source,
                                    Socket::Unix(s) => s as &mut dyn mio::event::Source,
                                },
                                token,
                                Interest::WRITABLE,
                            );
                        }
                        Ok(false) => {}
                        Err(e) => {
                            tracing::warn!(error = %e, "dropping connection: bad request");
                            close = true;
                        }
                    },
                    Err(e) if e.kind() == ErrorKind::WouldBlock => {}
                    Err(e) => {
                        tracing::warn!(error = %e, "dropping connection: read error");
                        close = true;
                    }
                }
            }
            if !close && event.is_writable() && entry.conn.has_pending_write() {
                match entry.socket.write(entry.conn.pending_bytes()) {
                    Ok(n) => {
                        entry.conn.advance_write(n);
                        if !entry.conn.has_pending_write() {
                            let _ = self.poll.registry().reregister(
                                match &mut entry.socket {
                                    Socket::Tcp(s) => s as &mut dyn mio::event::Source,
                                    Socket::Unix(s) => s as &mut dyn mio::event::Source,
                                },
                                token,
                                Interest::READABLE,
                            );
                        }
                    }
                    Err(e) if e.kind() == ErrorKind::WouldBlock => {}
                    Err(e) => {
                        tracing::warn!(error = %e, "dropping connection: write error");
                        close = true;
                    }
                }
            }
        }
        if close {
            if let Some(mut entry) = self.conns.remove(&token) {
                let _ = match &mut entry.socket {
                    Socket::Tcp(s) => self.poll.registry().deregister(s),
                    Socket::Unix(s) => self.poll.registry().deregister(s),
                };
            }
        }
    }
}

impl Drop for Listeners {
    fn drop(&mut self) {
        if let Some((_, path)) = &self.unix {
            let _ = std::fs::remove_file(path);
        }
    }
}
