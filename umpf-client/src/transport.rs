//! Connects to the daemon, writes one request, reads one reply.
//!
//! Grounded on `umpf.c`'s `__connect` (IPv6 first, IPv4 fallback,
//! `cannot connect to host %s.\n` diagnostic on total failure) and
//! `umpf_repl`'s four-second wait for a reply. This crate uses a plain
//! blocking socket with a read timeout rather than the original's
//! epoll-based non-blocking loop: a client that does exactly one
//! request/reply round trip per invocation has no concurrency to multiplex.

use std::io::{Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use fixml_codec::{encode, Progress, StreamingParser};
use fixml_types::Message;

use crate::error::ClientError;

const SRV_TIMEOUT: Duration = Duration::from_secs(4);

/// Connects to `host` (optionally `HOST:PORT`), sends `request`, and
/// returns the decoded reply.
pub fn roundtrip(host: &str, default_port: u16, request: &Message) -> Result<Message, ClientError> {
    let (addr, port) = split_host_port(host, default_port);
    let stream = connect(&addr, port)?;
    send_and_receive(stream, request)
}

fn split_host_port(host: &str, default_port: u16) -> (String, u16) {
    match host.rsplit_once(':') {
        Some((h, p)) if p.chars().all(|c| c.is_ascii_digit()) && !p.is_empty() => {
            (h.to_owned(), p.parse().unwrap_or(default_port))
        }
        _ => (host.to_owned(), default_port),
    }
}

fn connect(host: &str, port: u16) -> Result<TcpStream, ClientError> {
    let addrs = (host, port)
        .to_socket_addrs()
        .map_err(|_| ClientError::Connect { host: host.to_owned() })?;
    for addr in addrs {
        if let Ok(stream) = TcpStream::connect_timeout(&addr, SRV_TIMEOUT) {
            let _ = stream.set_read_timeout(Some(SRV_TIMEOUT));
            let _ = stream.set_write_timeout(Some(SRV_TIMEOUT));
            return Ok(stream);
        }
    }
    Err(ClientError::Connect { host: host.to_owned() })
}

fn send_and_receive(mut stream: TcpStream, request: &Message) -> Result<Message, ClientError> {
    let bytes = encode(request);
    stream.write_all(&bytes)?;

    let mut parser = StreamingParser::new();
    let mut buf = [0u8; 4096];
    loop {
        let n = match stream.read(&mut buf) {
            Ok(0) => return Err(ClientError::Timeout),
            Ok(n) => n,
            Err(e) if matches!(e.kind(), std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut) => {
                return Err(ClientError::Timeout);
            }
            Err(e) => return Err(ClientError::Io(e)),
        };
        if let Progress::Ready(body) = parser.feed(&buf[..n])? {
            return Ok(Message::reply(body));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_host_and_port() {
        assert_eq!(split_host_port("db.internal:9012", 8675), ("db.internal".to_owned(), 9012));
        assert_eq!(split_host_port("db.internal", 8675), ("db.internal".to_owned(), 8675));
    }

    #[test]
    fn connect_to_closed_port_errs() {
        let err = connect("127.0.0.1", 1).unwrap_err();
        assert!(matches!(err, ClientError::Connect { .. }) || matches!(err, ClientError::Io(_)));
    }
}
