use std::net::{Ipv6Addr, SocketAddr, SocketAddrV6};
use std::path::PathBuf;

use clap::Parser;
use umpf_store::{Store, StoreConfig};
use umpfd::config::{Cli, Config};
use umpfd::listener::Listeners;

const DEFAULT_PORT: u16 = 8012;
const DEFAULT_SOCK: &str = "/var/run/umpfd.sock";

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let mut config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };
    config.apply_overrides(&cli);

    if config.daemonise {
        daemonize()?;
    }

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let mut store = open_store(&config)?;

    let tcp_addr = Some(SocketAddr::V6(SocketAddrV6::new(
        Ipv6Addr::UNSPECIFIED,
        config.port.unwrap_or(DEFAULT_PORT),
        0,
        0,
    )));
    let sock_path = PathBuf::from(config.sock.clone().unwrap_or_else(|| DEFAULT_SOCK.to_owned()));

    let mut listeners = Listeners::bind(tcp_addr, Some(&sock_path))?;
    tracing::info!(port = config.port.unwrap_or(DEFAULT_PORT), sock = %sock_path.display(), "umpfd listening");

    if let Some(pidfile) = &config.pidfile {
        std::fs::write(pidfile, format!("{}\n", std::process::id()))?;
    }

    listeners.run(&mut store)?;
    Ok(())
}

/// Forks into the background, detaches from the controlling terminal and
/// redirects stdio to `/dev/null`, the same sequence the original daemon's
/// `daemonise()` runs: fork-and-exit-the-parent, `setsid`, then swap stdin/
/// stdout/stderr for `/dev/null` so nothing the daemon does can block on a
/// terminal that's gone away.
fn daemonize() -> anyhow::Result<()> {
    use std::os::fd::FromRawFd;

    // SAFETY: `fork` is safe to call here because nothing in the parent
    // has spawned additional threads yet; the child immediately calls
    // only async-signal-safe libc functions before doing anything else.
    let pid = unsafe { libc::fork() };
    if pid < 0 {
        anyhow::bail!("fork failed: {}", std::io::Error::last_os_error());
    }
    if pid > 0 {
        std::process::exit(0);
    }

    if unsafe { libc::setsid() } < 0 {
        anyhow::bail!("setsid failed: {}", std::io::Error::last_os_error());
    }

    let devnull_path = std::ffi::CString::new("/dev/null").unwrap();
    let devnull = unsafe { libc::open(devnull_path.as_ptr(), libc::O_RDWR) };
    if devnull >= 0 {
        unsafe {
            libc::dup2(devnull, libc::STDIN_FILENO);
            libc::dup2(devnull, libc::STDOUT_FILENO);
            libc::dup2(devnull, libc::STDERR_FILENO);
            if devnull > libc::STDERR_FILENO {
                drop(std::fs::File::from_raw_fd(devnull));
            }
        }
    }
    Ok(())
}

fn open_store(config: &Config) -> anyhow::Result<Store> {
    let db = &config.db;
    let store_config = StoreConfig::default();
    let store = if let Some(host) = &db.host {
        Store::open(
            Some(host.as_str()),
            db.user.as_deref(),
            db.pass.as_deref(),
            db.schema.as_deref().unwrap_or("umpf"),
            store_config,
        )?
    } else {
        let file = db.file.as_deref().unwrap_or("umpf.sqlite3");
        Store::open(None, None, None, file, store_config)?
    };
    Ok(store)
}
