//! Host links: a Unix-domain or TCP stream per controller link.

use crate::config::{LinkConfig, LinkRole, Transport};
use crate::error::ControllerError;
use scewl_protocol::{Channel, ReadMode, StreamLink, TransportError};
use std::io;
use std::net::{TcpListener, TcpStream};
use std::os::unix::fs::FileTypeExt;
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::Path;

/// A link that can be either a Unix-domain stream or TCP.
#[derive(Debug)]
pub enum HostLink {
    Unix(StreamLink<UnixStream>),
    Tcp(StreamLink<TcpStream>),
}

impl HostLink {
    /// Opens a link as configured, connecting or waiting for the peer.
    pub fn open(name: &'static str, config: &LinkConfig) -> Result<Self, ControllerError> {
        let link = Self::establish(name, config).map_err(|source| ControllerError::Link {
            name,
            endpoint: config.to_string(),
            source,
        })?;
        tracing::info!("  {} link: {}", name, config);
        Ok(link)
    }

    fn establish(name: &str, config: &LinkConfig) -> io::Result<Self> {
        let link = match (config.transport, config.role) {
            (Transport::Unix, LinkRole::Connect) => {
                HostLink::Unix(StreamLink::new(UnixStream::connect(&config.address)?))
            }
            (Transport::Unix, LinkRole::Listen) => {
                let path = Path::new(&config.address);
                prepare_socket_path(path)?;
                let listener = UnixListener::bind(path)?;
                tracing::info!("Waiting for {} peer on {}", name, path.display());
                let (stream, _) = listener.accept()?;
                HostLink::Unix(StreamLink::new(stream))
            }
            (Transport::Tcp, LinkRole::Connect) => {
                let stream = TcpStream::connect(&config.address)?;
                stream.set_nodelay(true)?;
                HostLink::Tcp(StreamLink::new(stream))
            }
            (Transport::Tcp, LinkRole::Listen) => {
                let listener = TcpListener::bind(&config.address)?;
                tracing::info!("Waiting for {} peer on {}", name, listener.local_addr()?);
                let (stream, peer) = listener.accept()?;
                tracing::debug!("{} peer connected from {}", name, peer);
                stream.set_nodelay(true)?;
                HostLink::Tcp(StreamLink::new(stream))
            }
        };
        link.with_read_timeout(config)
    }

    fn with_read_timeout(self, config: &LinkConfig) -> io::Result<Self> {
        let timeout = config.read_timeout();
        Ok(match self {
            HostLink::Unix(link) => HostLink::Unix(link.with_read_timeout(timeout)?),
            HostLink::Tcp(link) => HostLink::Tcp(link.with_read_timeout(timeout)?),
        })
    }

    /// Returns true once the peer closed its side.
    pub fn is_closed(&self) -> bool {
        match self {
            HostLink::Unix(link) => link.is_closed(),
            HostLink::Tcp(link) => link.is_closed(),
        }
    }
}

impl From<UnixStream> for HostLink {
    fn from(stream: UnixStream) -> Self {
        HostLink::Unix(StreamLink::new(stream))
    }
}

impl From<TcpStream> for HostLink {
    fn from(stream: TcpStream) -> Self {
        HostLink::Tcp(StreamLink::new(stream))
    }
}

impl Channel for HostLink {
    fn read_byte(&mut self, mode: ReadMode) -> Option<u8> {
        match self {
            HostLink::Unix(link) => link.read_byte(mode),
            HostLink::Tcp(link) => link.read_byte(mode),
        }
    }

    fn write(&mut self, bytes: &[u8]) -> Result<usize, TransportError> {
        match self {
            HostLink::Unix(link) => link.write(bytes),
            HostLink::Tcp(link) => link.write(bytes),
        }
    }
}

/// Creates the socket's directory and removes a stale socket left by a
/// previous run. Anything other than a socket at the path is left alone.
fn prepare_socket_path(path: &Path) -> io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    match std::fs::symlink_metadata(path) {
        Ok(meta) if meta.file_type().is_socket() => std::fs::remove_file(path),
        Ok(_) => Err(io::Error::new(
            io::ErrorKind::AlreadyExists,
            format!("{} exists and is not a socket", path.display()),
        )),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}
