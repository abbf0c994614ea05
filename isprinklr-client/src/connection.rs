//! Connection management.

use crate::error::ClientError;
use isprinklr_protocol::{ChecksumEcho, DEFAULT_BAUD_RATE};
use serialport::SerialPort;
use std::io::{self, Read, Write};
use std::net::TcpStream;
use std::time::Duration;

/// Default response timeout (1s).
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(1);

/// Where the bridge is reachable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// Local serial device.
    Serial { path: String, baud_rate: u32 },
    /// Raw TCP bridge to a serial device (e.g. ser2net).
    Tcp(String),
}

impl std::fmt::Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Target::Serial { path, baud_rate } => write!(f, "{}@{}", path, baud_rate),
            Target::Tcp(addr) => write!(f, "tcp://{}", addr),
        }
    }
}

/// Connection configuration.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    pub target: Target,
    /// Read timeout for each response.
    pub timeout: Duration,
    /// How the bridge echoes request checksums.
    pub echo: ChecksumEcho,
    /// Sends per request before giving up.
    pub attempts: u32,
}

impl ConnectionConfig {
    pub fn new(target: Target) -> Self {
        Self {
            target,
            timeout: DEFAULT_TIMEOUT,
            echo: ChecksumEcho::default(),
            attempts: crate::controller::DEFAULT_ATTEMPTS,
        }
    }

    pub fn serial(path: impl Into<String>) -> Self {
        Self::new(Target::Serial {
            path: path.into(),
            baud_rate: DEFAULT_BAUD_RATE,
        })
    }

    pub fn tcp(addr: impl Into<String>) -> Self {
        Self::new(Target::Tcp(addr.into()))
    }

    pub fn with_baud_rate(mut self, baud: u32) -> Self {
        if let Target::Serial { baud_rate, .. } = &mut self.target {
            *baud_rate = baud;
        }
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_echo(mut self, echo: ChecksumEcho) -> Self {
        self.echo = echo;
        self
    }

    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts.max(1);
        self
    }
}

/// An open byte stream to the bridge.
pub enum Connection {
    Serial(Box<dyn SerialPort>),
    Tcp(TcpStream),
}

impl Connection {
    pub fn open(config: &ConnectionConfig) -> Result<Self, ClientError> {
        let conn = match &config.target {
            Target::Serial { path, baud_rate } => {
                let port = serialport::new(path, *baud_rate)
                    .timeout(config.timeout)
                    .open()?;
                Connection::Serial(port)
            }
            Target::Tcp(addr) => {
                let stream = TcpStream::connect(addr)?;
                stream.set_read_timeout(Some(config.timeout))?;
                stream.set_nodelay(true)?;
                Connection::Tcp(stream)
            }
        };
        tracing::debug!("Connected to {}", config.target);
        Ok(conn)
    }
}

impl Read for Connection {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Connection::Serial(port) => port.read(buf),
            Connection::Tcp(stream) => stream.read(buf),
        }
    }
}

impl Write for Connection {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Connection::Serial(port) => port.write(buf),
            Connection::Tcp(stream) => stream.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Connection::Serial(port) => port.flush(),
            Connection::Tcp(stream) => stream.flush(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;

    #[test]
    fn test_config_builder() {
        let config = ConnectionConfig::serial("/dev/ttyUSB0")
            .with_baud_rate(19200)
            .with_timeout(Duration::from_millis(250))
            .with_echo(ChecksumEcho::WholeFrameLe)
            .with_attempts(0);

        assert_eq!(
            config.target,
            Target::Serial {
                path: "/dev/ttyUSB0".to_string(),
                baud_rate: 19200
            }
        );
        assert_eq!(config.timeout, Duration::from_millis(250));
        assert_eq!(config.echo, ChecksumEcho::WholeFrameLe);
        assert_eq!(config.attempts, 1);
    }

    #[test]
    fn test_baud_rate_ignored_for_tcp() {
        let config = ConnectionConfig::tcp("127.0.0.1:4000").with_baud_rate(19200);
        assert_eq!(config.target, Target::Tcp("127.0.0.1:4000".to_string()));
        assert_eq!(config.target.to_string(), "tcp://127.0.0.1:4000");
        assert_eq!(config.attempts, 3);
    }

    #[test]
    fn test_open_tcp() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap().to_string();

        let config = ConnectionConfig::tcp(addr).with_timeout(Duration::from_millis(20));
        let mut conn = Connection::open(&config).unwrap();
        let (mut peer, _) = listener.accept().unwrap();

        conn.write_all(&[0xFF, 0xAF]).unwrap();
        conn.flush().unwrap();
        let mut buf = [0u8; 2];
        peer.read_exact(&mut buf).unwrap();
        assert_eq!(buf, [0xFF, 0xAF]);

        let err = conn.read(&mut buf).unwrap_err();
        assert!(matches!(
            err.kind(),
            io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
        ));
    }

    #[test]
    fn test_open_missing_serial_port() {
        let config = ConnectionConfig::serial("/dev/isprinklr-does-not-exist");
        assert!(matches!(
            Connection::open(&config),
            Err(ClientError::Serial(_))
        ));
    }
}
