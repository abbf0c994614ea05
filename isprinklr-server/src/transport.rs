//! Byte transports for the link driver: a local serial port or a raw TCP
//! bridge to one.

use crate::config::SerialConfig;
use crate::error::ServerError;
use serialport::SerialPort;
use std::io::{self, Read, Write};
use std::net::TcpStream;
use std::time::Duration;

/// A blocking byte stream to the zone bridge.
pub enum Transport {
    Serial(Box<dyn SerialPort>),
    Tcp(TcpStream),
}

impl Transport {
    /// Opens the transport described by `config`. A TCP bridge takes
    /// precedence over the serial device.
    pub fn open(config: &SerialConfig) -> Result<Self, ServerError> {
        match &config.tcp {
            Some(addr) => Self::connect_tcp(addr, config.read_timeout()),
            None => Self::open_serial(&config.port, config.baud_rate, config.read_timeout()),
        }
    }

    pub fn open_serial(path: &str, baud_rate: u32, timeout: Duration) -> Result<Self, ServerError> {
        let port = serialport::new(path, baud_rate).timeout(timeout).open()?;
        tracing::info!("Opened serial port {} at {} baud", path, baud_rate);
        Ok(Transport::Serial(port))
    }

    pub fn connect_tcp(addr: &str, timeout: Duration) -> Result<Self, ServerError> {
        let stream = TcpStream::connect(addr)?;
        stream.set_read_timeout(Some(timeout))?;
        stream.set_nodelay(true)?;
        tracing::info!("Connected to serial bridge at {}", addr);
        Ok(Transport::Tcp(stream))
    }

    pub fn is_serial(&self) -> bool {
        matches!(self, Transport::Serial(_))
    }
}

impl Read for Transport {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Transport::Serial(port) => port.read(buf),
            Transport::Tcp(stream) => stream.read(buf),
        }
    }
}

impl Write for Transport {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Transport::Serial(port) => port.write(buf),
            Transport::Tcp(stream) => stream.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Transport::Serial(port) => port.flush(),
            Transport::Tcp(stream) => stream.flush(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;

    #[test]
    fn test_tcp_transport_roundtrip() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap().to_string();

        let mut transport = Transport::connect_tcp(&addr, Duration::from_millis(100)).unwrap();
        assert!(!transport.is_serial());
        let (mut peer, _) = listener.accept().unwrap();

        transport.write_all(&[0xFF, 0x01]).unwrap();
        transport.flush().unwrap();
        let mut buf = [0u8; 2];
        peer.read_exact(&mut buf).unwrap();
        assert_eq!(buf, [0xFF, 0x01]);

        peer.write_all(&[0xAF]).unwrap();
        let mut one = [0u8; 1];
        transport.read_exact(&mut one).unwrap();
        assert_eq!(one, [0xAF]);
    }

    #[test]
    fn test_tcp_read_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let mut transport = Transport::connect_tcp(&addr, Duration::from_millis(20)).unwrap();
        let _peer = listener.accept().unwrap();

        let mut buf = [0u8; 8];
        let err = transport.read(&mut buf).unwrap_err();
        assert!(matches!(
            err.kind(),
            io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
        ));
    }

    #[test]
    fn test_missing_serial_port() {
        let result = Transport::open_serial(
            "/dev/isprinklr-does-not-exist",
            9600,
            Duration::from_millis(100),
        );
        assert!(matches!(result, Err(ServerError::Serial(_))));
    }
}
