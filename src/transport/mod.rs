//! Best-effort single-datagram frame delivery.
//!
//! Each frame goes out as one UDP datagram with no header, sequence number or
//! framing, so the receiver can decode every datagram on its own. A transient
//! socket is opened per send; nothing persists between frames.

mod encode;

pub use encode::{EncodeError, FrameEncoder, OverlayMode};

use crate::frame::{BoundingBox, Frame};
use bytes::Bytes;
use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};
use thiserror::Error;
use tracing::{debug, info};

/// Largest UDP payload over IPv4 (65535 - 8 byte UDP header - 20 byte IP header)
pub const MAX_DATAGRAM_BYTES: usize = 65_507;

#[derive(Error, Debug)]
pub enum TransmitError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid destination: {0}")]
    InvalidDestination(String),

    #[error("payload of {size} bytes exceeds the {max} byte datagram limit")]
    Oversized { size: usize, max: usize },

    #[error("short send: {sent} of {size} bytes")]
    ShortSend { sent: usize, size: usize },
}

/// Compresses frames and sends them to one fixed peer
#[derive(Debug, Clone)]
pub struct FrameTransport {
    encoder: FrameEncoder,
    dest_addr: SocketAddr,
    max_datagram_bytes: usize,
}

impl FrameTransport {
    /// Resolves the destination once; `max_datagram_bytes` is capped at
    /// [`MAX_DATAGRAM_BYTES`].
    pub fn new(
        encoder: FrameEncoder,
        dest_host: &str,
        dest_port: u16,
        max_datagram_bytes: usize,
    ) -> Result<Self, TransmitError> {
        let dest_str = format!("{}:{}", dest_host, dest_port);
        let dest_addr = (dest_host, dest_port)
            .to_socket_addrs()
            .map_err(|e| TransmitError::InvalidDestination(format!("{}: {}", dest_str, e)))?
            .next()
            .ok_or_else(|| TransmitError::InvalidDestination(format!("{}: no address", dest_str)))?;

        let max_datagram_bytes = max_datagram_bytes.min(MAX_DATAGRAM_BYTES);

        info!(
            dest = %dest_addr,
            quality = encoder.quality(),
            max_datagram_bytes,
            "Frame transport ready"
        );

        Ok(Self {
            encoder,
            dest_addr,
            max_datagram_bytes,
        })
    }

    pub fn destination(&self) -> SocketAddr {
        self.dest_addr
    }

    pub fn max_datagram_bytes(&self) -> usize {
        self.max_datagram_bytes
    }

    /// Compresses a frame into a standalone JPEG with `overlay` drawn on it
    pub fn encode(&self, frame: &Frame, overlay: &[BoundingBox]) -> Result<Bytes, EncodeError> {
        self.encoder.encode(frame, overlay)
    }

    /// Sends `payload` as exactly one datagram.
    ///
    /// Oversized payloads are rejected before any socket is opened.
    pub fn send(&self, payload: &[u8]) -> Result<usize, TransmitError> {
        if payload.len() > self.max_datagram_bytes {
            return Err(TransmitError::Oversized {
                size: payload.len(),
                max: self.max_datagram_bytes,
            });
        }

        let local_addr = if self.dest_addr.is_ipv4() {
            "0.0.0.0:0"
        } else {
            "[::]:0"
        };
        let socket = UdpSocket::bind(local_addr)?;
        let sent = socket.send_to(payload, self.dest_addr)?;

        if sent != payload.len() {
            return Err(TransmitError::ShortSend {
                sent,
                size: payload.len(),
            });
        }

        debug!(dest = %self.dest_addr, bytes = sent, "Frame datagram sent");
        Ok(sent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn transport(port: u16, max: usize) -> FrameTransport {
        FrameTransport::new(FrameEncoder::new(50).unwrap(), "127.0.0.1", port, max).unwrap()
    }

    fn receiver() -> UdpSocket {
        let socket = UdpSocket::bind("127.0.0.1:0").unwrap();
        socket
            .set_read_timeout(Some(Duration::from_secs(2)))
            .unwrap();
        socket
    }

    #[test]
    fn test_invalid_destination() {
        let encoder = FrameEncoder::new(50).unwrap();
        let result = FrameTransport::new(encoder, "not a host name!", 6060, MAX_DATAGRAM_BYTES);
        assert!(matches!(result, Err(TransmitError::InvalidDestination(_))));
    }

    #[test]
    fn test_ceiling_is_capped() {
        let transport = transport(6060, 1_000_000);
        assert_eq!(transport.max_datagram_bytes(), MAX_DATAGRAM_BYTES);
    }

    #[test]
    fn test_one_payload_one_datagram() {
        let rx = receiver();
        let port = rx.local_addr().unwrap().port();
        let transport = transport(port, MAX_DATAGRAM_BYTES);

        let payload = vec![0xABu8; 4096];
        assert_eq!(transport.send(&payload).unwrap(), 4096);

        let mut buf = vec![0u8; MAX_DATAGRAM_BYTES];
        let (n, _) = rx.recv_from(&mut buf).unwrap();
        assert_eq!(&buf[..n], payload.as_slice());
    }

    #[test]
    fn test_oversized_payload_is_an_error() {
        let rx = receiver();
        let port = rx.local_addr().unwrap().port();
        let transport = transport(port, 1024);

        let result = transport.send(&vec![0u8; 1025]);
        assert!(matches!(
            result,
            Err(TransmitError::Oversized {
                size: 1025,
                max: 1024
            })
        ));

        // nothing went out
        rx.set_read_timeout(Some(Duration::from_millis(100))).unwrap();
        let mut buf = [0u8; 16];
        assert!(rx.recv_from(&mut buf).is_err());
    }

    #[test]
    fn test_encoded_frame_fits_one_datagram() {
        let rx = receiver();
        let port = rx.local_addr().unwrap().port();
        let transport = transport(port, MAX_DATAGRAM_BYTES);

        let frame = Frame::filled(240, 240, 90);
        let payload = transport.encode(&frame, &[]).unwrap();
        transport.send(&payload).unwrap();

        let mut buf = vec![0u8; MAX_DATAGRAM_BYTES];
        let (n, _) = rx.recv_from(&mut buf).unwrap();
        let decoded = image::load_from_memory(&buf[..n]).unwrap().to_luma8();
        assert_eq!(decoded.dimensions(), (240, 240));
    }
}
