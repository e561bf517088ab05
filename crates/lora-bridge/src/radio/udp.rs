// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! UDP bench radio
//!
//! Stands in for the air when nodes and gateway run as processes on a LAN.
//! Each datagram carries one packet plus the link quality the receiver
//! should report, encoded like the SX127x packet registers:
//!
//! ```text
//! +--------+--------+--------+----------------+
//! | rssi (i16, BE)  | snr/4  | payload ...    |
//! +--------+--------+--------+----------------+
//! ```

use std::io;
use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};
use std::time::Duration;

use super::{LinkQuality, Radio, RadioConfig, RadioError, ReceivedPacket, LORA_MAX_PACKET};

/// Frame header size (rssi + snr)
const HEADER_SIZE: usize = 3;

/// Datagram-backed radio
pub struct UdpRadio {
    socket: UdpSocket,
    peer: Option<SocketAddr>,
    link: LinkQuality,
    initialized: bool,
}

impl UdpRadio {
    /// Bind a radio on `addr` (use port 0 for a transmit-only node)
    pub fn bind<A: ToSocketAddrs>(addr: A) -> Result<Self, RadioError> {
        let socket = UdpSocket::bind(addr).map_err(io_error)?;
        Ok(Self {
            socket,
            peer: None,
            link: LinkQuality {
                rssi: -60,
                snr: 8.0,
            },
            initialized: false,
        })
    }

    /// Destination for `send`
    pub fn with_peer<A: ToSocketAddrs>(mut self, addr: A) -> Result<Self, RadioError> {
        self.peer = addr.to_socket_addrs().map_err(io_error)?.next();
        if self.peer.is_none() {
            return Err(RadioError::Transport("peer address did not resolve".into()));
        }
        Ok(self)
    }

    /// Link quality the receiving side will report for our packets
    pub fn with_link(mut self, link: LinkQuality) -> Self {
        self.link = link;
        self
    }

    /// Local socket address
    pub fn local_addr(&self) -> Result<SocketAddr, RadioError> {
        self.socket.local_addr().map_err(io_error)
    }
}

fn io_error(e: io::Error) -> RadioError {
    RadioError::Transport(e.to_string())
}

fn encode_frame(payload: &[u8], link: LinkQuality) -> Vec<u8> {
    let mut frame = Vec::with_capacity(HEADER_SIZE + payload.len());
    frame.extend_from_slice(&link.rssi.to_be_bytes());
    frame.push((link.snr * 4.0).round().clamp(-128.0, 127.0) as i8 as u8);
    frame.extend_from_slice(payload);
    frame
}

fn decode_frame(frame: &[u8]) -> Result<ReceivedPacket, RadioError> {
    if frame.len() < HEADER_SIZE {
        return Err(RadioError::InvalidData);
    }
    let rssi = i16::from_be_bytes([frame[0], frame[1]]);
    let snr = (frame[2] as i8) as f32 / 4.0;
    Ok(ReceivedPacket {
        payload: frame[HEADER_SIZE..].to_vec(),
        link: LinkQuality { rssi, snr },
    })
}

impl Radio for UdpRadio {
    fn init(&mut self, config: &RadioConfig) -> Result<(), RadioError> {
        config.validate()?;
        self.initialized = true;
        Ok(())
    }

    fn send(&mut self, data: &[u8]) -> Result<(), RadioError> {
        if !self.initialized {
            return Err(RadioError::NotInitialized);
        }
        if data.len() > LORA_MAX_PACKET {
            return Err(RadioError::BufferTooSmall(data.len()));
        }
        let peer = self
            .peer
            .ok_or_else(|| RadioError::Transport("no peer configured".into()))?;

        self.socket
            .send_to(&encode_frame(data, self.link), peer)
            .map_err(io_error)?;
        Ok(())
    }

    fn receive(&mut self, timeout: Duration) -> Result<Option<ReceivedPacket>, RadioError> {
        if !self.initialized {
            return Err(RadioError::NotInitialized);
        }

        // set_read_timeout rejects a zero duration
        let timeout = timeout.max(Duration::from_millis(1));
        self.socket
            .set_read_timeout(Some(timeout))
            .map_err(io_error)?;

        let mut buf = [0u8; HEADER_SIZE + LORA_MAX_PACKET];
        match self.socket.recv_from(&mut buf) {
            Ok((len, _src)) => decode_frame(&buf[..len]).map(Some),
            Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) => {
                Ok(None)
            }
            Err(e) => Err(io_error(e)),
        }
    }

    fn sleep(&mut self) -> Result<(), RadioError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_roundtrip() {
        let link = LinkQuality {
            rssi: -112,
            snr: -3.25,
        };
        let packet = decode_frame(&encode_frame(b"abc", link)).unwrap();
        assert_eq!(packet.payload, b"abc");
        assert_eq!(packet.link, link);
    }

    #[test]
    fn test_short_frame_rejected() {
        assert!(matches!(decode_frame(&[0x00]), Err(RadioError::InvalidData)));
    }

    #[test]
    fn test_loopback_send_receive() {
        let config = RadioConfig::default();
        let mut gateway = UdpRadio::bind("127.0.0.1:0").unwrap();
        gateway.init(&config).unwrap();
        let gateway_addr = gateway.local_addr().unwrap();

        let link = LinkQuality {
            rssi: -45,
            snr: 9.5,
        };
        let mut node = UdpRadio::bind("127.0.0.1:0")
            .unwrap()
            .with_peer(gateway_addr)
            .unwrap()
            .with_link(link);
        node.init(&config).unwrap();

        node.send(b"hello").unwrap();
        let packet = gateway.receive(Duration::from_secs(2)).unwrap().unwrap();
        assert_eq!(packet.payload, b"hello");
        assert_eq!(packet.link, link);

        assert!(gateway.receive(Duration::from_millis(10)).unwrap().is_none());
    }
}
