use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use anyhow::Context as _;
use tokio::io::{AsyncReadExt as _, AsyncWriteExt as _};
use tokio::net::{TcpStream, UdpSocket};

/// The transport a query arrived on, used to send the reply back the same way
pub enum Connection {
    Tcp(TcpStream),
    Udp((Arc<UdpSocket>, SocketAddr)),
}

impl Connection {
    pub async fn send_encoded_packet(&mut self, src: &[u8]) -> anyhow::Result<()> {
        match self {
            Connection::Tcp(socket) => {
                let length = u16::try_from(src.len())
                    .context("TCP: packet is too long")?
                    .to_be_bytes();
                socket
                    .write_all(&length)
                    .await
                    .context("TCP: error while sending packet's length")?;
                socket
                    .write_all(src)
                    .await
                    .context("TCP: error while sending a DNS packet")?;
            }
            Connection::Udp((socket, addr)) => {
                socket
                    .send_to(src, *addr)
                    .await
                    .with_context(|| format!("UDP: error while sending a DNS packet to {}", addr))?;
            }
        };

        Ok(())
    }

    /// Reads the next length-prefixed message into `dst`. UDP datagrams are received by the
    /// server loop, so this only works for TCP.
    pub async fn read(&mut self, dst: &mut Vec<u8>) -> anyhow::Result<usize> {
        match self {
            Connection::Tcp(socket) => {
                let length = socket
                    .read_u16()
                    .await
                    .context("TCP: error while reading packet's length")? as usize;
                if dst.len() < length {
                    dst.resize(length, 0);
                }
                socket
                    .read_exact(&mut dst[..length])
                    .await
                    .context("TCP: error while reading a packet")?;
                Ok(length)
            }
            Connection::Udp(_) => anyhow::bail!("bug: reading from a UDP connection?"),
        }
    }

    /// Client identity used for rate limiting: the peer address without the port
    pub fn get_client_addr(&self) -> anyhow::Result<IpAddr> {
        match self {
            Connection::Tcp(socket) => socket
                .peer_addr()
                .map(|socket_addr| socket_addr.ip())
                .context("bug: TCP socket is not connected?"),
            Connection::Udp((_, addr)) => Ok(addr.ip()),
        }
    }

    pub fn is_tcp(&self) -> bool {
        matches!(self, Connection::Tcp(_))
    }
}
