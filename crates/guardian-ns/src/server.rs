use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;
use guardian_ns_lib::{ByteBuf, DnsHeader, DnsPacket, FromBuf as _};
use tokio::net::{TcpListener, UdpSocket};
use tokio::task::JoinSet;
use tracing::Instrument as _;

use crate::handler::{Query, QueryHandler};
use crate::targets::TargetRepository;
use crate::throttle_logger::ThrottleSink;
use crate::Connection;

/// RFC1035
pub const MAX_STANDARD_DNS_MSG_SIZE: usize = 512;
/// Largest datagram we are willing to receive
const RECV_BUF_SIZE: usize = 4096;
/// Idle TCP connections are closed after this long
const TCP_IDLE_TIMEOUT: Duration = Duration::from_secs(10);

type HandlerResult = anyhow::Result<()>;

pub struct DnsServer<R, S> {
    udp_socket: Arc<UdpSocket>,
    tcp_listener: Arc<TcpListener>,
    handler: Arc<QueryHandler<R, S>>,
    workers: JoinSet<HandlerResult>,
}

impl<R, S> DnsServer<R, S>
where
    R: TargetRepository + 'static,
    S: ThrottleSink + 'static,
{
    pub async fn new(bind_addr: SocketAddr, handler: Arc<QueryHandler<R, S>>) -> anyhow::Result<Self> {
        let udp_socket = Arc::new(
            UdpSocket::bind(bind_addr)
                .await
                .with_context(|| format!("error while binding a UDP socket to {}", bind_addr))?,
        );
        let tcp_listener = Arc::new(
            TcpListener::bind(bind_addr)
                .await
                .with_context(|| format!("error while binding a TcpListener to {}", bind_addr))?,
        );

        Ok(DnsServer {
            udp_socket,
            tcp_listener,
            handler,
            workers: JoinSet::new(),
        })
    }

    pub fn udp_local_addr(&self) -> anyhow::Result<SocketAddr> {
        self.udp_socket.local_addr().context("error while getting UDP socket's addr")
    }

    pub fn tcp_local_addr(&self) -> anyhow::Result<SocketAddr> {
        self.tcp_listener.local_addr().context("error while getting TCP listener's addr")
    }

    pub fn add_workers(&mut self, n: usize) {
        for idx in 0..n {
            let udp_socket = self.udp_socket.clone();
            let tcp_listener = self.tcp_listener.clone();
            let handler = self.handler.clone();

            self.workers.spawn(
                handle_incoming_requests(udp_socket, tcp_listener, handler)
                    .instrument(tracing::trace_span!("", worker = idx)),
            );
        }
    }

    pub async fn block_until_completion(mut self) -> anyhow::Result<()> {
        while let Some(result) = self.workers.join_next().await {
            if let Err(e) = result.context("worker task failed to execute")? {
                tracing::error!("Error in a worker: {:#}", e);
            }
        }

        Ok(())
    }
}

enum Incoming {
    Datagram((usize, SocketAddr)),
    Stream(Connection),
}

async fn handle_incoming_requests<R, S>(
    udp_socket: Arc<UdpSocket>,
    tcp_listener: Arc<TcpListener>,
    handler: Arc<QueryHandler<R, S>>,
) -> HandlerResult
where
    R: TargetRepository + 'static,
    S: ThrottleSink + 'static,
{
    let mut recv = vec![0; RECV_BUF_SIZE];
    let mut handlers: JoinSet<HandlerResult> = JoinSet::new();
    loop {
        let incoming = tokio::select! {
            Ok(datagram) = udp_socket.recv_from(&mut recv) => {
                tracing::trace!("new UDP connection");
                Incoming::Datagram(datagram)
            }
            Ok((stream, _)) = tcp_listener.accept() => {
                tracing::trace!("new TCP connection");
                Incoming::Stream(Connection::Tcp(stream))
            }
            Some(result) = handlers.join_next() => {
                if let Err(e) = result.context("connection handling task failed to execute")? {
                    tracing::debug!("Error while handling a query: {:#}", e);
                }
                continue;
            }
            else => continue,
        };

        match incoming {
            Incoming::Datagram((length, from)) => {
                let message = recv[..length].to_vec();
                let connection = Connection::Udp((udp_socket.clone(), from));
                handlers.spawn(serve_udp(connection, message, handler.clone()).in_current_span());
            }
            Incoming::Stream(connection) => {
                handlers.spawn(serve_tcp(connection, handler.clone()).in_current_span());
            }
        }
    }
}

async fn serve_udp<R: TargetRepository, S: ThrottleSink>(
    mut connection: Connection,
    message: Vec<u8>,
    handler: Arc<QueryHandler<R, S>>,
) -> HandlerResult {
    let client = connection.get_client_addr()?;
    if let Some(response) = process_message(handler.as_ref(), client, &message) {
        send_response(&mut connection, &response).await?;
    }

    Ok(())
}

async fn serve_tcp<R: TargetRepository, S: ThrottleSink>(
    mut connection: Connection,
    handler: Arc<QueryHandler<R, S>>,
) -> HandlerResult {
    let client = connection.get_client_addr()?;
    let mut message = Vec::new();
    loop {
        let length = match tokio::time::timeout(TCP_IDLE_TIMEOUT, connection.read(&mut message)).await {
            Ok(Ok(length)) => length,
            Ok(Err(e)) => {
                // Most likely the client has closed the connection
                tracing::trace!(client = %client, "Closing a TCP connection: {:#}", e);
                return Ok(());
            }
            Err(_) => {
                tracing::trace!(client = %client, "Closing an idle TCP connection");
                return Ok(());
            }
        };

        if let Some(response) = process_message(handler.as_ref(), client, &message[..length]) {
            send_response(&mut connection, &response).await?;
        }
    }
}

/// Turns a raw message into a reply. `None` means the message is dropped without a reply.
pub(crate) fn process_message<R: TargetRepository, S: ThrottleSink>(
    handler: &QueryHandler<R, S>,
    client: IpAddr,
    message: &[u8],
) -> Option<DnsPacket<'static>> {
    let packet = match DnsPacket::from_buf(&mut ByteBuf::new(&message)) {
        Ok(packet) => packet,
        Err(e) => {
            tracing::debug!(client = %client, "Malformed packet: {:#}", e);
            // Answer FORMERR if at least the header made it
            let header = DnsHeader::from_buf(&mut ByteBuf::new(&message)).ok()?;
            if header.is_response {
                return None;
            }
            return handler.format_error(client, &header);
        }
    };

    if packet.header.is_response {
        tracing::debug!(client = %client, "Ignoring a response packet");
        return None;
    }

    let header = packet.header.clone();
    match Query::from_packet(client, packet) {
        Ok(query) => Some(handler.serve_dns(&query)),
        Err(e) => {
            tracing::debug!(client = %client, "Invalid query: {:#}", e);
            handler.format_error(client, &header)
        }
    }
}

/// Encodes the reply. Over UDP, replies that don't fit into a standard message lose their
/// answers and get the TC bit, so that the client retries over TCP.
pub(crate) fn encode_response(response: &DnsPacket, is_tcp: bool) -> anyhow::Result<Vec<u8>> {
    let encoded = response.encode().context("error while encoding the response")?;
    if is_tcp || encoded.len() <= MAX_STANDARD_DNS_MSG_SIZE {
        return Ok(encoded);
    }

    let mut truncated = response.clone();
    truncated.header.truncation = true;
    truncated.answers.clear();
    truncated.authorities.clear();
    truncated.additionals.clear();
    truncated.encode().context("error while encoding a truncated response")
}

async fn send_response(connection: &mut Connection, response: &DnsPacket<'_>) -> anyhow::Result<()> {
    let encoded = encode_response(response, connection.is_tcp())?;
    if let Err(e) = connection.send_encoded_packet(&encoded).await {
        // Per-client failures don't affect the server
        tracing::debug!("Error while sending a DNS response: {:#}", e);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;

    use guardian_ns_lib::{QueryType, Question, ResourceData, ResourceRecord, ResponseCode};
    use tokio::io::{AsyncReadExt as _, AsyncWriteExt as _};
    use tokio::net::TcpStream;

    use super::*;
    use crate::rate_limiter::RateLimitPolicy;
    use crate::targets::TargetLoader;
    use crate::test_utils::{FakeRepository, RecordingSink};

    const CLIENT: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);

    async fn get_handler(records: &[(&str, &str)]) -> Arc<QueryHandler<FakeRepository, RecordingSink>> {
        let loader = Arc::new(TargetLoader::new(FakeRepository::new(records)));
        loader.reload().await.expect("shouldn't have failed");
        let policy = RateLimitPolicy::new(100.0, 100).expect("shouldn't have failed");
        Arc::new(QueryHandler::new(policy, loader, RecordingSink::default()))
    }

    fn encoded_query(id: u16, questions: &[(&str, QueryType)]) -> Vec<u8> {
        let mut packet = DnsPacket::new();
        packet.header.id = id;
        packet.header.recursion_desired = true;
        for (qname, query_type) in questions {
            packet.questions.push(Question::new(qname.to_string(), *query_type, None));
        }
        packet.encode().expect("shouldn't have failed")
    }

    fn decode(data: &[u8]) -> DnsPacket<'static> {
        DnsPacket::from_buf(&mut ByteBuf::new(&data)).expect("shouldn't have failed")
    }

    #[tokio::test]
    async fn answers_a_query() {
        let handler = get_handler(&[("example.com", "10.0.0.5")]).await;
        let message = encoded_query(7, &[("Example.com", QueryType::A)]);

        let response = process_message(handler.as_ref(), CLIENT, &message).expect("should have replied");
        assert_eq!(response.header.id, 7);
        assert_eq!(response.answers.len(), 1);
    }

    #[tokio::test]
    async fn format_errors() {
        let handler = get_handler(&[]).await;

        let no_questions = encoded_query(1, &[]);
        let response = process_message(handler.as_ref(), CLIENT, &no_questions).expect("should have replied");
        assert_eq!(response.header.response_code, ResponseCode::FormatError);
        assert_eq!(response.header.id, 1);

        let two_questions = encoded_query(2, &[("a.example.com", QueryType::A), ("b.example.com", QueryType::A)]);
        let response = process_message(handler.as_ref(), CLIENT, &two_questions).expect("should have replied");
        assert_eq!(response.header.response_code, ResponseCode::FormatError);

        // Header claims a question that isn't there
        let mut cut = encoded_query(3, &[("example.com", QueryType::A)]);
        cut.truncate(14);
        let response = process_message(handler.as_ref(), CLIENT, &cut).expect("should have replied");
        assert_eq!(response.header.response_code, ResponseCode::FormatError);
        assert_eq!(response.header.id, 3);
    }

    #[tokio::test]
    async fn odd_label_bytes_miss_and_echo_the_question() {
        let handler = get_handler(&[("example.com", "10.0.0.5")]).await;

        // One 11 byte label 'example.com', then a label that isn't UTF-8
        for qname in [&b"\x0bexample.com\x00"[..], &b"\x02\xff\xfe\x03com\x00"[..]] {
            let mut message = vec![0x00, 0x09, 0x01, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00];
            message.extend_from_slice(qname);
            message.extend_from_slice(&[0x00, 0x01, 0x00, 0x01]);

            let response = process_message(handler.as_ref(), CLIENT, &message).expect("should have replied");
            assert_eq!(response.header.response_code, ResponseCode::Success);
            assert!(response.answers.is_empty());

            let encoded = encode_response(&response, false).expect("shouldn't have failed");
            assert_eq!(encoded[12..], message[12..]);
        }
    }

    #[tokio::test]
    async fn garbage_and_responses_are_dropped() {
        let handler = get_handler(&[]).await;
        assert!(process_message(handler.as_ref(), CLIENT, &[0x12, 0x34, 0x01]).is_none());

        let mut response = DnsPacket::new();
        response.header.is_response = true;
        response.questions.push(Question::new("example.com", QueryType::A, None));
        let encoded = response.encode().expect("shouldn't have failed");
        assert!(process_message(handler.as_ref(), CLIENT, &encoded).is_none());
    }

    #[test]
    fn oversized_udp_responses_are_truncated() {
        // 255 bytes on the wire, the longest possible name
        let qname = format!("{0}.{0}.{0}.{1}", "a".repeat(63), "a".repeat(61));
        let mut response = DnsPacket::new();
        response.header.is_response = true;
        response.questions.push(Question::new(qname.clone(), QueryType::A, None));
        response.answers.push(ResourceRecord::new(
            qname,
            ResourceData::A {
                address: Ipv4Addr::new(10, 0, 0, 5),
            },
            Some(60),
        ));

        let over_tcp = encode_response(&response, true).expect("shouldn't have failed");
        assert!(over_tcp.len() > MAX_STANDARD_DNS_MSG_SIZE);
        assert_eq!(decode(&over_tcp).answers.len(), 1);

        let over_udp = decode(&encode_response(&response, false).expect("shouldn't have failed"));
        assert!(over_udp.header.truncation);
        assert!(over_udp.answers.is_empty());
        assert_eq!(over_udp.questions.len(), 1);
    }

    #[tokio::test]
    async fn serves_over_udp_and_tcp() {
        let handler = get_handler(&[("example.com", "10.0.0.5")]).await;
        let mut server = DnsServer::new((Ipv4Addr::LOCALHOST, 0).into(), handler)
            .await
            .expect("shouldn't have failed");
        let udp_addr = server.udp_local_addr().expect("shouldn't have failed");
        let tcp_addr = server.tcp_local_addr().expect("shouldn't have failed");
        server.add_workers(2);
        let server = tokio::spawn(server.block_until_completion());

        let query = encoded_query(0x4242, &[("example.com", QueryType::A)]);

        // UDP
        let socket = UdpSocket::bind((Ipv4Addr::LOCALHOST, 0)).await.expect("shouldn't have failed");
        socket.send_to(&query, udp_addr).await.expect("shouldn't have failed");
        let mut buf = vec![0; 512];
        let (length, _) = tokio::time::timeout(Duration::from_secs(5), socket.recv_from(&mut buf))
            .await
            .expect("timed out")
            .expect("shouldn't have failed");
        let response = decode(&buf[..length]);
        assert_eq!(response.header.id, 0x4242);
        assert_eq!(
            response.answers[0].resource_data,
            ResourceData::A {
                address: Ipv4Addr::new(10, 0, 0, 5)
            }
        );

        // TCP, two queries over one connection
        let mut stream = TcpStream::connect(tcp_addr).await.expect("shouldn't have failed");
        for _ in 0..2 {
            stream
                .write_all(&(query.len() as u16).to_be_bytes())
                .await
                .expect("shouldn't have failed");
            stream.write_all(&query).await.expect("shouldn't have failed");
            let length = stream.read_u16().await.expect("shouldn't have failed") as usize;
            let mut buf = vec![0; length];
            stream.read_exact(&mut buf).await.expect("shouldn't have failed");
            let response = decode(&buf);
            assert_eq!(response.header.id, 0x4242);
            assert_eq!(response.answers.len(), 1);
        }

        server.abort();
    }
}
