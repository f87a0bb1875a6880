use std::net::IpAddr;
use std::sync::Arc;

use guardian_ns_common::normalize_domain;
use guardian_ns_lib::{
    DnsHeader, DnsPacket, QueryOpcode, QueryType, Question, ResourceData, ResourceRecord, ResponseCode,
};

use crate::rate_limiter::{RateLimitPolicy, RateLimiter};
use crate::targets::{TargetLoader, TargetRepository};
use crate::throttle_logger::ThrottleSink;

/// TTL of every A record we answer with
pub const ANSWER_TTL: u32 = 60;

/// A single-question DNS query, together with the client that sent it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    pub client: IpAddr,
    pub header: DnsHeader,
    pub question: Question<'static>,
}

impl Query {
    /// Fails for responses and for packets that don't carry exactly one question
    pub fn from_packet(client: IpAddr, packet: DnsPacket<'_>) -> anyhow::Result<Query> {
        if packet.header.is_response {
            anyhow::bail!("packet is a response");
        }

        let mut questions = packet.questions.into_iter();
        let (Some(question), None) = (questions.next(), questions.next()) else {
            anyhow::bail!("query must have exactly one question");
        };

        Ok(Query {
            client,
            header: packet.header,
            question: question.into_owned(),
        })
    }
}

/// An empty reply correlated to the query: same id, opcode and RD bit
pub fn get_reply_packet(request_header: &DnsHeader, response_code: ResponseCode) -> DnsPacket<'static> {
    let mut packet = DnsPacket::new();
    packet.header.id = request_header.id;
    packet.header.is_response = true;
    packet.header.opcode = request_header.opcode;
    packet.header.recursion_desired = request_header.recursion_desired;
    packet.header.recursion_available = false;
    packet.header.response_code = response_code;
    packet
}

pub struct QueryHandler<R, S> {
    limiter: RateLimiter,
    targets: Arc<TargetLoader<R>>,
    throttle_sink: S,
}

impl<R: TargetRepository, S: ThrottleSink> QueryHandler<R, S> {
    pub fn new(policy: RateLimitPolicy, targets: Arc<TargetLoader<R>>, throttle_sink: S) -> Self {
        QueryHandler {
            limiter: RateLimiter::new(policy),
            targets,
            throttle_sink,
        }
    }

    /// Produces exactly one reply for the query. Never fails: denials, misses and unsupported
    /// types all end up as authoritative replies without answers. Opcodes other than QUERY get
    /// NOTIMP once the client has been charged.
    pub fn serve_dns(&self, query: &Query) -> DnsPacket<'static> {
        let question = &query.question;
        let mut response = get_reply_packet(&query.header, ResponseCode::Success);
        response.header.is_authoritative = true;
        response.questions.push(question.clone());

        if !self.limiter.is_allowed(&query.client) {
            tracing::debug!(client = %query.client, qname = ?question.qname, "Rate limited");
            self.throttle_sink.log_throttle_request(query.client);
            return response;
        }

        if query.header.opcode != QueryOpcode::QUERY {
            tracing::debug!(client = %query.client, opcode = ?query.header.opcode, "Unsupported opcode");
            let mut response = get_reply_packet(&query.header, ResponseCode::NotImplemented);
            response.questions.push(question.clone());
            return response;
        }

        if question.query_type != QueryType::A {
            tracing::trace!(
                client = %query.client,
                qname = ?question.qname,
                qtype = ?question.query_type,
                "Unsupported query type"
            );
            return response;
        }

        let qname = normalize_domain(&question.qname);
        match self.targets.snapshot().lookup(&qname) {
            Some(address) => {
                tracing::debug!(client = %query.client, qname = %qname, address = %address, "Resolved");
                response
                    .answers
                    .push(ResourceRecord::new(qname, ResourceData::A { address }, Some(ANSWER_TTL)));
            }
            None => {
                tracing::debug!(client = %query.client, qname = %qname, "Unknown target");
            }
        }

        response
    }

    /// FORMERR for a client whose packet couldn't be turned into a [`Query`].
    /// Malformed packets are charged like any other query, `None` means the client is throttled.
    pub fn format_error(&self, client: IpAddr, request_header: &DnsHeader) -> Option<DnsPacket<'static>> {
        if !self.limiter.is_allowed(&client) {
            tracing::debug!(client = %client, "Rate limited a malformed query");
            self.throttle_sink.log_throttle_request(client);
            return None;
        }

        Some(get_reply_packet(request_header, ResponseCode::FormatError))
    }

    pub fn evict_idle_clients(&self) -> usize {
        self.limiter.evict_idle()
    }

    pub fn client_count(&self) -> usize {
        self.limiter.client_count()
    }
}
