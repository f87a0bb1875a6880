use std::borrow::Cow;

use anyhow::Context;

use crate::{ByteBuf, EncodeToBuf, FromBuf, IN_CLASS};

#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub enum QueryType {
    UNKNOWN(u16),
    A,
    NS,
    CNAME,
    SOA,
    MX,
    TXT,
    AAAA,
    ANY,
}

impl From<u16> for QueryType {
    fn from(value: u16) -> Self {
        match value {
            1 => QueryType::A,
            2 => QueryType::NS,
            5 => QueryType::CNAME,
            6 => QueryType::SOA,
            15 => QueryType::MX,
            16 => QueryType::TXT,
            28 => QueryType::AAAA,
            255 => QueryType::ANY,
            _ => QueryType::UNKNOWN(value),
        }
    }
}

impl From<QueryType> for u16 {
    fn from(val: QueryType) -> Self {
        match val {
            QueryType::A => 1,
            QueryType::NS => 2,
            QueryType::CNAME => 5,
            QueryType::SOA => 6,
            QueryType::MX => 15,
            QueryType::TXT => 16,
            QueryType::AAAA => 28,
            QueryType::ANY => 255,
            QueryType::UNKNOWN(qtype) => qtype,
        }
    }
}

#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Question<'a> {
    pub qname: Cow<'a, str>,
    pub query_type: QueryType,
    pub qclass: u16,
}

impl<'a> Question<'a> {
    pub fn new(qname: impl Into<Cow<'a, str>>, query_type: QueryType, qclass: Option<u16>) -> Self {
        Self {
            qname: qname.into(),
            query_type,
            qclass: qclass.unwrap_or(IN_CLASS),
        }
    }

    pub fn into_owned(self) -> Question<'static> {
        Question {
            qname: self.qname.into_owned().into(),
            query_type: self.query_type,
            qclass: self.qclass,
        }
    }
}

impl FromBuf for Question<'_> {
    fn from_buf(buf: &mut ByteBuf) -> anyhow::Result<Self> {
        let qname = buf.read_qname().context("QNAME is missing")?;
        let query_type = buf.read_u16().context("QTYPE is missing")?.into();
        let qclass = buf.read_u16().context("QCLASS is missing")?;

        Ok(Question {
            qname,
            query_type,
            qclass,
        })
    }
}

impl EncodeToBuf for Question<'_> {
    fn encode_to_buf(&self, buf: &mut ByteBuf) -> anyhow::Result<usize> {
        let qname_length = buf.write_qname(&self.qname).context("writing QNAME")?;
        buf.write_u16(self.query_type.into());
        buf.write_u16(self.qclass);

        Ok(qname_length + 2 /* QTYPE */ + 2 /* QCLASS */)
    }
}
