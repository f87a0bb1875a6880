use anyhow::Context;

use crate::{ByteBuf, EncodeToBuf, FromBuf};

pub const DNS_HEADER_SIZE: usize = 12;

#[derive(Debug, PartialEq, Eq, Clone, Copy, Default)]
#[cfg_attr(test, derive(proptest_derive::Arbitrary))]
pub enum QueryOpcode {
    /// Standard query
    #[default]
    QUERY,
    /// Inverse query
    IQUERY,
    /// Status request
    STATUS,
    /// 3-15 opcodes
    UNKNOWN(#[cfg_attr(test, proptest(strategy = "3..16u8"))] u8),
}

impl From<u8> for QueryOpcode {
    fn from(value: u8) -> Self {
        match value {
            0 => QueryOpcode::QUERY,
            1 => QueryOpcode::IQUERY,
            2 => QueryOpcode::STATUS,
            _ => QueryOpcode::UNKNOWN(value),
        }
    }
}

impl From<QueryOpcode> for u8 {
    fn from(value: QueryOpcode) -> Self {
        match value {
            QueryOpcode::QUERY => 0,
            QueryOpcode::IQUERY => 1,
            QueryOpcode::STATUS => 2,
            QueryOpcode::UNKNOWN(opcode) => opcode,
        }
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Copy, Default)]
#[cfg_attr(test, derive(proptest_derive::Arbitrary))]
pub enum ResponseCode {
    #[default]
    Success,
    /// Server was unable to interpret the query
    FormatError,
    /// Server was unable to process the query due to an internal error
    ServerFailure,
    /// Domain name referenced in the query doesn't exist
    NameError,
    /// Requested kind of query is not supported by the server
    NotImplemented,
    /// Server refuses to complete the specified operation
    Refused,
    /// 6-15 codes
    Unknown(#[cfg_attr(test, proptest(strategy = "6..16u8"))] u8),
}

impl From<u8> for ResponseCode {
    fn from(value: u8) -> Self {
        match value {
            0 => ResponseCode::Success,
            1 => ResponseCode::FormatError,
            2 => ResponseCode::ServerFailure,
            3 => ResponseCode::NameError,
            4 => ResponseCode::NotImplemented,
            5 => ResponseCode::Refused,
            _ => ResponseCode::Unknown(value),
        }
    }
}

impl From<ResponseCode> for u8 {
    fn from(value: ResponseCode) -> Self {
        match value {
            ResponseCode::Success => 0,
            ResponseCode::FormatError => 1,
            ResponseCode::ServerFailure => 2,
            ResponseCode::NameError => 3,
            ResponseCode::NotImplemented => 4,
            ResponseCode::Refused => 5,
            ResponseCode::Unknown(rcode) => rcode,
        }
    }
}

#[derive(Debug, PartialEq, Eq, Default, Clone)]
#[cfg_attr(test, derive(proptest_derive::Arbitrary))]
pub struct DnsHeader {
    /// A query and its response **must have the same ID**
    pub id: u16,
    pub is_response: bool,
    pub opcode: QueryOpcode,
    /// Set by the server. Indicates whether a server is authoritative for the queried name
    pub is_authoritative: bool,
    pub truncation: bool,
    /// Set by the sender. Asks for recursive resolution
    pub recursion_desired: bool,
    pub recursion_available: bool,
    /// Reserved bit and the two DNSSEC bits (AD, CD)
    pub z: [bool; 3],
    pub response_code: ResponseCode,
    pub question_count: u16,
    pub answer_rr_count: u16,
    pub authority_rr_count: u16,
    pub additional_rr_count: u16,
}

impl DnsHeader {
    pub fn new() -> Self {
        DnsHeader::default()
    }

    pub fn get_flags(&self) -> u16 {
        let first_byte = (self.is_response as u8) << 7
            | (u8::from(self.opcode) & 0xf) << 3
            | (self.is_authoritative as u8) << 2
            | (self.truncation as u8) << 1
            | self.recursion_desired as u8;
        let second_byte = (self.recursion_available as u8) << 7
            | (self.z[0] as u8) << 6
            | (self.z[1] as u8) << 5
            | (self.z[2] as u8) << 4
            | (u8::from(self.response_code) & 0xf);
        (first_byte as u16) << 8 | (second_byte as u16)
    }
}

impl FromBuf for DnsHeader {
    fn from_buf(buf: &mut ByteBuf) -> anyhow::Result<Self> {
        let id = buf.read_u16().context("id is missing")?;
        let flags = buf.read_u16().context("flags are missing")?;

        let bit = |mask: u16| flags & mask == mask;

        Ok(DnsHeader {
            id,
            is_response: bit(0x8000),
            opcode: (((flags & 0x7800) >> 11) as u8).into(),
            is_authoritative: bit(0x400),
            truncation: bit(0x200),
            recursion_desired: bit(0x100),
            recursion_available: bit(0x80),
            z: [bit(0x40), bit(0x20), bit(0x10)],
            response_code: ((flags & 0xf) as u8).into(),
            question_count: buf.read_u16().context("question count is missing")?,
            answer_rr_count: buf.read_u16().context("answer RR count is missing")?,
            authority_rr_count: buf.read_u16().context("authority RR count is missing")?,
            additional_rr_count: buf.read_u16().context("additional RR count is missing")?,
        })
    }
}

impl EncodeToBuf for DnsHeader {
    fn encode_to_buf(&self, buf: &mut ByteBuf) -> anyhow::Result<usize> {
        buf.write_u16(self.id);
        buf.write_u16(self.get_flags());
        buf.write_u16(self.question_count);
        buf.write_u16(self.answer_rr_count);
        buf.write_u16(self.authority_rr_count);
        buf.write_u16(self.additional_rr_count);

        Ok(DNS_HEADER_SIZE)
    }
}
