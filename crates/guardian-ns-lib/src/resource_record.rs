use std::borrow::Cow;
use std::net::Ipv4Addr;

use anyhow::Context;

use crate::{ByteBuf, EncodeToBuf, FromBuf, QueryType, IN_CLASS};

#[derive(Debug, PartialEq, Eq, Clone)]
pub struct ResourceRecord<'a> {
    pub name: Cow<'a, str>,
    pub class: u16,
    pub ttl: u32,
    pub resource_data: ResourceData<'a>,
}

impl<'a> ResourceRecord<'a> {
    pub fn new(name: impl Into<Cow<'a, str>>, resource_data: ResourceData<'a>, ttl: Option<u32>) -> Self {
        ResourceRecord {
            name: name.into(),
            ttl: ttl.unwrap_or_default(),
            class: IN_CLASS,
            resource_data,
        }
    }

    pub fn into_owned(self) -> ResourceRecord<'static> {
        ResourceRecord {
            name: self.name.into_owned().into(),
            class: self.class,
            ttl: self.ttl,
            resource_data: self.resource_data.into_owned(),
        }
    }
}

impl FromBuf for ResourceRecord<'_> {
    fn from_buf(buf: &mut ByteBuf<'_>) -> anyhow::Result<Self> {
        let name = buf.read_qname().context("NAME is missing")?;
        let query_type: QueryType = buf.read_u16().context("TYPE is missing")?.into();
        let class = buf.read_u16().context("CLASS is missing")?;
        let ttl = buf.read_u32().context("TTL is missing")?;
        let resource_data = ResourceData::from_buf_with_type(buf, query_type).context("can't decode RDATA")?;

        Ok(ResourceRecord {
            name,
            class,
            ttl,
            resource_data,
        })
    }
}

impl EncodeToBuf for ResourceRecord<'_> {
    fn encode_to_buf(&self, buf: &mut ByteBuf) -> anyhow::Result<usize> {
        let name_length = buf.write_qname(&self.name).context("writing NAME")?;
        buf.write_u16(self.resource_data.get_query_type().into());
        buf.write_u16(self.class);
        buf.write_u32(self.ttl);
        let rdata_length = self.resource_data.encode_to_buf(buf).context("writing RDATA")?;

        Ok(name_length + 2 /* TYPE */ + 2 /* CLASS */ + 4 /* TTL */ + rdata_length)
    }
}

/// Only A records are decoded, everything else is carried as raw RDATA
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum ResourceData<'a> {
    UNKNOWN { qtype: u16, rdata: Cow<'a, [u8]> },
    A { address: Ipv4Addr },
}

impl ResourceData<'_> {
    pub fn from_buf_with_type(buf: &mut ByteBuf<'_>, query_type: QueryType) -> anyhow::Result<ResourceData<'static>> {
        let rd_length = buf.read_u16().context("RDLENGTH is missing")? as usize;
        Ok(match query_type {
            QueryType::A => {
                if rd_length != 4 {
                    anyhow::bail!("A record: unexpected RDLENGTH {}", rd_length);
                }
                let address_raw = buf.read_bytes(4).context("A record: ADDRESS is missing")?;
                ResourceData::A {
                    address: Ipv4Addr::new(address_raw[0], address_raw[1], address_raw[2], address_raw[3]),
                }
            }
            qtype => {
                let rdata = buf
                    .read_bytes(rd_length)
                    .with_context(|| format!("{:?} record: RDATA is missing", qtype))?;
                ResourceData::UNKNOWN {
                    qtype: qtype.into(),
                    rdata: rdata.to_vec().into(),
                }
            }
        })
    }

    pub fn get_query_type(&self) -> QueryType {
        match self {
            ResourceData::UNKNOWN { qtype, .. } => (*qtype).into(),
            ResourceData::A { .. } => QueryType::A,
        }
    }

    pub fn into_owned(self) -> ResourceData<'static> {
        match self {
            ResourceData::UNKNOWN { qtype, rdata } => ResourceData::UNKNOWN {
                qtype,
                rdata: rdata.into_owned().into(),
            },
            ResourceData::A { address } => ResourceData::A { address },
        }
    }
}

impl EncodeToBuf for ResourceData<'_> {
    fn encode_to_buf(&self, buf: &mut ByteBuf) -> anyhow::Result<usize> {
        let octets;
        let rdata: &[u8] = match self {
            ResourceData::UNKNOWN { rdata, .. } => rdata,
            ResourceData::A { address } => {
                octets = address.octets();
                &octets
            }
        };
        let rd_length = u16::try_from(rdata.len()).context("RDATA is too long")?;
        buf.write_u16(rd_length);
        buf.write_bytes(rdata);

        Ok(2 /* RDLENGTH */ + rdata.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn a_record_encoding() {
        let rr = ResourceRecord::new(
            "example.com.",
            ResourceData::A {
                address: Ipv4Addr::new(10, 0, 0, 5),
            },
            Some(60),
        );
        let mut buf = ByteBuf::new_empty(None);
        let written = rr.encode_to_buf(&mut buf).expect("shouldn't have failed");

        assert_eq!(written, buf.len());
        assert_eq!(
            &*buf,
            &[
                0x7, 0x65, 0x78, 0x61, 0x6d, 0x70, 0x6c, 0x65, 0x3, 0x63, 0x6f, 0x6d, 0x0, // NAME
                0x0, 0x1, // TYPE
                0x0, 0x1, // CLASS
                0x0, 0x0, 0x0, 0x3c, // TTL
                0x0, 0x4, 0xa, 0x0, 0x0, 0x5, // RDATA
            ]
        );
    }

    #[test]
    #[should_panic(expected = "A record: unexpected RDLENGTH 5")]
    fn a_record_with_bad_length() {
        let data = &[0x0, 0x5, 0x1, 0x2, 0x3, 0x4, 0x5];
        let mut buf = ByteBuf::new(data);
        ResourceData::from_buf_with_type(&mut buf, QueryType::A).unwrap();
    }

    #[test]
    fn unknown_record_is_kept_raw() {
        let data = &[0x0, 0x3, 0x1, 0x2, 0x3];
        let mut buf = ByteBuf::new(data);
        let rdata = ResourceData::from_buf_with_type(&mut buf, QueryType::TXT).expect("shouldn't have failed");
        assert_eq!(
            rdata,
            ResourceData::UNKNOWN {
                qtype: 16,
                rdata: vec![0x1, 0x2, 0x3].into()
            }
        );
        assert_eq!(rdata.get_query_type(), QueryType::TXT);
    }
}
