#[cfg(test)]
pub(crate) mod test_utils;

mod buf;
mod dns_header;
mod question;
mod resource_record;

pub use buf::{ByteBuf, EncodeToBuf, FromBuf};
pub use dns_header::{DnsHeader, QueryOpcode, ResponseCode, DNS_HEADER_SIZE};
pub use question::{QueryType, Question};
pub use resource_record::{ResourceData, ResourceRecord};

use anyhow::Context;

/// The Internet class
pub const IN_CLASS: u16 = 1;

#[derive(Debug, PartialEq, Eq, Default, Clone)]
pub struct DnsPacket<'a> {
    pub header: DnsHeader,
    pub questions: Vec<Question<'a>>,
    pub answers: Vec<ResourceRecord<'a>>,
    pub authorities: Vec<ResourceRecord<'a>>,
    pub additionals: Vec<ResourceRecord<'a>>,
}

impl DnsPacket<'_> {
    pub fn new() -> Self {
        DnsPacket::default()
    }

    /// Encodes the packet into a fresh buffer
    pub fn encode(&self) -> anyhow::Result<Vec<u8>> {
        let mut buf = ByteBuf::new_empty(None);
        self.encode_to_buf(&mut buf)?;
        Ok(buf.into_inner().into_owned())
    }
}

impl FromBuf for DnsPacket<'_> {
    fn from_buf(buf: &mut ByteBuf<'_>) -> anyhow::Result<Self> {
        let header = DnsHeader::from_buf(buf).context("header parsing error")?;

        let mut questions = Vec::with_capacity(header.question_count as usize);
        for idx in 0..header.question_count {
            let question = Question::from_buf(buf).with_context(|| format!("question parsing error at idx {}", idx))?;
            questions.push(question);
        }

        let mut sections: [Vec<ResourceRecord>; 3] = Default::default();
        let counts = [
            ("answer", header.answer_rr_count),
            ("authority", header.authority_rr_count),
            ("additional", header.additional_rr_count),
        ];
        for (section, (kind, count)) in sections.iter_mut().zip(counts) {
            section.reserve(count as usize);
            for idx in 0..count {
                let rr = ResourceRecord::from_buf(buf)
                    .with_context(|| format!("{} RR parsing error at idx {}", kind, idx))?;
                section.push(rr);
            }
        }
        let [answers, authorities, additionals] = sections;

        Ok(DnsPacket {
            header,
            questions,
            answers,
            authorities,
            additionals,
        })
    }
}

impl EncodeToBuf for DnsPacket<'_> {
    /// Section counts in the header are taken from the section lengths, not from `self.header`
    fn encode_to_buf(&self, buf: &mut ByteBuf) -> anyhow::Result<usize> {
        let count = |len: usize, section: &str| {
            u16::try_from(len).with_context(|| format!("too many entries in the {} section", section))
        };
        let header = DnsHeader {
            question_count: count(self.questions.len(), "question")?,
            answer_rr_count: count(self.answers.len(), "answer")?,
            authority_rr_count: count(self.authorities.len(), "authority")?,
            additional_rr_count: count(self.additionals.len(), "additional")?,
            ..self.header.clone()
        };

        let mut encoded_size = header.encode_to_buf(buf).context("writing header")?;

        for (idx, question) in self.questions.iter().enumerate() {
            encoded_size += question
                .encode_to_buf(buf)
                .with_context(|| format!("writing question at idx {}", idx))?;
        }

        let sections = [
            ("answer", &self.answers),
            ("authority", &self.authorities),
            ("additional", &self.additionals),
        ];
        for (kind, section) in sections {
            for (idx, rr) in section.iter().enumerate() {
                encoded_size += rr
                    .encode_to_buf(buf)
                    .with_context(|| format!("writing {} RR at idx {}", kind, idx))?;
            }
        }

        Ok(encoded_size)
    }
}
