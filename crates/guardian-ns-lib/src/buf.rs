use std::borrow::Cow;
use std::fmt::Write as _;
use std::ops::Deref;

use anyhow::Context;

/// Max number of compression pointers followed while reading a single name
const MAX_QNAME_JUMPS: usize = 32;
/// RFC1035: labels are limited to 63 octets
const MAX_LABEL_LENGTH: usize = 0x3f;
/// RFC1035: names are limited to 255 octets on the wire
const MAX_QNAME_LENGTH: usize = 255;

pub trait FromBuf: Sized {
    fn from_buf(buf: &mut ByteBuf) -> anyhow::Result<Self>;
}

pub trait EncodeToBuf {
    /// Returns the number of written bytes
    fn encode_to_buf(&self, buf: &mut ByteBuf) -> anyhow::Result<usize>;
}

/// A byte buffer with a read cursor.
///
/// Reads advance `pos`, writes always append to the end of the buffer.
pub struct ByteBuf<'a> {
    buf: Cow<'a, [u8]>,
    pos: usize,
}

impl Deref for ByteBuf<'_> {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        self.buf.as_ref()
    }
}

impl AsRef<[u8]> for ByteBuf<'_> {
    fn as_ref(&self) -> &[u8] {
        &self.buf
    }
}

impl<'a> ByteBuf<'a> {
    pub fn new(src: &'a impl AsRef<[u8]>) -> ByteBuf<'a> {
        ByteBuf {
            buf: Cow::Borrowed(src.as_ref()),
            pos: 0,
        }
    }

    pub fn new_empty(capacity: Option<usize>) -> ByteBuf<'static> {
        ByteBuf {
            buf: Cow::Owned(Vec::with_capacity(capacity.unwrap_or(512))),
            pos: 0,
        }
    }

    pub fn into_inner(self) -> Cow<'a, [u8]> {
        self.buf
    }

    pub fn pos(&self) -> usize {
        self.pos
    }

    pub fn read_u8(&mut self) -> anyhow::Result<u8> {
        self.read_bytes(1).map(|bytes| bytes[0])
    }

    pub fn read_u16(&mut self) -> anyhow::Result<u16> {
        self.read_bytes(2)
            .map(|bytes| u16::from_be_bytes([bytes[0], bytes[1]]))
    }

    pub fn read_u32(&mut self) -> anyhow::Result<u32> {
        self.read_bytes(4)
            .map(|bytes| u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    pub fn read_bytes(&mut self, n: usize) -> anyhow::Result<&[u8]> {
        self.ensure_length(n, None)?;
        let pos = self.pos;
        self.pos += n;
        Ok(&self.buf[pos..pos + n])
    }

    pub fn write_u8(&mut self, data: u8) {
        self.buf.to_mut().push(data);
    }

    pub fn write_u16(&mut self, data: u16) {
        self.write_bytes(&data.to_be_bytes());
    }

    pub fn write_u32(&mut self, data: u32) {
        self.write_bytes(&data.to_be_bytes());
    }

    pub fn write_bytes(&mut self, data: &[u8]) {
        self.buf.to_mut().extend_from_slice(data);
    }

    /// Overwrites two bytes that were already written at `pos`
    pub fn set_u16(&mut self, pos: usize, data: u16) -> anyhow::Result<()> {
        self.ensure_length(2, Some(pos))
            .context("can't overwrite bytes past the end of the buffer")?;
        self.buf.to_mut()[pos..pos + 2].copy_from_slice(&data.to_be_bytes());
        Ok(())
    }

    /// Reads a (possibly compressed) name. The result has no trailing dot, the root is `""`.
    ///
    /// Label bytes that can't appear verbatim in a dotted name are escaped the way zone files do
    /// it: `\.` and `\\` for dots and backslashes, `\DDD` for anything outside printable ASCII.
    pub fn read_qname(&mut self) -> anyhow::Result<Cow<'static, str>> {
        let mut pos = self.pos;
        let mut jumps = 0;
        let mut wire_length = 0;
        let mut qname = String::new();
        loop {
            self.ensure_length(1, Some(pos))
                .context("malformed packet: expected QNAME label length")?;
            let label_length = self.buf[pos] as usize;

            if label_length & 0xC0 == 0xC0 {
                self.ensure_length(2, Some(pos))
                    .context("malformed packet: expected second jump ptr byte in QNAME")?;
                if jumps == 0 {
                    // Continue parsing right after the first pointer
                    self.pos = pos + 2;
                }
                jumps += 1;
                if jumps > MAX_QNAME_JUMPS {
                    anyhow::bail!("malformed packet: too many jumps in QNAME");
                }
                pos = ((label_length & 0x3f) << 8) | self.buf[pos + 1] as usize;
                continue;
            }

            if label_length > MAX_LABEL_LENGTH {
                anyhow::bail!("malformed packet: unsupported label type at byte {}", pos);
            }

            pos += 1;
            wire_length += 1 + label_length;
            if wire_length > MAX_QNAME_LENGTH {
                anyhow::bail!("malformed packet: QNAME is longer than {} bytes", MAX_QNAME_LENGTH);
            }

            if label_length == 0 {
                if jumps == 0 {
                    self.pos = pos;
                }
                break;
            }

            let label = self.buf.get(pos..pos + label_length).with_context(|| {
                format!(
                    "malformed packet: expected label of length {} at byte {}",
                    label_length, pos
                )
            })?;
            if !qname.is_empty() {
                qname.push('.');
            }
            push_escaped_label(&mut qname, label);
            pos += label_length;
        }

        Ok(qname.into())
    }

    /// Writes an uncompressed name. A trailing dot is accepted and ignored, escapes produced by
    /// [`ByteBuf::read_qname`] are turned back into the original label bytes.
    pub fn write_qname(&mut self, qname: &str) -> anyhow::Result<usize> {
        let mut written = 0;
        for label in split_labels(qname)? {
            if label.len() > MAX_LABEL_LENGTH {
                anyhow::bail!("label is too long ({}): {}", label.len(), String::from_utf8_lossy(&label));
            }
            self.write_u8(label.len() as u8);
            self.write_bytes(&label);
            written += 1 + label.len();
        }
        self.write_u8(0);
        written += 1;

        if written > MAX_QNAME_LENGTH {
            anyhow::bail!("QNAME is too long ({}): {}", written, qname);
        }

        Ok(written)
    }

    fn ensure_length(&self, n: usize, pos: Option<usize>) -> anyhow::Result<()> {
        if self.buf.len() < pos.unwrap_or(self.pos) + n {
            anyhow::bail!("underlying buffer is too small")
        }
        Ok(())
    }
}

fn push_escaped_label(qname: &mut String, label: &[u8]) {
    for &byte in label {
        match byte {
            b'.' | b'\\' => {
                qname.push('\\');
                qname.push(byte as char);
            }
            0x21..=0x7e => qname.push(byte as char),
            _ => {
                let _ = write!(qname, "\\{:03}", byte);
            }
        }
    }
}

/// Splits a dotted name into raw labels, resolving escapes. Empty labels are skipped.
fn split_labels(qname: &str) -> anyhow::Result<Vec<Vec<u8>>> {
    let mut labels = Vec::new();
    let mut label = Vec::new();
    let mut bytes = qname.bytes();
    while let Some(byte) = bytes.next() {
        match byte {
            b'.' => {
                if !label.is_empty() {
                    labels.push(std::mem::take(&mut label));
                }
            }
            b'\\' => {
                let escaped = bytes.next().with_context(|| format!("dangling escape in {}", qname))?;
                if !escaped.is_ascii_digit() {
                    label.push(escaped);
                    continue;
                }

                let mut value = (escaped - b'0') as u32;
                for _ in 0..2 {
                    let digit = bytes
                        .next()
                        .filter(u8::is_ascii_digit)
                        .with_context(|| format!("escape must have three digits in {}", qname))?;
                    value = value * 10 + (digit - b'0') as u32;
                }
                let value = u8::try_from(value).with_context(|| format!("escape out of range in {}", qname))?;
                label.push(value);
            }
            _ => label.push(byte),
        }
    }
    if !label.is_empty() {
        labels.push(label);
    }

    Ok(labels)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_empty_qname() {
        let qname = &[0x0];
        let mut buf = ByteBuf::new(qname);
        let result = buf.read_qname().expect("shouldn't have failed");
        assert_eq!(result, "");
        assert_eq!(buf.pos(), 1);
    }

    #[test]
    fn read_valid_qname() {
        let qname = &[0x6, 0x67, 0x6f, 0x6f, 0x67, 0x6c, 0x65, 0x3, 0x63, 0x6f, 0x6d, 0x0];
        let mut buf = ByteBuf::new(qname);
        let result = buf.read_qname().expect("shouldn't have failed");
        assert_eq!(result, "google.com");
    }

    #[test]
    fn read_compressed_qname() {
        // 'google.com' followed by 'api' + pointer to offset 0
        let data = &[
            0x6, 0x67, 0x6f, 0x6f, 0x67, 0x6c, 0x65, 0x3, 0x63, 0x6f, 0x6d, 0x0, 0x3, 0x61, 0x70, 0x69, 0xc0, 0x0,
            0xff,
        ];
        let mut buf = ByteBuf::new(data);
        buf.read_qname().expect("shouldn't have failed");
        let result = buf.read_qname().expect("shouldn't have failed");
        assert_eq!(result, "api.google.com");
        // Cursor stops right after the pointer
        assert_eq!(buf.read_u8().expect("shouldn't have failed"), 0xff);
    }

    #[test]
    fn read_qname_pointer_loop() {
        let data = &[0xc0, 0x0];
        let mut buf = ByteBuf::new(data);
        let err = buf.read_qname().unwrap_err();
        assert!(err.to_string().contains("too many jumps"));
    }

    #[test]
    #[should_panic(expected = "malformed packet: expected label of length 1 at byte 4")]
    fn read_invalid_qname() {
        let qname = &[0x2, 0x67, 0x6f, 0x1];
        let mut buf = ByteBuf::new(qname);
        buf.read_qname().unwrap();
    }

    #[test]
    #[should_panic(expected = "expected QNAME label length")]
    fn read_qname_without_zero_byte() {
        let qname = &[0x2, 0x67, 0x6f];
        let mut buf = ByteBuf::new(qname);
        buf.read_qname().unwrap();
    }

    #[test]
    fn write_qname_ignores_trailing_dot() {
        let mut buf = ByteBuf::new_empty(None);
        let written = buf.write_qname("google.com.").expect("shouldn't have failed");
        assert_eq!(written, 12);
        assert_eq!(
            &*buf,
            &[0x6, 0x67, 0x6f, 0x6f, 0x67, 0x6c, 0x65, 0x3, 0x63, 0x6f, 0x6d, 0x0]
        )
    }

    #[test]
    fn dot_inside_label_is_escaped() {
        // A single 11 byte label
        let data = b"\x0bexample.com\x00";
        let mut buf = ByteBuf::new(data);
        let qname = buf.read_qname().expect("shouldn't have failed");
        assert_eq!(qname, "example\\.com");

        let mut out = ByteBuf::new_empty(None);
        out.write_qname(&qname).expect("shouldn't have failed");
        assert_eq!(&*out, data);
    }

    #[test]
    fn non_utf8_label_is_escaped() {
        let data = b"\x02\xff\xfe\x04a b\\\x03com\x00";
        let mut buf = ByteBuf::new(data);
        let qname = buf.read_qname().expect("shouldn't have failed");
        assert_eq!(qname, "\\255\\254.a\\032b\\\\.com");

        let mut out = ByteBuf::new_empty(None);
        out.write_qname(&qname).expect("shouldn't have failed");
        assert_eq!(&*out, data);
    }

    #[test]
    fn write_qname_rejects_bad_escapes() {
        for qname in ["example\\", "a\\25.com", "a\\256.com", "a\\2x5.com"] {
            let mut buf = ByteBuf::new_empty(None);
            assert!(buf.write_qname(qname).is_err(), "{}", qname);
        }
    }

    #[test]
    fn write_root_qname() {
        let mut buf = ByteBuf::new_empty(None);
        buf.write_qname(".").expect("shouldn't have failed");
        assert_eq!(&*buf, &[0x0])
    }

    #[test]
    #[should_panic(
        expected = "label is too long (64): very_very_very_very_very_very_long_label_that_exceeds_max_length"
    )]
    fn write_qname_with_long_label() {
        let qname = "very_very_very_very_very_very_long_label_that_exceeds_max_length.com";
        let mut buf = ByteBuf::new_empty(None);
        buf.write_qname(qname).unwrap();
    }
}
