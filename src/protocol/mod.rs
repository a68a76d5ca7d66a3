/// Types representing the bodies of fixed-size FastCGI records.
pub mod body;
mod fields;
/// An encoder and decoder for FastCGI name-value pairs.
pub mod nv;

pub use fields::*;


/// The fixed FastCGI request ID for management records.
pub const FCGI_NULL_REQUEST_ID: u16 = 0;

/// The largest payload a single FastCGI record can carry while keeping the
/// record body 8-byte aligned without padding.
pub const MAX_ALIGNED_PAYLOAD: u16 = u16::MAX & !7;


/// Error types that may occur while processing FastCGI protocol elements.
#[derive(Debug, Clone, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// The FastCGI version field specifies an unknown version identifier.
    #[error("unknown FastCGI protocol version {0}")]
    UnknownVersion(u8),
    /// The FastCGI record type field specifies an unknown record type.
    #[error("unknown FastCGI record type {0}")]
    UnknownRecordType(u8),
    /// The FastCGI response protocol status specifies an unknown status.
    #[error("unknown FastCGI protocol status {0}")]
    UnknownStatus(u8),

    /// A fixed-size record body arrived with the wrong content length.
    #[error("{rtype:?} FastCGI record has invalid length {len}, expected {expected}")]
    InvalidBodyLength {
        /// The type of the offending record.
        rtype: RecordType,
        /// The content length announced by the record header.
        len: u16,
        /// The fixed body size for this record type.
        expected: usize,
    },

    /// The input value is too large to be encoded as a FastCGI name-value
    /// length.
    #[error("name or value is too large to be encoded as a FastCGI length")]
    InvalidLength,
}


/// A FastCGI record header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RecordHeader {
    /// The FastCGI version of this record.
    pub version: Version,
    /// The type of this record, defining its payload.
    pub rtype: RecordType,
    /// The ID of the request this record belongs to.
    pub request_id: u16,
    /// The length of this record's payload.
    pub content_length: u16,
    /// The amount of padding following this record.
    pub padding_length: u8,
}

impl RecordHeader {
    /// The number of bytes in the wire format of a [`RecordHeader`].
    pub const LEN: usize = 8;

    /// Creates a new [`RecordHeader`] with [`Version::V1`] and all
    /// lengths set to 0.
    ///
    /// An empty stream record created this way marks the end of its stream.
    #[inline]
    #[must_use]
    pub fn new(rtype: RecordType, request_id: u16) -> Self {
        Self { version: Version::V1, rtype, request_id, content_length: 0, padding_length: 0 }
    }

    /// Creates a header for a record carrying `content_length` payload bytes,
    /// padded up to the next multiple of 8.
    #[inline]
    #[must_use]
    pub fn with_payload(rtype: RecordType, request_id: u16, content_length: u16) -> Self {
        let mut head = Self::new(rtype, request_id);
        head.content_length = content_length;
        // At most 7, so the cast is lossless
        #[allow(clippy::cast_possible_truncation)]
        let padding = (content_length.wrapping_neg() % 8) as u8;
        head.padding_length = padding;
        head
    }

    /// Tests whether this [`RecordHeader`] belongs to the connection rather
    /// than to any particular request.
    #[inline]
    #[must_use]
    pub fn is_management(self) -> bool {
        self.rtype.is_management() && self.request_id == FCGI_NULL_REQUEST_ID
    }

    /// Returns the number of bytes following this header on the wire.
    #[inline]
    #[must_use]
    pub fn body_len(self) -> usize {
        usize::from(self.content_length) + usize::from(self.padding_length)
    }

    /// Returns a slice of `self.padding_length` zero bytes to be used as padding.
    #[inline]
    #[must_use]
    pub fn padding_bytes(self) -> &'static [u8] {
        static PADDING: [u8; u8::MAX as usize] = [0; u8::MAX as usize];
        &PADDING[..self.padding_length.into()]
    }

    /// Parses the input bytes into a FastCGI [`RecordHeader`].
    ///
    /// # Errors
    /// Returns an error if the version or record type is unknown. The reserved
    /// trailing byte is ignored.
    pub fn from_bytes(data: [u8; Self::LEN]) -> Result<Self, Error> {
        Ok(Self {
            version: Version::try_from(data[0])?,
            rtype: RecordType::try_from(data[1])?,
            request_id: u16::from_be_bytes([data[2], data[3]]),
            content_length: u16::from_be_bytes([data[4], data[5]]),
            padding_length: data[6],
        })
    }

    /// Encodes the [`RecordHeader`] into its binary wire format.
    #[inline]
    #[must_use]
    pub fn to_bytes(self) -> [u8; Self::LEN] {
        let mut buf = [0; Self::LEN];
        buf[0] = self.version.into();
        buf[1] = self.rtype.into();
        buf[2..4].copy_from_slice(&self.request_id.to_be_bytes());
        buf[4..6].copy_from_slice(&self.content_length.to_be_bytes());
        buf[6] = self.padding_length;
        buf
    }
}


#[cfg(test)]
mod tests {
    use std::iter::repeat_with;
    use super::*;

    #[test]
    fn header_wire_format() -> Result<(), Error> {
        const STDOUT: [u8; 8] = [0x01, 0x06, 0x00, 0x01, 0x01, 0x2c, 0x04, 0x00];
        let head = RecordHeader::from_bytes(STDOUT)?;
        assert_eq!(head.version, Version::V1);
        assert_eq!(head.rtype, RecordType::Stdout);
        assert_eq!(head.request_id, 1);
        assert_eq!(head.content_length, 300);
        assert_eq!(head.padding_length, 4);
        assert_eq!(head.body_len(), 304);
        assert_eq!(head.to_bytes(), STDOUT);
        Ok(())
    }

    #[test]
    fn header_invalid() {
        const BAD_VERSION: [u8; 8] = [0x02, 0x06, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00];
        let bad_version = RecordHeader::from_bytes(BAD_VERSION);
        assert!(matches!(bad_version, Err(Error::UnknownVersion(2))));

        const BAD_RTYPE: [u8; 8] = [0x01, 0x2f, 0x00, 0x01, 0x00, 0x08, 0x00, 0x00];
        let bad_rtype = RecordHeader::from_bytes(BAD_RTYPE);
        assert!(matches!(bad_rtype, Err(Error::UnknownRecordType(0x2f))));
    }

    #[test]
    fn management_records() {
        let mut head = RecordHeader::new(RecordType::GetValuesResult, FCGI_NULL_REQUEST_ID);
        assert!(head.is_management());
        head.request_id = 1;
        assert!(!head.is_management());
        assert!(!RecordHeader::new(RecordType::Stdout, FCGI_NULL_REQUEST_ID).is_management());
    }

    #[test]
    fn payload_alignment() {
        let lens = repeat_with(|| fastrand::u16(..)).take(30);
        for len in lens.chain([0, 1, 7, 8, 9, MAX_ALIGNED_PAYLOAD, u16::MAX]) {
            let head = RecordHeader::with_payload(RecordType::Stdin, 1, len);
            assert_eq!(head.body_len() % 8, 0, "record body of {len} bytes is not 8-byte aligned");
            assert!(head.padding_length < 8);
            assert_eq!(head.padding_bytes().len(), head.padding_length.into());
            assert!(head.padding_bytes().iter().all(|&b| b == 0));
        }
        let head = RecordHeader::with_payload(RecordType::Stdin, 1, MAX_ALIGNED_PAYLOAD);
        assert_eq!(head.padding_length, 0);
    }
}
