use super::Error as ProtocolError;
use super::{ProtocolStatus, RecordHeader, RecordType, RequestFlags, Role};


/// Checks that a fixed-size record body has exactly `N` bytes.
fn fixed<const N: usize>(rtype: RecordType, data: &[u8]) -> Result<[u8; N], ProtocolError> {
    data.try_into().map_err(|_| ProtocolError::InvalidBodyLength {
        rtype,
        len: u16::try_from(data.len()).unwrap_or(u16::MAX),
        expected: N,
    })
}


/// The body of a [`RecordType::BeginRequest`] FastCGI record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BeginRequest {
    /// The role of the FastCGI application in this request.
    pub role: Role,
    /// The control flags for this request.
    pub flags: RequestFlags,
}

impl BeginRequest {
    /// The number of bytes in the wire format of a [`BeginRequest`] body.
    pub const LEN: usize = 8;

    /// Encodes the [`BeginRequest`] record body into its binary wire format.
    #[must_use]
    pub fn to_bytes(self) -> [u8; Self::LEN] {
        let mut buf = [0; Self::LEN];
        buf[..2].copy_from_slice(&u16::to_be_bytes(self.role.into()));
        buf[2] = self.flags.into();
        buf
    }

    /// Encodes a complete `BeginRequest` record, header included, for the
    /// given request ID.
    #[must_use]
    pub fn to_record(self, request_id: u16) -> [u8; RecordHeader::LEN + Self::LEN] {
        #[allow(clippy::cast_possible_truncation)]
        let head = RecordHeader::with_payload(
            RecordType::BeginRequest, request_id, Self::LEN as u16,
        );
        let mut buf = [0; RecordHeader::LEN + Self::LEN];
        buf[..RecordHeader::LEN].copy_from_slice(&head.to_bytes());
        buf[RecordHeader::LEN..].copy_from_slice(&self.to_bytes());
        buf
    }
}


/// The body of a [`RecordType::EndRequest`] FastCGI record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EndRequest {
    /// The application's exit status, as would be set via exit(3) in
    /// regular CGI.
    pub app_status: u32,
    /// The protocol status code for this response.
    pub protocol_status: ProtocolStatus,
}

impl EndRequest {
    /// The number of bytes in the wire format of an [`EndRequest`] body.
    pub const LEN: usize = 8;

    /// Parses a record payload into a FastCGI [`EndRequest`] body.
    ///
    /// # Errors
    /// Returns an error if the payload does not have the fixed body size or
    /// the protocol status is unknown.
    pub fn from_bytes(data: &[u8]) -> Result<Self, ProtocolError> {
        let data: [u8; Self::LEN] = fixed(RecordType::EndRequest, data)?;
        Ok(Self {
            app_status: u32::from_be_bytes([data[0], data[1], data[2], data[3]]),
            protocol_status: ProtocolStatus::try_from(data[4])?,
        })
    }
}


/// The body of a [`RecordType::Unknown`] FastCGI record.
///
/// Applications answer management records they do not understand with this
/// record type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnknownType {
    /// The type of the unknown record.
    pub rtype: u8,
}

impl UnknownType {
    /// The number of bytes in the wire format of an [`UnknownType`] body.
    pub const LEN: usize = 8;

    /// Parses a record payload into a FastCGI [`UnknownType`] body.
    ///
    /// # Errors
    /// Returns an error if the payload does not have the fixed body size.
    pub fn from_bytes(data: &[u8]) -> Result<Self, ProtocolError> {
        let data: [u8; Self::LEN] = fixed(RecordType::Unknown, data)?;
        Ok(Self { rtype: data[0] })
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn begin_request_record() {
        let begin = BeginRequest { role: Role::Responder, flags: RequestFlags::empty() };
        assert_eq!(
            begin.to_record(1),
            [1, 1, 0, 1, 0, 8, 0, 0, /* body */ 0, 1, 0, 0, 0, 0, 0, 0],
        );

        let begin = BeginRequest { role: Role::Filter, flags: RequestFlags::KeepConn };
        assert_eq!(begin.to_bytes(), [0, 3, 1, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn end_request_body() -> Result<(), ProtocolError> {
        let end = EndRequest::from_bytes(&[0x00, 0x00, 0x01, 0x02, 2, 0, 0, 0])?;
        assert_eq!(end.app_status, 0x0102);
        assert_eq!(end.protocol_status, ProtocolStatus::Overloaded);

        let short = EndRequest::from_bytes(&[0; 5]);
        assert!(matches!(
            short,
            Err(ProtocolError::InvalidBodyLength { rtype: RecordType::EndRequest, len: 5, expected: 8 })
        ));
        let bad_status = EndRequest::from_bytes(&[0, 0, 0, 0, 9, 0, 0, 0]);
        assert!(matches!(bad_status, Err(ProtocolError::UnknownStatus(9))));
        Ok(())
    }

    #[test]
    fn unknown_type_body() -> Result<(), ProtocolError> {
        assert_eq!(UnknownType::from_bytes(&[42, 0, 0, 0, 0, 0, 0, 0])?.rtype, 42);
        assert!(UnknownType::from_bytes(&[]).is_err());
        Ok(())
    }
}
