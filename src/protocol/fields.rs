use std::fmt;

use super::Error as ProtocolError;


/// A validated FastCGI version number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, strum::FromRepr)]
pub enum Version {
    /// FastCGI Version 1
    V1 = 1,
}

impl TryFrom<u8> for Version {
    type Error = ProtocolError;

    #[inline]
    fn try_from(v: u8) -> Result<Self, Self::Error> {
        Self::from_repr(v.into()).ok_or(ProtocolError::UnknownVersion(v))
    }
}

impl From<Version> for u8 {
    #[inline]
    fn from(v: Version) -> Self {
        v as Self
    }
}


/// The role a FastCGI application plays in a request.
///
/// This gateway drives [`Role::Responder`] exchanges.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Role {
    Responder = 1,
    Authorizer = 2,
    Filter = 3,
}

impl From<Role> for u16 {
    #[inline]
    fn from(v: Role) -> Self {
        v as Self
    }
}


bitflags::bitflags! {
    /// A validated set of FastCGI request flags.
    #[derive(Default, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct RequestFlags: u8 {
        /// Ask the application to keep the connection open after the request.
        const KeepConn = 1;
    }
}


impl From<RequestFlags> for u8 {
    #[inline]
    fn from(v: RequestFlags) -> Self {
        v.bits()
    }
}

impl fmt::Debug for RequestFlags {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        const UNUSED_BITS: u32 = RequestFlags::all().bits().leading_zeros();
        const WIDTH: usize = 2 /* 0b */ + 8 /* bits */ - (UNUSED_BITS as usize);
        write!(f, "RequestFlags({:#0WIDTH$b})", self.bits())
    }
}


/// The protocol-level outcome of a request, as reported by the application
/// in its `EndRequest` record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, strum::FromRepr)]
#[cfg_attr(test, derive(strum::EnumIter))]
pub enum ProtocolStatus {
    /// The request completed normally.
    RequestComplete = 0,
    /// The application refused a multiplexed request on this connection.
    CantMpxConn = 1,
    /// The application ran out of some resource, such as database connections.
    Overloaded = 2,
    /// The application does not implement the requested role.
    UnknownRole = 3,
}

impl TryFrom<u8> for ProtocolStatus {
    type Error = ProtocolError;

    #[inline]
    fn try_from(v: u8) -> Result<Self, Self::Error> {
        Self::from_repr(v.into()).ok_or(ProtocolError::UnknownStatus(v))
    }
}

impl From<ProtocolStatus> for u8 {
    #[inline]
    fn from(v: ProtocolStatus) -> Self {
        v as Self
    }
}

impl fmt::Display for ProtocolStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            Self::RequestComplete => "request complete",
            Self::CantMpxConn => "cannot multiplex connection",
            Self::Overloaded => "application overloaded",
            Self::UnknownRole => "unknown role",
        })
    }
}


/// A validated FastCGI record type.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, strum::FromRepr)]
#[cfg_attr(test, derive(strum::EnumIter))]
pub enum RecordType {
    BeginRequest = 1,
    AbortRequest = 2,
    EndRequest = 3,
    Params = 4,
    Stdin = 5,
    Stdout = 6,
    Stderr = 7,
    Data = 8,
    GetValues = 9,
    GetValuesResult = 10,
    Unknown = 11,
}

impl TryFrom<u8> for RecordType {
    type Error = ProtocolError;

    #[inline]
    fn try_from(v: u8) -> Result<Self, Self::Error> {
        Self::from_repr(v.into()).ok_or(ProtocolError::UnknownRecordType(v))
    }
}

impl From<RecordType> for u8 {
    #[inline]
    fn from(v: RecordType) -> Self {
        v as Self
    }
}

impl RecordType {
    /// Tests whether this [`RecordType`] represents a management record.
    #[inline]
    #[must_use]
    pub fn is_management(self) -> bool {
        use RecordType::*;
        matches!(self, GetValues | GetValuesResult | Unknown)
    }
}
