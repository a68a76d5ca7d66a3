use super::Error as ProtocolError;


/// Lengths above this value need the 4-byte encoding.
const SHORT_MAX: usize = 0x7f;
/// The bit marking a 4-byte length.
const LONG_BIT: u8 = 0x80;
/// The largest length FastCGI can encode (31 bits).
const LONG_MAX: usize = (1 << 31) - 1;


/// Appends one name or value length in FastCGI's 1-or-4 byte format.
#[allow(clippy::cast_possible_truncation)]
fn write_len(len: usize, buf: &mut Vec<u8>) -> Result<usize, ProtocolError> {
    if len <= SHORT_MAX {
        buf.push(len as u8);
        return Ok(1);
    }
    if len > LONG_MAX {
        return Err(ProtocolError::InvalidLength);
    }

    let mut e = (len as u32).to_be_bytes();
    e[0] |= LONG_BIT;
    buf.extend_from_slice(&e);
    Ok(e.len())
}

/// Reads one length from the front of `data`, advancing it.
#[cfg(test)]
fn read_len(data: &mut &[u8]) -> Option<usize> {
    let (&first, rest) = data.split_first()?;
    if first & LONG_BIT == 0 {
        *data = rest;
        return Some(first.into());
    }

    let (long, rest) = (rest.get(..3)?, &rest[3..]);
    let len = u32::from_be_bytes([first & !LONG_BIT, long[0], long[1], long[2]]);
    *data = rest;
    usize::try_from(len).ok()
}


/// Appends an encoded name-value pair to `buf`.
///
/// Returns the number of bytes appended. Nothing is appended on error.
///
/// # Errors
/// Returns [`ProtocolError::InvalidLength`] if the name or value exceeds
/// FastCGI's 31-bit length limit.
pub fn write((name, value): (&[u8], &[u8]), buf: &mut Vec<u8>) -> Result<usize, ProtocolError> {
    if name.len() > LONG_MAX || value.len() > LONG_MAX {
        return Err(ProtocolError::InvalidLength);
    }
    let mut written = write_len(name.len(), buf)?;
    written += write_len(value.len(), buf)?;
    buf.extend_from_slice(name);
    buf.extend_from_slice(value);
    Ok(written + name.len() + value.len())
}


/// An iterator decoding complete name-value pairs from its input, used to
/// check what [`write`] produced.
///
/// Iteration stops at the first incomplete pair. Any bytes left over are
/// available through [`NVIter::into_inner`].
#[cfg(test)]
#[derive(Debug, Clone)]
pub struct NVIter<'a> {
    data: &'a [u8],
}

#[cfg(test)]
impl<'a> NVIter<'a> {
    /// Creates a new [`NVIter`] over the referenced input bytes.
    #[inline]
    #[must_use]
    pub fn new(data: &'a [u8]) -> Self {
        Self { data }
    }

    /// Extracts the remaining input bytes from the iterator.
    #[inline]
    #[must_use]
    pub fn into_inner(self) -> &'a [u8] {
        self.data
    }
}

#[cfg(test)]
impl<'a> Iterator for NVIter<'a> {
    type Item = (&'a [u8], &'a [u8]);

    fn next(&mut self) -> Option<Self::Item> {
        let mut cur = self.data;
        let name_len = read_len(&mut cur)?;
        let val_len = read_len(&mut cur)?;
        let total_len = name_len.checked_add(val_len)?;

        let pair = cur.get(..total_len)?;
        self.data = &cur[total_len..];
        Some(pair.split_at(name_len))
    }
}

#[cfg(test)]
impl std::iter::FusedIterator for NVIter<'_> {}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_and_long_lengths() -> Result<(), ProtocolError> {
        let mut buf = Vec::new();
        let long_val = vec![b'x'; 300];
        let written = write((b"SCRIPT_NAME".as_slice(), b"/index.php".as_slice()), &mut buf)?;
        assert_eq!(written, 2 + 11 + 10);
        assert_eq!(&buf[..2], &[11, 10]);

        buf.clear();
        let written = write((b"HTTP_COOKIE".as_slice(), long_val.as_slice()), &mut buf)?;
        assert_eq!(written, 1 + 4 + 11 + 300);
        assert_eq!(&buf[..5], &[11, 0x80, 0x00, 0x01, 0x2c]);
        Ok(())
    }

    #[test]
    fn decode_pairs() -> Result<(), ProtocolError> {
        let sizes = std::iter::repeat_with(|| fastrand::usize(..1000)).take(20);
        let pairs: Vec<(Vec<u8>, Vec<u8>)> = sizes
            .enumerate()
            .map(|(i, len)| (format!("VAR_{i}").into_bytes(), vec![b'v'; len]))
            .collect();

        let mut buf = Vec::new();
        for (n, v) in &pairs {
            write((n.as_slice(), v.as_slice()), &mut buf)?;
        }
        // A truncated trailing pair is left in the iterator
        buf.extend([0x05, 0x03, b'A']);

        let mut it = NVIter::new(&buf);
        for (n, v) in &pairs {
            assert_eq!(it.next(), Some((n.as_slice(), v.as_slice())));
        }
        assert_eq!(it.next(), None);
        assert_eq!(it.into_inner(), &[0x05, 0x03, b'A']);
        Ok(())
    }
}
