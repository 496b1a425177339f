//! Per-format handlers and sessions.

use std::io::{self, Read};

pub mod compressed;
pub mod tar;
#[cfg(feature = "sevenz")]
pub mod sevenz;
#[cfg(feature = "zip")]
pub mod zip;

/// Fill `buf` as far as the reader allows; returns the byte count.
pub(crate) fn read_up_to<R: Read + ?Sized>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
