//! Binary model format primitives.
//!
//! Every persisted object starts with a header: an 8-byte ASCII signature
//! followed by a version triple (`written`, `readable`, `we_can_read_back`),
//! all little-endian. A loader accepts a payload when
//!
//! - the signature matches,
//! - the payload's `readable` version is not newer than what the loader writes,
//! - the payload's `written` version is not older than what the loader can read back.
//!
//! Nested sub-models (the kernel sampler inside each column block) carry their
//! own header, so adding a new sampler means a new signature rather than a
//! silent extension of an existing one.

use std::io::{Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::error::{Result, RffError};

/// Length of a model signature in bytes.
pub const SIGNATURE_LEN: usize = 8;

/// Upper bound on persisted string lengths, guards against corrupt lengths.
const MAX_STRING_LEN: usize = 1 << 20;

/// Signature and version triple identifying a persisted object type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VersionInfo {
    /// Eight ASCII bytes, e.g. `b"RFF FUNC"`.
    pub signature: [u8; SIGNATURE_LEN],
    /// Version of the format this code writes.
    pub written: u32,
    /// Oldest loader version able to read what this code writes.
    pub readable: u32,
    /// Oldest written version this code can still read.
    pub we_can_read_back: u32,
}

impl VersionInfo {
    /// Create a version descriptor.
    pub const fn new(
        signature: &[u8; SIGNATURE_LEN],
        written: u32,
        readable: u32,
        we_can_read_back: u32,
    ) -> Self {
        Self {
            signature: *signature,
            written,
            readable,
            we_can_read_back,
        }
    }

    /// Signature rendered for error messages.
    pub fn name(&self) -> String {
        String::from_utf8_lossy(&self.signature).into_owned()
    }

    /// Write the signature and version triple.
    pub fn write_header<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(&self.signature)?;
        writer.write_u32::<LittleEndian>(self.written)?;
        writer.write_u32::<LittleEndian>(self.readable)?;
        writer.write_u32::<LittleEndian>(self.we_can_read_back)?;
        Ok(())
    }

    /// Read a header and check it against `self`.
    pub fn read_header<R: Read>(&self, reader: &mut R) -> Result<()> {
        let signature = read_signature(reader)?;
        if signature != self.signature {
            return Err(RffError::decode(format!(
                "signature mismatch: expected '{}', found '{}'",
                self.name(),
                String::from_utf8_lossy(&signature)
            )));
        }
        self.read_versions(reader)
    }

    /// Read the version triple following an already-consumed signature.
    pub fn read_versions<R: Read>(&self, reader: &mut R) -> Result<()> {
        let written = reader.read_u32::<LittleEndian>()?;
        let readable = reader.read_u32::<LittleEndian>()?;
        let _we_can_read_back = reader.read_u32::<LittleEndian>()?;

        if readable > written {
            return Err(RffError::decode(format!(
                "'{}' header is inconsistent: readable version {:#010x} exceeds written version {:#010x}",
                self.name(),
                readable,
                written
            )));
        }
        if readable > self.written {
            return Err(RffError::decode(format!(
                "'{}' payload requires loader version {:#010x}, this loader is {:#010x}",
                self.name(),
                readable,
                self.written
            )));
        }
        if written < self.we_can_read_back {
            return Err(RffError::decode(format!(
                "'{}' payload version {:#010x} is older than the oldest supported {:#010x}",
                self.name(),
                written,
                self.we_can_read_back
            )));
        }
        Ok(())
    }
}

/// Read a raw signature.
pub fn read_signature<R: Read>(reader: &mut R) -> Result<[u8; SIGNATURE_LEN]> {
    let mut signature = [0u8; SIGNATURE_LEN];
    reader.read_exact(&mut signature)?;
    Ok(signature)
}

/// Write a dimension or length as `int32`.
pub fn write_dim<W: Write>(writer: &mut W, name: &str, dim: usize) -> Result<()> {
    let value = i32::try_from(dim)
        .map_err(|_| RffError::invalid_argument(name, dim, "does not fit in an int32"))?;
    writer.write_i32::<LittleEndian>(value)?;
    Ok(())
}

/// Read an `int32` dimension that must be strictly positive.
pub fn read_dim<R: Read>(reader: &mut R, name: &str) -> Result<usize> {
    let value = reader.read_i32::<LittleEndian>()?;
    if value <= 0 {
        return Err(RffError::decode(format!(
            "{} must be positive, found {}",
            name, value
        )));
    }
    Ok(value as usize)
}

/// Write a bool as a single byte.
pub fn write_bool<W: Write>(writer: &mut W, value: bool) -> Result<()> {
    writer.write_u8(u8::from(value))?;
    Ok(())
}

/// Read a single-byte bool; only 0 and 1 are valid.
pub fn read_bool<R: Read>(reader: &mut R) -> Result<bool> {
    match reader.read_u8()? {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(RffError::decode(format!("invalid bool byte {:#04x}", other))),
    }
}

/// Write an `int32` length-prefixed UTF-8 string.
pub fn write_string<W: Write>(writer: &mut W, value: &str) -> Result<()> {
    write_dim(writer, "string length", value.len())?;
    writer.write_all(value.as_bytes())?;
    Ok(())
}

/// Read a string written by [`write_string`].
pub fn read_string<R: Read>(reader: &mut R) -> Result<String> {
    let len = reader.read_i32::<LittleEndian>()?;
    if len < 0 || len as usize > MAX_STRING_LEN {
        return Err(RffError::decode(format!("invalid string length {}", len)));
    }
    let mut bytes = vec![0u8; len as usize];
    reader.read_exact(&mut bytes)?;
    String::from_utf8(bytes).map_err(|e| RffError::decode(format!("invalid UTF-8 string: {}", e)))
}

/// Write `sizeof(float)`; readers reject anything but 4.
pub fn write_float_size<W: Write>(writer: &mut W) -> Result<()> {
    writer.write_i32::<LittleEndian>(std::mem::size_of::<f32>() as i32)?;
    Ok(())
}

/// Check the `sizeof(float)` marker.
pub fn read_float_size<R: Read>(reader: &mut R) -> Result<()> {
    let size = reader.read_i32::<LittleEndian>()?;
    if size != std::mem::size_of::<f32>() as i32 {
        return Err(RffError::decode(format!(
            "float size mismatch: expected {}, found {}",
            std::mem::size_of::<f32>(),
            size
        )));
    }
    Ok(())
}
