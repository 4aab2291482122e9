//! Big-endian byte stream used by savestates.

use core::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SerialError {
    /// The stream ended `needed` bytes short.
    UnexpectedEof { needed: usize },
    BadMagic(u32),
    UnsupportedVersion(u16),
    Protocol(u32),
    /// A tag byte that names no known object or flag value.
    Tag(u8),
    Utf8,
    /// Out of range for this instance, or restored twice.
    IdUnavailable(u32),
    TrailingBytes(usize),
}

impl fmt::Display for SerialError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SerialError::UnexpectedEof { needed } => {
                write!(f, "savestate truncated ({} more bytes needed)", needed)
            }
            SerialError::BadMagic(magic) => write!(f, "not an lv2 savestate (magic {:#x})", magic),
            SerialError::UnsupportedVersion(version) => {
                write!(f, "unsupported savestate version {}", version)
            }
            SerialError::Protocol(protocol) => write!(f, "invalid sync protocol {:#x}", protocol),
            SerialError::Tag(tag) => write!(f, "unknown tag {:#x}", tag),
            SerialError::Utf8 => write!(f, "thread name is not utf-8"),
            SerialError::IdUnavailable(id) => write!(f, "id {:#x} cannot be restored", id),
            SerialError::TrailingBytes(len) => write!(f, "{} unread bytes after savestate", len),
        }
    }
}

impl std::error::Error for SerialError {}

#[derive(Default)]
pub struct SerialWriter {
    buf: Vec<u8>,
}

impl SerialWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put_u8(&mut self, value: u8) {
        self.buf.push(value);
    }

    pub fn put_bool(&mut self, value: bool) {
        self.put_u8(value as u8);
    }

    pub fn put_u16(&mut self, value: u16) {
        self.buf.extend_from_slice(&value.to_be_bytes());
    }

    pub fn put_u32(&mut self, value: u32) {
        self.buf.extend_from_slice(&value.to_be_bytes());
    }

    pub fn put_i32(&mut self, value: i32) {
        self.buf.extend_from_slice(&value.to_be_bytes());
    }

    pub fn put_u64(&mut self, value: u64) {
        self.buf.extend_from_slice(&value.to_be_bytes());
    }

    /// Length-prefixed UTF-8.
    pub fn put_str(&mut self, value: &str) {
        self.put_u32(value.len() as u32);
        self.buf.extend_from_slice(value.as_bytes());
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}

pub struct SerialReader<'a> {
    buf: &'a [u8],
}

impl<'a> SerialReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf }
    }

    fn take<const N: usize>(&mut self) -> Result<[u8; N], SerialError> {
        if self.buf.len() < N {
            return Err(SerialError::UnexpectedEof {
                needed: N - self.buf.len(),
            });
        }
        let (head, rest) = self.buf.split_at(N);
        self.buf = rest;
        let mut bytes = [0; N];
        bytes.copy_from_slice(head);
        Ok(bytes)
    }

    pub fn get_u8(&mut self) -> Result<u8, SerialError> {
        Ok(self.take::<1>()?[0])
    }

    pub fn get_bool(&mut self) -> Result<bool, SerialError> {
        match self.get_u8()? {
            0 => Ok(false),
            1 => Ok(true),
            tag => Err(SerialError::Tag(tag)),
        }
    }

    pub fn get_u16(&mut self) -> Result<u16, SerialError> {
        self.take().map(u16::from_be_bytes)
    }

    pub fn get_u32(&mut self) -> Result<u32, SerialError> {
        self.take().map(u32::from_be_bytes)
    }

    pub fn get_i32(&mut self) -> Result<i32, SerialError> {
        self.take().map(i32::from_be_bytes)
    }

    pub fn get_u64(&mut self) -> Result<u64, SerialError> {
        self.take().map(u64::from_be_bytes)
    }

    pub fn get_str(&mut self) -> Result<String, SerialError> {
        let len = self.get_u32()? as usize;
        if self.buf.len() < len {
            return Err(SerialError::UnexpectedEof {
                needed: len - self.buf.len(),
            });
        }
        let (head, rest) = self.buf.split_at(len);
        self.buf = rest;
        String::from_utf8(head.to_vec()).map_err(|_| SerialError::Utf8)
    }

    pub fn remaining(&self) -> usize {
        self.buf.len()
    }
}
