//! Byte sources and sinks: `-`/path selection and discovery-pass replay.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Chain, Read, Write};
use std::path::Path;

use bytes::buf::Reader;
use bytes::{Buf, Bytes, BytesMut};

/// `None` or `-` selects stdin
pub fn open_input(path: Option<&Path>) -> io::Result<Box<dyn Read>> {
    match path {
        Some(p) if p != Path::new("-") => Ok(Box::new(BufReader::new(File::open(p)?))),
        _ => Ok(Box::new(BufReader::new(io::stdin().lock()))),
    }
}

/// `None` or `-` selects stdout
pub fn open_output(path: Option<&Path>) -> io::Result<Box<dyn Write>> {
    match path {
        Some(p) if p != Path::new("-") => Ok(Box::new(BufWriter::new(File::create(p)?))),
        _ => Ok(Box::new(BufWriter::new(io::stdout().lock()))),
    }
}

/// Keeps a copy of every byte read so a second pass can start over from the
/// beginning without seeking. Memory grows with the distance read.
pub struct Recorder<R> {
    inner: R,
    recorded: BytesMut,
}

impl<R: Read> Recorder<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            recorded: BytesMut::new(),
        }
    }

    pub fn recorded_len(&self) -> usize {
        self.recorded.len()
    }

    /// Recorded bytes followed by whatever the live source still holds
    pub fn into_replay(self) -> Chain<Reader<Bytes>, R> {
        self.recorded.freeze().reader().chain(self.inner)
    }
}

impl<R: Read> Read for Recorder<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.recorded.extend_from_slice(&buf[..n]);
        Ok(n)
    }
}
