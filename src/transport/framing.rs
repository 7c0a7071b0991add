//! Frame codecs for the byte stream.
//!
//! Two framings are supported:
//!
//! - [`Framing::Lines`]: one JSON document per `\n`-terminated line
//! - [`Framing::LengthPrefixed`]: a 4-byte little-endian length, then that many bytes
//!
//! Frames larger than the configured limit are not buffered. Their bytes are
//! discarded as they arrive and the reader reports a [`Frame::Oversize`] so
//! the caller can answer with an error and move on to the next frame.

use std::io::{self, BufRead, Write};

/// How messages are delimited on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum Framing {
    /// One JSON document per line
    #[default]
    #[value(alias = "ndjson")]
    Lines,
    /// 4-byte little-endian length, then the body
    #[value(alias = "lp")]
    LengthPrefixed,
}

/// One unit read off the stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// A complete frame body, delimiter and header removed
    Message(Vec<u8>),
    /// A frame that exceeded the size limit; its body was discarded
    Oversize { len: usize },
}

/// Accumulates length-prefixed bytes until whole frames can be popped.
///
/// Bytes may arrive in any fragmentation: part of a header, a header plus part
/// of a body, or several frames at once.
///
/// ```
/// use capdispatch::transport::framing::{Frame, LengthPrefixedDecoder};
///
/// let mut decoder = LengthPrefixedDecoder::new(1024);
/// decoder.add_bytes(&[2, 0]);
/// assert_eq!(decoder.pop_frame(), None);
/// decoder.add_bytes(&[0, 0, b'{', b'}']);
/// assert_eq!(decoder.pop_frame(), Some(Frame::Message(b"{}".to_vec())));
/// ```
#[derive(Debug)]
pub struct LengthPrefixedDecoder {
    buf: Vec<u8>,
    /// Bytes of an oversize body still to be thrown away
    skipping: usize,
    max_frame_bytes: usize,
}

impl LengthPrefixedDecoder {
    pub fn new(max_frame_bytes: usize) -> Self {
        LengthPrefixedDecoder {
            buf: Vec::new(),
            skipping: 0,
            max_frame_bytes,
        }
    }

    pub fn add_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
        self.discard_skipped();
    }

    /// Removes and returns the next complete frame, if one is buffered.
    pub fn pop_frame(&mut self) -> Option<Frame> {
        self.discard_skipped();
        if self.skipping > 0 || self.buf.len() < 4 {
            return None;
        }
        let size = u32::from_le_bytes([self.buf[0], self.buf[1], self.buf[2], self.buf[3]]) as usize;
        if size > self.max_frame_bytes {
            self.buf.drain(..4);
            self.skipping = size;
            self.discard_skipped();
            return Some(Frame::Oversize { len: size });
        }
        if self.buf.len() < size + 4 {
            return None;
        }
        let body = self.buf[4..size + 4].to_vec();
        self.buf.drain(..size + 4);
        Some(Frame::Message(body))
    }

    /// True if bytes of an incomplete frame are buffered.
    pub fn has_partial(&self) -> bool {
        !self.buf.is_empty() || self.skipping > 0
    }

    fn discard_skipped(&mut self) {
        let n = self.skipping.min(self.buf.len());
        if n > 0 {
            self.buf.drain(..n);
            self.skipping -= n;
        }
    }
}

/// Reads frames from a buffered byte stream.
pub struct FrameReader<R> {
    reader: R,
    framing: Framing,
    max_frame_bytes: usize,
    decoder: LengthPrefixedDecoder,
}

impl<R: BufRead> FrameReader<R> {
    pub fn new(reader: R, framing: Framing, max_frame_bytes: usize) -> Self {
        FrameReader {
            reader,
            framing,
            max_frame_bytes,
            decoder: LengthPrefixedDecoder::new(max_frame_bytes),
        }
    }

    /// Returns the next frame, or `None` at end of stream.
    ///
    /// A trailing line without a newline is still returned as a frame. A
    /// truncated length-prefixed frame at end of stream is dropped.
    pub fn next_frame(&mut self) -> io::Result<Option<Frame>> {
        match self.framing {
            Framing::Lines => self.next_line(),
            Framing::LengthPrefixed => self.next_length_prefixed(),
        }
    }

    fn next_line(&mut self) -> io::Result<Option<Frame>> {
        let mut line = Vec::new();
        let mut seen = 0usize;
        let mut read_any = false;
        loop {
            let (used, done) = {
                let available = match self.reader.fill_buf() {
                    Ok(available) => available,
                    Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                    Err(e) => return Err(e),
                };
                if available.is_empty() {
                    if !read_any {
                        return Ok(None);
                    }
                    break;
                }
                read_any = true;
                let (chunk, used, done) = match available.iter().position(|&b| b == b'\n') {
                    Some(i) => (&available[..i], i + 1, true),
                    None => (available, available.len(), false),
                };
                seen += chunk.len();
                if seen > self.max_frame_bytes {
                    line.clear();
                } else {
                    line.extend_from_slice(chunk);
                }
                (used, done)
            };
            self.reader.consume(used);
            if done {
                break;
            }
        }
        if seen > self.max_frame_bytes {
            return Ok(Some(Frame::Oversize { len: seen }));
        }
        if line.last() == Some(&b'\r') {
            line.pop();
        }
        Ok(Some(Frame::Message(line)))
    }

    fn next_length_prefixed(&mut self) -> io::Result<Option<Frame>> {
        loop {
            if let Some(frame) = self.decoder.pop_frame() {
                return Ok(Some(frame));
            }
            let used = {
                let available = match self.reader.fill_buf() {
                    Ok(available) => available,
                    Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                    Err(e) => return Err(e),
                };
                if available.is_empty() {
                    if self.decoder.has_partial() {
                        logwise::warn_sync!("framing: stream ended inside a length-prefixed frame");
                    }
                    return Ok(None);
                }
                self.decoder.add_bytes(available);
                available.len()
            };
            self.reader.consume(used);
        }
    }
}

/// Writes one frame in the given framing. Does not flush.
pub fn write_frame<W: Write>(writer: &mut W, framing: Framing, body: &[u8]) -> io::Result<()> {
    match framing {
        Framing::Lines => {
            writer.write_all(body)?;
            writer.write_all(b"\n")
        }
        Framing::LengthPrefixed => {
            let len = u32::try_from(body.len()).map_err(|_| {
                io::Error::new(io::ErrorKind::InvalidData, "frame too large for a u32 length prefix")
            })?;
            writer.write_all(&len.to_le_bytes())?;
            writer.write_all(body)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{BufReader, Cursor};

    fn prefixed(body: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        write_frame(&mut out, Framing::LengthPrefixed, body).unwrap();
        out
    }

    fn frames(framing: Framing, max: usize, input: Vec<u8>) -> Vec<Frame> {
        // a tiny buffer forces fragmented reads
        let reader = BufReader::with_capacity(3, Cursor::new(input));
        let mut frames = FrameReader::new(reader, framing, max);
        let mut out = Vec::new();
        while let Some(frame) = frames.next_frame().unwrap() {
            out.push(frame);
        }
        out
    }

    #[test]
    fn lines_split_on_newline_and_trim_cr() {
        let out = frames(Framing::Lines, 100, b"{\"a\":1}\r\n\n{\"b\":2}".to_vec());
        assert_eq!(
            out,
            vec![
                Frame::Message(b"{\"a\":1}".to_vec()),
                Frame::Message(Vec::new()),
                Frame::Message(b"{\"b\":2}".to_vec()),
            ]
        );
    }

    #[test]
    fn long_line_is_reported_and_next_line_survives() {
        let mut input = vec![b'x'; 50];
        input.extend_from_slice(b"\nok\n");
        let out = frames(Framing::Lines, 10, input);
        assert_eq!(out, vec![Frame::Oversize { len: 50 }, Frame::Message(b"ok".to_vec())]);
    }

    #[test]
    fn length_prefixed_reassembles_fragments() {
        let mut input = prefixed(b"first");
        input.extend(prefixed(b"second"));
        let out = frames(Framing::LengthPrefixed, 100, input);
        assert_eq!(
            out,
            vec![Frame::Message(b"first".to_vec()), Frame::Message(b"second".to_vec())]
        );
    }

    #[test]
    fn oversize_length_prefixed_body_is_skipped() {
        let mut input = prefixed(&[b'z'; 40]);
        input.extend(prefixed(b"after"));
        let out = frames(Framing::LengthPrefixed, 16, input);
        assert_eq!(out, vec![Frame::Oversize { len: 40 }, Frame::Message(b"after".to_vec())]);
    }

    #[test]
    fn truncated_frame_at_eof_is_dropped() {
        let mut input = prefixed(b"whole");
        input.extend_from_slice(&[9, 0, 0, 0, b'p']);
        let out = frames(Framing::LengthPrefixed, 100, input);
        assert_eq!(out, vec![Frame::Message(b"whole".to_vec())]);
    }

    #[test]
    fn decoder_handles_many_frames_in_one_chunk() {
        let mut decoder = LengthPrefixedDecoder::new(100);
        let mut bytes = prefixed(b"a");
        bytes.extend(prefixed(b""));
        bytes.extend(prefixed(b"bc"));
        decoder.add_bytes(&bytes);
        assert_eq!(decoder.pop_frame(), Some(Frame::Message(b"a".to_vec())));
        assert_eq!(decoder.pop_frame(), Some(Frame::Message(Vec::new())));
        assert_eq!(decoder.pop_frame(), Some(Frame::Message(b"bc".to_vec())));
        assert_eq!(decoder.pop_frame(), None);
        assert!(!decoder.has_partial());
    }

    #[test]
    fn framing_names_parse() {
        use clap::ValueEnum;
        assert_eq!(Framing::from_str("lines", true), Ok(Framing::Lines));
        assert_eq!(Framing::from_str("Length-Prefixed", true), Ok(Framing::LengthPrefixed));
        assert_eq!(Framing::from_str("lp", false), Ok(Framing::LengthPrefixed));
        assert!(Framing::from_str("carrier-pigeon", true).is_err());
    }
}
