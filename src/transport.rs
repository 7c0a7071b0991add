//! The transport adapter: frames in, frames out.
//!
//! [`serve`] runs the request loop over any `BufRead`/`Write` pair. It reads
//! one frame, answers it, writes and flushes the answer, and only then reads
//! the next frame, so responses leave in the order requests arrived. Malformed
//! or oversize frames are answered with a JSON-RPC error and the loop carries
//! on. The loop ends cleanly at end of input.
//!
//! ```
//! use capdispatch::builtin::default_registry;
//! use capdispatch::config::ServerConfig;
//! use capdispatch::protocol::Server;
//! use capdispatch::transport::{serve, Framing};
//! use std::sync::Arc;
//!
//! let config = ServerConfig::default();
//! let server = Server::new(&config, Arc::new(default_registry(&config).unwrap()));
//!
//! let input = b"{\"jsonrpc\":\"2.0\",\"id\":1,\"method\":\"ping\"}\n";
//! let mut output = Vec::new();
//! serve(&server, &input[..], &mut output, Framing::Lines, 1024).unwrap();
//! assert_eq!(output, b"{\"jsonrpc\":\"2.0\",\"result\":{},\"id\":1}\n");
//! ```

pub mod framing;
pub mod stdio;

pub use framing::Framing;

use crate::jrpc::{Error, Response};
use crate::protocol::Server;
use framing::{Frame, FrameReader, write_frame};
use logwise::privacy::LogIt;
use serde_json::Value;
use std::io::{self, BufRead, Write};

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("transport i/o failed: {0}")]
    Io(#[from] io::Error),
    #[error("could not encode response: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Counters reported when the loop ends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    pub frames: usize,
    pub responses: usize,
    /// Responses that carried a JSON-RPC error
    pub errors: usize,
}

/// Serves requests from `reader` until end of input.
pub fn serve<R: BufRead, W: Write>(
    server: &Server,
    reader: R,
    mut writer: W,
    framing: Framing,
    max_frame_bytes: usize,
) -> Result<SessionStats, TransportError> {
    let mut frames = FrameReader::new(reader, framing, max_frame_bytes);
    let mut stats = SessionStats::default();
    while let Some(frame) = frames.next_frame()? {
        stats.frames += 1;
        let response = match frame {
            // blank lines are keep-alives; an empty length-prefixed body is a malformed frame
            Frame::Message(body)
                if framing == Framing::Lines && body.iter().all(u8::is_ascii_whitespace) =>
            {
                continue;
            }
            Frame::Message(body) => server.handle_frame(&body),
            Frame::Oversize { len } => {
                logwise::warn_sync!(
                    "transport: dropped frame of {len} bytes (limit {max})",
                    len = LogIt(&len),
                    max = LogIt(&max_frame_bytes)
                );
                Some(oversize_response(len, max_frame_bytes))
            }
        };
        let Some(response) = response else {
            continue;
        };
        if response.error.is_some() {
            stats.errors += 1;
        }
        let bytes = serde_json::to_vec(&response)?;
        write_frame(&mut writer, framing, &bytes)?;
        writer.flush()?;
        stats.responses += 1;
    }
    logwise::info_sync!("transport: input closed {stats}", stats = LogIt(&stats));
    Ok(stats)
}

fn oversize_response(len: usize, max: usize) -> Response<Value> {
    Response::err(
        Error::invalid_request(format!("frame of {len} bytes exceeds the {max} byte limit")),
        Value::Null,
    )
}
