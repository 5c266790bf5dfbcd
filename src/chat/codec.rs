/// Raw-chunk codec — frames a TCP byte stream into reads of at most
/// 1024 bytes.
///
/// The chat protocol has no line framing or length prefix: the wire unit
/// is simply one read or write of up to [`MAX_FRAME`] bytes, and frames
/// are opaque byte payloads. The decoder yields whatever is buffered
/// (capped at `MAX_FRAME` per frame); the encoder writes payloads out
/// verbatim and rejects anything over the cap.
use bytes::{BufMut, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

/// Maximum bytes per read/write unit on the wire.
pub const MAX_FRAME: usize = 1024;

/// Codec error: an oversized outbound payload or an I/O error.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("frame exceeds maximum length ({MAX_FRAME} bytes)")]
    FrameTooLarge,
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// A tokio codec over raw byte chunks.
#[derive(Debug, Default)]
pub struct ChunkCodec;

impl Decoder for ChunkCodec {
    type Item = Bytes;
    type Error = CodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.is_empty() {
            return Ok(None);
        }
        let take = src.len().min(MAX_FRAME);
        Ok(Some(src.split_to(take).freeze()))
    }
}

impl Encoder<Bytes> for ChunkCodec {
    type Error = CodecError;

    fn encode(&mut self, item: Bytes, dst: &mut BytesMut) -> Result<(), Self::Error> {
        if item.len() > MAX_FRAME {
            return Err(CodecError::FrameTooLarge);
        }
        dst.reserve(item.len());
        dst.put_slice(&item);
        Ok(())
    }
}
