//! Chunking of the audio supply into per-tick sends.

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt};

use super::CHUNK_SIZE;
use super::audio::AudioSource;
use crate::error::SdkResult;

/// Audio for one tick. A final chunk is followed by the stop frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Chunk {
    pub data: Bytes,
    pub is_final: bool,
}

impl Chunk {
    pub fn partial(data: Bytes) -> Self {
        Self {
            data,
            is_final: false,
        }
    }

    pub fn last(data: Bytes) -> Self {
        Self {
            data,
            is_final: true,
        }
    }
}

/// Pulls at most one chunk per tick from an [`AudioSource`].
pub(crate) struct AudioPacer {
    source: AudioSource,
    bytes_read: u64,
    finished: bool,
}

impl AudioPacer {
    pub fn new(source: AudioSource) -> Self {
        Self {
            source,
            bytes_read: 0,
            finished: false,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Bytes actually read from a finite source, or pushed so far in push mode.
    pub fn bytes_supplied(&self) -> u64 {
        match &self.source {
            AudioSource::Finite { .. } => self.bytes_read,
            AudioSource::Push(feed) => feed.bytes_supplied(),
        }
    }

    /// The chunk to send on this tick, if any.
    pub async fn next_chunk(&mut self) -> SdkResult<Option<Chunk>> {
        if self.finished {
            return Ok(None);
        }

        let chunk = match &mut self.source {
            AudioSource::Finite { reader, size } => {
                let size = *size;
                if self.bytes_read + CHUNK_SIZE as u64 >= size {
                    let remaining = size.saturating_sub(self.bytes_read) as usize;
                    Some(Chunk::last(read_up_to(reader, remaining).await?))
                } else {
                    let data = read_up_to(reader, CHUNK_SIZE).await?;
                    if data.is_empty() {
                        // Reader ended before the declared size.
                        Some(Chunk::last(data))
                    } else {
                        Some(Chunk::partial(data))
                    }
                }
            }
            AudioSource::Push(feed) => feed.next_chunk(),
        };

        if let Some(chunk) = &chunk {
            self.bytes_read += chunk.data.len() as u64;
            self.finished = chunk.is_final;
        }
        Ok(chunk)
    }
}

/// Read until `limit` bytes or end of stream, whichever comes first.
async fn read_up_to<R>(reader: &mut R, limit: usize) -> SdkResult<Bytes>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut buf = BytesMut::zeroed(limit);
    let mut filled = 0;
    while filled < limit {
        let n = reader.read(&mut buf[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    buf.truncate(filled);
    Ok(buf.freeze())
}
