//! Where a session's audio comes from.

use std::collections::VecDeque;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use bytes::Bytes;
use parking_lot::Mutex;
use tokio::io::AsyncRead;

use super::CHUNK_SIZE;
use super::pacer::Chunk;
use crate::error::{SdkError, SdkResult};

/// Audio supply for one recognition session.
pub enum AudioSource {
    /// A readable source whose total size is known upfront.
    ///
    /// `size` decides where the final chunk falls; it must match the number
    /// of bytes the reader yields. A reader that ends early finishes the
    /// stream at that point, a reader that is longer is cut at `size`.
    Finite {
        reader: Box<dyn AsyncRead + Send + Unpin>,
        size: u64,
    },
    /// Chunks pushed by the caller while the session runs.
    Push(AudioFeed),
}

impl AudioSource {
    pub fn from_reader<R>(reader: R, size: u64) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
    {
        Self::Finite {
            reader: Box::new(reader),
            size,
        }
    }

    /// In-memory audio.
    pub fn from_bytes(data: impl Into<Bytes>) -> Self {
        let data: Bytes = data.into();
        let size = data.len() as u64;
        Self::from_reader(std::io::Cursor::new(data), size)
    }

    /// Audio file on disk, sized from its metadata.
    pub async fn from_file(path: impl AsRef<Path>) -> SdkResult<Self> {
        let file = tokio::fs::File::open(path.as_ref()).await?;
        let size = file.metadata().await?.len();
        Ok(Self::from_reader(file, size))
    }

    /// Push mode, fed through `feed`.
    pub fn push(feed: AudioFeed) -> Self {
        Self::Push(feed)
    }

    pub fn is_push(&self) -> bool {
        matches!(self, Self::Push(_))
    }
}

impl std::fmt::Debug for AudioSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Finite { size, .. } => f.debug_struct("Finite").field("size", size).finish(),
            Self::Push(feed) => f.debug_tuple("Push").field(feed).finish(),
        }
    }
}

#[derive(Debug, Default)]
struct FeedQueue {
    chunks: VecDeque<Bytes>,
    closed: bool,
}

#[derive(Debug)]
struct FeedInner {
    queue: Mutex<FeedQueue>,
    running: AtomicBool,
    bytes_supplied: AtomicU64,
}

/// Producer handle for push-mode audio.
///
/// Cloneable and safe to use from any thread or task. The producer calls
/// [`add_audio_chunk`](Self::add_audio_chunk) as audio becomes available and
/// [`stop_audio`](Self::stop_audio) once no more will follow; the session
/// drains what is queued and then ends the stream.
#[derive(Debug, Clone)]
pub struct AudioFeed {
    inner: Arc<FeedInner>,
}

impl Default for AudioFeed {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioFeed {
    /// A new, running feed with an empty queue.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(FeedInner {
                queue: Mutex::new(FeedQueue::default()),
                running: AtomicBool::new(true),
                bytes_supplied: AtomicU64::new(0),
            }),
        }
    }

    /// Queue a chunk for sending.
    ///
    /// Chunks larger than [`CHUNK_SIZE`] are sent over several ticks, at most
    /// [`CHUNK_SIZE`] bytes per frame.
    ///
    /// Fails with [`SdkError::AudioFeedClosed`] once the session has sent its
    /// final chunk.
    pub fn add_audio_chunk(&self, chunk: impl Into<Bytes>) -> SdkResult<()> {
        let chunk: Bytes = chunk.into();
        let mut queue = self.inner.queue.lock();
        if queue.closed {
            return Err(SdkError::AudioFeedClosed);
        }
        self.inner
            .bytes_supplied
            .fetch_add(chunk.len() as u64, Ordering::Relaxed);
        queue.chunks.push_back(chunk);
        Ok(())
    }

    /// Signal that no more chunks will be added.
    pub fn stop_audio(&self) {
        self.inner.running.store(false, Ordering::Release);
    }

    pub fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::Acquire)
    }

    pub fn is_closed(&self) -> bool {
        self.inner.queue.lock().closed
    }

    pub fn len(&self) -> usize {
        self.inner.queue.lock().chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.queue.lock().chunks.is_empty()
    }

    /// Total bytes ever queued.
    pub fn bytes_supplied(&self) -> u64 {
        self.inner.bytes_supplied.load(Ordering::Relaxed)
    }

    /// Decide what one tick sends. Never blocks.
    ///
    /// While the producer runs, at most one queued chunk is taken and it is
    /// never final. After `stop_audio`, queued chunks drain one per tick and
    /// the last one is final; the queue closes with it. A stopped feed with
    /// nothing queued yields an empty final chunk so the stream still ends.
    pub(crate) fn next_chunk(&self) -> Option<Chunk> {
        let running = self.is_running();
        let mut queue = self.inner.queue.lock();
        if queue.closed {
            return None;
        }

        if running {
            return pop_bounded(&mut queue.chunks).map(Chunk::partial);
        }

        let last_fits = queue.chunks.len() == 1
            && queue.chunks.front().is_some_and(|c| c.len() <= CHUNK_SIZE);
        if queue.chunks.is_empty() {
            queue.closed = true;
            Some(Chunk::last(Bytes::new()))
        } else if last_fits {
            queue.closed = true;
            queue.chunks.pop_front().map(Chunk::last)
        } else {
            pop_bounded(&mut queue.chunks).map(Chunk::partial)
        }
    }
}

/// Take at most one frame's worth from the head of the queue.
fn pop_bounded(chunks: &mut VecDeque<Bytes>) -> Option<Bytes> {
    let mut chunk = chunks.pop_front()?;
    if chunk.len() > CHUNK_SIZE {
        let rest = chunk.split_off(CHUNK_SIZE);
        chunks.push_front(rest);
    }
    Some(chunk)
}
