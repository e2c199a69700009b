//! Receiver transfer state machine.
//!
//! Runs in the CAN receive interrupt. Every valid data frame is copied into
//! the reassembly buffer and acknowledged right away. When the last chunk
//! arrived, receive notifications are switched off and the buffer is handed
//! out exactly once as an [`Image`].

use crate::{
    frame::{Frame, DATA_ID},
    layout::{chunk_count, CHUNK_SIZE, MAX_IMAGE_SIZE, PAGE_SIZE},
    link::{Listener, Transmitter},
    log,
};

/// A reassembled image.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Image<'a> {
    data: &'a [u8],
}

impl<'a> Image<'a> {
    /// Image bytes.
    pub fn as_bytes(&self) -> &'a [u8] {
        self.data
    }

    /// Image length in bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the image is empty.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Reason why a frame was ignored.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Rejection {
    /// Not a standard frame on the data identifier.
    UnexpectedId,
    /// Remote frame or payload length other than one chunk.
    BadLength,
    /// Transfer already complete.
    AfterComplete,
}

/// Outcome of handling one frame.
#[derive(Debug, PartialEq, Eq)]
pub enum RxOutcome<'a> {
    /// Chunk was stored and acknowledged.
    Accepted {
        /// Chunk index.
        index: usize,
    },
    /// Last chunk was stored and acknowledged.
    Complete(Image<'a>),
    /// Frame was ignored.
    Rejected(Rejection),
}

/// Counters of ignored frames.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RxStats {
    /// Frames with an unexpected identifier.
    pub rejected_id: u32,
    /// Frames with an unexpected length.
    pub rejected_len: u32,
    /// Frames arriving after completion.
    pub after_complete: u32,
}

/// Receiver cannot be created.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ReceiverError {
    /// Image has zero length.
    EmptyImage,
    /// Image exceeds [`MAX_IMAGE_SIZE`].
    ImageTooLarge,
    /// Buffer cannot hold all chunks of the image.
    BufferTooSmall {
        /// Required buffer size.
        needed: usize,
    },
}

/// Reassembles an image of known length.
pub struct Receiver<'a> {
    buffer: Option<&'a mut [u8]>,
    image_len: usize,
    received: usize,
    total: usize,
    stats: RxStats,
}

impl<'a> Receiver<'a> {
    /// Creates a receiver for an image of `image_len` bytes.
    ///
    /// The buffer must hold all chunks including padding of the last one.
    pub fn new(buffer: &'a mut [u8], image_len: usize) -> Result<Self, ReceiverError> {
        if image_len == 0 {
            return Err(ReceiverError::EmptyImage);
        }
        if image_len > MAX_IMAGE_SIZE {
            return Err(ReceiverError::ImageTooLarge);
        }
        let total = chunk_count(image_len);
        let needed = total * CHUNK_SIZE;
        if buffer.len() < needed {
            return Err(ReceiverError::BufferTooSmall { needed });
        }

        Ok(Self { buffer: Some(buffer), image_len, received: 0, total, stats: RxStats::default() })
    }

    /// Number of chunks received so far.
    pub fn received(&self) -> usize {
        self.received
    }

    /// Number of chunks of the image.
    pub fn total(&self) -> usize {
        self.total
    }

    /// Whether all chunks were received.
    pub fn is_complete(&self) -> bool {
        self.received == self.total
    }

    /// Counters of ignored frames.
    pub fn stats(&self) -> RxStats {
        self.stats
    }

    /// Handles an inbound frame.
    ///
    /// Invalid frames are counted and ignored. If the acknowledgment cannot
    /// be sent, the chunk is not counted and the link error is returned;
    /// the sender repeats an unacknowledged chunk.
    pub fn on_frame<L>(&mut self, frame: &Frame, link: &mut L) -> Result<RxOutcome<'a>, L::Error>
    where
        L: Transmitter + Listener,
    {
        if self.is_complete() {
            self.stats.after_complete += 1;
            return Ok(RxOutcome::Rejected(Rejection::AfterComplete));
        }
        if frame.standard_id() != Some(DATA_ID.as_raw()) {
            self.stats.rejected_id += 1;
            log::warn!("ignoring {}", frame);
            return Ok(RxOutcome::Rejected(Rejection::UnexpectedId));
        }
        let Some(chunk) = frame.as_chunk() else {
            self.stats.rejected_len += 1;
            log::warn!("ignoring {}", frame);
            return Ok(RxOutcome::Rejected(Rejection::BadLength));
        };
        let Some(buffer) = self.buffer.take() else {
            self.stats.after_complete += 1;
            return Ok(RxOutcome::Rejected(Rejection::AfterComplete));
        };

        let index = self.received;
        let offset = index * CHUNK_SIZE;
        buffer[offset..offset + CHUNK_SIZE].copy_from_slice(chunk);
        self.received += 1;

        if let Err(err) = nb::block!(link.transmit(&Frame::ack())) {
            log::error!("acknowledging chunk {} failed", index);
            self.received = index;
            self.buffer = Some(buffer);
            return Err(err);
        }

        if index % (PAGE_SIZE / CHUNK_SIZE) == 0 {
            log::info!("received chunk {} / {}", index + 1, self.total);
        }

        if self.received < self.total {
            self.buffer = Some(buffer);
            return Ok(RxOutcome::Accepted { index });
        }

        link.stop_listening();
        log::info!("image of {} bytes received", self.image_len);
        let data: &'a [u8] = buffer;
        Ok(RxOutcome::Complete(Image { data: &data[..self.image_len] }))
    }
}
