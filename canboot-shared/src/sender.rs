//! Sender transfer state machine.
//!
//! Streams an image as 8 byte chunks with at most one unacknowledged chunk
//! in flight. The CAN receive interrupt raises the [`AckFlag`] when the
//! receiver acknowledges; [`Sender::poll`] is called from the main loop.

use crate::{
    frame::Frame,
    layout::{chunk_count, CHUNK_SIZE, PAGE_SIZE},
    link::Transmitter,
    log,
    poll::Patience,
    signal::AckFlag,
};

/// Byte used to fill the last chunk beyond the end of the image.
pub const PADDING: u8 = 0xff;

/// Sending failed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SendError<E> {
    /// CAN controller error.
    Link(E),
    /// Receiver did not acknowledge in time.
    AckTimeout,
    /// Previous transmission stayed pending.
    PendingTimeout,
}

/// Result of one poll.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Progress {
    /// Waiting for acknowledgment or a free mailbox.
    Waiting,
    /// Chunk with the specified index was submitted.
    Sent {
        /// Chunk index.
        index: usize,
    },
    /// All chunks were sent and acknowledged.
    Done,
}

/// Sender of an image.
pub struct Sender<'a> {
    image: &'a [u8],
    ack: &'a AckFlag,
    sent: usize,
    total: usize,
    ack_patience: Patience,
    pending_patience: Patience,
    waited: u32,
}

impl<'a> Sender<'a> {
    /// Creates a sender for `image`.
    ///
    /// `ack` must be raised initially and is raised by the receive interrupt
    /// whenever an acknowledgment arrives.
    pub fn new(image: &'a [u8], ack: &'a AckFlag) -> Self {
        Self {
            image,
            ack,
            sent: 0,
            total: chunk_count(image.len()),
            ack_patience: Patience::Forever,
            pending_patience: Patience::Forever,
            waited: 0,
        }
    }

    /// Gives up after this many polls without acknowledgment.
    pub fn with_ack_patience(mut self, patience: Patience) -> Self {
        self.ack_patience = patience;
        self
    }

    /// Bounds the wait for a pending transmission.
    pub fn with_pending_patience(mut self, patience: Patience) -> Self {
        self.pending_patience = patience;
        self
    }

    /// Number of chunks submitted so far.
    pub fn sent(&self) -> usize {
        self.sent
    }

    /// Number of chunks of the image.
    pub fn total(&self) -> usize {
        self.total
    }

    /// Whether all chunks were sent and the last one was acknowledged.
    pub fn is_done(&self) -> bool {
        self.sent == self.total && self.ack.is_raised()
    }

    /// Chunk with the specified index, padded with [`PADDING`].
    pub fn chunk(&self, index: usize) -> [u8; CHUNK_SIZE] {
        let mut chunk = [PADDING; CHUNK_SIZE];
        let start = (index * CHUNK_SIZE).min(self.image.len());
        let end = (start + CHUNK_SIZE).min(self.image.len());
        chunk[..end - start].copy_from_slice(&self.image[start..end]);
        chunk
    }

    /// Submits the next chunk if the previous one was acknowledged and
    /// a mailbox is free.
    pub fn poll<T: Transmitter>(&mut self, tx: &mut T) -> Result<Progress, SendError<T::Error>> {
        if !self.ack.is_raised() {
            self.waited = self.waited.saturating_add(1);
            if self.ack_patience.is_exhausted(self.waited) {
                log::error!("no acknowledgment for chunk {}", self.sent.saturating_sub(1));
                return Err(SendError::AckTimeout);
            }
            return Ok(Progress::Waiting);
        }
        self.waited = 0;

        if self.sent == self.total {
            return Ok(Progress::Done);
        }
        if tx.free_mailboxes() == 0 {
            return Ok(Progress::Waiting);
        }

        let index = self.sent;
        let frame = Frame::chunk(&self.chunk(index));

        self.ack.clear();
        self.pending_patience.wait_while(|| tx.is_pending()).map_err(|_| SendError::PendingTimeout)?;
        nb::block!(tx.transmit(&frame)).map_err(SendError::Link)?;
        self.sent += 1;

        if index % (PAGE_SIZE / CHUNK_SIZE) == 0 {
            log::info!("sent chunk {} / {}", index + 1, self.total);
        }

        Ok(Progress::Sent { index })
    }

    /// Polls until all chunks were sent and acknowledged.
    ///
    /// `progress` is called after every poll.
    pub fn run<T: Transmitter>(
        &mut self, tx: &mut T, mut progress: impl FnMut(Progress),
    ) -> Result<(), SendError<T::Error>> {
        loop {
            let p = self.poll(tx)?;
            progress(p);
            if p == Progress::Done {
                log::info!("image sent in {} chunks", self.total);
                return Ok(());
            }
        }
    }
}
