//! Persisting a received image.

use crate::{
    fpec::{FlashError, FlashRegs, Fpec},
    layout::FlashRegion,
    log,
    receiver::Image,
};

/// Update failed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum UpdateError {
    /// Flash operation failed.
    Flash(FlashError),
    /// Image does not fit into the target region.
    ImageTooLarge,
}

impl From<FlashError> for UpdateError {
    fn from(err: FlashError) -> Self {
        Self::Flash(err)
    }
}

/// Outcome of [`Updater::apply`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum UpdateOutcome {
    /// Image was written.
    Flashed,
    /// An image was written before; nothing was done.
    AlreadyFlashed,
}

/// Writes a received image into its flash region, once.
pub struct Updater {
    region: FlashRegion,
    flashed: bool,
}

impl Updater {
    /// Creates an updater writing to `region`.
    pub const fn new(region: FlashRegion) -> Self {
        Self { region, flashed: false }
    }

    /// Target region.
    pub fn region(&self) -> FlashRegion {
        self.region
    }

    /// Whether an image has been written.
    pub fn is_flashed(&self) -> bool {
        self.flashed
    }

    /// Erases the target region and writes `image` to its base.
    ///
    /// The flashed latch is set only when both steps succeeded.
    pub fn apply<R: FlashRegs>(&mut self, fpec: &mut Fpec<R>, image: &Image) -> Result<UpdateOutcome, UpdateError> {
        if self.flashed {
            return Ok(UpdateOutcome::AlreadyFlashed);
        }
        if image.len() > self.region.len() {
            return Err(UpdateError::ImageTooLarge);
        }

        log::info!("flashing {} bytes to 0x{:08x}", image.len(), self.region.base);
        fpec.erase_range(self.region.base, self.region.last_page())?;
        fpec.write_bytes(self.region.base, image.as_bytes())?;
        self.flashed = true;
        log::info!("flashing done");

        Ok(UpdateOutcome::Flashed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        fpec::Latency,
        layout::{FIRMWARE, PAGE_SIZE},
        link::{Listener, Transmitter},
        receiver::{Receiver, RxOutcome},
        frame::Frame,
        sim::SimFlash,
    };

    struct NullLink;

    impl Transmitter for NullLink {
        type Error = ();

        fn free_mailboxes(&self) -> usize {
            3
        }

        fn is_pending(&self) -> bool {
            false
        }

        fn transmit(&mut self, _frame: &Frame) -> nb::Result<(), ()> {
            Ok(())
        }
    }

    impl Listener for NullLink {
        fn stop_listening(&mut self) {}
    }

    fn receive<'a>(buf: &'a mut [u8], image: &[u8]) -> Image<'a> {
        let mut rx = Receiver::new(buf, image.len()).unwrap();
        let mut out = None;
        for i in 0..rx.total() {
            let mut chunk = [0xff; 8];
            let part = &image[i * 8..(i * 8 + 8).min(image.len())];
            chunk[..part.len()].copy_from_slice(part);
            if let RxOutcome::Complete(img) = rx.on_frame(&Frame::chunk(&chunk), &mut NullLink).unwrap() {
                out = Some(img);
            }
        }
        out.unwrap()
    }

    fn fpec() -> Fpec<SimFlash> {
        let mut sim = SimFlash::new();
        sim.fill(FIRMWARE.base, &[0x00; 3 * PAGE_SIZE]);
        let mut fpec = Fpec::new(sim);
        fpec.init(Latency::Zero).unwrap();
        fpec
    }

    #[test]
    fn flashes_once() {
        let payload: Vec<u8> = (0..100u8).collect();
        let mut buf = [0; 104];
        let image = receive(&mut buf, &payload);
        let mut fpec = fpec();
        let mut updater = Updater::new(FIRMWARE);

        assert!(!updater.is_flashed());
        assert_eq!(updater.apply(&mut fpec, &image), Ok(UpdateOutcome::Flashed));
        assert!(updater.is_flashed());
        assert_eq!(fpec.regs().memory(FIRMWARE.base, 100), payload.as_slice());
        assert!(fpec.regs().memory(FIRMWARE.base + 100, PAGE_SIZE).iter().all(|&b| b == 0xff));
        assert_eq!(fpec.regs().erased_pages().len(), FIRMWARE.pages());

        fpec.regs_mut().clear_log();
        assert_eq!(updater.apply(&mut fpec, &image), Ok(UpdateOutcome::AlreadyFlashed));
        assert!(fpec.regs().accesses().is_empty());
    }

    #[test]
    fn odd_image_is_padded() {
        let payload = [0x11, 0x22, 0x33];
        let mut buf = [0; 8];
        let image = receive(&mut buf, &payload);
        let mut fpec = fpec();

        Updater::new(FIRMWARE).apply(&mut fpec, &image).unwrap();
        assert_eq!(fpec.regs().memory(FIRMWARE.base, 4), &[0x11, 0x22, 0x33, 0xff]);
        assert_eq!(fpec.read_word(FIRMWARE.base), 0xff33_2211);
    }

    #[test]
    fn flash_error_leaves_latch_clear() {
        let payload = [0u8; 16];
        let mut buf = [0; 16];
        let image = receive(&mut buf, &payload);
        let mut fpec = fpec();
        fpec.regs_mut().protect(FIRMWARE.base + PAGE_SIZE);
        let mut updater = Updater::new(FIRMWARE);

        assert_eq!(updater.apply(&mut fpec, &image), Err(UpdateError::Flash(FlashError::WriteProtected)));
        assert!(!updater.is_flashed());
    }

    #[test]
    fn image_must_fit_region() {
        let payload = [0u8; 24];
        let mut buf = [0; 24];
        let image = receive(&mut buf, &payload);
        let mut fpec = fpec();
        let tiny = FlashRegion { base: FIRMWARE.base, end: FIRMWARE.base + 16, page_size: PAGE_SIZE };

        assert_eq!(Updater::new(tiny).apply(&mut fpec, &image), Err(UpdateError::ImageTooLarge));
    }
}
