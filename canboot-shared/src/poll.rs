//! Bounded busy waits.

/// How long a busy wait may spin before giving up.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Patience {
    /// Wait until the condition clears, however long that takes.
    #[default]
    Forever,
    /// Give up after evaluating the condition this many times.
    Spins(u32),
}

/// A bounded wait ran out of patience.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TimedOut;

impl Patience {
    /// Spins while `cond` returns true.
    pub fn wait_while(self, mut cond: impl FnMut() -> bool) -> Result<(), TimedOut> {
        match self {
            Self::Forever => {
                while cond() {
                    core::hint::spin_loop();
                }
                Ok(())
            }
            Self::Spins(limit) => {
                for _ in 0..limit {
                    if !cond() {
                        return Ok(());
                    }
                    core::hint::spin_loop();
                }
                Err(TimedOut)
            }
        }
    }

    /// Returns true, if `waited` spins exhausted the patience.
    pub fn is_exhausted(self, waited: u32) -> bool {
        match self {
            Self::Forever => false,
            Self::Spins(limit) => waited >= limit,
        }
    }
}
