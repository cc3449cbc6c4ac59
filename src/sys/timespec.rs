use core::time::Duration;
use nc::timespec_t;

const NSEC_PER_SEC: u64 = 1_000_000_000;

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub(crate) struct Timespec {
    tv_sec: i64,
    tv_nsec: u32,
}

impl Timespec {
    const fn new(tv_sec: i64, tv_nsec: i64) -> Timespec {
        if tv_nsec >= 0 && tv_nsec < NSEC_PER_SEC as i64 {
            Timespec { tv_sec, tv_nsec: tv_nsec as u32 }
        } else {
            panic!("invalid timestamp");
        }
    }

    pub fn now(clock: nc::clockid_t) -> Timespec {
        use core::mem::MaybeUninit;

        let mut t: MaybeUninit<timespec_t> = MaybeUninit::uninit();
        unsafe { nc::clock_gettime(clock, &mut *t.as_mut_ptr()) }
            .expect("clock_gettime failed");
        let t = unsafe { t.assume_init() };
        Timespec::new(t.tv_sec as i64, t.tv_nsec as i64)
    }

    pub fn checked_add_duration(&self, other: &Duration) -> Option<Timespec> {
        let mut secs = self.tv_sec.checked_add_unsigned(other.as_secs())?;

        // Nano calculations can't overflow because nanos are <1B which fit
        // in a u32.
        let mut nsec = other.subsec_nanos() + self.tv_nsec;
        if nsec >= NSEC_PER_SEC as u32 {
            nsec -= NSEC_PER_SEC as u32;
            secs = secs.checked_add(1)?;
        }
        Some(Timespec { tv_sec: secs, tv_nsec: nsec })
    }

    /// Time from `earlier` to `self`, or zero if `earlier` is not earlier.
    pub fn saturating_duration_since(&self, earlier: &Timespec) -> Duration {
        if self <= earlier {
            return Duration::ZERO;
        }
        let (secs, nsec) = if self.tv_nsec >= earlier.tv_nsec {
            ((self.tv_sec - earlier.tv_sec) as u64, self.tv_nsec - earlier.tv_nsec)
        } else {
            (
                (self.tv_sec - earlier.tv_sec - 1) as u64,
                self.tv_nsec + NSEC_PER_SEC as u32 - earlier.tv_nsec,
            )
        };
        Duration::new(secs, nsec)
    }

    pub fn to_timespec(&self) -> Option<timespec_t> {
        Some(timespec_t {
            tv_sec: self.tv_sec.try_into().ok()?,
            tv_nsec: self.tv_nsec.try_into().ok()?,
        })
    }
}

/// Converts a relative duration into the kernel's representation, saturating
/// at the largest representable value.
pub(crate) fn duration_to_timespec(duration: Duration) -> timespec_t {
    timespec_t {
        tv_sec: duration.as_secs().try_into().unwrap_or(i32::MAX as _),
        tv_nsec: duration.subsec_nanos() as _,
    }
}
