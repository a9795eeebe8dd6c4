//! Attach animation
//!
//! Plays [`ANIMATION_FRAMES`] through the ledmask register so a user can
//! see that the card was recognised. Failed frames are logged and skipped.
//! Raising `stop` ends the animation before the next frame.

use crate::xylo::ledmask::LedmaskRegister;
use protocol::{ANIMATION_FRAMES, Transport};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::sleep;
use std::time::Duration;
use tracing::debug;

pub fn run<T: Transport + ?Sized>(
    register: &mut LedmaskRegister,
    transport: &mut T,
    frame_delay: Duration,
    stop: &AtomicBool,
) {
    let mut failed = 0;

    for frame in ANIMATION_FRAMES {
        if stop.load(Ordering::Acquire) {
            debug!("Animation interrupted before frame {:#04x}", frame);
            return;
        }
        if let Err(e) = register.set(transport, frame) {
            debug!("Animation frame {:#04x} dropped: {}", frame, e);
            failed += 1;
        }
        sleep(frame_delay);
    }

    debug!(
        "Animation finished ({} of {} frames failed)",
        failed,
        ANIMATION_FRAMES.len()
    );
}
