//! Fixed draw sequences for exercising canvas implementations

use crate::canvas::CanvasOps;
use skbind_native::{sk_testbed, TESTBED_SEQUENCE_COUNT};

/// Number of sequences [`testbed`] can replay.
pub const SEQUENCE_COUNT: i32 = TESTBED_SEQUENCE_COUNT;

/// Replays sequence `test_number` onto `canvas`. Returns `false` for unknown
/// sequence numbers, leaving the canvas untouched.
pub fn testbed<C: CanvasOps>(canvas: &C, test_number: i32) -> skbind_core::Result<bool> {
    let canvas = canvas.raw_canvas()?;
    // SAFETY: the canvas is live for the call.
    Ok(unsafe { sk_testbed(canvas, test_number) })
}
