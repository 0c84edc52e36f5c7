//! Per-lane log buffer shared between host and device, and the pump
//! that drains it to stdout prefixed by lane.

use std::io::Write;

/// Bytes available to a single workgroup lane for `print`-style output.
pub(crate) const LANE_BUFFER_LEN: usize = 1020;

/// `WorkerShared` stride: 4-byte `used` cursor plus the lane buffer,
/// padded to a round 1024 bytes.
pub(crate) const WORKER_SHARED_STRIDE: usize = 4 + LANE_BUFFER_LEN;

#[repr(C)]
#[derive(Clone, Copy)]
pub(crate) struct WorkerShared {
    pub used: u32,
    pub buffer: [u8; LANE_BUFFER_LEN],
}

impl Default for WorkerShared {
    fn default() -> Self {
        WorkerShared {
            used: 0,
            buffer: [0u8; LANE_BUFFER_LEN],
        }
    }
}

/// Host-side mirror of every lane's `WorkerShared`, plus the
/// last-emitted cursor per lane.
pub(crate) struct LaneLog {
    lanes: Vec<WorkerShared>,
    cursors: Vec<usize>,
}

impl LaneLog {
    pub fn new(lane_count: usize) -> LaneLog {
        LaneLog {
            lanes: vec![WorkerShared::default(); lane_count],
            cursors: vec![0; lane_count],
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        unsafe {
            std::slice::from_raw_parts(
                self.lanes.as_ptr() as *const u8,
                self.lanes.len() * WORKER_SHARED_STRIDE,
            )
        }
    }

    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        unsafe {
            std::slice::from_raw_parts_mut(
                self.lanes.as_mut_ptr() as *mut u8,
                self.lanes.len() * WORKER_SHARED_STRIDE,
            )
        }
    }

    pub fn any_used(&self) -> bool {
        self.lanes.iter().any(|lane| lane.used > 0)
    }

    pub fn clear(&mut self) {
        for lane in self.lanes.iter_mut() {
            *lane = WorkerShared::default();
        }
        for cursor in self.cursors.iter_mut() {
            *cursor = 0;
        }
    }

    /// Emit every complete line newly reported by any lane since the
    /// last pump, prefixed with `"(gpu <lane>) "` at the start of each
    /// line. Bytes after the last newline in a lane's new range are
    /// deferred to the next pump.
    pub fn pump(&mut self) {
        let stdout = std::io::stdout();
        let mut out = stdout.lock();

        for (lane, shared) in self.lanes.iter().enumerate() {
            let used = shared.used as usize;
            let cursor = self.cursors[lane];
            if used <= cursor {
                continue;
            }

            let mut last_newline = None;
            for j in cursor..used {
                if shared.buffer[j] == b'\n' {
                    last_newline = Some(j + 1);
                }
            }

            let Some(end) = last_newline else { continue };

            let mut at_line_start = true;
            for &byte in &shared.buffer[cursor..end] {
                if at_line_start {
                    let _ = write!(out, "(gpu {lane}) ");
                    at_line_start = false;
                }
                let _ = out.write_all(&[byte]);
                if byte == b'\n' {
                    at_line_start = true;
                }
            }
            self.cursors[lane] = end;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn any_used_reflects_lane_state() {
        let mut log = LaneLog::new(2);
        assert!(!log.any_used());
        log.lanes[1].used = 3;
        assert!(log.any_used());
    }

    #[test]
    fn clear_resets_lanes_and_cursors() {
        let mut log = LaneLog::new(2);
        log.lanes[0].used = 5;
        log.lanes[0].buffer[0] = b'x';
        log.cursors[0] = 5;

        log.clear();

        assert_eq!(log.lanes[0].used, 0);
        assert_eq!(log.lanes[0].buffer[0], 0);
        assert_eq!(log.cursors[0], 0);
    }

    #[test]
    fn pump_advances_cursor_only_past_the_last_newline() {
        let mut log = LaneLog::new(1);
        let message = b"partial line, no newline yet";
        log.lanes[0].buffer[..message.len()].copy_from_slice(message);
        log.lanes[0].used = message.len() as u32;

        log.pump();
        assert_eq!(log.cursors[0], 0, "no newline yet, nothing should be consumed");

        let line = b"finishes here\n";
        let start = message.len();
        log.lanes[0].buffer[start..start + line.len()].copy_from_slice(line);
        log.lanes[0].used = (start + line.len()) as u32;

        log.pump();
        assert_eq!(log.cursors[0], start + line.len());
    }

    #[test]
    fn as_bytes_round_trips_through_as_bytes_mut() {
        let mut log = LaneLog::new(1);
        log.as_bytes_mut()[0] = 7;
        assert_eq!(log.as_bytes()[0], 7);
    }
}
