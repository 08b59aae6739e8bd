//! Linux GPIO character device edge source.
//!
//! Lines are requested with `GPIO_V2_GET_LINE_IOCTL` as inputs with both
//! edge detectors enabled. All lines of one machine share a single request,
//! so their events come out of one file descriptor in kernel order.
//!
//! Waiting polls two descriptors: the line request and an `eventfd` whose
//! only purpose is to break the wait when the peripheral is stopped.

use super::{EdgeSource, Interrupt};
use amp::hal::edge::{Edge, EdgeEvent, LineId};
use amp::hal::error::{HalError, HalResult};
use nix::errno::Errno;
use nix::poll::{PollFd, PollFlags, PollTimeout, poll};
use nix::sys::eventfd::{EfdFlags, EventFd};
use static_assertions::const_assert_eq;
use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Read};
use std::os::fd::{AsFd, AsRawFd, FromRawFd, OwnedFd};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, trace};

// Mirrors of the GPIO character device uAPI v2 in `include/uapi/linux/gpio.h`,
// present since Linux 5.10. Sizes are pinned below against that header.
const GPIO_V2_LINES_MAX: usize = 64;
const GPIO_MAX_NAME_SIZE: usize = 32;
const GPIO_V2_LINE_NUM_ATTRS_MAX: usize = 10;

const GPIO_V2_LINE_FLAG_INPUT: u64 = 1 << 2;
const GPIO_V2_LINE_FLAG_EDGE_RISING: u64 = 1 << 4;
const GPIO_V2_LINE_FLAG_EDGE_FALLING: u64 = 1 << 5;

const GPIO_V2_LINE_EVENT_RISING_EDGE: u32 = 1;
const GPIO_V2_LINE_EVENT_FALLING_EDGE: u32 = 2;

/// Events read per `read(2)`.
const EVENT_BATCH: usize = 16;

#[repr(C)]
#[derive(Clone, Copy, Default)]
struct GpioV2LineAttribute {
    id: u32,
    padding: u32,
    value: u64,
}

#[repr(C)]
#[derive(Clone, Copy, Default)]
struct GpioV2LineConfigAttribute {
    attr: GpioV2LineAttribute,
    mask: u64,
}

#[repr(C)]
#[derive(Clone, Copy, Default)]
struct GpioV2LineConfig {
    flags: u64,
    num_attrs: u32,
    padding: [u32; 5],
    attrs: [GpioV2LineConfigAttribute; GPIO_V2_LINE_NUM_ATTRS_MAX],
}

#[repr(C)]
#[derive(Clone, Copy)]
struct GpioV2LineRequest {
    offsets: [u32; GPIO_V2_LINES_MAX],
    consumer: [u8; GPIO_MAX_NAME_SIZE],
    config: GpioV2LineConfig,
    num_lines: u32,
    event_buffer_size: u32,
    padding: [u32; 5],
    fd: i32,
}

/// Wire size of `struct gpio_v2_line_event`.
const LINE_EVENT_SIZE: usize = 48;

const_assert_eq!(core::mem::size_of::<GpioV2LineConfigAttribute>(), 24);
const_assert_eq!(core::mem::size_of::<GpioV2LineConfig>(), 272);
const_assert_eq!(core::mem::size_of::<GpioV2LineRequest>(), 592);

mod ioctl {
    use super::GpioV2LineRequest;

    nix::ioctl_readwrite!(gpio_v2_get_line, 0xB4, 0x07, GpioV2LineRequest);
}

impl GpioV2LineRequest {
    fn edges(lines: &[LineId], consumer: &str) -> Self {
        let mut request = Self {
            offsets: [0; GPIO_V2_LINES_MAX],
            consumer: [0; GPIO_MAX_NAME_SIZE],
            config: GpioV2LineConfig {
                flags: GPIO_V2_LINE_FLAG_INPUT
                    | GPIO_V2_LINE_FLAG_EDGE_RISING
                    | GPIO_V2_LINE_FLAG_EDGE_FALLING,
                ..Default::default()
            },
            num_lines: lines.len() as u32,
            event_buffer_size: 0,
            padding: [0; 5],
            fd: -1,
        };
        for (slot, line) in request.offsets.iter_mut().zip(lines) {
            *slot = line.0;
        }
        let label = consumer.as_bytes();
        let len = label.len().min(GPIO_MAX_NAME_SIZE - 1);
        request.consumer[..len].copy_from_slice(&label[..len]);
        request
    }
}

/// Decode one kernel event record.
fn parse_event(raw: &[u8]) -> HalResult<EdgeEvent> {
    let u32_at = |at: usize| u32::from_ne_bytes([raw[at], raw[at + 1], raw[at + 2], raw[at + 3]]);
    let mut ts = [0u8; 8];
    ts.copy_from_slice(&raw[0..8]);
    let timestamp_ns = u64::from_ne_bytes(ts);

    let edge = match u32_at(8) {
        GPIO_V2_LINE_EVENT_RISING_EDGE => Edge::Rising,
        GPIO_V2_LINE_EVENT_FALLING_EDGE => Edge::Falling,
        other => {
            return Err(HalError::EventRead(format!("unknown event id {other}")));
        }
    };
    Ok(EdgeEvent::new(LineId(u32_at(12)), edge, timestamp_ns))
}

struct WakeFd(EventFd);

impl Interrupt for WakeFd {
    fn interrupt(&self) {
        // A full counter still wakes the poll; nothing to handle.
        let _ = self.0.write(1);
    }
}

/// Lines of one GPIO chip requested for edge events.
pub struct CdevLines {
    chip: PathBuf,
    lines: Vec<LineId>,
    request: File,
    wake: Arc<WakeFd>,
    buf: [u8; LINE_EVENT_SIZE * EVENT_BATCH],
}

impl std::fmt::Debug for CdevLines {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CdevLines")
            .field("chip", &self.chip)
            .field("lines", &self.lines)
            .field("fd", &self.request.as_raw_fd())
            .finish()
    }
}

impl CdevLines {
    /// Request `lines` on `chip` for both-edge monitoring.
    pub fn open(chip: &Path, lines: &[LineId], consumer: &str) -> HalResult<Self> {
        if lines.is_empty() || lines.len() > GPIO_V2_LINES_MAX {
            return Err(HalError::LineOpen(format!(
                "{}: invalid line count {}",
                chip.display(),
                lines.len()
            )));
        }

        let chip_file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(chip)
            .map_err(|e| HalError::LineOpen(format!("{}: {e}", chip.display())))?;

        let mut request = GpioV2LineRequest::edges(lines, consumer);
        // SAFETY: `request` is a correctly sized, initialised
        // `gpio_v2_line_request`; the kernel fills in `fd`.
        unsafe { ioctl::gpio_v2_get_line(chip_file.as_raw_fd(), &mut request) }.map_err(|e| {
            HalError::LineOpen(format!("{} lines {lines:?}: {e}", chip.display()))
        })?;
        if request.fd < 0 {
            return Err(HalError::LineOpen(format!(
                "{}: kernel returned no line fd",
                chip.display()
            )));
        }
        // SAFETY: the kernel handed us ownership of a fresh descriptor.
        let request_fd = unsafe { OwnedFd::from_raw_fd(request.fd) };

        let wake = EventFd::from_value_and_flags(0, EfdFlags::EFD_CLOEXEC | EfdFlags::EFD_NONBLOCK)
            .map_err(|e| HalError::LineOpen(format!("eventfd: {e}")))?;

        debug!(chip = %chip.display(), ?lines, consumer, "GPIO lines requested");

        Ok(Self {
            chip: chip.to_path_buf(),
            lines: lines.to_vec(),
            request: File::from(request_fd),
            wake: Arc::new(WakeFd(wake)),
            buf: [0; LINE_EVENT_SIZE * EVENT_BATCH],
        })
    }

    fn read_events(&mut self, out: &mut Vec<EdgeEvent>) -> HalResult<usize> {
        let n = match self.request.read(&mut self.buf) {
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => return Ok(0),
            Err(e) => return Err(HalError::EventRead(format!("{}: {e}", self.chip.display()))),
        };
        if n % LINE_EVENT_SIZE != 0 {
            return Err(HalError::EventRead(format!(
                "{}: short event read of {n} bytes",
                self.chip.display()
            )));
        }
        for raw in self.buf[..n].chunks_exact(LINE_EVENT_SIZE) {
            let event = parse_event(raw)?;
            trace!(line = event.line.0, edge = %event.edge, ts = event.timestamp_ns, "edge");
            out.push(event);
        }
        Ok(n / LINE_EVENT_SIZE)
    }
}

impl EdgeSource for CdevLines {
    fn lines(&self) -> &[LineId] {
        &self.lines
    }

    fn wait_edges(&mut self, out: &mut Vec<EdgeEvent>) -> HalResult<usize> {
        loop {
            let (ready, woken) = {
                let mut fds = [
                    PollFd::new(self.request.as_fd(), PollFlags::POLLIN),
                    PollFd::new(self.wake.0.as_fd(), PollFlags::POLLIN),
                ];
                match poll(&mut fds, PollTimeout::NONE) {
                    Ok(_) => {}
                    Err(Errno::EINTR) => continue,
                    Err(e) => {
                        return Err(HalError::Wait(format!("{}: {e}", self.chip.display())));
                    }
                }
                let has = |fd: &PollFd<'_>, flags: PollFlags| {
                    fd.revents().is_some_and(|r| r.intersects(flags))
                };
                let fatal = PollFlags::POLLERR | PollFlags::POLLHUP | PollFlags::POLLNVAL;
                if has(&fds[0], fatal) {
                    return Err(HalError::Wait(format!(
                        "{}: line request closed",
                        self.chip.display()
                    )));
                }
                (has(&fds[0], PollFlags::POLLIN), has(&fds[1], PollFlags::POLLIN))
            };

            if woken {
                let _ = self.wake.0.read();
                return Ok(0);
            }
            if ready {
                let n = self.read_events(out)?;
                if n > 0 {
                    return Ok(n);
                }
            }
        }
    }

    fn interrupter(&self) -> Arc<dyn Interrupt> {
        self.wake.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw_event(ts: u64, id: u32, offset: u32) -> [u8; LINE_EVENT_SIZE] {
        let mut raw = [0u8; LINE_EVENT_SIZE];
        raw[0..8].copy_from_slice(&ts.to_ne_bytes());
        raw[8..12].copy_from_slice(&id.to_ne_bytes());
        raw[12..16].copy_from_slice(&offset.to_ne_bytes());
        raw[16..20].copy_from_slice(&9u32.to_ne_bytes());
        raw
    }

    #[test]
    fn test_parse_rising_and_falling() {
        let rising = parse_event(&raw_event(1_000, 1, 7)).unwrap();
        assert_eq!(rising, EdgeEvent::new(LineId(7), Edge::Rising, 1_000));

        let falling = parse_event(&raw_event(2_000, 2, 8)).unwrap();
        assert_eq!(falling.edge, Edge::Falling);
        assert_eq!(falling.line, LineId(8));
    }

    #[test]
    fn test_parse_unknown_id() {
        assert!(matches!(
            parse_event(&raw_event(0, 3, 7)),
            Err(HalError::EventRead(_))
        ));
    }

    #[test]
    fn test_request_layout() {
        let request = GpioV2LineRequest::edges(&[LineId(7), LineId(8)], "amp-hal");
        assert_eq!(request.num_lines, 2);
        assert_eq!(&request.offsets[..3], &[7, 8, 0]);
        assert_eq!(&request.consumer[..8], b"amp-hal\0");
        assert_eq!(
            request.config.flags,
            GPIO_V2_LINE_FLAG_INPUT | GPIO_V2_LINE_FLAG_EDGE_RISING | GPIO_V2_LINE_FLAG_EDGE_FALLING
        );
    }

    #[test]
    fn test_consumer_label_truncated() {
        let request = GpioV2LineRequest::edges(&[LineId(1)], &"x".repeat(64));
        assert_eq!(request.consumer[GPIO_MAX_NAME_SIZE - 1], 0);
    }

    #[test]
    fn test_missing_chip() {
        let err = CdevLines::open(Path::new("/nonexistent/gpiochip9"), &[LineId(1)], "t")
            .unwrap_err();
        assert!(matches!(err, HalError::LineOpen(_)));
    }
}
