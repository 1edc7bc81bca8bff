//! The lighting-bus frame codec and its transport.
//!
//! Every message on the bus is framed as
//!
//! ```text
//! [0x7E] [command bytes] [payload] [0xE7]
//! ```
//!
//! Two init frames are written once when the session opens. After that the
//! only frame ever sent is the "set intensities" frame, which always
//! carries the whole 513-byte channel array (a spacer byte followed by the
//! 512 DMX channels).

use log::{debug, info};
use std::io::{self, Write};

/// Opens every frame.
pub const FRAME_OPEN: u8 = 0x7E;
/// Closes every frame.
pub const FRAME_CLOSE: u8 = 0xE7;
/// First initialisation command, sent at session open.
pub const INIT_COMMAND_1: [u8; 5] = [0x03, 0x02, 0x00, 0x00, 0x00];
/// Second initialisation command, sent right after the first.
pub const INIT_COMMAND_2: [u8; 5] = [0x0A, 0x02, 0x00, 0x00, 0x00];
/// Header of the "set intensities" command.
pub const INTENSITY_COMMAND: [u8; 3] = [0x06, 0x01, 0x02];

/// Number of entries in the channel array, spacer included.
pub const CHANNEL_COUNT: usize = 513;
/// Highest addressable channel.
pub const MAX_CHANNEL: i64 = 512;
/// Total length of a rendered intensity frame.
pub const FRAME_LEN: usize = 1 + INTENSITY_COMMAND.len() + CHANNEL_COUNT + 1;

/// Baud rate of the lighting-bus interface.
pub const DMX_BAUD_RATE: u32 = 57600;

/// The channel array plus the buffer it is rendered into.
///
/// The buffer is allocated once, so rendering never allocates.
#[derive(Debug, Clone)]
pub struct ChannelFrame {
    channels: [u8; CHANNEL_COUNT],
    rendered: [u8; FRAME_LEN],
}

impl Default for ChannelFrame {
    fn default() -> Self {
        Self::new()
    }
}

impl ChannelFrame {
    pub fn new() -> Self {
        let mut rendered = [0; FRAME_LEN];
        rendered[0] = FRAME_OPEN;
        rendered[1..1 + INTENSITY_COMMAND.len()].copy_from_slice(&INTENSITY_COMMAND);
        rendered[FRAME_LEN - 1] = FRAME_CLOSE;
        Self {
            channels: [0; CHANNEL_COUNT],
            rendered,
        }
    }

    /// Writes `value` into `index`. Both are clamped rather than rejected:
    /// the index into `[0, 512]` and the value into `[0, 255]`.
    pub fn set_channel(&mut self, index: i64, value: i64) {
        let index = index.clamp(0, MAX_CHANNEL) as usize;
        let value = value.clamp(0, u8::MAX as i64) as u8;
        self.channels[index] = value;
    }

    pub fn channel(&self, index: usize) -> Option<u8> {
        self.channels.get(index).copied()
    }

    pub fn channels(&self) -> &[u8; CHANNEL_COUNT] {
        &self.channels
    }

    /// Zeroes channels 1 through 511. The spacer and channel 512 are left
    /// alone.
    pub fn blackout(&mut self) {
        for c in self.channels[1..512].iter_mut() {
            *c = 0;
        }
    }

    /// Encodes the full intensity frame.
    pub fn render(&mut self) -> &[u8] {
        let start = 1 + INTENSITY_COMMAND.len();
        self.rendered[start..start + CHANNEL_COUNT].copy_from_slice(&self.channels);
        &self.rendered
    }
}

/// Encodes a command frame that carries no channel data.
pub fn command_frame(command: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(command.len() + 2);
    frame.push(FRAME_OPEN);
    frame.extend_from_slice(command);
    frame.push(FRAME_CLOSE);
    frame
}

/// A lighting-bus session: a [`ChannelFrame`] bound to the writer it is
/// transmitted over.
///
/// Writes are fire-and-forget. Nothing is read back from the interface, but
/// a failed write is always reported to the caller.
pub struct LightingBus<W: Write> {
    writer: W,
    frame: ChannelFrame,
}

impl<W: Write> LightingBus<W> {
    /// Takes over `writer` and sends the two init frames.
    pub fn open(mut writer: W) -> io::Result<Self> {
        writer.write_all(&command_frame(&INIT_COMMAND_1))?;
        writer.write_all(&command_frame(&INIT_COMMAND_2))?;
        writer.flush()?;
        info!("lighting bus initialised");
        Ok(Self {
            writer,
            frame: ChannelFrame::new(),
        })
    }

    pub fn set_channel(&mut self, index: i64, value: i64) {
        self.frame.set_channel(index, value);
    }

    pub fn blackout(&mut self) {
        self.frame.blackout();
    }

    pub fn frame(&self) -> &ChannelFrame {
        &self.frame
    }

    /// Renders the channel array and writes the whole frame out.
    pub fn render(&mut self) -> io::Result<()> {
        let bytes = self.frame.render();
        self.writer.write_all(bytes)?;
        self.writer.flush()
    }

    pub fn writer(&self) -> &W {
        &self.writer
    }

    pub fn into_writer(self) -> W {
        self.writer
    }
}

/// A stand-in for the lighting interface that logs what would have been
/// sent and discards it.
#[derive(Debug, Default)]
pub struct MockBus {
    frames_written: usize,
}

impl MockBus {
    pub fn new() -> Self {
        info!("mock lighting interface initialised");
        Self { frames_written: 0 }
    }

    pub fn frames_written(&self) -> usize {
        self.frames_written
    }
}

impl Write for MockBus {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.frames_written += 1;
        if buf.len() == FRAME_LEN {
            let lit: Vec<(usize, u8)> = buf[4..FRAME_LEN - 1]
                .iter()
                .copied()
                .enumerate()
                .filter(|&(_, v)| v != 0)
                .collect();
            debug!("mock render, non-zero channels {:?}", lit);
        } else {
            debug!("mock command {:02X?}", buf);
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
