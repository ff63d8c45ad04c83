//! PCAP capture of host link frames
//!
//! Each record is one frame prefixed by a direction byte, written with
//! link type `USER0` so a custom dissector can pick it up.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

const PCAP_MAGIC: u32 = 0xa1b2_c3d4;
const PCAP_VERSION_MAJOR: u16 = 2;
const PCAP_VERSION_MINOR: u16 = 4;
const PCAP_THISZONE: i32 = 0;
const PCAP_SIGFIGS: u32 = 0;
const PCAP_SNAPLEN: u32 = 65_535;
const PCAP_NETWORK: u32 = 147; // LINKTYPE_USER0

/// Frame direction recorded in the first byte of each packet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CaptureDirection {
    /// Host to gateway
    Inbound = 0,
    /// Gateway to host
    Outbound = 1,
}

/// PCAP writer for host link traffic
pub struct FrameCapture<W: Write = BufWriter<File>> {
    out: W,
}

impl FrameCapture {
    /// Create a capture file, truncating any existing one.
    pub fn create(path: &Path) -> io::Result<Self> {
        Self::new(BufWriter::new(File::create(path)?))
    }
}

impl<W: Write> FrameCapture<W> {
    /// Start a capture on any writer.
    pub fn new(mut out: W) -> io::Result<Self> {
        write_global_header(&mut out)?;
        Ok(Self { out })
    }

    /// Record a frame with the current system time.
    pub fn record(&mut self, direction: CaptureDirection, frame: &[u8]) -> io::Result<()> {
        let (sec, usec) = micros(SystemTime::now());
        let length = u32::try_from(frame.len() + 1).unwrap_or(PCAP_SNAPLEN);
        let mut header = [0u8; 16];
        header[0..4].copy_from_slice(&sec.to_le_bytes());
        header[4..8].copy_from_slice(&usec.to_le_bytes());
        header[8..12].copy_from_slice(&length.to_le_bytes());
        header[12..16].copy_from_slice(&length.to_le_bytes());

        self.out.write_all(&header)?;
        self.out.write_all(&[direction as u8])?;
        self.out.write_all(frame)?;
        self.out.flush()
    }

    /// Finish the capture and return the writer.
    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> std::fmt::Debug for FrameCapture<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameCapture").finish_non_exhaustive()
    }
}

fn write_global_header(out: &mut impl Write) -> io::Result<()> {
    let mut header = [0u8; 24];
    header[0..4].copy_from_slice(&PCAP_MAGIC.to_le_bytes());
    header[4..6].copy_from_slice(&PCAP_VERSION_MAJOR.to_le_bytes());
    header[6..8].copy_from_slice(&PCAP_VERSION_MINOR.to_le_bytes());
    header[8..12].copy_from_slice(&PCAP_THISZONE.to_le_bytes());
    header[12..16].copy_from_slice(&PCAP_SIGFIGS.to_le_bytes());
    header[16..20].copy_from_slice(&PCAP_SNAPLEN.to_le_bytes());
    header[20..24].copy_from_slice(&PCAP_NETWORK.to_le_bytes());
    out.write_all(&header)
}

fn micros(timestamp: SystemTime) -> (u32, u32) {
    let duration = timestamp.duration_since(UNIX_EPOCH).unwrap_or_default();
    let secs = u32::try_from(duration.as_secs()).unwrap_or(u32::MAX);
    (secs, duration.subsec_micros())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_direction_and_frame() {
        let mut capture = FrameCapture::new(Vec::new()).unwrap();
        capture
            .record(CaptureDirection::Outbound, &[0x81, 0x00, 0x81])
            .unwrap();
        let bytes = capture.into_inner();

        assert_eq!(bytes.len(), 24 + 16 + 4);
        assert_eq!(&bytes[20..24], &147u32.to_le_bytes());
        assert_eq!(&bytes[32..36], &4u32.to_le_bytes());
        assert_eq!(&bytes[40..], &[1, 0x81, 0x00, 0x81]);
    }
}
