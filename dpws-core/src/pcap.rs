//! Packet capture output in the classic libpcap format.

use crate::Time;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

/// The classic pcap magic number, written little-endian.
const MAGIC: u32 = 0xa1b2_c3d4;
/// LINKTYPE_RAW: packets begin at the IPv4 header, no link framing.
const LINKTYPE_RAW: u32 = 101;
const SNAPLEN: u32 = 65_535;

/// Writes one capture file for one simulated network device.
///
/// Record timestamps are virtual time, not wall-clock time, so two runs of
/// the same scenario produce byte-identical files.
#[derive(Debug)]
pub struct PcapWriter {
    out: BufWriter<File>,
    records: u64,
}

impl PcapWriter {
    /// Creates the file and writes the global header.
    pub fn create(path: &Path) -> io::Result<Self> {
        let mut out = BufWriter::new(File::create(path)?);
        out.write_all(&MAGIC.to_le_bytes())?;
        out.write_all(&2u16.to_le_bytes())?; // major version
        out.write_all(&4u16.to_le_bytes())?; // minor version
        out.write_all(&0i32.to_le_bytes())?; // timezone offset
        out.write_all(&0u32.to_le_bytes())?; // timestamp accuracy
        out.write_all(&SNAPLEN.to_le_bytes())?;
        out.write_all(&LINKTYPE_RAW.to_le_bytes())?;
        Ok(Self { out, records: 0 })
    }

    /// Appends one packet record stamped with the given virtual time.
    pub fn record(&mut self, at: Time, packet: &[u8]) -> io::Result<()> {
        let nanos = at.as_nanos();
        let seconds = (nanos / 1_000_000_000) as u32;
        let micros = (nanos % 1_000_000_000 / 1_000) as u32;
        let length = packet.len() as u32;
        self.out.write_all(&seconds.to_le_bytes())?;
        self.out.write_all(&micros.to_le_bytes())?;
        self.out.write_all(&length.min(SNAPLEN).to_le_bytes())?;
        self.out.write_all(&length.to_le_bytes())?;
        self.out.write_all(&packet[..packet.len().min(SNAPLEN as usize)])?;
        self.records += 1;
        Ok(())
    }

    pub fn records(&self) -> u64 {
        self.records
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.out.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_global_and_record_headers() -> anyhow::Result<()> {
        let dir = std::env::temp_dir().join("dpws-pcap-test");
        std::fs::create_dir_all(&dir)?;
        let path = dir.join("header.pcap");

        let mut writer = PcapWriter::create(&path)?;
        writer.record(Time::from_millis(1500), &[0x45, 0x00, 0x00, 0x14])?;
        writer.flush()?;
        drop(writer);

        let bytes = std::fs::read(&path)?;
        std::fs::remove_file(&path)?;
        assert_eq!(&bytes[0..4], &MAGIC.to_le_bytes());
        assert_eq!(&bytes[20..24], &LINKTYPE_RAW.to_le_bytes());
        // record header starts at offset 24: ts_sec 1, ts_usec 500000
        assert_eq!(&bytes[24..28], &1u32.to_le_bytes());
        assert_eq!(&bytes[28..32], &500_000u32.to_le_bytes());
        assert_eq!(&bytes[32..36], &4u32.to_le_bytes());
        assert_eq!(&bytes[36..40], &4u32.to_le_bytes());
        assert_eq!(&bytes[40..], &[0x45, 0x00, 0x00, 0x14]);
        Ok(())
    }
}
