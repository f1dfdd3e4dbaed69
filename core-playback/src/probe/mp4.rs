//! Minimal ISO BMFF (MP4/M4A) atom walk.
//!
//! Just enough of the box tree is read to parametrize a raw AAC decoder and
//! to find where the audio payload starts and ends. Access units are decoded
//! back to back from the first chunk, so chunks are assumed contiguous.
//!
//! Path: `moov/trak/mdia/mdhd` for timing, `moov/trak/mdia/minf/stbl/stsd`
//! for channel count and sample rate, `.../stbl/stsz` for access unit sizes,
//! `.../stbl/stco` (or `co64`) for chunk offsets, and the top-level `mdat`
//! enclosing the first chunk for the payload end.

use crate::error::{PlaybackError, Result};
use crate::traits::AccessUnitSizes;
use bridge_traits::StorageFile;
use byteorder::{BigEndian, ByteOrder};
use tracing::{debug, trace};

/// Convert a 4-byte tag to its big-endian FourCC code.
pub const fn fourcc(tag: &[u8; 4]) -> u32 {
    u32::from_be_bytes(*tag)
}

pub const FTYP: u32 = fourcc(b"ftyp");
pub const MOOV: u32 = fourcc(b"moov");
pub const TRAK: u32 = fourcc(b"trak");
pub const MDIA: u32 = fourcc(b"mdia");
pub const MDHD: u32 = fourcc(b"mdhd");
pub const MINF: u32 = fourcc(b"minf");
pub const STBL: u32 = fourcc(b"stbl");
pub const STSD: u32 = fourcc(b"stsd");
pub const STSZ: u32 = fourcc(b"stsz");
pub const STCO: u32 = fourcc(b"stco");
pub const CO64: u32 = fourcc(b"co64");
pub const MDAT: u32 = fourcc(b"mdat");

/// Convert a FourCC code to a printable string for logs and errors.
pub fn fourcc_to_string(cc: u32) -> String {
    cc.to_be_bytes()
        .iter()
        .map(|&b| if b.is_ascii_graphic() { b as char } else { '?' })
        .collect()
}

/// Location of a box in the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Atom {
    pub offset: u64,
    /// Total size including the header.
    pub size: u64,
    /// 8, or 16 for boxes with a 64-bit size.
    pub header_len: u64,
}

impl Atom {
    pub fn payload(&self) -> u64 {
        self.offset + self.header_len
    }

    pub fn end(&self) -> u64 {
        self.offset + self.size
    }
}

/// Byte range of the audio payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PayloadBounds {
    pub first_chunk_offset: u64,
    pub last_chunk_offset: u64,
    /// First byte past the payload: the end of the last access unit when
    /// sizes are known, else the end of the `mdat` box holding the chunks,
    /// else the end of the file.
    pub end_offset: u64,
}

/// What the atom walk extracted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerInfo {
    pub timescale: u32,
    pub duration_units: u64,
    pub duration_ms: u32,
    pub channels: u16,
    pub sample_rate: u32,
    pub sample_sizes: AccessUnitSizes,
    pub bounds: PayloadBounds,
}

fn read_at(file: &mut dyn StorageFile, offset: u64, buf: &mut [u8]) -> Option<()> {
    file.seek(offset).ok()?;
    file.read_exact(buf).ok()
}

fn read_u16_at(file: &mut dyn StorageFile, offset: u64) -> Option<u16> {
    let mut buf = [0u8; 2];
    read_at(file, offset, &mut buf)?;
    Some(BigEndian::read_u16(&buf))
}

fn read_u32_at(file: &mut dyn StorageFile, offset: u64) -> Option<u32> {
    let mut buf = [0u8; 4];
    read_at(file, offset, &mut buf)?;
    Some(BigEndian::read_u32(&buf))
}

fn read_u64_at(file: &mut dyn StorageFile, offset: u64) -> Option<u64> {
    let mut buf = [0u8; 8];
    read_at(file, offset, &mut buf)?;
    Some(BigEndian::read_u64(&buf))
}

/// Read the box header at `offset`. Boxes may not extend past `end`.
fn read_header(file: &mut dyn StorageFile, offset: u64, end: u64) -> Option<(u32, Atom)> {
    if offset.checked_add(8)? > end {
        return None;
    }

    let mut raw = [0u8; 8];
    read_at(file, offset, &mut raw)?;
    let size32 = BigEndian::read_u32(&raw[0..4]);
    let tag = BigEndian::read_u32(&raw[4..8]);

    let (size, header_len) = match size32 {
        // Extends to the end of the enclosing box
        0 => (end - offset, 8),
        1 => (read_u64_at(file, offset + 8)?, 16),
        n => (u64::from(n), 8),
    };

    if size < header_len || offset.checked_add(size)? > end {
        trace!(
            offset,
            size,
            tag = %fourcc_to_string(tag),
            "Malformed box size; ending walk"
        );
        return None;
    }

    Some((
        tag,
        Atom {
            offset,
            size,
            header_len,
        },
    ))
}

/// Scan sibling boxes in `[start, end)` for `tag`.
///
/// Returns `None` once the siblings are exhausted or a header cannot be read.
pub fn find_atom(file: &mut dyn StorageFile, tag: u32, start: u64, end: u64) -> Option<Atom> {
    let mut position = start;
    while let Some((found, atom)) = read_header(file, position, end) {
        trace!(offset = atom.offset, size = atom.size, tag = %fourcc_to_string(found), "Box");
        if found == tag {
            return Some(atom);
        }
        position = atom.end();
    }
    None
}

/// Sibling boxes in `[start, end)` with the given tag.
fn find_all(file: &mut dyn StorageFile, tag: u32, start: u64, end: u64) -> Vec<Atom> {
    let mut atoms = Vec::new();
    let mut position = start;
    while let Some(atom) = find_atom(file, tag, position, end) {
        position = atom.end();
        atoms.push(atom);
    }
    atoms
}

fn missing(tag: u32) -> PlaybackError {
    PlaybackError::FormatUnsupported(format!("MP4 without '{}' box", fourcc_to_string(tag)))
}

fn truncated(tag: u32) -> PlaybackError {
    PlaybackError::FormatUnsupported(format!("truncated '{}' box", fourcc_to_string(tag)))
}

fn require(file: &mut dyn StorageFile, tag: u32, parent: &Atom) -> Result<Atom> {
    find_atom(file, tag, parent.payload(), parent.end()).ok_or_else(|| missing(tag))
}

/// Whether the stream starts with an `ftyp` box.
pub fn is_container(file: &mut dyn StorageFile) -> bool {
    let size = file.size();
    matches!(read_header(file, 0, size), Some((FTYP, _)))
}

/// Walk the box tree of a stream that [`is_container`].
pub fn walk(file: &mut dyn StorageFile) -> Result<ContainerInfo> {
    let file_size = file.size();
    let root = Atom {
        offset: 0,
        size: file_size,
        header_len: 0,
    };

    let moov = require(file, MOOV, &root)?;
    let trak = require(file, TRAK, &moov)?;
    let mdia = require(file, MDIA, &trak)?;

    let mdhd = require(file, MDHD, &mdia)?;
    let (timescale, duration_units) = read_media_header(file, &mdhd)?;
    if timescale == 0 {
        return Err(PlaybackError::FormatUnsupported(
            "mdhd timescale is zero".to_string(),
        ));
    }
    let duration_ms = u32::try_from(duration_units.saturating_mul(1000) / u64::from(timescale))
        .unwrap_or(u32::MAX);

    let minf = require(file, MINF, &mdia)?;
    let stbl = require(file, STBL, &minf)?;
    let stsd = require(file, STSD, &stbl)?;
    let (channels, sample_rate) = read_sample_description(file, &stsd)?;
    let sample_sizes = match find_atom(file, STSZ, stbl.payload(), stbl.end()) {
        Some(stsz) => read_sample_sizes(file, &stsz)?,
        None => AccessUnitSizes::Unknown,
    };

    let (first_chunk_offset, last_chunk_offset) =
        match find_atom(file, STCO, stbl.payload(), stbl.end()) {
            Some(stco) => read_chunk_offsets(file, &stco, STCO, 4)?,
            None => {
                let co64 = find_atom(file, CO64, stbl.payload(), stbl.end())
                    .ok_or_else(|| missing(STCO))?;
                read_chunk_offsets(file, &co64, CO64, 8)?
            }
        };

    if first_chunk_offset >= file_size || last_chunk_offset < first_chunk_offset {
        return Err(PlaybackError::FormatUnsupported(format!(
            "chunk offsets {}..{} outside a {} byte file",
            first_chunk_offset, last_chunk_offset, file_size
        )));
    }

    let mdat_end = find_all(file, MDAT, 0, file_size)
        .into_iter()
        .find(|mdat| mdat.payload() <= first_chunk_offset && first_chunk_offset < mdat.end())
        .map(|mdat| mdat.end())
        .filter(|&end| end > last_chunk_offset)
        .unwrap_or(file_size);
    let end_offset = match sample_sizes.total_bytes() {
        Some(total) if first_chunk_offset + total > last_chunk_offset => {
            mdat_end.min(first_chunk_offset + total)
        }
        _ => mdat_end,
    };

    let info = ContainerInfo {
        timescale,
        duration_units,
        duration_ms,
        channels,
        sample_rate,
        sample_sizes,
        bounds: PayloadBounds {
            first_chunk_offset,
            last_chunk_offset,
            end_offset,
        },
    };
    debug!(
        channels = info.channels,
        sample_rate = info.sample_rate,
        duration_ms = info.duration_ms,
        access_units = info.sample_sizes.len(),
        bounds = ?info.bounds,
        "MP4 container parsed"
    );
    Ok(info)
}

/// `(timescale, duration)` from an `mdhd` box, version 0 or 1.
fn read_media_header(file: &mut dyn StorageFile, mdhd: &Atom) -> Result<(u32, u64)> {
    let base = mdhd.payload();
    let mut version = [0u8; 1];
    read_at(file, base, &mut version).ok_or_else(|| truncated(MDHD))?;

    let fields = match version[0] {
        0 => read_u32_at(file, base + 0x0C)
            .zip(read_u32_at(file, base + 0x10).map(u64::from)),
        1 => read_u32_at(file, base + 0x14).zip(read_u64_at(file, base + 0x18)),
        v => {
            return Err(PlaybackError::FormatUnsupported(format!(
                "mdhd version {}",
                v
            )))
        }
    };
    fields.ok_or_else(|| truncated(MDHD))
}

/// `(channels, sample_rate)` from the first sample entry of an `stsd` box.
fn read_sample_description(file: &mut dyn StorageFile, stsd: &Atom) -> Result<(u16, u32)> {
    // version/flags (4), entry count (4), then the AudioSampleEntry:
    // size (4), format (4), reserved (6), data ref (2), reserved (8),
    // channels (2) at +0x20, sample size (2), reserved (4),
    // 16.16 sample rate at +0x28
    let base = stsd.payload();
    if stsd.end() < base + 0x2C {
        return Err(truncated(STSD));
    }
    let channels = read_u16_at(file, base + 0x20).ok_or_else(|| truncated(STSD))?;
    let rate_integer = read_u16_at(file, base + 0x28).ok_or_else(|| truncated(STSD))?;
    Ok((channels, u32::from(rate_integer)))
}

/// Access unit sizes from an `stsz` box: one shared size, or a table.
fn read_sample_sizes(file: &mut dyn StorageFile, stsz: &Atom) -> Result<AccessUnitSizes> {
    // version/flags (4), sample size (4), sample count (4), entries
    let base = stsz.payload();
    let size = read_u32_at(file, base + 4).ok_or_else(|| truncated(STSZ))?;
    let count = read_u32_at(file, base + 8).ok_or_else(|| truncated(STSZ))?;
    if count == 0 {
        return Err(PlaybackError::FormatUnsupported(
            "empty 'stsz' table".to_string(),
        ));
    }
    if size != 0 {
        return Ok(AccessUnitSizes::Uniform { size, count });
    }

    let entries = base + 12;
    let len = u64::from(count) * 4;
    if entries + len > stsz.end() {
        return Err(truncated(STSZ));
    }

    let mut sizes: Vec<u32> = Vec::new();
    sizes.try_reserve_exact(count as usize).map_err(|_| {
        PlaybackError::OutOfMemory(format!("{} entry sample size table", count))
    })?;

    let mut block = [0u8; 512];
    let mut at = entries;
    let mut remaining = count as usize;
    while remaining > 0 {
        let n = remaining.min(block.len() / 4);
        let bytes = &mut block[..n * 4];
        read_at(file, at, bytes).ok_or_else(|| truncated(STSZ))?;
        sizes.extend(bytes.chunks_exact(4).map(BigEndian::read_u32));
        at += bytes.len() as u64;
        remaining -= n;
    }
    Ok(AccessUnitSizes::Table(sizes.into()))
}

/// First and last entries of a chunk offset table with `width`-byte entries.
fn read_chunk_offsets(
    file: &mut dyn StorageFile,
    table: &Atom,
    tag: u32,
    width: u64,
) -> Result<(u64, u64)> {
    let base = table.payload();
    let count = read_u32_at(file, base + 4).ok_or_else(|| truncated(tag))?;
    if count == 0 {
        return Err(PlaybackError::FormatUnsupported(format!(
            "empty '{}' chunk table",
            fourcc_to_string(tag)
        )));
    }

    let entries = base + 8;
    let last = entries + (u64::from(count) - 1) * width;
    if last + width > table.end() {
        return Err(truncated(tag));
    }

    let first = read_offset_entry(file, entries, width).ok_or_else(|| truncated(tag))?;
    let last = read_offset_entry(file, last, width).ok_or_else(|| truncated(tag))?;
    Ok((first, last))
}

fn read_offset_entry(file: &mut dyn StorageFile, at: u64, width: u64) -> Option<u64> {
    if width == 8 {
        read_u64_at(file, at)
    } else {
        read_u32_at(file, at).map(u64::from)
    }
}
