//! LZX decompression as used by XNB containers.
//!
//! [`LzxDecoder`] decodes one frame at a time and keeps its sliding window,
//! repeated-offset registers and Huffman code lengths between frames.
//! [`LzxCodec`] adds the XNB frame envelope on top and plugs into the
//! container as a [`BlockCodec`].

use tracing::{debug, trace};

use crate::bits::LzxBitReader;
use crate::codec::BlockCodec;
use crate::error::{Result, XnbError};

// ── Constants ──────────────────────────────────────────────────────────────

/// Window size used by XNB: 64 KB.
pub const XNB_WINDOW_BITS: u32 = 16;

/// Default uncompressed frame size.
pub const FRAME_SIZE: usize = 0x8000;

const MIN_MATCH: usize = 2;
const NUM_CHARS: usize = 256;
const NUM_PRIMARY_LENGTHS: usize = 7;
const NUM_SECONDARY_LENGTHS: usize = 249;

const PRETREE_MAXSYMBOLS: usize = 20;
const PRETREE_TABLEBITS: u32 = 6;
const MAINTREE_MAXSYMBOLS: usize = NUM_CHARS + 50 * 8;
const MAINTREE_TABLEBITS: u32 = 12;
const LENGTH_MAXSYMBOLS: usize = NUM_SECONDARY_LENGTHS + 1;
const LENGTH_TABLEBITS: u32 = 12;
const ALIGNED_MAXSYMBOLS: usize = 8;
const ALIGNED_TABLEBITS: u32 = 7;

/// Slack after each code-length array so a zero run that overshoots the
/// requested range still lands in bounds.
const LENTABLE_SAFETY: usize = 64;

const BLOCKTYPE_VERBATIM: u32 = 1;
const BLOCKTYPE_ALIGNED: u32 = 2;
const BLOCKTYPE_UNCOMPRESSED: u32 = 3;

const POSITION_SLOTS: usize = 51;

/// Extra offset bits per position slot: 0,0,0,0,1,1,2,2,... capped at 17.
pub const EXTRA_BITS: [u8; POSITION_SLOTS + 1] = build_extra_bits();

/// Base match offset per position slot.
pub const POSITION_BASE: [u32; POSITION_SLOTS + 1] = build_position_base();

const fn build_extra_bits() -> [u8; POSITION_SLOTS + 1] {
    let mut table = [0u8; POSITION_SLOTS + 1];
    let mut i = 0;
    let mut j = 0u8;
    while i <= 50 {
        table[i] = j;
        table[i + 1] = j;
        if i != 0 && j < 17 {
            j += 1;
        }
        i += 2;
    }
    table
}

const fn build_position_base() -> [u32; POSITION_SLOTS + 1] {
    let mut table = [0u32; POSITION_SLOTS + 1];
    let mut i = 0;
    let mut j = 0u32;
    while i <= 50 {
        table[i] = j;
        j += 1 << EXTRA_BITS[i];
        i += 1;
    }
    table
}

// ── Huffman tables ─────────────────────────────────────────────────────────

/// Build a canonical-Huffman decode table from code lengths.
///
/// The first `1 << bits` entries map every `bits`-bit prefix straight to a
/// symbol. Codes longer than `bits` continue into a binary trie stored after
/// those entries: a slot holding a value `>= symbols` is an internal node
/// whose children live at `2 * value` and `2 * value + 1`.
///
/// A table whose lengths are all zero is accepted and decodes nothing.
pub fn decode_table(symbols: usize, bits: u32, lengths: &[u8], table: &mut [u16]) -> Result<()> {
    let overrun = || XnbError::HuffmanTableOverrun;
    let lengths = lengths.get(..symbols).ok_or_else(overrun)?;

    let mut pos: u32 = 0;
    let mut table_mask: u32 = 1 << bits;
    let mut bit_mask: u32 = table_mask >> 1;

    // Codes that fit the direct-lookup part.
    for bit_num in 1..=bits {
        for (sym, &len) in lengths.iter().enumerate() {
            if u32::from(len) != bit_num {
                continue;
            }
            let leaf = pos;
            pos += bit_mask;
            if pos > table_mask {
                return Err(overrun());
            }
            table
                .get_mut(leaf as usize..pos as usize)
                .ok_or_else(overrun)?
                .fill(sym as u16);
        }
        bit_mask >>= 1;
    }

    if pos == table_mask {
        return Ok(());
    }

    // Mark the unused direct entries, then hang longer codes off them.
    table
        .get_mut(pos as usize..table_mask as usize)
        .ok_or_else(overrun)?
        .fill(0xFFFF);

    let mut next_symbol = (table_mask >> 1).max(symbols as u32);
    pos <<= 16;
    table_mask <<= 16;
    bit_mask = 1 << 15;

    for bit_num in (bits + 1)..=16 {
        for (sym, &len) in lengths.iter().enumerate() {
            if u32::from(len) != bit_num {
                continue;
            }
            let mut leaf = pos >> 16;
            for fill in 0..(bit_num - bits) {
                let slot = table.get(leaf as usize).copied().ok_or_else(overrun)?;
                if slot == 0xFFFF {
                    let child = (next_symbol << 1) as usize;
                    table.get_mut(child..child + 2).ok_or_else(overrun)?.fill(0xFFFF);
                    table[leaf as usize] = next_symbol as u16;
                    next_symbol += 1;
                }
                leaf = u32::from(table[leaf as usize]) << 1;
                if (pos >> (15 - fill)) & 1 != 0 {
                    leaf += 1;
                }
            }
            *table.get_mut(leaf as usize).ok_or_else(overrun)? = sym as u16;
            pos += bit_mask;
            if pos > table_mask {
                return Err(overrun());
            }
        }
        bit_mask >>= 1;
    }

    if pos == table_mask {
        return Ok(());
    }
    if lengths.iter().all(|&len| len == 0) {
        return Ok(());
    }
    Err(overrun())
}

// ── Decoder state ──────────────────────────────────────────────────────────

/// One Huffman tree: code lengths plus the decode table built from them.
#[derive(Debug, Clone)]
struct Tree {
    lengths: Vec<u8>,
    table: Vec<u16>,
    symbols: usize,
    bits: u32,
}

impl Tree {
    fn new(symbols: usize, bits: u32) -> Self {
        Self {
            lengths: vec![0; symbols + LENTABLE_SAFETY],
            table: vec![0; (1 << bits) + (symbols << 1)],
            symbols,
            bits,
        }
    }

    fn rebuild(&mut self, symbols: usize) -> Result<()> {
        decode_table(symbols, self.bits, &self.lengths, &mut self.table)
    }

    fn read_symbol(&self, bits: &mut LzxBitReader<'_>) -> Result<usize> {
        bits.read_huff_symbol(&self.table, &self.lengths, self.symbols, self.bits)
    }
}

/// Stateful LZX frame decoder.
#[derive(Debug, Clone)]
pub struct LzxDecoder {
    window: Vec<u8>,
    window_size: usize,
    window_posn: usize,
    main_elements: usize,

    r0: u32,
    r1: u32,
    r2: u32,

    header_read: bool,
    block_type: u32,
    block_length: usize,
    block_remaining: usize,

    pretree: Tree,
    maintree: Tree,
    length: Tree,
    aligned: Tree,
}

impl LzxDecoder {
    /// Create a decoder for a `2^window_bits` byte window (15..=21).
    pub fn new(window_bits: u32) -> Result<Self> {
        if !(15..=21).contains(&window_bits) {
            return Err(XnbError::InvalidWindowSize(window_bits));
        }
        let window_size = 1usize << window_bits;
        let position_slots = match window_bits {
            21 => 50,
            20 => 42,
            bits => (bits as usize) << 1,
        };

        Ok(Self {
            window: vec![0; window_size],
            window_size,
            window_posn: 0,
            main_elements: NUM_CHARS + (position_slots << 3),
            r0: 1,
            r1: 1,
            r2: 1,
            header_read: false,
            block_type: 0,
            block_length: 0,
            block_remaining: 0,
            pretree: Tree::new(PRETREE_MAXSYMBOLS, PRETREE_TABLEBITS),
            maintree: Tree::new(MAINTREE_MAXSYMBOLS, MAINTREE_TABLEBITS),
            length: Tree::new(LENGTH_MAXSYMBOLS, LENGTH_TABLEBITS),
            aligned: Tree::new(ALIGNED_MAXSYMBOLS, ALIGNED_TABLEBITS),
        })
    }

    /// Current repeated-offset registers `(R0, R1, R2)`.
    pub fn repeated_offsets(&self) -> (u32, u32, u32) {
        (self.r0, self.r1, self.r2)
    }

    /// Decode one frame of `frame_size` output bytes from `bits`.
    ///
    /// `block_end` is the byte position in the input where this frame's
    /// compressed data ends; raw copies from uncompressed blocks may not
    /// cross it.
    pub fn decompress(&mut self, bits: &mut LzxBitReader<'_>, frame_size: usize, block_end: usize) -> Result<Vec<u8>> {
        if frame_size > self.window_size {
            return Err(XnbError::InvalidFrameSize {
                frame: frame_size,
                block: block_end,
            });
        }

        if !self.header_read {
            if bits.read_bits(1) != 0 {
                return Err(XnbError::UnsupportedIntelE8);
            }
            self.header_read = true;
        }

        let mut togo = frame_size;
        while togo > 0 {
            if self.block_remaining == 0 {
                self.read_block_header(bits)?;
            }

            let run = self.block_remaining.min(togo);
            self.window_posn &= self.window_size - 1;
            if self.window_posn + run > self.window_size {
                return Err(XnbError::WindowOverrun {
                    position: self.window_posn,
                    run,
                    window: self.window_size,
                });
            }

            let produced = match self.block_type {
                BLOCKTYPE_VERBATIM | BLOCKTYPE_ALIGNED => self.decode_run(bits, run)?,
                BLOCKTYPE_UNCOMPRESSED => self.copy_run(bits, run, block_end)?,
                other => return Err(XnbError::InvalidBlockType(other)),
            };

            // Matches never cross a block or frame boundary.
            if produced != run {
                return Err(XnbError::WindowOverrun {
                    position: self.window_posn,
                    run: produced,
                    window: self.window_size,
                });
            }
            self.block_remaining -= run;
            togo -= run;
        }

        bits.align();
        bits.check_bounds()?;

        let end = if self.window_posn == 0 { self.window_size } else { self.window_posn };
        let start = end.checked_sub(frame_size).ok_or(XnbError::WindowOverrun {
            position: self.window_posn,
            run: frame_size,
            window: self.window_size,
        })?;
        Ok(self.window[start..end].to_vec())
    }

    fn read_block_header(&mut self, bits: &mut LzxBitReader<'_>) -> Result<()> {
        // An odd-length uncompressed block is followed by one pad byte, and
        // the bitstream restarts on the next byte.
        if self.block_type == BLOCKTYPE_UNCOMPRESSED {
            if self.block_length & 1 == 1 {
                bits.read_raw(1)?;
            }
            bits.seek(bits.byte_position())?;
        }

        self.block_type = bits.read_bits(3);
        let hi = bits.read_bits(16) as usize;
        let lo = bits.read_bits(8) as usize;
        self.block_length = (hi << 8) | lo;
        self.block_remaining = self.block_length;
        trace!(block_type = self.block_type, length = self.block_length, "lzx block");

        match self.block_type {
            BLOCKTYPE_ALIGNED => {
                for i in 0..ALIGNED_MAXSYMBOLS {
                    self.aligned.lengths[i] = bits.read_bits(3) as u8;
                }
                self.aligned.rebuild(ALIGNED_MAXSYMBOLS)?;
                self.read_main_and_length_trees(bits)
            }
            BLOCKTYPE_VERBATIM => self.read_main_and_length_trees(bits),
            BLOCKTYPE_UNCOMPRESSED => {
                // 1 to 16 bits of padding up to the next word boundary, as
                // libmspack and MonoGame's LzxDecoder do: an aligned stream
                // still skips a whole word.
                if bits.bit_offset() == 0 {
                    bits.skip_bits(16);
                } else {
                    bits.align();
                }
                self.r0 = bits.read_i32_le()? as u32;
                self.r1 = bits.read_i32_le()? as u32;
                self.r2 = bits.read_i32_le()? as u32;
                Ok(())
            }
            other => Err(XnbError::InvalidBlockType(other)),
        }
    }

    fn read_main_and_length_trees(&mut self, bits: &mut LzxBitReader<'_>) -> Result<()> {
        read_lengths(&mut self.pretree, &mut self.maintree.lengths, 0, NUM_CHARS, bits)?;
        read_lengths(&mut self.pretree, &mut self.maintree.lengths, NUM_CHARS, self.main_elements, bits)?;
        self.maintree.rebuild(self.main_elements)?;
        read_lengths(&mut self.pretree, &mut self.length.lengths, 0, NUM_SECONDARY_LENGTHS, bits)?;
        self.length.rebuild(LENGTH_MAXSYMBOLS)
    }

    /// Decode literals and matches until at least `run` bytes are produced.
    /// Returns the number of bytes actually written.
    fn decode_run(&mut self, bits: &mut LzxBitReader<'_>, run: usize) -> Result<usize> {
        let aligned = self.block_type == BLOCKTYPE_ALIGNED;
        let mut produced = 0;

        while produced < run {
            let main = self.maintree.read_symbol(bits)?;
            if main < NUM_CHARS {
                self.window[self.window_posn] = main as u8;
                self.window_posn += 1;
                produced += 1;
                continue;
            }

            let main = main - NUM_CHARS;
            let mut match_length = main & NUM_PRIMARY_LENGTHS;
            if match_length == NUM_PRIMARY_LENGTHS {
                match_length += self.length.read_symbol(bits)?;
            }
            match_length += MIN_MATCH;

            let slot = main >> 3;
            let match_offset = if slot > 2 {
                let extra = u32::from(EXTRA_BITS[slot]);
                let base = POSITION_BASE[slot] - 2;
                let offset = if !aligned {
                    base + bits.read_bits(extra)
                } else if extra > 3 {
                    let verbatim = bits.read_bits(extra - 3) << 3;
                    base + verbatim + self.aligned.read_symbol(bits)? as u32
                } else if extra == 3 {
                    base + self.aligned.read_symbol(bits)? as u32
                } else if extra > 0 {
                    base + bits.read_bits(extra)
                } else {
                    1
                };
                self.r2 = self.r1;
                self.r1 = self.r0;
                self.r0 = offset;
                offset
            } else if slot == 0 {
                self.r0
            } else if slot == 1 {
                std::mem::swap(&mut self.r0, &mut self.r1);
                self.r0
            } else {
                std::mem::swap(&mut self.r0, &mut self.r2);
                self.r0
            };

            self.copy_match(match_offset as usize, match_length)?;
            produced += match_length;
        }
        Ok(produced)
    }

    /// Copy `length` bytes from `offset` bytes back, wrapping through the end
    /// of the window when the source precedes position 0. Source and
    /// destination may overlap.
    fn copy_match(&mut self, offset: usize, length: usize) -> Result<()> {
        let dest = self.window_posn;
        if offset == 0 || offset > self.window_size || dest + length > self.window_size {
            return Err(XnbError::WindowOverrun {
                position: dest,
                run: length,
                window: self.window_size,
            });
        }

        let mut out = dest;
        let mut remaining = length;
        let mut src = if dest >= offset {
            dest - offset
        } else {
            let src = dest + self.window_size - offset;
            let wrapped = offset - dest;
            if wrapped < remaining {
                for i in 0..wrapped {
                    self.window[out + i] = self.window[src + i];
                }
                out += wrapped;
                remaining -= wrapped;
                0
            } else {
                src
            }
        };

        for _ in 0..remaining {
            self.window[out] = self.window[src];
            out += 1;
            src += 1;
        }
        self.window_posn = out;
        Ok(())
    }

    fn copy_run(&mut self, bits: &mut LzxBitReader<'_>, run: usize, block_end: usize) -> Result<usize> {
        if bits.byte_position() + run > block_end {
            return Err(XnbError::OutOfBounds {
                offset: bits.byte_position(),
                requested: run,
                len: block_end,
            });
        }
        let raw = bits.read_raw(run)?;
        self.window[self.window_posn..self.window_posn + run].copy_from_slice(raw);
        self.window_posn += run;
        Ok(run)
    }
}

/// Read code lengths `first..last` of `lengths` as deltas against their
/// previous values, using a freshly transmitted pretree.
fn read_lengths(
    pretree: &mut Tree,
    lengths: &mut [u8],
    first: usize,
    last: usize,
    bits: &mut LzxBitReader<'_>,
) -> Result<()> {
    for i in 0..PRETREE_MAXSYMBOLS {
        pretree.lengths[i] = bits.read_bits(4) as u8;
    }
    pretree.rebuild(PRETREE_MAXSYMBOLS)?;

    let overrun = || XnbError::HuffmanTableOverrun;
    let delta = |old: u8, sym: usize| ((i32::from(old) - sym as i32).rem_euclid(17)) as u8;

    let mut i = first;
    while i < last {
        let sym = pretree.read_symbol(bits)?;
        match sym {
            17 => {
                let zeros = bits.read_bits(4) as usize + 4;
                lengths.get_mut(i..i + zeros).ok_or_else(overrun)?.fill(0);
                i += zeros;
            }
            18 => {
                let zeros = bits.read_bits(5) as usize + 20;
                lengths.get_mut(i..i + zeros).ok_or_else(overrun)?.fill(0);
                i += zeros;
            }
            19 => {
                let same = bits.read_bits(1) as usize + 4;
                let sym = pretree.read_symbol(bits)?;
                let slots = lengths.get_mut(i..i + same).ok_or_else(overrun)?;
                let value = delta(slots[0], sym);
                slots.fill(value);
                i += same;
            }
            _ => {
                let slot = lengths.get_mut(i).ok_or_else(overrun)?;
                *slot = delta(*slot, sym);
                i += 1;
            }
        }
    }
    Ok(())
}

// ── XNB frame envelope ─────────────────────────────────────────────────────

/// LZX as a container-level block codec.
///
/// The compressed payload is a sequence of frames, each prefixed by either
/// `0xFF, frame_size: u16 BE, block_size: u16 BE` or just
/// `block_size: u16 BE` with an implied frame size of 0x8000. A zero size
/// ends the stream.
#[derive(Debug, Clone, Copy)]
pub struct LzxCodec {
    pub window_bits: u32,
}

impl Default for LzxCodec {
    fn default() -> Self {
        Self {
            window_bits: XNB_WINDOW_BITS,
        }
    }
}

impl BlockCodec for LzxCodec {
    fn name(&self) -> &'static str {
        "lzx"
    }

    fn compress_block(&self, _raw: &[u8]) -> Result<Vec<u8>> {
        Err(XnbError::Compression("LZX compression is not supported".into()))
    }

    fn decompress_block(&self, compressed: &[u8], raw_len: usize) -> Result<Vec<u8>> {
        let mut decoder = LzxDecoder::new(self.window_bits)?;
        let mut bits = LzxBitReader::new(compressed);
        let mut out = Vec::with_capacity(raw_len);
        let mut frames = 0usize;

        let mut pos = 0usize;
        while pos < compressed.len() {
            let header = compressed.get(pos..).unwrap_or_default();
            let (frame_size, block_size, header_len) = match header {
                [0xFF, f0, f1, b0, b1, ..] => (
                    usize::from(u16::from_be_bytes([*f0, *f1])),
                    usize::from(u16::from_be_bytes([*b0, *b1])),
                    5,
                ),
                [b0, b1, ..] => (FRAME_SIZE, usize::from(u16::from_be_bytes([*b0, *b1])), 2),
                _ => break,
            };
            if frame_size == 0 || block_size == 0 {
                break;
            }

            let start = pos + header_len;
            let end = start + block_size;
            if end > compressed.len() {
                return Err(XnbError::OutOfBounds {
                    offset: start,
                    requested: block_size,
                    len: compressed.len(),
                });
            }

            bits.seek(start)?;
            let frame = decoder.decompress(&mut bits, frame_size, end)?;
            out.extend_from_slice(&frame);
            frames += 1;
            pos = end;
        }

        debug!(frames, raw = out.len(), compressed = compressed.len(), "lzx decompressed");
        if out.len() < raw_len {
            return Err(XnbError::SizeMismatch {
                expected: raw_len,
                actual: out.len(),
            });
        }
        out.truncate(raw_len);
        Ok(out)
    }
}
