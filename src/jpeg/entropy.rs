//! Packing quantized blocks into one entropy-coded stream and back.
//!
//! The stream holds every Y block, then every Cb block, then every Cr
//! block, each channel in raster order. There is no framing: the decoder
//! needs the tables and the image size to know where channels end.
//!
//! Code tables for the three channels are independent and are built on
//! separate threads. Bit packing runs on the calling thread only.

use std::thread;

use tracing::{debug, trace};

use crate::bits::BitWriter;
use crate::decode::bit_reader::BitReader;
use crate::error::{Error, Result};
use crate::jpeg::block::{from_zigzag, grid, BlockPos, Channel, QuantizedBlock};
use crate::jpeg::huffman::{category, count_frequencies, extend, magnitude, CodeTable};

/// AC symbol for a run of 16 zeros.
const ZRL: i32 = 0xF0;
/// AC symbol closing a block whose remaining coefficients are zero.
const EOB: i32 = 0x00;

/// How coefficients are mapped to Huffman symbols.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EntropyCoding {
    /// Every zigzag coefficient is one symbol, with one table per channel.
    #[default]
    Coefficient,
    /// Baseline JPEG style: DC differences and AC run/size pairs, with
    /// separate DC and AC tables per channel.
    RunLength,
}

/// The code tables used for one channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelCodes {
    /// One table over raw coefficient values.
    Coefficient(CodeTable),
    /// Separate tables for DC categories and AC run/size symbols.
    RunLength {
        /// DC difference categories.
        dc: CodeTable,
        /// AC run/size symbols, ZRL and EOB.
        ac: CodeTable,
    },
}

impl ChannelCodes {
    /// Symbol mapping these codes were built for.
    pub fn coding(&self) -> EntropyCoding {
        match self {
            ChannelCodes::Coefficient(_) => EntropyCoding::Coefficient,
            ChannelCodes::RunLength { .. } => EntropyCoding::RunLength,
        }
    }
}

/// One independent set of codes per channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HuffmanTables {
    /// Y codes.
    pub luma: ChannelCodes,
    /// Cb codes.
    pub chroma_blue: ChannelCodes,
    /// Cr codes.
    pub chroma_red: ChannelCodes,
}

impl HuffmanTables {
    /// Codes for one channel.
    pub fn get(&self, channel: Channel) -> &ChannelCodes {
        match channel {
            Channel::Luma => &self.luma,
            Channel::ChromaBlue => &self.chroma_blue,
            Channel::ChromaRed => &self.chroma_red,
        }
    }

    /// Symbol mapping shared by all three channels.
    pub fn coding(&self) -> EntropyCoding {
        self.luma.coding()
    }
}

/// A symbol plus the raw bits that follow it.
#[derive(Debug, Clone, Copy)]
struct Token {
    ac: bool,
    symbol: i32,
    extra: u32,
    extra_len: u8,
}

impl Token {
    fn plain(symbol: i32) -> Self {
        Self {
            ac: false,
            symbol,
            extra: 0,
            extra_len: 0,
        }
    }
}

fn coefficient_tokens(blocks: &[&QuantizedBlock]) -> Vec<Token> {
    blocks
        .iter()
        .flat_map(|block| block.zigzag())
        .map(Token::plain)
        .collect()
}

fn run_length_tokens(blocks: &[&QuantizedBlock]) -> Result<Vec<Token>> {
    let mut tokens = Vec::with_capacity(blocks.len() * 8);
    let mut prev_dc = 0i32;

    for block in blocks {
        let zigzag = block.zigzag();

        let diff = zigzag[0] - prev_dc;
        prev_dc = zigzag[0];
        let cat = category(diff);
        tokens.push(Token {
            ac: false,
            symbol: cat as i32,
            extra: magnitude(diff),
            extra_len: cat,
        });

        let mut zero_run = 0;
        for &ac in &zigzag[1..] {
            if ac == 0 {
                zero_run += 1;
                continue;
            }
            while zero_run >= 16 {
                tokens.push(Token {
                    ac: true,
                    ..Token::plain(ZRL)
                });
                zero_run -= 16;
            }
            let cat = category(ac);
            if cat > 15 {
                return Err(Error::CorruptStream(format!(
                    "AC coefficient {ac} does not fit a run/size symbol"
                )));
            }
            tokens.push(Token {
                ac: true,
                symbol: (zero_run << 4) | cat as i32,
                extra: magnitude(ac),
                extra_len: cat,
            });
            zero_run = 0;
        }
        if zero_run > 0 {
            tokens.push(Token {
                ac: true,
                ..Token::plain(EOB)
            });
        }
    }

    Ok(tokens)
}

fn build_codes(tokens: &[Token], coding: EntropyCoding) -> Result<ChannelCodes> {
    match coding {
        EntropyCoding::Coefficient => {
            let frequencies = count_frequencies(tokens.iter().map(|t| t.symbol));
            Ok(ChannelCodes::Coefficient(CodeTable::from_frequencies(
                &frequencies,
            )?))
        }
        EntropyCoding::RunLength => {
            let dc = count_frequencies(tokens.iter().filter(|t| !t.ac).map(|t| t.symbol));
            let ac = count_frequencies(tokens.iter().filter(|t| t.ac).map(|t| t.symbol));
            Ok(ChannelCodes::RunLength {
                dc: CodeTable::from_frequencies(&dc)?,
                ac: CodeTable::from_frequencies(&ac)?,
            })
        }
    }
}

fn write_tokens(writer: &mut BitWriter, tokens: &[Token], codes: &ChannelCodes) -> Result<()> {
    for token in tokens {
        let table = match codes {
            ChannelCodes::Coefficient(table) => table,
            ChannelCodes::RunLength { dc, ac } => {
                if token.ac {
                    ac
                } else {
                    dc
                }
            }
        };
        table.encode(writer, token.symbol)?;
        if token.extra_len > 0 {
            writer.write_bits(token.extra, token.extra_len)?;
        }
    }
    Ok(())
}

/// Build per-channel tables and pack `blocks` into a byte-stuffed stream.
///
/// Blocks may arrive in any order; they are sorted into stream order
/// first, so the output depends only on the set of blocks.
pub fn encode_channels(
    blocks: &[QuantizedBlock],
    coding: EntropyCoding,
) -> Result<(Vec<u8>, HuffmanTables)> {
    let mut ordered: Vec<&QuantizedBlock> = blocks.iter().collect();
    ordered.sort_by_key(|b| b.pos);

    let mut per_channel: [Vec<&QuantizedBlock>; 3] = Default::default();
    for block in ordered {
        per_channel[block.channel().index()].push(block);
    }

    let tokens: [Vec<Token>; 3] = match coding {
        EntropyCoding::Coefficient => per_channel.each_ref().map(|b| coefficient_tokens(b)),
        EntropyCoding::RunLength => {
            let [y, cb, cr] = &per_channel;
            [
                run_length_tokens(y)?,
                run_length_tokens(cb)?,
                run_length_tokens(cr)?,
            ]
        }
    };

    let [luma, chroma_blue, chroma_red] = thread::scope(|scope| {
        let handles = Channel::ALL.map(|channel| {
            let tokens = &tokens[channel.index()];
            scope.spawn(move || {
                let codes = build_codes(tokens, coding)?;
                trace!(channel = channel.name(), tokens = tokens.len(), "built code table");
                Ok::<_, Error>(codes)
            })
        });
        handles.map(|h| h.join().map_err(Error::from_panic).and_then(|r| r))
    });
    let tables = HuffmanTables {
        luma: luma?,
        chroma_blue: chroma_blue?,
        chroma_red: chroma_red?,
    };

    let mut writer = BitWriter::with_capacity(blocks.len() * 16);
    for channel in Channel::ALL {
        write_tokens(&mut writer, &tokens[channel.index()], tables.get(channel))?;
    }
    let bits = writer.bit_len();
    let data = writer.finish();

    debug!(
        blocks = blocks.len(),
        bits,
        bytes = data.len(),
        ?coding,
        "packed entropy-coded stream"
    );
    Ok((data, tables))
}

/// Parse a stream written by [`encode_channels`] for an image of the given
/// size. Blocks come back in stream order.
pub fn decode_channels(
    data: &[u8],
    tables: &HuffmanTables,
    width: u32,
    height: u32,
) -> Result<Vec<QuantizedBlock>> {
    let mut reader = BitReader::new(data);
    let mut blocks = Vec::new();

    for channel in Channel::ALL {
        let (cols, rows) = grid(width, height, channel);
        let positions = (0..rows).flat_map(|by| {
            (0..cols).map(move |bx| BlockPos::new(bx as u32, by as u32, channel))
        });

        match tables.get(channel) {
            ChannelCodes::Coefficient(table) => {
                let decoder = table.decoder();
                for pos in positions {
                    let mut zigzag = [0i32; 64];
                    for coef in zigzag.iter_mut() {
                        *coef = decoder.decode(&mut reader)?;
                    }
                    blocks.push(QuantizedBlock::new(pos, from_zigzag(&zigzag)));
                }
            }
            ChannelCodes::RunLength { dc, ac } => {
                let dc = dc.decoder();
                let ac = ac.decoder();
                let mut prev_dc = 0i32;
                for pos in positions {
                    let mut zigzag = [0i32; 64];

                    let cat = dc.decode(&mut reader)?;
                    let diff = read_extended(&mut reader, cat)?;
                    prev_dc = prev_dc.checked_add(diff).ok_or_else(|| {
                        Error::CorruptStream(format!("DC value overflows at {pos:?}"))
                    })?;
                    zigzag[0] = prev_dc;

                    let mut k = 1;
                    while k < 64 {
                        let rs = ac.decode(&mut reader)?;
                        if rs == EOB {
                            break;
                        }
                        if rs == ZRL {
                            k += 16;
                            continue;
                        }
                        k += (rs >> 4) as usize;
                        if k >= 64 {
                            return Err(Error::CorruptStream(format!(
                                "AC run overflows block at {pos:?}"
                            )));
                        }
                        zigzag[k] = read_extended(&mut reader, rs & 0x0F)?;
                        k += 1;
                    }
                    if k > 64 {
                        return Err(Error::CorruptStream(format!(
                            "zero run overflows block at {pos:?}"
                        )));
                    }

                    blocks.push(QuantizedBlock::new(pos, from_zigzag(&zigzag)));
                }
            }
        }
    }

    Ok(blocks)
}

/// Read `cat` magnitude bits and sign-extend them.
fn read_extended(reader: &mut BitReader<'_>, cat: i32) -> Result<i32> {
    if cat == 0 {
        return Ok(0);
    }
    let cat = u8::try_from(cat)
        .map_err(|_| Error::CorruptStream(format!("invalid category {cat}")))?;
    Ok(extend(reader.read_bits(cat)?, cat))
}
