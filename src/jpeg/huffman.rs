//! Huffman tree construction, code assignment and value categories.
//!
//! Trees are built from symbol frequencies by repeatedly merging the two
//! lowest-frequency nodes. Ties are broken deterministically: leaves are
//! keyed by the rank of their symbol, merged nodes by creation order after
//! all leaves, and the lower key pops first. The first node popped becomes
//! the left child (bit 0).

use std::cmp::{Ordering, Reverse};
use std::collections::{BTreeMap, BinaryHeap, HashMap};

use crate::bits::BitWriter;
use crate::decode::bit_reader::BitReader;
use crate::error::{Error, Result};

/// Huffman code: (code bits, length in bits).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HuffmanCode {
    /// The code bits (right-aligned).
    pub code: u64,
    /// Number of bits in the code.
    pub length: u8,
}

/// A node of a Huffman tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    /// A coded symbol.
    Leaf {
        /// The symbol value.
        symbol: i32,
        /// Occurrences of the symbol.
        frequency: u64,
    },
    /// A merge of two subtrees.
    Internal {
        /// Sum of both subtrees.
        frequency: u64,
        /// Subtree reached by a 0 bit.
        left: Box<Node>,
        /// `None` only for the synthetic root above a lone symbol.
        right: Option<Box<Node>>,
    },
}

impl Node {
    /// Total frequency under this node.
    pub fn frequency(&self) -> u64 {
        match self {
            Node::Leaf { frequency, .. } | Node::Internal { frequency, .. } => *frequency,
        }
    }
}

/// A complete Huffman tree. The root is always an internal node, so every
/// symbol gets a code of at least one bit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HuffmanTree {
    root: Node,
    symbols: usize,
}

impl HuffmanTree {
    /// Root node.
    pub fn root(&self) -> &Node {
        &self.root
    }

    /// Number of leaves.
    pub fn symbol_count(&self) -> usize {
        self.symbols
    }

    /// Sum of all leaf frequencies.
    pub fn total_frequency(&self) -> u64 {
        self.root.frequency()
    }
}

/// Heap entry: ordered by frequency, then by tie-break key.
struct Pending {
    frequency: u64,
    key: usize,
    node: Node,
}

impl PartialEq for Pending {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Pending {}

impl Ord for Pending {
    fn cmp(&self, other: &Self) -> Ordering {
        self.frequency
            .cmp(&other.frequency)
            .then_with(|| self.key.cmp(&other.key))
    }
}

impl PartialOrd for Pending {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Count how often each symbol occurs.
pub fn count_frequencies<I>(symbols: I) -> BTreeMap<i32, u64>
where
    I: IntoIterator<Item = i32>,
{
    let mut frequencies = BTreeMap::new();
    for symbol in symbols {
        *frequencies.entry(symbol).or_insert(0) += 1;
    }
    frequencies
}

/// Build a Huffman tree from symbol frequencies.
///
/// Symbols with a zero count are ignored. Returns
/// [`Error::EmptyAlphabet`] if no symbol has a positive count.
pub fn build_tree(frequencies: &BTreeMap<i32, u64>) -> Result<HuffmanTree> {
    let mut heap: BinaryHeap<Reverse<Pending>> = frequencies
        .iter()
        .filter(|&(_, &frequency)| frequency > 0)
        .enumerate()
        .map(|(rank, (&symbol, &frequency))| {
            Reverse(Pending {
                frequency,
                key: rank,
                node: Node::Leaf { symbol, frequency },
            })
        })
        .collect();

    let symbols = heap.len();
    let mut next_key = symbols;

    loop {
        let Some(Reverse(first)) = heap.pop() else {
            return Err(Error::EmptyAlphabet);
        };
        let Some(Reverse(second)) = heap.pop() else {
            let root = match first.node {
                // Lone symbol: hang it under a synthetic root so it gets code "0"
                leaf @ Node::Leaf { .. } => Node::Internal {
                    frequency: first.frequency,
                    left: Box::new(leaf),
                    right: None,
                },
                internal => internal,
            };
            return Ok(HuffmanTree { root, symbols });
        };

        let frequency = first.frequency + second.frequency;
        heap.push(Reverse(Pending {
            frequency,
            key: next_key,
            node: Node::Internal {
                frequency,
                left: Box::new(first.node),
                right: Some(Box::new(second.node)),
            },
        }));
        next_key += 1;
    }
}

/// Symbol to code mapping for one channel.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CodeTable {
    codes: BTreeMap<i32, HuffmanCode>,
}

impl CodeTable {
    /// Build the tree for `frequencies` and assign its codes.
    pub fn from_frequencies(frequencies: &BTreeMap<i32, u64>) -> Result<Self> {
        Ok(build_code_table(&build_tree(frequencies)?))
    }

    /// Code for `symbol`, if it has one.
    #[inline]
    pub fn get(&self, symbol: i32) -> Option<HuffmanCode> {
        self.codes.get(&symbol).copied()
    }

    /// Number of symbols.
    pub fn len(&self) -> usize {
        self.codes.len()
    }

    /// True if the table has no symbols.
    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    /// Entries in ascending symbol order.
    pub fn iter(&self) -> impl Iterator<Item = (i32, HuffmanCode)> + '_ {
        self.codes.iter().map(|(&s, &c)| (s, c))
    }

    /// Longest code length in the table.
    pub fn max_length(&self) -> u8 {
        self.codes.values().map(|c| c.length).max().unwrap_or(0)
    }

    /// Write the code for `symbol`.
    #[inline]
    pub fn encode(&self, writer: &mut BitWriter, symbol: i32) -> Result<()> {
        let code = self
            .get(symbol)
            .ok_or_else(|| Error::CorruptStream(format!("no code for symbol {symbol}")))?;
        writer.write_code(code.code, code.length)
    }

    /// Reverse lookup for decoding.
    pub fn decoder(&self) -> HuffmanDecoder {
        HuffmanDecoder {
            symbols: self
                .codes
                .iter()
                .map(|(&symbol, code)| ((code.length, code.code), symbol))
                .collect(),
            max_length: self.max_length(),
        }
    }
}

/// Assign codes by pre-order traversal: left edges append 0, right edges 1.
pub fn build_code_table(tree: &HuffmanTree) -> CodeTable {
    let mut codes = BTreeMap::new();
    let mut stack: Vec<(&Node, u64, u8)> = vec![(&tree.root, 0, 0)];

    while let Some((node, code, length)) = stack.pop() {
        match node {
            Node::Leaf { symbol, .. } => {
                codes.insert(*symbol, HuffmanCode { code, length });
            }
            Node::Internal { left, right, .. } => {
                // Right is pushed first so the left subtree is visited first
                if let Some(right) = right {
                    stack.push((right, (code << 1) | 1, length + 1));
                }
                stack.push((left, code << 1, length + 1));
            }
        }
    }

    CodeTable { codes }
}

/// Bit-serial decoder for one [`CodeTable`].
#[derive(Debug, Clone)]
pub struct HuffmanDecoder {
    symbols: HashMap<(u8, u64), i32>,
    max_length: u8,
}

impl HuffmanDecoder {
    /// Read bits until they form a known code and return its symbol.
    pub fn decode(&self, reader: &mut BitReader<'_>) -> Result<i32> {
        let mut code = 0u64;
        for length in 1..=self.max_length {
            code = (code << 1) | reader.read_bit()? as u64;
            if let Some(&symbol) = self.symbols.get(&(length, code)) {
                return Ok(symbol);
            }
        }
        Err(Error::CorruptStream(format!(
            "no code matches within {} bits",
            self.max_length
        )))
    }
}

/// Get the category (number of bits needed) for a value.
#[inline]
pub fn category(value: i32) -> u8 {
    (32 - value.unsigned_abs().leading_zeros()) as u8
}

/// The `category(value)` magnitude bits for `value`.
///
/// Negative values are offset by `2^category - 1`, so their bits start
/// with 0 while positive values start with 1.
#[inline]
pub fn magnitude(value: i32) -> u32 {
    let cat = category(value);
    if value < 0 {
        (value as i64 + (1i64 << cat) - 1) as u32
    } else {
        value as u32
    }
}

/// Inverse of [`magnitude`]: rebuild a value from its category and bits.
#[inline]
pub fn extend(bits: u32, category: u8) -> i32 {
    if category == 0 {
        return 0;
    }
    let bits = bits as i64;
    if bits < 1i64 << (category - 1) {
        (bits - (1i64 << category) + 1) as i32
    } else {
        bits as i32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn freqs(pairs: &[(i32, u64)]) -> BTreeMap<i32, u64> {
        pairs.iter().copied().collect()
    }

    fn bit_string(code: HuffmanCode) -> String {
        (0..code.length)
            .rev()
            .map(|i| if (code.code >> i) & 1 == 1 { '1' } else { '0' })
            .collect()
    }

    #[test]
    fn test_category() {
        assert_eq!(category(0), 0);
        assert_eq!(category(1), 1);
        assert_eq!(category(-1), 1);
        assert_eq!(category(2), 2);
        assert_eq!(category(3), 2);
        assert_eq!(category(-3), 2);
        assert_eq!(category(4), 3);
        assert_eq!(category(255), 8);
        assert_eq!(category(-1024), 11);
    }

    #[test]
    fn test_magnitude_and_extend() {
        assert_eq!(magnitude(5), 0b101);
        // -5 in category 3 -> -5 + 7 = 2
        assert_eq!(magnitude(-5), 0b010);
        assert_eq!(magnitude(-1), 0);
        assert_eq!(magnitude(0), 0);

        for value in -2048..=2048 {
            assert_eq!(extend(magnitude(value), category(value)), value);
        }
    }

    #[test]
    fn test_empty_alphabet() {
        assert_eq!(build_tree(&BTreeMap::new()), Err(Error::EmptyAlphabet));
        assert_eq!(build_tree(&freqs(&[(3, 0)])), Err(Error::EmptyAlphabet));
    }

    #[test]
    fn test_single_symbol_gets_one_bit() {
        let tree = build_tree(&freqs(&[(42, 9)])).unwrap();
        assert_eq!(tree.symbol_count(), 1);
        assert_eq!(tree.total_frequency(), 9);

        let table = build_code_table(&tree);
        assert_eq!(table.len(), 1);
        assert_eq!(table.get(42), Some(HuffmanCode { code: 0, length: 1 }));
    }

    #[test]
    fn test_two_symbols_lower_frequency_left() {
        let table = CodeTable::from_frequencies(&freqs(&[(5, 10), (7, 3)])).unwrap();
        assert_eq!(bit_string(table.get(7).unwrap()), "0");
        assert_eq!(bit_string(table.get(5).unwrap()), "1");
    }

    #[test]
    fn test_tie_break_is_deterministic() {
        // 0 and 1 merge first (lowest keys among frequency 1), then symbol 2
        // (a leaf) wins the tie against the merged node.
        let table = CodeTable::from_frequencies(&freqs(&[(0, 1), (1, 1), (2, 2)])).unwrap();
        assert_eq!(bit_string(table.get(2).unwrap()), "0");
        assert_eq!(bit_string(table.get(0).unwrap()), "10");
        assert_eq!(bit_string(table.get(1).unwrap()), "11");

        let again = CodeTable::from_frequencies(&freqs(&[(2, 2), (1, 1), (0, 1)])).unwrap();
        assert_eq!(table, again);
    }

    #[test]
    fn test_negative_symbols_order_by_value() {
        let table = CodeTable::from_frequencies(&freqs(&[(-4, 1), (9, 1)])).unwrap();
        assert_eq!(bit_string(table.get(-4).unwrap()), "0");
        assert_eq!(bit_string(table.get(9).unwrap()), "1");
    }

    #[test]
    fn test_codes_prefix_free_and_complete() {
        let table = CodeTable::from_frequencies(&freqs(&[
            (0, 45),
            (1, 13),
            (2, 12),
            (3, 16),
            (4, 9),
            (5, 5),
        ]))
        .unwrap();

        let codes: Vec<String> = table.iter().map(|(_, c)| bit_string(c)).collect();
        for (i, a) in codes.iter().enumerate() {
            for (j, b) in codes.iter().enumerate() {
                if i != j {
                    assert!(!b.starts_with(a.as_str()), "{a} is a prefix of {b}");
                }
            }
        }

        // Kraft sum of a full binary tree is exactly 1
        let kraft: f64 = table
            .iter()
            .map(|(_, c)| 0.5f64.powi(c.length as i32))
            .sum();
        assert!((kraft - 1.0).abs() < 1e-12);

        // Most frequent symbol gets the shortest code
        assert_eq!(table.get(0).unwrap().length, 1);
    }

    #[test]
    fn test_count_frequencies() {
        let counts = count_frequencies([3, -1, 3, 0, 3]);
        assert_eq!(counts, freqs(&[(-1, 1), (0, 1), (3, 3)]));
    }

    #[test]
    fn test_encode_decode_symbols() {
        let symbols = [0, 0, 0, 1, -2, 0, 7, 1, 0];
        let table = CodeTable::from_frequencies(&count_frequencies(symbols)).unwrap();

        let mut writer = BitWriter::new();
        for &s in &symbols {
            table.encode(&mut writer, s).unwrap();
        }
        let bytes = writer.finish();

        let decoder = table.decoder();
        let mut reader = BitReader::new(&bytes);
        for &s in &symbols {
            assert_eq!(decoder.decode(&mut reader).unwrap(), s);
        }
    }

    #[test]
    fn test_encode_unknown_symbol() {
        let table = CodeTable::from_frequencies(&freqs(&[(1, 1)])).unwrap();
        let mut writer = BitWriter::new();
        assert!(matches!(
            table.encode(&mut writer, 2),
            Err(Error::CorruptStream(_))
        ));
    }

    #[test]
    fn test_decode_past_end() {
        let table = CodeTable::from_frequencies(&freqs(&[(1, 1), (2, 1), (3, 2)])).unwrap();
        let decoder = table.decoder();
        let mut reader = BitReader::new(&[]);
        assert_eq!(decoder.decode(&mut reader), Err(Error::EndOfStream));
    }
}
