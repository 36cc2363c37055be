//! Base45 text decoding over the health-certificate alphabet.
//!
//! The alphabet and grouping follow RFC 9285: three symbols carry two bytes
//! (`c0 + 45·c1 + 2025·c2`, emitted big-endian), a trailing pair of symbols
//! carries one byte (`c0 + 45·c1`). Only decoding is provided; certificates
//! are never encoded by this crate.

use crate::{FormatError, FormatResult};

/// The 45-symbol alphabet: digits, uppercase letters, space and `$%*+-./:`.
pub const ALPHABET: &[u8; 45] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ $%*+-./:";

/// Reverse lookup from ASCII byte to symbol value. Built at compile time and
/// never mutated; `-1` marks bytes outside the alphabet.
const REVERSE: [i8; 128] = build_reverse();

const fn build_reverse() -> [i8; 128] {
    let mut table = [-1i8; 128];
    let mut i = 0;
    while i < ALPHABET.len() {
        table[ALPHABET[i] as usize] = i as i8;
        i += 1;
    }
    table
}

fn symbol_value(character: char, offset: usize) -> FormatResult<u32> {
    let index = character as usize;
    let value = if index < REVERSE.len() {
        REVERSE[index]
    } else {
        -1
    };
    if value < 0 {
        return Err(FormatError::InvalidBase45Character { character, offset });
    }
    Ok(value as u32)
}

/// Decode base45 text into the bytes it carries.
///
/// # Errors
///
/// Returns [`FormatError::InvalidBase45Character`] for any symbol outside
/// the alphabet, and [`FormatError::InvalidBase45Encoding`] when a group's
/// value exceeds what its bytes can hold or when a single symbol dangles at
/// the end of the input.
pub fn decode(text: &str) -> FormatResult<Vec<u8>> {
    let mut symbols = Vec::with_capacity(text.len());
    for (offset, character) in text.chars().enumerate() {
        symbols.push(symbol_value(character, offset)?);
    }

    let mut out = Vec::with_capacity(symbols.len() / 3 * 2 + 1);
    let mut offset = 0;
    for group in symbols.chunks(3) {
        match *group {
            [c0, c1, c2] => {
                let value = c0 + 45 * c1 + 2025 * c2;
                if value > 0xFFFF {
                    return Err(FormatError::InvalidBase45Encoding {
                        offset,
                        reason: format!("three-symbol group decodes to {value}, above 65535"),
                    });
                }
                out.push((value >> 8) as u8);
                out.push((value & 0xFF) as u8);
            }
            [c0, c1] => {
                let value = c0 + 45 * c1;
                if value > 0xFF {
                    return Err(FormatError::InvalidBase45Encoding {
                        offset,
                        reason: format!("two-symbol group decodes to {value}, above 255"),
                    });
                }
                out.push(value as u8);
            }
            _ => {
                return Err(FormatError::InvalidBase45Encoding {
                    offset,
                    reason: "dangling single symbol".to_string(),
                });
            }
        }
        offset += group.len();
    }

    Ok(out)
}
