//! LZW codec for the dedup payload wrapper: variable-width codes packed
//! least-significant-bit first, 8-bit literals, clear code 256, end code
//! 257, dynamic codes from 258, code width capped at 12 bits. This is the
//! classic compress-family variant, bit-compatible with what the payload
//! writer produces.

use std::collections::HashMap;

const LIT_WIDTH: u32 = 8;
const CLEAR: u32 = 1 << LIT_WIDTH;
const EOF_CODE: u32 = CLEAR + 1;
const FIRST_CODE: u32 = EOF_CODE + 1;
const MAX_WIDTH: u32 = 12;
const MAX_CODE: u32 = (1 << MAX_WIDTH) - 1;
const INVALID: u32 = u32::MAX;

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum LzwError {
    #[error("compressed stream ended before the end-of-stream code")]
    Truncated,
    #[error("compressed stream references unknown code {0}")]
    InvalidCode(u32),
}

/// Decompresses a whole buffer. The stream must be terminated by the end
/// code; trailing padding bits after it are ignored.
pub fn decompress(src: &[u8]) -> Result<Vec<u8>, LzwError> {
    let mut out = Vec::new();
    let mut prefix = [0u16; (MAX_CODE + 1) as usize];
    let mut suffix = [0u8; (MAX_CODE + 1) as usize];

    let mut pos = 0usize;
    let mut bits: u32 = 0;
    let mut nbits: u32 = 0;
    let mut width = LIT_WIDTH + 1;
    let mut hi = EOF_CODE;
    let mut overflow: u32 = 1 << width;
    let mut last = INVALID;
    let mut chunk: Vec<u8> = Vec::new();

    loop {
        while nbits < width {
            let byte = *src.get(pos).ok_or(LzwError::Truncated)?;
            bits |= (byte as u32) << nbits;
            nbits += 8;
            pos += 1;
        }
        let code = bits & ((1 << width) - 1);
        bits >>= width;
        nbits -= width;

        match code {
            c if c < CLEAR => {
                out.push(c as u8);
                if last != INVALID {
                    suffix[hi as usize] = c as u8;
                    prefix[hi as usize] = last as u16;
                }
            }
            CLEAR => {
                width = LIT_WIDTH + 1;
                hi = EOF_CODE;
                overflow = 1 << width;
                last = INVALID;
                continue;
            }
            EOF_CODE => return Ok(out),
            c if c <= hi => {
                // The chain is walked tail-first, so build the expansion
                // reversed and flip it once.
                chunk.clear();
                let mut c = c;
                if c == hi {
                    // The code about to be defined: it expands to the last
                    // expansion followed by that expansion's head byte.
                    if last == INVALID {
                        return Err(LzwError::InvalidCode(code));
                    }
                    let mut t = last;
                    while t >= FIRST_CODE {
                        t = prefix[t as usize] as u32;
                    }
                    chunk.push(t as u8);
                    c = last;
                }
                while c >= FIRST_CODE {
                    chunk.push(suffix[c as usize]);
                    c = prefix[c as usize] as u32;
                }
                chunk.push(c as u8);
                chunk.reverse();
                out.extend_from_slice(&chunk);
                if last != INVALID {
                    suffix[hi as usize] = chunk[0];
                    prefix[hi as usize] = last as u16;
                }
            }
            c => return Err(LzwError::InvalidCode(c)),
        }

        last = code;
        hi += 1;
        if hi >= overflow {
            if width == MAX_WIDTH {
                // Table is full; freeze it until the writer sends a clear.
                last = INVALID;
                hi -= 1;
            } else {
                width += 1;
                overflow <<= 1;
            }
        }
    }
}

/// The matching writer. Emits a clear code and starts the table over when
/// codes run out, exactly like the reader expects.
pub fn compress(src: &[u8]) -> Vec<u8> {
    let mut w = Compressor {
        out: Vec::new(),
        bits: 0,
        nbits: 0,
        width: LIT_WIDTH + 1,
        hi: EOF_CODE,
        overflow: 1 << (LIT_WIDTH + 1),
        table: HashMap::new(),
    };

    let mut saved = INVALID;
    for &x in src {
        if saved == INVALID {
            saved = x as u32;
            continue;
        }
        let key = saved << 8 | x as u32;
        if let Some(&code) = w.table.get(&key) {
            saved = code;
            continue;
        }
        w.write_code(saved);
        saved = x as u32;
        if !w.inc_hi() {
            let hi = w.hi;
            w.table.insert(key, hi);
        }
    }

    if saved != INVALID {
        w.write_code(saved);
        w.inc_hi();
    }
    w.write_code(EOF_CODE);
    if w.nbits > 0 {
        w.out.push(w.bits as u8);
    }
    w.out
}

struct Compressor {
    out: Vec<u8>,
    bits: u32,
    nbits: u32,
    width: u32,
    hi: u32,
    overflow: u32,
    table: HashMap<u32, u32>,
}

impl Compressor {
    fn write_code(&mut self, code: u32) {
        self.bits |= code << self.nbits;
        self.nbits += self.width;
        while self.nbits >= 8 {
            self.out.push(self.bits as u8);
            self.bits >>= 8;
            self.nbits -= 8;
        }
    }

    /// Bumps the next implied code, growing the code width at each power of
    /// two. Returns true when the table had to be reset, in which case the
    /// pending insert must be skipped.
    fn inc_hi(&mut self) -> bool {
        self.hi += 1;
        if self.hi == self.overflow {
            self.width += 1;
            self.overflow <<= 1;
        }
        if self.hi == MAX_CODE {
            self.write_code(CLEAR);
            self.width = LIT_WIDTH + 1;
            self.hi = EOF_CODE;
            self.overflow = 1 << self.width;
            self.table.clear();
            return true;
        }
        false
    }
}
