//! Prefixed-integer primitive of RFC 7541 5.1.
//!
//! Encoding is a single call; decoding is a small restartable state machine
//! so a caller may feed a fragmented header block one byte at a time and
//! resume where the previous call ran out of input.

use algorithm::buf::{Bt, BtMut};

use super::HpackError;

#[inline]
fn prefix_mask(prefix_bits: u8) -> u8 {
    debug_assert!(prefix_bits >= 1 && prefix_bits <= 8);
    if prefix_bits == 8 {
        0xFF
    } else {
        (1u8 << prefix_bits) - 1
    }
}

/// Encodes `value` with an `prefix_bits`-bit prefix, or-ing `starting` into
/// the first octet. Returns the number of octets written.
pub fn encode_integer<B: BtMut>(value: u64, prefix_bits: u8, starting: u8, buf: &mut B) -> usize {
    let mask = prefix_mask(prefix_bits);
    if value < mask as u64 {
        return buf.put_u8(starting | value as u8);
    }
    let mut size = buf.put_u8(starting | mask);
    let mut rest = value - mask as u64;
    while rest >= 128 {
        size += buf.put_u8((rest & 0x7F) as u8 | 0x80);
        rest >>= 7;
    }
    size += buf.put_u8(rest as u8);
    size
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum IntegerState {
    Init,
    Value,
}

/// Restartable decoder for one prefixed integer.
///
/// `decode` consumes as many octets as it can; `Ok(None)` means the input
/// ran dry mid-value and the accumulated state is kept for the next call.
#[derive(Debug)]
pub struct IntegerDecoder {
    state: IntegerState,
    value: u64,
    shift: u32,
}

impl IntegerDecoder {
    pub fn new() -> IntegerDecoder {
        IntegerDecoder {
            state: IntegerState::Init,
            value: 0,
            shift: 0,
        }
    }

    pub fn decode<B: Bt>(&mut self, prefix_bits: u8, buf: &mut B) -> Result<Option<u64>, HpackError> {
        let mask = prefix_mask(prefix_bits);
        if self.state == IntegerState::Init {
            if !buf.has_remaining() {
                return Ok(None);
            }
            self.value = (buf.get_u8() & mask) as u64;
            if self.value < mask as u64 {
                return Ok(Some(self.finish()));
            }
            self.state = IntegerState::Value;
            self.shift = 0;
        }

        while buf.has_remaining() {
            let octet = buf.get_u8();
            let add = (octet & 0x7F) as u64;
            if self.shift >= 64 {
                // The accumulator is exhausted: payload bits overflow, and
                // bare zero continuations would never terminate.
                if add == 0 {
                    return Err(HpackError::MalformedInteger);
                }
                return Err(HpackError::IntegerOverflow);
            }
            let scaled = add
                .checked_mul(1u64 << self.shift)
                .ok_or(HpackError::IntegerOverflow)?;
            self.value = self
                .value
                .checked_add(scaled)
                .ok_or(HpackError::IntegerOverflow)?;
            self.shift += 7;
            if octet & 0x80 == 0 {
                return Ok(Some(self.finish()));
            }
        }
        Ok(None)
    }

    fn finish(&mut self) -> u64 {
        let value = self.value;
        self.state = IntegerState::Init;
        self.value = 0;
        self.shift = 0;
        value
    }
}
