//! node/checksum — 16-байтовый трейлер узла.
//!
//! - trailer[0..4] — CRC32C (LE) по всему блоку с занулённым трейлером;
//! - trailer[4..16] — нули.
//!
//! В отличие от страниц данных, stored == 0 здесь всегда невалиден:
//! занулённый блок (например, после сброса суперблока) не должен выглядеть как узел.

use anyhow::{anyhow, Result};
use byteorder::{ByteOrder, LittleEndian};

use super::common::TRAILER_LEN;

#[inline]
fn compute_crc32c(bytes: &[u8]) -> u32 {
    crc32c::crc32c(bytes)
}

/// CRC32C блока, как будто его трейлер занулён.
fn crc_with_zero_trailer(block: &[u8]) -> u32 {
    let n = block.len();
    let body = crc32c::crc32c(&block[..n - TRAILER_LEN]);
    crc32c::crc32c_append(body, &[0u8; TRAILER_LEN])
}

/// Обновить трейлер чексуммы узла.
pub fn node_update_checksum(block: &mut [u8]) -> Result<()> {
    if block.len() < TRAILER_LEN {
        return Err(anyhow!("node buffer too small for checksum"));
    }
    let n = block.len();
    for b in &mut block[n - TRAILER_LEN..n] {
        *b = 0;
    }
    let digest = compute_crc32c(&block[..]);
    LittleEndian::write_u32(&mut block[n - TRAILER_LEN..n - TRAILER_LEN + 4], digest);
    Ok(())
}

/// Проверить трейлер чексуммы узла. true = ок.
pub fn node_verify_checksum(block: &[u8]) -> Result<bool> {
    if block.len() < TRAILER_LEN {
        return Err(anyhow!("node buffer too small for checksum verify"));
    }
    let n = block.len();
    let stored = LittleEndian::read_u32(&block[n - TRAILER_LEN..n - TRAILER_LEN + 4]);
    if stored == 0 {
        return Ok(false);
    }
    Ok(stored == crc_with_zero_trailer(block))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checksum_detects_flip() {
        let mut blk = vec![0x5Au8; 4096];
        node_update_checksum(&mut blk).unwrap();
        assert!(node_verify_checksum(&blk).unwrap());

        blk[100] ^= 0x01;
        assert!(!node_verify_checksum(&blk).unwrap());
    }

    #[test]
    fn zero_block_is_invalid() {
        let blk = vec![0u8; 4096];
        assert!(!node_verify_checksum(&blk).unwrap());
    }
}
