// src/superblock.rs — суперблок метаданных era (блок 0)
//
// Формат блока 0 (LE):
// MAGIC8 = "ERASB001"
// u32 version          = 1
// u32 block_size       (размер блока метаданных, 4096)
// u32 data_block_size  (размер блока данных в секторах, информативно)
// u32 nr_blocks        (число отслеживаемых блоков данных)
// u32 current_era
// u32 flags            (резерв)
// u64 era_array_root
// u64 writeset_root
// u64 metadata_snap    (NO_BLOCK = снапшота нет)
// u64 next_block       (high-water аллокатора)
// ...
// [trailer 16B: CRC32C]
//
// Политика:
// - Коммит транзакции = перезапись блока 0 (атомарная смена корня).
// - Полностью занулённый блок 0 — маркер "невалидных" метаданных (после упавшего restore).

use anyhow::{anyhow, Context, Result};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::fs::OpenOptions;
use std::io::{Cursor, Seek, SeekFrom, Write};
use std::path::Path;

use crate::consts::{
    METADATA_BLOCK_SIZE, NO_BLOCK, SUPERBLOCK_LOCATION, SUPERBLOCK_MAGIC, SUPERBLOCK_VERSION,
};
use crate::error::EraError;
use crate::node::{node_update_checksum, node_verify_checksum};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Superblock {
    pub version: u32,
    pub block_size: u32,
    pub data_block_size: u32,
    pub nr_blocks: u32,
    pub current_era: u32,
    pub era_array_root: u64,
    pub writeset_root: u64,
    pub metadata_snap: u64,
    pub next_block: u64,
}

impl Default for Superblock {
    fn default() -> Self {
        Self {
            version: SUPERBLOCK_VERSION,
            block_size: METADATA_BLOCK_SIZE as u32,
            data_block_size: 0,
            nr_blocks: 0,
            current_era: 0,
            era_array_root: NO_BLOCK,
            writeset_root: NO_BLOCK,
            metadata_snap: NO_BLOCK,
            next_block: SUPERBLOCK_LOCATION + 1,
        }
    }
}

impl Superblock {
    #[inline]
    pub fn metadata_snap(&self) -> Option<u64> {
        if self.metadata_snap == NO_BLOCK {
            None
        } else {
            Some(self.metadata_snap)
        }
    }
}

/// Сериализовать суперблок в блок METADATA_BLOCK_SIZE с трейлером CRC32C.
pub fn superblock_pack(sb: &Superblock) -> Result<Vec<u8>> {
    let mut w = Cursor::new(vec![0u8; METADATA_BLOCK_SIZE]);
    w.write_all(SUPERBLOCK_MAGIC)?;
    w.write_u32::<LittleEndian>(sb.version)?;
    w.write_u32::<LittleEndian>(sb.block_size)?;
    w.write_u32::<LittleEndian>(sb.data_block_size)?;
    w.write_u32::<LittleEndian>(sb.nr_blocks)?;
    w.write_u32::<LittleEndian>(sb.current_era)?;
    w.write_u32::<LittleEndian>(0)?; // flags
    w.write_u64::<LittleEndian>(sb.era_array_root)?;
    w.write_u64::<LittleEndian>(sb.writeset_root)?;
    w.write_u64::<LittleEndian>(sb.metadata_snap)?;
    w.write_u64::<LittleEndian>(sb.next_block)?;

    let mut buf = w.into_inner();
    node_update_checksum(&mut buf)?;
    Ok(buf)
}

/// Разобрать блок 0.
pub fn superblock_unpack(buf: &[u8]) -> Result<Superblock> {
    if buf.len() != METADATA_BLOCK_SIZE {
        return Err(anyhow!("superblock buffer size {}", buf.len()));
    }
    if buf.iter().all(|&b| b == 0) {
        return Err(EraError::ZeroedSuperblock.into());
    }
    if &buf[0..8] != SUPERBLOCK_MAGIC {
        return Err(EraError::BadSuperblock("bad magic".into()).into());
    }
    if !node_verify_checksum(buf)? {
        return Err(EraError::BadSuperblock("checksum mismatch".into()).into());
    }

    let mut r = Cursor::new(buf);
    r.seek(SeekFrom::Start(8))?;
    let version = r.read_u32::<LittleEndian>()?;
    if version != SUPERBLOCK_VERSION {
        return Err(EraError::BadSuperblock(format!("unsupported version {}", version)).into());
    }
    let block_size = r.read_u32::<LittleEndian>()?;
    if block_size as usize != METADATA_BLOCK_SIZE {
        return Err(EraError::BadSuperblock(format!(
            "metadata block size {} (expected {})",
            block_size, METADATA_BLOCK_SIZE
        ))
        .into());
    }
    let data_block_size = r.read_u32::<LittleEndian>()?;
    let nr_blocks = r.read_u32::<LittleEndian>()?;
    let current_era = r.read_u32::<LittleEndian>()?;
    let _flags = r.read_u32::<LittleEndian>()?;
    let era_array_root = r.read_u64::<LittleEndian>()?;
    let writeset_root = r.read_u64::<LittleEndian>()?;
    let metadata_snap = r.read_u64::<LittleEndian>()?;
    let next_block = r.read_u64::<LittleEndian>()?;

    Ok(Superblock {
        version,
        block_size,
        data_block_size,
        nr_blocks,
        current_era,
        era_array_root,
        writeset_root,
        metadata_snap,
        next_block,
    })
}

/// Затереть суперблок нулями (маркер невалидных метаданных).
///
/// Открывает путь напрямую, без блокировок: вызывается на пути ошибки,
/// когда хэндл store уже может быть закрыт.
pub fn zero_superblock(path: &Path) -> Result<()> {
    let mut f = OpenOptions::new()
        .write(true)
        .open(path)
        .with_context(|| format!("open {} to zero superblock", path.display()))?;
    f.seek(SeekFrom::Start(SUPERBLOCK_LOCATION * METADATA_BLOCK_SIZE as u64))?;
    f.write_all(&[0u8; METADATA_BLOCK_SIZE])?;
    f.sync_all()?;
    Ok(())
}
