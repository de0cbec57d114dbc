//! store/io — низкоуровневые операции ввода/вывода блоков:
//! - read_block: чтение блока как есть (без проверок формата)
//! - write_block: запись блока (только ReadWrite; граница ёмкости устройства)
//! - read_superblock/write_superblock: блок 0
//! - sync: fsync (если включён data_fsync)

use anyhow::{anyhow, Context, Result};
use std::io::{Read, Seek, SeekFrom, Write};

use super::core::BlockStore;
use crate::consts::{METADATA_BLOCK_SIZE, SUPERBLOCK_LOCATION};
use crate::error::EraError;
use crate::superblock::{superblock_pack, superblock_unpack, Superblock};

impl BlockStore {
    #[inline]
    fn offset_of(block: u64) -> Result<u64> {
        block
            .checked_mul(METADATA_BLOCK_SIZE as u64)
            .ok_or_else(|| anyhow!("block {} offset overflow", block))
    }

    /// Прочитать блок в буфер (buf.len() == block_size).
    pub fn read_block(&self, block: u64, buf: &mut [u8]) -> Result<()> {
        if buf.len() != METADATA_BLOCK_SIZE {
            return Err(anyhow!(
                "buffer size {} != block size {}",
                buf.len(),
                METADATA_BLOCK_SIZE
            ));
        }
        let off = Self::offset_of(block)?;
        let mut f = &self.file;
        f.seek(SeekFrom::Start(off))?;
        f.read_exact(buf)
            .with_context(|| format!("read block {} of {}", block, self.path.display()))?;
        Ok(())
    }

    /// Записать блок. Для устройств запрещена запись за пределами ёмкости.
    pub fn write_block(&self, block: u64, buf: &[u8]) -> Result<()> {
        if !self.mode.is_writable() {
            return Err(EraError::ReadOnlyStore.into());
        }
        if buf.len() != METADATA_BLOCK_SIZE {
            return Err(anyhow!(
                "buffer size {} != block size {}",
                buf.len(),
                METADATA_BLOCK_SIZE
            ));
        }
        if let Some(cap) = self.capacity_blocks {
            if block >= cap {
                return Err(anyhow!(
                    "out of metadata space: block {} beyond device capacity {} blocks",
                    block,
                    cap
                ));
            }
        }
        let off = Self::offset_of(block)?;
        let mut f = &self.file;
        f.seek(SeekFrom::Start(off))?;
        f.write_all(buf)
            .with_context(|| format!("write block {} of {}", block, self.path.display()))?;
        Ok(())
    }

    /// fsync данных (no-op при data_fsync=false).
    pub fn sync(&self) -> Result<()> {
        if self.data_fsync {
            self.file
                .sync_all()
                .with_context(|| format!("fsync {}", self.path.display()))?;
        }
        Ok(())
    }

    pub fn read_superblock(&self) -> Result<Superblock> {
        let mut buf = vec![0u8; METADATA_BLOCK_SIZE];
        self.read_block(SUPERBLOCK_LOCATION, &mut buf)
            .context("read superblock")?;
        superblock_unpack(&buf)
    }

    pub fn write_superblock(&self, sb: &Superblock) -> Result<()> {
        let buf = superblock_pack(sb)?;
        self.write_block(SUPERBLOCK_LOCATION, &buf)
    }
}
