//! metadata/snap — ROOT_RECORD: замороженные корни metadata snapshot.
//!
//! Payload (LE): u32 nr_blocks, u32 current_era, u32 data_block_size,
//! u64 era_array_root, u64 writeset_root.
//! Закоммиченные блоки не перезаписываются, поэтому структуры под этими
//! корнями не меняются, пока живой корень идёт дальше.

use anyhow::Result;
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::Cursor;

use super::{Metadata, MetadataMode};
use crate::consts::NO_BLOCK;
use crate::error::EraError;
use crate::node::{node_payload, node_payload_mut, NodeHeader, NODE_TYPE_ROOT_RECORD};
use crate::store::TransactionManager;
use crate::superblock::Superblock;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RootRecord {
    pub nr_blocks: u32,
    pub current_era: u32,
    pub data_block_size: u32,
    pub era_array_root: u64,
    pub writeset_root: u64,
}

impl RootRecord {
    pub fn from_superblock(sb: &Superblock) -> Self {
        Self {
            nr_blocks: sb.nr_blocks,
            current_era: sb.current_era,
            data_block_size: sb.data_block_size,
            era_array_root: sb.era_array_root,
            writeset_root: sb.writeset_root,
        }
    }

    pub fn read(tm: &TransactionManager, block: u64) -> Result<Self> {
        let (_, buf) = tm.read_node(block, NODE_TYPE_ROOT_RECORD)?;
        let mut r = Cursor::new(node_payload(&buf));
        Ok(Self {
            nr_blocks: r.read_u32::<LittleEndian>()?,
            current_era: r.read_u32::<LittleEndian>()?,
            data_block_size: r.read_u32::<LittleEndian>()?,
            era_array_root: r.read_u64::<LittleEndian>()?,
            writeset_root: r.read_u64::<LittleEndian>()?,
        })
    }

    pub fn write(&self, tm: &mut TransactionManager) -> Result<u64> {
        let (_, mut buf) = tm.new_node(NodeHeader::new(NODE_TYPE_ROOT_RECORD, 0, 0))?;
        {
            let mut w = Cursor::new(node_payload_mut(&mut buf));
            w.write_u32::<LittleEndian>(self.nr_blocks)?;
            w.write_u32::<LittleEndian>(self.current_era)?;
            w.write_u32::<LittleEndian>(self.data_block_size)?;
            w.write_u64::<LittleEndian>(self.era_array_root)?;
            w.write_u64::<LittleEndian>(self.writeset_root)?;
        }
        tm.write_node(&mut buf)
    }
}

impl Metadata {
    /// Заморозить текущий живой корень. Только Open на read-write store.
    pub fn take_metadata_snap(&mut self) -> Result<u64> {
        if self.mode != MetadataMode::Open {
            return Err(anyhow::anyhow!(
                "metadata snapshot can only be taken from the live root"
            ));
        }
        if let Some(existing) = self.sb.metadata_snap() {
            return Err(EraError::MetadataSnapshotExists(existing).into());
        }
        let root = self.roots.write(&mut self.tm)?;
        self.sb.metadata_snap = root;
        self.tm.commit(&mut self.sb)?;
        log::info!("metadata snapshot taken at block {}", root);
        Ok(root)
    }

    /// Забыть metadata snapshot (его блоки становятся мусором).
    pub fn drop_metadata_snap(&mut self) -> Result<()> {
        if self.mode != MetadataMode::Open {
            return Err(anyhow::anyhow!(
                "metadata snapshot can only be dropped from the live root"
            ));
        }
        if self.sb.metadata_snap().is_none() {
            return Err(EraError::NoMetadataSnapshot.into());
        }
        self.sb.metadata_snap = NO_BLOCK;
        self.tm.commit(&mut self.sb)?;
        log::info!("metadata snapshot dropped");
        Ok(())
    }
}
