//! store/transaction — TransactionManager поверх BlockStore.
//!
//! - read_node: чтение + проверка узла (CRC, magic, self-location, type).
//!   Любая неудача → EraError::NodeDamaged (walker'ы трактуют это как damage).
//! - new_node: выделить свежий блок за high-water отметкой (только ReadWrite).
//! - write_node: записать узел, выделенный в этой же транзакции.
//! - commit: fsync → суперблок (атомарная смена корня) → fsync.
//! - abort: ничего не пишет; закоммиченный корень остаётся прежним.
//!
//! Space map нет: блоки, ставшие мусором, не переиспользуются.

use anyhow::{anyhow, Result};
use std::collections::HashSet;

use super::core::BlockStore;
use crate::consts::{METADATA_BLOCK_SIZE, NO_BLOCK};
use crate::error::EraError;
use crate::node::{node_header_read, node_init, node_update_checksum, node_validate, NodeHeader};
use crate::superblock::Superblock;

pub struct TransactionManager {
    store: BlockStore,
    next_block: u64,
    // блоки, выделенные текущей транзакцией (единственные, куда можно писать)
    fresh: HashSet<u64>,
}

impl TransactionManager {
    /// Начать транзакцию: новые узлы выделяются начиная с `next_block`.
    pub fn begin(store: BlockStore, next_block: u64) -> Self {
        Self {
            store,
            next_block: next_block.max(1),
            fresh: HashSet::new(),
        }
    }

    #[inline]
    pub fn block_size(&self) -> usize {
        METADATA_BLOCK_SIZE
    }

    #[inline]
    pub fn next_block(&self) -> u64 {
        self.next_block
    }

    #[inline]
    pub fn is_writable(&self) -> bool {
        self.store.mode().is_writable()
    }

    /// Прочитать и проверить узел ожидаемого типа.
    pub fn read_node(&self, block: u64, node_type: u16) -> Result<(NodeHeader, Vec<u8>)> {
        self.read_node_of(block, &[node_type])
    }

    /// То же, но допускается любой из `node_types`.
    pub fn read_node_of(&self, block: u64, node_types: &[u16]) -> Result<(NodeHeader, Vec<u8>)> {
        if block == NO_BLOCK {
            return Err(EraError::NodeDamaged {
                block,
                reason: "null block reference".into(),
            }
            .into());
        }
        let mut buf = vec![0u8; METADATA_BLOCK_SIZE];
        if let Err(e) = self.store.read_block(block, &mut buf) {
            return Err(EraError::NodeDamaged {
                block,
                reason: format!("{:#}", e),
            }
            .into());
        }
        match node_validate(&buf, block, node_types) {
            Ok(h) => Ok((h, buf)),
            Err(reason) => Err(EraError::NodeDamaged { block, reason }.into()),
        }
    }

    /// Выделить свежий узел: возвращает буфер с проинициализированным заголовком.
    pub fn new_node(&mut self, mut header: NodeHeader) -> Result<(u64, Vec<u8>)> {
        if !self.is_writable() {
            return Err(EraError::ReadOnlyStore.into());
        }
        let block = self.next_block;
        self.next_block += 1;
        self.fresh.insert(block);

        header.block_id = block;
        let mut buf = vec![0u8; METADATA_BLOCK_SIZE];
        node_init(&mut buf, &header)?;
        Ok((block, buf))
    }

    /// Записать узел (адрес берётся из заголовка). Пересчитывает checksum.
    pub fn write_node(&mut self, buf: &mut [u8]) -> Result<u64> {
        let h = node_header_read(buf)?;
        if !self.fresh.contains(&h.block_id) {
            return Err(anyhow!(
                "block {} is not owned by this transaction (copy-on-write violation)",
                h.block_id
            ));
        }
        node_update_checksum(buf)?;
        self.store.write_block(h.block_id, buf)?;
        Ok(h.block_id)
    }

    /// Закоммитить: новые узлы на диск, затем суперблок с новыми корнями.
    pub fn commit(&mut self, sb: &mut Superblock) -> Result<()> {
        if !self.is_writable() {
            return Err(EraError::ReadOnlyStore.into());
        }
        sb.next_block = self.next_block;
        self.store.sync()?;
        self.store.write_superblock(sb)?;
        self.store.sync()?;
        log::debug!(
            "commit: {} fresh blocks, next_block={}",
            self.fresh.len(),
            self.next_block
        );
        self.fresh.clear();
        Ok(())
    }

    /// Откатить транзакцию: суперблок не трогаем, свежие блоки остаются мусором.
    pub fn abort(self) {
        log::debug!("abort: discarding {} fresh blocks", self.fresh.len());
    }
}
