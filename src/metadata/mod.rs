//! metadata — агрегат метаданных era: суперблок + era array + дерево writeset'ов.
//!
//! Режимы открытия:
//! - Open         — живой корень из суперблока;
//! - OpenAt(root) — замороженный корень metadata snapshot (ROOT_RECORD);
//! - Create       — пустые структуры поверх store, который будет перезаписан (restore).
//!
//! Подмодули:
//! - create.rs — запись: begin_superblock / set_era_array / set_writesets / commit;
//! - snap.rs   — ROOT_RECORD и take/drop metadata snapshot.

use anyhow::{Context, Result};

use crate::consts::NO_BLOCK;
use crate::era_array::EraArray;
use crate::error::EraError;
use crate::store::{BlockStore, TransactionManager};
use crate::superblock::Superblock;
use crate::writeset::{walk_writeset_tree, DamageHandler, WritesetVisitor};

pub mod create;
pub mod snap;

pub use snap::RootRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetadataMode {
    Open,
    OpenAt(u64),
    Create,
}

pub struct Metadata {
    pub(crate) tm: TransactionManager,
    pub(crate) sb: Superblock,
    pub(crate) mode: MetadataMode,
    // корни, которые видит читатель (для OpenAt — из ROOT_RECORD)
    pub(crate) roots: RootRecord,
    pub(crate) btree_max_entries: Option<u32>,
    // Create: что уже построено в этой транзакции
    pub(crate) era_array_set: bool,
    pub(crate) writesets_set: bool,
}

impl Metadata {
    pub fn open(store: BlockStore, mode: MetadataMode) -> Result<Self> {
        match mode {
            MetadataMode::Create => {
                if !store.mode().is_writable() {
                    return Err(EraError::ReadOnlyStore.into());
                }
                let sb = Superblock::default();
                let tm = TransactionManager::begin(store, sb.next_block);
                Ok(Self {
                    tm,
                    roots: RootRecord::from_superblock(&sb),
                    sb,
                    mode,
                    btree_max_entries: None,
                    era_array_set: false,
                    writesets_set: false,
                })
            }
            MetadataMode::Open | MetadataMode::OpenAt(_) => {
                let sb = store
                    .read_superblock()
                    .with_context(|| format!("open metadata {}", store.path.display()))?;
                let tm = TransactionManager::begin(store, sb.next_block);
                let roots = match mode {
                    MetadataMode::OpenAt(root) => RootRecord::read(&tm, root)
                        .with_context(|| format!("read metadata snapshot at block {}", root))?,
                    _ => RootRecord::from_superblock(&sb),
                };
                log::debug!(
                    "metadata opened ({:?}): nr_blocks={} current_era={}",
                    mode,
                    roots.nr_blocks,
                    roots.current_era
                );
                Ok(Self {
                    tm,
                    sb,
                    mode,
                    roots,
                    btree_max_entries: None,
                    era_array_set: true,
                    writesets_set: true,
                })
            }
        }
    }

    /// Открыть metadata snapshot, записанный в суперблоке.
    pub fn open_snapshot(store: BlockStore) -> Result<Self> {
        let sb = store.read_superblock()?;
        let root = sb.metadata_snap().ok_or(EraError::NoMetadataSnapshot)?;
        Self::open(store, MetadataMode::OpenAt(root))
    }

    pub fn set_btree_max_entries(&mut self, n: Option<u32>) {
        self.btree_max_entries = n;
    }

    #[inline]
    pub fn mode(&self) -> MetadataMode {
        self.mode
    }

    #[inline]
    pub fn tm(&self) -> &TransactionManager {
        &self.tm
    }

    #[inline]
    pub fn superblock(&self) -> &Superblock {
        &self.sb
    }

    #[inline]
    pub fn nr_blocks(&self) -> u32 {
        self.roots.nr_blocks
    }

    #[inline]
    pub fn current_era(&self) -> u32 {
        self.roots.current_era
    }

    #[inline]
    pub fn data_block_size(&self) -> u32 {
        self.roots.data_block_size
    }

    #[inline]
    pub fn era_array_root(&self) -> u64 {
        self.roots.era_array_root
    }

    #[inline]
    pub fn writeset_root(&self) -> u64 {
        self.roots.writeset_root
    }

    #[inline]
    pub fn metadata_snap(&self) -> Option<u64> {
        self.sb.metadata_snap()
    }

    /// Открыть era array. Его длина обязана совпадать с nr_blocks.
    pub fn era_array(&self) -> Result<EraArray> {
        let root = self.roots.era_array_root;
        if root == NO_BLOCK {
            return Err(EraError::NodeDamaged {
                block: root,
                reason: "era array root is not set".into(),
            }
            .into());
        }
        let ea = EraArray::open(&self.tm, root)?;
        if ea.nr_blocks() != self.roots.nr_blocks as u64 {
            return Err(EraError::NodeDamaged {
                block: root,
                reason: format!(
                    "era array holds {} entries (superblock says {})",
                    ea.nr_blocks(),
                    self.roots.nr_blocks
                ),
            }
            .into());
        }
        Ok(ea)
    }

    /// Обойти writeset'ы с заданной политикой повреждений.
    pub fn walk_writesets<V, H>(&self, visitor: &mut V, handler: &mut H) -> Result<()>
    where
        V: WritesetVisitor + ?Sized,
        H: DamageHandler + ?Sized,
    {
        walk_writeset_tree(
            &self.tm,
            self.roots.writeset_root,
            self.roots.current_era,
            visitor,
            handler,
        )
    }
}
