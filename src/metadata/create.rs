//! metadata/create — путь записи (restore).
//!
//! Порядок: begin_superblock → set_era_array / set_writesets (в любом порядке) → commit.
//! Для больших описаний есть потоковые варианты: set_era_entries (разреженно),
//! write_bitset + set_writeset_values (битмапы пишутся по мере чтения).
//! Пока commit не вызван, суперблок на диске не меняется; всё, что не было
//! задано явно, материализуется пустым на commit.

use anyhow::{anyhow, Result};

use super::{Metadata, MetadataMode};
use crate::era_array::EraArray;
use crate::error::EraError;
use crate::bitset;
use crate::writeset::{build_writeset_index, build_writeset_tree, WritesetSpec, WritesetValue};

impl Metadata {
    fn ensure_writable_root(&self) -> Result<()> {
        if !self.tm.is_writable() {
            return Err(EraError::ReadOnlyStore.into());
        }
        if let MetadataMode::OpenAt(_) = self.mode {
            return Err(anyhow!("metadata snapshot roots are read-only"));
        }
        Ok(())
    }

    /// Параметры нового суперблока (только Create).
    pub fn begin_superblock(
        &mut self,
        nr_blocks: u32,
        current_era: u32,
        data_block_size: u32,
    ) -> Result<()> {
        self.ensure_writable_root()?;
        if self.mode != MetadataMode::Create {
            return Err(anyhow!("begin_superblock on metadata that already exists"));
        }
        self.roots.nr_blocks = nr_blocks;
        self.roots.current_era = current_era;
        self.roots.data_block_size = data_block_size;
        self.era_array_set = false;
        self.writesets_set = false;
        Ok(())
    }

    /// Сменить текущую эру (живой корень продвигается вперёд).
    pub fn set_current_era(&mut self, era: u32) -> Result<()> {
        self.ensure_writable_root()?;
        self.roots.current_era = era;
        Ok(())
    }

    /// Построить era array целиком: `values.len()` обязан равняться nr_blocks.
    pub fn set_era_array(&mut self, values: &[u32]) -> Result<()> {
        self.ensure_writable_root()?;
        if values.len() as u64 != self.roots.nr_blocks as u64 {
            return Err(anyhow!(
                "era array of {} entries for {} blocks",
                values.len(),
                self.roots.nr_blocks
            ));
        }
        let ea = EraArray::build(&mut self.tm, values)?;
        self.roots.era_array_root = ea.root();
        self.era_array_set = true;
        Ok(())
    }

    /// Разреженный era array: (блок, эра) по возрастанию блока, прочие не писались.
    pub fn set_era_entries<I>(&mut self, entries: I) -> Result<()>
    where
        I: IntoIterator<Item = (u32, u32)>,
    {
        self.ensure_writable_root()?;
        let ea = EraArray::build_sparse(&mut self.tm, self.roots.nr_blocks, entries)?;
        self.roots.era_array_root = ea.root();
        self.era_array_set = true;
        Ok(())
    }

    /// Записать битмапу одного writeset'а из ненулевых слов; вернуть её корень.
    pub fn write_bitset<I>(&mut self, nr_bits: u32, words: I) -> Result<u64>
    where
        I: IntoIterator<Item = (u64, u64)>,
    {
        self.ensure_writable_root()?;
        bitset::build_sparse(&mut self.tm, nr_bits, words)
    }

    /// Дерево writeset'ов поверх битмап, записанных через write_bitset.
    pub fn set_writeset_values(&mut self, entries: &[(u32, WritesetValue)]) -> Result<()> {
        self.ensure_writable_root()?;
        let root = build_writeset_index(&mut self.tm, entries, self.btree_max_entries)?;
        self.roots.writeset_root = root;
        self.writesets_set = true;
        Ok(())
    }

    /// Построить дерево writeset'ов (эры строго по возрастанию).
    pub fn set_writesets(&mut self, writesets: &[WritesetSpec]) -> Result<()> {
        self.ensure_writable_root()?;
        let root = build_writeset_tree(&mut self.tm, writesets, self.btree_max_entries)?;
        self.roots.writeset_root = root;
        self.writesets_set = true;
        Ok(())
    }

    /// Бросить незакоммиченные изменения: суперблок на диске остаётся прежним.
    pub fn abort(self) {
        self.tm.abort();
    }

    /// Атомарно опубликовать новые корни.
    pub fn commit(&mut self) -> Result<()> {
        self.ensure_writable_root()?;
        if !self.era_array_set {
            let ea = EraArray::create(&mut self.tm, self.roots.nr_blocks)?;
            self.roots.era_array_root = ea.root();
            self.era_array_set = true;
        }
        if !self.writesets_set {
            self.roots.writeset_root =
                build_writeset_tree(&mut self.tm, &[], self.btree_max_entries)?;
            self.writesets_set = true;
        }

        self.sb.nr_blocks = self.roots.nr_blocks;
        self.sb.current_era = self.roots.current_era;
        self.sb.data_block_size = self.roots.data_block_size;
        self.sb.era_array_root = self.roots.era_array_root;
        self.sb.writeset_root = self.roots.writeset_root;
        self.tm.commit(&mut self.sb)?;
        // после первого commit агрегат ведёт себя как открытый живой корень
        self.mode = MetadataMode::Open;
        log::debug!(
            "metadata committed: nr_blocks={} current_era={} next_block={}",
            self.sb.nr_blocks,
            self.sb.current_era,
            self.sb.next_block
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bitset::words_from_bits;
    use crate::consts::NEVER_WRITTEN;
    use crate::metadata::Metadata;
    use crate::store::{BlockStore, OpenMode};
    use crate::writeset::{Damage, WritesetVisitor};

    struct Bits(Vec<(u32, u32)>, u32);

    impl WritesetVisitor for Bits {
        fn writeset_begin(&mut self, era: u32, _nr_bits: u32) -> Result<()> {
            self.1 = era;
            Ok(())
        }
        fn bit(&mut self, index: u32, _value: bool) -> Result<()> {
            self.0.push((self.1, index));
            Ok(())
        }
        fn writeset_end(&mut self) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn create_commit_reopen() {
        let t = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        let p = std::env::temp_dir().join(format!("era-md-{}-{}", std::process::id(), t));
        std::fs::write(&p, vec![0u8; 4096]).unwrap();

        {
            let store = BlockStore::open(&p, OpenMode::ReadWrite).unwrap();
            let mut md = Metadata::open(store, MetadataMode::Create).unwrap();
            md.begin_superblock(8, 4, 128).unwrap();
            md.set_era_array(&[NEVER_WRITTEN, 1, 2, NEVER_WRITTEN, 3, 3, 0, NEVER_WRITTEN])
                .unwrap();
            md.set_writesets(&[WritesetSpec {
                era: 3,
                nr_bits: 8,
                words: words_from_bits(8, [7]),
            }])
            .unwrap();
            md.commit().unwrap();
        }

        let store = BlockStore::open(&p, OpenMode::ReadOnlyExclusive).unwrap();
        let md = Metadata::open(store, MetadataMode::Open).unwrap();
        assert_eq!(md.nr_blocks(), 8);
        assert_eq!(md.current_era(), 4);
        assert_eq!(md.data_block_size(), 128);
        let ea = md.era_array().unwrap();
        assert_eq!(ea.get(md.tm(), 4).unwrap(), Some(3));
        assert_eq!(ea.get(md.tm(), 7).unwrap(), None);

        let mut v = Bits(Vec::new(), 0);
        let mut h = |d: &Damage| -> Result<()> { panic!("unexpected {}", d) };
        md.walk_writesets(&mut v, &mut h).unwrap();
        assert_eq!(v.0, vec![(3, 7)]);
        assert!(md.metadata_snap().is_none());
        let _ = std::fs::remove_file(&p);
    }

    #[test]
    fn uncommitted_create_leaves_superblock_alone() {
        let t = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        let p = std::env::temp_dir().join(format!("era-md-abort-{}-{}", std::process::id(), t));
        std::fs::write(&p, vec![0u8; 4096]).unwrap();
        {
            let store = BlockStore::open(&p, OpenMode::ReadWrite).unwrap();
            let mut md = Metadata::open(store, MetadataMode::Create).unwrap();
            md.begin_superblock(4, 1, 8).unwrap();
            md.set_era_array(&[1, 1, 1, 1]).unwrap();
            // drop без commit
        }
        let store = BlockStore::open(&p, OpenMode::ReadOnlyExclusive).unwrap();
        let err = Metadata::open(store, MetadataMode::Open).err().unwrap();
        assert!(matches!(
            err.downcast_ref::<EraError>(),
            Some(EraError::ZeroedSuperblock)
        ));
        let _ = std::fs::remove_file(&p);
    }
}
