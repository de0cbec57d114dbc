//! array/walk — обход листьев persistent array.
//!
//! walk: damage-tolerant. Нечитаемый лист → damage(range его индексов), обход
//! продолжается. Нечитаемый индексный узел рвёт цепочку: всё, что за ним,
//! репортится одним диапазоном и обход заканчивается.
//!
//! for_each: строгий вариант, первая же проблема — ошибка.

use anyhow::Result;
use std::ops::Range;

use super::{index_cap, ArrayValue, PArray};
use crate::consts::NO_BLOCK;
use crate::error::EraError;
use crate::store::TransactionManager;

impl<V: ArrayValue> PArray<V> {
    /// Обойти значения массива по листьям в порядке возрастания индексов.
    ///
    /// `visit(first_index, values)` получает значения одного листа,
    /// `damage(range, reason)` — диапазон индексов, который прочитать не удалось.
    pub fn walk<F, D>(&self, tm: &TransactionManager, mut visit: F, mut damage: D) -> Result<()>
    where
        F: FnMut(u64, &[V]) -> Result<()>,
        D: FnMut(Range<u64>, &str) -> Result<()>,
    {
        let bs = tm.block_size();
        let lcap = Self::leaf_cap(bs);
        let icap = index_cap(bs);
        let nr_leaves = self.nr_leaves(bs);

        let mut node = self.root;
        let mut first_leaf = 0u64;
        while first_leaf < nr_leaves {
            let expected = icap.min(nr_leaves - first_leaf);
            let idx = match self.read_index(tm, node, expected) {
                Ok(idx) => idx,
                Err(e) => {
                    log::debug!("array {}: index node {} unreadable: {:#}", self.root, node, e);
                    damage(first_leaf * lcap..self.len, &format!("{:#}", e))?;
                    return Ok(());
                }
            };

            for (i, &leaf) in idx.leaves.iter().enumerate() {
                let first = (first_leaf + i as u64) * lcap;
                let n = lcap.min(self.len - first);
                if leaf == NO_BLOCK {
                    let fill = vec![self.fill; n as usize];
                    visit(first, &fill)?;
                    continue;
                }
                match self.read_leaf(tm, leaf, n) {
                    Ok(vals) => visit(first, &vals)?,
                    Err(e) => {
                        log::debug!("array {}: leaf {} unreadable: {:#}", self.root, leaf, e);
                        damage(first..first + n, &format!("{:#}", e))?;
                    }
                }
            }

            first_leaf += expected;
            node = idx.next;
            if first_leaf < nr_leaves && node == NO_BLOCK {
                // цепочка оборвалась раньше, чем кончились листья
                let reason = format!("index chain ends after {} leaves", first_leaf);
                damage(first_leaf * lcap..self.len, &reason)?;
                return Ok(());
            }
        }
        Ok(())
    }

    /// Строгий обход: любой нечитаемый узел → EraError::NodeDamaged.
    pub fn for_each<F>(&self, tm: &TransactionManager, visit: F) -> Result<()>
    where
        F: FnMut(u64, &[V]) -> Result<()>,
    {
        let root = self.root;
        self.walk(tm, visit, |r, why| {
            Err(EraError::NodeDamaged {
                block: root,
                reason: format!("array entries [{}, {}) unreadable: {}", r.start, r.end, why),
            }
            .into())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::METADATA_BLOCK_SIZE;
    use crate::store::{BlockStore, OpenMode};
    use std::io::{Seek, SeekFrom, Write};

    #[test]
    fn damaged_leaf_is_reported_and_skipped() {
        let t = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        let p = std::env::temp_dir().join(format!("era-walk-{}-{}", std::process::id(), t));
        std::fs::write(&p, vec![0u8; METADATA_BLOCK_SIZE]).unwrap();

        let store = BlockStore::open(&p, OpenMode::ReadWrite).unwrap();
        let mut tm = TransactionManager::begin(store, 1);
        let lcap = PArray::<u32>::leaf_cap(METADATA_BLOCK_SIZE);
        let vals: Vec<u32> = (0..(lcap * 3) as u32).collect();
        let arr = PArray::build(&mut tm, u32::MAX, &vals).unwrap();

        // листья выделяются первыми: блоки 1, 2, 3; портим средний
        {
            let mut f = std::fs::OpenOptions::new().write(true).open(&p).unwrap();
            f.seek(SeekFrom::Start(2 * METADATA_BLOCK_SIZE as u64 + 100)).unwrap();
            f.write_all(&[0xAB; 8]).unwrap();
        }

        let mut seen = Vec::new();
        let mut damaged = Vec::new();
        arr.walk(
            &tm,
            |first, vs| {
                seen.push((first, vs.len() as u64));
                Ok(())
            },
            |r, _| {
                damaged.push(r);
                Ok(())
            },
        )
        .unwrap();
        assert_eq!(seen, vec![(0, lcap), (2 * lcap, lcap)]);
        assert_eq!(damaged, vec![lcap..2 * lcap]);

        assert!(arr.for_each(&tm, |_, _| Ok(())).is_err());
        let _ = std::fs::remove_file(&p);
    }
}
