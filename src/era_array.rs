//! era_array — по одной эре (u32) на каждый блок данных.
//!
//! Блоки, которые ни разу не писались, хранят NEVER_WRITTEN; наружу это
//! отдаётся как `None`. Хранение разреженное: листья, целиком состоящие из
//! NEVER_WRITTEN, не материализуются.

use anyhow::Result;
use std::ops::Range;

use crate::array::PArray;
use crate::consts::NEVER_WRITTEN;
use crate::error::EraError;
use crate::store::TransactionManager;

#[derive(Debug, Clone, Copy)]
pub struct EraArray {
    arr: PArray<u32>,
}

#[inline]
fn decode(v: u32) -> Option<u32> {
    if v == NEVER_WRITTEN {
        None
    } else {
        Some(v)
    }
}

impl EraArray {
    /// Пустой массив: все `nr_blocks` блоков ни разу не писались.
    pub fn create(tm: &mut TransactionManager, nr_blocks: u32) -> Result<Self> {
        let arr = PArray::create(tm, nr_blocks as u64, NEVER_WRITTEN)?;
        Ok(Self { arr })
    }

    /// Bulk-построение; `values[i]` — эра блока i (или NEVER_WRITTEN).
    pub fn build(tm: &mut TransactionManager, values: &[u32]) -> Result<Self> {
        let arr = PArray::build(tm, NEVER_WRITTEN, values)?;
        Ok(Self { arr })
    }

    /// Разреженное построение: (блок, эра) по возрастанию блока, остальные не писались.
    pub fn build_sparse<I>(tm: &mut TransactionManager, nr_blocks: u32, entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = (u32, u32)>,
    {
        let entries = entries.into_iter().map(|(b, e)| (b as u64, e));
        let arr = PArray::build_sparse(tm, nr_blocks as u64, NEVER_WRITTEN, entries)?;
        Ok(Self { arr })
    }

    pub fn open(tm: &TransactionManager, root: u64) -> Result<Self> {
        let arr = PArray::open(tm, root)?;
        Ok(Self { arr })
    }

    #[inline]
    pub fn root(&self) -> u64 {
        self.arr.root
    }

    #[inline]
    pub fn nr_blocks(&self) -> u64 {
        self.arr.len
    }

    /// Эра последней записи блока; `None`, если блок не писался.
    pub fn get(&self, tm: &TransactionManager, block: u64) -> Result<Option<u32>> {
        if block >= self.arr.len {
            return Err(EraError::BlockOutOfRange {
                block,
                nr_blocks: self.arr.len,
            }
            .into());
        }
        Ok(decode(self.arr.get(tm, block)?))
    }

    /// Строгий обход всех блоков по возрастанию.
    pub fn for_each<F>(&self, tm: &TransactionManager, mut f: F) -> Result<()>
    where
        F: FnMut(u64, Option<u32>) -> Result<()>,
    {
        self.arr.for_each(tm, |first, vals| {
            for (i, v) in vals.iter().enumerate() {
                f(first + i as u64, decode(*v))?;
            }
            Ok(())
        })
    }

    /// Damage-tolerant обход: нечитаемые диапазоны блоков уходят в `damage`.
    pub fn walk<F, D>(&self, tm: &TransactionManager, mut f: F, damage: D) -> Result<()>
    where
        F: FnMut(u64, Option<u32>) -> Result<()>,
        D: FnMut(Range<u64>, &str) -> Result<()>,
    {
        self.arr.walk(
            tm,
            |first, vals| {
                for (i, v) in vals.iter().enumerate() {
                    f(first + i as u64, decode(*v))?;
                }
                Ok(())
            },
            damage,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{BlockStore, OpenMode};

    #[test]
    fn get_maps_sentinel_and_checks_range() {
        let t = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        let p = std::env::temp_dir().join(format!("era-ea-{}-{}", std::process::id(), t));
        std::fs::write(&p, vec![0u8; 4096]).unwrap();
        let store = BlockStore::open(&p, OpenMode::ReadWrite).unwrap();
        let mut tm = TransactionManager::begin(store, 1);

        let ea = EraArray::build(&mut tm, &[NEVER_WRITTEN, 3, 0, NEVER_WRITTEN]).unwrap();
        assert_eq!(ea.get(&tm, 0).unwrap(), None);
        assert_eq!(ea.get(&tm, 1).unwrap(), Some(3));
        assert_eq!(ea.get(&tm, 2).unwrap(), Some(0));
        let err = ea.get(&tm, 4).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<EraError>(),
            Some(EraError::BlockOutOfRange { block: 4, nr_blocks: 4 })
        ));

        let mut written = Vec::new();
        ea.for_each(&tm, |b, e| {
            if let Some(e) = e {
                written.push((b, e));
            }
            Ok(())
        })
        .unwrap();
        assert_eq!(written, vec![(1, 3), (2, 0)]);

        let empty = EraArray::create(&mut tm, 10).unwrap();
        assert_eq!(empty.get(&tm, 9).unwrap(), None);
        let _ = std::fs::remove_file(&p);
    }
}
