//! array — persistent array значений фиксированной ширины.
//!
//! Раскладка:
//! - цепочка индексных узлов (ARRAY_INDEX), связанных через `next`; каждый хранит
//!   u64-ссылки на листья, а в заголовке — длину массива (aux) и fill-значение;
//! - листья (ARRAY_LEAF) с упакованными значениями.
//!
//! Ссылка NO_BLOCK вместо листа означает "все значения листа равны fill":
//! так хранятся era array (fill = NEVER_WRITTEN) и разреженные битмапы (fill = 0).
//!
//! Подмодули:
//! - walk.rs — damage-tolerant обход листьев (и строгий вариант for_each).

use anyhow::{anyhow, Result};
use byteorder::{ByteOrder, LittleEndian};

use crate::consts::NO_BLOCK;
use crate::error::EraError;
use crate::node::{
    entries_per_node, node_header_write, node_payload, node_payload_mut, NodeHeader,
    NODE_TYPE_ARRAY_INDEX, NODE_TYPE_ARRAY_LEAF,
};
use crate::store::TransactionManager;

pub mod walk;

/// Значение, которое умеет храниться в persistent array.
pub trait ArrayValue: Copy + PartialEq + std::fmt::Debug {
    const SIZE: usize;
    fn unpack(b: &[u8]) -> Self;
    fn pack(&self, b: &mut [u8]);
    fn to_fill(&self) -> u64;
    fn from_fill(v: u64) -> Self;
}

impl ArrayValue for u32 {
    const SIZE: usize = 4;
    fn unpack(b: &[u8]) -> Self {
        LittleEndian::read_u32(b)
    }
    fn pack(&self, b: &mut [u8]) {
        LittleEndian::write_u32(b, *self)
    }
    fn to_fill(&self) -> u64 {
        *self as u64
    }
    fn from_fill(v: u64) -> Self {
        v as u32
    }
}

impl ArrayValue for u64 {
    const SIZE: usize = 8;
    fn unpack(b: &[u8]) -> Self {
        LittleEndian::read_u64(b)
    }
    fn pack(&self, b: &mut [u8]) {
        LittleEndian::write_u64(b, *self)
    }
    fn to_fill(&self) -> u64 {
        *self
    }
    fn from_fill(v: u64) -> Self {
        v
    }
}

/// Хэндл persistent array: корень (первый индексный узел), длина и fill.
#[derive(Debug, Clone, Copy)]
pub struct PArray<V: ArrayValue> {
    pub root: u64,
    pub len: u64,
    pub fill: V,
}

/// Разобранный индексный узел.
pub(crate) struct IndexNode {
    pub next: u64,
    pub leaves: Vec<u64>,
}

#[inline]
pub(crate) fn index_cap(block_size: usize) -> u64 {
    entries_per_node(block_size, 8) as u64
}

impl<V: ArrayValue> PArray<V> {
    /// Сколько значений помещается в один лист.
    #[inline]
    pub fn leaf_cap(block_size: usize) -> u64 {
        entries_per_node(block_size, V::SIZE) as u64
    }

    #[inline]
    pub(crate) fn nr_leaves(&self, block_size: usize) -> u64 {
        let cap = Self::leaf_cap(block_size);
        (self.len + cap - 1) / cap
    }

    /// Новый массив длины `len`, все значения равны `fill`. Листья не материализуются.
    pub fn create(tm: &mut TransactionManager, len: u64, fill: V) -> Result<Self> {
        let cap = Self::leaf_cap(tm.block_size());
        let nr_leaves = (len + cap - 1) / cap;
        let leaves = vec![NO_BLOCK; nr_leaves as usize];
        Self::write_index_chain(tm, len, fill, &leaves)
    }

    /// Построить массив из значений целиком (листья, равные fill, не пишутся).
    pub fn build(tm: &mut TransactionManager, fill: V, values: &[V]) -> Result<Self> {
        let cap = Self::leaf_cap(tm.block_size()) as usize;
        let mut leaves = Vec::with_capacity((values.len() + cap - 1) / cap);
        for chunk in values.chunks(cap) {
            leaves.push(Self::write_leaf(tm, fill, chunk)?);
        }
        Self::write_index_chain(tm, values.len() as u64, fill, &leaves)
    }

    /// Построить массив длины `len` из пар (индекс, значение) по строгому возрастанию
    /// индекса; всё остальное равно `fill`. В памяти держится один лист за раз.
    pub fn build_sparse<I>(tm: &mut TransactionManager, len: u64, fill: V, entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = (u64, V)>,
    {
        let cap = Self::leaf_cap(tm.block_size());
        let mut leaves = vec![NO_BLOCK; ((len + cap - 1) / cap) as usize];
        let mut pending: Option<(u64, Vec<V>)> = None;
        let mut prev: Option<u64> = None;

        for (index, v) in entries {
            if index >= len {
                return Err(anyhow!("array index {} out of range (len {})", index, len));
            }
            if prev.map_or(false, |p| index <= p) {
                return Err(anyhow!("array indexes not ascending at {}", index));
            }
            prev = Some(index);

            let leaf_no = index / cap;
            if pending.as_ref().map_or(true, |(n, _)| *n != leaf_no) {
                if let Some((n, vals)) = pending.take() {
                    leaves[n as usize] = Self::write_leaf(tm, fill, &vals)?;
                }
                let size = cap.min(len - leaf_no * cap);
                pending = Some((leaf_no, vec![fill; size as usize]));
            }
            if let Some((_, vals)) = pending.as_mut() {
                vals[(index % cap) as usize] = v;
            }
        }
        if let Some((n, vals)) = pending {
            leaves[n as usize] = Self::write_leaf(tm, fill, &vals)?;
        }
        Self::write_index_chain(tm, len, fill, &leaves)
    }

    /// Записать один лист; лист из одних fill не материализуется (NO_BLOCK).
    fn write_leaf(tm: &mut TransactionManager, fill: V, chunk: &[V]) -> Result<u64> {
        if chunk.iter().all(|v| *v == fill) {
            return Ok(NO_BLOCK);
        }
        let mut h = NodeHeader::new(NODE_TYPE_ARRAY_LEAF, 0, V::SIZE as u32);
        h.max_entries = Self::leaf_cap(tm.block_size()) as u32;
        h.nr_entries = chunk.len() as u32;
        let (_, mut buf) = tm.new_node(h)?;
        {
            let p = node_payload_mut(&mut buf);
            for (i, v) in chunk.iter().enumerate() {
                v.pack(&mut p[i * V::SIZE..(i + 1) * V::SIZE]);
            }
        }
        tm.write_node(&mut buf)
    }

    fn write_index_chain(
        tm: &mut TransactionManager,
        len: u64,
        fill: V,
        leaves: &[u64],
    ) -> Result<Self> {
        let icap = index_cap(tm.block_size()) as usize;
        let nr_index = ((leaves.len() + icap - 1) / icap).max(1);

        // Сначала выделяем все индексные узлы — нужны адреса для next.
        let mut nodes = Vec::with_capacity(nr_index);
        for _ in 0..nr_index {
            let mut h = NodeHeader::new(NODE_TYPE_ARRAY_INDEX, 0, V::SIZE as u32);
            h.max_entries = icap as u32;
            h.aux = len;
            h.fill = fill.to_fill();
            nodes.push((h, tm.new_node(h)?));
        }
        let ids: Vec<u64> = nodes.iter().map(|(_, (id, _))| *id).collect();

        for (i, (mut h, (id, mut buf))) in nodes.into_iter().enumerate() {
            let lo = (i * icap).min(leaves.len());
            let hi = ((i + 1) * icap).min(leaves.len());
            h.block_id = id;
            h.nr_entries = (hi - lo) as u32;
            h.next = ids.get(i + 1).copied().unwrap_or(NO_BLOCK);
            node_header_write(&mut buf, &h)?;
            {
                let p = node_payload_mut(&mut buf);
                for (j, leaf) in leaves[lo..hi].iter().enumerate() {
                    LittleEndian::write_u64(&mut p[j * 8..j * 8 + 8], *leaf);
                }
            }
            tm.write_node(&mut buf)?;
        }

        Ok(Self {
            root: ids[0],
            len,
            fill,
        })
    }

    /// Открыть существующий массив по корню.
    pub fn open(tm: &TransactionManager, root: u64) -> Result<Self> {
        let (h, _) = tm.read_node(root, NODE_TYPE_ARRAY_INDEX)?;
        if h.value_size as usize != V::SIZE {
            return Err(EraError::NodeDamaged {
                block: root,
                reason: format!("array value size {} (expected {})", h.value_size, V::SIZE),
            }
            .into());
        }
        Ok(Self {
            root,
            len: h.aux,
            fill: V::from_fill(h.fill),
        })
    }

    /// Прочитать индексный узел и сверить его с хэндлом массива.
    pub(crate) fn read_index(
        &self,
        tm: &TransactionManager,
        block: u64,
        expected_entries: u64,
    ) -> Result<IndexNode> {
        let (h, buf) = tm.read_node(block, NODE_TYPE_ARRAY_INDEX)?;
        if h.aux != self.len || h.value_size as usize != V::SIZE {
            return Err(EraError::NodeDamaged {
                block,
                reason: format!("index node describes a different array (len {})", h.aux),
            }
            .into());
        }
        if h.nr_entries as u64 != expected_entries {
            return Err(EraError::NodeDamaged {
                block,
                reason: format!(
                    "index node holds {} leaves (expected {})",
                    h.nr_entries, expected_entries
                ),
            }
            .into());
        }
        let p = node_payload(&buf);
        let leaves = (0..h.nr_entries as usize)
            .map(|i| LittleEndian::read_u64(&p[i * 8..i * 8 + 8]))
            .collect();
        Ok(IndexNode {
            next: h.next,
            leaves,
        })
    }

    /// Прочитать лист и вернуть его значения (ожидается ровно `expected` штук).
    pub(crate) fn read_leaf(
        &self,
        tm: &TransactionManager,
        block: u64,
        expected: u64,
    ) -> Result<Vec<V>> {
        let (h, buf) = tm.read_node(block, NODE_TYPE_ARRAY_LEAF)?;
        if h.value_size as usize != V::SIZE || h.nr_entries as u64 != expected {
            return Err(EraError::NodeDamaged {
                block,
                reason: format!(
                    "leaf holds {} values of size {} (expected {} of size {})",
                    h.nr_entries,
                    h.value_size,
                    expected,
                    V::SIZE
                ),
            }
            .into());
        }
        let p = node_payload(&buf);
        Ok((0..expected as usize)
            .map(|i| V::unpack(&p[i * V::SIZE..(i + 1) * V::SIZE]))
            .collect())
    }

    /// Ссылки на листья по порядку (NO_BLOCK — лист из fill). Строго.
    pub fn leaf_blocks(&self, tm: &TransactionManager) -> Result<Vec<u64>> {
        let icap = index_cap(tm.block_size());
        let nr_leaves = self.nr_leaves(tm.block_size());
        let mut out = Vec::with_capacity(nr_leaves as usize);
        let mut node = self.root;
        while (out.len() as u64) < nr_leaves {
            let expected = icap.min(nr_leaves - out.len() as u64);
            let idx = self.read_index(tm, node, expected)?;
            out.extend_from_slice(&idx.leaves);
            node = idx.next;
        }
        Ok(out)
    }

    /// Значение по индексу.
    pub fn get(&self, tm: &TransactionManager, index: u64) -> Result<V> {
        if index >= self.len {
            return Err(anyhow!("array index {} out of range (len {})", index, self.len));
        }
        let bs = tm.block_size();
        let lcap = Self::leaf_cap(bs);
        let icap = index_cap(bs);
        let nr_leaves = self.nr_leaves(bs);

        let leaf_no = index / lcap;
        let mut node = self.root;
        let mut first_leaf = 0u64;
        loop {
            let expected = icap.min(nr_leaves - first_leaf);
            let idx = self.read_index(tm, node, expected)?;
            if leaf_no < first_leaf + expected {
                let ptr = idx.leaves[(leaf_no - first_leaf) as usize];
                if ptr == NO_BLOCK {
                    return Ok(self.fill);
                }
                let first = leaf_no * lcap;
                let n = lcap.min(self.len - first);
                let vals = self.read_leaf(tm, ptr, n)?;
                return Ok(vals[(index - first) as usize]);
            }
            first_leaf += expected;
            node = idx.next;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{BlockStore, OpenMode};
    use std::path::PathBuf;

    fn scratch_store(tag: &str) -> PathBuf {
        let t = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        let p = std::env::temp_dir().join(format!("era-array-{}-{}-{}", tag, std::process::id(), t));
        std::fs::write(&p, vec![0u8; 4096]).unwrap();
        p
    }

    #[test]
    fn sparse_create_reads_fill() {
        let p = scratch_store("sparse");
        let store = BlockStore::open(&p, OpenMode::ReadWrite).unwrap();
        let mut tm = TransactionManager::begin(store, 1);

        let arr = PArray::<u32>::create(&mut tm, 5000, 7).unwrap();
        assert_eq!(arr.len, 5000);
        assert_eq!(arr.get(&tm, 0).unwrap(), 7);
        assert_eq!(arr.get(&tm, 4999).unwrap(), 7);
        assert!(arr.get(&tm, 5000).is_err());
        let _ = std::fs::remove_file(&p);
    }

    #[test]
    fn build_spans_many_index_nodes() {
        let p = scratch_store("build");
        let store = BlockStore::open(&p, OpenMode::ReadWrite).unwrap();
        let mut tm = TransactionManager::begin(store, 1);

        // 502 ссылок на индексный узел × 502 слова на лист → нужно >1 индексного узла
        let lcap = PArray::<u64>::leaf_cap(4096);
        let len = lcap * 600 + 3;
        let mut vals = vec![0u64; len as usize];
        vals[0] = 1;
        vals[(lcap * 550) as usize] = 0xFFFF;
        vals[len as usize - 1] = 42;

        let arr = PArray::build(&mut tm, 0u64, &vals).unwrap();
        let reopened = PArray::<u64>::open(&tm, arr.root).unwrap();
        assert_eq!(reopened.len, len);
        assert_eq!(reopened.get(&tm, 0).unwrap(), 1);
        assert_eq!(reopened.get(&tm, 1).unwrap(), 0);
        assert_eq!(reopened.get(&tm, lcap * 550).unwrap(), 0xFFFF);
        assert_eq!(reopened.get(&tm, len - 1).unwrap(), 42);
        let _ = std::fs::remove_file(&p);
    }

    #[test]
    fn sparse_build_writes_only_touched_leaves() {
        let p = scratch_store("sparse-build");
        let store = BlockStore::open(&p, OpenMode::ReadWrite).unwrap();
        let mut tm = TransactionManager::begin(store, 1);

        let lcap = PArray::<u32>::leaf_cap(4096);
        let len = lcap * 1000 + 5;
        let entries = vec![(0u64, 3u32), (1, 4), (lcap * 700 + 9, 5), (len - 1, 6)];
        let before = tm.next_block();
        let arr = PArray::build_sparse(&mut tm, len, u32::MAX, entries.clone()).unwrap();

        // три листа + два индексных узла (1001 ссылка при 502 на узел → 2)
        assert_eq!(tm.next_block() - before, 3 + 2);
        for (i, v) in &entries {
            assert_eq!(arr.get(&tm, *i).unwrap(), *v);
        }
        assert_eq!(arr.get(&tm, 2).unwrap(), u32::MAX);
        assert_eq!(arr.get(&tm, lcap * 500).unwrap(), u32::MAX);

        let dense = {
            let mut v = vec![u32::MAX; len as usize];
            for (i, x) in &entries {
                v[*i as usize] = *x;
            }
            v
        };
        let mut back = Vec::new();
        arr.for_each(&tm, |_, vals| {
            back.extend_from_slice(vals);
            Ok(())
        })
        .unwrap();
        assert_eq!(back, dense);

        assert!(PArray::build_sparse(&mut tm, 10, 0u32, vec![(3u64, 1u32), (3, 2)]).is_err());
        assert!(PArray::build_sparse(&mut tm, 10, 0u32, vec![(10u64, 1u32)]).is_err());
        let _ = std::fs::remove_file(&p);
    }

    #[test]
    fn empty_array_has_root() {
        let p = scratch_store("empty");
        let store = BlockStore::open(&p, OpenMode::ReadWrite).unwrap();
        let mut tm = TransactionManager::begin(store, 1);
        let arr = PArray::<u32>::build(&mut tm, 0, &[]).unwrap();
        let reopened = PArray::<u32>::open(&tm, arr.root).unwrap();
        assert_eq!(reopened.len, 0);
        let _ = std::fs::remove_file(&p);
    }
}
