// tests/invalidate_truth.rs
//
// Случайные истории записей против независимо посчитанной правды.
// Модель: в каждой эре e пишется множество блоков W_e. Эры <= digested уже
// свёрнуты в era array (в нём максимум свёрнутой эры блока), более поздние
// лежат writeset'ами. Правда для порога T: {b : b ∈ W_e для некоторого e >= T}.

use anyhow::Result;
use std::collections::BTreeSet;
use std::fs;
use std::path::PathBuf;

use oorandom::Rand64;

use era_tools::bitset::words_from_bits;
use era_tools::consts::{METADATA_BLOCK_SIZE, NEVER_WRITTEN};
use era_tools::invalidate::blocks_written_since;
use era_tools::metadata::{Metadata, MetadataMode};
use era_tools::store::{BlockStore, OpenMode};
use era_tools::writeset::{FatalDamage, WritesetSpec};

struct History {
    nr_blocks: u32,
    current_era: u32,
    digested: u32,
    writes: Vec<BTreeSet<u32>>, // writes[e] — блоки, записанные в эре e
}

impl History {
    fn random(rng: &mut Rand64, nr_blocks: u32, eras: u32, digested: u32) -> Self {
        let mut writes = vec![BTreeSet::new(); eras as usize + 1];
        for set in writes.iter_mut().skip(1) {
            let n = rng.rand_range(0..(nr_blocks as u64 / 4 + 1));
            for _ in 0..n {
                set.insert(rng.rand_range(0..nr_blocks as u64) as u32);
            }
            // иногда — плотный отрезок
            if rng.rand_range(0..3) == 0 {
                let start = rng.rand_range(0..nr_blocks as u64) as u32;
                let len = rng.rand_range(1..200) as u32;
                for b in start..start.saturating_add(len).min(nr_blocks) {
                    set.insert(b);
                }
            }
        }
        Self {
            nr_blocks,
            current_era: eras + 1,
            digested,
            writes,
        }
    }

    fn era_array(&self) -> Vec<u32> {
        let mut eras = vec![NEVER_WRITTEN; self.nr_blocks as usize];
        for e in 1..=self.digested {
            for &b in &self.writes[e as usize] {
                eras[b as usize] = e;
            }
        }
        eras
    }

    fn writesets(&self) -> Vec<WritesetSpec> {
        (self.digested + 1..self.writes.len() as u32)
            .map(|e| WritesetSpec {
                era: e,
                nr_bits: self.nr_blocks,
                words: words_from_bits(self.nr_blocks, self.writes[e as usize].iter().copied()),
            })
            .collect()
    }

    fn truth(&self, threshold: u32) -> BTreeSet<u32> {
        let mut out = BTreeSet::new();
        for (e, set) in self.writes.iter().enumerate() {
            if e as u32 >= threshold {
                out.extend(set.iter().copied());
            }
        }
        out
    }
}

fn write_history(path: &PathBuf, h: &History, max_entries: Option<u32>) -> Result<()> {
    fs::write(path, vec![0u8; METADATA_BLOCK_SIZE])?;
    let store = BlockStore::open(path, OpenMode::ReadWrite)?;
    let mut md = Metadata::open(store, MetadataMode::Create)?;
    md.set_btree_max_entries(max_entries);
    md.begin_superblock(h.nr_blocks, h.current_era, 128)?;
    md.set_era_array(&h.era_array())?;
    md.set_writesets(&h.writesets())?;
    md.commit()
}

#[test]
fn random_histories_match_truth() -> Result<()> {
    let root = unique_root("truth");
    fs::create_dir_all(&root)?;
    let mut rng = Rand64::new(0xE7A_5EED);

    for round in 0..12u32 {
        let nr_blocks = 1 + rng.rand_range(0..40_000) as u32;
        let eras = 1 + rng.rand_range(0..20) as u32;
        let digested = rng.rand_range(0..(eras as u64 + 1)) as u32;
        let h = History::random(&mut rng, nr_blocks, eras, digested);
        let max_entries = if round % 2 == 0 { Some(3) } else { None };

        let path = root.join(format!("md-{}", round));
        write_history(&path, &h, max_entries)?;

        let store = BlockStore::open(&path, OpenMode::ReadOnlyExclusive)?;
        let md = Metadata::open(store, MetadataMode::Open)?;

        let mut prev: Option<BTreeSet<u32>> = None;
        for t in 0..=h.current_era + 1 {
            let got = blocks_written_since(&md, t, &mut FatalDamage)?;
            assert_eq!(got, h.truth(t), "round {} threshold {}", round, t);
            // монотонность: больший порог — подмножество
            if let Some(p) = &prev {
                assert!(got.is_subset(p), "round {} threshold {}", round, t);
            }
            prev = Some(got);
        }

        // порог 0 — все когда-либо писавшиеся блоки
        let all: BTreeSet<u32> = h.writes.iter().flatten().copied().collect();
        assert_eq!(blocks_written_since(&md, 0, &mut FatalDamage)?, all);
    }

    let _ = fs::remove_dir_all(&root);
    Ok(())
}

#[test]
fn never_written_volume_is_empty() -> Result<()> {
    let root = unique_root("empty");
    fs::create_dir_all(&root)?;
    let path = root.join("md");
    let h = History {
        nr_blocks: 1000,
        current_era: 1,
        digested: 0,
        writes: vec![BTreeSet::new()],
    };
    write_history(&path, &h, None)?;

    let store = BlockStore::open(&path, OpenMode::ReadOnlyExclusive)?;
    let md = Metadata::open(store, MetadataMode::Open)?;
    assert!(blocks_written_since(&md, 0, &mut FatalDamage)?.is_empty());

    let _ = fs::remove_dir_all(&root);
    Ok(())
}

fn unique_root(prefix: &str) -> PathBuf {
    let pid = std::process::id();
    let t = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    std::env::temp_dir().join(format!("era-{}-{}-{}", prefix, pid, t))
}
