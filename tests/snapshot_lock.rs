// tests/snapshot_lock.rs
//
// Metadata snapshot: замороженный корень не меняется, когда живой идёт дальше.
// Блокировки store: эксклюзивные/разделяемые открытия.

use anyhow::Result;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use era_tools::bitset::words_from_bits;
use era_tools::consts::{METADATA_BLOCK_SIZE, NEVER_WRITTEN};
use era_tools::error::EraError;
use era_tools::invalidate::{decode_runs, invalidate, parse_blocks_xml, InvalidateOptions};
use era_tools::metadata::{Metadata, MetadataMode};
use era_tools::report::NestedOutput;
use era_tools::store::{BlockStore, OpenMode};
use era_tools::writeset::WritesetSpec;

fn build(path: &Path) -> Result<()> {
    fs::write(path, vec![0u8; METADATA_BLOCK_SIZE])?;
    let store = BlockStore::open(path, OpenMode::ReadWrite)?;
    let mut md = Metadata::open(store, MetadataMode::Create)?;
    md.begin_superblock(32, 3, 8)?;
    let mut eras = vec![NEVER_WRITTEN; 32];
    eras[1] = 1;
    eras[2] = 2;
    md.set_era_array(&eras)?;
    md.set_writesets(&[WritesetSpec {
        era: 2,
        nr_bits: 32,
        words: words_from_bits(32, [7]),
    }])?;
    md.commit()
}

fn invalidate_set(path: &Path, out: &Path, since: u32, snapshot: bool) -> Result<BTreeSet<u32>> {
    let opts = InvalidateOptions {
        input: path.to_path_buf(),
        output: out.display().to_string(),
        written_since: since,
        metadata_snapshot: snapshot,
        strict: true,
    };
    invalidate(&opts, &mut NestedOutput::new(Vec::new()))?;
    Ok(decode_runs(&parse_blocks_xml(&fs::read_to_string(out)?)?))
}

#[test]
fn snapshot_is_isolated_from_live_root() -> Result<()> {
    let root = unique_root("snap");
    fs::create_dir_all(&root)?;
    let path = root.join("md.bin");
    let out = root.join("blocks.xml");
    build(&path)?;

    // снапшота ещё нет
    let err = invalidate_set(&path, &out, 0, true).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<EraError>(),
        Some(EraError::NoMetadataSnapshot)
    ));

    {
        let store = BlockStore::open(&path, OpenMode::ReadWrite)?;
        let mut md = Metadata::open(store, MetadataMode::Open)?;
        md.take_metadata_snap()?;
        // второй раз нельзя
        let err = md.take_metadata_snap().unwrap_err();
        assert!(matches!(
            err.downcast_ref::<EraError>(),
            Some(EraError::MetadataSnapshotExists(_))
        ));
    }
    let before: BTreeSet<u32> = [1, 2, 7].into_iter().collect();
    assert_eq!(invalidate_set(&path, &out, 0, true)?, before);

    // живой корень уходит вперёд: новая эра, новые записи
    {
        let store = BlockStore::open(&path, OpenMode::ReadWrite)?;
        let mut md = Metadata::open(store, MetadataMode::Open)?;
        let mut eras = vec![NEVER_WRITTEN; 32];
        eras[1] = 1;
        eras[2] = 2;
        eras[7] = 2;
        md.set_current_era(5)?;
        md.set_era_array(&eras)?;
        md.set_writesets(&[WritesetSpec {
            era: 4,
            nr_bits: 32,
            words: words_from_bits(32, [20, 21]),
        }])?;
        md.commit()?;
    }

    let live: BTreeSet<u32> = [1, 2, 7, 20, 21].into_iter().collect();
    assert_eq!(invalidate_set(&path, &out, 0, false)?, live);
    assert_eq!(invalidate_set(&path, &out, 0, true)?, before);
    assert_eq!(
        invalidate_set(&path, &out, 4, false)?,
        [20, 21].into_iter().collect::<BTreeSet<u32>>()
    );
    assert!(invalidate_set(&path, &out, 4, true)?.is_empty());

    // snapshot отпущен
    {
        let store = BlockStore::open(&path, OpenMode::ReadWrite)?;
        let mut md = Metadata::open(store, MetadataMode::Open)?;
        md.drop_metadata_snap()?;
        assert!(md.metadata_snap().is_none());
    }
    assert!(invalidate_set(&path, &out, 0, true).is_err());

    let _ = fs::remove_dir_all(&root);
    Ok(())
}

#[test]
fn exclusive_open_conflicts() -> Result<()> {
    let root = unique_root("lock");
    fs::create_dir_all(&root)?;
    let path = root.join("md.bin");
    build(&path)?;

    {
        let _held = BlockStore::open(&path, OpenMode::ReadOnlyExclusive)?;
        for mode in [OpenMode::ReadOnlyShared, OpenMode::ReadOnlyExclusive, OpenMode::ReadWrite] {
            let err = BlockStore::open(&path, mode).err().expect("conflict");
            assert!(matches!(
                err.downcast_ref::<EraError>(),
                Some(EraError::StoreBusy(_))
            ));
        }
    }

    {
        // разделяемые читатели снапшота уживаются друг с другом
        let _a = BlockStore::open(&path, OpenMode::ReadOnlyShared)?;
        let _b = BlockStore::open(&path, OpenMode::ReadOnlyShared)?;
        assert!(BlockStore::open(&path, OpenMode::ReadWrite).is_err());
    }

    // после освобождения — снова можно
    let _w = BlockStore::open(&path, OpenMode::ReadWrite)?;

    let _ = fs::remove_dir_all(&root);
    Ok(())
}

#[test]
fn read_only_store_rejects_writes() -> Result<()> {
    let root = unique_root("ro");
    fs::create_dir_all(&root)?;
    let path = root.join("md.bin");
    build(&path)?;

    let store = BlockStore::open(&path, OpenMode::ReadOnlyExclusive)?;
    let err = Metadata::open(store, MetadataMode::Create).err().expect("read-only");
    assert!(matches!(
        err.downcast_ref::<EraError>(),
        Some(EraError::ReadOnlyStore)
    ));

    let store = BlockStore::open(&path, OpenMode::ReadOnlyExclusive)?;
    let mut md = Metadata::open(store, MetadataMode::Open)?;
    assert!(md.take_metadata_snap().is_err());
    let ea = md.era_array()?;
    let err = ea.get(md.tm(), 32).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<EraError>(),
        Some(EraError::BlockOutOfRange { block: 32, nr_blocks: 32 })
    ));

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
