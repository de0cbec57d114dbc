//! restore — пересобрать метаданные из описания.
//!
//! Порядок:
//! 1) вход существует (до любых изменений);
//! 2) выход существует и вмещает хотя бы суперблок;
//! 3) store открывается эксклюзивно на запись → с этого момента target "тронут";
//! 4) Metadata в режиме Create, события описания проигрываются по порядку;
//! 5) commit.
//! Любая ошибка после (3): commit не делается, суперблок затирается нулями
//! (маркер невалидных метаданных). Сбой самого затирания только логируется,
//! наружу уходит исходная ошибка.

use anyhow::{anyhow, Context, Result};
use log::{info, warn};
use std::path::{Path, PathBuf};

use crate::config::EraConfig;
use crate::consts::METADATA_BLOCK_SIZE;
use crate::metadata::{Metadata, MetadataMode};
use crate::store::{BlockStore, OpenMode};
use crate::superblock::zero_superblock;
use crate::xml::parse_xml;

pub mod emitter;

pub use emitter::RestoreEmitter;

#[derive(Debug, Clone)]
pub struct RestoreOptions {
    pub input: PathBuf,
    pub output: PathBuf,
    pub quiet: bool,
    pub config: EraConfig,
}

impl RestoreOptions {
    pub fn new(input: impl Into<PathBuf>, output: impl Into<PathBuf>) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
            quiet: false,
            config: EraConfig::from_env(),
        }
    }
}

/// Выход должен существовать и вмещать хотя бы один блок метаданных.
pub fn check_output_requirements(path: &Path) -> Result<()> {
    let md = std::fs::metadata(path)
        .with_context(|| format!("Couldn't stat output {}", path.display()))?;
    if md.is_file() && md.len() < METADATA_BLOCK_SIZE as u64 {
        return Err(anyhow!(
            "Output file too small: {} ({} bytes, need at least {})",
            path.display(),
            md.len(),
            METADATA_BLOCK_SIZE
        ));
    }
    Ok(())
}

pub fn restore(opts: &RestoreOptions) -> Result<()> {
    restore_with_reset(opts, zero_superblock)
}

/// restore с подменяемым сбросом target'а (на пути ошибки).
fn restore_with_reset<R>(opts: &RestoreOptions, reset: R) -> Result<()>
where
    R: FnOnce(&Path) -> Result<()>,
{
    if !opts.input.exists() {
        return Err(anyhow!("Couldn't stat file {}", opts.input.display()));
    }
    check_output_requirements(&opts.output)?;

    let mut store = BlockStore::open(&opts.output, OpenMode::ReadWrite)?;
    store.set_data_fsync(opts.config.data_fsync);

    // target тронут: дальше любая ошибка оставляет нулевой суперблок
    match replay(store, opts) {
        Ok(()) => {
            info!(
                "restore: {} → {} committed",
                opts.input.display(),
                opts.output.display()
            );
            Ok(())
        }
        Err(e) => {
            reset_target(&opts.output, reset);
            Err(e)
        }
    }
}

/// Пометить target невалидным. Сбой сброса только логируется: наружу уходит
/// исходная ошибка restore.
fn reset_target<R>(path: &Path, reset: R)
where
    R: FnOnce(&Path) -> Result<()>,
{
    if let Err(z) = reset(path) {
        warn!(
            "restore: failed to invalidate superblock of {}: {:#}",
            path.display(),
            z
        );
    }
}

fn replay(store: BlockStore, opts: &RestoreOptions) -> Result<()> {
    let mut md = Metadata::open(store, MetadataMode::Create)?;
    md.set_btree_max_entries(opts.config.btree_max_entries);
    let parsed = {
        let mut emitter = RestoreEmitter::new(&mut md);
        parse_xml(
            &opts.input,
            &mut emitter,
            opts.quiet,
            opts.config.progress_every,
        )
    };
    match parsed.and_then(|()| md.commit()) {
        Ok(()) => Ok(()),
        Err(e) => {
            md.abort();
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EraError;
    use std::path::PathBuf;

    fn scratch(tag: &str) -> PathBuf {
        let t = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        let root = std::env::temp_dir().join(format!("era-rst-{}-{}-{}", tag, std::process::id(), t));
        std::fs::create_dir_all(&root).unwrap();
        root
    }

    #[test]
    fn failed_reset_keeps_original_error() {
        let root = scratch("reset");
        let input = root.join("bad.xml");
        let output = root.join("md.bin");
        std::fs::write(
            &input,
            r#"<superblock block_size="128" nr_blocks="10" current_era="2">
  <era_array>
    <era block="20" era="1"/>
  </era_array>
</superblock>"#,
        )
        .unwrap();
        std::fs::write(&output, vec![0u8; METADATA_BLOCK_SIZE]).unwrap();

        let mut reset_called = false;
        let err = restore_with_reset(&RestoreOptions::new(&input, &output), |_: &Path| {
            reset_called = true;
            Err(anyhow!("device went away"))
        })
        .unwrap_err();

        assert!(reset_called);
        assert!(matches!(
            err.downcast_ref::<EraError>(),
            Some(EraError::MalformedDescription(_))
        ));
        assert!(!format!("{:#}", err).contains("device went away"));
        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn reset_is_skipped_when_input_is_missing() {
        let root = scratch("noinput");
        let output = root.join("md.bin");
        std::fs::write(&output, vec![0u8; METADATA_BLOCK_SIZE]).unwrap();

        let mut reset_called = false;
        let res = restore_with_reset(
            &RestoreOptions::new(root.join("absent.xml"), &output),
            |_: &Path| {
                reset_called = true;
                Ok(())
            },
        );
        assert!(res.is_err());
        assert!(!reset_called);
        let _ = std::fs::remove_dir_all(&root);
    }
}
