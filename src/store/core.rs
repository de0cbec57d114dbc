//! store/core — BlockStore: открытие файла метаданных в одном из трёх режимов.

use anyhow::{Context, Result};
use std::fs::{File, OpenOptions};
use std::io::{Seek, SeekFrom};
use std::path::{Path, PathBuf};

use crate::consts::METADATA_BLOCK_SIZE;
use crate::lock::{try_lock_store, LockGuard, LockMode};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    /// Только чтение, допускает других читателей (metadata snapshot на живом таргете).
    ReadOnlyShared,
    /// Только чтение, эксклюзивно (живой корень).
    ReadOnlyExclusive,
    /// Чтение/запись, эксклюзивно (restore).
    ReadWrite,
}

impl OpenMode {
    #[inline]
    pub fn is_writable(self) -> bool {
        matches!(self, OpenMode::ReadWrite)
    }

    fn lock_mode(self) -> LockMode {
        match self {
            OpenMode::ReadOnlyShared => LockMode::Shared,
            OpenMode::ReadOnlyExclusive | OpenMode::ReadWrite => LockMode::Exclusive,
        }
    }
}

pub struct BlockStore {
    pub path: PathBuf,
    pub(crate) file: File,
    pub(crate) mode: OpenMode,
    // fsync перед/после записи суперблока при commit.
    pub(crate) data_fsync: bool,
    // Ёмкость в блоках для устройств; None — обычный файл, растёт по мере записи.
    pub(crate) capacity_blocks: Option<u64>,
    _lock: LockGuard,
}

impl BlockStore {
    /// Открыть store по пути. Файл должен существовать.
    pub fn open(path: &Path, mode: OpenMode) -> Result<Self> {
        let mut opts = OpenOptions::new();
        opts.read(true);
        if mode.is_writable() {
            opts.write(true);
        }
        let mut file = opts
            .open(path)
            .with_context(|| format!("open metadata store {}", path.display()))?;

        let lock = try_lock_store(&file, path, mode.lock_mode())?;

        let md = file
            .metadata()
            .with_context(|| format!("stat {}", path.display()))?;
        let capacity_blocks = if md.is_file() {
            None
        } else {
            // Для блочных устройств metadata().len() == 0 — меряем через seek.
            let len = file.seek(SeekFrom::End(0))?;
            file.seek(SeekFrom::Start(0))?;
            Some(len / METADATA_BLOCK_SIZE as u64)
        };

        log::debug!(
            "store {} opened ({:?}, capacity={:?})",
            path.display(),
            mode,
            capacity_blocks
        );

        Ok(Self {
            path: path.to_path_buf(),
            file,
            mode,
            data_fsync: true,
            capacity_blocks,
            _lock: lock,
        })
    }

    #[inline]
    pub fn mode(&self) -> OpenMode {
        self.mode
    }

    pub fn set_data_fsync(&mut self, on: bool) {
        self.data_fsync = on;
    }
}
