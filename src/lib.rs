// Базовые модули
pub mod consts;
pub mod error;
pub mod config;
pub mod lock;
pub mod superblock;

// Формат узлов и block store
pub mod node;   // src/node/{mod,common,checksum,header}.rs
pub mod store;  // src/store/{mod,core,io,transaction}.rs

// Персистентные структуры
pub mod array;     // src/array/{mod,walk}.rs
pub mod bitset;
pub mod btree;     // src/btree/{mod,walk}.rs
pub mod era_array;
pub mod writeset;  // src/writeset/{mod,damage,walk}.rs
pub mod metadata;  // src/metadata/{mod,create,snap}.rs

// Отчёты и текстовый формат
pub mod report;
pub mod xml;       // src/xml/{mod,parse,writer}.rs

// Операции инструментов
pub mod invalidate; // src/invalidate/{mod,runs,emit}.rs
pub mod restore;    // src/restore/{mod,emitter}.rs
pub mod dump;
pub mod check;

// Удобные реэкспорты
pub use config::{EraConfig, EraConfigBuilder};
pub use error::EraError;
pub use metadata::{Metadata, MetadataMode};
pub use store::{BlockStore, OpenMode, TransactionManager};
pub use writeset::{Damage, DamageHandler, FatalDamage, ReportingDamage};
pub use report::{NestedOutput, Severity};
pub use invalidate::{blocks_written_since, blocks_written_since_reporting, InvalidateOptions};
pub use restore::{restore, RestoreOptions};
