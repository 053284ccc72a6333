//! Centime Core Library
//!
//! Shared functionality for the Centime personal finance tool:
//! - Database access and migrations
//! - CSV import with separator, date and layout detection
//! - Import sessions with column mapping and deduplication
//! - Multi-strategy category auto-assignment engine
//! - Conflict resolution between competing category candidates
//! - Personal pattern learning from feedback and manual habits
//! - Default category taxonomy and starter pattern set

pub mod classify;
pub mod config;
pub mod db;
pub mod error;
pub mod ingest;
pub mod learn;
pub mod models;
pub mod normalize;
pub mod session;
pub mod taxonomy;

mod resolve;

pub use classify::{BudgetNotifier, CategoryAssigner, NullNotifier};
pub use config::EngineConfig;
pub use db::{Database, PatternStats, StatusCounts, TransactionInsert};
pub use error::{Error, Result, ValidationError};
pub use ingest::{ColumnMapping, RowError};
pub use learn::PatternLearner;
pub use models::{
    Assignment, AssignmentStatus, BulkClassifyResult, Category, CategoryGroup, Direction,
    MaintenanceResult, ResolutionRule, Strategy, Transaction,
};
pub use session::{ImportSummary, SessionPreview, SessionStore};
