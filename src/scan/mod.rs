//! Source discovery and change classification

pub mod changes;
pub mod scanner;

pub use changes::{classify_changes, ChangeSet};
pub use scanner::{FileScanner, ScanStats};
