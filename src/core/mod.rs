pub mod engine;
pub mod media;
pub mod progress;
pub mod reconciler;
pub mod scanner;
pub mod transfer;

pub use engine::{RunStatus, SyncAnalysis, SyncEngine, SyncReport};
pub use media::{ExtensionSet, FileSet, MediaPath, DEFAULT_EXTENSIONS};
pub use progress::{format_bytes, ProgressReporter, SyncEvent, SyncPhase, VolumeSnapshot};
pub use reconciler::{reconcile, SyncPlan};
pub use scanner::{LibraryScan, MediaScanner, PruneReport, ScanConfig};
pub use transfer::{copy_file, sweep_part_files, FileTransfer, Placement, TransferOutcome};
