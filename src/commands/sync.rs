use crate::cli::PathArgs;
use crate::core::{format_bytes, ProgressReporter, RunStatus, SyncEngine, SyncEvent, SyncPhase, SyncReport};
use crate::volume::VolumeRole;
use anyhow::{Context, Result};
use indicatif::{HumanBytes, MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::path::Path;
use std::time::Duration;
use tracing::info;

const BAR_TEMPLATE: &str = "[{elapsed_precise}] {prefix:.bold} ▕{bar:40.blue}▏{pos}/{len} {wide_msg}";
const SPACE_TEMPLATE: &str = "           {msg}";

/// 执行同步并在终端显示进度
pub async fn run_sync(
    config_dir: &Path,
    paths: PathArgs,
    json: bool,
    no_prune: bool,
) -> Result<RunStatus> {
    let mut config = super::load_config(config_dir, paths)?;
    if no_prune {
        config.prune_library = false;
    }

    let (reporter, mut rx) = ProgressReporter::channel();
    let engine = SyncEngine::new(config).with_reporter(reporter);

    // 引擎在独立任务中运行，结束时发送端随之释放
    let task = tokio::spawn(async move { engine.run().await });

    let mut view = ProgressView::new(json);
    while let Some(event) = rx.recv().await {
        view.handle(event);
    }
    view.finish();

    let report = task.await.context("同步任务异常退出")??;
    info!("同步报告: {:?}", report);

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }

    Ok(report.status)
}

/// 终端进度显示：一行进度条，一行卷容量
struct ProgressView {
    bar: ProgressBar,
    space: ProgressBar,
    primary: Option<String>,
    secondary: Option<String>,
}

impl ProgressView {
    fn new(hidden: bool) -> Self {
        let multi = if hidden {
            MultiProgress::with_draw_target(ProgressDrawTarget::hidden())
        } else {
            MultiProgress::new()
        };

        let bar = multi.add(ProgressBar::new(0));
        if let Ok(style) = ProgressStyle::with_template(BAR_TEMPLATE) {
            bar.set_style(style.progress_chars("█▉▊▋▌▍▎▏ "));
        }
        bar.enable_steady_tick(Duration::from_millis(100));

        let space = multi.add(ProgressBar::new_spinner());
        if let Ok(style) = ProgressStyle::with_template(SPACE_TEMPLATE) {
            space.set_style(style);
        }

        Self {
            bar,
            space,
            primary: None,
            secondary: None,
        }
    }

    fn handle(&mut self, event: SyncEvent) {
        match event {
            SyncEvent::Phase(phase) => self.bar.set_prefix(phase_label(phase)),
            SyncEvent::Status(message) => self.bar.set_message(message),
            SyncEvent::Progress { processed, total } => {
                self.bar.set_length(total as u64);
                self.bar.set_position(processed as u64);
            }
            SyncEvent::Space(snapshot) => {
                let line = format!(
                    "{} free of {} ({:.0}% used)",
                    format_bytes(snapshot.available),
                    format_bytes(snapshot.total),
                    snapshot.used_ratio() * 100.0
                );
                match snapshot.role {
                    VolumeRole::Primary => self.primary = Some(line),
                    VolumeRole::Secondary => self.secondary = Some(line),
                }
                self.space.set_message(self.space_line());
            }
            SyncEvent::CoverArt { track, artwork } => {
                self.bar.println(format!(
                    "  ♪ {} [{} cover, {}]",
                    track.file_name(),
                    artwork.mime_type.as_deref().unwrap_or("image"),
                    HumanBytes(artwork.data.len() as u64)
                ));
            }
            SyncEvent::Warning(message) => self.bar.println(format!("warning: {}", message)),
        }
    }

    fn space_line(&self) -> String {
        let mut parts = Vec::new();
        if let Some(line) = &self.primary {
            parts.push(format!("Player: {}", line));
        }
        if let Some(line) = &self.secondary {
            parts.push(format!("Card: {}", line));
        }
        parts.join(" | ")
    }

    fn finish(&self) {
        self.bar.finish();
        self.space.finish();
    }
}

fn phase_label(phase: SyncPhase) -> &'static str {
    match phase {
        SyncPhase::Scanning => "Scanning",
        SyncPhase::Deleting => "Deleting",
        SyncPhase::Copying => "Copying",
        SyncPhase::Finished => "Finished",
    }
}

fn print_report(report: &SyncReport) {
    println!();
    match report.status {
        RunStatus::Completed => println!("Done!"),
        RunStatus::SpaceExhausted => println!(
            "Not enough space: {} of {} files were not copied.",
            report.files_remaining, report.files_to_add
        ),
    }
    println!(
        "Library: {} files, {}",
        report.library_files,
        format_bytes(report.library_bytes)
    );
    println!("Device:  {} files before sync", report.device_files);
    println!(
        "Deleted: {} ({} missing, {} failed)",
        report.files_deleted, report.delete_missing, report.delete_failed
    );
    println!(
        "Copied:  {} of {} ({}), {} abandoned",
        report.files_copied,
        report.files_to_add,
        format_bytes(report.bytes_copied),
        report.files_abandoned
    );
    if report.pruned_dirs > 0 {
        println!("Removed {} empty library folders", report.pruned_dirs);
    }
    if report.stale_parts_removed > 0 {
        println!(
            "Cleaned {} unfinished copies from an earlier run",
            report.stale_parts_removed
        );
    }
    let seconds = report.duration().num_milliseconds() as f64 / 1000.0;
    println!("Took {:.1}s", seconds);
}
