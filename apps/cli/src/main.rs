mod args;
mod logging;

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use seekcore_config::Settings;
use seekcore_events::EventBus;
use seekcore_index::Entry;
use seekcore_shell::{LocalDirectoryService, LocalSearchService};
use seekd::{Explorer, Notice, SessionPhase, SessionToken, Submitted, ViewMode};

use args::CliArgs;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = CliArgs::parse();

    let settings = match &args.config {
        Some(path) => Settings::load(path)
            .with_context(|| format!("loading settings from {}", path.display()))?,
        None => Settings::default(),
    }
    .apply_env()
    .context("applying environment overrides")?;
    logging::init(args.verbose, &settings.log_filter);

    let bus = EventBus::new();
    let directory = Arc::new(LocalDirectoryService::from_settings(&settings));
    let search = Arc::new(LocalSearchService::from_settings(bus.clone(), &settings));
    let explorer = Explorer::from_settings(directory, search, bus, &settings);

    explorer.start().await.context("listing devices")?;
    if let Some(cwd) = &args.cwd {
        explorer
            .navigation()
            .navigate_to(cwd)
            .await
            .with_context(|| format!("opening {cwd}"))?;
    }
    for filter in args.filters()? {
        let label = filter.label();
        if let Err(err) = explorer.add_filter(filter) {
            report(Notice::from(&err));
            tracing::debug!(%label, "filter skipped");
        }
    }
    explorer.set_llm(args.llm);

    let input = args.input.unwrap_or_default();
    match explorer.submit(&input).await {
        Ok(Submitted::Navigated(view_mode)) => print_view(&explorer, view_mode),
        Ok(Submitted::Searching(token)) => stream_results(&explorer, token).await,
        Err(err) => return Err(err).with_context(|| format!("handling `{input}`")),
    }
    Ok(())
}

fn report(notice: Notice) {
    eprintln!("{:?}: {}", notice.level, notice.message);
}

fn print_view(explorer: &Explorer, view_mode: ViewMode) {
    let state = explorer.navigation().state();
    match view_mode {
        ViewMode::Drives => {
            for disk in &state.devices {
                println!(
                    "{:<24} {:<8} {:>6.1}% used  {} free of {}",
                    disk.mount_point,
                    disk.filesystem_type,
                    disk.used_percent,
                    human_size(disk.free_bytes),
                    human_size(disk.total_bytes),
                );
            }
        }
        ViewMode::Files | ViewMode::SearchResults => {
            println!("{}", state.current_path);
            for entry in state.listing.entries() {
                print_entry(entry);
            }
        }
    }
}

async fn stream_results(explorer: &Explorer, token: SessionToken) {
    let session = explorer.session();
    let mut status = session.subscribe_status();
    let mut printed = 0usize;

    loop {
        let snapshot = session.snapshot();
        for entry in snapshot.results.get(printed..).unwrap_or(&[]) {
            print_entry(entry);
        }
        printed = snapshot.results.len();

        if snapshot.token != Some(token) || snapshot.phase != SessionPhase::Streaming {
            let seconds = snapshot.duration_seconds.unwrap_or_default();
            match snapshot.phase {
                SessionPhase::Cancelled => eprintln!("search cancelled after {seconds:.2}s"),
                _ => eprintln!("{printed} results in {seconds:.2}s"),
            }
            return;
        }

        tokio::select! {
            changed = status.changed() => {
                if changed.is_err() {
                    return;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                explorer.cancel_search();
            }
        }
    }
}

fn print_entry(entry: &Entry) {
    let kind = if entry.is_dir { "dir " } else { "file" };
    println!(
        "{kind} {:>10} {} {}",
        if entry.is_dir {
            String::from("-")
        } else {
            human_size(entry.size)
        },
        entry.modified_at.format("%Y-%m-%d %H:%M"),
        entry.path,
    );
}

fn human_size(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sizes_are_humanized() {
        assert_eq!(human_size(512), "512 B");
        assert_eq!(human_size(1536), "1.5 KB");
        assert_eq!(human_size(3 << 30), "3.0 GB");
    }
}
