// main.rs — CLI harness over the library; arg parsing by hand (no `clap`).

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use paraimage_updater::Updater;

fn usage() -> ! {
    eprintln!("usage: paraimage-updater <check | download <url> | install <path>>");
    std::process::exit(2);
}

fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let updater = Updater::from_env()?;

    match args.first().map(String::as_str) {
        Some("check") => {
            let summary = updater.check_for_updates()?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        Some("download") => {
            let url = args.get(1).unwrap_or_else(|| usage());
            let path = run_download(&updater, url)?;
            println!("{}", path.display());
        }
        Some("install") => {
            let path = args.get(1).unwrap_or_else(|| usage());
            updater.install(Path::new(path))?;
            eprintln!("[updater] update armed; exit the application to let it apply");
        }
        _ => usage(),
    }
    Ok(())
}

/// Run the download on this thread while a second thread polls the shared
/// progress state and reports it — the same read path the host UI uses.
fn run_download(updater: &Updater, url: &str) -> anyhow::Result<std::path::PathBuf> {
    let handle = updater.progress_handle();
    let finished = Arc::new(AtomicBool::new(false));
    let poller_finished = Arc::clone(&finished);

    let poller = std::thread::spawn(move || loop {
        let snap = handle.snapshot();
        if snap.active {
            match snap.percent {
                Some(p) => eprint!("\r[updater] downloading... {p}%"),
                None => eprint!("\r[updater] downloading... {} bytes", snap.downloaded),
            }
        }
        if snap.done || poller_finished.load(Ordering::Relaxed) {
            if snap.active {
                eprintln!();
            }
            break;
        }
        std::thread::sleep(Duration::from_millis(200));
    });

    let result = updater.download(url);
    finished.store(true, Ordering::Relaxed);
    let _ = poller.join();

    Ok(result?)
}
