use anyhow::Result;
use tokio::sync::mpsc;

use crate::app::App;
use crate::render::terminal::{paint, Color};

/// Exit status asking a supervisor to restart on the new deployment
pub const EXIT_DEPLOY_DRIFT: i32 = 3;

/// Poll until interrupted. Returns the process exit status.
pub async fn run(app: &App, use_color: bool) -> Result<i32> {
    let manager = &app.manager;
    let (drift_tx, mut drift_rx) = mpsc::unbounded_channel();

    manager.on_deploy_drift(move |drift| {
        let _ = drift_tx.send(drift.clone());
    });
    let (_, snapshot) = manager.subscribe(move |chapters| {
        let photos: usize = chapters.iter().map(|c| c.photos.len()).sum();
        println!(
            "{} archive updated: {} chapters, {} photos",
            paint(&chrono::Local::now().format("%H:%M:%S").to_string(), Color::DIM, use_color),
            chapters.len(),
            photos
        );
    });

    println!(
        "Watching {}/{}@{} every {}s ({} chapters loaded). Ctrl-C to stop.",
        app.remote.owner,
        app.remote.repo,
        app.remote.branch,
        manager.config().poll_interval.as_secs(),
        snapshot.len()
    );
    manager.start_polling();

    let code = tokio::select! {
        _ = tokio::signal::ctrl_c() => 0,
        Some(drift) = drift_rx.recv() => {
            println!(
                "{} deployed code changed at {}, restart required",
                paint("!", Color::YELLOW, use_color),
                drift.head
            );
            EXIT_DEPLOY_DRIFT
        }
    };

    manager.stop_polling();
    Ok(code)
}
