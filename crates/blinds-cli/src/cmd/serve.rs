use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use blinds_core::button::ButtonPoller;
use blinds_core::clock::{Clock, SystemClock};
use blinds_core::config::Config;
use blinds_core::controller::Controller;
use blinds_server::auth::BasicAuth;
use blinds_server::state::AppState;

use crate::ServeArgs;

/// Restore from the snapshot, then run the scheduler loop and the button
/// poller on their own threads while the API serves on the main runtime.
/// Ctrl-C stops all three.
pub fn run(config: Config, opts: &ServeArgs) -> Result<()> {
    let driver = super::pin_driver();
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let mut controller = Controller::load(driver.clone(), config, clock)?;
    let handle = controller.handle();
    let status = handle.status();
    tracing::info!(
        "Starting at {} ms, snapshot {}",
        status.position_ms,
        status.config.save_path.display()
    );

    let shutdown = Arc::new(AtomicBool::new(false));

    let poll_period = Duration::from_millis(opts.poll_period_ms);
    let stop = shutdown.clone();
    let scheduler = std::thread::Builder::new()
        .name("scheduler".into())
        .spawn(move || controller.run_forever(poll_period, &stop))?;

    let button = if opts.no_button {
        None
    } else {
        Some(ButtonPoller::new(driver.clone(), handle.clone()).spawn(shutdown.clone())?)
    };

    let state = AppState::with_driver(handle, driver);
    let auth = BasicAuth::from_parts(opts.username.clone(), opts.password.clone());
    let port = opts.port;

    let rt = tokio::runtime::Runtime::new()?;
    let result = rt.block_on(async move {
        let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}")).await?;
        let actual_port = listener.local_addr()?.port();
        println!("Blinds API → http://localhost:{actual_port}");

        blinds_server::serve_on(state, auth, listener, async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
    });

    shutdown.store(true, Ordering::Relaxed);
    scheduler
        .join()
        .map_err(|_| anyhow!("scheduler thread panicked"))?;
    if let Some(button) = button {
        button
            .join()
            .map_err(|_| anyhow!("button thread panicked"))?;
    }
    result
}
