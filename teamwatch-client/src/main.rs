//! teamwatch entry point.

use std::time::Duration;

use clap::Parser;
use teamwatch_client::cli::CliOptions;
use teamwatch_client::config::ClientConfig;
use teamwatch_client::error::ClientError;
use teamwatch_client::screens::{self, Screen};
use teamwatch_client::{telemetry, App};
use teamwatch_sync::ConnectionStatus;

/// How often the "live updates unavailable" warning repeats.
const ERROR_REMINDER: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> Result<(), ClientError> {
    let options = CliOptions::parse();
    let config = ClientConfig::load(options.config.as_deref())?;
    telemetry::init_tracing(&config.log_filter)?;

    let app = App::new(config)?;
    tracing::info!(
        api = %app.api.base_url(),
        ws = %app.context.push.endpoint,
        view = ?options.view,
        "teamwatch starting"
    );

    let screen = screens::mount(&options.view, &app.context);
    if options.sync {
        if let Err(err) = screens::sync_now(&app.api, screen.as_ref()).await {
            tracing::error!(error = %err, "manual sync failed");
        }
    }

    run(screen.as_ref()).await;
    screen.close().await;
    tracing::info!("teamwatch stopped");
    Ok(())
}

async fn run(screen: &dyn Screen) {
    let mut changes = screen.changes();
    let mut connection = screen.connection();
    let mut reminder = tokio::time::interval(ERROR_REMINDER);
    reminder.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    let mut hangup = hangup_listener();

    loop {
        let in_error = connection.borrow().status.is_terminal();
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                if let Err(err) = result {
                    tracing::error!(error = %err, "failed to listen for Ctrl-C");
                }
                break;
            }
            changed = changes.changed() => {
                if changed.is_err() {
                    break;
                }
                tracing::info!(screen = screen.name(), summary = %screen.summary(), "view updated");
            }
            changed = connection.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = *connection.borrow_and_update();
                match state.status {
                    ConnectionStatus::Error(reason) => tracing::warn!(
                        %reason,
                        "live updates unavailable; data refreshes only on demand"
                    ),
                    status => tracing::info!(%status, attempt = state.attempt, "live updates"),
                }
            }
            () = next_hangup(&mut hangup) => {
                screens::restart_live_updates(screen);
            }
            _ = reminder.tick(), if in_error => {
                tracing::warn!(
                    status = %connection.borrow().status,
                    "live updates still unavailable; send SIGHUP to reconnect"
                );
            }
        }
    }
}

/// SIGHUP restarts the push channel.
#[cfg(unix)]
type Hangup = tokio::signal::unix::Signal;

#[cfg(not(unix))]
type Hangup = std::convert::Infallible;

#[cfg(unix)]
fn hangup_listener() -> Option<Hangup> {
    use tokio::signal::unix::{signal, SignalKind};
    match signal(SignalKind::hangup()) {
        Ok(listener) => Some(listener),
        Err(err) => {
            tracing::warn!(error = %err, "failed to listen for SIGHUP; reconnect disabled");
            None
        }
    }
}

#[cfg(not(unix))]
fn hangup_listener() -> Option<Hangup> {
    None
}

async fn next_hangup(hangup: &mut Option<Hangup>) {
    #[cfg(unix)]
    if let Some(listener) = hangup {
        if listener.recv().await.is_some() {
            return;
        }
        *hangup = None;
    }
    let _ = hangup;
    std::future::pending::<()>().await
}
