//! Command line interface.

use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};
use domain::models::{Participant, Registration};
use domain::ports::QrRenderer;
use domain::services::{Feedback, ScannerSession, CAMERA_UNAVAILABLE_MESSAGE};

use crate::app::App;
use crate::error::AppError;
use crate::jobs::{JobScheduler, ReconcileJob};
use crate::services::{FrameSource, LineCamera, SymbolFormat};

/// Club Portal event registration and check-in
#[derive(Debug, Parser)]
#[command(name = "club-portal", version)]
#[command(about = "Event registration, QR codes and attendance check-in", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Svg,
}

impl From<OutputFormat> for SymbolFormat {
    fn from(format: OutputFormat) -> Self {
        match format {
            OutputFormat::Text => SymbolFormat::Text,
            OutputFormat::Svg => SymbolFormat::Svg,
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Register a participant for an event and print their QR code
    Register {
        #[arg(long)]
        event: i64,
        /// Participant ID
        #[arg(long)]
        id: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        /// Skip printing the QR code
        #[arg(long)]
        no_qr: bool,
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
    /// Print the QR code of an existing registration
    Qr {
        registration_id: String,
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
        /// Write the symbol to a file instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Check participants in from scanned frames, one payload per line
    Scan {
        #[arg(long)]
        event: i64,
        /// Frame file; stdin when omitted
        #[arg(long)]
        frames: Option<PathBuf>,
        /// Keep scanning after a participant is admitted
        #[arg(long)]
        continuous: bool,
    },
    /// Check in a single scanned payload
    Checkin {
        #[arg(long)]
        event: i64,
        payload: String,
    },
    /// List registrations
    List {
        #[arg(long)]
        event: Option<i64>,
        #[arg(long)]
        participant: Option<String>,
        #[arg(long)]
        json: bool,
    },
    /// Export an event's attendance, one JSON row per line
    Export {
        #[arg(long)]
        event: i64,
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Set attendance manually for one registration or a whole event
    Attend {
        #[arg(required_unless_present = "event", conflicts_with = "event")]
        registration_id: Option<String>,
        /// Apply to every registration of this event
        #[arg(long)]
        event: Option<i64>,
        /// Mark absent instead of present
        #[arg(long)]
        absent: bool,
    },
    /// Deliver queued remote calls and merge the backend's registrations
    Sync {
        #[arg(long)]
        no_refresh: bool,
    },
    /// List the backend's events
    Events,
    /// Clear local registrations and the sync queue
    Reset {
        #[arg(long)]
        yes: bool,
    },
    /// Retry queued remote calls periodically until interrupted
    Watch,
}

fn write_registration(out: &mut impl Write, r: &Registration) -> Result<(), AppError> {
    let status = match r.scan_timestamp {
        Some(at) => format!("attended {}", shared::time::display(at)),
        None => "not attended".to_string(),
    };
    writeln!(
        out,
        "{}  event {}  {} <{}>  {}",
        r.registration_id, r.event_id, r.participant_name, r.participant_email, status
    )?;
    Ok(())
}

fn render_symbol(app: &App, payload: &str, format: OutputFormat) -> Result<String, AppError> {
    let renderer = app.renderer(format.into());
    Ok(renderer.render(payload, &app.config.qr.render_options())?)
}

/// Runs one command, writing user-facing output to `out`.
pub async fn execute(app: &App, command: Command, out: &mut impl Write) -> Result<(), AppError> {
    match command {
        Command::Register {
            event,
            id,
            name,
            email,
            no_qr,
            format,
        } => {
            let participant = Participant::new(id, name, email);
            let registration = app.store.register(event, &participant).await?;
            write_registration(out, &registration)?;
            if !no_qr {
                let payload = app.store.codec().encode_registration(&registration);
                writeln!(out, "{}", render_symbol(app, &payload, format)?)?;
            }
        }
        Command::Qr {
            registration_id,
            format,
            output,
        } => {
            let registration = app
                .store
                .get(&registration_id)
                .ok_or_else(|| AppError::NotFound(registration_id.clone()))?;
            let payload = app.store.codec().encode_registration(&registration);
            let symbol = render_symbol(app, &payload, format)?;
            match output {
                Some(path) => {
                    std::fs::write(&path, symbol)?;
                    writeln!(out, "Wrote {}", path.display())?;
                }
                None => writeln!(out, "{}", symbol)?,
            }
        }
        Command::Scan {
            event,
            frames,
            continuous,
        } => scan(app, event, frames, continuous, out).await?,
        Command::Checkin { event, payload } => {
            match app.marker.check_in_and_sync(&payload, event).await {
                Ok(registration) => writeln!(
                    out,
                    "Checked in {} ({})",
                    registration.participant_name, registration.registration_id
                )?,
                Err(rejection) => writeln!(out, "{}", rejection)?,
            }
        }
        Command::List {
            event,
            participant,
            json,
        } => {
            let registrations: Vec<Registration> = match (event, participant.as_deref()) {
                (Some(event), Some(pid)) => app
                    .store
                    .list_by_event(event)
                    .into_iter()
                    .filter(|r| r.participant_id == pid)
                    .collect(),
                (Some(event), None) => app.store.list_by_event(event),
                (None, Some(pid)) => app.store.list_by_participant(pid),
                (None, None) => app.store.all(),
            };
            if json {
                writeln!(out, "{}", serde_json::to_string_pretty(&registrations)?)?;
            } else {
                for registration in &registrations {
                    write_registration(out, registration)?;
                }
                if let Some(event) = event {
                    let stats = app.store.stats(event);
                    writeln!(
                        out,
                        "{} registered, {} present, {} absent ({}%)",
                        stats.total, stats.present, stats.absent, stats.percentage
                    )?;
                }
            }
        }
        Command::Export { event, output } => {
            let mut lines = String::new();
            for row in app.store.attendance_rows(event) {
                lines.push_str(&serde_json::to_string(&row)?);
                lines.push('\n');
            }
            match output {
                Some(path) => {
                    std::fs::write(&path, lines)?;
                    writeln!(out, "Wrote {}", path.display())?;
                }
                None => write!(out, "{}", lines)?,
            }
        }
        Command::Attend {
            registration_id,
            event,
            absent,
        } => {
            let attended = !absent;
            match (registration_id, event) {
                (Some(id), _) => {
                    let registration = app.store.set_attendance(&id, attended)?;
                    write_registration(out, &registration)?;
                }
                (None, Some(event)) => {
                    let changed = app.store.mark_all(event, attended)?;
                    writeln!(out, "Updated {} registrations for event {}", changed, event)?;
                }
                (None, None) => {}
            }
            app.store.reconcile().await;
        }
        Command::Sync { no_refresh } => {
            let report = app.store.reconcile().await;
            writeln!(
                out,
                "Delivered {} queued calls, {} still pending",
                report.synced, report.failed
            )?;
            if !no_refresh {
                match app.store.refresh_from_remote().await {
                    Ok(refresh) => writeln!(
                        out,
                        "Merged remote registrations: {} added, {} updated, {} skipped",
                        refresh.added, refresh.updated, refresh.skipped
                    )?,
                    Err(e) => {
                        tracing::warn!(error = %e, "Remote refresh failed");
                        writeln!(out, "Remote refresh failed: {}", e)?;
                    }
                }
            }
        }
        Command::Events => {
            for event in app.store.events().await? {
                writeln!(
                    out,
                    "{}  {}  {}  {}",
                    event.id,
                    event.title,
                    event.date.as_deref().unwrap_or("-"),
                    event.location.as_deref().unwrap_or("-")
                )?;
            }
        }
        Command::Reset { yes } => {
            if !yes {
                writeln!(out, "Refusing to clear local data without --yes")?;
                return Ok(());
            }
            app.store.reset_session()?;
            writeln!(out, "Local registrations cleared")?;
        }
        Command::Watch => {
            let report = app.store.reconcile().await;
            writeln!(out, "Delivered {} queued calls, {} still pending", report.synced, report.failed)?;

            let mut scheduler = JobScheduler::new();
            scheduler.register(ReconcileJob::new(
                app.store.clone(),
                app.config.reconcile.interval_secs,
            ));
            scheduler.start();
            tokio::signal::ctrl_c().await?;
            scheduler.shutdown();
            scheduler.wait_for_shutdown(Duration::from_secs(5)).await;
        }
    }
    Ok(())
}

async fn scan(
    app: &App,
    event: i64,
    frames: Option<PathBuf>,
    continuous: bool,
    out: &mut impl Write,
) -> Result<(), AppError> {
    let source = frames.map_or(FrameSource::Stdin, FrameSource::File);
    let mut session = ScannerSession::new(LineCamera::new(source), app.marker.clone(), event);
    if let Err(e) = session.start() {
        writeln!(out, "{}", CAMERA_UNAVAILABLE_MESSAGE)?;
        return Err(e.into());
    }

    let mut scheduler = app.scheduler();
    scheduler.start();

    let mut admitted = 0usize;
    let mut deliveries = Vec::new();
    while let Some(feedback) = session.next_frame() {
        if let Some(message) = feedback.message() {
            writeln!(out, "{}", message)?;
        }
        if let Feedback::Accepted(_) = feedback {
            admitted += 1;
            // Delivered in the background so the next frame is read at once.
            let store = app.store.clone();
            deliveries.push(tokio::spawn(async move { store.reconcile().await }));
            if !continuous {
                break;
            }
            session.scan_another()?;
        }
    }
    session.stop();

    scheduler.shutdown();
    scheduler.wait_for_shutdown(Duration::from_secs(5)).await;
    for delivery in deliveries {
        if let Err(e) = delivery.await {
            tracing::warn!(error = %e, "Background delivery task failed");
        }
    }
    app.store.reconcile().await;

    let stats = app.store.stats(event);
    writeln!(
        out,
        "Admitted {} this session; {}/{} present ({}%)",
        admitted, stats.present, stats.total, stats.percentage
    )?;
    Ok(())
}
