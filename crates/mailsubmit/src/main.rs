//! `mailsubmit` - submit one message to an SMTP server.
//!
//! Usage: `mailsubmit <job.json> <message-file>`
//!
//! The job file holds the submit options, credentials, sender and
//! recipients. The message file is sent as is, apart from `Bcc:` removal,
//! dot-stuffing and line-ending normalization.

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

use anyhow::{Context, bail};
use mailsubmit_smtp::{Credentials, Envelope, SubmitOptions, submit};
use serde::Deserialize;
use std::io::Cursor;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Contents of the job file.
#[derive(Debug, Deserialize)]
struct Job {
    #[serde(default)]
    options: SubmitOptions,
    #[serde(default)]
    credentials: Credentials,
    sender: String,
    #[serde(default)]
    recipients: Vec<String>,
    /// Recipients kept out of the envelope.
    #[serde(default)]
    excluded: Vec<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mailsubmit=info,mailsubmit_smtp=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut args = std::env::args_os().skip(1).map(PathBuf::from);
    let (Some(job_path), Some(message_path), None) = (args.next(), args.next(), args.next())
    else {
        bail!("usage: mailsubmit <job.json> <message-file>");
    };

    let job: Job = serde_json::from_slice(
        &tokio::fs::read(&job_path)
            .await
            .with_context(|| format!("Failed to read job file {}", job_path.display()))?,
    )
    .with_context(|| format!("Invalid job file {}", job_path.display()))?;

    let message = tokio::fs::read(&message_path)
        .await
        .with_context(|| format!("Failed to read message {}", message_path.display()))?;
    let size = message.len() as u64;

    let mut envelope = Envelope::new(job.sender, Cursor::new(message), size);
    for recipient in job.recipients {
        envelope = envelope.to(recipient.as_str());
    }
    for recipient in job.excluded {
        envelope = envelope.excluded(recipient.as_str());
    }

    info!(url = %job.options.url, recipients = envelope.recipients.len(), "Submitting message");
    let submission = submit(&mut envelope, &job.credentials, &job.options).await;

    if let Some(reply) = &submission.last_reply {
        println!("{reply}");
    }
    match submission.outcome {
        Ok(()) => Ok(ExitCode::SUCCESS),
        Err(e) => {
            eprintln!("mailsubmit: {e}");
            Ok(ExitCode::FAILURE)
        }
    }
}
