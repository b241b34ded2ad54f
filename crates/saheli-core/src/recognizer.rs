//! External speech recognizer process.
//!
//! The configured command is spawned per listening session. It prints one JSON
//! [`RecognitionEvent`] per line on stdout; process exit counts as `End`.

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc::UnboundedSender;
use std::process::Stdio;

use crate::error::{Result, SaheliError};
use crate::speech_input::RecognitionEvent;

pub const LANGUAGE_ENV: &str = "SAHELI_SPEECH_LANGUAGE";

pub struct RecognizerProcess {
    child: Child,
}

impl RecognizerProcess {
    /// Spawn the recognizer and forward its events until it exits.
    pub fn spawn(
        argv: &[String],
        language: &str,
        events: UnboundedSender<RecognitionEvent>,
    ) -> Result<Self> {
        let (program, args) = argv
            .split_first()
            .ok_or_else(|| SaheliError::Recognition("recognizer command is empty".to_string()))?;

        let mut child = Command::new(program)
            .args(args)
            .env(LANGUAGE_ENV, language)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| SaheliError::Recognition(format!("failed to start {}: {}", program, e)))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| SaheliError::Recognition("recognizer stdout not captured".to_string()))?;

        tracing::info!("Started speech recognizer: {}", program);

        tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            let mut ended = false;
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        if line.trim().is_empty() {
                            continue;
                        }
                        let Some(event) = RecognitionEvent::parse(&line) else {
                            tracing::debug!("Ignoring recognizer output: {}", line);
                            continue;
                        };
                        ended = matches!(event, RecognitionEvent::End | RecognitionEvent::Error { .. });
                        if events.send(event).is_err() || ended {
                            break;
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        let _ = events.send(RecognitionEvent::Error { error: e.to_string() });
                        ended = true;
                        break;
                    }
                }
            }
            if !ended {
                let _ = events.send(RecognitionEvent::End);
            }
        });

        Ok(Self { child })
    }

    pub async fn stop(mut self) {
        if let Err(e) = self.child.kill().await {
            tracing::debug!("Recognizer already exited: {}", e);
        }
    }
}
