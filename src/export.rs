// Lap exports as JSON lines
//
// An export is a session header line followed by one line per lap. Several
// exports may be concatenated into one file; each header starts a new session.

use std::path::Path;

use log::info;
use serde::{Deserialize, Serialize};

use crate::{
    PaddockError,
    api::{Lap, Session},
};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub enum ExportLine {
    SessionHeader(Box<Session>),
    Lap(Box<Lap>),
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ExportedSession {
    /// `None` for laps that precede any header
    pub session: Option<Session>,
    pub laps: Vec<Lap>,
}

pub fn write_laps_jsonl(
    file: &Path,
    session: Option<&Session>,
    laps: &[Lap],
) -> Result<(), PaddockError> {
    let header = session
        .cloned()
        .map(|session| ExportLine::SessionHeader(Box::new(session)));
    let lines = header
        .into_iter()
        .chain(laps.iter().cloned().map(|lap| ExportLine::Lap(Box::new(lap))));

    serde_jsonlines::write_json_lines(file, lines)
        .map_err(|e| PaddockError::ExportWriteError { source: e })?;
    info!("Exported {} laps to {}", laps.len(), file.display());
    Ok(())
}

pub fn load_laps_jsonl(source_file: &Path) -> Result<Vec<ExportedSession>, PaddockError> {
    let lines = serde_jsonlines::json_lines(source_file)
        .map_err(|e| PaddockError::ExportLoadError { source: e })?
        .collect::<Result<Vec<ExportLine>, std::io::Error>>()
        .map_err(|e| PaddockError::ExportLoadError { source: e })?;

    let mut sessions = Vec::new();
    let mut current = ExportedSession::default();
    for line in lines {
        match line {
            ExportLine::SessionHeader(session) => {
                // a header after laps or after another header starts a new session
                if current.session.is_some() || !current.laps.is_empty() {
                    sessions.push(std::mem::take(&mut current));
                }
                current.session = Some(*session);
            }
            ExportLine::Lap(lap) => current.laps.push(*lap),
        }
    }
    if current.session.is_some() || !current.laps.is_empty() {
        sessions.push(current);
    }
    Ok(sessions)
}
