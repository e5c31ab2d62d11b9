use std::{
    io,
    path::{Path, PathBuf},
};

use tracing::{debug, warn};

use crate::{DeviceError, RawMidiPort};

/// Where raw MIDI devices and their card metadata live.
#[derive(Debug, Clone)]
pub struct SystemPaths {
    pub dev_dir: PathBuf,
    pub proc_dir: PathBuf,
}

impl Default for SystemPaths {
    fn default() -> Self {
        Self {
            dev_dir: PathBuf::from("/dev/snd"),
            proc_dir: PathBuf::from("/proc/asound"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortInfo {
    /// Card id as reported by the sound subsystem, suffixed with `-<device>`
    /// for every device after the first.
    pub name: String,
    /// `hw:<card>,<device>`
    pub alias: String,
    pub path: PathBuf,
}

impl PortInfo {
    fn matches(&self, identifier: &str) -> bool {
        self.name == identifier || self.alias == identifier
    }
}

fn parse_device_file(file_name: &str) -> Option<(u32, u32)> {
    let rest = file_name.strip_prefix("midiC")?;
    let (card, device) = rest.split_once('D')?;
    Some((card.parse().ok()?, device.parse().ok()?))
}

async fn card_id(proc_dir: &Path, card: u32) -> Option<String> {
    let raw = tokio::fs::read_to_string(proc_dir.join(format!("card{card}")).join("id"))
        .await
        .ok()?;
    let id = raw.trim();
    (!id.is_empty()).then(|| id.to_string())
}

/// Lists raw MIDI outputs, ordered by card then device.
pub async fn discover_ports(paths: &SystemPaths) -> io::Result<Vec<PortInfo>> {
    let mut entries = tokio::fs::read_dir(&paths.dev_dir).await?;
    let mut found = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let file_name = entry.file_name();
        let Some((card, device)) = file_name.to_str().and_then(parse_device_file) else {
            continue;
        };
        let base = card_id(&paths.proc_dir, card)
            .await
            .unwrap_or_else(|| format!("card{card}"));
        let name = if device == 0 {
            base
        } else {
            format!("{base}-{device}")
        };
        found.push((
            card,
            device,
            PortInfo {
                name,
                alias: format!("hw:{card},{device}"),
                path: entry.path(),
            },
        ));
    }
    found.sort_by_key(|(card, device, _)| (*card, *device));
    Ok(found.into_iter().map(|(_, _, info)| info).collect())
}

/// Opens the output named by `identifier`.
///
/// An identifier containing a path separator is opened directly. Anything
/// else must match a discovered port's name or `hw:` alias; there is no
/// fallback to another device when nothing matches.
pub async fn open_port(identifier: &str, paths: &SystemPaths) -> Result<RawMidiPort, DeviceError> {
    if identifier.contains(std::path::MAIN_SEPARATOR) || identifier.contains('/') {
        return RawMidiPort::open(identifier, identifier).await;
    }

    let ports = match discover_ports(paths).await {
        Ok(ports) => ports,
        Err(error) => {
            warn!(dev_dir = %paths.dev_dir.display(), %error, "failed to enumerate midi outputs");
            Vec::new()
        }
    };
    debug!(count = ports.len(), "discovered midi outputs");

    match ports.iter().find(|port| port.matches(identifier)) {
        Some(port) => RawMidiPort::open(identifier, &port.path).await,
        None => Err(DeviceError::NotFound {
            identifier: identifier.to_string(),
            available: ports.into_iter().map(|port| port.name).collect(),
        }),
    }
}

#[cfg(test)]
#[path = "tests/discovery_tests.rs"]
mod tests;
