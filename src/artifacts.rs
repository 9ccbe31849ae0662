//! Versioned MessagePack persistence for the fitted model and encoders.
//!
//! Every artifact is written as an envelope `{format_version, kind,
//! crate_version, payload}`. The header is decoded and checked before the
//! payload, so a stale or foreign file fails with a clear reason instead of
//! a field-level decode error.

use std::fs;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use log::{debug, info};
use rmp_serde::encode::write_named;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use crate::boost::GradientBoostingClassifier;
use crate::encoder::EncoderSet;
use crate::error::{Error, Result};

/// Bumped whenever the layout of a payload changes.
pub const FORMAT_VERSION: u32 = 1;

pub const MODEL_KIND: &str = "insurance-model";
pub const ENCODERS_KIND: &str = "label-encoders";

#[derive(Serialize, Deserialize)]
struct Envelope<T> {
    format_version: u32,
    kind: String,
    crate_version: String,
    payload: T,
}

#[derive(Deserialize)]
struct Header {
    format_version: u32,
    kind: String,
    crate_version: String,
}

/// A fully written artifact waiting in a temp file next to its destination.
struct Staged {
    file: NamedTempFile,
    path: PathBuf,
    kind: &'static str,
}

impl Staged {
    /// Renames the temp file over the destination.
    fn commit(self) -> Result<()> {
        self.file.persist(&self.path).map_err(io::Error::from)?;
        info!("saved {} to {}", self.kind, self.path.display());
        Ok(())
    }
}

fn stage<T: Serialize>(path: &Path, kind: &'static str, payload: &T) -> Result<Staged> {
    if path.is_dir() {
        return Err(Error::Io(io::Error::new(
            io::ErrorKind::IsADirectory,
            format!("artifact path {} is a directory", path.display()),
        )));
    }
    let parent = match path.parent().filter(|p| !p.as_os_str().is_empty()) {
        Some(parent) => {
            fs::create_dir_all(parent)?;
            parent
        }
        None => Path::new("."),
    };
    let envelope = Envelope {
        format_version: FORMAT_VERSION,
        kind: kind.to_string(),
        crate_version: env!("CARGO_PKG_VERSION").to_string(),
        payload,
    };
    let mut file = NamedTempFile::new_in(parent)?;
    {
        let mut writer = BufWriter::new(file.as_file_mut());
        write_named(&mut writer, &envelope)?;
        writer.flush()?;
    }
    file.as_file().sync_all()?;
    debug!("staged {kind} at {}", file.path().display());
    Ok(Staged {
        file,
        path: path.to_path_buf(),
        kind,
    })
}

fn load<T: DeserializeOwned>(path: &Path, kind: &str) -> Result<T> {
    let bytes = fs::read(path).map_err(|e| Error::artifact_load(path, e))?;

    let header: Header = rmp_serde::from_slice(&bytes).map_err(|e| Error::artifact_load(path, e))?;
    if header.kind != kind {
        return Err(Error::artifact_load(
            path,
            format!("expected a '{kind}' artifact, found '{}'", header.kind),
        ));
    }
    if header.format_version != FORMAT_VERSION {
        return Err(Error::artifact_load(
            path,
            format!(
                "format version {} (written by {}) is not supported, expected {FORMAT_VERSION}",
                header.format_version, header.crate_version
            ),
        ));
    }

    let envelope: Envelope<T> = rmp_serde::from_slice(&bytes).map_err(|e| Error::artifact_load(path, e))?;
    debug!("loaded {kind} from {} (written by {})", path.display(), envelope.crate_version);
    Ok(envelope.payload)
}

pub fn save_model(path: &Path, model: &GradientBoostingClassifier) -> Result<()> {
    stage(path, MODEL_KIND, model)?.commit()
}

pub fn load_model(path: &Path) -> Result<GradientBoostingClassifier> {
    load(path, MODEL_KIND)
}

pub fn save_encoders(path: &Path, encoders: &EncoderSet) -> Result<()> {
    stage(path, ENCODERS_KIND, encoders)?.commit()
}

/// Saves a model together with the encoders it was trained with.
///
/// Both artifacts are written to temp files first. Nothing at either
/// destination changes unless both writes succeed.
pub fn save_trained(
    model_path: &Path,
    model: &GradientBoostingClassifier,
    encoders_path: &Path,
    encoders: &EncoderSet,
) -> Result<()> {
    let model = stage(model_path, MODEL_KIND, model)?;
    let encoders = stage(encoders_path, ENCODERS_KIND, encoders)?;
    model.commit()?;
    encoders.commit()
}

pub fn load_encoders(path: &Path) -> Result<EncoderSet> {
    load(path, ENCODERS_KIND)
}
