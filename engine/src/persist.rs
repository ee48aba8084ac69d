use crate::error::EngineError;
use crate::generation::Generation;
use serde::{Deserialize, Serialize};
use std::fs::{create_dir_all, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

pub const SNAPSHOT_VERSION: u32 = 1;

/// Human-readable sidecar describing a snapshot.
#[derive(Debug, Serialize, Deserialize)]
pub struct MetaFile {
    pub generation: u64,
    pub num_docs: u32,
    pub created_at: String,
    pub version: u32,
}

pub struct IndexPaths {
    pub root: PathBuf,
}

impl IndexPaths {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    fn generation(&self) -> PathBuf {
        self.root.join("generation.bin")
    }

    fn meta(&self) -> PathBuf {
        self.root.join("meta.json")
    }
}

/// Write a generation snapshot plus its meta file.
pub fn save_generation(
    paths: &IndexPaths,
    generation: &Generation,
    created_at: &str,
) -> Result<(), EngineError> {
    create_dir_all(&paths.root)?;
    let file = BufWriter::new(File::create(paths.generation())?);
    bincode::serialize_into(file, generation)?;

    let meta = MetaFile {
        generation: generation.id,
        num_docs: generation.len() as u32,
        created_at: created_at.to_string(),
        version: SNAPSHOT_VERSION,
    };
    serde_json::to_writer_pretty(File::create(paths.meta())?, &meta)?;
    Ok(())
}

pub fn load_generation(paths: &IndexPaths) -> Result<Generation, EngineError> {
    let file = BufReader::new(File::open(paths.generation())?);
    Ok(bincode::deserialize_from(file)?)
}

pub fn load_meta(paths: &IndexPaths) -> Result<MetaFile, EngineError> {
    let file = BufReader::new(File::open(paths.meta())?);
    Ok(serde_json::from_reader(file)?)
}
