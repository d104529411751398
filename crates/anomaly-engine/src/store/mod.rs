//! Zarr V3 persistence for climatologies and anomaly fields.
//!
//! Each store is a directory holding one float32 array per canonical
//! variable, NaN-filled and optionally Blosc-compressed. Everything needed to
//! rebuild the in-memory type (coordinates, day-of-year keys, valid time)
//! lives in the array attributes.

mod anomaly;
mod climatology;

pub use anomaly::{AnomalyStore, StoredAnomalies};
pub use climatology::ClimatologyStore;

use std::path::Path;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use zarrs::array::codec::bytes_to_bytes::blosc::{
    BloscCodec, BloscCompressionLevel, BloscCompressor, BloscShuffleMode,
};
use zarrs::array::codec::BytesToBytesCodecTraits;
use zarrs::array::{Array, ArrayBuilder, ChunkGrid, DataType, FillValue};
use zarrs::array_subset::ArraySubset;
use zarrs_filesystem::FilesystemStore;

use crate::config::{EngineConfig, ZarrCompression};
use crate::error::{EngineError, Result};

/// Chunking and compression settings shared by the stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreOptions {
    /// Spatial chunk edge, clamped to the grid size.
    pub chunk_size: usize,
    pub compression: ZarrCompression,
    /// Compression level (1-9).
    pub compression_level: u8,
    pub shuffle: bool,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self::from(&EngineConfig::default())
    }
}

impl From<&EngineConfig> for StoreOptions {
    fn from(config: &EngineConfig) -> Self {
        Self {
            chunk_size: config.zarr_chunk_size,
            compression: config.zarr_compression,
            compression_level: config.zarr_compression_level,
            shuffle: config.zarr_shuffle,
        }
    }
}

impl StoreOptions {
    /// Create the compression codec, or `None` when compression is off.
    fn compression_codec(&self) -> Result<Option<Arc<dyn BytesToBytesCodecTraits>>> {
        let compressor = match self.compression {
            ZarrCompression::None => return Ok(None),
            ZarrCompression::BloscLz4 => BloscCompressor::LZ4,
            ZarrCompression::BloscZstd => BloscCompressor::Zstd,
        };

        let level = BloscCompressionLevel::try_from(self.compression_level)
            .map_err(|_| EngineError::Config("invalid compression level".to_string()))?;

        let shuffle = if self.shuffle {
            BloscShuffleMode::Shuffle
        } else {
            BloscShuffleMode::NoShuffle
        };

        // typesize is required when shuffle is enabled
        let typesize = if self.shuffle { Some(4) } else { None };

        let codec = BloscCodec::new(compressor, level, None, shuffle, typesize)
            .map_err(|e| EngineError::Config(e.to_string()))?;
        Ok(Some(Arc::new(codec)))
    }

    fn spatial_chunks(&self, nlat: usize, nlon: usize) -> (u64, u64) {
        let edge = self.chunk_size.max(1);
        (edge.min(nlat).max(1) as u64, edge.min(nlon).max(1) as u64)
    }
}

/// Open (creating if needed) a filesystem store rooted at `path`.
fn open_store(path: &Path, create: bool) -> Result<Arc<FilesystemStore>> {
    if create {
        std::fs::create_dir_all(path)?;
    } else if !path.is_dir() {
        return Err(EngineError::storage(format!(
            "no store at {}",
            path.display()
        )));
    }
    let store = FilesystemStore::new(path).map_err(|e| EngineError::storage(e.to_string()))?;
    Ok(Arc::new(store))
}

/// Create a float32 array, store its metadata and return it for writing.
fn create_array<A: Serialize>(
    store: Arc<FilesystemStore>,
    path: &str,
    shape: Vec<u64>,
    chunk_shape: Vec<u64>,
    attributes: &A,
    options: &StoreOptions,
) -> Result<Array<FilesystemStore>> {
    let chunk_grid: ChunkGrid = chunk_shape
        .try_into()
        .map_err(|e| EngineError::Config(format!("{:?}", e)))?;

    let mut builder = ArrayBuilder::new(
        shape,
        DataType::Float32,
        chunk_grid,
        FillValue::from(f32::NAN),
    );
    builder.attributes(to_attributes(attributes)?);
    if let Some(codec) = options.compression_codec()? {
        builder.bytes_to_bytes_codecs(vec![codec]);
    }

    let array = builder
        .build(store, path)
        .map_err(|e| EngineError::storage(e.to_string()))?;
    array
        .store_metadata()
        .map_err(|e| EngineError::storage(e.to_string()))?;
    Ok(array)
}

fn write_subset(
    array: &Array<FilesystemStore>,
    start: Vec<u64>,
    shape: Vec<u64>,
    data: &[f32],
) -> Result<()> {
    let subset = ArraySubset::new_with_start_shape(start, shape)
        .map_err(|e| EngineError::storage(e.to_string()))?;
    array
        .store_array_subset_elements(&subset, data)
        .map_err(|e| EngineError::storage(e.to_string()))
}

fn read_subset(
    array: &Array<FilesystemStore>,
    start: Vec<u64>,
    shape: Vec<u64>,
) -> Result<Vec<f32>> {
    let subset = ArraySubset::new_with_start_shape(start, shape)
        .map_err(|e| EngineError::storage(e.to_string()))?;
    array
        .retrieve_array_subset_elements::<f32>(&subset)
        .map_err(|e| EngineError::storage(e.to_string()))
}

fn open_array(store: Arc<FilesystemStore>, path: &str) -> Result<Array<FilesystemStore>> {
    Array::open(store, path).map_err(|e| EngineError::storage(format!("{}: {}", path, e)))
}

fn to_attributes<A: Serialize>(
    attributes: &A,
) -> Result<serde_json::Map<String, serde_json::Value>> {
    match serde_json::to_value(attributes)? {
        serde_json::Value::Object(map) => Ok(map),
        other => Err(EngineError::invalid_metadata(format!(
            "attributes must be an object, got {}",
            other
        ))),
    }
}

fn from_attributes<A: DeserializeOwned>(array: &Array<FilesystemStore>) -> Result<A> {
    serde_json::from_value(serde_json::Value::Object(array.attributes().clone()))
        .map_err(|e| EngineError::invalid_metadata(e.to_string()))
}

fn check_shape(array: &Array<FilesystemStore>, path: &str, expected: &[u64]) -> Result<()> {
    if array.shape() != expected {
        return Err(EngineError::invalid_metadata(format!(
            "{} has shape {:?}, attributes imply {:?}",
            path,
            array.shape(),
            expected
        )));
    }
    Ok(())
}
