use bincode::{deserialize_from, serialize_into};
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use crate::store::Store;

pub const SNAPSHOT_FILE: &str = "store.bin.gz";

/// Write the store as gzip-compressed bincode
///
/// The snapshot goes to a sibling temp file first and is renamed into place,
/// so a crash mid-write leaves the previous snapshot intact.
pub fn save_store(store: &Store, path: impl AsRef<Path>) -> std::io::Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("tmp");

    let file = File::create(&tmp)?;
    let encoder = GzEncoder::new(file, Compression::default());
    let mut writer = std::io::BufWriter::new(encoder);

    serialize_into(&mut writer, store)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;

    let encoder = writer.into_inner().map_err(|e| e.into_error())?;
    encoder.finish()?.flush()?;

    fs::rename(&tmp, path)
}

pub fn load_store(path: impl AsRef<Path>) -> std::io::Result<Store> {
    let file = File::open(path)?;
    let decoder = GzDecoder::new(file);
    let mut reader = std::io::BufReader::new(decoder);

    let store: Store = deserialize_from(&mut reader)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;

    Ok(store)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tempfile::tempdir;

    #[test]
    fn snapshot_survives_reload() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join(SNAPSHOT_FILE);
        let mut store = Store::seeded(Utc::now());
        store.add_unit("Roll");
        store.adjust_stock("i3", -10).unwrap();

        save_store(&store, &path).unwrap();
        let loaded = load_store(&path).unwrap();

        assert_eq!(loaded.items(), store.items());
        assert_eq!(loaded.gate_passes(), store.gate_passes());
        assert!(loaded.units().contains("Roll"));
        assert_eq!(loaded.item("i3").unwrap().stock, 40);
        assert!(!path.with_extension("tmp").exists());
    }

    #[test]
    fn garbage_is_invalid_data() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(SNAPSHOT_FILE);
        std::fs::write(&path, b"not gzip").unwrap();
        assert!(load_store(&path).is_err());
    }
}
