//! NPZ container I/O for patch collections.
//!
//! A container holds two arrays: `x`, the u8 pixels of shape (N, H, W, C),
//! and `y`, the labels of N elements (any shape, flattened on read).

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use ndarray::{Array1, Array4, ArrayD};
use ndarray_npy::{NpzReader, NpzWriter};

use crate::dataset::PatchDataset;
use crate::error::{DataError, Result};

/// Read a patch collection from a NumPy `.npz` archive.
///
/// Labels may be stored as `uint8` or `int64`; both are accepted as long as
/// every value is 0 or 1.
pub fn read_patches<P: AsRef<Path>>(path: P) -> Result<PatchDataset> {
    let path = path.as_ref();
    let file = File::open(path)?;
    let mut npz = NpzReader::new(BufReader::new(file))
        .map_err(|e| DataError::FormatError(format!("Failed to read npz file: {}", e)))?;

    let x_name = entry_name(&mut npz, "x")?;
    let y_name = entry_name(&mut npz, "y")?;

    let images: Array4<u8> = npz.by_name(&x_name).map_err(|e| {
        DataError::FormatError(format!("Failed to read 'x' as a 4D uint8 array: {}", e))
    })?;

    let as_u8: std::result::Result<ArrayD<u8>, _> = npz.by_name(&y_name);
    let labels = match as_u8 {
        Ok(y) => y.iter().copied().collect::<Vec<u8>>(),
        Err(_) => {
            let y: ArrayD<i64> = npz
                .by_name(&y_name)
                .map_err(|e| DataError::FormatError(format!("Failed to read 'y': {}", e)))?;
            narrow_labels(y.iter().copied())?
        }
    };

    tracing::debug!(path = %path.display(), samples = labels.len(), "read patch container");
    PatchDataset::from_arrays(images, labels)
}

/// Write a patch collection to a NumPy `.npz` archive.
pub fn write_patches<P: AsRef<Path>>(dataset: &PatchDataset, path: P) -> Result<()> {
    let file = File::create(path.as_ref())?;
    let mut npz = NpzWriter::new(BufWriter::new(file));

    npz.add_array("x.npy", dataset.images())
        .map_err(|e| DataError::FormatError(format!("Failed to write 'x': {}", e)))?;
    npz.add_array("y.npy", &Array1::from(dataset.labels().to_vec()))
        .map_err(|e| DataError::FormatError(format!("Failed to write 'y': {}", e)))?;
    npz.finish()
        .map_err(|e| DataError::FormatError(format!("Failed to finish npz file: {}", e)))?;

    Ok(())
}

/// Archive entry for `key`, with or without the `.npy` suffix.
fn entry_name<R: std::io::Read + std::io::Seek>(npz: &mut NpzReader<R>, key: &str) -> Result<String> {
    let names = npz
        .names()
        .map_err(|e| DataError::FormatError(format!("Failed to list npz entries: {}", e)))?;
    let suffixed = format!("{}.npy", key);
    names
        .into_iter()
        .find(|name| name == key || *name == suffixed)
        .ok_or_else(|| DataError::FormatError(format!("Missing array '{}' in npz file", key)))
}

fn narrow_labels(values: impl Iterator<Item = i64>) -> Result<Vec<u8>> {
    values
        .enumerate()
        .map(|(index, label)| match label {
            0 | 1 => Ok(label as u8),
            _ => Err(DataError::InvalidLabel { index, label }),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    #[test]
    fn test_write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("patches.npz");

        let images = Array4::from_shape_fn((4, 5, 5, 3), |(i, y, x, c)| (i * 50 + y + x + c) as u8);
        let ds = PatchDataset::from_arrays(images, vec![0, 1, 1, 0]).unwrap();
        write_patches(&ds, &path).unwrap();

        let loaded = read_patches(&path).unwrap();
        assert_eq!(loaded.images(), ds.images());
        assert_eq!(loaded.labels(), ds.labels());
    }

    #[test]
    fn test_read_int64_column_labels() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("patches.npz");

        let mut npz = NpzWriter::new(File::create(&path).unwrap());
        npz.add_array("x.npy", &Array4::<u8>::zeros((3, 2, 2, 3))).unwrap();
        npz.add_array("y.npy", &Array2::from_shape_vec((3, 1), vec![1i64, 0, 1]).unwrap())
            .unwrap();
        npz.finish().unwrap();

        let loaded = read_patches(&path).unwrap();
        assert_eq!(loaded.labels(), &[1, 0, 1]);
    }

    #[test]
    fn test_read_rejects_non_binary_labels() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("patches.npz");

        let mut npz = NpzWriter::new(File::create(&path).unwrap());
        npz.add_array("x.npy", &Array4::<u8>::zeros((2, 2, 2, 3))).unwrap();
        npz.add_array("y.npy", &Array1::from(vec![0i64, 3])).unwrap();
        npz.finish().unwrap();

        let err = read_patches(&path).unwrap_err();
        assert!(matches!(err, DataError::InvalidLabel { index: 1, label: 3 }));
    }

    #[test]
    fn test_read_missing_key() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("patches.npz");

        let mut npz = NpzWriter::new(File::create(&path).unwrap());
        npz.add_array("x.npy", &Array4::<u8>::zeros((2, 2, 2, 3))).unwrap();
        npz.finish().unwrap();

        assert!(matches!(read_patches(&path), Err(DataError::FormatError(_))));
    }
}
