use super::cache::HashCache;
use dashmap::DashMap;
use rayon::prelude::*;
use std::fs::File;
use std::hash::Hasher as _;
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};
use twox_hash::XxHash64;

const PARTIAL_HASH_LENGTH: usize = 1024; // 1KB
const READ_BUFFER_SIZE: usize = 64 * 1024;

/// Two-tier hashing strategy:
/// 1. Partial hash (first 1KB via XxHash64) to quickly eliminate non-matches
/// 2. Full content hash only on partial-hash collisions
///
/// Takes a map keyed on file size (each value is a Vec of paths with that size)
/// and returns a map of content_hash → Vec<PathBuf> for confirmed duplicates only.
/// Files that cannot be read are logged and left out.
pub fn build_content_hash_map(
    size_to_file_map: DashMap<u64, Vec<PathBuf>>,
    cache: &HashCache,
) -> DashMap<u64, Vec<PathBuf>> {
    let confirmed_duplicates: DashMap<u64, Vec<PathBuf>> = DashMap::new();

    let size_to_file_vec: Vec<_> = size_to_file_map
        .into_iter()
        .filter(|(_, files)| files.len() > 1)
        .collect();

    size_to_file_vec.par_iter().for_each(|(_, files)| {
        let partial_hash_to_file_map: DashMap<u64, Vec<PathBuf>> = DashMap::new();
        let full_hash_to_file_map: DashMap<u64, Vec<PathBuf>> = DashMap::new();

        files
            .par_iter()
            .for_each(|file| populate_partial_hash_map(file, &partial_hash_to_file_map));

        partial_hash_to_file_map
            .iter()
            .filter(|entry| entry.value().len() > 1)
            .flat_map(|entry| entry.value().clone())
            .collect::<Vec<_>>()
            .par_iter()
            .for_each(|file| populate_full_hash_map(file, cache, &full_hash_to_file_map));

        for (hash, paths) in full_hash_to_file_map.into_iter() {
            if paths.len() > 1 {
                confirmed_duplicates.entry(hash).or_default().extend(paths);
            }
        }
    });

    confirmed_duplicates
}

fn populate_partial_hash_map(file: &Path, partial_hash_to_file_map: &DashMap<u64, Vec<PathBuf>>) {
    match read_portion(file) {
        Ok(data) => {
            partial_hash_to_file_map
                .entry(hash_data(&data))
                .or_default()
                .push(file.to_path_buf());
        }
        Err(e) => tracing::error!("Error processing file '{}': {}", file.display(), e),
    }
}

fn populate_full_hash_map(
    file: &Path,
    cache: &HashCache,
    full_hash_to_file_map: &DashMap<u64, Vec<PathBuf>>,
) {
    match cache.get_content_hash(file) {
        Ok(hash) => {
            full_hash_to_file_map
                .entry(hash)
                .or_default()
                .push(file.to_path_buf());
        }
        Err(e) => tracing::error!("Error processing file '{}': {}", file.display(), e),
    }
}

fn read_portion(file: &Path) -> io::Result<Vec<u8>> {
    let mut f = File::open(file)?;
    let mut buffer = vec![0; PARTIAL_HASH_LENGTH];
    let bytes_read = f.read(&mut buffer)?;
    buffer.truncate(bytes_read);
    Ok(buffer)
}

/// XxHash64 of the whole file, read in fixed-size chunks.
pub fn hash_file(file: &Path) -> io::Result<u64> {
    let mut reader = BufReader::with_capacity(READ_BUFFER_SIZE, File::open(file)?);
    let mut hasher = XxHash64::with_seed(0);
    let mut buffer = vec![0u8; READ_BUFFER_SIZE];
    loop {
        let n = reader.read(&mut buffer)?;
        if n == 0 {
            break;
        }
        hasher.write(&buffer[..n]);
    }
    Ok(hasher.finish())
}

pub fn hash_data(data: &[u8]) -> u64 {
    let mut hasher = XxHash64::with_seed(0);
    hasher.write(data);
    hasher.finish()
}
