#![allow(dead_code)]

use std::{
    fs::{create_dir_all, remove_file},
    path::{Path, PathBuf},
};

use packflow::archive::{ArchiveOptions, ZipArchive};

pub fn create_new_clean_path(file_name: &str) -> PathBuf {
    let dir_prefix = "/tmp/packflow";
    let out_dir = Path::new(dir_prefix);
    if !out_dir.exists() {
        create_dir_all(out_dir).unwrap_or_else(|error| {
            panic!("creating dir {:?} failed, because {:?}", dir_prefix, error);
        })
    }

    let out_path = out_dir.join(file_name);

    if out_path.exists() {
        remove_file(&out_path).unwrap_or_else(|error| {
            panic!("deleting file {:?} failed, because {:?}", &out_path, error);
        });
    }

    out_path
}

/// Same-thread compression so runs are deterministic.
pub fn synchronous_options() -> ArchiveOptions {
    ArchiveOptions::default().worker_threads(0)
}

pub fn create_synchronous_archive(path: &Path) -> ZipArchive {
    ZipArchive::create_with_options(path, synchronous_options()).unwrap_or_else(|error| {
        panic!("creating archive {:?} failed, because {:?}", path, error);
    })
}
