#[macro_use]
extern crate matches;
extern crate flate2;
extern crate paf_io;
extern crate tempfile;

use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use flate2::write::GzEncoder;
use flate2::Compression;
use tempfile::TempDir;

use paf_io::{ErrorKind, PafFile, PafRecord};

const PAF: &str = "read1\t1239\t65\t1239\t-\tchr1\t4378340\t2555250\t2556472\t1139\t1228\t60\ttp:A:P\tNM:i:89
read2\t500\t0\t500\t+\tchr2\t10000\t100\t600\t480\t500\t0\ttp:A:S
read3\t100\t0\t0\t*\t*\t0\t0\t0\t0\t0\t255
";

fn expected() -> Vec<PafRecord> {
    PAF.lines().map(|l| l.parse().unwrap()).collect()
}

fn gzip(data: &[u8]) -> Vec<u8> {
    let mut enc = GzEncoder::new(vec![], Compression::default());
    enc.write_all(data).unwrap();
    enc.finish().unwrap()
}

fn write_file(dir: &TempDir, name: &str, data: &[u8]) -> PathBuf {
    let path = dir.path().join(name);
    File::create(&path).unwrap().write_all(data).unwrap();
    path
}

fn read_all(paf: &mut PafFile) -> Vec<PafRecord> {
    paf.records().map(|r| r.unwrap()).collect()
}

fn assert_closed_error(res: Option<paf_io::Result<PafRecord>>) {
    let err = res.expect("expected an error").unwrap_err();
    assert_matches!(err.kind(), ErrorKind::Io(e) if e.kind() == io::ErrorKind::NotConnected);
    assert!(err.to_string().contains("closed"));
}

#[test]
fn plain_file() {
    let dir = TempDir::new().unwrap();
    let path = write_file(&dir, "aln.paf", PAF.as_bytes());

    let mut paf = PafFile::new(&path);
    assert!(paf.is_closed());
    assert_eq!(paf.path(), Some(path.as_path()));
    assert_closed_error(paf.next());

    paf.open().unwrap();
    assert!(!paf.is_closed());
    assert_eq!(read_all(&mut paf), expected());
    assert!(paf.next().is_none());

    paf.close();
    assert!(paf.is_closed());
    paf.close();
    assert!(paf.is_closed());
    assert_closed_error(paf.next());
}

#[test]
fn gzip_file() {
    let dir = TempDir::new().unwrap();
    let path = write_file(&dir, "aln.paf.gz", &gzip(PAF.as_bytes()));
    let mut paf = PafFile::from_path(&path).unwrap();
    assert_eq!(read_all(&mut paf), expected());
}

#[test]
fn detection_ignores_extension() {
    let dir = TempDir::new().unwrap();

    let path = write_file(&dir, "compressed.paf", &gzip(PAF.as_bytes()));
    let mut paf = PafFile::from_path(&path).unwrap();
    assert_eq!(read_all(&mut paf), expected());

    let path = write_file(&dir, "plain.paf.gz", PAF.as_bytes());
    let mut paf = PafFile::from_path(&path).unwrap();
    assert_eq!(read_all(&mut paf), expected());
}

#[test]
fn multi_member_gzip() {
    let dir = TempDir::new().unwrap();
    let (first, second) = PAF.split_at(PAF.find("read2").unwrap());
    let mut data = gzip(first.as_bytes());
    data.extend(gzip(second.as_bytes()));
    let path = write_file(&dir, "multi.paf.gz", &data);
    let mut paf = PafFile::from_path(&path).unwrap();
    assert_eq!(read_all(&mut paf), expected());
}

#[test]
fn reopen_rewinds() {
    let dir = TempDir::new().unwrap();
    let plain = write_file(&dir, "aln.paf", PAF.as_bytes());
    let gz = write_file(&dir, "aln.paf.gz", &gzip(PAF.as_bytes()));

    for path in &[plain, gz] {
        let mut paf = PafFile::from_path(path).unwrap();
        assert_eq!(paf.next().unwrap().unwrap(), expected()[0]);
        assert_eq!(paf.next().unwrap().unwrap(), expected()[1]);

        paf.open().unwrap();
        assert!(!paf.is_closed());
        assert_eq!(read_all(&mut paf), expected());

        // open again after exhausting the file
        paf.open().unwrap();
        assert_eq!(read_all(&mut paf), expected());

        // reopen after closing
        paf.close();
        paf.open().unwrap();
        assert_eq!(read_all(&mut paf), expected());
    }
}

#[test]
fn small_capacity() {
    let dir = TempDir::new().unwrap();
    let path = write_file(&dir, "aln.paf.gz", &gzip(PAF.as_bytes()));
    for cap in 3..40 {
        let mut paf = PafFile::new(&path).with_capacity(cap);
        paf.open().unwrap();
        assert_eq!(read_all(&mut paf), expected(), "mismatch at cap. {}", cap);
    }
}

#[test]
fn missing_path() {
    let dir = TempDir::new().unwrap();
    let mut paf = PafFile::new(dir.path().join("missing.paf"));
    let err = paf.open().unwrap_err();
    assert_matches!(err.kind(), ErrorKind::Io(e) if e.kind() == io::ErrorKind::NotFound);
    assert!(paf.is_closed());
}

#[test]
fn empty_file() {
    let dir = TempDir::new().unwrap();
    let path = write_file(&dir, "empty.paf", b"");
    let mut paf = PafFile::from_path(&path).unwrap();
    assert!(paf.next().is_none());

    let path = write_file(&dir, "empty.paf.gz", &gzip(b""));
    let mut paf = PafFile::from_path(&path).unwrap();
    assert!(paf.next().is_none());
}

#[test]
fn records_stop_after_closed_error() {
    let mut paf = PafFile::new(Path::new("never_opened.paf"));
    let results: Vec<_> = paf.records().collect();
    assert_eq!(results.len(), 1);
    assert!(results[0].is_err());
}

#[test]
fn records_continue_after_decode_error() {
    let data = format!("x\n{}", PAF);
    let mut paf = PafFile::from_reader(io::Cursor::new(data.into_bytes()));
    let results: Vec<_> = paf.records().collect();
    assert_eq!(results.len(), 4);
    assert!(results[0].as_ref().unwrap_err().is_decode_error());
    assert_eq!(results[3].as_ref().unwrap(), &expected()[2]);
}

#[test]
fn seekable_handle() {
    let mut paf = PafFile::from_seekable(io::Cursor::new(PAF.as_bytes().to_vec()));
    assert_eq!(paf.path(), None);
    assert_eq!(read_all(&mut paf), expected());
    paf.open().unwrap();
    assert_eq!(read_all(&mut paf), expected());
    paf.close();
    assert!(paf.open().is_err());
}

#[test]
fn file_display() {
    let paf = PafFile::new("some/aln.paf");
    assert_eq!(paf.to_string(), "some/aln.paf");
    assert_eq!(PafFile::stdin().to_string(), "-");
}
