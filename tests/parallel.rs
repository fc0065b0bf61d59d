#[macro_use]
extern crate matches;
extern crate paf_io;

use paf_io::parallel::{parallel_records, read_parallel};
use paf_io::{ErrorKind, PafFile, PafRecord, Reader};

fn make_paf(n: usize) -> Vec<u8> {
    let mut out = vec![];
    for i in 0..n {
        let strand = if i % 2 == 0 { '+' } else { '-' };
        out.extend(
            format!(
                "read{}\t{}\t0\t{}\t{}\tchr{}\t100000\t{}\t{}\t{}\t{}\t60\ttp:A:P\n",
                i,
                100 + i,
                90 + i,
                strand,
                i % 5,
                i * 10,
                i * 10 + 90 + i,
                80 + i % 10,
                90 + i
            )
            .into_bytes(),
        );
    }
    out
}

fn sequential(paf: &[u8]) -> Vec<PafRecord> {
    Reader::new(paf).records().map(|r| r.unwrap()).collect()
}

#[test]
fn same_order_as_sequential() {
    let paf = make_paf(500);
    let expected = sequential(&paf);
    for &(cap, n_threads, queue_len) in &[(64, 1, 1), (64, 4, 2), (200, 2, 5), (1 << 16, 3, 3)] {
        let reader = Reader::with_capacity(paf.as_slice(), cap);
        let mut records = vec![];
        parallel_records(
            reader,
            n_threads,
            queue_len,
            |record, identity: &mut f64| {
                *identity = record.blast_identity();
            },
            |record, identity| {
                assert_eq!(*identity, record.blast_identity());
                records.push(record.clone());
                true
            },
        )
        .unwrap();
        assert_eq!(records, expected, "mismatch at cap. {}", cap);
    }
}

#[test]
fn stop_early() {
    let paf = make_paf(300);
    let reader = Reader::with_capacity(paf.as_slice(), 100);
    let mut n = 0;
    parallel_records(reader, 2, 2, |_, _: &mut ()| {}, |_, _| {
        n += 1;
        n < 10
    })
    .unwrap();
    assert_eq!(n, 10);
}

#[test]
fn decode_error() {
    let mut paf = make_paf(50);
    paf.extend_from_slice(b"invalid\n");
    paf.extend(make_paf(50));
    let reader = Reader::with_capacity(paf.as_slice(), 100);
    let mut n = 0;
    let err = parallel_records(reader, 2, 3, |_, _: &mut ()| {}, |_, _| {
        n += 1;
        true
    })
    .unwrap_err();
    assert_eq!(n, 50);
    assert_matches!(
        err.kind(),
        ErrorKind::MalformattedRecord { num_fields: 1, .. }
    );
    assert_eq!(err.position().unwrap().position().unwrap().line(), 51);
}

#[test]
fn record_sets_from_file() {
    let paf = make_paf(200);
    let expected = sequential(&paf);
    let file = PafFile::from_reader(std::io::Cursor::new(paf)).with_capacity(128);
    let (n_sets, n_mapped) = read_parallel(
        file,
        2,
        2,
        |rset| {
            rset.records()
                .filter(|r| !r.as_ref().unwrap().is_unmapped())
                .count()
        },
        |rsets| {
            let mut n_sets = 0;
            let mut n_mapped = 0;
            while let Some(res) = rsets.next() {
                let (rset, n) = res.unwrap();
                assert!(!rset.is_empty());
                n_sets += 1;
                n_mapped += n;
            }
            (n_sets, n_mapped)
        },
    );
    assert!(n_sets > 1);
    assert_eq!(n_mapped, expected.len());
}
