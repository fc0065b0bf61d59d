//! Parallel decoding of PAF records
//!
//! Lines are read in batches ([`RecordSet`](crate::reader::RecordSet))
//! by a background thread, because sending across channels has a
//! performance impact. The batches are decoded in a thread pool, where a
//! user-supplied 'worker' function can do additional work on every record.
//! Results are then handed to a function running in the main thread, in the
//! same order as in the input.
//!
//! # Per-record processing
//!
//! The [`parallel_records`](parallel_records) function passes results for
//! **each record** to the main thread without having to care about record
//! sets. This example writes all records with a BLAST identity above 0.9:
//!
//! ```no_run
//! use paf_io::PafFile;
//! use paf_io::parallel::parallel_records;
//! use std::fs::File;
//! use std::io::BufWriter;
//!
//! let paf = PafFile::from_path("aln.paf.gz").unwrap();
//! let mut writer = BufWriter::new(File::create("filtered.paf").unwrap());
//!
//! parallel_records(paf, 4, 2,
//!     |record, keep| { // runs in worker
//!         *keep = record.blast_identity() > 0.9;
//!     },
//!     |record, keep| { // runs in main thread
//!         if *keep {
//!             record.write(&mut writer).unwrap();
//!         }
//!         // `false` would stop the reader
//!         true
//! }).unwrap();
//! ```
//!
//! # Record sets
//!
//! [`read_parallel`](read_parallel) gives direct access to the record sets:
//!
//! ```no_run
//! use paf_io::Reader;
//! use paf_io::parallel::read_parallel;
//!
//! let reader = Reader::from_path("aln.paf").unwrap();
//!
//! let n_unmapped = read_parallel(reader, 4, 2, |record_set| {
//!     // this function does the heavy work
//!     record_set
//!         .records()
//!         .filter(|r| r.as_ref().map(|r| r.is_unmapped()).unwrap_or(false))
//!         .count()
//! }, |record_sets| {
//!     // This function runs in the main thread. It provides a streaming iterator over
//!     // record sets and the corresponding return values from the worker function
//!     let mut n = 0;
//!     while let Some(result) = record_sets.next() {
//!         let (_, count) = result.unwrap();
//!         n += count;
//!     }
//!     n
//! });
//! println!("{} unmapped", n_unmapped);
//! ```

use std::collections::BTreeMap;
use std::io;
use std::marker::PhantomData;
use std::mem;
use std::panic;
use std::sync::mpsc;

use crossbeam_utils::thread;

use crate::error::{Error, Result};
use crate::file::PafFile;
use crate::policy::BufPolicy;
use crate::reader::{self, RecordSet};
use crate::record::PafRecord;

/// Source of data sets that can be read in a background thread.
pub trait RecordSetReader: Send {
    type DataSet: Default + Send;
    type Err: Send;
    fn fill_data(&mut self, data: &mut Self::DataSet) -> Option<std::result::Result<(), Self::Err>>;
}

/// Reads data sets in a background thread and processes them with `work`
/// in a pool of `n_threads` threads. `queue_len` is the number of data sets
/// in circulation (at least 1). `func` runs in the main thread and receives
/// the data sets together with the output of `work` in input order.
pub fn read_parallel<P, O, W, F, Out>(
    mut reader: P,
    n_threads: u32,
    queue_len: usize,
    work: W,
    func: F,
) -> Out
where
    P: RecordSetReader,
    O: Send,
    W: Send + Sync,
    W: Fn(&mut P::DataSet) -> O,
    F: FnOnce(&mut ParallelRecordsets<P::DataSet, P::Err, O>) -> Out,
{
    let queue_len = queue_len.max(1);
    let (done_send, done_recv) = mpsc::sync_channel(queue_len);
    let (empty_send, empty_recv): (mpsc::SyncSender<Option<P::DataSet>>, _) =
        mpsc::sync_channel(queue_len);

    let res = thread::scope(|scope| {
        scope.spawn(move |_| {
            let mut pool = scoped_threadpool::Pool::new(n_threads);

            pool.scoped(|pool_scope| {
                let work = &work;
                let mut idx = 0;

                loop {
                    // recycle an old DataSet sent back after use by the streaming iterator
                    let mut data = if let Ok(Some(r)) = empty_recv.recv() {
                        r
                    } else {
                        // 'ParallelRecordsets::stop()' called
                        return;
                    };

                    // each time, we need a new reference
                    let done_send = done_send.clone();

                    match reader.fill_data(&mut data) {
                        Some(Ok(())) => {
                            pool_scope.execute(move || {
                                let out = work(&mut data);
                                done_send.send(Some((idx, Ok((data, out))))).ok();
                            });
                        }
                        Some(Err(e)) => {
                            done_send.send(Some((idx, Err(e)))).ok();
                            break;
                        }
                        None => break,
                    }
                    idx += 1;
                }

                // make sure that the 'done' signal is only sent after everything else is done
                pool_scope.join_all();

                done_send.send(None).ok();
            });
        });

        for _ in 0..queue_len {
            if empty_send.send(Some(P::DataSet::default())).is_err() {
                break;
            }
        }

        let mut records = ParallelRecordsets {
            empty_send,
            done_recv,
            current_recordset: P::DataSet::default(),
            next_idx: 0,
            pending: BTreeMap::new(),
        };

        let out = func(&mut records);

        records.stop();

        out
    });

    res.unwrap_or_else(|e| panic::resume_unwind(e))
}

type Done<R, E, O> = Option<(usize, std::result::Result<(R, O), E>)>;

/// Streaming iterator over processed data sets, returned in input order
pub struct ParallelRecordsets<R, E, O>
where
    R: Default + Send,
    E: Send,
    O: Send,
{
    empty_send: mpsc::SyncSender<Option<R>>,
    done_recv: mpsc::Receiver<Done<R, E, O>>,
    current_recordset: R,
    next_idx: usize,
    // results that arrived before their predecessors
    pending: BTreeMap<usize, std::result::Result<(R, O), E>>,
}

impl<R, E, O> ParallelRecordsets<R, E, O>
where
    R: Default + Send,
    E: Send,
    O: Send,
{
    /// Returns the next data set with the output of the worker function,
    /// or `None` if the input is exhausted.
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> Option<std::result::Result<(&mut R, O), E>> {
        let result = loop {
            if let Some(r) = self.pending.remove(&self.next_idx) {
                break r;
            }
            match self.done_recv.recv() {
                Ok(Some((idx, r))) => {
                    if idx == self.next_idx {
                        break r;
                    }
                    self.pending.insert(idx, r);
                }
                // 'done' signal received
                _ => return None,
            }
        };
        self.next_idx += 1;

        match result {
            Ok((r, o)) => {
                let prev_rset = mem::replace(&mut self.current_recordset, r);
                // error: channel closed is not a problem, happens after the reader finished
                self.empty_send.send(Some(prev_rset)).ok();
                Some(Ok((&mut self.current_recordset, o)))
            }
            Err(e) => Some(Err(e)),
        }
    }

    // has to be called before object goes out of scope
    // currently, the signal is delayed (has to wait until it is popped from the
    // 'empty' queue)
    fn stop(self) {
        self.empty_send.send(None).ok();
    }
}

/// Decodes records in parallel, runs `work` on each record in the worker
/// threads and then `func` on each record and the corresponding output in
/// the main thread, in input order. If `func` returns `false`, reading
/// stops.
///
/// The first error (decoding or I/O) stops processing and is returned.
pub fn parallel_records<R, O, W, F>(
    reader: R,
    n_threads: u32,
    queue_len: usize,
    work: W,
    mut func: F,
) -> Result<()>
where
    R: RecordSetReader<DataSet = RecordSet, Err = Error>,
    O: Default + Send,
    W: Send + Sync,
    W: Fn(&PafRecord, &mut O),
    F: FnMut(&PafRecord, &O) -> bool,
{
    let reader = BatchReader::new(reader);

    read_parallel(
        reader,
        n_threads,
        queue_len,
        |batch: &mut Batch<O>| {
            batch.records.clear();
            batch.records.extend(batch.set.records());
            batch.out.clear();
            batch.out.resize_with(batch.records.len(), O::default);
            for (record, out) in batch.records.iter().zip(batch.out.iter_mut()) {
                if let Ok(record) = record {
                    work(record, out);
                }
            }
        },
        |batches| -> Result<()> {
            while let Some(result) = batches.next() {
                let (batch, _) = result?;
                for (record, out) in batch.records.drain(..).zip(&batch.out) {
                    if !func(&record?, out) {
                        return Ok(());
                    }
                }
            }
            Ok(())
        },
    )
}

struct BatchReader<P, O>(P, PhantomData<O>);

impl<P, O> BatchReader<P, O> {
    fn new(p: P) -> BatchReader<P, O> {
        BatchReader(p, PhantomData)
    }
}

impl<P, O> RecordSetReader for BatchReader<P, O>
where
    P: RecordSetReader<DataSet = RecordSet>,
    O: Send,
{
    type DataSet = Batch<O>;
    type Err = P::Err;
    fn fill_data(&mut self, data: &mut Batch<O>) -> Option<std::result::Result<(), P::Err>> {
        self.0.fill_data(&mut data.set)
    }
}

struct Batch<O> {
    set: RecordSet,
    records: Vec<Result<PafRecord>>,
    out: Vec<O>,
}

impl<O> Default for Batch<O> {
    fn default() -> Self {
        Batch {
            set: RecordSet::default(),
            records: vec![],
            out: vec![],
        }
    }
}

// trait impls

impl<R, P> RecordSetReader for reader::Reader<R, P>
where
    R: io::Read + Send,
    P: BufPolicy + Send,
{
    type DataSet = RecordSet;
    type Err = Error;
    fn fill_data(&mut self, rset: &mut RecordSet) -> Option<Result<()>> {
        self.read_record_set(rset)
    }
}

impl RecordSetReader for PafFile {
    type DataSet = RecordSet;
    type Err = Error;
    fn fill_data(&mut self, rset: &mut RecordSet) -> Option<Result<()>> {
        self.read_record_set(rset)
    }
}
