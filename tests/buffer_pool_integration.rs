//! Integration tests for the buffer pool.
//!
//! These tests drive the pool through real table and log files and verify
//! cross-component behavior that unit tests don't cover.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use pagevault::common::config::{BufferPoolConfig, EvictionPolicyKind};
use pagevault::recovery::{FileLog, LogSink, NoopLog};
use pagevault::storage::TouchedPages;
use pagevault::{
    BackingStore, BufferPool, Error, Page, PageId, Permissions, RecordId, Result, TableFile,
    TableId, TransactionId,
};
use parking_lot::Mutex;
use tempfile::{tempdir, TempDir};

const TABLE: TableId = TableId(1);

struct Fixture {
    pool: Arc<BufferPool>,
    table: Arc<TableFile>,
    _dir: TempDir,
}

fn fixture(pool_size: usize, pages: u32) -> Fixture {
    let dir = tempdir().unwrap();
    let table = Arc::new(TableFile::create(dir.path().join("t.tbl"), TABLE).unwrap());
    for _ in 0..pages {
        table.allocate_page().unwrap();
    }
    let config = BufferPoolConfig::default().with_pool_size(pool_size);
    let pool = Arc::new(BufferPool::new(config, Arc::new(NoopLog)));
    pool.register_table(table.clone());
    Fixture {
        pool,
        table,
        _dir: dir,
    }
}

fn pid(n: u32) -> PageId {
    PageId::new(TABLE, n)
}

fn write_byte(pool: &BufferPool, txn: TransactionId, page: PageId, at: usize, value: u8) {
    let handle = pool.fetch(txn, page, Permissions::ReadWrite).unwrap();
    handle.write().unwrap().as_mut_slice()[at] = value;
}

fn wait_until(mut cond: impl FnMut() -> bool) {
    for _ in 0..1000 {
        if cond() {
            return;
        }
        thread::sleep(Duration::from_millis(2));
    }
    panic!("condition not reached");
}

/// With capacity 2, accessing A, B, A, C evicts B.
#[test]
fn test_lru_evicts_least_recently_used() {
    let f = fixture(2, 3);
    let txn = TransactionId::next();
    let (a, b, c) = (pid(0), pid(1), pid(2));

    for page in [a, b, a, c] {
        f.pool.fetch(txn, page, Permissions::ReadOnly).unwrap();
    }

    assert!(f.pool.is_resident(a));
    assert!(!f.pool.is_resident(b));
    assert!(f.pool.is_resident(c));
    assert_eq!(f.pool.resident_count(), 2);
}

#[test]
fn test_fifo_ignores_reaccess() {
    let dir = tempdir().unwrap();
    let table = Arc::new(TableFile::create(dir.path().join("t.tbl"), TABLE).unwrap());
    for _ in 0..3 {
        table.allocate_page().unwrap();
    }
    let config = BufferPoolConfig::default()
        .with_pool_size(2)
        .with_policy(EvictionPolicyKind::Fifo);
    let pool = BufferPool::new(config, Arc::new(NoopLog));
    pool.register_table(table);

    let txn = TransactionId::next();
    for page in [pid(0), pid(1), pid(0), pid(2)] {
        pool.fetch(txn, page, Permissions::ReadOnly).unwrap();
    }

    assert!(!pool.is_resident(pid(0)));
    assert!(pool.is_resident(pid(1)));
}

/// A cache full of dirty pages refuses new pages and loses nothing.
#[test]
fn test_all_dirty_is_capacity_exhausted() {
    let f = fixture(2, 3);
    let txn = TransactionId::next();
    write_byte(&f.pool, txn, pid(0), 0, 0x10);
    write_byte(&f.pool, txn, pid(1), 0, 0x11);

    let err = f.pool.fetch(txn, pid(2), Permissions::ReadOnly).unwrap_err();
    assert!(matches!(err, Error::CapacityExhausted { capacity: 2 }));
    assert!(err.is_fatal());

    for (n, expected) in [(0, 0x10), (1, 0x11)] {
        assert_eq!(f.pool.dirtied_by(pid(n)), Some(txn));
        let handle = f.pool.fetch(txn, pid(n), Permissions::ReadOnly).unwrap();
        assert_eq!(handle.read().as_slice()[0], expected);
    }
    assert!(f.pool.stats().snapshot().dirty_skips >= 2);

    // Committing frees the pages for eviction again.
    f.pool.commit(txn).unwrap();
    f.pool
        .fetch(TransactionId::next(), pid(2), Permissions::ReadOnly)
        .unwrap();
}

/// Abort puts back exactly the bytes that were there before.
#[test]
fn test_abort_restores_bit_identical_contents() {
    let f = fixture(4, 0);
    let setup = TransactionId::next();
    f.pool.apply_insert(setup, TABLE, b"committed row").unwrap();
    f.pool.commit(setup).unwrap();

    let before = f.table.read_page(pid(0)).unwrap();

    let txn = TransactionId::next();
    f.pool.apply_insert(txn, TABLE, b"doomed row").unwrap();
    f.pool.apply_delete(txn, RecordId::new(pid(0), 0)).unwrap();
    assert_eq!(f.pool.dirtied_by(pid(0)), Some(txn));
    f.pool.abort(txn);

    let reader = TransactionId::next();
    let handle = f.pool.fetch(reader, pid(0), Permissions::ReadOnly).unwrap();
    assert_eq!(*handle.read(), before);
    assert_eq!(f.table.read_page(pid(0)).unwrap(), before);
    assert!(!f.pool.holds_lock(txn, pid(0)));
}

/// Committed changes survive a fresh pool over the same files.
#[test]
fn test_commit_persists_and_logs() {
    let dir = tempdir().unwrap();
    let table_path = dir.path().join("t.tbl");
    let log_path = dir.path().join("pool.log");
    let txn = TransactionId::next();

    {
        let log = Arc::new(FileLog::open(&log_path).unwrap());
        let pool = BufferPool::new(BufferPoolConfig::default(), log);
        pool.register_table(Arc::new(TableFile::create(&table_path, TABLE).unwrap()));

        let touched = pool.apply_insert(txn, TABLE, b"alice").unwrap();
        assert_eq!(touched, vec![pid(0)]);
        pool.apply_insert(txn, TABLE, b"bob").unwrap();
        pool.commit(txn).unwrap();
    }

    let table = Arc::new(TableFile::open(&table_path, TABLE).unwrap());
    let pool = BufferPool::new(BufferPoolConfig::default(), Arc::new(NoopLog));
    pool.register_table(table.clone());

    let reader = TransactionId::next();
    let rows: Vec<Vec<u8>> = table
        .scan(&pool, reader)
        .unwrap()
        .into_iter()
        .map(|(_, bytes)| bytes)
        .collect();
    assert_eq!(rows, vec![b"alice".to_vec(), b"bob".to_vec()]);

    let records = FileLog::open(&log_path).unwrap().records().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].txn, txn);
    assert_eq!(records[0].page_id, pid(0));
    assert_eq!(*records[0].before, Page::new());
    assert_eq!(*records[0].after, table.read_page(pid(0)).unwrap());
}

/// Deleted records stay gone after commit.
#[test]
fn test_delete_commit() {
    let f = fixture(4, 0);
    let t1 = TransactionId::next();
    f.pool.apply_insert(t1, TABLE, b"one").unwrap();
    f.pool.apply_insert(t1, TABLE, b"two").unwrap();
    f.pool.commit(t1).unwrap();

    let t2 = TransactionId::next();
    f.pool.apply_delete(t2, RecordId::new(pid(0), 0)).unwrap();
    f.pool.commit(t2).unwrap();

    let t3 = TransactionId::next();
    let rows = f.table.scan(&f.pool, t3).unwrap();
    assert_eq!(rows, vec![(RecordId::new(pid(0), 1), b"two".to_vec())]);

    let err = f
        .pool
        .apply_delete(t3, RecordId::new(pid(0), 0))
        .unwrap_err();
    assert!(matches!(err, Error::TupleNotFound(_)));
}

/// Two transactions each hold one page and want the other's: the second
/// request fails, and the first proceeds once the loser aborts.
#[test]
fn test_deadlock_exactly_one_aborts() {
    let f = fixture(4, 2);
    let (t1, t2) = (TransactionId::next(), TransactionId::next());
    let (p1, p2) = (pid(0), pid(1));

    write_byte(&f.pool, t1, p1, 0, 1);
    write_byte(&f.pool, t2, p2, 0, 2);

    let pool = Arc::clone(&f.pool);
    let first = thread::spawn(move || {
        pool.fetch(t1, p2, Permissions::ReadWrite).map(|h| h.page_id())
    });
    wait_until(|| f.pool.lock_manager().is_waiting(t1));

    let err = f.pool.fetch(t2, p1, Permissions::ReadWrite).unwrap_err();
    assert!(err.is_deadlock());
    assert!(matches!(err, Error::DeadlockDetected { txn, page } if txn == t2 && page == p1));

    f.pool.abort(t2);
    assert_eq!(first.join().unwrap().unwrap(), p2);

    f.pool.commit(t1).unwrap();
    assert_eq!(f.table.read_page(p1).unwrap().as_slice()[0], 1);
    assert_eq!(f.table.read_page(p2).unwrap().as_slice()[0], 0);
}

/// Ending a transaction frees every page it locked and wakes waiters.
#[test]
fn test_release_all_wakes_waiters() {
    let f = fixture(4, 3);
    let (t1, t2) = (TransactionId::next(), TransactionId::next());
    for n in 0..3 {
        f.pool.fetch(t1, pid(n), Permissions::ReadWrite).unwrap();
    }

    let pool = Arc::clone(&f.pool);
    let waiter = thread::spawn(move || pool.fetch(t2, pid(1), Permissions::ReadOnly).map(|_| ()));
    wait_until(|| f.pool.lock_manager().is_waiting(t2));

    f.pool.commit(t1).unwrap();

    for n in 0..3 {
        assert!(!f.pool.holds_lock(t1, pid(n)));
    }
    waiter.join().unwrap().unwrap();
    assert!(f.pool.holds_lock(t2, pid(1)));
}

/// Shared readers coexist; a writer waits for all of them.
#[test]
fn test_readers_block_writer() {
    let f = fixture(4, 1);
    let (r1, r2, w) = (
        TransactionId::next(),
        TransactionId::next(),
        TransactionId::next(),
    );
    f.pool.fetch(r1, pid(0), Permissions::ReadOnly).unwrap();
    f.pool.fetch(r2, pid(0), Permissions::ReadOnly).unwrap();

    let pool = Arc::clone(&f.pool);
    let writer = thread::spawn(move || {
        let handle = pool.fetch(w, pid(0), Permissions::ReadWrite)?;
        handle.write()?.as_mut_slice()[0] = 0x99;
        pool.commit(w)
    });
    wait_until(|| f.pool.lock_manager().is_waiting(w));

    f.pool.commit(r1).unwrap();
    assert!(f.pool.lock_manager().is_waiting(w));
    f.pool.commit(r2).unwrap();

    writer.join().unwrap().unwrap();
    assert_eq!(f.table.read_page(pid(0)).unwrap().as_slice()[0], 0x99);
}

/// A handle kept past commit cannot dirty the page for a finished
/// transaction, so the page stays evictable.
#[test]
fn test_handle_cannot_write_after_commit() {
    let f = fixture(1, 2);
    let txn = TransactionId::next();
    let handle = f.pool.fetch(txn, pid(0), Permissions::ReadWrite).unwrap();
    handle.write().unwrap().as_mut_slice()[0] = 7;
    f.pool.commit(txn).unwrap();

    let err = handle.write().unwrap_err();
    assert!(matches!(err, Error::LockNotHeld { txn: t, page } if t == txn && page == pid(0)));
    assert!(!f.pool.holds_lock(txn, pid(0)));
    assert_eq!(f.pool.dirtied_by(pid(0)), None);
    drop(handle);

    f.pool
        .fetch(TransactionId::next(), pid(1), Permissions::ReadOnly)
        .unwrap();
    assert!(!f.pool.is_resident(pid(0)));
    assert_eq!(f.table.read_page(pid(0)).unwrap().as_slice()[0], 7);
}

/// Concurrent inserters retrying on deadlock all land their rows.
#[test]
fn test_concurrent_inserts_with_retry() {
    const THREADS: usize = 4;
    const ROWS: usize = 25;

    let f = fixture(16, 0);
    let mut handles = vec![];

    for t in 0..THREADS {
        let pool = Arc::clone(&f.pool);
        handles.push(thread::spawn(move || {
            for r in 0..ROWS {
                let row = format!("t{t}-r{r}");
                loop {
                    let txn = TransactionId::next();
                    match pool.apply_insert(txn, TABLE, row.as_bytes()) {
                        Ok(_) => {
                            pool.commit(txn).unwrap();
                            break;
                        }
                        Err(e) if e.is_deadlock() => pool.abort(txn),
                        Err(e) => panic!("insert failed: {e}"),
                    }
                }
            }
        }));
    }

    for h in handles {
        h.join().unwrap();
    }

    let reader = TransactionId::next();
    let mut rows: Vec<String> = f
        .table
        .scan(&f.pool, reader)
        .unwrap()
        .into_iter()
        .map(|(_, bytes)| String::from_utf8(bytes).unwrap())
        .collect();
    rows.sort();

    let mut expected: Vec<String> = (0..THREADS)
        .flat_map(|t| (0..ROWS).map(move |r| format!("t{t}-r{r}")))
        .collect();
    expected.sort();
    assert_eq!(rows, expected);
}

// ============================================================================
// Write-ahead ordering
// ============================================================================

type Events = Arc<Mutex<Vec<String>>>;

struct RecordingLog(Events);

impl LogSink for RecordingLog {
    fn log_write(&self, txn: TransactionId, page_id: PageId, _: &Page, _: &Page) -> Result<()> {
        self.0.lock().push(format!("log {txn} {page_id}"));
        Ok(())
    }

    fn force(&self) -> Result<()> {
        self.0.lock().push("force".to_string());
        Ok(())
    }
}

struct RecordingStore {
    inner: TableFile,
    events: Events,
}

impl BackingStore for RecordingStore {
    fn table_id(&self) -> TableId {
        self.inner.table_id()
    }

    fn read_page(&self, page_id: PageId) -> Result<Page> {
        self.inner.read_page(page_id)
    }

    fn write_page(&self, page_id: PageId, page: &Page) -> Result<()> {
        self.events.lock().push(format!("write {page_id}"));
        self.inner.write_page(page_id, page)
    }

    fn insert_tuple(
        &self,
        pool: &BufferPool,
        txn: TransactionId,
        tuple: &[u8],
    ) -> Result<TouchedPages> {
        self.inner.insert_tuple(pool, txn, tuple)
    }

    fn delete_tuple(
        &self,
        pool: &BufferPool,
        txn: TransactionId,
        record: RecordId,
    ) -> Result<TouchedPages> {
        self.inner.delete_tuple(pool, txn, record)
    }

    fn page_count(&self) -> u32 {
        self.inner.page_count()
    }
}

#[test]
fn test_log_forced_before_page_write() {
    let dir = tempdir().unwrap();
    let events = Events::default();
    let inner = TableFile::create(dir.path().join("t.tbl"), TABLE).unwrap();
    inner.allocate_page().unwrap();
    inner.allocate_page().unwrap();

    let pool = BufferPool::new(
        BufferPoolConfig::default(),
        Arc::new(RecordingLog(events.clone())),
    );
    pool.register_table(Arc::new(RecordingStore {
        inner,
        events: events.clone(),
    }));

    let txn = TransactionId::next();
    write_byte(&pool, txn, pid(1), 0, 1);
    write_byte(&pool, txn, pid(0), 0, 1);
    assert!(events.lock().is_empty());

    pool.commit(txn).unwrap();

    let expected: Vec<String> = [pid(0), pid(1)]
        .iter()
        .flat_map(|p| [format!("log {txn} {p}"), "force".to_string(), format!("write {p}")])
        .collect();
    assert_eq!(*events.lock(), expected);
}

#[test]
fn test_abort_never_writes() {
    let dir = tempdir().unwrap();
    let events = Events::default();
    let inner = TableFile::create(dir.path().join("t.tbl"), TABLE).unwrap();
    inner.allocate_page().unwrap();

    let pool = BufferPool::new(
        BufferPoolConfig::default(),
        Arc::new(RecordingLog(events.clone())),
    );
    pool.register_table(Arc::new(RecordingStore {
        inner,
        events: events.clone(),
    }));

    let txn = TransactionId::next();
    write_byte(&pool, txn, pid(0), 0, 1);
    pool.abort(txn);

    assert!(events.lock().is_empty());
    assert_eq!(pool.stats().snapshot().rollbacks, 1);
}
