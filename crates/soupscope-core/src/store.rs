//! # Snapshot Store
//!
//! Loads and caches the per-epoch binary records of a trace directory.
//!
//! ## File Layout
//!
//! For every recorded epoch `E` the simulation writes up to three files:
//! - `epoch{E}_soup.bin`: `soup_size * half_len` native-endian `u64` tokens,
//!   tape-major then cell-major
//! - `epoch{E}_perm.bin`: `2 * npairs` native-endian `u32` tape indices,
//!   A participants first, then B participants
//! - `epoch{E}_steps.bin`: `npairs` native-endian `u32` step counts
//!
//! ## Caching
//!
//! Records are immutable once written, so each one is read at most once per
//! store and kept until the store is dropped. Lookups of cached epochs only
//! take a shared lock; a miss takes the exclusive lock, re-checks, and loads.
//! Absent files are not cached.

use crate::primitives::{EPOCH_FILE_PREFIX, EPOCH_FILE_SUFFIX};
use crate::{Epoch, SoupError, TapeIndex, Token, TraceConfig};
use bytemuck::Pod;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

// =============================================================================
// RECORDS
// =============================================================================

/// The population after one epoch's interactions completed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Soup {
    epoch: Epoch,
    half_len: usize,
    cells: Vec<Token>,
}

impl Soup {
    /// Build a soup from a flat, tape-major token array.
    pub fn from_tokens(epoch: Epoch, half_len: usize, cells: Vec<Token>) -> Result<Self, SoupError> {
        if half_len == 0 || cells.len() % half_len != 0 {
            return Err(SoupError::InvalidConfig(format!(
                "{} cells do not form whole tapes of length {}",
                cells.len(),
                half_len
            )));
        }
        Ok(Self {
            epoch,
            half_len,
            cells,
        })
    }

    /// Epoch this snapshot was taken after.
    #[must_use]
    pub fn epoch(&self) -> Epoch {
        self.epoch
    }

    /// Tokens per tape.
    #[must_use]
    pub fn half_len(&self) -> usize {
        self.half_len
    }

    /// Number of tapes.
    #[must_use]
    pub fn tape_count(&self) -> usize {
        self.cells.len() / self.half_len
    }

    /// All tokens, tape-major.
    #[must_use]
    pub fn cells(&self) -> &[Token] {
        &self.cells
    }

    /// One tape, or `None` past the end of the soup.
    #[must_use]
    pub fn tape(&self, tape: TapeIndex) -> Option<&[Token]> {
        let start = tape.checked_mul(self.half_len)?;
        let end = start.checked_add(self.half_len)?;
        self.cells.get(start..end)
    }

    /// One tape, or `TapeOutOfRange`.
    pub fn require_tape(&self, tape: TapeIndex) -> Result<&[Token], SoupError> {
        self.tape(tape).ok_or(SoupError::TapeOutOfRange {
            tape,
            soup_size: self.tape_count(),
        })
    }

    /// Iterate tapes in index order.
    pub fn tapes(&self) -> std::slice::ChunksExact<'_, Token> {
        self.cells.chunks_exact(self.half_len)
    }
}

/// The pairing drawn for one epoch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Permutation {
    epoch: Epoch,
    npairs: usize,
    entries: Vec<u32>,
}

impl Permutation {
    /// Build a permutation, checking its length and that every entry names
    /// a tape of the soup.
    pub fn from_entries(
        epoch: Epoch,
        npairs: usize,
        entries: Vec<u32>,
        soup_size: usize,
    ) -> Result<Self, SoupError> {
        if entries.len() != 2 * npairs {
            return Err(SoupError::InvalidConfig(format!(
                "permutation for epoch {} has {} entries, expected {}",
                epoch,
                entries.len(),
                2 * npairs
            )));
        }
        if let Some((position, &index)) = entries
            .iter()
            .enumerate()
            .find(|&(_, &index)| index as usize >= soup_size)
        {
            return Err(SoupError::IndexOutOfRange {
                epoch,
                position,
                index,
                soup_size,
            });
        }
        Ok(Self {
            epoch,
            npairs,
            entries,
        })
    }

    /// Epoch this pairing was used in.
    #[must_use]
    pub fn epoch(&self) -> Epoch {
        self.epoch
    }

    /// Number of pairs.
    #[must_use]
    pub fn npairs(&self) -> usize {
        self.npairs
    }

    /// A participants, indexed by pair.
    #[must_use]
    pub fn a_half(&self) -> &[u32] {
        &self.entries[..self.npairs]
    }

    /// B participants, indexed by pair.
    #[must_use]
    pub fn b_half(&self) -> &[u32] {
        &self.entries[self.npairs..]
    }

    /// The raw entry list, A half then B half.
    #[must_use]
    pub fn entries(&self) -> &[u32] {
        &self.entries
    }

    /// `(A, B)` tape indices of a pair.
    #[must_use]
    pub fn pair(&self, pair_index: usize) -> Option<(TapeIndex, TapeIndex)> {
        let a = *self.a_half().get(pair_index)?;
        let b = *self.b_half().get(pair_index)?;
        Some((a as TapeIndex, b as TapeIndex))
    }
}

/// Executed instruction count per pair for one epoch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepCounts {
    epoch: Epoch,
    counts: Vec<u32>,
}

impl StepCounts {
    /// Wrap a step-count array.
    #[must_use]
    pub fn new(epoch: Epoch, counts: Vec<u32>) -> Self {
        Self { epoch, counts }
    }

    /// Epoch these counts were recorded in.
    #[must_use]
    pub fn epoch(&self) -> Epoch {
        self.epoch
    }

    /// Counts indexed by pair.
    #[must_use]
    pub fn counts(&self) -> &[u32] {
        &self.counts
    }

    /// Count for one pair.
    #[must_use]
    pub fn get(&self, pair_index: usize) -> Option<u32> {
        self.counts.get(pair_index).copied()
    }
}

/// The three per-epoch record kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    Soup,
    Permutation,
    Steps,
}

impl RecordKind {
    /// Tag used in the record's file name.
    #[must_use]
    pub const fn file_tag(self) -> &'static str {
        match self {
            RecordKind::Soup => "soup",
            RecordKind::Permutation => "perm",
            RecordKind::Steps => "steps",
        }
    }

    /// File name of this record for an epoch.
    #[must_use]
    pub fn file_name(self, epoch: Epoch) -> String {
        format!(
            "{}{}_{}{}",
            EPOCH_FILE_PREFIX,
            epoch,
            self.file_tag(),
            EPOCH_FILE_SUFFIX
        )
    }
}

// =============================================================================
// EPOCH CACHE
// =============================================================================

/// One epoch's entry. Its mutex serializes loads of that epoch only.
type Slot<T> = Arc<Mutex<Option<Arc<T>>>>;

/// Unbounded epoch-keyed cache with at-most-one load per key.
///
/// The map lock is held only to find or insert a slot; a load runs under
/// its slot's lock, so readers of other epochs never wait on it.
#[derive(Debug)]
pub(crate) struct EpochCache<T> {
    slots: RwLock<BTreeMap<Epoch, Slot<T>>>,
}

impl<T> Default for EpochCache<T> {
    fn default() -> Self {
        Self {
            slots: RwLock::new(BTreeMap::new()),
        }
    }
}

impl<T> EpochCache<T> {
    fn slot(&self, epoch: Epoch) -> Slot<T> {
        if let Some(slot) = self
            .slots
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&epoch)
        {
            return Arc::clone(slot);
        }

        let mut slots = self.slots.write().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(slots.entry(epoch).or_default())
    }

    /// Return the cached value, or run `load` and cache what it produces.
    /// Concurrent callers for the same epoch wait for the first load.
    /// `Ok(None)` and errors from `load` are passed through without being
    /// cached.
    pub(crate) fn get_or_load<F>(&self, epoch: Epoch, load: F) -> Result<Option<Arc<T>>, SoupError>
    where
        F: FnOnce() -> Result<Option<T>, SoupError>,
    {
        let slot = self.slot(epoch);
        let mut entry = slot.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(hit) = entry.as_ref() {
            return Ok(Some(Arc::clone(hit)));
        }

        Ok(load()?.map(|value| {
            let value = Arc::new(value);
            *entry = Some(Arc::clone(&value));
            value
        }))
    }

    /// Number of loaded epochs.
    pub(crate) fn len(&self) -> usize {
        self.slots
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|slot| {
                slot.lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .is_some()
            })
            .count()
    }
}

// =============================================================================
// SNAPSHOT STORE
// =============================================================================

/// Number of records held by each cache of a store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheCounts {
    pub soups: usize,
    pub permutations: usize,
    pub steps: usize,
}

/// Read-only view of one trace directory.
#[derive(Debug)]
pub struct SnapshotStore {
    dir: PathBuf,
    config: TraceConfig,
    soups: EpochCache<Soup>,
    permutations: EpochCache<Permutation>,
    steps: EpochCache<StepCounts>,
}

impl SnapshotStore {
    /// Open a trace directory, loading its configuration first.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, SoupError> {
        let config = TraceConfig::load(dir.as_ref())?;
        Ok(Self::with_config(dir, config))
    }

    /// Open a trace directory with an explicit configuration.
    #[must_use]
    pub fn with_config(dir: impl AsRef<Path>, config: TraceConfig) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            config,
            soups: EpochCache::default(),
            permutations: EpochCache::default(),
            steps: EpochCache::default(),
        }
    }

    /// The trace directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// The session configuration.
    #[must_use]
    pub fn config(&self) -> &TraceConfig {
        &self.config
    }

    /// Path of a record file.
    #[must_use]
    pub fn record_path(&self, epoch: Epoch, kind: RecordKind) -> PathBuf {
        self.dir.join(kind.file_name(epoch))
    }

    /// Soup snapshot for an epoch, or `None` if it was not written.
    pub fn load_soup(&self, epoch: Epoch) -> Result<Option<Arc<Soup>>, SoupError> {
        self.soups.get_or_load(epoch, || {
            let path = self.record_path(epoch, RecordKind::Soup);
            read_record::<Token>(&path, self.config.soup_cells())?
                .map(|cells| Soup::from_tokens(epoch, self.config.half_len, cells))
                .transpose()
        })
    }

    /// Pairing for an epoch, or `None` if it was not written.
    pub fn load_permutation(&self, epoch: Epoch) -> Result<Option<Arc<Permutation>>, SoupError> {
        self.permutations.get_or_load(epoch, || {
            let path = self.record_path(epoch, RecordKind::Permutation);
            read_record::<u32>(&path, self.config.npairs.saturating_mul(2))?
                .map(|entries| {
                    Permutation::from_entries(
                        epoch,
                        self.config.npairs,
                        entries,
                        self.config.soup_size,
                    )
                })
                .transpose()
        })
    }

    /// Step counts for an epoch, or `None` if they were not written.
    pub fn load_steps(&self, epoch: Epoch) -> Result<Option<Arc<StepCounts>>, SoupError> {
        self.steps.get_or_load(epoch, || {
            let path = self.record_path(epoch, RecordKind::Steps);
            Ok(read_record::<u32>(&path, self.config.npairs)?
                .map(|counts| StepCounts::new(epoch, counts)))
        })
    }

    /// Epochs that have a soup snapshot, ascending.
    pub fn available_epochs(&self) -> Result<Vec<Epoch>, SoupError> {
        self.epochs_with(RecordKind::Soup)
    }

    /// Epochs that have a record of the given kind, ascending.
    pub fn epochs_with(&self, kind: RecordKind) -> Result<Vec<Epoch>, SoupError> {
        let entries = std::fs::read_dir(&self.dir)
            .map_err(|e| SoupError::Io(format!("List {:?}: {}", self.dir, e)))?;

        let suffix = format!("_{}{}", kind.file_tag(), EPOCH_FILE_SUFFIX);
        let mut epochs: Vec<Epoch> = entries
            .filter_map(Result::ok)
            .filter_map(|entry| {
                let name = entry.file_name();
                let name = name.to_str()?;
                name.strip_prefix(EPOCH_FILE_PREFIX)?
                    .strip_suffix(suffix.as_str())?
                    .parse::<Epoch>()
                    .ok()
            })
            .collect();

        epochs.sort_unstable();
        epochs.dedup();
        Ok(epochs)
    }

    /// Number of records currently cached, per kind.
    #[must_use]
    pub fn cache_counts(&self) -> CacheCounts {
        CacheCounts {
            soups: self.soups.len(),
            permutations: self.permutations.len(),
            steps: self.steps.len(),
        }
    }
}

// =============================================================================
// RECORD I/O
// =============================================================================

/// Read a fixed-size record of `len` elements. `Ok(None)` if the file does
/// not exist; `MalformedRecord` if its size is wrong.
fn read_record<T: Pod>(path: &Path, len: usize) -> Result<Option<Vec<T>>, SoupError> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(SoupError::Io(format!("Read {:?}: {}", path, e))),
    };

    let expected_bytes = len.checked_mul(std::mem::size_of::<T>()).ok_or_else(|| {
        SoupError::InvalidConfig(format!("{:?}: record of {} elements is too large", path, len))
    })?;
    if bytes.len() != expected_bytes {
        return Err(SoupError::MalformedRecord {
            path: path.to_path_buf(),
            expected_bytes,
            actual_bytes: bytes.len(),
        });
    }

    tracing::debug!("Loaded {:?} ({} bytes)", path, bytes.len());
    Ok(Some(bytemuck::pod_collect_to_vec::<u8, T>(&bytes)))
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn small_config() -> TraceConfig {
        TraceConfig {
            soup_size: 4,
            half_len: 2,
            npairs: 2,
            ..TraceConfig::default()
        }
    }

    fn write_soup(dir: &Path, epoch: Epoch, cells: &[Token]) {
        let path = dir.join(RecordKind::Soup.file_name(epoch));
        std::fs::write(path, bytemuck::cast_slice::<Token, u8>(cells)).expect("write soup");
    }

    fn write_u32s(dir: &Path, epoch: Epoch, kind: RecordKind, values: &[u32]) {
        let path = dir.join(kind.file_name(epoch));
        std::fs::write(path, bytemuck::cast_slice::<u32, u8>(values)).expect("write record");
    }

    fn cells(tag: u32) -> Vec<Token> {
        (0..8).map(|i| Token::new(i as u8, tag, 0)).collect()
    }

    #[test]
    fn file_names() {
        assert_eq!(RecordKind::Soup.file_name(7), "epoch7_soup.bin");
        assert_eq!(RecordKind::Permutation.file_name(0), "epoch0_perm.bin");
        assert_eq!(RecordKind::Steps.file_name(12), "epoch12_steps.bin");
    }

    #[test]
    fn missing_epoch_is_not_available() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = SnapshotStore::with_config(dir.path(), small_config());

        assert!(store.load_soup(3).expect("load").is_none());
        assert!(store.load_permutation(3).expect("load").is_none());
        assert!(store.load_steps(3).expect("load").is_none());
        assert_eq!(store.cache_counts(), CacheCounts::default());
    }

    #[test]
    fn soup_decodes_tape_major() {
        let dir = tempfile::tempdir().expect("tempdir");
        write_soup(dir.path(), 0, &cells(9));
        let store = SnapshotStore::with_config(dir.path(), small_config());

        let soup = store.load_soup(0).expect("load").expect("present");
        assert_eq!(soup.tape_count(), 4);
        assert_eq!(soup.tape(1).expect("tape").iter().map(|t| t.ch()).collect::<Vec<_>>(), vec![2, 3]);
        assert!(soup.tape(4).is_none());
        assert!(soup.cells().iter().all(|t| t.id() == 9));
    }

    #[test]
    fn cached_record_is_served_without_rereading() {
        let dir = tempfile::tempdir().expect("tempdir");
        write_soup(dir.path(), 0, &cells(1));
        let store = SnapshotStore::with_config(dir.path(), small_config());

        let first = store.load_soup(0).expect("load").expect("present");
        std::fs::remove_file(store.record_path(0, RecordKind::Soup)).expect("remove");
        let second = store.load_soup(0).expect("load").expect("still cached");

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(store.cache_counts().soups, 1);
    }

    #[test]
    fn concurrent_loads_of_one_epoch_run_once() {
        let cache: EpochCache<u32> = EpochCache::default();
        let loads = std::sync::atomic::AtomicUsize::new(0);

        let values: Vec<Arc<u32>> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|_| {
                    scope.spawn(|| {
                        cache.get_or_load(5, || {
                            loads.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                            std::thread::sleep(std::time::Duration::from_millis(20));
                            Ok(Some(42))
                        })
                    })
                })
                .collect();
            handles
                .into_iter()
                .map(|h| h.join().expect("join").expect("load").expect("present"))
                .collect()
        });

        assert_eq!(loads.load(std::sync::atomic::Ordering::SeqCst), 1);
        assert!(values.iter().all(|v| Arc::ptr_eq(v, &values[0])));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn slow_load_does_not_block_cached_epochs() {
        let cache: EpochCache<u32> = EpochCache::default();
        cache.get_or_load(0, || Ok(Some(7))).expect("load");
        let (release, wait) = std::sync::mpsc::channel::<()>();

        let shared = &cache;
        std::thread::scope(|scope| {
            let slow = scope.spawn(move || {
                shared.get_or_load(1, move || {
                    // Released only once epoch 0 was read on the main thread.
                    let released = wait.recv_timeout(std::time::Duration::from_secs(5)).is_ok();
                    Ok(released.then_some(1))
                })
            });

            let hit = cache.get_or_load(0, || Ok(None)).expect("load");
            assert_eq!(hit.as_deref(), Some(&7));
            release.send(()).expect("send");

            let slow = slow.join().expect("join").expect("load");
            assert_eq!(slow.as_deref(), Some(&1));
        });
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn absent_and_failed_loads_are_retried() {
        let cache: EpochCache<u32> = EpochCache::default();
        assert!(cache.get_or_load(3, || Ok(None)).expect("load").is_none());
        assert!(cache.get_or_load(3, || Err(SoupError::RunlogGap(3))).is_err());
        assert_eq!(cache.len(), 0);

        let value = cache.get_or_load(3, || Ok(Some(9))).expect("load");
        assert_eq!(value.as_deref(), Some(&9));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn wrong_size_is_malformed() {
        let dir = tempfile::tempdir().expect("tempdir");
        write_soup(dir.path(), 0, &cells(1)[..7]);
        let store = SnapshotStore::with_config(dir.path(), small_config());

        let result = store.load_soup(0);
        assert!(matches!(
            result,
            Err(SoupError::MalformedRecord {
                expected_bytes: 64,
                actual_bytes: 56,
                ..
            })
        ));
    }

    #[test]
    fn permutation_halves() {
        let dir = tempfile::tempdir().expect("tempdir");
        write_u32s(dir.path(), 1, RecordKind::Permutation, &[3, 0, 1, 2]);
        let store = SnapshotStore::with_config(dir.path(), small_config());

        let perm = store.load_permutation(1).expect("load").expect("present");
        assert_eq!(perm.a_half(), &[3, 0]);
        assert_eq!(perm.b_half(), &[1, 2]);
        assert_eq!(perm.pair(1), Some((0, 2)));
        assert_eq!(perm.pair(2), None);
    }

    #[test]
    fn permutation_index_out_of_range() {
        let dir = tempfile::tempdir().expect("tempdir");
        write_u32s(dir.path(), 1, RecordKind::Permutation, &[3, 0, 4, 2]);
        let store = SnapshotStore::with_config(dir.path(), small_config());

        let result = store.load_permutation(1);
        assert!(matches!(
            result,
            Err(SoupError::IndexOutOfRange {
                position: 2,
                index: 4,
                ..
            })
        ));
    }

    #[test]
    fn steps_load() {
        let dir = tempfile::tempdir().expect("tempdir");
        write_u32s(dir.path(), 2, RecordKind::Steps, &[17, 16384]);
        let store = SnapshotStore::with_config(dir.path(), small_config());

        let steps = store.load_steps(2).expect("load").expect("present");
        assert_eq!(steps.counts(), &[17, 16384]);
        assert_eq!(steps.get(1), Some(16384));
        assert_eq!(steps.get(2), None);
    }

    #[test]
    fn available_epochs_sorted_numerically() {
        let dir = tempfile::tempdir().expect("tempdir");
        for epoch in [10, 2, 1] {
            write_soup(dir.path(), epoch, &cells(1));
        }
        write_u32s(dir.path(), 3, RecordKind::Steps, &[0, 0]);
        std::fs::write(dir.path().join("epochX_soup.bin"), b"").expect("write");
        std::fs::write(dir.path().join("metadata.txt"), b"").expect("write");

        let store = SnapshotStore::with_config(dir.path(), small_config());
        assert_eq!(store.available_epochs().expect("list"), vec![1, 2, 10]);
        assert_eq!(store.epochs_with(RecordKind::Steps).expect("list"), vec![3]);
    }
}
