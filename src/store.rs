use crate::chart_io::export_chart;
use crate::history::{History, HistoryEntry, MAX_HISTORY_SIZE};
use crate::model::chart::*;
use log::{debug, warn};

/// What part of the chart changed. Delivered to subscribers after the change is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Change {
    SongInfo,
    TimingPoints,
    Notes,

    /// The whole chart was replaced by [`ChartStore::load_chart_data`].
    Loaded,

    /// The whole chart was restored from history.
    Undo,
    Redo,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Listener = Box<dyn FnMut(Change)>;

/// Owns the song info, timing points and notes of one chart, along with its undo history.
///
/// Timing points stay sorted by `(measure, beat)` with at most one point per position, and
/// notes stay sorted by `(measure, beat, lane)`, as long as they are only changed through these
/// methods. Every mutation records one history entry unless a batch is open.
pub struct ChartStore {
    song_info: SongInfo,
    timing_points: Vec<TimingPoint>,
    notes: Vec<Note>,
    history: History,
    batch_depth: usize,
    listeners: Vec<(SubscriptionId, Listener)>,
    next_subscription: u64,
}

impl std::fmt::Debug for ChartStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChartStore")
            .field("song_info", &self.song_info)
            .field("timing_points", &self.timing_points)
            .field("notes", &self.notes)
            .field("history", &self.history)
            .field("batch_depth", &self.batch_depth)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl Default for ChartStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ChartStore {
    pub fn new() -> Self {
        Self::with_chart(ChartData::default())
    }

    /// Creates a store holding `data`, which becomes the first history entry.
    pub fn with_chart(data: ChartData) -> Self {
        Self::with_history_limit(data, MAX_HISTORY_SIZE)
    }

    pub fn with_history_limit(data: ChartData, limit: usize) -> Self {
        let mut store = Self {
            song_info: data.song_info,
            timing_points: data.timing_points,
            notes: data.notes,
            history: History::with_limit(limit),
            batch_depth: 0,
            listeners: Vec::new(),
            next_subscription: 0,
        };

        store.save_to_history();
        store
    }

    pub fn song_info(&self) -> &SongInfo {
        &self.song_info
    }

    pub fn timing_points(&self) -> &[TimingPoint] {
        &self.timing_points
    }

    pub fn notes(&self) -> &[Note] {
        &self.notes
    }

    /// An owned snapshot of the current chart.
    pub fn chart_data(&self) -> ChartData {
        ChartData {
            song_info: self.song_info.clone(),
            timing_points: self.timing_points.clone(),
            notes: self.notes.clone(),
        }
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn subscribe(&mut self, listener: impl FnMut(Change) + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.next_subscription);
        self.next_subscription += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    /// Returns `false` if `id` was not subscribed.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(listener_id, _)| *listener_id != id);
        self.listeners.len() != before
    }

    fn notify(&mut self, change: Change) {
        for (_, listener) in self.listeners.iter_mut() {
            listener(change);
        }
    }

    fn latest_timing_point_at(&self, measure: u32, beat: f64) -> Option<&TimingPoint> {
        // Loaded charts may be unsorted, so this can't rely on the collection order.
        self.timing_points
            .iter()
            .filter(|tp| tp.is_at_or_before(measure, beat))
            .max_by(|a, b| compare_timing_points(a, b))
    }

    /// Tempo in effect at `(measure, beat)`, or [`DEFAULT_BPM`] before the first timing point.
    pub fn bpm_at(&self, measure: u32, beat: f64) -> f64 {
        self.latest_timing_point_at(measure, beat)
            .map(|tp| tp.bpm)
            .unwrap_or(DEFAULT_BPM)
    }

    /// Time signature in effect at `(measure, beat)`, or 4/4 before the first timing point.
    pub fn time_signature_at(&self, measure: u32, beat: f64) -> TimeSignature {
        self.latest_timing_point_at(measure, beat)
            .map(|tp| tp.time_signature)
            .unwrap_or_default()
    }

    pub fn timing_point_at(&self, measure: u32, beat: f64) -> Option<&TimingPoint> {
        self.timing_points.iter().find(|tp| tp.is_at(measure, beat))
    }

    pub fn has_timing_point_at(&self, measure: u32, beat: f64) -> bool {
        self.timing_points.iter().any(|tp| tp.is_at(measure, beat))
    }

    /// Inserts `point`, replacing any point already at the same `(measure, beat)`.
    pub fn add_timing_point(&mut self, point: TimingPoint) {
        if let Some((index, existing)) = self
            .timing_points
            .iter_mut()
            .enumerate()
            .find(|(_, tp)| tp.is_at(point.measure, point.beat))
        {
            debug!(
                "Replacing timing point at index {} ({}:{})..!",
                index, point.measure, point.beat
            );
            *existing = point;
        } else {
            debug!(
                "Adding timing point at {}:{} -> {} bpm {}..!",
                point.measure, point.beat, point.bpm, point.time_signature
            );
            self.timing_points.push(point);
        }

        self.timing_points.sort_by(compare_timing_points);
        self.notify(Change::TimingPoints);
        self.save_to_history();
    }

    /// Removes the timing point at `index`. An out of range index leaves the collection as it is.
    pub fn remove_timing_point(&mut self, index: usize) -> Option<TimingPoint> {
        let removed = if index < self.timing_points.len() {
            Some(self.timing_points.remove(index))
        } else {
            debug!(
                "Ignoring removal of timing point {} (only {} present)..!",
                index,
                self.timing_points.len()
            );
            None
        };

        if removed.is_some() {
            self.notify(Change::TimingPoints);
        }
        self.save_to_history();
        removed
    }

    /// Inserts `note` in `(measure, beat, lane)` order. Identical notes are kept side by side.
    pub fn add_note(&mut self, note: Note) {
        debug!(
            "Adding {:?} note at {}:{} lane {}..!",
            note.kind, note.measure, note.beat, note.lane
        );
        self.notes.push(note);
        self.notes.sort_by(compare_notes);
        self.notify(Change::Notes);
        self.save_to_history();
    }

    /// Removes the note at `index`. An out of range index leaves the collection as it is.
    pub fn remove_note(&mut self, index: usize) -> Option<Note> {
        let removed = if index < self.notes.len() {
            Some(self.notes.remove(index))
        } else {
            debug!(
                "Ignoring removal of note {} (only {} present)..!",
                index,
                self.notes.len()
            );
            None
        };

        if removed.is_some() {
            self.notify(Change::Notes);
        }
        self.save_to_history();
        removed
    }

    pub fn clear_notes(&mut self) {
        debug!("Clearing {} notes..!", self.notes.len());
        self.notes = Vec::new();
        self.notify(Change::Notes);
        self.save_to_history();
    }

    pub fn set_song_info(&mut self, patch: SongInfoPatch) {
        patch.apply_to(&mut self.song_info);
        self.notify(Change::SongInfo);
        self.save_to_history();
    }

    /// Replaces the whole chart with `data`. The data is taken as given and is not re-sorted.
    pub fn load_chart_data(&mut self, data: ChartData) {
        if !is_sorted_by_position(&data.timing_points, compare_timing_points) {
            warn!("Loaded timing points are not sorted by position..!");
        }
        if !is_sorted_by_position(&data.notes, compare_notes) {
            warn!("Loaded notes are not sorted by position..!");
        }

        debug!(
            "Loading chart '{}' with {} timing points and {} notes..!",
            data.song_info.title,
            data.timing_points.len(),
            data.notes.len()
        );

        self.song_info = data.song_info;
        self.timing_points = data.timing_points;
        self.notes = data.notes;
        self.notify(Change::Loaded);
        self.save_to_history();
    }

    /// Pretty-printed JSON of the current chart.
    pub fn export_chart_data(&self) -> anyhow::Result<String> {
        export_chart(&self.chart_data())
    }

    pub fn is_recording(&self) -> bool {
        self.batch_depth == 0
    }

    /// Records the current state as a new history entry. Does nothing while a batch is open.
    pub fn save_to_history(&mut self) {
        if !self.is_recording() {
            return;
        }

        self.history.record(HistoryEntry::capture(
            &self.song_info,
            &self.timing_points,
            &self.notes,
        ));
    }

    fn restore(&mut self, entry: HistoryEntry) {
        self.song_info = entry.song_info;
        self.timing_points = entry.timing_points;
        self.notes = entry.notes;
    }

    /// Returns `false` when there is nothing to undo.
    pub fn undo(&mut self) -> bool {
        let Some(entry) = self.history.undo().cloned() else {
            return false;
        };

        self.restore(entry);
        self.notify(Change::Undo);
        true
    }

    /// Returns `false` when there is nothing to redo.
    pub fn redo(&mut self) -> bool {
        let Some(entry) = self.history.redo().cloned() else {
            return false;
        };

        self.restore(entry);
        self.notify(Change::Redo);
        true
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    /// Runs `operation` with history recording suspended, then records exactly one entry for
    /// its net effect. The entry is recorded even if `operation` returns an error or panics.
    ///
    /// Batches may nest; only the outermost one records.
    pub fn perform_batch_operation<R>(&mut self, operation: impl FnOnce(&mut ChartStore) -> R) -> R {
        self.batch_depth += 1;
        let mut guard = BatchGuard { store: self };
        operation(&mut *guard.store)
    }
}

struct BatchGuard<'a> {
    store: &'a mut ChartStore,
}

impl Drop for BatchGuard<'_> {
    fn drop(&mut self) {
        self.store.batch_depth = self.store.batch_depth.saturating_sub(1);
        self.store.save_to_history();
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::cell::RefCell;
    use std::panic::{self, AssertUnwindSafe};
    use std::rc::Rc;

    fn tp(measure: u32, beat: f64, bpm: f64) -> TimingPoint {
        TimingPoint::new(measure, beat, bpm, TimeSignature::default())
    }

    fn empty_store() -> ChartStore {
        ChartStore::with_chart(ChartData {
            song_info: SongInfo::default(),
            timing_points: Vec::new(),
            notes: Vec::new(),
        })
    }

    #[test]
    fn defaults_match_a_new_chart() {
        env_logger::try_init().unwrap_or(());

        let store = ChartStore::new();
        assert_eq!(store.song_info(), &SongInfo::default());
        assert_eq!(store.timing_points(), &[tp(1, 0.0, 120.0)]);
        assert!(store.notes().is_empty());
        assert_eq!(store.history().len(), 1);
        assert!(!store.can_undo());
        assert!(!store.can_redo());
    }

    #[test]
    fn lookups_fall_back_to_defaults() {
        env_logger::try_init().unwrap_or(());

        let store = empty_store();
        assert_eq!(store.bpm_at(5, 1.0), DEFAULT_BPM);
        assert_eq!(store.time_signature_at(5, 1.0), TimeSignature(4, 4));
        assert!(store.timing_point_at(1, 0.0).is_none());
        assert!(!store.has_timing_point_at(1, 0.0));
    }

    #[test]
    fn bpm_follows_latest_point() {
        env_logger::try_init().unwrap_or(());

        let mut store = empty_store();
        store.add_timing_point(tp(3, 0.0, 140.0));
        store.add_timing_point(TimingPoint::new(1, 0.0, 120.0, TimeSignature(3, 4)));

        assert_eq!(store.bpm_at(2, 0.0), 120.0);
        assert_eq!(store.bpm_at(3, 0.0), 140.0);
        assert_eq!(store.bpm_at(3, 2.0), 140.0);
        assert_eq!(store.bpm_at(0, 3.0), DEFAULT_BPM);
        assert_eq!(store.time_signature_at(2, 1.0), TimeSignature(3, 4));
        assert_eq!(store.time_signature_at(3, 0.0), TimeSignature(4, 4));
    }

    #[test]
    fn same_measure_beat_comparison() {
        env_logger::try_init().unwrap_or(());

        let mut store = empty_store();
        store.add_timing_point(tp(2, 0.0, 100.0));
        store.add_timing_point(tp(2, 2.0, 180.0));

        assert_eq!(store.bpm_at(2, 1.999), 100.0);
        assert_eq!(store.bpm_at(2, 2.0), 180.0);
        assert_eq!(store.bpm_at(1, 3.5), DEFAULT_BPM);
    }

    #[test]
    fn timing_points_stay_sorted_and_unique() {
        env_logger::try_init().unwrap_or(());

        let mut store = empty_store();
        store.add_timing_point(tp(4, 0.0, 150.0));
        store.add_timing_point(tp(1, 2.0, 90.0));
        store.add_timing_point(tp(1, 0.0, 120.0));
        store.add_timing_point(tp(4, 0.0, 160.0));
        store.add_timing_point(tp(2, 1.5, 130.0));

        let positions: Vec<_> = store
            .timing_points()
            .iter()
            .map(|tp| (tp.measure, tp.beat))
            .collect();
        assert_eq!(positions, vec![(1, 0.0), (1, 2.0), (2, 1.5), (4, 0.0)]);
        assert_eq!(store.timing_point_at(4, 0.0).map(|tp| tp.bpm), Some(160.0));
        assert!(store.has_timing_point_at(2, 1.5));
        assert!(!store.has_timing_point_at(2, 1.0));
    }

    #[test]
    fn notes_keep_duplicates_in_order() {
        env_logger::try_init().unwrap_or(());

        let mut store = ChartStore::new();
        store.add_note(Note::tap(2, 0.0, 1));
        store.add_note(Note::hold(1, 1.0, 0, 2.0));
        store.add_note(Note::tap(2, 0.0, 1));
        store.add_note(Note::tap(2, 0.0, 0));

        assert_eq!(
            store.notes(),
            &[
                Note::hold(1, 1.0, 0, 2.0),
                Note::tap(2, 0.0, 0),
                Note::tap(2, 0.0, 1),
                Note::tap(2, 0.0, 1),
            ]
        );
    }

    #[test]
    fn out_of_range_removal_is_ignored() {
        env_logger::try_init().unwrap_or(());

        let mut store = ChartStore::new();
        store.add_note(Note::tap(1, 0.0, 0));

        assert!(store.remove_note(5).is_none());
        assert!(store.remove_timing_point(1).is_none());
        assert_eq!(store.notes().len(), 1);
        assert_eq!(store.timing_points().len(), 1);

        assert_eq!(store.remove_note(0), Some(Note::tap(1, 0.0, 0)));
        assert_eq!(store.remove_timing_point(0), Some(tp(1, 0.0, 120.0)));
        assert!(store.notes().is_empty());
        assert!(store.timing_points().is_empty());
    }

    #[test]
    fn song_info_merge_and_clear_notes() {
        env_logger::try_init().unwrap_or(());

        let mut store = ChartStore::new();
        store.add_note(Note::tap(1, 0.0, 0));
        store.set_song_info(SongInfoPatch {
            artist: Some(String::from("Tas")),
            volume: Some(0.8),
            ..Default::default()
        });
        store.clear_notes();

        assert_eq!(store.song_info().artist, "Tas");
        assert_eq!(store.song_info().volume, 0.8);
        assert_eq!(store.song_info().difficulty, "Normal");
        assert!(store.notes().is_empty());

        assert!(store.undo());
        assert_eq!(store.notes().len(), 1);
        assert!(store.undo());
        assert_eq!(store.song_info().artist, "");
    }

    #[test]
    fn undo_all_then_redo_all() {
        env_logger::try_init().unwrap_or(());

        let mut store = ChartStore::new();
        let initial = store.chart_data();

        store.add_timing_point(tp(5, 0.0, 170.0));
        store.add_note(Note::tap(1, 0.0, 0));
        store.add_note(Note::hold(2, 1.0, 2, 1.5));
        store.set_song_info(SongInfoPatch {
            title: Some(String::from("Twinkle")),
            ..Default::default()
        });
        store.remove_note(0);
        let edited = store.chart_data();

        for _ in 0..5 {
            assert!(store.undo());
        }
        assert!(!store.undo());
        assert_eq!(store.chart_data(), initial);

        for _ in 0..5 {
            assert!(store.redo());
        }
        assert!(!store.redo());
        assert_eq!(store.chart_data(), edited);
    }

    #[test]
    fn restored_state_does_not_alias_history() {
        env_logger::try_init().unwrap_or(());

        let mut store = ChartStore::new();
        store.add_note(Note::tap(1, 0.0, 0));
        store.add_note(Note::tap(1, 1.0, 0));
        assert!(store.undo());

        // Clearing after an undo must not touch the entry that was just restored.
        store.clear_notes();
        assert!(store.undo());
        assert_eq!(store.notes(), &[Note::tap(1, 0.0, 0)]);
    }

    #[test]
    fn new_edit_after_undo_drops_redo() {
        env_logger::try_init().unwrap_or(());

        let mut store = ChartStore::new();
        store.add_note(Note::tap(1, 0.0, 0));
        store.add_note(Note::tap(2, 0.0, 0));
        assert!(store.undo());
        assert!(store.can_redo());

        store.add_note(Note::tap(3, 0.0, 0));
        assert!(!store.can_redo());
        assert!(!store.redo());
        assert_eq!(store.notes(), &[Note::tap(1, 0.0, 0), Note::tap(3, 0.0, 0)]);
    }

    #[test]
    fn history_is_bounded() {
        env_logger::try_init().unwrap_or(());

        let mut store = ChartStore::new();
        for lane in 0..60 {
            store.add_note(Note::tap(1, 0.0, lane));
        }

        let mut undos = 0;
        while store.undo() {
            undos += 1;
        }
        assert_eq!(undos, MAX_HISTORY_SIZE - 1);
        assert_eq!(store.notes().len(), 60 - (MAX_HISTORY_SIZE - 1));
    }

    #[test]
    fn batch_records_one_entry() {
        env_logger::try_init().unwrap_or(());

        let mut store = ChartStore::new();
        let before = store.chart_data();
        let entries = store.history().len();

        let added = store.perform_batch_operation(|store| {
            for beat in 0..4 {
                store.add_note(Note::tap(1, beat as f64, 0));
            }
            store.add_timing_point(tp(2, 0.0, 150.0));
            store.notes().len()
        });

        assert_eq!(added, 4);
        assert_eq!(store.history().len(), entries + 1);
        assert!(store.is_recording());

        assert!(store.undo());
        assert_eq!(store.chart_data(), before);
        assert!(!store.undo());
    }

    #[test]
    fn nested_batches_record_once() {
        env_logger::try_init().unwrap_or(());

        let mut store = ChartStore::new();
        let entries = store.history().len();

        store.perform_batch_operation(|store| {
            store.add_note(Note::tap(1, 0.0, 0));
            store.perform_batch_operation(|store| {
                store.add_note(Note::tap(1, 1.0, 0));
                store.add_note(Note::tap(1, 2.0, 0));
            });
            store.clear_notes();
            store.add_note(Note::tap(4, 0.0, 1));
        });

        assert_eq!(store.history().len(), entries + 1);
        assert_eq!(store.notes(), &[Note::tap(4, 0.0, 1)]);
    }

    #[test]
    fn failed_batch_still_records() {
        env_logger::try_init().unwrap_or(());

        let mut store = ChartStore::new();
        let entries = store.history().len();

        let result: anyhow::Result<()> = store.perform_batch_operation(|store| {
            store.add_note(Note::tap(1, 0.0, 0));
            anyhow::bail!("Lane out of range..!")
        });

        assert!(result.is_err());
        assert!(store.is_recording());
        assert_eq!(store.history().len(), entries + 1);
        assert_eq!(store.notes().len(), 1);
    }

    #[test]
    fn panicking_batch_still_records() {
        env_logger::try_init().unwrap_or(());

        let mut store = ChartStore::new();
        let entries = store.history().len();

        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            store.perform_batch_operation(|store| {
                store.add_note(Note::tap(1, 0.0, 0));
                store.add_note(Note::tap(2, 0.0, 0));
                panic!("Editor crashed mid-batch..!");
            })
        }));

        assert!(result.is_err());
        assert!(store.is_recording());
        assert_eq!(store.history().len(), entries + 1);

        assert!(store.undo());
        assert!(store.notes().is_empty());
    }

    #[test]
    fn subscribers_see_each_change() {
        env_logger::try_init().unwrap_or(());

        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut store = ChartStore::new();

        let sink = Rc::clone(&seen);
        let id = store.subscribe(move |change| sink.borrow_mut().push(change));

        store.add_note(Note::tap(1, 0.0, 0));
        store.add_timing_point(tp(2, 0.0, 150.0));
        store.remove_note(7);
        store.set_song_info(SongInfoPatch::default());
        store.undo();
        store.redo();
        store.load_chart_data(ChartData::default());

        assert!(store.unsubscribe(id));
        assert!(!store.unsubscribe(id));
        store.clear_notes();

        assert_eq!(
            *seen.borrow(),
            vec![
                Change::Notes,
                Change::TimingPoints,
                Change::SongInfo,
                Change::Undo,
                Change::Redo,
                Change::Loaded,
            ]
        );
    }

    #[test]
    fn load_keeps_given_order() {
        env_logger::try_init().unwrap_or(());

        let mut store = ChartStore::new();
        let data = ChartData {
            song_info: SongInfo::default(),
            timing_points: vec![tp(3, 0.0, 140.0), tp(1, 0.0, 100.0)],
            notes: vec![Note::tap(2, 0.0, 0), Note::tap(1, 0.0, 0)],
        };
        store.load_chart_data(data.clone());

        assert_eq!(store.chart_data(), data);
        assert_eq!(store.bpm_at(2, 0.0), 100.0);
        assert_eq!(store.bpm_at(3, 0.0), 140.0);

        assert!(store.undo());
        assert_eq!(store.chart_data(), ChartData::default());
    }

    #[test]
    fn export_then_load_round_trips() {
        env_logger::try_init().unwrap_or(());

        let mut store = ChartStore::new();
        store.perform_batch_operation(|store| {
            store.set_song_info(SongInfoPatch {
                title: Some(String::from("Twinkle Twinkle Little Star")),
                audio_offset: Some(-0.25),
                level: Some(3),
                ..Default::default()
            });
            store.add_timing_point(TimingPoint::new(9, 2.0, 96.5, TimeSignature(6, 8)));
            store.add_note(Note::tap(1, 0.0, 0));
            store.add_note(Note::hold(1, 2.5, 3, 1.25));
        });

        let exported = store.export_chart_data().unwrap();
        let parsed = crate::chart_io::parse_chart(&exported).unwrap();

        let mut other = ChartStore::new();
        other.load_chart_data(parsed);
        assert_eq!(other.chart_data(), store.chart_data());
    }
}
