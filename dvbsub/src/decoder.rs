//! The decoder itself: packet submission and the scheduler thread.
//!
//! One mutex guards the decode model and the display queue together.
//! Packet submission runs on the caller's thread; a dedicated scheduler
//! thread wakes on a short tick (or a nudge from submission) to move due
//! pictures to the display. The caller's video clock is always queried
//! with the lock released, and the pass is re-validated afterwards in
//! case submission changed the queue in the meantime.

use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use dvbsub_protocol::{PesPacket, SegmentReader, SegmentType};
use log::{debug, warn};
use parking_lot::{Condvar, Mutex, MutexGuard};

use crate::callback::{ErrorKind, SubtitleCallbacks, VideoClock};
use crate::compose;
use crate::display::{DisplayQueue, PassOutcome};
use crate::error::{DecoderError, Result};
use crate::handlers;
use crate::state::{DecodeModel, DisplayDefinition};

/// Scheduler wake-up interval between nudges.
const SCHEDULER_TICK: Duration = Duration::from_millis(50);

#[derive(Default)]
struct Shared {
    model: DecodeModel,
    queue: DisplayQueue,
    /// PTS of the previously submitted packet.
    last_pts: Option<u64>,
    stopping: bool,
}

/// A DVB subtitle decoder bound to one composition/ancillary page pair.
pub struct DvbSubDecoder {
    composition_page_id: u16,
    ancillary_page_id: u16,
    callbacks: Arc<dyn SubtitleCallbacks>,
    clock: Arc<dyn VideoClock>,
    shared: Arc<(Mutex<Shared>, Condvar)>,
    worker: Option<JoinHandle<()>>,
}

impl DvbSubDecoder {
    /// Create a decoder for the given page ids. Segments addressed to any
    /// other page are ignored.
    pub fn new(
        composition_page_id: u16,
        ancillary_page_id: u16,
        callbacks: Arc<dyn SubtitleCallbacks>,
        clock: Arc<dyn VideoClock>,
    ) -> Self {
        Self {
            composition_page_id,
            ancillary_page_id,
            callbacks,
            clock,
            shared: Arc::new((Mutex::new(Shared::default()), Condvar::new())),
            worker: None,
        }
    }

    /// Start the scheduler thread.
    pub fn start(&mut self) -> Result<()> {
        if self.worker.is_some() {
            return Err(DecoderError::AlreadyStarted);
        }
        self.shared.0.lock().stopping = false;
        let shared = Arc::clone(&self.shared);
        let callbacks = Arc::clone(&self.callbacks);
        let clock = Arc::clone(&self.clock);
        self.worker = Some(
            std::thread::Builder::new()
                .name("dvbsub-scheduler".into())
                .spawn(move || scheduler_loop(shared, callbacks, clock))
                .map_err(|_| DecoderError::InvalidParameter("cannot spawn scheduler thread"))?,
        );
        Ok(())
    }

    /// Stop the scheduler thread and wait for it to exit. Idempotent.
    pub fn stop(&mut self) {
        let Some(worker) = self.worker.take() else {
            return;
        };
        {
            let (mutex, condvar) = &*self.shared;
            mutex.lock().stopping = true;
            condvar.notify_all();
        }
        // Joined outside the lock so the thread can finish its pass.
        let _ = worker.join();
    }

    /// Decode one PES packet worth of subtitle segments.
    ///
    /// Segment-level corruption is reported through the callbacks and
    /// skipped; only an unusable PES envelope is returned as an error.
    pub fn submit_packet(&self, packet: &[u8]) -> Result<()> {
        if packet.is_empty() {
            return Err(DecoderError::InvalidParameter("packet is empty"));
        }
        let pes = PesPacket::parse(packet)?;
        let mut reader = SegmentReader::new(pes.payload)?;

        let (mutex, condvar) = &*self.shared;
        let mut queued_picture = false;
        let mut invalid_segments = 0u32;
        {
            let mut shared = mutex.lock();

            // The display definition is only trusted within one timestamp.
            if shared.last_pts != Some(pes.pts) {
                shared.model.display = DisplayDefinition::default();
                shared.last_pts = Some(pes.pts);
            }
            shared.model.pts = pes.pts;
            shared.model.page_dirty = false;

            loop {
                let segment = match reader.next_segment() {
                    Ok(Some(segment)) => segment,
                    Ok(None) => break,
                    Err(error) => {
                        warn!("[decoder] segment stream cut short: {}", error);
                        invalid_segments += 1;
                        break;
                    }
                };
                let page_id = segment.header.page_id;
                if page_id != self.composition_page_id && page_id != self.ancillary_page_id {
                    continue;
                }
                // The ancillary page may only refine an existing page.
                if segment.header.segment_type == SegmentType::PageComposition
                    && page_id != self.composition_page_id
                {
                    debug!("[decoder] page composition on ancillary page {}", page_id);
                    continue;
                }

                let model = &mut shared.model;
                let handled = match segment.header.segment_type {
                    SegmentType::PageComposition => {
                        handlers::handle_page_composition(model, page_id, segment.body)
                    }
                    SegmentType::RegionComposition => {
                        handlers::handle_region_composition(model, segment.body)
                    }
                    SegmentType::ClutDefinition => {
                        handlers::handle_clut_definition(model, segment.body)
                    }
                    SegmentType::ObjectData => handlers::handle_object_data(model, segment.body),
                    SegmentType::DisplayDefinition => {
                        handlers::handle_display_definition(model, segment.body)
                    }
                    SegmentType::EndOfDisplay | SegmentType::Stuffing => Ok(()),
                    SegmentType::Unknown(code) => {
                        debug!("[decoder] ignoring unknown segment type 0x{:02X}", code);
                        Ok(())
                    }
                };
                if let Err(error) = handled {
                    warn!(
                        "[decoder] dropped {:?} segment: {}",
                        segment.header.segment_type, error
                    );
                    invalid_segments += 1;
                }
            }

            if !reader.end_marker_present() {
                debug!("[decoder] end marker missing after segment run");
            }

            if shared.model.page_dirty {
                if let Some(picture) = compose::compose(&shared.model) {
                    shared.queue.push(Arc::new(picture));
                    queued_picture = true;
                }
            }
        }

        for _ in 0..invalid_segments {
            self.callbacks.report_error(ErrorKind::InvalidData);
        }
        if queued_picture {
            self.callbacks.picture_available();
            condvar.notify_all();
        }
        Ok(())
    }
}

impl Drop for DvbSubDecoder {
    fn drop(&mut self) {
        self.stop();
    }
}

fn scheduler_loop(
    shared: Arc<(Mutex<Shared>, Condvar)>,
    callbacks: Arc<dyn SubtitleCallbacks>,
    clock: Arc<dyn VideoClock>,
) {
    let (mutex, condvar) = &*shared;
    let mut guard = mutex.lock();
    loop {
        if guard.stopping {
            return;
        }

        let mut outcome = PassOutcome::default();
        if let Some(candidate) = guard.queue.candidate() {
            let mut now = 0;
            MutexGuard::unlocked(&mut guard, || {
                now = clock.current_video_clock(candidate.pts);
            });
            if guard.stopping {
                return;
            }
            // Submission may have changed the queue while the clock was
            // being read; only advance against the same candidate.
            let unchanged = guard
                .queue
                .candidate()
                .is_some_and(|current| Arc::ptr_eq(&current, &candidate));
            if unchanged {
                outcome = guard.queue.advance(now);
            }
        }

        if outcome.show.is_some() || outcome.time_errors > 0 {
            MutexGuard::unlocked(&mut guard, || {
                for _ in 0..outcome.time_errors {
                    callbacks.report_error(ErrorKind::Time);
                }
                if let Some(picture) = outcome.show {
                    callbacks.show(picture);
                }
            });
            if guard.stopping {
                return;
            }
        }

        condvar.wait_for(&mut guard, SCHEDULER_TICK);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compose::{Picture, RegionContent};
    use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

    #[derive(Default)]
    struct Recorder {
        shows: Mutex<Vec<Option<Arc<Picture>>>>,
        invalid_data: AtomicUsize,
        time_errors: AtomicUsize,
        available: AtomicUsize,
    }

    impl SubtitleCallbacks for Recorder {
        fn show(&self, picture: Option<Arc<Picture>>) {
            self.shows.lock().push(picture);
        }

        fn report_error(&self, kind: ErrorKind) {
            match kind {
                ErrorKind::InvalidData => self.invalid_data.fetch_add(1, Ordering::SeqCst),
                ErrorKind::Time => self.time_errors.fetch_add(1, Ordering::SeqCst),
            };
        }

        fn picture_available(&self) {
            self.available.fetch_add(1, Ordering::SeqCst);
        }
    }

    /// A clock the test sets explicitly.
    #[derive(Default)]
    struct SettableClock(AtomicU64);

    impl VideoClock for SettableClock {
        fn current_video_clock(&self, _candidate_pts: u64) -> u64 {
            self.0.load(Ordering::SeqCst)
        }
    }

    fn build_pes(pts: u64, payload: &[u8]) -> Vec<u8> {
        let mut out = vec![0x00, 0x00, 0x01, 0xBD];
        let packet_length = 3 + 5 + payload.len();
        out.extend_from_slice(&(packet_length as u16).to_be_bytes());
        out.push(0x80);
        out.push(0x80);
        out.push(5);
        out.push(0b0010_0001 | ((pts >> 30) as u8 & 0x07) << 1);
        out.push((pts >> 22) as u8);
        out.push(((pts >> 15) as u8 & 0x7F) << 1 | 1);
        out.push((pts >> 7) as u8);
        out.push((pts as u8 & 0x7F) << 1 | 1);
        out.extend_from_slice(payload);
        out
    }

    fn payload_with(segments: &[(u8, u16, Vec<u8>)]) -> Vec<u8> {
        let mut out = vec![0x20, 0x00];
        for (segment_type, page_id, body) in segments {
            out.push(0x0F);
            out.push(*segment_type);
            out.extend_from_slice(&page_id.to_be_bytes());
            out.extend_from_slice(&(body.len() as u16).to_be_bytes());
            out.extend_from_slice(body);
        }
        out.push(0xFF);
        out
    }

    fn page_body(timeout: u8, version: u8, state: u8, regions: &[(u8, u16, u16)]) -> Vec<u8> {
        let mut body = vec![timeout, (version << 4) | (state << 2)];
        for (id, left, top) in regions {
            body.push(*id);
            body.push(0);
            body.extend_from_slice(&left.to_be_bytes());
            body.extend_from_slice(&top.to_be_bytes());
        }
        body
    }

    fn region_body(id: u8, version: u8, width: u16, height: u16, object_id: u16) -> Vec<u8> {
        let mut body = vec![id, (version << 4) | 0x08]; // fill flag set
        body.extend_from_slice(&width.to_be_bytes());
        body.extend_from_slice(&height.to_be_bytes());
        body.push(3 << 2); // 8-bit depth
        body.push(0); // CLUT 0
        body.extend_from_slice(&[0, 0]); // background indices
        body.extend_from_slice(&object_id.to_be_bytes());
        body.extend_from_slice(&[0, 0, 0, 0]); // bitmap at (0, 0)
        body
    }

    /// Object body painting one row of single 8-bit pixels per field.
    fn object_body(object_id: u16, row: &[u8]) -> Vec<u8> {
        let mut field = vec![0x12];
        field.extend_from_slice(row);
        field.extend_from_slice(&[0x00, 0x00]);
        let mut body = Vec::new();
        body.extend_from_slice(&object_id.to_be_bytes());
        body.push(0);
        body.extend_from_slice(&(field.len() as u16).to_be_bytes());
        body.extend_from_slice(&0u16.to_be_bytes());
        body.extend_from_slice(&field);
        body
    }

    fn display_set(pts: u64, page_id: u16, page_version: u8) -> Vec<u8> {
        let payload = payload_with(&[
            (0x10, page_id, page_body(10, page_version, 0x01, &[(1, 8, 16)])),
            (0x11, page_id, region_body(1, page_version, 4, 2, 7)),
            (0x12, page_id, vec![0, 0x00]), // CLUT 0 at the defaults
            (0x13, page_id, object_body(7, &[1, 2, 3, 4])),
            (0x80, page_id, Vec::new()),
        ]);
        build_pes(pts, &payload)
    }

    fn decoder_with(
        composition: u16,
        ancillary: u16,
    ) -> (DvbSubDecoder, Arc<Recorder>, Arc<SettableClock>) {
        let recorder = Arc::new(Recorder::default());
        let clock = Arc::new(SettableClock::default());
        let decoder = DvbSubDecoder::new(
            composition,
            ancillary,
            recorder.clone() as Arc<dyn SubtitleCallbacks>,
            clock.clone() as Arc<dyn VideoClock>,
        );
        (decoder, recorder, clock)
    }

    fn wait_for<F: Fn() -> bool>(predicate: F) {
        for _ in 0..100 {
            if predicate() {
                return;
            }
            std::thread::sleep(Duration::from_millis(20));
        }
        panic!("condition not reached in time");
    }

    #[test]
    fn test_display_set_composes_one_picture() {
        let (decoder, recorder, _clock) = decoder_with(1, 1);
        decoder.submit_packet(&display_set(9_000, 1, 0)).unwrap();
        assert_eq!(recorder.available.load(Ordering::SeqCst), 1);
        assert_eq!(recorder.invalid_data.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_resubmission_is_idempotent() {
        let (decoder, recorder, _clock) = decoder_with(1, 1);
        let packet = display_set(9_000, 1, 0);
        decoder.submit_packet(&packet).unwrap();
        decoder.submit_packet(&packet).unwrap();
        // Same versions throughout: nothing is recomposed.
        assert_eq!(recorder.available.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_foreign_page_id_is_ignored() {
        let (decoder, recorder, _clock) = decoder_with(1, 1);
        decoder.submit_packet(&display_set(9_000, 42, 0)).unwrap();
        assert_eq!(recorder.available.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_page_composition_on_ancillary_page_is_ignored() {
        let (decoder, recorder, _clock) = decoder_with(1, 2);
        // A full display set addressed to the ancillary page id: the page
        // composition must not take, so nothing composes.
        decoder.submit_packet(&display_set(9_000, 2, 0)).unwrap();
        assert_eq!(recorder.available.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_corrupt_segment_is_reported_and_skipped() {
        let (decoder, recorder, _clock) = decoder_with(1, 1);
        let payload = payload_with(&[
            (0x11, 1, vec![0x01, 0x00]), // undersized region body
            (0x10, 1, page_body(10, 0, 0x01, &[])),
        ]);
        decoder.submit_packet(&build_pes(9_000, &payload)).unwrap();
        assert_eq!(recorder.invalid_data.load(Ordering::SeqCst), 1);
        // The page composition behind the bad segment still applied.
        assert_eq!(recorder.available.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_rejects_unusable_envelope() {
        let (decoder, _recorder, _clock) = decoder_with(1, 1);
        assert!(decoder.submit_packet(&[]).is_err());
        assert!(decoder.submit_packet(&[0x47; 20]).is_err());
    }

    #[test]
    fn test_scheduler_shows_and_evicts() {
        let (mut decoder, recorder, clock) = decoder_with(1, 1);
        decoder.start().unwrap();
        assert!(matches!(decoder.start(), Err(DecoderError::AlreadyStarted)));

        let pts = 90_000;
        decoder.submit_packet(&display_set(pts, 1, 0)).unwrap();

        // Not shown while the clock sits before the timestamp.
        clock.0.store(pts - 1_000, Ordering::SeqCst);
        std::thread::sleep(Duration::from_millis(150));
        assert!(recorder.shows.lock().is_empty());

        clock.0.store(pts, Ordering::SeqCst);
        wait_for(|| !recorder.shows.lock().is_empty());
        {
            let shows = recorder.shows.lock();
            let picture = shows[0].as_ref().expect("picture shown");
            assert_eq!(picture.pts, pts);
            assert_eq!(picture.regions.len(), 1);
            match &picture.regions[0].content {
                RegionContent::Bitmap { pixels, .. } => {
                    assert_eq!(&pixels[..4], &[1, 2, 3, 4]);
                    // Bottom field duplicated from the top field.
                    assert_eq!(&pixels[4..8], &[1, 2, 3, 4]);
                }
                RegionContent::Text { .. } => panic!("expected bitmap content"),
            }
        }

        // Push the clock past the 10 second timeout: display cleared.
        clock.0.store(pts + 11 * 90_000, Ordering::SeqCst);
        wait_for(|| recorder.shows.lock().len() == 2);
        assert!(recorder.shows.lock()[1].is_none());

        decoder.stop();
        decoder.stop(); // idempotent
    }

    #[test]
    fn test_display_definition_resets_between_timestamps() {
        let (decoder, _recorder, _clock) = decoder_with(1, 1);

        // Display definition plus a display set at one timestamp.
        let mut definition = vec![0x00]; // version 0, not windowed
        definition.extend_from_slice(&1919u16.to_be_bytes());
        definition.extend_from_slice(&1079u16.to_be_bytes());
        let mut segments = vec![(0x14u8, 1u16, definition)];
        segments.push((0x10, 1, page_body(10, 0, 0x01, &[(1, 0, 0)])));
        segments.push((0x11, 1, region_body(1, 0, 4, 2, 7)));
        decoder
            .submit_packet(&build_pes(1_000, &payload_with(&segments)))
            .unwrap();

        // A later timestamp without a display definition falls back to SD.
        let payload = payload_with(&[(0x10, 1, page_body(10, 1, 0x00, &[(1, 0, 0)]))]);
        decoder.submit_packet(&build_pes(2_000, &payload)).unwrap();

        let shared = decoder.shared.0.lock();
        assert_eq!(shared.queue.pending_len(), 2);
        let first = shared.queue.candidate().unwrap();
        assert_eq!(first.display_width, 1920);
        drop(shared);
    }
}
