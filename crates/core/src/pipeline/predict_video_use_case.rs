use std::num::NonZeroUsize;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use ndarray::{Array3, Axis};

use crate::classification::domain::face_classifier::FaceClassifier;
use crate::classification::domain::face_preprocessor::FacePreprocessor;
use crate::classification::domain::score_aggregator::{self, AggregateResult};
use crate::detection::domain::face_locator::FaceLocator;
use crate::detection::domain::face_selection::SelectionPolicy;
use crate::pipeline::pipeline_logger::PipelineLogger;
use crate::shared::error::PipelineError;
use crate::shared::video_metadata::VideoMetadata;
use crate::video::domain::frame_sampler::{FrameSample, FrameSampler};
use crate::video::domain::video_error::VideoError;
use crate::video::domain::video_reader::VideoReader;

/// Sampled frames buffered between the decoder thread and face extraction.
const SAMPLE_QUEUE_CAPACITY: usize = 8;

/// Scores one video file: sample frames, find one face per frame, classify
/// the faces as a single batch and aggregate the scores.
///
/// Decoding runs on a scoped worker thread and feeds extraction through a
/// bounded channel, so detection overlaps with decoding. The reader is owned
/// per run; the locator and classifier are shared between runs.
pub struct PredictVideoUseCase {
    reader: Box<dyn VideoReader>,
    locator: Arc<dyn FaceLocator>,
    classifier: Arc<dyn FaceClassifier>,
    preprocessor: FacePreprocessor,
    selection: SelectionPolicy,
    logger: Box<dyn PipelineLogger>,
}

/// Faces extracted from the sampled frames, in sampled-frame order.
struct ExtractedFaces {
    faces: Vec<Array3<f32>>,
    frames_sampled: usize,
    locate_time: Duration,
    preprocess_time: Duration,
}

impl PredictVideoUseCase {
    pub fn new(
        reader: Box<dyn VideoReader>,
        locator: Arc<dyn FaceLocator>,
        classifier: Arc<dyn FaceClassifier>,
        preprocessor: FacePreprocessor,
        selection: SelectionPolicy,
        logger: Box<dyn PipelineLogger>,
    ) -> Self {
        Self {
            reader,
            locator,
            classifier,
            preprocessor,
            selection,
            logger,
        }
    }

    /// Runs the full pipeline on the video at `video_path`.
    ///
    /// The reader is always closed before returning, whatever the outcome.
    pub fn execute(
        &mut self,
        video_path: &Path,
        frames_per_video: NonZeroUsize,
    ) -> Result<AggregateResult, PipelineError> {
        let metadata = self.reader.open(video_path)?;
        self.logger.info(&format!(
            "opened {}x{} video, {} frames, sampling {frames_per_video}",
            metadata.width, metadata.height, metadata.total_frames
        ));

        let result = self.run(&metadata, FrameSampler::new(frames_per_video));
        self.reader.close();
        self.logger.summary();
        result
    }

    fn run(
        &mut self,
        metadata: &VideoMetadata,
        sampler: FrameSampler,
    ) -> Result<AggregateResult, PipelineError> {
        let extracted = self.extract(metadata, sampler)?;
        self.logger
            .metric("frames_sampled", extracted.frames_sampled as f64);
        self.logger
            .metric("faces_selected", extracted.faces.len() as f64);
        self.logger.timing("locate", ms(extracted.locate_time));
        self.logger
            .timing("preprocess", ms(extracted.preprocess_time));

        if extracted.frames_sampled == 0 {
            return Err(VideoError::NoFrames.into());
        }
        if extracted.faces.is_empty() {
            return Err(PipelineError::no_faces());
        }

        let views: Vec<_> = extracted.faces.iter().map(|f| f.view()).collect();
        let batch = ndarray::stack(Axis(0), &views)
            .map_err(|e| PipelineError::Extraction(format!("cannot batch faces: {e}")))?;
        let face_count = views.len();

        let started = Instant::now();
        let raw_scores = self.classifier.classify(batch)?;
        self.logger.timing("classify", ms(started.elapsed()));

        if raw_scores.len() != face_count {
            return Err(PipelineError::Model(format!(
                "classifier returned {} scores for {face_count} faces",
                raw_scores.len()
            )));
        }

        score_aggregator::aggregate(&raw_scores)
    }

    /// Decodes sampled frames on a worker thread while the caller's thread
    /// locates, selects and prepares faces.
    fn extract(
        &mut self,
        metadata: &VideoMetadata,
        sampler: FrameSampler,
    ) -> Result<ExtractedFaces, PipelineError> {
        let Self {
            reader,
            locator,
            preprocessor,
            selection,
            logger,
            ..
        } = self;
        let (sample_tx, sample_rx) =
            crossbeam_channel::bounded::<Result<FrameSample, VideoError>>(SAMPLE_QUEUE_CAPACITY);

        std::thread::scope(|scope| -> Result<ExtractedFaces, PipelineError> {
            let decoder = scope.spawn(move || {
                let started = Instant::now();
                for sample in sampler.sample(reader.as_mut(), metadata) {
                    // Receiver gone means extraction already failed.
                    if sample_tx.send(sample).is_err() {
                        break;
                    }
                }
                started.elapsed()
            });

            let extracted = extract_faces(sample_rx, &**locator, preprocessor, *selection);

            let decode_time = decoder
                .join()
                .map_err(|_| PipelineError::Decode(VideoError::DecoderPanicked))?;
            logger.timing("sample", ms(decode_time));
            extracted
        })
    }
}

/// Consumes sampled frames in order and keeps one prepared face per frame
/// that has at least one detection.
fn extract_faces(
    samples: crossbeam_channel::Receiver<Result<FrameSample, VideoError>>,
    locator: &dyn FaceLocator,
    preprocessor: &FacePreprocessor,
    selection: SelectionPolicy,
) -> Result<ExtractedFaces, PipelineError> {
    let mut extracted = ExtractedFaces {
        faces: Vec::new(),
        frames_sampled: 0,
        locate_time: Duration::ZERO,
        preprocess_time: Duration::ZERO,
    };

    for sample in samples {
        let FrameSample { frame, .. } = sample?;
        extracted.frames_sampled += 1;

        let started = Instant::now();
        let candidates = locator.locate(&frame)?;
        extracted.locate_time += started.elapsed();

        let Some(face) = selection.select(&candidates) else {
            continue;
        };
        let started = Instant::now();
        extracted.faces.push(preprocessor.prepare_face(&frame, face));
        extracted.preprocess_time += started.elapsed();
    }

    Ok(extracted)
}

fn ms(duration: Duration) -> f64 {
    duration.as_secs_f64() * 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    use approx::assert_relative_eq;
    use ndarray::Array4;

    use crate::classification::domain::face_classifier::ClassificationError;
    use crate::detection::domain::face_locator::DetectionError;
    use crate::pipeline::pipeline_logger::NullPipelineLogger;
    use crate::shared::face_detection::FaceDetection;
    use crate::shared::frame::Frame;

    const SIZE: u32 = 32;

    // --- Stubs ---

    /// Frame `i` is a solid frame of value `pixels[i]`.
    struct StubReader {
        pixels: Vec<u8>,
        fail_open: bool,
        fail_at: Option<usize>,
        panic_at: Option<usize>,
        closed: Arc<AtomicBool>,
    }

    impl StubReader {
        fn new(pixels: Vec<u8>) -> Self {
            Self {
                pixels,
                fail_open: false,
                fail_at: None,
                panic_at: None,
                closed: Arc::new(AtomicBool::new(false)),
            }
        }
    }

    impl VideoReader for StubReader {
        fn open(&mut self, path: &Path) -> Result<VideoMetadata, VideoError> {
            if self.fail_open {
                return Err(VideoError::Open {
                    path: path.to_path_buf(),
                    reason: "invalid data".into(),
                });
            }
            Ok(VideoMetadata {
                width: SIZE,
                height: SIZE,
                fps: 30.0,
                total_frames: self.pixels.len(),
                codec: "stub".into(),
                source_path: Some(path.to_path_buf()),
            })
        }

        fn frames(&mut self) -> Box<dyn Iterator<Item = Result<Frame, VideoError>> + '_> {
            let (fail_at, panic_at) = (self.fail_at, self.panic_at);
            Box::new(self.pixels.iter().enumerate().map(move |(i, &v)| {
                if Some(i) == panic_at {
                    panic!("decoder crashed at frame {i}");
                }
                if Some(i) == fail_at {
                    return Err(VideoError::Decode {
                        frame: i,
                        reason: "corrupt packet".into(),
                    });
                }
                let data = vec![v; (SIZE * SIZE * 3) as usize];
                Ok(Frame::new(data, SIZE, SIZE, 3, i))
            }))
        }

        fn close(&mut self) {
            self.closed.store(true, Ordering::SeqCst);
        }
    }

    /// Finds one centred face in every frame whose pixel value is non-zero.
    struct StubLocator {
        fail: bool,
    }

    impl FaceLocator for StubLocator {
        fn locate(&self, frame: &Frame) -> Result<Vec<FaceDetection>, DetectionError> {
            if self.fail {
                return Err(DetectionError::Runtime("session failed".into()));
            }
            if frame.data()[0] == 0 {
                return Ok(Vec::new());
            }
            Ok(vec![FaceDetection {
                x: 8.0,
                y: 8.0,
                width: 16.0,
                height: 16.0,
                confidence: 0.9,
            }])
        }
    }

    /// Scores each face by the mean of its tensor, optionally dropping one.
    struct StubClassifier {
        drop_last: bool,
        batches: Mutex<Vec<usize>>,
    }

    impl StubClassifier {
        fn new() -> Self {
            Self {
                drop_last: false,
                batches: Mutex::new(Vec::new()),
            }
        }
    }

    impl FaceClassifier for StubClassifier {
        fn classify(&self, batch: Array4<f32>) -> Result<Vec<f32>, ClassificationError> {
            self.batches.lock().unwrap().push(batch.shape()[0]);
            let mut scores: Vec<f32> = batch
                .axis_iter(Axis(0))
                .map(|face| face.mean().unwrap_or(0.0))
                .collect();
            if self.drop_last {
                scores.pop();
            }
            Ok(scores)
        }
    }

    struct FailingClassifier;

    impl FaceClassifier for FailingClassifier {
        fn classify(&self, _batch: Array4<f32>) -> Result<Vec<f32>, ClassificationError> {
            Err(ClassificationError::LockPoisoned)
        }
    }

    fn use_case(
        reader: StubReader,
        locator: StubLocator,
        classifier: Arc<dyn FaceClassifier>,
    ) -> PredictVideoUseCase {
        PredictVideoUseCase::new(
            Box::new(reader),
            Arc::new(locator),
            classifier,
            FacePreprocessor::new(16),
            SelectionPolicy::First,
            Box::new(NullPipelineLogger),
        )
    }

    fn frames(n: usize) -> NonZeroUsize {
        NonZeroUsize::new(n).unwrap()
    }

    fn path() -> &'static Path {
        Path::new("/tmp/clip.mp4")
    }

    // --- Tests ---

    #[test]
    fn test_scores_one_face_per_frame_with_detection() {
        let pixels = vec![10, 20, 0, 30, 40, 0, 50, 60, 70, 80];
        let classifier = Arc::new(StubClassifier::new());
        let mut uc = use_case(
            StubReader::new(pixels),
            StubLocator { fail: false },
            classifier.clone(),
        );

        let result = uc.execute(path(), frames(10)).unwrap();

        assert_eq!(result.pred_scores.len(), 8);
        assert_eq!(*classifier.batches.lock().unwrap(), vec![8]);
        assert!(result.pred_scores.iter().all(|&s| (0.0..=1.0).contains(&s)));
        let mean = result.pred_scores.iter().sum::<f64>() / 8.0;
        assert_relative_eq!(result.mean_score, mean, epsilon = 1e-12);
    }

    #[test]
    fn test_scores_follow_sampled_frame_order() {
        // Brighter faces normalize higher, so scores rise with frame order.
        let pixels = vec![20, 60, 100, 140, 180];
        let mut uc = use_case(
            StubReader::new(pixels),
            StubLocator { fail: false },
            Arc::new(StubClassifier::new()),
        );

        let result = uc.execute(path(), frames(5)).unwrap();

        assert_eq!(result.pred_scores.len(), 5);
        assert!(result.pred_scores.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_samples_at_most_requested_frames() {
        let classifier = Arc::new(StubClassifier::new());
        let mut uc = use_case(
            StubReader::new(vec![90; 50]),
            StubLocator { fail: false },
            classifier.clone(),
        );

        let result = uc.execute(path(), frames(4)).unwrap();

        assert_eq!(result.pred_scores.len(), 4);
        assert_eq!(*classifier.batches.lock().unwrap(), vec![4]);
    }

    #[test]
    fn test_is_deterministic() {
        let pixels = vec![5, 0, 90, 200, 33, 0, 17];
        let run = || {
            use_case(
                StubReader::new(pixels.clone()),
                StubLocator { fail: false },
                Arc::new(StubClassifier::new()),
            )
            .execute(path(), frames(7))
            .unwrap()
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn test_no_faces_is_extraction_error() {
        let classifier = Arc::new(StubClassifier::new());
        let mut uc = use_case(
            StubReader::new(vec![0; 6]),
            StubLocator { fail: false },
            classifier.clone(),
        );

        let err = uc.execute(path(), frames(6)).unwrap_err();

        assert_eq!(err.kind(), "extraction");
        assert!(err.to_string().contains("no face"));
        assert!(classifier.batches.lock().unwrap().is_empty());
    }

    #[test]
    fn test_open_failure_is_decode_error() {
        let mut reader = StubReader::new(vec![1; 3]);
        reader.fail_open = true;
        let mut uc = use_case(
            reader,
            StubLocator { fail: false },
            Arc::new(StubClassifier::new()),
        );

        let err = uc.execute(path(), frames(3)).unwrap_err();
        assert!(matches!(err, PipelineError::Decode(VideoError::Open { .. })));
    }

    #[test]
    fn test_empty_video_is_decode_error() {
        let mut uc = use_case(
            StubReader::new(Vec::new()),
            StubLocator { fail: false },
            Arc::new(StubClassifier::new()),
        );

        let err = uc.execute(path(), frames(3)).unwrap_err();
        assert!(matches!(err, PipelineError::Decode(VideoError::NoFrames)));
    }

    #[test]
    fn test_mid_stream_decode_failure_aborts_and_closes_reader() {
        let mut reader = StubReader::new(vec![50; 10]);
        reader.fail_at = Some(4);
        let closed = reader.closed.clone();
        let mut uc = use_case(
            reader,
            StubLocator { fail: false },
            Arc::new(StubClassifier::new()),
        );

        let err = uc.execute(path(), frames(10)).unwrap_err();

        assert!(matches!(
            err,
            PipelineError::Decode(VideoError::Decode { frame: 4, .. })
        ));
        assert!(closed.load(Ordering::SeqCst));
    }

    #[test]
    fn test_decoder_panic_is_decode_error_and_closes_reader() {
        let mut reader = StubReader::new(vec![50; 10]);
        reader.panic_at = Some(3);
        let closed = reader.closed.clone();
        let classifier = Arc::new(StubClassifier::new());
        let mut uc = use_case(reader, StubLocator { fail: false }, classifier.clone());

        let err = uc.execute(path(), frames(10)).unwrap_err();

        assert!(matches!(err, PipelineError::Decode(VideoError::DecoderPanicked)));
        assert_eq!(err.kind(), "decode");
        assert!(closed.load(Ordering::SeqCst));
        assert!(classifier.batches.lock().unwrap().is_empty());
    }

    #[test]
    fn test_locator_failure_is_model_error() {
        let reader = StubReader::new(vec![50; 10]);
        let closed = reader.closed.clone();
        let mut uc = use_case(
            reader,
            StubLocator { fail: true },
            Arc::new(StubClassifier::new()),
        );

        let err = uc.execute(path(), frames(10)).unwrap_err();

        assert_eq!(err.kind(), "model");
        assert!(closed.load(Ordering::SeqCst));
    }

    #[test]
    fn test_classifier_failure_is_model_error() {
        let mut uc = use_case(
            StubReader::new(vec![50; 3]),
            StubLocator { fail: false },
            Arc::new(FailingClassifier),
        );

        assert_eq!(uc.execute(path(), frames(3)).unwrap_err().kind(), "model");
    }

    #[test]
    fn test_score_count_mismatch_is_model_error() {
        let mut classifier = StubClassifier::new();
        classifier.drop_last = true;
        let mut uc = use_case(
            StubReader::new(vec![50; 3]),
            StubLocator { fail: false },
            Arc::new(classifier),
        );

        let err = uc.execute(path(), frames(3)).unwrap_err();
        assert!(matches!(err, PipelineError::Model(msg) if msg.contains("2 scores for 3 faces")));
    }

    #[test]
    fn test_reader_closed_after_success() {
        let reader = StubReader::new(vec![50; 3]);
        let closed = reader.closed.clone();
        let mut uc = use_case(
            reader,
            StubLocator { fail: false },
            Arc::new(StubClassifier::new()),
        );

        uc.execute(path(), frames(3)).unwrap();
        assert!(closed.load(Ordering::SeqCst));
    }
}
