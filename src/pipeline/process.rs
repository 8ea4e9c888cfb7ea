use std::collections::BTreeMap;
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
    mpsc,
};
use std::time::{Duration, Instant};

use rayon::prelude::*;

use crate::{
    foundation::{
        core::FrameIndex,
        error::{DotMatrixError, DotMatrixResult, PipelineError},
    },
    pipeline::{
        frame::Frame,
        sink::{FrameSink, SinkConfig},
        source::{FrameSource, SourceInfo},
    },
    raster::dots::RenderParams,
};

const PROGRESS_INTERVAL: Duration = Duration::from_secs(1);

/// Options controlling how [`process_with`] schedules work.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct PipelineOpts {
    /// Render frames on a worker pool. `false` renders on the calling thread.
    pub parallel: bool,
    /// Override the number of rayon worker threads. `None` uses rayon defaults.
    pub threads: Option<usize>,
    /// Maximum decoded frames read ahead of rendering.
    pub in_flight: usize,
    /// Bounded channel capacity between render workers and the encoder thread.
    pub channel_capacity: usize,
    /// Checked before every frame is pulled from the source.
    #[serde(skip)]
    pub cancel: CancelToken,
}

impl Default for PipelineOpts {
    fn default() -> Self {
        Self {
            parallel: true,
            threads: None,
            in_flight: 16,
            channel_capacity: 4,
            cancel: CancelToken::default(),
        }
    }
}

impl PipelineOpts {
    pub fn sequential() -> Self {
        Self {
            parallel: false,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> DotMatrixResult<()> {
        if let Some(n) = self.threads
            && n == 0
        {
            return Err(DotMatrixError::invalid_params(
                "pipeline 'threads' must be >= 1 when set",
            ));
        }
        Ok(())
    }
}

/// Cooperative stop flag shared between a running job and its controller.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the job to stop before its next frame.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Outcome of a successful video job.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PipelineStats {
    /// Frames rendered and accepted by the sink.
    pub frames_processed: u64,
    /// Frame count the source reported up front, if any.
    pub frames_expected: Option<u64>,
}

/// Dot-render every frame of `source` into `sink` with default [`PipelineOpts`].
pub fn process(
    source: &mut dyn FrameSource,
    sink: &mut dyn FrameSink,
    params: &RenderParams,
) -> Result<PipelineStats, PipelineError> {
    process_with(source, sink, params, &PipelineOpts::default())
}

/// Dot-render every frame of `source` into `sink`.
///
/// Frames reach the sink in source order with their original ordinal and timestamp, whether they
/// were rendered sequentially or on the worker pool. On failure, frames already pushed stay pushed
/// and the error reports how many there were.
#[tracing::instrument(
    skip(source, sink, opts),
    fields(parallel = opts.parallel, threads = ?opts.threads)
)]
pub fn process_with(
    source: &mut dyn FrameSource,
    sink: &mut dyn FrameSink,
    params: &RenderParams,
    opts: &PipelineOpts,
) -> Result<PipelineStats, PipelineError> {
    params
        .validate()
        .map_err(|e| PipelineError::InvalidParams(e.to_string()))?;
    opts.validate()
        .map_err(|e| PipelineError::InvalidParams(e.to_string()))?;

    let info = source.info();
    let cfg = SinkConfig {
        width: info.width,
        height: info.height,
        layout: info.layout,
        fps: info.fps,
    };
    tracing::info!(
        width = info.width,
        height = info.height,
        fps = info.fps.as_f64(),
        frames = ?info.frame_count,
        "starting video job"
    );

    sink.begin(cfg).map_err(|e| PipelineError::EncodeFailed {
        position: 0,
        frames_written: 0,
        reason: e.to_string(),
    })?;

    let started = Instant::now();
    let mut reader = FrameReader::new(source, info, &opts.cancel);
    let progress = Progress::new(info.frame_count);
    let res = if opts.parallel {
        run_parallel(&mut reader, sink, params, opts, progress)
    } else {
        run_sequential(&mut reader, sink, params, progress)
    };

    match res {
        Ok(frames_processed) => {
            if let Some(expected) = info.frame_count
                && expected != frames_processed
            {
                tracing::warn!(
                    expected,
                    processed = frames_processed,
                    "source frame count differs from frames processed"
                );
            }
            tracing::info!(
                frames = frames_processed,
                elapsed_secs = started.elapsed().as_secs_f64(),
                "video job finished"
            );
            Ok(PipelineStats {
                frames_processed,
                frames_expected: info.frame_count,
            })
        }
        Err(e) => {
            tracing::warn!(
                frames_written = e.frames_written(),
                error = %e,
                "video job stopped; sink holds a partial output"
            );
            Err(e)
        }
    }
}

fn run_sequential(
    reader: &mut FrameReader<'_>,
    sink: &mut dyn FrameSink,
    params: &RenderParams,
    mut progress: Progress,
) -> Result<u64, PipelineError> {
    let mut written = 0u64;
    loop {
        let frame = match reader.pull() {
            Ok(Some(frame)) => frame,
            Ok(None) => break,
            Err(e) => {
                finish_partial(sink);
                return Err(e.with_frames_written(written));
            }
        };
        let position = reader.position - 1;

        let out = match frame.render_dots(params) {
            Ok(out) => out,
            Err(e) => {
                finish_partial(sink);
                return Err(render_failed(position, &e).with_frames_written(written));
            }
        };

        sink.push_frame(&out)
            .map_err(|e| PipelineError::EncodeFailed {
                position,
                frames_written: written,
                reason: e.to_string(),
            })?;
        written += 1;
        progress.tick(written);
    }

    finish(sink, written)?;
    Ok(written)
}

fn run_parallel(
    reader: &mut FrameReader<'_>,
    sink: &mut dyn FrameSink,
    params: &RenderParams,
    opts: &PipelineOpts,
    progress: Progress,
) -> Result<u64, PipelineError> {
    let pool = build_thread_pool(opts.threads)?;
    let window = opts.in_flight.max(1);
    let cap = opts.channel_capacity.max(1);

    // Encoder thread: owns the sink and restores source order regardless of render completion
    // order.
    let stopped_early = AtomicBool::new(false);
    std::thread::scope(|scope| -> Result<u64, PipelineError> {
        let (tx, rx) = mpsc::sync_channel::<FrameMsg>(cap);
        let stopped_early = &stopped_early;
        let enc = scope.spawn(move || encode_in_order(sink, rx, progress, stopped_early));

        let mut stop = None;
        let mut exhausted = false;
        while !exhausted && stop.is_none() {
            let mut batch = Vec::with_capacity(window);
            while batch.len() < window {
                match reader.pull() {
                    Ok(Some(frame)) => batch.push(FrameMsg {
                        seq: reader.position - 1,
                        frame,
                    }),
                    Ok(None) => {
                        exhausted = true;
                        break;
                    }
                    Err(e) => {
                        stop = Some(e);
                        break;
                    }
                }
            }
            if batch.is_empty() {
                break;
            }
            // A render failure sits earlier in the stream than a pending decode failure.
            if let Err(e) = render_batch(&pool, batch, params, &tx) {
                stop = Some(e);
            }
        }

        if stop.is_some() {
            stopped_early.store(true, Ordering::Release);
        }
        drop(tx);
        let written = enc
            .join()
            .map_err(|_| PipelineError::EncodeFailed {
                position: reader.position,
                frames_written: 0,
                reason: "encoder thread panicked; frames written unknown".to_owned(),
            })??;

        match stop {
            Some(e) => Err(e.with_frames_written(written)),
            None => Ok(written),
        }
    })
}

fn render_batch(
    pool: &rayon::ThreadPool,
    batch: Vec<FrameMsg>,
    params: &RenderParams,
    tx: &mpsc::SyncSender<FrameMsg>,
) -> Result<(), PipelineError> {
    pool.install(|| {
        batch
            .into_par_iter()
            .try_for_each_with(tx.clone(), |tx, msg| -> Result<(), PipelineError> {
                let frame = msg
                    .frame
                    .render_dots(params)
                    .map_err(|e| render_failed(msg.seq, &e))?;
                tx.send(FrameMsg {
                    seq: msg.seq,
                    frame,
                })
                .map_err(|_| PipelineError::EncodeFailed {
                    position: msg.seq,
                    frames_written: 0,
                    reason: "encoder thread is not accepting frames".to_owned(),
                })
            })
    })
}

/// Pushes frames in sequence order until the channel closes, then ends the sink.
///
/// `stopped_early` is set before the channel closes when the producer hit a decode, render or
/// cancel stop; the sink is then finalized as a partial output and the producer's error wins.
fn encode_in_order(
    sink: &mut dyn FrameSink,
    rx: mpsc::Receiver<FrameMsg>,
    mut progress: Progress,
    stopped_early: &AtomicBool,
) -> Result<u64, PipelineError> {
    let mut next = 0u64;
    let mut pending = BTreeMap::<u64, Frame>::new();

    for msg in rx {
        pending.insert(msg.seq, msg.frame);
        while let Some(frame) = pending.remove(&next) {
            sink.push_frame(&frame)
                .map_err(|e| PipelineError::EncodeFailed {
                    position: next,
                    frames_written: next,
                    reason: e.to_string(),
                })?;
            next += 1;
            progress.tick(next);
        }
    }

    // Only non-empty when a render failure left a gap in the sequence.
    if !pending.is_empty() {
        tracing::warn!(
            discarded = pending.len(),
            "discarding rendered frames after a gap in the stream"
        );
    }

    if stopped_early.load(Ordering::Acquire) {
        finish_partial(sink);
    } else {
        finish(sink, next)?;
    }
    Ok(next)
}

fn finish(sink: &mut dyn FrameSink, written: u64) -> Result<(), PipelineError> {
    sink.end().map_err(|e| PipelineError::EncodeFailed {
        position: written,
        frames_written: written,
        reason: e.to_string(),
    })
}

/// Finalize a sink after an early stop so the frames it already holds stay usable.
fn finish_partial(sink: &mut dyn FrameSink) {
    if let Err(e) = sink.end() {
        tracing::warn!(error = %e, "failed to finalize sink after early stop");
    }
}

fn render_failed(position: u64, e: &DotMatrixError) -> PipelineError {
    PipelineError::Render {
        position,
        frames_written: 0,
        reason: e.to_string(),
    }
}

#[derive(Debug)]
struct FrameMsg {
    /// Position in the source stream; the reorder key.
    seq: u64,
    frame: Frame,
}

/// Pulls frames and rejects ones that break the stream contract.
struct FrameReader<'a> {
    source: &'a mut dyn FrameSource,
    info: SourceInfo,
    cancel: &'a CancelToken,
    /// Frames pulled so far.
    position: u64,
    last_index: Option<FrameIndex>,
}

impl<'a> FrameReader<'a> {
    fn new(source: &'a mut dyn FrameSource, info: SourceInfo, cancel: &'a CancelToken) -> Self {
        Self {
            source,
            info,
            cancel,
            position: 0,
            last_index: None,
        }
    }

    fn pull(&mut self) -> Result<Option<Frame>, PipelineError> {
        if self.cancel.is_cancelled() {
            return Err(PipelineError::Cancelled { frames_written: 0 });
        }

        let frame = match self.source.next_frame() {
            Ok(Some(frame)) => frame,
            Ok(None) => return Ok(None),
            Err(e) => return Err(self.decode_failed(e.to_string())),
        };

        let buf = &frame.buffer;
        if buf.width() != self.info.width
            || buf.height() != self.info.height
            || buf.layout() != self.info.layout
        {
            return Err(self.decode_failed(format!(
                "frame is {}x{} {:?}, stream is {}x{} {:?}",
                buf.width(),
                buf.height(),
                buf.layout(),
                self.info.width,
                self.info.height,
                self.info.layout
            )));
        }
        if let Some(last) = self.last_index
            && frame.index <= last
        {
            return Err(self.decode_failed(format!(
                "frame ordinal {} does not follow {}",
                frame.index.0, last.0
            )));
        }

        tracing::trace!(index = frame.index.0, pts = frame.pts_secs, "frame pulled");
        self.last_index = Some(frame.index);
        self.position += 1;
        Ok(Some(frame))
    }

    fn decode_failed(&self, reason: String) -> PipelineError {
        PipelineError::DecodeFailed {
            position: self.position,
            frames_written: 0,
            reason,
        }
    }
}

/// Throttled progress logging.
struct Progress {
    expected: Option<u64>,
    started: Instant,
    last_report: Instant,
}

impl Progress {
    fn new(expected: Option<u64>) -> Self {
        let now = Instant::now();
        Self {
            expected,
            started: now,
            last_report: now,
        }
    }

    fn tick(&mut self, written: u64) {
        if self.last_report.elapsed() < PROGRESS_INTERVAL {
            return;
        }
        self.last_report = Instant::now();

        let elapsed = self.started.elapsed().as_secs_f64();
        let fps = written as f64 / elapsed.max(f64::EPSILON);
        match self.expected {
            Some(total) if total > 0 => {
                let remaining = total.saturating_sub(written);
                tracing::info!(
                    frames = written,
                    percent = 100.0 * written as f64 / total as f64,
                    fps,
                    eta_secs = remaining as f64 / fps.max(f64::EPSILON),
                    "progress"
                );
            }
            _ => tracing::info!(frames = written, fps, "progress"),
        }
    }
}

fn build_thread_pool(threads: Option<usize>) -> Result<rayon::ThreadPool, PipelineError> {
    let mut builder = rayon::ThreadPoolBuilder::new();
    if let Some(n) = threads {
        builder = builder.num_threads(n);
    }
    builder.build().map_err(|e| {
        PipelineError::InvalidParams(format!("failed to build rayon thread pool: {e}"))
    })
}
