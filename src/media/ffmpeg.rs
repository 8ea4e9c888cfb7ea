use std::io::{Read, Write as _};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::thread::JoinHandle;

use crate::{
    buffer::{ChannelLayout, PixelBuffer},
    foundation::{
        core::{FrameIndex, Fps},
        error::{DotMatrixError, DotMatrixResult},
    },
    pipeline::{
        frame::Frame,
        sink::{FrameSink, SinkConfig},
        source::{FrameSource, SourceInfo},
    },
    raster::dots::RenderParams,
};

/// Stream properties reported by `ffprobe`.
#[derive(Clone, Debug)]
pub struct VideoProbe {
    pub source_path: PathBuf,
    pub width: u32,
    pub height: u32,
    pub fps: Fps,
    /// `nb_frames` of the video stream; containers do not always record it.
    pub frame_count: Option<u64>,
    pub duration_sec: f64,
}

/// Probe the first video stream of `source_path` with `ffprobe`.
pub fn probe_video(source_path: &Path) -> DotMatrixResult<VideoProbe> {
    #[derive(serde::Deserialize)]
    struct ProbeStream {
        codec_type: Option<String>,
        width: Option<u32>,
        height: Option<u32>,
        r_frame_rate: Option<String>,
        nb_frames: Option<String>,
    }
    #[derive(serde::Deserialize)]
    struct ProbeFormat {
        duration: Option<String>,
    }
    #[derive(serde::Deserialize)]
    struct ProbeOut {
        streams: Vec<ProbeStream>,
        format: Option<ProbeFormat>,
    }

    let out = Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-print_format",
            "json",
            "-show_streams",
            "-show_format",
        ])
        .arg(source_path)
        .output()
        .map_err(|e| DotMatrixError::decode(format!("failed to run ffprobe: {e}")))?;
    if !out.status.success() {
        return Err(DotMatrixError::decode(format!(
            "ffprobe failed for '{}': {}",
            source_path.display(),
            String::from_utf8_lossy(&out.stderr).trim()
        )));
    }

    let parsed: ProbeOut = serde_json::from_slice(&out.stdout)
        .map_err(|e| DotMatrixError::decode(format!("ffprobe json parse failed: {e}")))?;
    let video = parsed
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"))
        .ok_or_else(|| DotMatrixError::decode("no video stream found"))?;
    let width = video
        .width
        .ok_or_else(|| DotMatrixError::decode("missing video width from ffprobe"))?;
    let height = video
        .height
        .ok_or_else(|| DotMatrixError::decode("missing video height from ffprobe"))?;
    let fps = Fps::parse_ratio(video.r_frame_rate.as_deref().unwrap_or("0/1"))
        .ok_or_else(|| DotMatrixError::decode("invalid video r_frame_rate"))?;
    let frame_count = video
        .nb_frames
        .as_deref()
        .and_then(|s| s.parse::<u64>().ok());
    let duration_sec = parsed
        .format
        .as_ref()
        .and_then(|f| f.duration.as_ref())
        .and_then(|s| s.parse::<f64>().ok())
        .unwrap_or(0.0);

    Ok(VideoProbe {
        source_path: source_path.to_path_buf(),
        width,
        height,
        fps,
        frame_count,
        duration_sec,
    })
}

/// Options for [`FfmpegSource`].
#[derive(Clone, Debug)]
pub struct FfmpegSourceOpts {
    /// Input video path.
    pub path: PathBuf,
    /// Downscale so the longer side is at most this many pixels.
    pub max_dim: Option<u32>,
}

impl FfmpegSourceOpts {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            max_dim: None,
        }
    }
}

/// Frame source that decodes a video file with the system `ffmpeg` into raw RGB8 frames.
///
/// Output dimensions are rounded down to even numbers so they can be re-encoded as yuv420p.
pub struct FfmpegSource {
    probe: VideoProbe,
    width: u32,
    height: u32,
    downscale: Option<f64>,
    child: Option<Child>,
    stdout: Option<ChildStdout>,
    stderr_drain: Option<JoinHandle<std::io::Result<Vec<u8>>>>,
    next_index: u64,
}

impl FfmpegSource {
    /// Probe `opts.path` and start decoding it.
    pub fn open(opts: FfmpegSourceOpts) -> DotMatrixResult<Self> {
        if !is_ffmpeg_on_path() {
            return Err(DotMatrixError::decode(
                "ffmpeg is required for video decoding, but was not found on PATH",
            ));
        }
        let probe = probe_video(&opts.path)?;
        let (width, height) = decoded_dims(probe.width, probe.height, opts.max_dim);
        if width == 0 || height == 0 {
            return Err(DotMatrixError::decode(format!(
                "video '{}' is too small to decode ({}x{})",
                opts.path.display(),
                probe.width,
                probe.height
            )));
        }

        let mut cmd = Command::new("ffmpeg");
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        cmd.args(["-v", "error", "-i"]).arg(&opts.path).arg("-an");
        if (width, height) != (probe.width, probe.height) {
            cmd.args(["-vf", &format!("scale={width}:{height}")]);
        }
        cmd.args(["-f", "rawvideo", "-pix_fmt", "rgb24", "pipe:1"]);

        tracing::debug!(
            path = %opts.path.display(),
            width,
            height,
            "spawning ffmpeg decoder"
        );
        let mut child = cmd.spawn().map_err(|e| {
            DotMatrixError::decode(format!(
                "failed to spawn ffmpeg (is it installed and on PATH?): {e}"
            ))
        })?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| DotMatrixError::decode("failed to open ffmpeg stdout (unexpected)"))?;
        let stderr_drain = spawn_stderr_drain(&mut child)?;

        Ok(Self {
            downscale: fit_scale(probe.width, probe.height, opts.max_dim),
            probe,
            width,
            height,
            child: Some(child),
            stdout: Some(stdout),
            stderr_drain: Some(stderr_drain),
            next_index: 0,
        })
    }

    pub fn probe(&self) -> &VideoProbe {
        &self.probe
    }

    /// `max_dim / longer side` when `max_dim` shrank the video, `None` otherwise.
    ///
    /// Rounding odd sides down to even is not a downscale.
    pub fn downscale_factor(&self) -> Option<f64> {
        self.downscale
    }

    /// `params` adjusted to this source's decoded size.
    pub fn scaled_params(&self, params: RenderParams) -> RenderParams {
        params_for_scale(params, self.downscale)
    }

    fn frame_len(&self) -> usize {
        self.width as usize * self.height as usize * ChannelLayout::Rgb8.channels()
    }

    fn finish_decoder(&mut self) -> DotMatrixResult<()> {
        drop(self.stdout.take());
        let Some(mut child) = self.child.take() else {
            return Ok(());
        };
        let status = child.wait().map_err(|e| {
            DotMatrixError::decode(format!("failed to wait for ffmpeg decoder: {e}"))
        })?;
        let stderr = join_stderr_drain(self.stderr_drain.take())?;
        if !status.success() {
            return Err(DotMatrixError::decode(format!(
                "ffmpeg decoder exited with status {}: {}",
                status,
                String::from_utf8_lossy(&stderr).trim()
            )));
        }
        Ok(())
    }
}

impl FrameSource for FfmpegSource {
    fn info(&self) -> SourceInfo {
        SourceInfo {
            width: self.width,
            height: self.height,
            layout: ChannelLayout::Rgb8,
            fps: self.probe.fps,
            frame_count: self.probe.frame_count,
        }
    }

    fn next_frame(&mut self) -> DotMatrixResult<Option<Frame>> {
        let frame_len = self.frame_len();
        let Some(stdout) = self.stdout.as_mut() else {
            return Ok(None);
        };

        let mut data = vec![0u8; frame_len];
        let got = read_full(stdout, &mut data)
            .map_err(|e| DotMatrixError::decode(format!("failed to read from ffmpeg: {e}")))?;
        if got == 0 {
            self.finish_decoder()?;
            return Ok(None);
        }
        if got < frame_len {
            let _ = self.finish_decoder();
            return Err(DotMatrixError::decode(format!(
                "truncated frame {}: got {got} of {frame_len} bytes",
                self.next_index
            )));
        }

        let index = self.next_index;
        self.next_index += 1;
        let buffer = PixelBuffer::new(self.width, self.height, ChannelLayout::Rgb8, data)?;
        Ok(Some(Frame::new(
            FrameIndex(index),
            self.probe.fps.frames_to_secs(index),
            buffer,
        )))
    }
}

impl Drop for FfmpegSource {
    fn drop(&mut self) {
        drop(self.stdout.take());
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}

/// Options for [`FfmpegSink`] MP4 output.
#[derive(Clone, Debug)]
pub struct FfmpegSinkOpts {
    /// Output MP4 file path.
    pub out_path: PathBuf,
    /// Overwrite output file if it already exists.
    pub overwrite: bool,
    /// x264 constant rate factor.
    pub crf: u8,
    /// x264 preset name.
    pub preset: String,
}

impl FfmpegSinkOpts {
    /// Create options for outputting an MP4 to `out_path`.
    pub fn new(out_path: impl Into<PathBuf>) -> Self {
        Self {
            out_path: out_path.into(),
            overwrite: true,
            crf: 23,
            preset: "medium".to_owned(),
        }
    }
}

/// Sink that spawns the system `ffmpeg` and streams raw frames to its stdin (H.264, yuv420p).
pub struct FfmpegSink {
    opts: FfmpegSinkOpts,

    child: Option<Child>,
    stdin: Option<ChildStdin>,
    stderr_drain: Option<JoinHandle<std::io::Result<Vec<u8>>>>,

    cfg: Option<SinkConfig>,
    last_idx: Option<FrameIndex>,
}

impl FfmpegSink {
    /// Create a new sink that streams into `ffmpeg`.
    pub fn new(opts: FfmpegSinkOpts) -> Self {
        Self {
            opts,
            child: None,
            stdin: None,
            stderr_drain: None,
            cfg: None,
            last_idx: None,
        }
    }
}

impl FrameSink for FfmpegSink {
    fn begin(&mut self, cfg: SinkConfig) -> DotMatrixResult<()> {
        if cfg.width == 0 || cfg.height == 0 {
            return Err(DotMatrixError::invalid_params(
                "ffmpeg sink width/height must be non-zero",
            ));
        }
        if !cfg.width.is_multiple_of(2) || !cfg.height.is_multiple_of(2) {
            return Err(DotMatrixError::invalid_params(
                "ffmpeg sink width/height must be even (required for yuv420p mp4 output)",
            ));
        }

        ensure_parent_dir(&self.opts.out_path)?;
        if !self.opts.overwrite && self.opts.out_path.exists() {
            return Err(DotMatrixError::invalid_params(format!(
                "output file '{}' already exists",
                self.opts.out_path.display()
            )));
        }

        if !is_ffmpeg_on_path() {
            return Err(DotMatrixError::encode(
                "ffmpeg is required for MP4 encoding, but was not found on PATH",
            ));
        }

        let mut cmd = Command::new("ffmpeg");
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());

        if self.opts.overwrite {
            cmd.arg("-y");
        } else {
            cmd.arg("-n");
        }

        let pix_fmt = match cfg.layout {
            ChannelLayout::Rgb8 => "rgb24",
            ChannelLayout::Rgba8 => "rgba",
        };
        // For rawvideo input, `-r` goes before `-i` to set the input framerate.
        cmd.args([
            "-loglevel",
            "error",
            "-f",
            "rawvideo",
            "-pix_fmt",
            pix_fmt,
            "-s",
            &format!("{}x{}", cfg.width, cfg.height),
            "-r",
            &format!("{}/{}", cfg.fps.num, cfg.fps.den),
            "-i",
            "pipe:0",
            "-an",
            "-c:v",
            "libx264",
            "-preset",
            &self.opts.preset,
            "-crf",
            &self.opts.crf.to_string(),
            "-pix_fmt",
            "yuv420p",
            "-movflags",
            "+faststart",
        ])
        .arg(&self.opts.out_path);

        let mut child = cmd.spawn().map_err(|e| {
            DotMatrixError::encode(format!(
                "failed to spawn ffmpeg (is it installed and on PATH?): {e}"
            ))
        })?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| DotMatrixError::encode("failed to open ffmpeg stdin (unexpected)"))?;
        let stderr_drain = spawn_stderr_drain(&mut child)?;

        self.child = Some(child);
        self.stdin = Some(stdin);
        self.stderr_drain = Some(stderr_drain);
        self.cfg = Some(cfg);
        self.last_idx = None;
        Ok(())
    }

    fn push_frame(&mut self, frame: &Frame) -> DotMatrixResult<()> {
        let cfg = self
            .cfg
            .as_ref()
            .ok_or_else(|| DotMatrixError::encode("ffmpeg sink not started"))?;
        if let Some(last) = self.last_idx
            && frame.index <= last
        {
            return Err(DotMatrixError::encode(
                "ffmpeg sink received out-of-order frame index",
            ));
        }

        let buf = &frame.buffer;
        if buf.width() != cfg.width || buf.height() != cfg.height || buf.layout() != cfg.layout {
            return Err(DotMatrixError::encode(format!(
                "frame mismatch: got {}x{} {:?}, expected {}x{} {:?}",
                buf.width(),
                buf.height(),
                buf.layout(),
                cfg.width,
                cfg.height,
                cfg.layout
            )));
        }

        let Some(stdin) = self.stdin.as_mut() else {
            return Err(DotMatrixError::encode("ffmpeg sink is already finalized"));
        };
        stdin.write_all(buf.data()).map_err(|e| {
            DotMatrixError::encode(format!("failed to write frame to ffmpeg stdin: {e}"))
        })?;
        self.last_idx = Some(frame.index);
        Ok(())
    }

    fn end(&mut self) -> DotMatrixResult<()> {
        drop(self.stdin.take());
        let mut child = self
            .child
            .take()
            .ok_or_else(|| DotMatrixError::encode("ffmpeg sink not started"))?;

        let status = child.wait().map_err(|e| {
            DotMatrixError::encode(format!("failed to wait for ffmpeg to finish: {e}"))
        })?;
        let stderr_bytes = join_stderr_drain(self.stderr_drain.take())?;

        if !status.success() {
            let stderr = String::from_utf8_lossy(&stderr_bytes);
            return Err(DotMatrixError::encode(format!(
                "ffmpeg exited with status {}: {}",
                status,
                stderr.trim()
            )));
        }

        self.cfg = None;
        Ok(())
    }
}

impl Drop for FfmpegSink {
    fn drop(&mut self) {
        drop(self.stdin.take());
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}

/// Decoded size for a `width × height` video: fit the longer side in `max_dim`, then round both
/// sides down to even.
fn decoded_dims(width: u32, height: u32, max_dim: Option<u32>) -> (u32, u32) {
    let (mut w, mut h) = (width, height);
    if let Some(scale) = fit_scale(width, height, max_dim) {
        w = (f64::from(w) * scale) as u32;
        h = (f64::from(h) * scale) as u32;
    }
    (w & !1, h & !1)
}

fn params_for_scale(params: RenderParams, downscale: Option<f64>) -> RenderParams {
    downscale.map_or(params, |factor| params.scaled(factor))
}

fn fit_scale(width: u32, height: u32, max_dim: Option<u32>) -> Option<f64> {
    let longer = width.max(height);
    match max_dim {
        Some(max_dim) if longer > max_dim => Some(f64::from(max_dim) / f64::from(longer)),
        _ => None,
    }
}

/// Read until `buf` is full or the stream ends. Returns the number of bytes read.
fn read_full(r: &mut impl Read, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match r.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

fn spawn_stderr_drain(child: &mut Child) -> DotMatrixResult<JoinHandle<std::io::Result<Vec<u8>>>> {
    let mut stderr = child
        .stderr
        .take()
        .ok_or_else(|| DotMatrixError::decode("failed to open ffmpeg stderr (unexpected)"))?;
    Ok(std::thread::spawn(move || {
        let mut stderr_bytes = Vec::new();
        stderr.read_to_end(&mut stderr_bytes)?;
        Ok(stderr_bytes)
    }))
}

fn join_stderr_drain(
    handle: Option<JoinHandle<std::io::Result<Vec<u8>>>>,
) -> DotMatrixResult<Vec<u8>> {
    match handle {
        Some(handle) => handle
            .join()
            .map_err(|_| anyhow::anyhow!("ffmpeg stderr drain thread panicked"))?
            .map_err(|e| anyhow::anyhow!("ffmpeg stderr read failed: {e}").into()),
        None => Ok(Vec::new()),
    }
}

/// Ensure the parent directory of `path` exists.
pub fn ensure_parent_dir(path: &Path) -> DotMatrixResult<()> {
    if let Some(parent) = path.parent() {
        use anyhow::Context as _;
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create output directory '{}'", parent.display()))?;
    }
    Ok(())
}

/// Return `true` when `ffmpeg` can be invoked from `PATH`.
pub fn is_ffmpeg_on_path() -> bool {
    Command::new("ffmpeg")
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}
