//! Sequential batch orchestration.
//!
//! Items are processed one at a time: histogram rendering is not shared
//! across simultaneous items. Every item gets a fresh progress reporter,
//! driven through the signal protocol and finished with a bounded grace
//! period so a stuck reporter can never stall the batch.

use chrono::{DateTime, Utc};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::task;

use super::item::{Item, ItemResult, RunMode};
use super::progress::{PipelineSignal, ProgressHandle, ReporterExit};
use crate::config::{AnalyzerConfig, Verbosity, COMPACTION_PERIOD};
use crate::error::{AnalyzerError, Result};
use crate::imaging::{
    Channel, ChannelExtractor, ChannelSamples, HistogramSpec, RenderSink, BAR_BLUE,
};
use crate::labels::Labels;
use crate::output::OutputStreams;
use crate::stats::{self, ChannelStatistics};

/// Produces the terminal that the progress reporter and diagnostics share
pub type TerminalFactory = Arc<dyn Fn() -> Box<dyn Write + Send> + Send + Sync>;

/// Padding that erases a leftover animation frame after a diagnostic line
const WHITE_PADDING: &str = "                                                ";

/// Outcome of a completed run
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub mode: RunMode,
    pub processed: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl RunSummary {
    pub fn elapsed_secs(&self) -> f64 {
        (self.finished_at - self.started_at).num_milliseconds() as f64 / 1000.0
    }
}

/// Drives items through extraction, statistics, the output streams and
/// the render sink.
pub struct BatchOrchestrator {
    config: Arc<AnalyzerConfig>,
    labels: &'static Labels,
    extractor: Arc<dyn ChannelExtractor>,
    sink: Arc<dyn RenderSink>,
    terminal: TerminalFactory,
    streams: OutputStreams,
    progress: Option<ProgressHandle>,
}

impl BatchOrchestrator {
    /// Prepare the output layout and open both result streams.
    pub fn new(
        config: Arc<AnalyzerConfig>,
        extractor: Arc<dyn ChannelExtractor>,
        sink: Arc<dyn RenderSink>,
    ) -> Result<Self> {
        config.output.prepare()?;
        let labels = Labels::for_language(config.language);
        let streams = OutputStreams::open(&config.output, labels)?;

        Ok(Self {
            config,
            labels,
            extractor,
            sink,
            terminal: Arc::new(|| Box::new(io::stdout()) as Box<dyn Write + Send>),
            streams,
            progress: None,
        })
    }

    /// Draw progress and diagnostics somewhere other than stdout.
    pub fn with_terminal(mut self, terminal: TerminalFactory) -> Self {
        self.terminal = terminal;
        self
    }

    /// Process every item in order.
    ///
    /// The first failure aborts the run: the reporter is terminated, tabular
    /// rows flushed so far stay on disk and the record stream is left
    /// unterminated.
    pub async fn run(mut self, items: Vec<PathBuf>, mode: RunMode) -> Result<RunSummary> {
        let started_at = Utc::now();
        let mut processed = 0usize;

        for path in items {
            if mode == RunMode::Batch {
                println!("{}", path.display());
            }

            if let Err(e) = self.process_item(&path, mode).await {
                if let Some(progress) = self.progress.take() {
                    progress.terminate();
                }
                return Err(e);
            }

            processed += 1;
            if processed % COMPACTION_PERIOD == 0 {
                self.streams.compact()?;
                if self.config.verbosity >= Verbosity::Noisy {
                    println!("⏳ Analyzed {} images...", processed);
                }
                tracing::debug!(
                    records = self.streams.appended(),
                    "compaction pass after {} items",
                    processed
                );
            }
        }

        let BatchOrchestrator { streams, .. } = self;
        streams.finish()?;

        Ok(RunSummary {
            mode,
            processed,
            started_at,
            finished_at: Utc::now(),
        })
    }

    async fn process_item(&mut self, path: &Path, mode: RunMode) -> Result<()> {
        let item = Item::resolve(path, mode, &self.config)?;

        self.start_reporter();
        self.signal(PipelineSignal::InProgress).await;

        let extractor = Arc::clone(&self.extractor);
        let source = item.path.clone();
        let (samples, channels) = task::spawn_blocking(move || -> Result<_> {
            let samples = extractor.extract(&source)?;
            let channels = compute_channels(&samples)?;
            Ok((samples, channels))
        })
        .await??;

        let result = ItemResult {
            fields: item.fields.clone(),
            channels,
        };
        self.streams.append(&result)?;

        if self.config.verbosity >= Verbosity::VeryNoisy {
            let mut lines = vec![samples.source.clone()];
            lines.extend(stats_lines(&result));
            self.pause_for_diagnostics(&lines).await;
        }

        self.render_artifacts(&item, samples, &result).await?;
        self.finish_reporter().await;

        if self.config.verbosity >= Verbosity::Noisy {
            let hue = result.channel(Channel::Hue);
            let saturation = result.channel(Channel::Saturation);
            let brightness = result.channel(Channel::Brightness);
            tracing::info!(
                item = %item.base_name,
                hue_mean = hue.mean,
                hue_median = hue.median,
                saturation_mean = saturation.mean,
                saturation_median = saturation.median,
                brightness_mean = brightness.mean,
                brightness_median = brightness.median,
                "item analyzed"
            );
        }

        Ok(())
    }

    /// Render histograms and save channel images, one channel at a time.
    async fn render_artifacts(
        &self,
        item: &Item,
        samples: ChannelSamples,
        result: &ItemResult,
    ) -> Result<()> {
        let render_figures = self.config.render_figures;
        let save_planes = !self.config.deny_output;
        if !render_figures && !save_planes {
            return Ok(());
        }

        let samples = Arc::new(samples);
        let layout = &self.config.output;

        for channel in Channel::ALL {
            let stats = result.channel(channel);

            if self.config.verbosity >= Verbosity::VeryNoisy {
                let lines = [
                    format!("> {}", channel.file_suffix()),
                    format!("   MAX: {} , min: {}", stats.max, stats.min),
                ];
                self.pause_for_diagnostics(&lines).await;
            }

            let figure = render_figures.then(|| {
                (
                    HistogramSpec {
                        bins: self.config.bins,
                        color: BAR_BLUE,
                        title: item.figure_title(self.labels, channel),
                        x_label: self.labels.x_label(channel).to_string(),
                        y_label: self.labels.y_label.to_string(),
                        mean: Some(stats.mean),
                        median: Some(stats.median),
                        mean_label: self.labels.summary_mean.to_string(),
                        median_label: self.labels.summary_median.to_string(),
                    },
                    layout.figure_dir().join(item.artifact_name(channel)),
                )
            });
            let plane_path =
                save_planes.then(|| layout.image_dir().join(item.artifact_name(channel)));

            let sink = Arc::clone(&self.sink);
            let samples = Arc::clone(&samples);
            task::spawn_blocking(move || -> Result<()> {
                if let Some((spec, path)) = figure {
                    let artifact = sink.render(samples.plane(channel), &spec)?;
                    sink.persist(&artifact, &path)?;
                }
                if let Some(path) = plane_path {
                    samples.save_plane(channel, &path)?;
                }
                Ok(())
            })
            .await??;
        }

        Ok(())
    }

    /// Start this item's reporter. The previous item's reporter has already
    /// been finished, so at most one is ever alive.
    fn start_reporter(&mut self) {
        self.progress = Some(ProgressHandle::spawn(
            (self.terminal)(),
            self.config.timing.tick,
        ));
    }

    async fn signal(&self, signal: PipelineSignal) {
        if let Some(progress) = &self.progress {
            progress.signal(signal).await;
        }
    }

    /// Silence the reporter, print `lines`, then resume the animation.
    ///
    /// The hand-off sleep gives the reporter a chance to observe `Paused`
    /// before anything is printed; it is not a guarantee.
    async fn pause_for_diagnostics(&self, lines: &[String]) {
        self.signal(PipelineSignal::Paused).await;
        tokio::time::sleep(self.config.timing.handoff).await;

        let mut terminal = (self.terminal)();
        for line in lines {
            // A closed terminal only loses diagnostics
            let _ = writeln!(terminal, "\r{}{}", line, WHITE_PADDING);
        }
        let _ = terminal.flush();
        drop(terminal);

        self.signal(PipelineSignal::InProgress).await;
    }

    async fn finish_reporter(&mut self) {
        let Some(progress) = self.progress.take() else {
            return;
        };
        let exited_early = !progress.is_alive();
        match progress.finish(self.config.timing.grace).await {
            ReporterExit::Completed => {}
            exit if exited_early => {
                tracing::warn!("progress reporter exited before the item finished ({:?})", exit);
            }
            exit => tracing::debug!("progress reporter did not complete cleanly ({:?})", exit),
        }
    }
}

/// Statistics for all three channels of one image.
fn compute_channels(samples: &ChannelSamples) -> Result<[ChannelStatistics; 3]> {
    let [hue, saturation, brightness] = Channel::ALL.map(|channel| {
        stats::compute(samples.plane(channel)).map_err(|source| AnalyzerError::Stats {
            channel: channel.name(),
            source,
        })
    });
    Ok([hue?, saturation?, brightness?])
}

fn stats_lines(result: &ItemResult) -> Vec<String> {
    Channel::ALL
        .iter()
        .map(|&channel| {
            let stats = result.channel(channel);
            format!(
                "{} mean: {:.1}, {} median : {:.1}",
                channel.name(),
                stats.mean,
                channel.name(),
                stats.median
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Language, OutputLayout, ProgressTiming};
    use crate::imaging::histogram::HistogramArtifact;
    use crate::imaging::{FigureFont, HsvExtractor, PngHistogramSink};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;
    use tempfile::TempDir;

    /// Extractor that never touches the filesystem
    #[derive(Default)]
    struct FakeExtractor {
        calls: AtomicUsize,
        fail_on_call: Option<usize>,
        empty_channel: bool,
        /// CSV file whose line count is recorded at the start of every call
        watched_csv: Option<PathBuf>,
        observed_lines: Mutex<Vec<usize>>,
    }

    impl ChannelExtractor for FakeExtractor {
        fn extract(&self, path: &Path) -> Result<ChannelSamples> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);

            if let Some(csv) = &self.watched_csv {
                let lines = std::fs::read_to_string(csv)
                    .map(|content| content.lines().count())
                    .unwrap_or(0);
                self.observed_lines.lock().unwrap().push(lines);
            }

            if self.fail_on_call == Some(call) {
                return Err(AnalyzerError::io(
                    path,
                    io::Error::new(io::ErrorKind::InvalidData, "corrupt image"),
                ));
            }

            let brightness = if self.empty_channel {
                Vec::new()
            } else {
                vec![0, 0, 0, 1]
            };
            Ok(ChannelSamples {
                width: 2,
                height: 2,
                source: "fake 2x2".to_string(),
                planes: [vec![0, 0, 255, 255], vec![10, 20, 30, 20], brightness],
            })
        }
    }

    /// Sink that only counts calls
    #[derive(Default)]
    struct CountingSink {
        rendered: AtomicUsize,
        persisted: Mutex<Vec<PathBuf>>,
    }

    impl RenderSink for CountingSink {
        fn render(&self, samples: &[u8], spec: &HistogramSpec) -> Result<HistogramArtifact> {
            self.rendered.fetch_add(1, Ordering::SeqCst);
            PngHistogramSink::new(100, 100, Arc::new(FigureFont::Bitmap)).render(samples, spec)
        }

        fn persist(&self, _artifact: &HistogramArtifact, path: &Path) -> Result<()> {
            self.persisted.lock().unwrap().push(path.to_path_buf());
            Ok(())
        }
    }

    fn test_config(dir: &TempDir) -> AnalyzerConfig {
        AnalyzerConfig {
            input_root: dir.path().join("input"),
            output: OutputLayout::new(dir.path().join("output")),
            language: Language::English,
            deny_output: true,
            render_figures: false,
            timing: ProgressTiming {
                tick: Duration::from_millis(1),
                handoff: Duration::from_millis(1),
                grace: Duration::from_millis(200),
            },
            ..Default::default()
        }
    }

    fn orchestrator(
        config: AnalyzerConfig,
        extractor: Arc<dyn ChannelExtractor>,
        sink: Arc<dyn RenderSink>,
    ) -> BatchOrchestrator {
        BatchOrchestrator::new(Arc::new(config), extractor, sink)
            .unwrap()
            .with_terminal(Arc::new(|| Box::new(io::sink()) as Box<dyn Write + Send>))
    }

    /// Shared terminal stand-in for the reporter and diagnostics
    #[derive(Clone, Default)]
    struct Capture {
        bytes: Arc<Mutex<Vec<u8>>>,
        opened: Arc<AtomicUsize>,
    }

    impl Capture {
        fn factory(&self) -> TerminalFactory {
            let capture = self.clone();
            Arc::new(move || {
                capture.opened.fetch_add(1, Ordering::SeqCst);
                Box::new(capture.clone()) as Box<dyn Write + Send>
            })
        }

        fn text(&self) -> String {
            String::from_utf8(self.bytes.lock().unwrap().clone()).unwrap()
        }
    }

    impl Write for Capture {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.bytes.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    const FRAME_TEXT: &str = "Image analyzer is now in progress";

    fn batch_items(count: usize) -> Vec<PathBuf> {
        (1..=count)
            .map(|i| PathBuf::from(format!("input/{}_Acme_2020-01-{:02}_Title {}.png", i, i, i)))
            .collect()
    }

    fn read_json(config: &AnalyzerConfig) -> String {
        std::fs::read_to_string(config.output.json_path()).unwrap()
    }

    #[tokio::test]
    async fn test_batch_run_writes_both_streams() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(&dir);
        let run = orchestrator(
            config.clone(),
            Arc::new(FakeExtractor::default()),
            Arc::new(CountingSink::default()),
        );

        let summary = run.run(batch_items(3), RunMode::Batch).await.unwrap();
        assert_eq!(summary.processed, 3);

        let csv = std::fs::read_to_string(config.output.csv_path()).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(
            lines[1],
            "1,\"Acme\",\"2020-01-01\",\"Title 1\",127.5,127.5,20.0,20.0,0.3,0.0"
        );

        let json: serde_json::Value = serde_json::from_str(&read_json(&config)).unwrap();
        let records = json.as_array().unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[1]["sales"], 2);
        assert_eq!(records[0]["hue"][0]["mean"], 127.5);
    }

    #[tokio::test]
    async fn test_compaction_flushes_every_tenth_item() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(&dir);
        let extractor = Arc::new(FakeExtractor {
            watched_csv: Some(config.output.csv_path()),
            ..Default::default()
        });
        let run = orchestrator(
            config.clone(),
            extractor.clone(),
            Arc::new(CountingSink::default()),
        );

        run.run(batch_items(12), RunMode::Batch).await.unwrap();

        let observed = extractor.observed_lines.lock().unwrap().clone();
        assert_eq!(observed.len(), 12);
        // When item 11 starts, the header and the first ten rows are on disk
        assert!(observed[10] >= 11, "observed {:?}", observed);
    }

    #[tokio::test]
    async fn test_failure_aborts_and_leaves_records_unterminated() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(&dir);
        let extractor = Arc::new(FakeExtractor {
            fail_on_call: Some(2),
            ..Default::default()
        });
        let run = orchestrator(config.clone(), extractor.clone(), Arc::new(CountingSink::default()));

        let result = run.run(batch_items(5), RunMode::Batch).await;
        assert!(matches!(result, Err(AnalyzerError::Io { .. })));
        // No item after the failing one was attempted
        assert_eq!(extractor.calls.load(Ordering::SeqCst), 3);

        let json = read_json(&config);
        assert!(json.starts_with('['));
        assert!(serde_json::from_str::<serde_json::Value>(&json).is_err());

        let csv = std::fs::read_to_string(config.output.csv_path()).unwrap();
        assert_eq!(csv.lines().count(), 3);
    }

    #[tokio::test]
    async fn test_decomposition_failure_aborts_batch() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(&dir);
        let extractor = Arc::new(FakeExtractor::default());
        let run = orchestrator(config, extractor.clone(), Arc::new(CountingSink::default()));

        let result = run
            .run(vec![PathBuf::from("input/bad.png")], RunMode::Batch)
            .await;
        assert!(matches!(result, Err(AnalyzerError::Decomposition { .. })));
        assert_eq!(extractor.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_empty_channel_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(&dir);
        let extractor = Arc::new(FakeExtractor {
            empty_channel: true,
            ..Default::default()
        });
        let run = orchestrator(config, extractor, Arc::new(CountingSink::default()));

        let result = run.run(batch_items(1), RunMode::Batch).await;
        assert!(matches!(
            result,
            Err(AnalyzerError::Stats {
                channel: "brightness",
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_render_sink_driven_per_channel() {
        let dir = tempfile::tempdir().unwrap();
        let config = AnalyzerConfig {
            render_figures: true,
            ..test_config(&dir)
        };
        let sink = Arc::new(CountingSink::default());
        let run = orchestrator(config.clone(), Arc::new(FakeExtractor::default()), sink.clone());

        run.run(batch_items(2), RunMode::Batch).await.unwrap();

        assert_eq!(sink.rendered.load(Ordering::SeqCst), 6);
        let persisted = sink.persisted.lock().unwrap().clone();
        assert_eq!(
            persisted[0],
            config
                .output
                .figure_dir()
                .join("1_Acme_2020-01-01_Title 1_Image_Hue.png")
        );
    }

    #[tokio::test]
    async fn test_suppressed_rendering_skips_sink() {
        let dir = tempfile::tempdir().unwrap();
        let sink = Arc::new(CountingSink::default());
        let run = orchestrator(
            test_config(&dir),
            Arc::new(FakeExtractor::default()),
            sink.clone(),
        );

        run.run(batch_items(2), RunMode::Batch).await.unwrap();
        assert_eq!(sink.rendered.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_very_noisy_run_completes() {
        let dir = tempfile::tempdir().unwrap();
        let config = AnalyzerConfig {
            verbosity: Verbosity::VeryNoisy,
            render_figures: true,
            ..test_config(&dir)
        };
        let run = orchestrator(
            config.clone(),
            Arc::new(FakeExtractor::default()),
            Arc::new(CountingSink::default()),
        );

        let summary = run.run(batch_items(2), RunMode::Batch).await.unwrap();
        assert_eq!(summary.processed, 2);
        let json: serde_json::Value = serde_json::from_str(&read_json(&config)).unwrap();
        assert_eq!(json.as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_single_file_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let image_path = dir.path().join("photo.png");
        let mut img = image::RgbImage::new(4, 4);
        for (i, pixel) in img.pixels_mut().enumerate() {
            *pixel = image::Rgb([(i * 16) as u8, 0, 255]);
        }
        img.save(&image_path).unwrap();

        let config = AnalyzerConfig {
            output_prefix: Some("sample".to_string()),
            deny_output: false,
            render_figures: true,
            ..test_config(&dir)
        };
        let run = orchestrator(
            config.clone(),
            Arc::new(HsvExtractor),
            Arc::new(PngHistogramSink::new(200, 150, Arc::new(FigureFont::Bitmap))),
        );

        let summary = run.run(vec![image_path], RunMode::Single).await.unwrap();
        assert_eq!(summary.mode, RunMode::Single);

        for channel in Channel::ALL {
            let name = format!("sample_{}", channel.file_suffix());
            assert!(config.output.figure_dir().join(&name).is_file());
            assert!(config.output.image_dir().join(&name).is_file());
        }

        let json: serde_json::Value = serde_json::from_str(&read_json(&config)).unwrap();
        let record = &json.as_array().unwrap()[0];
        assert!(record.get("sales").is_none());
        assert_eq!(record["brightness"][0]["mean"], 255.0);
    }

    #[tokio::test]
    async fn test_empty_batch_produces_empty_array() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(&dir);
        let run = orchestrator(
            config.clone(),
            Arc::new(FakeExtractor::default()),
            Arc::new(CountingSink::default()),
        );

        let summary = run.run(Vec::new(), RunMode::Batch).await.unwrap();
        assert_eq!(summary.processed, 0);
        assert_eq!(read_json(&config), "[]");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_diagnostics_print_only_while_reporter_paused() {
        let dir = tempfile::tempdir().unwrap();
        let config = AnalyzerConfig {
            verbosity: Verbosity::VeryNoisy,
            timing: ProgressTiming {
                tick: Duration::from_millis(2),
                handoff: Duration::from_millis(60),
                grace: Duration::from_millis(500),
            },
            ..test_config(&dir)
        };
        let capture = Capture::default();
        let run = BatchOrchestrator::new(
            Arc::new(config),
            Arc::new(FakeExtractor::default()),
            Arc::new(CountingSink::default()),
        )
        .unwrap()
        .with_terminal(capture.factory());

        run.run(batch_items(1), RunMode::Batch).await.unwrap();

        let text = capture.text();
        let first = text.find("fake 2x2").expect("source line missing");
        let last_line = "brightness mean: 0.3, brightness median : 0.0";
        let last = text.find(last_line).expect("stats line missing") + last_line.len();

        // Animation, then the uninterrupted diagnostic block, then animation and done
        assert!(text[..first].contains(FRAME_TEXT), "no frame before pause: {:?}", text);
        let diagnostics = &text[first..last];
        assert!(!diagnostics.contains(FRAME_TEXT), "frame inside diagnostics: {:?}", diagnostics);
        assert!(!diagnostics.contains("[|]") && !diagnostics.contains("[/]"));
        let after = &text[last..];
        let resumed = after.find(FRAME_TEXT).expect("animation did not resume");
        let done = after.find("[+]: Done").expect("done line missing");
        assert!(resumed < done);
        assert!(text.ends_with('\n'));
    }

    #[tokio::test]
    async fn test_each_item_gets_its_own_reporter() {
        let dir = tempfile::tempdir().unwrap();
        let capture = Capture::default();
        let run = BatchOrchestrator::new(
            Arc::new(test_config(&dir)),
            Arc::new(FakeExtractor::default()),
            Arc::new(CountingSink::default()),
        )
        .unwrap()
        .with_terminal(capture.factory());

        run.run(batch_items(3), RunMode::Batch).await.unwrap();

        assert_eq!(capture.opened.load(Ordering::SeqCst), 3);
        assert_eq!(capture.text().matches("[+]: Done").count(), 3);
    }
}
