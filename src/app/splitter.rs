use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, info, warn};
use uuid::Uuid;

use super::janitor::{ArtifactJanitor, ArtifactKind};
use crate::adapters::resampler::resample;
use crate::domain::config::ChunkingConfig;
use crate::domain::signal::downmix;
use crate::domain::{AudioAsset, AudioBuffer, AudioChunk, ChunkPlan, TranscriptionError};
use crate::ports::{AudioDecoder, AudioEncoder, EncodeProfile};

/// Cuts a prepared asset into chunks that each fit a byte budget.
pub struct SizeBudgetSplitter {
    decoder: Arc<dyn AudioDecoder>,
    encoder: Arc<dyn AudioEncoder>,
    config: ChunkingConfig,
    sample_rate: u32,
    workspace: PathBuf,
}

impl SizeBudgetSplitter {
    pub fn new(
        decoder: Arc<dyn AudioDecoder>,
        encoder: Arc<dyn AudioEncoder>,
        config: ChunkingConfig,
        sample_rate: u32,
        workspace: PathBuf,
    ) -> Self {
        Self {
            decoder,
            encoder,
            config,
            sample_rate,
            workspace,
        }
    }

    /// Plan chunks of `asset`, each at most `max_bytes`.
    ///
    /// An asset already within budget comes back as a single chunk pointing
    /// at the asset itself. Otherwise the whole asset is first re-encoded with
    /// the compressed profile and the compressed bitrate drives the chunk
    /// length estimate. A chunk that still overflows is halved until it fits,
    /// giving up with [`TranscriptionError::ChunkTooLarge`] once an overflowing
    /// chunk is already at or below the halving floor, or after `max_halvings`
    /// attempts.
    pub fn split(
        &self,
        asset: &AudioAsset,
        max_bytes: u64,
        janitor: &ArtifactJanitor,
    ) -> Result<ChunkPlan, TranscriptionError> {
        if max_bytes == 0 {
            return Err(TranscriptionError::chunk_too_large("byte budget is zero"));
        }
        if asset.byte_size <= max_bytes {
            debug!(bytes = asset.byte_size, max_bytes = max_bytes, "Asset within budget");
            return Ok(ChunkPlan::single(asset, max_bytes));
        }

        let buffer = self.load(asset)?;
        let duration_ms = buffer.duration_ms();
        if duration_ms == 0 {
            return Err(TranscriptionError::chunk_too_large(format!(
                "{} bytes of audio with no measurable duration",
                asset.byte_size
            )));
        }

        fs::create_dir_all(&self.workspace)?;
        let run_id = Uuid::new_v4();

        let compressed_path = self.artifact_path(&format!("compressed_{}", run_id));
        janitor.track(&compressed_path, ArtifactKind::Compressed);
        let compressed_size = self.encoder.encode(
            buffer.samples(),
            buffer.sample_rate(),
            EncodeProfile::Compressed,
            &compressed_path,
        )?;

        info!(
            original_bytes = asset.byte_size,
            compressed_bytes = compressed_size,
            max_bytes = max_bytes,
            duration_ms = duration_ms,
            "Asset over budget, compressed before splitting"
        );

        if compressed_size <= max_bytes {
            let chunk = AudioChunk {
                index: 0,
                path: compressed_path,
                byte_size: compressed_size,
                start_ms: 0,
                end_ms: duration_ms,
            };
            return Ok(ChunkPlan::new(vec![chunk], max_bytes));
        }

        let estimate_ms = self.estimate_chunk_ms(duration_ms, compressed_size, max_bytes);
        debug!(estimate_ms = estimate_ms, "Estimated chunk duration");

        let mut chunks = Vec::new();
        let mut start_ms = 0;
        while start_ms < duration_ms {
            let index = chunks.len();
            let path = self.artifact_path(&format!("chunk_{}_{:03}", run_id, index));
            janitor.track(&path, ArtifactKind::Chunk);

            let chunk = self.export_fitting(&buffer, index, start_ms, estimate_ms, max_bytes, path)?;
            start_ms = chunk.end_ms;
            chunks.push(chunk);
        }

        let plan = ChunkPlan::new(chunks, max_bytes);
        plan.validate().map_err(TranscriptionError::internal)?;

        info!(
            chunks = plan.len(),
            duration_ms = plan.total_duration_ms(),
            "Asset split"
        );
        Ok(plan)
    }

    /// `duration * max / size - margin`, never below the minimum chunk length.
    fn estimate_chunk_ms(&self, duration_ms: u64, size: u64, max_bytes: u64) -> u64 {
        let proportional = (duration_ms as u128 * max_bytes as u128 / size.max(1) as u128) as u64;
        proportional
            .saturating_sub(self.config.safety_margin_ms)
            .max(self.config.min_chunk_ms)
            .max(1)
    }

    /// Export the chunk starting at `start_ms`, halving until it fits.
    fn export_fitting(
        &self,
        buffer: &AudioBuffer,
        index: usize,
        start_ms: u64,
        estimate_ms: u64,
        max_bytes: u64,
        path: PathBuf,
    ) -> Result<AudioChunk, TranscriptionError> {
        let remaining_ms = buffer.duration_ms() - start_ms;
        let mut length_ms = estimate_ms.min(remaining_ms);
        let mut halvings = 0;

        loop {
            let end_ms = start_ms + length_ms;
            let samples = buffer.slice_ms(start_ms, end_ms);
            let byte_size = self.encoder.encode(
                samples,
                buffer.sample_rate(),
                EncodeProfile::Compressed,
                &path,
            )?;

            if byte_size <= max_bytes {
                debug!(
                    index = index,
                    start_ms = start_ms,
                    end_ms = end_ms,
                    bytes = byte_size,
                    halvings = halvings,
                    "Chunk exported"
                );
                return Ok(AudioChunk {
                    index,
                    path,
                    byte_size,
                    start_ms,
                    end_ms,
                });
            }

            if length_ms <= self.config.halving_floor_ms || halvings >= self.config.max_halvings {
                warn!(
                    index = index,
                    length_ms = length_ms,
                    bytes = byte_size,
                    max_bytes = max_bytes,
                    halvings = halvings,
                    "Chunk cannot be made to fit"
                );
                return Err(TranscriptionError::chunk_too_large(format!(
                    "chunk {} is {} bytes at {}ms, budget is {} bytes",
                    index, byte_size, length_ms, max_bytes
                )));
            }
            length_ms = (length_ms / 2).max(1);
            halvings += 1;
        }
    }

    fn load(&self, asset: &AudioAsset) -> Result<AudioBuffer, TranscriptionError> {
        let decoded = self.decoder.decode_file(&asset.path)?;
        let mono = downmix(&decoded.samples, decoded.channels as usize);
        let samples = resample(&mono, decoded.sample_rate, self.sample_rate)?;
        Ok(AudioBuffer::new(samples, self.sample_rate))
    }

    fn artifact_path(&self, stem: &str) -> PathBuf {
        self.workspace
            .join(format!("{}.{}", stem, self.encoder.extension()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{SymphoniaDecoder, WavEncoder};
    use crate::domain::{AudioFormat, SourceInfo};
    use crate::ports::AudioEncoder;
    use crate::testutil::{tone, FixedDecoder, UniformEncoder};
    use std::path::Path;

    const MB: u64 = 1_000_000;

    fn asset(path: &Path, byte_size: u64, duration_ms: u64, sample_rate: u32) -> AudioAsset {
        AudioAsset {
            path: path.to_path_buf(),
            byte_size,
            duration_ms,
            channels: 1,
            sample_rate,
            format: AudioFormat::Wav,
            source: SourceInfo {
                channels: 1,
                sample_rate,
                duration_ms,
            },
            trimmed: false,
        }
    }

    fn splitter(
        dir: &Path,
        decoder: Arc<dyn AudioDecoder>,
        encoder: Arc<dyn AudioEncoder>,
        config: ChunkingConfig,
        sample_rate: u32,
    ) -> SizeBudgetSplitter {
        SizeBudgetSplitter::new(decoder, encoder, config, sample_rate, dir.join("work"))
    }

    #[test]
    fn test_asset_within_budget_is_single_chunk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("never-read.wav");
        let asset = asset(&path, 1000, 5000, 16_000);
        let janitor = ArtifactJanitor::new();

        let plan = splitter(
            dir.path(),
            Arc::new(SymphoniaDecoder::new()),
            Arc::new(WavEncoder::new()),
            ChunkingConfig::default(),
            16_000,
        )
        .split(&asset, 1000, &janitor)
        .unwrap();

        assert_eq!(plan.len(), 1);
        let chunk = &plan.chunks()[0];
        assert_eq!(chunk.path, path);
        assert_eq!(chunk.byte_size, 1000);
        assert_eq!((chunk.start_ms, chunk.end_ms), (0, 5000));
        assert_eq!(janitor.pending(), 0);
    }

    #[test]
    fn test_thirty_megabytes_into_two_chunks() {
        // 10 minutes at 100 Hz, 500 bytes per sample: 30 MB at any profile
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("prepared.wav");
        fs::write(&source, b"placeholder").unwrap();

        let decoder = Arc::new(FixedDecoder::new(vec![0.1; 60_000], 100));
        let encoder = Arc::new(UniformEncoder::new(500, 0));
        let janitor = ArtifactJanitor::new();

        let plan = splitter(dir.path(), decoder, encoder, ChunkingConfig::default(), 100)
            .split(&asset(&source, 30 * MB, 600_000, 100), 25 * MB, &janitor)
            .unwrap();

        assert_eq!(plan.len(), 2);
        assert!(plan.chunks().iter().all(|c| c.byte_size <= 25 * MB));
        assert_eq!(plan.total_duration_ms(), 600_000);
        assert!(plan.validate().is_ok());
        // compressed copy + two chunks
        assert_eq!(janitor.pending(), 3);
    }

    #[test]
    fn test_oversized_chunks_are_halved() {
        // A fixed per-file overhead defeats the proportional estimate
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("prepared.wav");
        fs::write(&source, b"placeholder").unwrap();

        let decoder = Arc::new(FixedDecoder::new(vec![0.1; 6_000], 100));
        let encoder = Arc::new(UniformEncoder::new(1, 2_000));
        let janitor = ArtifactJanitor::new();

        let plan = splitter(dir.path(), decoder, encoder, ChunkingConfig::default(), 100)
            .split(&asset(&source, 12_000, 60_000, 100), 3_000, &janitor)
            .unwrap();

        assert!(plan.validate().is_ok());
        assert_eq!(plan.total_duration_ms(), 60_000);
        assert_eq!(plan.chunks()[0].duration_ms(), 5_375);
        assert_eq!(plan.len(), 10);
        assert!(plan.chunks().iter().all(|c| c.byte_size <= 3_000));
    }

    #[test]
    fn test_unfittable_chunk_fails() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("prepared.wav");
        fs::write(&source, b"placeholder").unwrap();

        let decoder = Arc::new(FixedDecoder::new(vec![0.1; 6_000], 100));
        let encoder = Arc::new(UniformEncoder::new(1, 5_000));

        let err = splitter(dir.path(), decoder, encoder, ChunkingConfig::default(), 100)
            .split(&asset(&source, 12_000, 60_000, 100), 3_000, &ArtifactJanitor::new())
            .unwrap_err();
        assert_eq!(err.code(), "chunk_too_large");
        // Gave up only after going below the floor
        assert!(err.detail().contains("at 3840ms"), "{}", err.detail());
    }

    #[test]
    fn test_halving_may_cross_the_floor_once() {
        // 5928ms still overflows, 2964ms fits
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("prepared.wav");
        fs::write(&source, b"placeholder").unwrap();

        let decoder = Arc::new(FixedDecoder::new(vec![0.1; 6_000], 100));
        let encoder = Arc::new(UniformEncoder::new(1, 1_000));

        let plan = splitter(dir.path(), decoder, encoder, ChunkingConfig::default(), 100)
            .split(&asset(&source, 12_000, 60_000, 100), 1_500, &ArtifactJanitor::new())
            .unwrap();

        assert!(plan.validate().is_ok());
        assert_eq!(plan.chunks()[0].duration_ms(), 2_964);
        assert_eq!(plan.len(), 19);
        assert_eq!(plan.total_duration_ms(), 60_000);
        assert!(plan.chunks().iter().all(|c| c.byte_size <= 1_500));
    }

    #[test]
    fn test_halving_cap_is_enforced() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("prepared.wav");
        fs::write(&source, b"placeholder").unwrap();

        // Fits after two halvings, but only one is allowed
        let config = ChunkingConfig {
            max_halvings: 1,
            ..ChunkingConfig::default()
        };
        let decoder = Arc::new(FixedDecoder::new(vec![0.1; 6_000], 100));
        let encoder = Arc::new(UniformEncoder::new(1, 2_000));

        let err = splitter(dir.path(), decoder, encoder, config, 100)
            .split(&asset(&source, 12_000, 60_000, 100), 3_000, &ArtifactJanitor::new())
            .unwrap_err();
        assert_eq!(err.code(), "chunk_too_large");
    }

    #[test]
    fn test_compression_alone_can_fit() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("prepared.wav");
        let encoder = WavEncoder::new();
        let size = encoder
            .encode(&tone(1000, 16_000), 16_000, EncodeProfile::Canonical, &source)
            .unwrap();
        let janitor = ArtifactJanitor::new();

        let plan = splitter(
            dir.path(),
            Arc::new(SymphoniaDecoder::new()),
            Arc::new(encoder),
            ChunkingConfig::default(),
            16_000,
        )
        .split(&asset(&source, size, 1000, 16_000), 20_000, &janitor)
        .unwrap();

        assert_eq!(plan.len(), 1);
        let chunk = &plan.chunks()[0];
        assert_ne!(chunk.path, source);
        assert_eq!(chunk.byte_size, 44 + 16_000);
        assert!(janitor.is_tracked(&chunk.path));
    }

    #[test]
    fn test_real_wav_split() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("prepared.wav");
        let encoder = WavEncoder::new();
        let size = encoder
            .encode(&tone(10_000, 16_000), 16_000, EncodeProfile::Canonical, &source)
            .unwrap();
        let janitor = ArtifactJanitor::new();

        let plan = splitter(
            dir.path(),
            Arc::new(SymphoniaDecoder::new()),
            Arc::new(encoder),
            ChunkingConfig::default(),
            16_000,
        )
        .split(&asset(&source, size, 10_000, 16_000), 60_000, &janitor)
        .unwrap();

        assert!(plan.validate().is_ok());
        assert_eq!(plan.len(), 4);
        assert_eq!(plan.total_duration_ms(), 10_000);
        for chunk in plan.chunks() {
            assert!(chunk.path.exists());
            assert_eq!(fs::metadata(&chunk.path).unwrap().len(), chunk.byte_size);
        }

        janitor.release_all();
        assert!(plan.chunks().iter().all(|c| !c.path.exists()));
        assert!(source.exists());
    }
}
