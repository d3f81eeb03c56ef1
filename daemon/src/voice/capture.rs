//! Microphone capture
//!
//! Audio arrives in fixed-size blocks on a dedicated thread and is handed to
//! a callback. The callback runs on the capture thread and must never block.
//!
//! The default backend opens a mono f32 stream in-process with cpal and
//! regroups it into blocks. The `arecord` backend reads raw S16LE mono from
//! a child process instead, for hosts where cpal cannot see the device.

use std::io::Read;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

use tracing::{error, info, warn};

use crate::config::{CaptureBackend, RecognizerConfig};

/// Errors that can occur while starting capture
#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("audio capture is already running")]
    AlreadyRunning,

    #[error("failed to start recorder: {0}")]
    Recorder(#[from] std::io::Error),

    #[error("recorder has no stdout")]
    NoStdout,

    #[error("audio device error: {0}")]
    Device(String),

    #[error("failed to spawn capture thread: {0}")]
    ThreadSpawn(String),
}

/// Microphone capture feeding a sample callback
pub struct AudioCapture {
    running: Arc<AtomicBool>,
    recorder: Mutex<Option<std::process::Child>>,
}

impl AudioCapture {
    pub fn new() -> Self {
        Self {
            running: Arc::new(AtomicBool::new(false)),
            recorder: Mutex::new(None),
        }
    }

    /// Start capturing, invoking `on_samples` for every block
    pub fn start<F>(&self, config: &RecognizerConfig, on_samples: F) -> Result<(), CaptureError>
    where
        F: FnMut(&[i16]) + Send + 'static,
    {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(CaptureError::AlreadyRunning);
        }

        let result = self.start_backend(config, on_samples);
        if result.is_err() {
            self.running.store(false, Ordering::SeqCst);
        }
        result
    }

    fn start_backend<F>(&self, config: &RecognizerConfig, on_samples: F) -> Result<(), CaptureError>
    where
        F: FnMut(&[i16]) + Send + 'static,
    {
        match config.capture {
            CaptureBackend::Cpal => self.start_cpal(config, on_samples),
            CaptureBackend::Arecord => self.start_arecord(config, on_samples),
        }
    }

    fn start_arecord<F>(&self, config: &RecognizerConfig, on_samples: F) -> Result<(), CaptureError>
    where
        F: FnMut(&[i16]) + Send + 'static,
    {
        use std::process::{Command, Stdio};

        let mut child = Command::new("arecord")
            .args(["-q", "-t", "raw", "-f", "S16_LE", "-c", "1"])
            .arg("-r")
            .arg(config.sample_rate.to_string())
            .arg("-D")
            .arg(&config.device)
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()?;

        let Some(stdout) = child.stdout.take() else {
            let _ = child.kill();
            return Err(CaptureError::NoStdout);
        };

        let running = Arc::clone(&self.running);
        let block_size = config.block_size;

        thread::Builder::new()
            .name("audio-capture".to_string())
            .spawn(move || {
                info!("audio capture thread started");
                pump(stdout, block_size, &running, on_samples);
                running.store(false, Ordering::SeqCst);
                info!("audio capture thread stopped");
            })
            .map_err(|e| CaptureError::ThreadSpawn(e.to_string()))?;

        if let Ok(mut recorder) = self.recorder.lock() {
            *recorder = Some(child);
        }

        info!(
            device = %config.device,
            sample_rate = config.sample_rate,
            block_size = config.block_size,
            "audio capture started (arecord)"
        );
        Ok(())
    }

    fn start_cpal<F>(&self, config: &RecognizerConfig, mut on_samples: F) -> Result<(), CaptureError>
    where
        F: FnMut(&[i16]) + Send + 'static,
    {
        use cpal::traits::{DeviceTrait, StreamTrait};

        let running = Arc::clone(&self.running);
        let device_name = config.device.clone();
        let sample_rate = config.sample_rate;
        let mut blocks = BlockAssembler::new(config.block_size);
        let (ready_tx, ready_rx) = std::sync::mpsc::channel::<Result<(), CaptureError>>();

        // cpal streams are not Send; the stream lives and dies on this thread
        thread::Builder::new()
            .name("audio-capture".to_string())
            .spawn(move || {
                let open = || -> Result<cpal::Stream, CaptureError> {
                    let (device, stream_config) = input_stream(&device_name, sample_rate)?;
                    let stream = device
                        .build_input_stream(
                            &stream_config,
                            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                                blocks.push(data, &mut on_samples);
                            },
                            |err| error!(error = %err, "audio capture error"),
                            None,
                        )
                        .map_err(|e| CaptureError::Device(e.to_string()))?;
                    stream.play().map_err(|e| CaptureError::Device(e.to_string()))?;
                    Ok(stream)
                };

                let stream = match open() {
                    Ok(stream) => {
                        let _ = ready_tx.send(Ok(()));
                        stream
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };

                info!("audio capture thread started");
                while running.load(Ordering::SeqCst) {
                    thread::sleep(std::time::Duration::from_millis(100));
                }
                drop(stream);
                info!("audio capture thread stopped");
            })
            .map_err(|e| CaptureError::ThreadSpawn(e.to_string()))?;

        ready_rx
            .recv()
            .map_err(|_| CaptureError::Device("capture thread exited".to_string()))??;

        info!(
            device = %config.device,
            sample_rate,
            block_size = config.block_size,
            "audio capture started (cpal)"
        );
        Ok(())
    }

    /// Stop capturing; the thread exits once the recorder closes
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);

        let child = self.recorder.lock().ok().and_then(|mut r| r.take());
        if let Some(mut child) = child {
            if let Err(e) = child.kill() {
                warn!(error = %e, "failed to stop recorder");
            }
            let _ = child.wait();
        }
    }

    #[cfg(test)]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

impl Default for AudioCapture {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for AudioCapture {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Read fixed-size blocks of S16LE samples and hand each to the callback
fn pump<R, F>(mut reader: R, block_size: usize, running: &AtomicBool, mut on_samples: F)
where
    R: Read,
    F: FnMut(&[i16]),
{
    let mut bytes = vec![0u8; block_size * 2];
    let mut samples = Vec::with_capacity(block_size);

    while running.load(Ordering::SeqCst) {
        if let Err(e) = reader.read_exact(&mut bytes) {
            if running.load(Ordering::SeqCst) {
                error!(error = %e, "audio stream ended");
            }
            break;
        }

        samples.clear();
        samples.extend(
            bytes
                .chunks_exact(2)
                .map(|pair| i16::from_le_bytes([pair[0], pair[1]])),
        );
        on_samples(&samples);
    }
}

/// Open the named input device (or the default) as a mono f32 stream
fn input_stream(
    name: &str,
    sample_rate: u32,
) -> Result<(cpal::Device, cpal::StreamConfig), CaptureError> {
    use cpal::traits::{DeviceTrait, HostTrait};

    let host = cpal::default_host();
    let device = if name == "default" {
        host.default_input_device()
    } else {
        host.input_devices()
            .map_err(|e| CaptureError::Device(e.to_string()))?
            .find(|d| d.name().map(|n| n == name).unwrap_or(false))
    }
    .ok_or_else(|| CaptureError::Device(format!("no input device named {name}")))?;

    let rate = cpal::SampleRate(sample_rate);
    let supported = device
        .supported_input_configs()
        .map_err(|e| CaptureError::Device(e.to_string()))?
        .find(|c| {
            c.channels() == 1
                && c.sample_format() == cpal::SampleFormat::F32
                && c.min_sample_rate() <= rate
                && c.max_sample_rate() >= rate
        })
        .ok_or_else(|| {
            CaptureError::Device(format!("{name} has no mono f32 config at {sample_rate} Hz"))
        })?;

    Ok((device, supported.with_sample_rate(rate).config()))
}

/// Regroups variable-sized f32 callbacks into fixed-size i16 blocks
struct BlockAssembler {
    block: Vec<i16>,
    block_size: usize,
}

impl BlockAssembler {
    fn new(block_size: usize) -> Self {
        Self {
            block: Vec::with_capacity(block_size),
            block_size,
        }
    }

    fn push<F: FnMut(&[i16])>(&mut self, data: &[f32], on_block: &mut F) {
        for &sample in data {
            self.block.push(to_i16(sample));
            if self.block.len() == self.block_size {
                on_block(&self.block);
                self.block.clear();
            }
        }
    }
}

#[allow(clippy::cast_possible_truncation)]
fn to_i16(sample: f32) -> i16 {
    (sample * 32767.0).clamp(-32768.0, 32767.0) as i16
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    fn le_bytes(samples: &[i16]) -> Vec<u8> {
        samples.iter().flat_map(|s| s.to_le_bytes()).collect()
    }

    #[test]
    fn test_pump_delivers_whole_blocks() {
        let source = le_bytes(&[1, -1, 300, -300, 32767, -32768, 7]);
        let running = AtomicBool::new(true);
        let mut blocks = Vec::new();

        pump(Cursor::new(source), 2, &running, |block| blocks.push(block.to_vec()));

        // the trailing partial block is dropped
        assert_eq!(blocks, vec![vec![1, -1], vec![300, -300], vec![32767, -32768]]);
    }

    #[test]
    fn test_pump_stops_when_not_running() {
        let running = AtomicBool::new(false);
        let mut calls = 0;
        pump(Cursor::new(le_bytes(&[1, 2, 3, 4])), 2, &running, |_| calls += 1);
        assert_eq!(calls, 0);
    }

    #[test]
    fn test_block_assembler_regroups_callbacks() {
        let mut assembler = BlockAssembler::new(3);
        let mut blocks = Vec::new();
        let mut collect = |block: &[i16]| blocks.push(block.to_vec());

        assembler.push(&[0.0, 1.0], &mut collect);
        assembler.push(&[-1.0, 0.5, 2.0, -2.0, 0.25], &mut collect);

        assert_eq!(
            blocks,
            vec![vec![0, 32767, -32767], vec![16383, 32767, -32768]]
        );
        assert_eq!(assembler.block, vec![8191]);
    }

    #[test]
    fn test_capture_creation() {
        let capture = AudioCapture::new();
        assert!(!capture.is_running());
        capture.stop();
    }
}
