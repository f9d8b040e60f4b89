use std::fs;
use std::io::{self, BufRead};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use clap::Parser;
use rtpjpeg::media::jpeg::{DEFAULT_BUFFER_CAPACITY, PAYLOAD_TYPE};
use rtpjpeg::transport::{UdpReceiver, receive_loop};
use rtpjpeg::{DepacketizerConfig, StreamConfig, StreamRegistry, VideoFrame};

#[derive(Parser)]
#[command(
    name = "rtpjpeg-recv",
    about = "Receive RTP/JPEG (RFC 2435) over UDP and write each frame as a .jpg file"
)]
struct Args {
    /// UDP bind address (host:port)
    #[arg(long, short, default_value = "0.0.0.0:5004")]
    bind: String,

    /// Directory the frames are written to
    #[arg(long, short, default_value = "frames")]
    out: PathBuf,

    /// Only accept packets with this RTP payload type
    #[arg(long, default_value_t = PAYLOAD_TYPE)]
    payload_type: u8,

    /// Accept packets of any payload type
    #[arg(long)]
    any_payload_type: bool,

    /// Discard a frame still incomplete after this many milliseconds (0 = never)
    #[arg(long, default_value_t = 1000)]
    frame_timeout_ms: u64,

    /// Reassembly buffer size per stream, in bytes
    #[arg(long, default_value_t = DEFAULT_BUFFER_CAPACITY)]
    buffer_capacity: usize,

    /// Stop after writing this many frames
    #[arg(long)]
    max_frames: Option<u64>,
}

fn frame_path(dir: &Path, ssrc: u32, index: u64) -> PathBuf {
    dir.join(format!("{ssrc:08x}-{index:06}.jpg"))
}

/// Clear `running` once a line is entered. A closed or unreadable input
/// (EOF under a service manager or `< /dev/null`) leaves it set.
fn stop_on_enter(mut input: impl BufRead, running: &AtomicBool) {
    let mut line = String::new();
    match input.read_line(&mut line) {
        Ok(n) if n > 0 => running.store(false, Ordering::SeqCst),
        Ok(_) => tracing::debug!("stdin closed, running until stopped"),
        Err(e) => tracing::debug!(error = %e, "stdin unreadable, running until stopped"),
    }
}

fn main() {
    tracing_subscriber::fmt::init();

    let args = Args::parse();

    let config = StreamConfig {
        depacketizer: DepacketizerConfig {
            buffer_capacity: args.buffer_capacity,
            ..Default::default()
        },
        frame_timeout: (args.frame_timeout_ms > 0)
            .then(|| Duration::from_millis(args.frame_timeout_ms)),
        ..Default::default()
    };
    let registry = match StreamRegistry::with_config(config) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("Invalid configuration: {}", e);
            return;
        }
    };

    if let Err(e) = fs::create_dir_all(&args.out) {
        eprintln!("Failed to create {}: {}", args.out.display(), e);
        return;
    }

    let receiver = match UdpReceiver::bind(&args.bind) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("Failed to bind {}: {}", args.bind, e);
            return;
        }
    };

    let running = Arc::new(AtomicBool::new(true));
    let payload_type = (!args.any_payload_type).then_some(args.payload_type);
    let out = args.out.clone();
    let max_frames = args.max_frames;
    let loop_running = running.clone();

    let handle = thread::spawn(move || {
        let mut written = 0u64;
        let stop = loop_running.clone();
        let on_frame = |ssrc, frame: VideoFrame| {
            let path = frame_path(&out, ssrc, written);
            match fs::write(&path, &frame.data) {
                Ok(()) => {
                    written += 1;
                    tracing::debug!(
                        path = %path.display(),
                        len = frame.len(),
                        ts = frame.timestamp,
                        "frame written"
                    );
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "failed to write frame")
                }
            }
            if max_frames.is_some_and(|max| written >= max) {
                stop.store(false, Ordering::SeqCst);
            }
        };
        receive_loop(receiver, registry, payload_type, loop_running, on_frame);
        written
    });

    println!(
        "Receiving RTP/JPEG on {} into {}; press Enter to stop",
        args.bind,
        args.out.display()
    );

    // The receive thread also stops on its own once --max-frames is reached.
    let watcher = running.clone();
    thread::spawn(move || stop_on_enter(io::stdin().lock(), &watcher));

    match handle.join() {
        Ok(written) => println!("Wrote {} frames", written),
        Err(_) => eprintln!("Receive thread panicked"),
    }
}
