//! chaoslink binary: wires sessions to stdin/stdout, UDP, and Ctrl-C.

mod config;
mod observer;

use chaoslink_core::codec::SymbolCodec;
use chaoslink_core::link::{LinkConfig, LossyLink};
use chaoslink_core::receiver::{ReceiverConfig, ReceiverSession};
use chaoslink_core::sender::{MessageSource, QueuedSource, SenderConfig, SenderSession};
use chaoslink_core::transport::UdpTransport;
use config::{Config, RoleCmd};
use observer::PrintObserver;
use std::io::BufRead;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Line-buffered stdin message source. EOF ends the messaging phase.
struct StdinSource {
    stdin: std::io::Stdin,
}

impl StdinSource {
    fn new() -> Self {
        Self {
            stdin: std::io::stdin(),
        }
    }
}

impl MessageSource for StdinSource {
    fn next_line(&mut self) -> chaoslink_core::Result<Option<String>> {
        let mut line = String::new();
        let n = self.stdin.lock().read_line(&mut line)?;
        if n == 0 {
            return Ok(None);
        }
        // Strip the trailing newline; it is outside the alphabet anyway
        while line.ends_with('\n') || line.ends_with('\r') {
            line.pop();
        }
        Ok(Some(line))
    }
}

fn main() {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let config = match Config::from_args(&args) {
        Ok(config) => config,
        Err(message) => {
            eprintln!("error: {message}");
            eprintln!("try: chaoslink --help");
            std::process::exit(2);
        }
    };

    if config.print_config {
        config.print();
    }

    let stop = Arc::new(AtomicBool::new(false));
    {
        let stop = Arc::clone(&stop);
        if let Err(err) = ctrlc::set_handler(move || stop.store(true, Ordering::Relaxed)) {
            eprintln!("warning: could not install Ctrl-C handler: {err}");
        }
    }

    let result = match config.role {
        RoleCmd::Send => run_send(&config, &stop),
        RoleCmd::Recv => run_recv(&config, &stop),
        RoleCmd::Demo => run_demo(&config, &stop),
    };

    if let Err(err) = result {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn codec_from(config: &Config) -> chaoslink_core::Result<SymbolCodec> {
    SymbolCodec::new(config.scale)
}

fn sender_config(config: &Config) -> SenderConfig {
    let mut sc = SenderConfig::new(config.dest.clone());
    sc.dt = config.dt;
    sc.preamble_steps = config.preamble;
    sc.sync_interval = config.sync_interval;
    sc.pace = if config.fast {
        Duration::ZERO
    } else {
        Duration::from_secs_f64(config.dt)
    };
    sc
}

fn receiver_config(config: &Config) -> ReceiverConfig {
    ReceiverConfig {
        dt: config.dt,
        recv_timeout: config.recv_timeout,
        idle_limit: None,
        sync: config.sync,
    }
}

fn run_send(config: &Config, stop: &AtomicBool) -> chaoslink_core::Result<()> {
    let transport = UdpTransport::bind(&config.bind)?;
    let codec = codec_from(config)?;

    println!("[SENDER] Transmitting sync preamble to {}...", config.dest);
    let mut session = SenderSession::new(transport, StdinSource::new(), codec, sender_config(config));

    println!("[SENDER] Type message lines after the preamble; Ctrl-D to finish");
    session.run(stop)?;

    if config.print_metrics {
        session.metrics().print_summary();
    }
    Ok(())
}

fn run_recv(config: &Config, stop: &AtomicBool) -> chaoslink_core::Result<()> {
    let transport = UdpTransport::bind(&config.bind)?;
    let codec = codec_from(config)?;

    println!("[RECEIVER] Listening on {}", config.bind);
    println!("[RECEIVER] Starting adaptive synchronization...");

    let observer = PrintObserver::new(config.quiet);
    let mut session = ReceiverSession::new(transport, codec, observer, receiver_config(config));
    let decoded = session.run(stop)?;

    println!("\nFINAL MESSAGE: {decoded}");
    if config.print_metrics {
        session.metrics().print_summary();
    }
    Ok(())
}

/// Both sessions in one process over the simulated channel, accelerated.
/// The link queues every frame, so running the sender to completion first
/// and then the receiver reproduces the wire behavior deterministically.
fn run_demo(config: &Config, stop: &AtomicBool) -> chaoslink_core::Result<()> {
    let link = LinkConfig {
        loss_rate: config.demo_loss,
        corrupt_rate: 0.0,
        seed: config.demo_seed,
    };
    let (tx_end, rx_end) = LossyLink::pair(link);
    let codec = codec_from(config)?;

    println!("[DEMO] Transferring {:?} over a simulated channel (loss {:.1}%, seed {})",
        config.demo_message, config.demo_loss * 100.0, config.demo_seed);

    let source = QueuedSource::new([config.demo_message.clone()]);
    let mut sc = sender_config(config);
    sc.pace = Duration::ZERO;
    let mut sender = SenderSession::new(tx_end, source, codec, sc);
    sender.run(stop)?;

    let mut rc = receiver_config(config);
    rc.recv_timeout = Duration::ZERO;
    rc.idle_limit = Some(5);
    let observer = PrintObserver::new(config.quiet);
    let mut receiver = ReceiverSession::new(rx_end, codec, observer, rc);
    let decoded = receiver.run(stop)?;

    println!("\nFINAL MESSAGE: {}", decoded.trim_start_matches(' '));
    if config.print_metrics {
        sender.metrics().print_summary();
        receiver.metrics().print_summary();
    }
    Ok(())
}
