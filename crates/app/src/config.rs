//! Configuration for the chaoslink application.
//!
//! Parses the subcommand and its flags by hand and resolves defaults. The
//! tool should work with only a role and the peer address; every protocol
//! constant has the canonical default and can be printed for reproduction.

use chaoslink_core::codec::{DERIVED_SCALE, LEGACY_SCALE};
use chaoslink_core::sync::SyncConfig;
use std::time::Duration;

/// Which session this process runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleCmd {
    Send,
    Recv,
    Demo,
}

/// Complete configuration for one run.
#[derive(Debug, Clone)]
pub struct Config {
    pub role: RoleCmd,

    // === Addressing ===
    /// Destination "host:port" (send)
    pub dest: String,

    /// Local bind address (recv: the listening port; send: ephemeral)
    pub bind: String,

    // === Protocol ===
    /// Integration time step in seconds
    pub dt: f64,

    /// Preamble length in frames
    pub preamble: u32,

    /// Message ticks between background sync frames
    pub sync_interval: u64,

    /// Codec scale shared by both endpoints
    pub scale: f64,

    /// Synchronization thresholds
    pub sync: SyncConfig,

    // === Timing ===
    /// Receive timeout per tick
    pub recv_timeout: Duration,

    /// Skip pacing delays (accelerated run)
    pub fast: bool,

    // === Demo ===
    /// Message for the in-process demo
    pub demo_message: String,

    /// Channel loss rate for the demo
    pub demo_loss: f64,

    /// Channel seed for the demo
    pub demo_seed: u64,

    // === Behavior ===
    /// Suppress per-character observation output
    pub quiet: bool,

    /// Print resolved configuration before running
    pub print_config: bool,

    /// Print the metrics summary at shutdown
    pub print_metrics: bool,
}

impl Config {
    /// Parse configuration from command-line arguments (without argv[0]).
    pub fn from_args(args: &[String]) -> Result<Self, String> {
        let role = match args.first().map(String::as_str) {
            Some("send") => RoleCmd::Send,
            Some("recv") => RoleCmd::Recv,
            Some("demo") => RoleCmd::Demo,
            Some("--help") | Some("-h") => {
                print_help();
                std::process::exit(0);
            }
            Some(other) => return Err(format!("unknown subcommand: {other}")),
            None => return Err("missing subcommand (send, recv, or demo)".to_string()),
        };

        let mut dest: Option<String> = None;
        let mut bind: Option<String> = None;
        let mut dt: Option<f64> = None;
        let mut preamble: Option<u32> = None;
        let mut sync_interval: Option<u64> = None;
        let mut scale: Option<f64> = None;
        let mut legacy_scale = false;
        let mut timeout_ms: Option<u64> = None;
        let mut fast = false;
        let mut demo_message: Option<String> = None;
        let mut demo_loss: Option<f64> = None;
        let mut demo_seed: Option<u64> = None;
        let mut quiet = false;
        let mut print_config = false;
        let mut print_metrics = true;

        let mut i = 1;
        while i < args.len() {
            match args[i].as_str() {
                "--dest" => {
                    i += 1;
                    if i >= args.len() {
                        return Err("--dest requires host:port".to_string());
                    }
                    dest = Some(args[i].clone());
                }
                "--bind" => {
                    i += 1;
                    if i >= args.len() {
                        return Err("--bind requires an address".to_string());
                    }
                    bind = Some(args[i].clone());
                }
                "--dt" => {
                    i += 1;
                    if i >= args.len() {
                        return Err("--dt requires seconds".to_string());
                    }
                    dt = Some(args[i].parse().map_err(|_| "invalid dt")?);
                }
                "--preamble" => {
                    i += 1;
                    if i >= args.len() {
                        return Err("--preamble requires a count".to_string());
                    }
                    preamble = Some(args[i].parse().map_err(|_| "invalid preamble")?);
                }
                "--sync-interval" => {
                    i += 1;
                    if i >= args.len() {
                        return Err("--sync-interval requires a count".to_string());
                    }
                    let value: u64 = args[i].parse().map_err(|_| "invalid sync-interval")?;
                    if value == 0 {
                        return Err("--sync-interval must be at least 1".to_string());
                    }
                    sync_interval = Some(value);
                }
                "--scale" => {
                    i += 1;
                    if i >= args.len() {
                        return Err("--scale requires a number".to_string());
                    }
                    scale = Some(args[i].parse().map_err(|_| "invalid scale")?);
                }
                "--legacy-scale" => {
                    legacy_scale = true;
                }
                "--timeout-ms" => {
                    i += 1;
                    if i >= args.len() {
                        return Err("--timeout-ms requires a number".to_string());
                    }
                    timeout_ms = Some(args[i].parse().map_err(|_| "invalid timeout-ms")?);
                }
                "--fast" => {
                    fast = true;
                }
                "--message" => {
                    i += 1;
                    if i >= args.len() {
                        return Err("--message requires text".to_string());
                    }
                    demo_message = Some(args[i].clone());
                }
                "--loss" => {
                    i += 1;
                    if i >= args.len() {
                        return Err("--loss requires a rate 0.0-1.0".to_string());
                    }
                    demo_loss = Some(args[i].parse().map_err(|_| "invalid loss rate")?);
                }
                "--seed" => {
                    i += 1;
                    if i >= args.len() {
                        return Err("--seed requires a number".to_string());
                    }
                    demo_seed = Some(args[i].parse().map_err(|_| "invalid seed")?);
                }
                "--quiet" => {
                    quiet = true;
                }
                "--print-config" => {
                    print_config = true;
                }
                "--no-metrics" => {
                    print_metrics = false;
                }
                "--help" | "-h" => {
                    print_help();
                    std::process::exit(0);
                }
                other => {
                    return Err(format!("unknown argument: {other}"));
                }
            }
            i += 1;
        }

        if scale.is_some() && legacy_scale {
            return Err("--scale and --legacy-scale are mutually exclusive".to_string());
        }

        let scale = scale.unwrap_or(if legacy_scale {
            LEGACY_SCALE
        } else {
            DERIVED_SCALE
        });

        let config = Config {
            role,
            dest: dest.unwrap_or_else(|| "127.0.0.1:12346".to_string()),
            bind: bind.unwrap_or_else(|| match role {
                RoleCmd::Recv => "0.0.0.0:12346".to_string(),
                _ => "0.0.0.0:0".to_string(),
            }),
            dt: dt.unwrap_or(0.001),
            preamble: preamble.unwrap_or(1000),
            sync_interval: sync_interval.unwrap_or(10),
            scale,
            sync: SyncConfig::default(),
            recv_timeout: Duration::from_millis(timeout_ms.unwrap_or(100)),
            fast,
            demo_message: demo_message.unwrap_or_else(|| "HELLO CHAOS".to_string()),
            demo_loss: demo_loss.unwrap_or(0.0),
            demo_seed: demo_seed.unwrap_or(42),
            quiet,
            print_config,
            print_metrics,
        };

        Ok(config)
    }

    /// Print the configuration in human-readable form.
    pub fn print(&self) {
        println!("=== Configuration ===");
        println!("Role: {:?}", self.role);
        match self.role {
            RoleCmd::Send => {
                println!("Destination: {}", self.dest);
                println!("Bind: {}", self.bind);
            }
            RoleCmd::Recv => {
                println!("Bind: {}", self.bind);
            }
            RoleCmd::Demo => {
                println!("Message: {:?}", self.demo_message);
                println!("Loss rate: {:.2}%", self.demo_loss * 100.0);
                println!("Seed: {}", self.demo_seed);
            }
        }
        println!();
        println!("dt: {} s", self.dt);
        println!("Preamble: {} frames", self.preamble);
        println!("Sync interval: {} ticks", self.sync_interval);
        println!("Codec scale: {:.6}", self.scale);
        println!("Lock threshold: {:.0e}", self.sync.lock_threshold);
        println!("Resync threshold: {:.0e}", self.sync.resync_threshold);
        println!("Receive timeout: {} ms", self.recv_timeout.as_millis());
        println!("Pacing: {}", if self.fast { "off (fast)" } else { "dt per tick" });
        println!();
    }
}

fn print_help() {
    println!("chaoslink: covert messaging over chaos synchronization");
    println!();
    println!("USAGE:");
    println!("    chaoslink <send|recv|demo> [OPTIONS]");
    println!();
    println!("COMMON OPTIONS:");
    println!("    --dt <S>               Integration step in seconds (default: 0.001)");
    println!("    --preamble <N>         Preamble frames (default: 1000)");
    println!("    --sync-interval <N>    Ticks between sync frames (default: 10)");
    println!("    --scale <X>            Codec scale (default: 0.25/95)");
    println!("    --legacy-scale         Use the historical 0.001 scale");
    println!("    --fast                 Disable pacing delays");
    println!("    --print-config         Print resolved configuration");
    println!("    --no-metrics           Don't print the session summary");
    println!("    --help, -h             Print this help");
    println!();
    println!("SEND:");
    println!("    --dest <HOST:PORT>     Peer address (default: 127.0.0.1:12346)");
    println!("    --bind <ADDR>          Local address (default: ephemeral port)");
    println!();
    println!("RECV:");
    println!("    --bind <HOST:PORT>     Listening address (default: 0.0.0.0:12346)");
    println!("    --timeout-ms <N>       Per-tick receive timeout (default: 100)");
    println!("    --quiet                Suppress per-character output");
    println!();
    println!("DEMO (both sessions in-process over a simulated channel):");
    println!("    --message <TEXT>       Message to transfer (default: \"HELLO CHAOS\")");
    println!("    --loss <RATE>          Frame loss rate 0.0-1.0 (default: 0)");
    println!("    --seed <N>             Channel seed (default: 42)");
    println!();
    println!("EXAMPLES:");
    println!("    chaoslink recv --bind 0.0.0.0:12346");
    println!("    chaoslink send --dest 192.168.1.5:12346");
    println!("    chaoslink demo --message \"covert\" --loss 0.02 --seed 7");
    println!();
}
