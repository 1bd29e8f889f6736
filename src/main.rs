use std::io::BufRead;
use std::process::ExitCode;
use std::thread;

use crossbeam_channel::Sender;
use signal_hook::consts::SIGINT;
use signal_hook::iterator::Signals;
use tracing::{error, info, warn};

use rtmp_capture::config::read_config;
use rtmp_capture::logger::init_logger;
use rtmp_capture::RtmpServer;

fn main() -> ExitCode {
    let config = read_config();
    init_logger(&config);
    info!("Starting RTMP capture server with config:\n{:#?}", config);

    let server = match RtmpServer::start(config) {
        Ok(server) => server,
        Err(error) => {
            error!(?error, "failed to start RTMP server");
            return ExitCode::FAILURE;
        }
    };

    let (stop_sender, stop_receiver) = crossbeam_channel::bounded::<&'static str>(1);
    listen_for_sigint(stop_sender.clone());
    listen_for_console(stop_sender);

    // First stop request wins, either source.
    if let Ok(reason) = stop_receiver.recv() {
        info!(%reason, "stop requested, draining connections");
    }
    server.stop();
    ExitCode::SUCCESS
}

fn listen_for_sigint(stop: Sender<&'static str>) {
    thread::Builder::new()
        .name("signal listener".to_string())
        .spawn(move || {
            let mut signals = match Signals::new([SIGINT]) {
                Ok(signals) => signals,
                Err(error) => {
                    error!(?error, "failed to install signal handler");
                    return;
                }
            };
            if signals.forever().next().is_some() {
                let _ = stop.try_send("SIGINT");
            }
        })
        .unwrap();
}

/// Reads console commands from stdin. `q` quits, anything else is reported.
fn listen_for_console(stop: Sender<&'static str>) {
    thread::Builder::new()
        .name("console listener".to_string())
        .spawn(move || {
            let stdin = std::io::stdin();
            for line in stdin.lock().lines() {
                let Ok(line) = line else {
                    return;
                };
                match line.trim() {
                    "q" => {
                        let _ = stop.try_send("console quit");
                        return;
                    }
                    "" => {}
                    other => warn!(command = other, "unknown console command"),
                }
            }
        })
        .unwrap();
}
