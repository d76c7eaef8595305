use anyhow::{Context, Result};
use clap::Parser;
use psmove_client::prelude::*;
use psmove_client::{Button, ButtonState, ConnectionState, ControllerId, ResponseBody};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// PSMove controller monitor
///
/// Connects to the tracking service, streams one controller and prints its
/// pose and buttons until interrupted.
#[derive(Parser, Debug)]
#[command(name = "psmove-monitor")]
#[command(about = "Stream and print the state of one PSMove controller")]
#[command(version)]
pub struct Args {
    /// Service host
    #[arg(long, default_value = "localhost")]
    pub host: String,

    /// Service port
    #[arg(short, long, default_value = "9512")]
    pub port: u16,

    /// Controller to stream
    #[arg(short, long, default_value = "0")]
    pub controller: ControllerId,

    /// Include raw accelerometer, gyroscope and magnetometer samples
    #[arg(long)]
    pub raw: bool,

    /// LED color as r,g,b applied once connected
    #[arg(long, value_parser = parse_color)]
    pub led: Option<(u8, u8, u8)>,

    /// Milliseconds between update cycles
    #[arg(long, default_value = "16")]
    pub poll_interval: u64,

    /// Milliseconds between state printouts
    #[arg(long, default_value = "500")]
    pub print_interval: u64,

    /// Log level (trace, debug, info, warning, error, fatal)
    #[arg(long, default_value = "info")]
    pub log_level: LogSeverity,
}

impl Args {
    fn client_config(&self) -> Result<ClientConfig> {
        let config = ClientConfig::new(self.host.clone(), self.port).with_log_level(self.log_level);
        config.validate().context("Invalid connection settings")?;
        Ok(config)
    }

    fn stream_flags(&self) -> StreamFlags {
        if self.raw {
            StreamFlags::INCLUDE_RAW_SENSOR_DATA
        } else {
            StreamFlags::NONE
        }
    }
}

fn parse_color(value: &str) -> std::result::Result<(u8, u8, u8), String> {
    let parts: Vec<&str> = value.split(',').map(str::trim).collect();
    let [r, g, b] = parts.as_slice() else {
        return Err(format!("expected r,g,b but got '{}'", value));
    };
    let channel = |s: &str| {
        s.parse::<u8>()
            .map_err(|e| format!("invalid color channel '{}': {}", s, e))
    };
    Ok((channel(*r)?, channel(*g)?, channel(*b)?))
}

fn main() -> Result<()> {
    let args = Args::parse();
    let config = args.client_config()?;

    let running = Arc::new(AtomicBool::new(true));
    let r = Arc::clone(&running);
    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })
    .context("Failed to install Ctrl+C handler")?;

    let mut client = ClientApi::new();
    client
        .startup_with_config(config)
        .context("Failed to start PSMove client")?;

    let view = client
        .allocate_controller_view(args.controller)
        .context("Client stopped before the controller view was allocated")?;

    println!(
        "Connecting to {}:{} for controller {} (Ctrl+C to quit)",
        args.host, args.port, args.controller
    );

    let mut list_request = INVALID_REQUEST_ID;
    let print_interval = Duration::from_millis(args.print_interval);
    let mut last_print = Instant::now();

    while running.load(Ordering::SeqCst) {
        client.update();

        while let Some(message) = client.poll_next_message() {
            match message {
                Message::Event {
                    event: ClientEvent::ConnectedToService,
                    ..
                } => {
                    info!("Connected, starting stream for controller {}", args.controller);
                    list_request = client.get_controller_list();
                    client.start_controller_data_stream(&view, args.stream_flags());
                    if let Some((r, g, b)) = args.led {
                        client.set_led_color(&view, r, g, b);
                    }
                }
                Message::Event {
                    event: ClientEvent::FailedToConnectToService | ClientEvent::DisconnectedFromService,
                    ..
                } => {
                    warn!("Lost the service connection");
                    running.store(false, Ordering::SeqCst);
                }
                Message::Event { event, payload } => {
                    let name = payload
                        .and_then(|handle| client.event_payload(handle).ok())
                        .map(|notification| notification.notification_type.to_string());
                    println!("[event] {:?} {}", event, name.unwrap_or_default());
                }
                Message::Response {
                    request_id,
                    result_code,
                    payload,
                } if request_id == list_request => {
                    if result_code != ResultCode::Ok {
                        warn!("Controller list request failed: {:?}", result_code);
                        continue;
                    }
                    if let Ok(response) = client.response_payload(payload) {
                        print_controller_list(&response.body);
                    }
                }
                Message::Response {
                    request_id,
                    result_code,
                    ..
                } => {
                    if result_code != ResultCode::Ok {
                        warn!("Request {} finished with {:?}", request_id, result_code);
                    }
                }
            }
        }

        if last_print.elapsed() >= print_interval {
            print_view(&view);
            last_print = Instant::now();
        }

        thread::sleep(Duration::from_millis(args.poll_interval));
    }

    if client.connection_state() == ConnectionState::Connected {
        client.stop_controller_data_stream(&view);
        client.update();
    }
    client.free_controller_view(view);
    client.shutdown();
    println!("Goodbye");

    Ok(())
}

fn print_controller_list(body: &ResponseBody) {
    let ResponseBody::ControllerList(controllers) = body else {
        return;
    };
    println!("Service reports {} controller(s):", controllers.len());
    for controller in controllers {
        println!(
            "  #{} {:?} at {}",
            controller.controller_id, controller.controller_type, controller.device_path
        );
    }
}

fn print_view(view: &ControllerViewHandle) {
    let state = view.snapshot();
    if !state.is_valid() {
        println!("controller {}: waiting for data", state.controller_id());
        return;
    }

    let q = state.orientation();
    let p = state.position();
    let held: Vec<String> = Button::ALL
        .iter()
        .filter(|button| matches!(state.button_state(**button), ButtonState::Pressed | ButtonState::Down))
        .map(|button| format!("{:?}", button))
        .collect();

    println!(
        "controller {} seq {:>6} {:>5.1} Hz tracking={} q=({:+.3} {:+.3} {:+.3} {:+.3}) pos=({:+.1} {:+.1} {:+.1}) trigger={:.2} buttons=[{}]",
        state.controller_id(),
        state.sequence_num(),
        state.data_frame_rate(),
        state.is_tracking(),
        q.w,
        q.x,
        q.y,
        q.z,
        p.x,
        p.y,
        p.z,
        state.trigger(),
        held.join(" ")
    );

    if let Some(raw) = state.raw_sensor_data() {
        println!(
            "    accel=({:+.2} {:+.2} {:+.2}) gyro=({:+.2} {:+.2} {:+.2})",
            raw.accelerometer.x,
            raw.accelerometer.y,
            raw.accelerometer.z,
            raw.gyroscope.x,
            raw.gyroscope.y,
            raw.gyroscope.z
        );
    }
}
