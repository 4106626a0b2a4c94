//! Stand-in vision server
//!
//! Publishes a marker drifting slowly around the centre of a 640x480 frame, dropping out for one
//! second in every ten.

use chrono::Utc;
use comms_if::{
    eqpt::{MarkerMsg, MarkerObservation},
    net::{zmq, MonitoredSocket, SocketOptions},
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Create zmq context
    let ctx = zmq::Context::new();

    // Create socket options
    let socket_options = SocketOptions {
        bind: true,
        block_on_first_connect: false,
        ..Default::default()
    };

    // Create the socket
    let socket = MonitoredSocket::new(&ctx, zmq::PUB, socket_options, "tcp://*:5770")?;

    println!("Vision stand-in publishing on port 5770");

    let start = std::time::Instant::now();

    loop {
        let t = start.elapsed().as_secs_f64();

        let observation = match t % 10.0 < 9.0 {
            true => MarkerObservation {
                present: true,
                area: 20_000.0 + 4_000.0 * (t * 0.3).sin(),
                left_edge_length: 140.0,
                right_edge_length: 140.0 + 5.0 * (t * 0.5).sin(),
                center_x: 320.0 + 60.0 * (t * 0.4).cos(),
                center_y: 240.0 + 40.0 * (t * 0.4).sin(),
                frame_width: 640,
                frame_height: 480,
            },
            false => MarkerObservation::absent(),
        };

        let msg = MarkerMsg {
            timestamp: Utc::now(),
            observation,
        };

        if let Err(e) = socket.send_json(&msg) {
            println!("Failed to send observation: {}", e);
        }

        std::thread::sleep(std::time::Duration::from_millis(33));
    }
}
