//! Stand-in flight-controller bridge
//!
//! Accepts every request from the hardware link and prints it, so the hardware path can be run
//! without a vehicle. Pass `--reject-arm` to refuse arming.

use comms_if::{
    eqpt::{LinkRequest, LinkResponse},
    net::{zmq, MonitoredSocket, MonitoredSocketError, SocketOptions},
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let reject_arm = std::env::args().any(|a| a == "--reject-arm");

    // Create the context for zmq
    let ctx = zmq::Context::new();

    // Set the socket options
    let socket_options = SocketOptions {
        bind: true,
        block_on_first_connect: false,
        ..Default::default()
    };

    // Create the socket
    let socket = MonitoredSocket::new(&ctx, zmq::REP, socket_options, "tcp://*:5760")?;

    println!("Bridge stand-in running on port 5760");

    // Respond to link requests
    loop {
        let response = match socket.recv_json::<LinkRequest>() {
            Ok(LinkRequest::Arm { force }) if reject_arm => {
                println!("Arm (force: {}), rejecting", force);
                LinkResponse::Rejected("pre-arm checks failed".into())
            }
            Ok(LinkRequest::RcOverride { channels }) => {
                println!("RC override {:?}", channels);
                LinkResponse::Ok
            }
            Ok(req) => {
                println!("{:?}", req);
                LinkResponse::Ok
            }
            Err(MonitoredSocketError::DeserializeError(e)) => {
                println!("Invalid request: {}", e);
                LinkResponse::Rejected(e.to_string())
            }
            Err(e) => return Err(e.into()),
        };

        socket.send_json(&response)?;
    }
}
