//! Command-line client for the framekv wire protocol.
//!
//! Encodes one request from the command line, sends it over a blocking
//! socket, and prints the decoded response.

use clap::Parser;
use framekv::protocol::frame::{self, DecodeResponse, Status, HEADER_LEN};
use std::io::{Read, Write};
use std::net::TcpStream;

/// Command-line arguments for the client
#[derive(Parser, Debug)]
#[command(name = "framekv-cli")]
#[command(version = "0.1.0")]
#[command(about = "Send one command to a framekv server", long_about = None)]
struct Args {
    /// Server address
    #[arg(short, long, default_value = "127.0.0.1:1234")]
    addr: String,

    /// Command words, e.g. `set key value`
    #[arg(required = true)]
    command: Vec<String>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut stream = TcpStream::connect(&args.addr)?;
    stream.write_all(&frame::encode_request(&args.command))?;

    let response = read_response(&mut stream)?;
    match response.status {
        Status::Ok => {
            if response.body.is_empty() {
                println!("OK");
            } else {
                println!("{}", String::from_utf8_lossy(&response.body));
            }
        }
        Status::NotFound => println!("(not found)"),
        Status::Error => {
            eprintln!("error: {}", String::from_utf8_lossy(&response.body));
            std::process::exit(1);
        }
    }

    Ok(())
}

/// Blocking read of one response frame.
fn read_response(stream: &mut TcpStream) -> Result<frame::Response, Box<dyn std::error::Error>> {
    let mut header = [0u8; HEADER_LEN];
    stream.read_exact(&mut header)?;
    let total = u32::from_le_bytes(header) as usize;

    let mut buf = Vec::with_capacity(HEADER_LEN + total);
    buf.extend_from_slice(&header);
    buf.resize(HEADER_LEN + total, 0);
    stream.read_exact(&mut buf[HEADER_LEN..])?;

    match frame::decode_response(&buf, usize::MAX) {
        DecodeResponse::Complete { response, .. } => Ok(response),
        DecodeResponse::Incomplete => Err("truncated response".into()),
        DecodeResponse::Error(e) => Err(e.into()),
    }
}
