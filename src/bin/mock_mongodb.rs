//! MongoDB decoy listener.

use std::process::ExitCode;
use wire_decoys::ProtocolType;

fn main() -> ExitCode {
    wire_decoys::launch(ProtocolType::MongoDb)
}
