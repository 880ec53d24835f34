//! Binary entrypoint for the Ollama gateway.

use std::process::ExitCode;

use ollama_gateway::start_gateway;

fn main() -> ExitCode {
    start_gateway::run()
}
