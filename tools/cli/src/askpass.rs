//! bw-ssh-askpass - passphrase helper run by `ssh-add`.
//!
//! Prints the passphrase handed over in `BW_SSH_ASKPASS_PASSPHRASE` and
//! exits. When the prompt passed as the first argument says the previous
//! passphrase was bad, it exits non-zero instead so `ssh-add` stops asking.

use std::io;
use std::process::ExitCode;

fn main() -> ExitCode {
    let prompt = std::env::args().nth(1);
    match bwkeys_agent::askpass::respond(prompt.as_deref(), &mut io::stdout().lock()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("bw-ssh-askpass: {}", e);
            ExitCode::FAILURE
        }
    }
}
