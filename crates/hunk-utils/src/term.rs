//! Terminal access for interactive prompts.

use std::fs::File;
use std::io::{self, BufReader};

/// Open `/dev/tty` for prompt input so interaction works even when stdin is
/// piped (e.g. `echo y | hunkr stage`).
pub fn open_tty() -> io::Result<BufReader<File>> {
    Ok(BufReader::new(File::open("/dev/tty")?))
}
