// Licensed under the Apache-2.0 license

mod tasks;

use anyhow::Result;

const USAGE: &str = "\
Usage: cargo xtask <task>

Tasks:
    test    run host unit tests
    lint    run clippy with warnings denied
    fmt     check formatting
    ci      fmt, lint and test
";

fn main() -> Result<()> {
    let task = std::env::args().nth(1);
    match task.as_deref() {
        Some("test") => tasks::test(),
        Some("lint") => tasks::lint(),
        Some("fmt") => tasks::fmt_check(),
        Some("ci") => tasks::ci(),
        Some(other) => {
            eprint!("{USAGE}");
            anyhow::bail!("unknown task: {}", other)
        }
        None => {
            print!("{USAGE}");
            Ok(())
        }
    }
}
