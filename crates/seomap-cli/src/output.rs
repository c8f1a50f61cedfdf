//! Output format selection shared by the reporting commands.

use serde::Serialize;

/// Output format for command results
#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Pretty text output (default)
    Text,
    /// Single JSON document
    Json,
}

impl OutputFormat {
    /// Whether the output is meant for other programs.
    pub const fn is_machine(self) -> bool {
        matches!(self, Self::Json)
    }
}

/// Print `value` as pretty JSON on stdout.
pub fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
