use std::path::PathBuf;

use anyhow::{bail, Context};
use chrono::NaiveDate;
use clap::Parser;
use seekcore_query::{Filter, SizeOperator, SizeUnit};

/// Command-line arguments accepted by the `seek` binary.
#[derive(Parser, Debug)]
#[command(
    name = "seek",
    version,
    about = "Browse devices and directories, or stream a file search"
)]
pub(crate) struct CliArgs {
    #[arg(long, value_name = "FILE", help = "JSON settings file (default: none)")]
    pub(crate) config: Option<PathBuf>,
    #[arg(short, long, help = "Log debug output to stderr")]
    pub(crate) verbose: bool,
    #[arg(long, help = "Use language-model assisted search")]
    pub(crate) llm: bool,
    #[arg(
        long = "type",
        value_name = "EXT",
        help = "Only match this extension (repeatable)"
    )]
    pub(crate) types: Vec<String>,
    #[arg(
        long,
        num_args = 3,
        value_names = ["OP", "VALUE", "UNIT"],
        allow_hyphen_values = true,
        help = "Size bound, e.g. `--size '>' 1 MB`"
    )]
    pub(crate) size: Option<Vec<String>>,
    #[arg(long, value_name = "DATE", help = "Modified on or after (YYYY-MM-DD)")]
    pub(crate) from: Option<NaiveDate>,
    #[arg(long, value_name = "DATE", help = "Modified on or before (YYYY-MM-DD)")]
    pub(crate) to: Option<NaiveDate>,
    #[arg(long, value_name = "PATH", help = "Directory to start in (default: device list)")]
    pub(crate) cwd: Option<String>,
    #[arg(
        value_name = "INPUT",
        help = "A path, a sub-directory name, or search text (default: device list)"
    )]
    pub(crate) input: Option<String>,
}

impl CliArgs {
    pub(crate) fn filters(&self) -> anyhow::Result<Vec<Filter>> {
        let mut filters: Vec<Filter> = self.types.iter().map(Filter::file_type).collect();
        if let Some(size) = &self.size {
            filters.push(parse_size(size)?);
        }
        if self.from.is_some() || self.to.is_some() {
            filters.push(Filter::date(self.from, self.to));
        }
        Ok(filters)
    }
}

fn parse_size(parts: &[String]) -> anyhow::Result<Filter> {
    let [op, value, unit] = parts else {
        bail!("--size takes OP VALUE UNIT");
    };

    let operator = match op.as_str() {
        ">" => SizeOperator::Greater,
        "<" => SizeOperator::Less,
        "=" => SizeOperator::Equal,
        other => bail!("unknown size operator `{other}` (expected >, < or =)"),
    };
    let value: f64 = value
        .parse()
        .with_context(|| format!("size value `{value}` is not a number"))?;
    let unit = match unit.to_ascii_uppercase().as_str() {
        "KB" => SizeUnit::Kb,
        "MB" => SizeUnit::Mb,
        "GB" => SizeUnit::Gb,
        other => bail!("unknown size unit `{other}` (expected KB, MB or GB)"),
    };
    Ok(Filter::size(operator, value, unit))
}
