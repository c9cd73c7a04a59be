use clap::Parser;

/// Samil Bridge - serial bridge and datalogger for Samil solar inverters
#[derive(Debug, Parser)]
#[clap(author, version)]
pub struct Options {
    /// Config file to read
    #[clap(short = 'c', long = "config", default_value = "config.yaml")]
    pub config_file: String,

    /// Run the interactive protocol tester instead of the logger loop
    #[clap(long = "tester")]
    pub tester: bool,
}

impl Options {
    pub fn new() -> Self {
        Self::parse()
    }
}
