//! ctpeek - prints the health-service data consul-template has stashed in
//! Consul's dedup bucket for a given template file.

use std::path::PathBuf;

use clap::Parser;
use ctpeek_common::template::{self, ServiceData, TemplateData};
use ctpeek_common::{consul::KvClient, fingerprint, gob, lzw};

#[derive(Parser, Debug)]
#[command(name = "ctpeek")]
#[command(about = "Inspect deduplicated consul-template data stored in Consul")]
struct Cli {
    /// Consul address
    #[arg(long, default_value = "localhost:8500")]
    consul: String,

    /// Consul-template file; must end in .ctmpl
    #[arg(long)]
    file: PathBuf,

    /// Accept any TLS certificate the store presents. Insecure: only for
    /// stores running with self-signed certificates you already trust.
    #[arg(long)]
    insecure: bool,
}

/// These flags are widely typed with a single dash (`-consul`, `-file`);
/// rewrite those spellings so both forms parse.
fn normalize_args<I: IntoIterator<Item = String>>(args: I) -> Vec<String> {
    args.into_iter()
        .map(|a| {
            for flag in ["-consul", "-file", "-insecure"] {
                if a == flag || a.starts_with(&format!("{flag}=")) {
                    return format!("-{a}");
                }
            }
            a
        })
        .collect()
}

fn main() {
    // Anything other than a clean parse (including -h) exits with 1.
    let cli = match Cli::try_parse_from(normalize_args(std::env::args())) {
        Ok(cli) => cli,
        Err(err) => {
            let _ = err.print();
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .init();

    if let Err(err) = run(cli) {
        eprintln!("Error: {:#}", err);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    fingerprint::require_template_extension(&cli.file)?;

    let hash = fingerprint::fingerprint_file(&cli.file)?;
    println!("key hash: {}\n", hash);

    let client = KvClient::new(cli.insecure)?;
    let raw = client.fetch_dedup_data(&cli.consul, &hash)?;

    let decompressed = lzw::decompress(&raw).map_err(ctpeek_common::Error::from)?;
    let graph = gob::Decoder::new(&decompressed)
        .decode()
        .map_err(ctpeek_common::Error::from)?;
    let data = TemplateData::from_value(&graph)?;

    for (key, value) in &data.entries {
        if matches!(value, ServiceData::Unrecognized(_)) {
            tracing::warn!(key = %key, "entry does not hold health-service records");
        }
    }

    print!("{}", template::render(&data));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_dash_spellings_parse() {
        let args = normalize_args(
            ["ctpeek", "-consul", "consul.example:8500", "-file", "web.ctmpl"]
                .into_iter()
                .map(String::from),
        );
        let cli = Cli::try_parse_from(args).unwrap();
        assert_eq!(cli.consul, "consul.example:8500");
        assert_eq!(cli.file, PathBuf::from("web.ctmpl"));
        assert!(!cli.insecure);
    }

    #[test]
    fn equals_form_and_double_dash_parse() {
        let args = normalize_args(
            ["ctpeek", "-file=web.ctmpl", "--insecure"]
                .into_iter()
                .map(String::from),
        );
        let cli = Cli::try_parse_from(args).unwrap();
        assert_eq!(cli.file, PathBuf::from("web.ctmpl"));
        assert_eq!(cli.consul, "localhost:8500");
        assert!(cli.insecure);
    }
}
