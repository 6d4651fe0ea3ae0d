use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use docintake::config::Config;
use docintake::intake::extract::guess_mime_type;
use docintake::intake::{ClassificationInput, Classifier, UploadDecision, UploadRequest};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Document intake: upload validation and department classification.
#[derive(Parser, Debug)]
#[command(name = "docintake", version, about)]
struct Cli {
    /// Path to config.toml (defaults to the platform config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the HTTP gateway
    Serve {
        /// Listen address as HOST:PORT (overrides gateway.host and gateway.port)
        #[arg(long, value_name = "ADDR")]
        bind: Option<String>,
    },

    /// Run the upload gatekeeper against a local file
    Check {
        file: PathBuf,
        /// Declared MIME type (guessed from the extension when omitted)
        #[arg(long)]
        mime: Option<String>,
        /// Source label, e.g. "email"
        #[arg(long)]
        source: Option<String>,
    },

    /// Classify text given inline or read from a file
    Classify {
        text: Option<String>,
        #[arg(long, conflicts_with = "text")]
        file: Option<PathBuf>,
    },

    /// Inspect configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Print the effective configuration as TOML
    Show,
    /// Print the JSON Schema of the config file
    Schema,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("docintake=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Config {
            action: ConfigAction::Schema,
        } => {
            println!("{}", serde_json::to_string_pretty(&Config::json_schema())?);
            return Ok(());
        }
        Commands::Config {
            action: ConfigAction::Show,
        } => {
            let config = Config::load(cli.config.as_deref())?;
            print!("{}", config.to_toml()?);
            return Ok(());
        }
        _ => {}
    }

    let mut config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Serve { bind } => {
            if let Some(addr) = bind {
                config.set_bind_addr(&addr)?;
            }
            docintake::gateway::serve(config).await
        }
        Commands::Check { file, mime, source } => {
            let payload = std::fs::read(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let filename = file
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let mime = mime.unwrap_or_else(|| guess_mime_type(&filename));

            let mut request = UploadRequest::from_bytes(&filename, &mime, payload);
            request.source = source;

            let decision = UploadDecision::from(config.gatekeeper().evaluate(&request));
            println!("{}", serde_json::to_string_pretty(&decision)?);
            if !decision.is_accepted() {
                std::process::exit(1);
            }
            Ok(())
        }
        Commands::Classify { text, file } => {
            let text = match (text, file) {
                (Some(text), _) => text,
                (None, Some(path)) => std::fs::read_to_string(&path)
                    .with_context(|| format!("Failed to read {}", path.display()))?,
                (None, None) => bail!("provide TEXT or --file"),
            };
            let classifier = Classifier::new(config.taxonomy()?);
            let result = classifier.classify(&ClassificationInput::new(text))?;
            println!("{}", serde_json::to_string_pretty(&result)?);
            Ok(())
        }
        Commands::Config { .. } => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serve_takes_bind_address() {
        let cli = Cli::try_parse_from(["docintake", "serve", "--bind", "0.0.0.0:9000"]).unwrap();
        match cli.command {
            Commands::Serve { bind } => assert_eq!(bind.as_deref(), Some("0.0.0.0:9000")),
            other => panic!("unexpected command {other:?}"),
        }

        assert!(Cli::try_parse_from(["docintake", "serve", "--port", "9000"]).is_err());
    }

    #[test]
    fn check_accepts_mime_and_source() {
        let cli = Cli::try_parse_from([
            "docintake", "check", "scan.tiff", "--mime", "image/tiff", "--source", "email",
        ])
        .unwrap();
        assert!(matches!(
            cli.command,
            Commands::Check { mime: Some(_), source: Some(_), .. }
        ));
    }
}
