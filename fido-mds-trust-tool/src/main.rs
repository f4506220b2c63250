// #![deny(warnings)]
#![warn(unused_extern_crates)]
#![deny(clippy::todo)]
#![deny(clippy::unimplemented)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(clippy::unreachable)]
#![deny(clippy::await_holding_lock)]
#![deny(clippy::needless_pass_by_value)]
#![deny(clippy::trivially_copy_pass_by_ref)]

use clap::{ArgAction, Args, Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use fido_mds_trust::constants::FIDO_MDS_URL;
use fido_mds_trust::{
    ManualScheduler, MetadataBlobVerifier, MetadataService, SelfUpdatingMds, TrustedRoots, Url,
};
use fido_pki::{parse_pem_certificate, RevocationVerifier};

#[derive(Debug, Args)]
pub struct CommonOpt {
    #[clap(short, long)]
    pub debug: bool,
}

#[derive(Debug, Args)]
pub struct QueryOpt {
    /// Show the statement for this AAGUID
    #[clap(long)]
    pub aaguid: Option<String>,
    /// Show the statement for this attestation certificate key identifier (hex)
    #[clap(long = "key-id")]
    pub key_id: Option<String>,
}

#[derive(Debug, Args)]
pub struct VerifyOpt {
    #[clap(flatten)]
    pub common: CommonOpt,
    /// Path to the metadata BLOB
    #[clap(short = 'p', long = "path")]
    pub path: PathBuf,
    /// PEM root certificate to anchor the signing chain. Defaults to GlobalSign Root CA - R3
    #[clap(short = 'r', long = "root")]
    pub root: Option<PathBuf>,
    /// Accept a signing chain outside its validity window, for archived BLOBs
    #[clap(long, action = ArgAction::SetTrue)]
    pub allow_expired: bool,
    #[clap(flatten)]
    pub query: QueryOpt,
}

#[derive(Debug, Args)]
pub struct FetchOpt {
    #[clap(flatten)]
    pub common: CommonOpt,
    /// The metadata authority to fetch from
    #[clap(short, long, default_value = FIDO_MDS_URL)]
    pub url: Url,
    #[clap(flatten)]
    pub query: QueryOpt,
}

#[derive(Debug, Args)]
pub struct RevocationOpt {
    #[clap(flatten)]
    pub common: CommonOpt,
    /// Path to a PEM certificate to check against its CRL distribution points
    #[clap(short = 'p', long = "path")]
    pub path: PathBuf,
}

#[derive(Debug, Subcommand)]
#[clap(about = "Fido Metadata Service trust tool")]
pub enum Opt {
    /// Verify a metadata BLOB on disk and display its content
    Verify(VerifyOpt),
    /// Fetch and verify the metadata BLOB from a metadata authority
    Fetch(FetchOpt),
    /// Check whether a certificate has been revoked
    Revocation(RevocationOpt),
}

impl Opt {
    fn debug(&self) -> bool {
        match self {
            Opt::Verify(VerifyOpt { common, .. })
            | Opt::Fetch(FetchOpt { common, .. })
            | Opt::Revocation(RevocationOpt { common, .. }) => common.debug,
        }
    }
}

#[derive(Debug, clap::Parser)]
#[clap(about = "Fido Metadata Service trust tool")]
pub struct CliParser {
    #[clap(subcommand)]
    pub commands: Opt,
}

fn load_roots(root: Option<&Path>) -> Result<TrustedRoots, String> {
    match root {
        Some(path) => {
            let pem = fs::read(path).map_err(|e| format!("reading {}: {e}", path.display()))?;
            TrustedRoots::from_pem(&pem).map_err(|e| e.to_string())
        }
        None => TrustedRoots::fido_default().map_err(|e| e.to_string()),
    }
}

fn display(mds: &MetadataService, query: &QueryOpt) -> Result<(), String> {
    println!("{mds}");

    if let Some(aaguid) = &query.aaguid {
        let entry = mds
            .lookup_entry_by_aaguid(aaguid)
            .ok_or_else(|| format!("no entry for aaguid {aaguid}"))?;
        println!("{entry}");
    }

    if let Some(key_id) = &query.key_id {
        let entry = mds
            .lookup_entry_by_key_identifier(key_id)
            .ok_or_else(|| format!("no entry for key identifier {key_id}"))?;
        println!("{entry}");
    }

    Ok(())
}

async fn run(opt: Opt) -> Result<(), String> {
    match opt {
        Opt::Verify(VerifyOpt {
            common: _,
            path,
            root,
            allow_expired,
            query,
        }) => {
            tracing::trace!(?path);
            let roots = load_roots(root.as_deref())?;
            let blob = fs::read_to_string(&path)
                .map_err(|e| format!("reading {}: {e}", path.display()))?;

            let payload = MetadataBlobVerifier::new()
                .danger_disable_time_checks(allow_expired)
                .verify(&blob, &roots)
                .map_err(|e| e.to_string())?;

            display(&MetadataService::from_payload(payload), &query)
        }
        Opt::Fetch(FetchOpt {
            common: _,
            url,
            query,
        }) => {
            // One shot, nothing is left scheduled.
            let mds = SelfUpdatingMds::builder(url)
                .scheduler(Arc::new(ManualScheduler::new()))
                .build()
                .await
                .map_err(|e| e.to_string())?;

            display(&mds.snapshot(), &query)
        }
        Opt::Revocation(RevocationOpt { common: _, path }) => {
            let pem = fs::read(&path).map_err(|e| format!("reading {}: {e}", path.display()))?;
            let cert = parse_pem_certificate(&pem).map_err(|e| e.to_string())?;
            let verifier = RevocationVerifier::new().map_err(|e| e.to_string())?;

            if verifier.verify(&cert).await {
                println!("not revoked");
                Ok(())
            } else {
                Err("revoked, or revocation status could not be determined".to_string())
            }
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let opt = CliParser::parse();

    let fmt_layer = fmt::layer().with_writer(std::io::stderr);

    let filter_layer = if opt.commands.debug() {
        match EnvFilter::try_new("fido_pki=debug,fido_mds_trust=debug,fido_mds_trust_tool=debug")
        {
            Ok(f) => f,
            Err(e) => {
                eprintln!("ERROR! Unable to start tracing {:?}", e);
                return ExitCode::FAILURE;
            }
        }
    } else {
        match EnvFilter::try_from_default_env() {
            Ok(f) => f,
            Err(_) => EnvFilter::new("fido_pki=warn,fido_mds_trust=warn,fido_mds_trust_tool=warn"),
        }
    };

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer)
        .init();

    match run(opt.commands).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(%e);
            eprintln!("ERROR! {e}");
            ExitCode::FAILURE
        }
    }
}
