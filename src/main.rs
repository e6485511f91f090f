use std::{
    io::{self, Read, Write},
    path::Path,
    process::ExitCode,
};

use cloud_storage::{
    create_storage_client, util::object::parse_object_uri, Backend, LocalStorage, ObjectMetadata,
    StorageConfig, StorageError,
};
use tracing::{error, info, span, Level};

fn command() -> clap::Command {
    let uri = || clap::Arg::new("URI").required(true).index(1);
    let gunzip = || {
        clap::Arg::new("gunzip")
            .long("gunzip")
            .action(clap::ArgAction::SetTrue)
    };

    clap::Command::new("cloud-storage")
        .subcommand_required(true)
        .subcommand(clap::Command::new("buckets").arg(clap::Arg::new("BACKEND").required(true).index(1)))
        .subcommand(clap::Command::new("create-bucket").arg(uri()))
        .subcommand(
            clap::Command::new("upload")
                .arg(clap::Arg::new("SOURCE").required(true).index(1))
                .arg(clap::Arg::new("URI").required(true).index(2))
                .arg(clap::Arg::new("content-type").long("content-type"))
                .arg(clap::Arg::new("content-encoding").long("content-encoding")),
        )
        .subcommand(
            clap::Command::new("put")
                .about("upload bytes read from stdin")
                .arg(uri())
                .arg(clap::Arg::new("content-type").long("content-type"))
                .arg(clap::Arg::new("content-encoding").long("content-encoding")),
        )
        .subcommand(clap::Command::new("exists").arg(uri()))
        .subcommand(
            clap::Command::new("rename")
                .arg(uri())
                .arg(clap::Arg::new("NEW_KEY").required(true).index(2)),
        )
        .subcommand(
            clap::Command::new("download")
                .arg(uri())
                .arg(clap::Arg::new("DESTINATION").required(true).index(2))
                .arg(gunzip()),
        )
        .subcommand(clap::Command::new("cat").arg(uri()).arg(gunzip()))
        .subcommand(clap::Command::new("delete").arg(uri()))
}

fn arg<'a>(matches: &'a clap::ArgMatches, name: &str) -> &'a str {
    matches
        .get_one::<String>(name)
        .map(String::as_str)
        .unwrap_or_default()
}

fn metadata(matches: &clap::ArgMatches) -> ObjectMetadata {
    ObjectMetadata {
        content_type: matches.get_one::<String>("content-type").cloned(),
        content_encoding: matches.get_one::<String>("content-encoding").cloned(),
    }
}

fn run(name: &str, matches: &clap::ArgMatches, config: &StorageConfig) -> Result<(), StorageError> {
    if name == "buckets" {
        let backend: Backend = arg(matches, "BACKEND").parse()?;
        for bucket in create_storage_client(backend, config)?.list_bucket_names()? {
            println!("{}", bucket);
        }
        return Ok(());
    }

    let uri = parse_object_uri(arg(matches, "URI"))?;
    info!(backend = %uri.backend, bucket = %uri.bucket, key = %uri.key, "target");

    if name == "create-bucket" {
        if uri.backend != Backend::Local {
            return Err(StorageError::InvalidRequest(format!(
                "{} buckets must be created with the provider's tooling",
                uri.backend
            )));
        }
        return LocalStorage::new(config.local_root.clone())?.create_bucket(&uri.bucket);
    }

    let storage = create_storage_client(uri.backend, config)?;
    let gunzip = matches.get_flag_or_false("gunzip");

    match name {
        "upload" => storage.upload_file(
            &uri.bucket,
            &uri.key,
            Path::new(arg(matches, "SOURCE")),
            &metadata(matches),
        ),
        "put" => {
            let mut bytes = Vec::new();
            io::stdin()
                .read_to_end(&mut bytes)
                .map_err(|err| StorageError::from_io(err, "failed to read stdin"))?;
            storage.upload(&uri.bucket, &uri.key, bytes.into(), &metadata(matches))
        }
        "exists" => {
            println!("{}", storage.exists(&uri.bucket, &uri.key)?);
            Ok(())
        }
        "rename" => storage.rename(&uri.bucket, &uri.key, arg(matches, "NEW_KEY")),
        "download" => storage.download_to_file(
            &uri.bucket,
            &uri.key,
            Path::new(arg(matches, "DESTINATION")),
            gunzip,
        ),
        "cat" => {
            let bytes = storage.download(&uri.bucket, &uri.key, gunzip)?;
            io::stdout()
                .write_all(&bytes)
                .map_err(|err| StorageError::from_io(err, "failed to write stdout"))
        }
        "delete" => storage.delete(&uri.bucket, &uri.key),
        _ => Err(StorageError::InvalidArgument(format!("unknown command: {}", name))),
    }
}

trait FlagExt {
    fn get_flag_or_false(&self, id: &str) -> bool;
}

impl FlagExt for clap::ArgMatches {
    fn get_flag_or_false(&self, id: &str) -> bool {
        matches!(self.try_get_one::<bool>(id), Ok(Some(true)))
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt().json().with_writer(io::stderr).init();

    let span = span!(Level::INFO, "main", context = "main");
    let _e = span.enter();

    let matches = command().get_matches();
    let (name, sub_matches) = match matches.subcommand() {
        Some(sub) => sub,
        None => return ExitCode::FAILURE,
    };

    let span = span!(Level::INFO, "command", context = name);
    let _c = span.enter();
    info!("called");

    let config = StorageConfig::from_env();
    match run(name, sub_matches, &config) {
        Err(err) => {
            error!(error_message = %err, error_group = ?err.kind(), "command failed");
            ExitCode::FAILURE
        }
        Ok(()) => ExitCode::SUCCESS,
    }
}
