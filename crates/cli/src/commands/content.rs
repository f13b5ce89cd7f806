use std::path::Path;
use std::process;
use std::time::Duration;

use bookstall_core::{download_filename, StorageLocation};
use bookstall_resolve::adapter::{HttpDownloader, SupabaseClient};
use bookstall_resolve::{resolve_accessible_content, ReaderOutcome, ReaderSurface};

use crate::config::BookstallConfig;
use crate::{print_json, report_error, runtime_or_exit, OutputFormat};

pub(crate) fn cmd_location(raw: &str, platform: &str, output: OutputFormat, quiet: bool) {
    let Some(location) = StorageLocation::parse(raw, platform) else {
        report_error("error: location is empty", output, quiet);
        process::exit(1);
    };
    if quiet {
        return;
    }
    match output {
        OutputFormat::Json => match serde_json::to_value(&location) {
            Ok(v) => print_json(&v),
            Err(e) => {
                report_error(&format!("serialization error: {e}"), output, quiet);
                process::exit(1);
            }
        },
        OutputFormat::Text => match &location {
            StorageLocation::PlatformUrl { reference, .. } => {
                println!("platform storage (url): {reference}");
            }
            StorageLocation::PlatformObject { reference } => {
                println!("platform storage (reference): {reference}");
            }
            StorageLocation::External { url } => println!("external: {url}"),
        },
    }
}

pub(crate) fn cmd_filename(title: &str, url: Option<&str>, output: OutputFormat, quiet: bool) {
    let filename = download_filename(title, url);
    if quiet {
        return;
    }
    match output {
        OutputFormat::Json => print_json(&serde_json::json!({ "filename": filename })),
        OutputFormat::Text => println!("{filename}"),
    }
}

pub(crate) fn cmd_resolve(
    config: &BookstallConfig,
    content_id: &str,
    user_id: &str,
    output: OutputFormat,
    quiet: bool,
) {
    let client = SupabaseClient::new(&config.service, config.tables.clone());
    let rt = runtime_or_exit(output, quiet);

    match rt.block_on(resolve_accessible_content(&client, &client, content_id, user_id)) {
        Ok(descriptor) => {
            if quiet {
                return;
            }
            match output {
                OutputFormat::Json => print_json(&descriptor.to_json()),
                OutputFormat::Text => {
                    println!("{}", descriptor.url);
                    if !descriptor.signed {
                        eprintln!("note: URL is not signed");
                    }
                }
            }
        }
        Err(e) => {
            let msg = format!("error: {} ({})", e.user_message(), e);
            report_error(&msg, output, quiet);
            process::exit(1);
        }
    }
}

pub(crate) fn cmd_download(
    config: &BookstallConfig,
    content_id: &str,
    user_id: &str,
    dir: Option<&Path>,
    output: OutputFormat,
    quiet: bool,
) {
    let client = SupabaseClient::new(&config.service, config.tables.clone());
    let dir = dir.unwrap_or(config.download.dir.as_path());
    let downloader = HttpDownloader::new(dir, config.service.timeout_secs.map(Duration::from_secs));
    let reader = ReaderSurface::new(content_id, user_id);
    let rt = runtime_or_exit(output, quiet);

    match rt.block_on(reader.download(&client, &client, &downloader)) {
        Ok(ReaderOutcome::Ready(done)) => {
            if quiet {
                return;
            }
            match output {
                OutputFormat::Json => print_json(&serde_json::json!({
                    "content_id": content_id,
                    "title": done.descriptor.title,
                    "path": done.path.display().to_string(),
                    "signed": done.descriptor.signed,
                })),
                OutputFormat::Text => println!("{}", done.path.display()),
            }
        }
        // The CLI never closes the reader.
        Ok(ReaderOutcome::Discarded) => {}
        Err(e) => {
            let msg = format!("error: {} ({})", e.user_message(), e);
            report_error(&msg, output, quiet);
            process::exit(1);
        }
    }
}
